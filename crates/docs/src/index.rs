//! Inverted index over catalog paths.
//!
//! Documents are identified by their position in the catalog they were built
//! from, so a hit maps straight back to a `CatalogEntry` without another lookup.
//! The index is immutable once built; refreshes build a new one.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use crate::tokenizer::{tokenize, tokenize_unique};

const EXACT_WEIGHT: u32 = 3;
const PREFIX_WEIGHT: u32 = 2;
const FUZZY_WEIGHT: u32 = 1;
/// Query terms shorter than this only match exactly or by prefix.
pub const FUZZY_MIN_TERM_LEN: usize = 5;

#[derive(Clone, Debug, Default)]
pub struct SearchIndex {
    /// Term -> ascending document ids
    postings: BTreeMap<String, Vec<usize>>,
    /// Number of terms in each document, used to prefer shorter paths
    doc_lengths: Vec<usize>,
}

impl SearchIndex {
    pub fn build<'a>(documents: impl IntoIterator<Item = &'a str>) -> Self {
        let mut postings: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut doc_lengths = Vec::new();

        for (doc_id, text) in documents.into_iter().enumerate() {
            doc_lengths.push(tokenize(text).len());
            for term in tokenize_unique(text) {
                postings.entry(term).or_default().push(doc_id);
            }
        }

        Self { postings, doc_lengths }
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.doc_lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_lengths.is_empty()
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    /// Document ids matching every query term, best first, at most `limit`.
    ///
    /// A query term matches an index term exactly, as a prefix of it, or (for
    /// terms of at least [`FUZZY_MIN_TERM_LEN`] characters) within one edit.
    /// Ties on score go to the document with fewer terms, then to the earlier
    /// catalog position, so the same query over the same index always returns
    /// the same list.
    pub fn search(&self, query: &str, limit: usize) -> Vec<usize> {
        let terms = tokenize_unique(query);
        if terms.is_empty() || limit == 0 {
            return Vec::new();
        }

        // doc -> (score, matched query terms)
        let mut scores: HashMap<usize, (u32, usize)> = HashMap::new();
        for term in &terms {
            for (doc_id, weight) in self.term_matches(term) {
                let slot = scores.entry(doc_id).or_insert((0, 0));
                slot.0 += weight;
                slot.1 += 1;
            }
        }

        let mut hits: Vec<(usize, u32)> = scores
            .into_iter()
            .filter(|(_, (_, matched))| *matched == terms.len())
            .map(|(doc_id, (score, _))| (doc_id, score))
            .collect();

        hits.sort_by(|left, right| {
            right
                .1
                .cmp(&left.1)
                .then_with(|| self.doc_lengths[left.0].cmp(&self.doc_lengths[right.0]))
                .then_with(|| left.0.cmp(&right.0))
        });
        hits.truncate(limit);
        hits.into_iter().map(|(doc_id, _)| doc_id).collect()
    }

    fn term_matches(&self, term: &str) -> HashMap<usize, u32> {
        let mut best = HashMap::new();

        let prefixed = self
            .postings
            .range::<str, _>((Bound::Included(term), Bound::Unbounded))
            .take_while(|(candidate, _)| candidate.starts_with(term));
        for (candidate, docs) in prefixed {
            let weight = if candidate == term { EXACT_WEIGHT } else { PREFIX_WEIGHT };
            raise(&mut best, docs, weight);
        }

        if term.chars().count() >= FUZZY_MIN_TERM_LEN {
            for (candidate, docs) in &self.postings {
                if !candidate.starts_with(term) && within_one_edit(term, candidate) {
                    raise(&mut best, docs, FUZZY_WEIGHT);
                }
            }
        }

        best
    }
}

fn raise(best: &mut HashMap<usize, u32>, docs: &[usize], weight: u32) {
    for doc_id in docs {
        let slot = best.entry(*doc_id).or_insert(0);
        if *slot < weight {
            *slot = weight;
        }
    }
}

/// True when `left` becomes `right` with at most one insertion, deletion or substitution.
fn within_one_edit(left: &str, right: &str) -> bool {
    let left: Vec<char> = left.chars().collect();
    let right: Vec<char> = right.chars().collect();
    let (short, long) = if left.len() <= right.len() { (&left, &right) } else { (&right, &left) };
    if long.len() - short.len() > 1 {
        return false;
    }

    let mut i = 0;
    let mut j = 0;
    let mut edits = 0;
    while i < short.len() && j < long.len() {
        if short[i] == long[j] {
            i += 1;
            j += 1;
            continue;
        }
        edits += 1;
        if edits > 1 {
            return false;
        }
        if short.len() == long.len() {
            i += 1;
        }
        j += 1;
    }

    edits + (long.len() - j) + (short.len() - i) <= 1
}

#[cfg(test)]
mod tests {
    use super::{within_one_edit, SearchIndex};

    fn catalog() -> Vec<&'static str> {
        vec![
            "Web/JavaScript/Reference/Global_Objects/Array/filter",
            "Web/JavaScript/Reference/Global_Objects/Array",
            "Web/JavaScript/Reference/Global_Objects/Array/flatMap",
            "Web/JavaScript/Reference/Global_Objects/TypedArray/filter",
            "Web/API/Fetch_API",
            "Web/HTML/Element/a",
        ]
    }

    #[test]
    fn all_query_terms_must_match() {
        let index = SearchIndex::build(catalog());
        assert_eq!(index.search("array filter", 10), vec![0]);
        assert!(index.search("array nonexistent", 10).is_empty());
    }

    #[test]
    fn exact_matches_rank_above_prefix_matches() {
        let index = SearchIndex::build(catalog());
        let hits = index.search("array", 10);
        // Exact "array" hits first (shortest path wins the tie), TypedArray never
        // matches because "typedarray" does not start with "array".
        assert_eq!(hits, vec![1, 0, 2]);
    }

    #[test]
    fn prefix_matches_complete_partial_terms() {
        let index = SearchIndex::build(catalog());
        assert_eq!(index.search("flatm", 10), vec![2]);
    }

    #[test]
    fn single_typos_match_longer_terms_only() {
        let index = SearchIndex::build(catalog());
        assert_eq!(index.search("filtr", 10), vec![0, 3]);
        assert!(index.search("fech", 10).is_empty(), "short terms are not fuzzed");
    }

    #[test]
    fn limit_caps_results_and_zero_or_empty_queries_yield_nothing() {
        let index = SearchIndex::build(catalog());
        assert_eq!(index.search("web", 2).len(), 2);
        assert!(index.search("web", 0).is_empty());
        assert!(index.search("  ..  ", 10).is_empty());
    }

    #[test]
    fn repeated_searches_are_identical() {
        let index = SearchIndex::build(catalog());
        let first = index.search("reference global", 10);
        for _ in 0..5 {
            assert_eq!(index.search("reference global", 10), first);
        }
    }

    #[test]
    fn one_edit_distance() {
        assert!(!within_one_edit("filter", "fliter"), "transpositions are two edits");
        assert!(within_one_edit("filter", "filtr"));
        assert!(within_one_edit("filter", "filters"));
        assert!(within_one_edit("filter", "fitter"));
        assert!(!within_one_edit("filter", "map"));
    }
}
