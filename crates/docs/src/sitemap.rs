use std::io::Read;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use docbot_core::errors::ProviderError;
use flate2::read::GzDecoder;
use serde::Deserialize;

/// One documentation page known to the catalog. `path` is relative to the
/// provider's docs base, e.g. `Web/API/Fetch_API`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogEntry {
    pub path: String,
    pub last_modified: Option<DateTime<Utc>>,
}

impl CatalogEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), last_modified: None }
    }
}

/// Anything that can produce the full page catalog in one call.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct UrlSet {
    #[serde(rename = "url", default)]
    urls: Vec<UrlEntry>,
}

#[derive(Debug, Deserialize)]
struct UrlEntry {
    loc: String,
    lastmod: Option<String>,
}

pub fn decompress(bytes: &[u8]) -> Result<String, ProviderError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut xml = String::new();
    decoder
        .read_to_string(&mut xml)
        .map_err(|error| ProviderError::Decompress(error.to_string()))?;
    Ok(xml)
}

/// Parses a sitemap `<urlset>` into catalog entries, stripping `base_url` from
/// every location. Locations outside `base_url` are dropped. An empty result is
/// treated as a parse failure so a truncated download never replaces a good index.
pub fn parse_sitemap(xml: &str, base_url: &str) -> Result<Vec<CatalogEntry>, ProviderError> {
    let set: UrlSet =
        quick_xml::de::from_str(xml).map_err(|error| ProviderError::Parse(error.to_string()))?;

    let entries: Vec<CatalogEntry> = set
        .urls
        .into_iter()
        .filter_map(|entry| {
            let path = entry.loc.trim().strip_prefix(base_url)?.trim_end_matches('/');
            if path.is_empty() {
                return None;
            }
            Some(CatalogEntry {
                path: path.to_owned(),
                last_modified: entry.lastmod.as_deref().and_then(parse_lastmod),
            })
        })
        .collect();

    if entries.is_empty() {
        return Err(ProviderError::Parse("sitemap contained no documentation entries".to_owned()));
    }
    Ok(entries)
}

fn parse_lastmod(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
