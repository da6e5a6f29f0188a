//! discord.js documentation graph.
//!
//! The docs JSON published for each discord.js branch/tag lists top-level
//! classes, typedefs and interfaces, each with properties, methods and events.
//! `DocGraph` flattens that into nodes addressable as `Guild`, `Guild#members`
//! or `Guild#fetch()`, and `DocGraphStore` keeps one graph per source.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use docbot_core::config::DocsConfig;
use docbot_core::errors::ProviderError;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::mdn::{get_ok, http_client};

const DOCS_SITE: &str = "https://discord.js.org/#/docs/discord.js";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Class,
    Typedef,
    Interface,
    Property,
    Method,
    Event,
}

impl NodeKind {
    pub fn is_top_level(self) -> bool {
        matches!(self, Self::Class | Self::Typedef | Self::Interface)
    }

    fn site_segment(self) -> &'static str {
        match self {
            Self::Typedef => "typedef",
            _ => "class",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Class => "class",
            Self::Typedef => "typedef",
            Self::Interface => "interface",
            Self::Property => "property",
            Self::Method => "method",
            Self::Event => "event",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocNode {
    pub name: String,
    pub parent: Option<String>,
    pub kind: NodeKind,
    pub description: String,
    pub private: bool,
    pub is_static: bool,
}

impl DocNode {
    /// `Guild`, `Guild#members`, `Guild#fetch()`, `Util.resolveColor()`
    pub fn formatted_name(&self) -> String {
        let Some(parent) = &self.parent else {
            return self.name.clone();
        };
        let separator = if self.is_static { '.' } else { '#' };
        let call = if self.kind == NodeKind::Method { "()" } else { "" };
        format!("{parent}{separator}{}{call}", self.name)
    }

    pub fn site_url(&self, source: &str) -> String {
        match &self.parent {
            None => format!("{DOCS_SITE}/{source}/{}/{}", self.kind.site_segment(), self.name),
            Some(parent) => {
                let anchor = if self.kind == NodeKind::Event {
                    format!("e-{}", self.name)
                } else {
                    self.name.clone()
                };
                format!("{DOCS_SITE}/{source}/class/{parent}?scrollTo={anchor}")
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DocGraph {
    nodes: Vec<DocNode>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDocs {
    #[serde(default)]
    classes: Vec<RawParent>,
    #[serde(default)]
    typedefs: Vec<RawParent>,
    #[serde(default)]
    interfaces: Vec<RawParent>,
}

#[derive(Debug, Deserialize)]
struct RawParent {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    access: Option<String>,
    #[serde(default)]
    props: Vec<RawMember>,
    #[serde(default)]
    methods: Vec<RawMember>,
    #[serde(default)]
    events: Vec<RawMember>,
}

#[derive(Debug, Deserialize)]
struct RawMember {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    access: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl DocGraph {
    pub fn from_json(raw: &str) -> Result<Self, ProviderError> {
        let docs: RawDocs =
            serde_json::from_str(raw).map_err(|error| ProviderError::Parse(error.to_string()))?;
        Ok(Self::from_raw(docs))
    }

    fn from_raw(docs: RawDocs) -> Self {
        let mut nodes = Vec::new();
        let groups = [
            (NodeKind::Class, docs.classes),
            (NodeKind::Typedef, docs.typedefs),
            (NodeKind::Interface, docs.interfaces),
        ];

        for (kind, parents) in groups {
            for parent in parents {
                let parent_private = is_private(parent.access.as_deref());
                nodes.push(DocNode {
                    name: parent.name.clone(),
                    parent: None,
                    kind,
                    description: clean_description(parent.description.as_deref()),
                    private: parent_private,
                    is_static: false,
                });

                let members = [
                    (NodeKind::Property, parent.props),
                    (NodeKind::Method, parent.methods),
                    (NodeKind::Event, parent.events),
                ];
                for (member_kind, entries) in members {
                    for member in entries {
                        nodes.push(DocNode {
                            name: member.name,
                            parent: Some(parent.name.clone()),
                            kind: member_kind,
                            description: clean_description(member.description.as_deref()),
                            private: parent_private || is_private(member.access.as_deref()),
                            is_static: member.scope.as_deref() == Some("static"),
                        });
                    }
                }
            }
        }

        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Case-insensitive lookup by path segments: `["Guild"]` or `["Guild", "members"]`.
    pub fn get(&self, segments: &[&str]) -> Option<&DocNode> {
        match segments {
            [top] => self
                .nodes
                .iter()
                .find(|node| node.kind.is_top_level() && node.name.eq_ignore_ascii_case(top)),
            [top, member] => {
                let parent = self.get(&[*top])?;
                self.nodes.iter().find(|node| {
                    node.parent.as_deref() == Some(parent.name.as_str())
                        && node.name.eq_ignore_ascii_case(member)
                })
            }
            _ => None,
        }
    }

    /// Resolves `Guild#members`, `Guild.fetch()`, `guild members` to exactly one node.
    pub fn resolve_exact(&self, query: &str) -> Option<&DocNode> {
        let segments = query_segments(query);
        if segments.is_empty() {
            return None;
        }
        let borrowed: Vec<&str> = segments.iter().map(String::as_str).collect();
        self.get(&borrowed)
    }

    /// Fuzzy match over formatted names, best first. Private nodes are left out
    /// unless `include_private` is set.
    pub fn search(&self, query: &str, include_private: bool, limit: usize) -> Vec<&DocNode> {
        let segments = query_segments(query);
        if segments.is_empty() || limit == 0 {
            return Vec::new();
        }
        let needle = segments.join("#").to_lowercase();
        let leaf = segments.last().map(|segment| segment.to_lowercase()).unwrap_or_default();

        let mut scored: Vec<(u32, usize, &DocNode)> = self
            .nodes
            .iter()
            .filter(|node| include_private || !node.private)
            .filter_map(|node| {
                let formatted = node.formatted_name().to_lowercase().replace(['.', '('], "#");
                let formatted = formatted.trim_end_matches([')', '#']).to_owned();
                let name = node.name.to_lowercase();
                let score = if formatted == needle {
                    100
                } else if name == leaf {
                    80
                } else if formatted.starts_with(&needle) {
                    60
                } else if name.starts_with(&leaf) {
                    40
                } else if formatted.contains(&needle) {
                    30
                } else if is_subsequence(&needle, &formatted) {
                    10
                } else {
                    return None;
                };
                Some((score, formatted.len(), node))
            })
            .collect();

        // sort_by is stable, so graph order breaks the remaining ties
        scored.sort_by(|left, right| right.0.cmp(&left.0).then_with(|| left.1.cmp(&right.1)));
        scored.into_iter().take(limit).map(|(_, _, node)| node).collect()
    }

    /// Direct members of a top-level node, in declaration order.
    pub fn children_of<'a>(&'a self, parent: &'a DocNode) -> impl Iterator<Item = &'a DocNode> {
        self.nodes
            .iter()
            .filter(move |node| node.parent.as_deref() == Some(parent.name.as_str()))
    }
}

fn query_segments(query: &str) -> Vec<String> {
    query
        .split(|c: char| c == '.' || c == '#' || c.is_whitespace())
        .map(|segment| segment.trim().trim_end_matches("()").trim())
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .collect()
}

fn is_private(access: Option<&str>) -> bool {
    access == Some("private")
}

fn is_subsequence(needle: &str, haystack: &str) -> bool {
    let mut remaining = haystack.chars();
    needle.chars().all(|wanted| remaining.any(|c| c == wanted))
}

/// Turns `{@link Guild}` / `{@link Guild#members members}` into plain text and
/// `<br>` / `<info>` markup into newlines or nothing.
fn clean_description(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };

    let mut cleaned = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("{@link ") {
        cleaned.push_str(&rest[..start]);
        let after = &rest[start + "{@link ".len()..];
        match after.find('}') {
            Some(end) => {
                let inner = after[..end].trim();
                let label = inner.split_once([' ', '|']).map_or(inner, |(_, label)| label.trim());
                cleaned.push_str(label);
                rest = &after[end + 1..];
            }
            None => {
                cleaned.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    cleaned.push_str(rest);

    cleaned
        .replace("<br>", "\n")
        .replace("<info>", "")
        .replace("</info>", "")
        .replace("<warn>", "")
        .replace("</warn>", "")
        .trim()
        .to_owned()
}

#[async_trait]
pub trait GraphSource: Send + Sync {
    async fn fetch_graph(&self, source: &str) -> Result<DocGraph, ProviderError>;
}

#[derive(Clone, Debug)]
pub struct DjsDocsClient {
    http: reqwest::Client,
    url_template: String,
}

impl DjsDocsClient {
    pub fn new(http: reqwest::Client, url_template: impl Into<String>) -> Self {
        Self { http, url_template: url_template.into() }
    }

    pub fn from_config(config: &DocsConfig) -> Result<Self, ProviderError> {
        Ok(Self::new(http_client(config.http_timeout_secs)?, config.djs_docs_url.clone()))
    }
}

#[async_trait]
impl GraphSource for DjsDocsClient {
    async fn fetch_graph(&self, source: &str) -> Result<DocGraph, ProviderError> {
        let url = self.url_template.replace(docbot_core::config::DJS_SOURCE_PLACEHOLDER, source);
        let body = get_ok(&self.http, &url)
            .await?
            .text()
            .await
            .map_err(|error| ProviderError::Request {
                url: url.clone(),
                message: error.to_string(),
            })?;
        DocGraph::from_json(&body)
    }
}

/// Whether a read may be answered from an already-loaded graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchMode {
    /// Use the cached graph when there is one (autocomplete).
    Cached,
    /// Always refetch; fall back to the cached graph if the fetch fails.
    Fresh,
}

pub struct DocGraphStore {
    source: Arc<dyn GraphSource>,
    sources: Vec<String>,
    default_source: String,
    graphs: RwLock<HashMap<String, Arc<DocGraph>>>,
}

impl DocGraphStore {
    pub fn new(source: Arc<dyn GraphSource>, sources: Vec<String>, default_source: String) -> Self {
        Self { source, sources, default_source, graphs: RwLock::new(HashMap::new()) }
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn default_source(&self) -> &str {
        &self.default_source
    }

    pub fn is_known_source(&self, source: &str) -> bool {
        self.sources.iter().any(|known| known == source)
    }

    pub async fn cached_sources(&self) -> usize {
        self.graphs.read().await.len()
    }

    pub async fn get(&self, source: &str, mode: FetchMode) -> Result<Arc<DocGraph>, ProviderError> {
        let cached = self.graphs.read().await.get(source).cloned();
        if mode == FetchMode::Cached {
            if let Some(graph) = cached {
                return Ok(graph);
            }
        }

        match self.source.fetch_graph(source).await {
            Ok(graph) => {
                let graph = Arc::new(graph);
                self.graphs.write().await.insert(source.to_owned(), Arc::clone(&graph));
                info!(
                    event_name = "docs.djs.graph_loaded",
                    source,
                    nodes = graph.len(),
                    "discord.js documentation loaded"
                );
                Ok(graph)
            }
            Err(error) => match cached {
                Some(stale) => {
                    warn!(
                        event_name = "docs.djs.graph_refresh_failed",
                        source,
                        error = %error,
                        "discord.js documentation fetch failed, serving cached graph"
                    );
                    Ok(stale)
                }
                None => {
                    warn!(
                        event_name = "docs.djs.graph_unavailable",
                        source,
                        error = %error,
                        "discord.js documentation fetch failed with nothing cached"
                    );
                    Err(error)
                }
            },
        }
    }
}
