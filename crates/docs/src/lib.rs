//! Documentation providers for docbot
//!
//! - **MDN** (`sitemap`, `cache`, `mdn`) - gzip sitemap catalog, refreshable
//!   search index with stale-on-failure semantics, page summaries
//! - **discord.js** (`graph`) - per-source documentation graph with exact
//!   resolution and fuzzy search
//!
//! Both providers are reached through traits (`CatalogSource`, `PageSource`,
//! `GraphSource`) so tests can swap in in-memory fakes.

pub mod cache;
pub mod graph;
pub mod index;
pub mod mdn;
pub mod sitemap;
pub mod tokenizer;

pub use cache::{DocIndexCache, DocIndexSnapshot};
pub use graph::{DjsDocsClient, DocGraph, DocGraphStore, DocNode, FetchMode, GraphSource, NodeKind};
pub use index::SearchIndex;
pub use mdn::{MdnClient, MdnPage, PageSource};
pub use sitemap::{CatalogEntry, CatalogSource};
