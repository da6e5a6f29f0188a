use std::time::Duration;

use async_trait::async_trait;
use docbot_core::config::DocsConfig;
use docbot_core::errors::ProviderError;
use serde::Deserialize;
use tracing::debug;

use crate::sitemap::{decompress, parse_sitemap, CatalogEntry, CatalogSource};

/// Summary of a single MDN page, enough to render an embed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MdnPage {
    pub title: String,
    pub url: String,
    pub summary: String,
}

#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, path: &str) -> Result<MdnPage, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct PageEnvelope {
    doc: PageDocument,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageDocument {
    #[serde(default)]
    page_title: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "mdn_url")]
    mdn_url: String,
    #[serde(default)]
    summary: String,
}

#[derive(Clone, Debug)]
pub struct MdnClient {
    http: reqwest::Client,
    sitemap_url: String,
    base_url: String,
}

impl MdnClient {
    pub fn new(
        http: reqwest::Client,
        sitemap_url: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self { http, sitemap_url: sitemap_url.into(), base_url: base_url.into() }
    }

    pub fn from_config(config: &DocsConfig) -> Result<Self, ProviderError> {
        let http = http_client(config.http_timeout_secs)?;
        Ok(Self::new(http, config.mdn_sitemap_url.clone(), config.mdn_base_url.clone()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn page_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    fn origin(&self) -> String {
        origin_of(&self.base_url)
    }
}

pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("docbot/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|error| ProviderError::Request { url: String::new(), message: error.to_string() })
}

pub(crate) async fn get_ok(
    http: &reqwest::Client,
    url: &str,
) -> Result<reqwest::Response, ProviderError> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|error| ProviderError::Request {
            url: url.to_owned(),
            message: error.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status { url: url.to_owned(), status: status.as_u16() });
    }
    Ok(response)
}

/// `https://developer.mozilla.org/en-US/docs/` -> `https://developer.mozilla.org`
fn origin_of(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.origin().ascii_serialization(),
        Err(_) => url.trim_end_matches('/').to_owned(),
    }
}

#[async_trait]
impl CatalogSource for MdnClient {
    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, ProviderError> {
        let response = get_ok(&self.http, &self.sitemap_url).await?;
        let body = response.bytes().await.map_err(|error| ProviderError::Request {
            url: self.sitemap_url.clone(),
            message: error.to_string(),
        })?;

        debug!(
            event_name = "docs.mdn.sitemap_downloaded",
            bytes = body.len(),
            "downloaded MDN sitemap"
        );

        let xml = decompress(&body)?;
        parse_sitemap(&xml, &self.base_url)
    }
}

#[async_trait]
impl PageSource for MdnClient {
    async fn fetch_page(&self, path: &str) -> Result<MdnPage, ProviderError> {
        let url = format!("{}/index.json", self.page_url(path).trim_end_matches('/'));
        let response = get_ok(&self.http, &url).await?;
        let envelope: PageEnvelope = response
            .json()
            .await
            .map_err(|error| ProviderError::Parse(format!("{url}: {error}")))?;

        Ok(page_from_document(&self.origin(), path, envelope.doc))
    }
}

fn page_from_document(origin: &str, path: &str, doc: PageDocument) -> MdnPage {
    let title = doc.page_title.or(doc.title).unwrap_or_else(|| path.replace(['_', '-'], " "));
    let url = if doc.mdn_url.starts_with("http") {
        doc.mdn_url
    } else {
        format!("{origin}/{}", doc.mdn_url.trim_start_matches('/'))
    };
    MdnPage { title, url, summary: doc.summary }
}
