use std::sync::Arc;
use std::time::Duration;

use docbot_core::config::{AppConfig, ConfigError, LoadOptions};
use docbot_core::cooldown::CooldownTracker;
use docbot_core::errors::ProviderError;
use docbot_discord::dispatcher::InteractionDispatcher;
use docbot_discord::gateway::{GatewayRunner, ReconnectPolicy};
use docbot_discord::handlers::{default_modules, HandlerDeps};
use docbot_discord::registry::CommandRegistry;
use docbot_discord::responder::HttpResponder;
use docbot_discord::websocket::WebSocketGateway;
use docbot_docs::mdn::http_client;
use docbot_docs::{DjsDocsClient, DocGraphStore, DocIndexCache, MdnClient};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub dispatcher: Arc<InteractionDispatcher>,
    pub graphs: Arc<DocGraphStore>,
    pub mdn_index: Arc<DocIndexCache>,
    pub gateway_runner: GatewayRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("http client setup failed: {0}")]
    HttpClient(#[source] ProviderError),
    #[error("no handler module could be loaded")]
    EmptyRegistry,
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let docs_http =
        http_client(config.docs.http_timeout_secs).map_err(BootstrapError::HttpClient)?;
    let mdn = Arc::new(MdnClient::new(
        docs_http.clone(),
        config.docs.mdn_sitemap_url.clone(),
        config.docs.mdn_base_url.clone(),
    ));
    let graphs = Arc::new(DocGraphStore::new(
        Arc::new(DjsDocsClient::new(docs_http, config.docs.djs_docs_url.clone())),
        config.docs.djs_sources.clone(),
        config.docs.djs_default_source.clone(),
    ));
    let refresh_interval = Duration::from_secs(config.docs.refresh_interval_secs);
    let mdn_index = Arc::new(DocIndexCache::new(mdn.clone(), refresh_interval));

    let deps = HandlerDeps {
        graphs: Arc::clone(&graphs),
        mdn_index: Arc::clone(&mdn_index),
        mdn_pages: mdn,
    };
    let mut registry = CommandRegistry::new();
    let report = registry.load(&default_modules(&deps));
    if report.loaded_modules.is_empty() {
        return Err(BootstrapError::EmptyRegistry);
    }
    info!(
        event_name = "system.bootstrap.registry_loaded",
        correlation_id = "bootstrap",
        modules = ?report.loaded_modules,
        skipped = ?report.skipped_modules,
        "command registry ready"
    );

    let reply_http = reply_client(config.docs.http_timeout_secs)?;
    let responder = Arc::new(HttpResponder::new(
        reply_http,
        config.discord.api_base_url.clone(),
        config.discord.token.clone(),
    ));
    let dispatcher = Arc::new(InteractionDispatcher::new(
        Arc::new(registry),
        Arc::new(CooldownTracker::new()),
        responder,
    ));

    let transport = Arc::new(WebSocketGateway::new(
        config.discord.gateway_url.clone(),
        config.discord.token.clone(),
    ));
    let gateway_runner = GatewayRunner::new(
        transport,
        Arc::clone(&dispatcher),
        ReconnectPolicy::from(&config.gateway),
    );

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        "application bootstrap complete"
    );

    Ok(Application { config, dispatcher, graphs, mdn_index, gateway_runner })
}

fn reply_client(timeout_secs: u64) -> Result<reqwest::Client, BootstrapError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("docbot/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|error| {
            BootstrapError::HttpClient(ProviderError::Request {
                url: String::new(),
                message: error.to_string(),
            })
        })
}
