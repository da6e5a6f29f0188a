use std::sync::Arc;
use std::time::Duration;

use docbot_core::config::{AppConfig, ConfigOverrides, LoadOptions, RegisterMode};
use docbot_discord::commands::CommandDefinition;
use docbot_discord::handlers::{default_modules, HandlerDeps};
use docbot_discord::registry::CommandRegistry;
use docbot_docs::mdn::http_client;
use docbot_docs::{DjsDocsClient, DocGraphStore, DocIndexCache, MdnClient};
use secrecy::ExposeSecret;

use crate::commands::CommandResult;

/// One bulk-overwrite request: Discord replaces the whole command set at `url`
/// with `commands`, so an empty list clears it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationPlan {
    pub mode: RegisterMode,
    pub url: String,
    pub commands: Vec<CommandDefinition>,
}

impl RegistrationPlan {
    pub fn body(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(&self.commands)
    }
}

pub fn plan(
    config: &AppConfig,
    definitions: Vec<CommandDefinition>,
) -> Result<RegistrationPlan, String> {
    let mode = config.discord.register_mode;
    let base = config.discord.api_base_url.trim_end_matches('/');
    let application_id = &config.discord.application_id;

    let url = if mode.targets_guild() {
        let guild_id = config
            .discord
            .guild_id
            .as_deref()
            .ok_or_else(|| format!("discord.guild_id is required for `{}`", mode.as_str()))?;
        format!("{base}/applications/{application_id}/guilds/{guild_id}/commands")
    } else {
        format!("{base}/applications/{application_id}/commands")
    };

    let commands = if mode.is_reset() { Vec::new() } else { definitions };
    Ok(RegistrationPlan { mode, url, commands })
}

/// Definitions exactly as the server registers them.
pub fn command_definitions(config: &AppConfig) -> Result<Vec<CommandDefinition>, String> {
    let http = http_client(config.docs.http_timeout_secs).map_err(|error| error.to_string())?;
    let mdn = Arc::new(MdnClient::new(
        http.clone(),
        config.docs.mdn_sitemap_url.clone(),
        config.docs.mdn_base_url.clone(),
    ));
    let deps = HandlerDeps {
        graphs: Arc::new(DocGraphStore::new(
            Arc::new(DjsDocsClient::new(http, config.docs.djs_docs_url.clone())),
            config.docs.djs_sources.clone(),
            config.docs.djs_default_source.clone(),
        )),
        mdn_index: Arc::new(DocIndexCache::new(
            mdn.clone(),
            Duration::from_secs(config.docs.refresh_interval_secs),
        )),
        mdn_pages: mdn,
    };

    let mut registry = CommandRegistry::new();
    let report = registry.load(&default_modules(&deps));
    if !report.skipped_modules.is_empty() {
        let skipped = report.skipped_modules.join(", ");
        return Err(format!("handler modules failed to load: {skipped}"));
    }
    Ok(registry.definitions())
}

pub fn run(mode: Option<RegisterMode>, dry_run: bool) -> CommandResult {
    let options = LoadOptions {
        overrides: ConfigOverrides { register_mode: mode, ..ConfigOverrides::default() },
        ..LoadOptions::default()
    };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "register",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let planned = command_definitions(&config).and_then(|definitions| plan(&config, definitions));
    let plan = match planned {
        Ok(plan) => plan,
        Err(message) => {
            return CommandResult::failure("register", "command_definitions", message, 3);
        }
    };
    let body = match plan.body() {
        Ok(body) => body,
        Err(error) => {
            return CommandResult::failure(
                "register",
                "command_definitions",
                format!("failed to serialize command definitions: {error}"),
                3,
            );
        }
    };

    if dry_run {
        return CommandResult::success("register", describe(&plan, "dry run: would PUT"));
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "register",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    match runtime.block_on(publish(&config, &plan.url, &body)) {
        Ok(()) => CommandResult::success("register", describe(&plan, "published")),
        Err(message) => CommandResult::failure("register", "discord_api", message, 4),
    }
}

async fn publish(config: &AppConfig, url: &str, body: &serde_json::Value) -> Result<(), String> {
    let http = http_client(config.docs.http_timeout_secs).map_err(|error| error.to_string())?;
    let response = http
        .put(url)
        .header(
            reqwest::header::AUTHORIZATION,
            format!("Bot {}", config.discord.token.expose_secret()),
        )
        .json(body)
        .send()
        .await
        .map_err(|error| format!("request to {url} failed: {error}"))?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(format!("discord rejected the command set with {status}: {body}"))
}

fn describe(plan: &RegistrationPlan, verb: &str) -> String {
    let names: Vec<&str> = plan.commands.iter().map(|command| command.name.as_str()).collect();
    let listed = if names.is_empty() { "none".to_string() } else { names.join(", ") };
    format!(
        "{verb} {} commands ({}) to {} [mode {}]",
        plan.commands.len(),
        listed,
        plan.url,
        plan.mode.as_str()
    )
}
