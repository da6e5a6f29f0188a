use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use docbot_core::config::{config_file_candidates, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    render(&config, config_file_doc.as_ref(), config_file_path.as_deref())
}

pub fn render(
    config: &AppConfig,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let discord = &config.discord;
    let docs = &config.docs;
    let rows = [
        row(
            "discord.token",
            redact_token(discord.token.expose_secret()),
            &["DOCBOT_DISCORD_TOKEN", "DOCBOT_TOKEN"],
        ),
        row(
            "discord.application_id",
            discord.application_id.clone(),
            &["DOCBOT_DISCORD_APPLICATION_ID"],
        ),
        row(
            "discord.guild_id",
            discord.guild_id.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["DOCBOT_DISCORD_GUILD_ID"],
        ),
        row(
            "discord.register_mode",
            discord.register_mode.as_str().to_string(),
            &["DOCBOT_REGISTER_MODE"],
        ),
        row("discord.api_base_url", discord.api_base_url.clone(), &["DOCBOT_DISCORD_API_BASE_URL"]),
        row("discord.gateway_url", discord.gateway_url.clone(), &["DOCBOT_DISCORD_GATEWAY_URL"]),
        row("docs.mdn_sitemap_url", docs.mdn_sitemap_url.clone(), &["DOCBOT_DOCS_MDN_SITEMAP_URL"]),
        row("docs.mdn_base_url", docs.mdn_base_url.clone(), &["DOCBOT_DOCS_MDN_BASE_URL"]),
        row("docs.djs_docs_url", docs.djs_docs_url.clone(), &["DOCBOT_DOCS_DJS_URL"]),
        row("docs.djs_sources", docs.djs_sources.join(","), &["DOCBOT_DOCS_DJS_SOURCES"]),
        row(
            "docs.djs_default_source",
            docs.djs_default_source.clone(),
            &["DOCBOT_DOCS_DJS_DEFAULT_SOURCE"],
        ),
        row(
            "docs.refresh_interval_secs",
            docs.refresh_interval_secs.to_string(),
            &["DOCBOT_DOCS_REFRESH_INTERVAL_SECS"],
        ),
        row(
            "docs.http_timeout_secs",
            docs.http_timeout_secs.to_string(),
            &["DOCBOT_DOCS_HTTP_TIMEOUT_SECS"],
        ),
        row(
            "gateway.max_retries",
            config.gateway.max_retries.to_string(),
            &["DOCBOT_GATEWAY_MAX_RETRIES"],
        ),
        row(
            "gateway.base_delay_ms",
            config.gateway.base_delay_ms.to_string(),
            &["DOCBOT_GATEWAY_BASE_DELAY_MS"],
        ),
        row(
            "gateway.max_delay_ms",
            config.gateway.max_delay_ms.to_string(),
            &["DOCBOT_GATEWAY_MAX_DELAY_MS"],
        ),
        row(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["DOCBOT_SERVER_BIND_ADDRESS"],
        ),
        row(
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            &["DOCBOT_SERVER_HEALTH_CHECK_PORT"],
        ),
        row(
            "logging.level",
            config.logging.level.clone(),
            &["DOCBOT_LOGGING_LEVEL", "DOCBOT_LOG_LEVEL"],
        ),
        row(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["DOCBOT_LOGGING_FORMAT", "DOCBOT_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for row in rows {
        let source = field_source(row.key, row.env_keys, config_file_doc, config_file_path);
        lines.push(render_line(row.key, &row.value, source));
    }
    lines.join("\n")
}

struct Row {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn row(key: &'static str, value: String, env_keys: &'static [&'static str]) -> Row {
    Row { key, value, env_keys }
}

fn detect_config_path() -> Option<PathBuf> {
    config_file_candidates().into_iter().find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Bot tokens are three dot-separated parts; the first is the base64 bot id and
/// is safe to show.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('.') {
        return format!("{prefix}.***");
    }

    "<redacted>".to_string()
}
