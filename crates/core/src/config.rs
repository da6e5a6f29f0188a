use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DJS_SOURCE_PLACEHOLDER: &str = "{source}";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub discord: DiscordConfig,
    pub docs: DocsConfig,
    pub gateway: GatewayConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    pub token: SecretString,
    pub application_id: String,
    pub guild_id: Option<String>,
    pub register_mode: RegisterMode,
    pub api_base_url: String,
    pub gateway_url: String,
}

#[derive(Clone, Debug)]
pub struct DocsConfig {
    pub mdn_sitemap_url: String,
    pub mdn_base_url: String,
    /// discord.js docs JSON location; `{source}` is replaced by the branch/tag name.
    pub djs_docs_url: String,
    pub djs_sources: Vec<String>,
    pub djs_default_source: String,
    pub refresh_interval_secs: u64,
    pub http_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// How `docbot register` publishes slash-command definitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterMode {
    Global,
    Guild,
    ResetGuild,
    ResetGlobal,
}

impl RegisterMode {
    pub fn targets_guild(self) -> bool {
        matches!(self, Self::Guild | Self::ResetGuild)
    }

    pub fn is_reset(self) -> bool {
        matches!(self, Self::ResetGuild | Self::ResetGlobal)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Guild => "guild",
            Self::ResetGuild => "reset_guild",
            Self::ResetGlobal => "reset_global",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub discord_token: Option<String>,
    pub application_id: Option<String>,
    pub guild_id: Option<String>,
    pub register_mode: Option<RegisterMode>,
    pub mdn_sitemap_url: Option<String>,
    pub djs_docs_url: Option<String>,
    pub refresh_interval_secs: Option<u64>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            discord: DiscordConfig {
                token: String::new().into(),
                application_id: String::new(),
                guild_id: None,
                register_mode: RegisterMode::Global,
                api_base_url: "https://discord.com/api/v10".to_string(),
                gateway_url: "wss://gateway.discord.gg/?v=10&encoding=json".to_string(),
            },
            docs: DocsConfig {
                mdn_sitemap_url: "https://developer.mozilla.org/sitemaps/en-us/sitemap.xml.gz"
                    .to_string(),
                mdn_base_url: "https://developer.mozilla.org/en-US/docs/".to_string(),
                djs_docs_url:
                    "https://raw.githubusercontent.com/discordjs/docs/main/discord.js/{source}.json"
                        .to_string(),
                djs_sources: vec!["stable".to_string(), "main".to_string()],
                djs_default_source: "stable".to_string(),
                refresh_interval_secs: 12 * 60 * 60,
                http_timeout_secs: 15,
            },
            gateway: GatewayConfig { max_retries: 5, base_delay_ms: 1_000, max_delay_ms: 60_000 },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), health_check_port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for RegisterMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "global" => Ok(Self::Global),
            "guild" => Ok(Self::Guild),
            "reset_guild" | "guild_reset" => Ok(Self::ResetGuild),
            "reset_global" | "global_reset" => Ok(Self::ResetGlobal),
            other => Err(ConfigError::Validation(format!(
                "unsupported register mode `{other}` \
                 (expected global|guild|reset_guild|reset_global)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl DocsConfig {
    pub fn djs_url_for(&self, source: &str) -> String {
        self.djs_docs_url.replace(DJS_SOURCE_PLACEHOLDER, source)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("docbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(discord) = patch.discord {
            if let Some(token) = discord.token {
                self.discord.token = secret_value(token);
            }
            if let Some(application_id) = discord.application_id {
                self.discord.application_id = application_id;
            }
            if let Some(guild_id) = discord.guild_id {
                self.discord.guild_id = Some(guild_id);
            }
            if let Some(register_mode) = discord.register_mode {
                self.discord.register_mode = register_mode;
            }
            if let Some(api_base_url) = discord.api_base_url {
                self.discord.api_base_url = api_base_url;
            }
            if let Some(gateway_url) = discord.gateway_url {
                self.discord.gateway_url = gateway_url;
            }
        }

        if let Some(docs) = patch.docs {
            if let Some(mdn_sitemap_url) = docs.mdn_sitemap_url {
                self.docs.mdn_sitemap_url = mdn_sitemap_url;
            }
            if let Some(mdn_base_url) = docs.mdn_base_url {
                self.docs.mdn_base_url = mdn_base_url;
            }
            if let Some(djs_docs_url) = docs.djs_docs_url {
                self.docs.djs_docs_url = djs_docs_url;
            }
            if let Some(djs_sources) = docs.djs_sources {
                self.docs.djs_sources = djs_sources;
            }
            if let Some(djs_default_source) = docs.djs_default_source {
                self.docs.djs_default_source = djs_default_source;
            }
            if let Some(refresh_interval_secs) = docs.refresh_interval_secs {
                self.docs.refresh_interval_secs = refresh_interval_secs;
            }
            if let Some(http_timeout_secs) = docs.http_timeout_secs {
                self.docs.http_timeout_secs = http_timeout_secs;
            }
        }

        if let Some(gateway) = patch.gateway {
            if let Some(max_retries) = gateway.max_retries {
                self.gateway.max_retries = max_retries;
            }
            if let Some(base_delay_ms) = gateway.base_delay_ms {
                self.gateway.base_delay_ms = base_delay_ms;
            }
            if let Some(max_delay_ms) = gateway.max_delay_ms {
                self.gateway.max_delay_ms = max_delay_ms;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("DOCBOT_DISCORD_TOKEN").or_else(|| read_env("DOCBOT_TOKEN")) {
            self.discord.token = secret_value(value);
        }
        if let Some(value) = read_env("DOCBOT_DISCORD_APPLICATION_ID") {
            self.discord.application_id = value;
        }
        if let Some(value) = read_env("DOCBOT_DISCORD_GUILD_ID") {
            self.discord.guild_id = Some(value);
        }
        if let Some(value) = read_env("DOCBOT_REGISTER_MODE") {
            self.discord.register_mode = value.parse()?;
        }
        if let Some(value) = read_env("DOCBOT_DISCORD_API_BASE_URL") {
            self.discord.api_base_url = value;
        }
        if let Some(value) = read_env("DOCBOT_DISCORD_GATEWAY_URL") {
            self.discord.gateway_url = value;
        }

        if let Some(value) = read_env("DOCBOT_DOCS_MDN_SITEMAP_URL") {
            self.docs.mdn_sitemap_url = value;
        }
        if let Some(value) = read_env("DOCBOT_DOCS_MDN_BASE_URL") {
            self.docs.mdn_base_url = value;
        }
        if let Some(value) = read_env("DOCBOT_DOCS_DJS_URL") {
            self.docs.djs_docs_url = value;
        }
        if let Some(value) = read_env("DOCBOT_DOCS_DJS_SOURCES") {
            self.docs.djs_sources = value
                .split(',')
                .map(str::trim)
                .filter(|source| !source.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = read_env("DOCBOT_DOCS_DJS_DEFAULT_SOURCE") {
            self.docs.djs_default_source = value;
        }
        if let Some(value) = read_env("DOCBOT_DOCS_REFRESH_INTERVAL_SECS") {
            self.docs.refresh_interval_secs =
                parse_u64("DOCBOT_DOCS_REFRESH_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("DOCBOT_DOCS_HTTP_TIMEOUT_SECS") {
            self.docs.http_timeout_secs = parse_u64("DOCBOT_DOCS_HTTP_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DOCBOT_GATEWAY_MAX_RETRIES") {
            self.gateway.max_retries = parse_u32("DOCBOT_GATEWAY_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("DOCBOT_GATEWAY_BASE_DELAY_MS") {
            self.gateway.base_delay_ms = parse_u64("DOCBOT_GATEWAY_BASE_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("DOCBOT_GATEWAY_MAX_DELAY_MS") {
            self.gateway.max_delay_ms = parse_u64("DOCBOT_GATEWAY_MAX_DELAY_MS", &value)?;
        }

        if let Some(value) = read_env("DOCBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("DOCBOT_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("DOCBOT_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        let log_level = read_env("DOCBOT_LOGGING_LEVEL").or_else(|| read_env("DOCBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("DOCBOT_LOGGING_FORMAT").or_else(|| read_env("DOCBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(discord_token) = overrides.discord_token {
            self.discord.token = secret_value(discord_token);
        }
        if let Some(application_id) = overrides.application_id {
            self.discord.application_id = application_id;
        }
        if let Some(guild_id) = overrides.guild_id {
            self.discord.guild_id = Some(guild_id);
        }
        if let Some(register_mode) = overrides.register_mode {
            self.discord.register_mode = register_mode;
        }
        if let Some(mdn_sitemap_url) = overrides.mdn_sitemap_url {
            self.docs.mdn_sitemap_url = mdn_sitemap_url;
        }
        if let Some(djs_docs_url) = overrides.djs_docs_url {
            self.docs.djs_docs_url = djs_docs_url;
        }
        if let Some(refresh_interval_secs) = overrides.refresh_interval_secs {
            self.docs.refresh_interval_secs = refresh_interval_secs;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_discord(&self.discord)?;
        validate_docs(&self.docs)?;
        validate_gateway(&self.gateway)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("docbot.toml"), PathBuf::from("config/docbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

pub fn config_file_candidates() -> [PathBuf; 2] {
    [PathBuf::from("docbot.toml"), PathBuf::from("config/docbot.toml")]
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_snowflake(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit())
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_discord(discord: &DiscordConfig) -> Result<(), ConfigError> {
    let token = discord.token.expose_secret();
    if token.trim().is_empty() {
        return Err(ConfigError::Validation(
            concat!(
                "discord.token is required. Get it from ",
                "https://discord.com/developers/applications > Your App > Bot > Token"
            )
            .to_string(),
        ));
    }
    if token.starts_with("Bot ") {
        return Err(ConfigError::Validation(
            "discord.token must be the raw bot token (hint: drop the `Bot ` prefix)".to_string(),
        ));
    }

    if !is_snowflake(&discord.application_id) {
        return Err(ConfigError::Validation(
            "discord.application_id is required and must be a numeric snowflake".to_string(),
        ));
    }

    match &discord.guild_id {
        Some(guild_id) if !is_snowflake(guild_id) => {
            return Err(ConfigError::Validation(
                "discord.guild_id must be a numeric snowflake".to_string(),
            ));
        }
        None if discord.register_mode.targets_guild() => {
            return Err(ConfigError::Validation(format!(
                "discord.guild_id is required when register_mode is `{}`",
                discord.register_mode.as_str()
            )));
        }
        _ => {}
    }

    if !is_http_url(&discord.api_base_url) {
        return Err(ConfigError::Validation(
            "discord.api_base_url must start with http:// or https://".to_string(),
        ));
    }
    if !discord.gateway_url.starts_with("wss://") && !discord.gateway_url.starts_with("ws://") {
        return Err(ConfigError::Validation(
            "discord.gateway_url must start with wss:// or ws://".to_string(),
        ));
    }

    Ok(())
}

fn validate_docs(docs: &DocsConfig) -> Result<(), ConfigError> {
    for (key, url) in [
        ("docs.mdn_sitemap_url", &docs.mdn_sitemap_url),
        ("docs.mdn_base_url", &docs.mdn_base_url),
        ("docs.djs_docs_url", &docs.djs_docs_url),
    ] {
        if !is_http_url(url) {
            return Err(ConfigError::Validation(format!(
                "{key} must start with http:// or https://"
            )));
        }
    }

    if !docs.djs_docs_url.contains(DJS_SOURCE_PLACEHOLDER) {
        return Err(ConfigError::Validation(format!(
            "docs.djs_docs_url must contain the `{DJS_SOURCE_PLACEHOLDER}` placeholder"
        )));
    }

    if docs.djs_sources.is_empty() {
        return Err(ConfigError::Validation(
            "docs.djs_sources must list at least one source".to_string(),
        ));
    }
    if !docs.djs_sources.contains(&docs.djs_default_source) {
        return Err(ConfigError::Validation(format!(
            "docs.djs_default_source `{}` is not listed in docs.djs_sources",
            docs.djs_default_source
        )));
    }

    if docs.refresh_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "docs.refresh_interval_secs must be greater than zero".to_string(),
        ));
    }

    if docs.http_timeout_secs == 0 || docs.http_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "docs.http_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_gateway(gateway: &GatewayConfig) -> Result<(), ConfigError> {
    if gateway.max_delay_ms < gateway.base_delay_ms {
        return Err(ConfigError::Validation(
            "gateway.max_delay_ms must be at least gateway.base_delay_ms".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    discord: Option<DiscordPatch>,
    docs: Option<DocsPatch>,
    gateway: Option<GatewayPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscordPatch {
    token: Option<String>,
    application_id: Option<String>,
    guild_id: Option<String>,
    register_mode: Option<RegisterMode>,
    api_base_url: Option<String>,
    gateway_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DocsPatch {
    mdn_sitemap_url: Option<String>,
    mdn_base_url: Option<String>,
    djs_docs_url: Option<String>,
    djs_sources: Option<Vec<String>>,
    djs_default_source: Option<String>,
    refresh_interval_secs: Option<u64>,
    http_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayPatch {
    max_retries: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
