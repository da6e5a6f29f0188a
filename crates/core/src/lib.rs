pub mod config;
pub mod cooldown;
pub mod custom_id;
pub mod errors;
pub mod permissions;

pub use config::{AppConfig, ConfigError, LoadOptions, LogFormat, RegisterMode};
pub use cooldown::{format_remaining, CooldownDecision, CooldownTracker};
pub use custom_id::{CustomId, CustomIdError};
pub use errors::{HandlerError, InterfaceError, ProviderError};
pub use permissions::{DenyReason, GateDecision, GateLocation, Permissions, Requirements};
