use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docbot_core::errors::HandlerError;
use docbot_core::permissions::Requirements;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::commands::{CommandDefinition, DefinitionError};
use crate::components::{AutocompleteChoice, MessagePayload};
use crate::events::{FocusedOption, InteractionContext};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    SlashCommand,
    Button,
    SelectMenu,
    Autocomplete,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::SlashCommand => "slash_command",
            Self::Button => "button",
            Self::SelectMenu => "select_menu",
            Self::Autocomplete => "autocomplete",
        };
        f.write_str(label)
    }
}

/// What a handler wants sent back once it has finished.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerReply {
    /// Replace the deferred placeholder.
    Edit(MessagePayload),
    /// Replace the placeholder, then post a follow-up message.
    EditAndFollowUp { edit: MessagePayload, follow_up: MessagePayload },
    /// Short text visible only to the invoking user.
    Notice(String),
    DeleteMessage { channel_id: String, message_id: String },
    Nothing,
}

#[async_trait]
pub trait InteractionHandler: Send + Sync {
    async fn run(&self, ctx: &InteractionContext) -> Result<HandlerReply, HandlerError>;
}

#[async_trait]
pub trait AutocompleteHandler: Send + Sync {
    async fn suggest(
        &self,
        ctx: &InteractionContext,
        focused: &FocusedOption,
    ) -> Result<Vec<AutocompleteChoice>, HandlerError>;
}

#[derive(Clone)]
pub enum HandlerAction {
    Interaction(Arc<dyn InteractionHandler>),
    Autocomplete(Arc<dyn AutocompleteHandler>),
}

impl fmt::Debug for HandlerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interaction(_) => f.write_str("Interaction(..)"),
            Self::Autocomplete(_) => f.write_str("Autocomplete(..)"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct HandlerEntry {
    pub identifier: String,
    pub requirements: Requirements,
    pub cooldown: Option<Duration>,
    pub action: HandlerAction,
    pub definition: Option<CommandDefinition>,
}

impl HandlerEntry {
    pub fn interaction(
        identifier: impl Into<String>,
        handler: Arc<dyn InteractionHandler>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            requirements: Requirements::none(),
            cooldown: None,
            action: HandlerAction::Interaction(handler),
            definition: None,
        }
    }

    /// A slash command entry; its identifier is the definition's name.
    pub fn command(definition: CommandDefinition, handler: Arc<dyn InteractionHandler>) -> Self {
        let mut entry = Self::interaction(definition.name.clone(), handler);
        entry.definition = Some(definition);
        entry
    }

    pub fn autocomplete(command: &str, field: &str, handler: Arc<dyn AutocompleteHandler>) -> Self {
        Self {
            identifier: autocomplete_key(command, field),
            requirements: Requirements::none(),
            cooldown: None,
            action: HandlerAction::Autocomplete(handler),
            definition: None,
        }
    }

    pub fn requirements(mut self, requirements: Requirements) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }
}

pub fn autocomplete_key(command: &str, field: &str) -> String {
    format!("{command}/{field}")
}

/// Everything one handler module contributes to the registry.
#[derive(Default)]
pub struct ModuleExports {
    pub slash_command: Option<HandlerEntry>,
    pub buttons: Vec<HandlerEntry>,
    pub select_menus: Vec<HandlerEntry>,
    pub autocomplete: Vec<HandlerEntry>,
}

impl ModuleExports {
    fn into_entries(self) -> Vec<(HandlerKind, HandlerEntry)> {
        let mut entries = Vec::new();
        if let Some(command) = self.slash_command {
            entries.push((HandlerKind::SlashCommand, command));
        }
        entries.extend(self.buttons.into_iter().map(|entry| (HandlerKind::Button, entry)));
        entries.extend(self.select_menus.into_iter().map(|entry| (HandlerKind::SelectMenu, entry)));
        entries.extend(
            self.autocomplete.into_iter().map(|entry| (HandlerKind::Autocomplete, entry)),
        );
        entries
    }
}

pub trait HandlerModule: Send + Sync {
    fn name(&self) -> &str;
    fn exports(&self) -> Result<ModuleExports, RegistryError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("module `{module}` failed to export handlers: {reason}")]
    Export { module: String, reason: String },
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error("slash command `{0}` has no definition")]
    MissingDefinition(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded_modules: Vec<String>,
    pub skipped_modules: Vec<String>,
    pub entries: usize,
}

#[derive(Default)]
pub struct CommandRegistry {
    entries: HashMap<(HandlerKind, String), Arc<HandlerEntry>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `entry`, replacing whatever was registered under the same kind and identifier.
    pub fn register(&mut self, kind: HandlerKind, entry: HandlerEntry) {
        let key = (kind, entry.identifier.clone());
        if self.entries.insert(key, Arc::new(entry)).is_some() {
            debug!(
                event_name = "registry.entry_replaced",
                kind = %kind,
                "handler registration replaced an earlier entry"
            );
        }
    }

    pub fn lookup(&self, kind: HandlerKind, identifier: &str) -> Option<Arc<HandlerEntry>> {
        self.entries.get(&(kind, identifier.to_owned())).cloned()
    }

    /// Registers every module's exports. A module whose exports fail, or whose
    /// slash command definition is invalid, is skipped as a whole.
    pub fn load(&mut self, modules: &[Arc<dyn HandlerModule>]) -> LoadReport {
        let mut report = LoadReport::default();

        for module in modules {
            match checked_exports(module.as_ref()) {
                Ok(entries) => {
                    report.entries += entries.len();
                    for (kind, entry) in entries {
                        self.register(kind, entry);
                    }
                    report.loaded_modules.push(module.name().to_owned());
                }
                Err(error) => {
                    warn!(
                        event_name = "registry.module_skipped",
                        module = module.name(),
                        error = %error,
                        "handler module failed to load; continuing without it"
                    );
                    report.skipped_modules.push(module.name().to_owned());
                }
            }
        }

        info!(
            event_name = "registry.loaded",
            modules = report.loaded_modules.len(),
            skipped = report.skipped_modules.len(),
            entries = report.entries,
            "command registry loaded"
        );
        report
    }

    /// Slash-command definitions ordered by name.
    pub fn definitions(&self) -> Vec<CommandDefinition> {
        let mut definitions: Vec<CommandDefinition> = self
            .entries
            .iter()
            .filter(|((kind, _), _)| *kind == HandlerKind::SlashCommand)
            .filter_map(|(_, entry)| entry.definition.clone())
            .collect();
        definitions.sort_by(|left, right| left.name.cmp(&right.name));
        definitions
    }

    pub fn count(&self, kind: HandlerKind) -> usize {
        self.entries.keys().filter(|(entry_kind, _)| *entry_kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn checked_exports(
    module: &dyn HandlerModule,
) -> Result<Vec<(HandlerKind, HandlerEntry)>, RegistryError> {
    let exports = module.exports()?;
    if let Some(command) = &exports.slash_command {
        let definition = command
            .definition
            .as_ref()
            .ok_or_else(|| RegistryError::MissingDefinition(command.identifier.clone()))?;
        definition.validate()?;
    }
    Ok(exports.into_entries())
}
