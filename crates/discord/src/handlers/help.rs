use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docbot_core::errors::HandlerError;
use docbot_core::permissions::{Permissions, Requirements};

use crate::commands::{CommandDefinition, CommandOptionDefinition, OptionType};
use crate::components::{Embed, MessagePayload};
use crate::events::InteractionContext;
use crate::registry::{
    HandlerEntry, HandlerModule, HandlerReply, InteractionHandler, ModuleExports, RegistryError,
};

pub const COMMAND: &str = "help";

const HELP_COLOR: u32 = 0x2296F3;
const COOLDOWN: Duration = Duration::from_secs(2);

pub struct HelpModule {
    catalog: Arc<Vec<CommandDefinition>>,
}

impl HelpModule {
    /// `others` are the definitions of every other command; help adds its own.
    pub fn new(others: Vec<CommandDefinition>) -> Self {
        let mut catalog = others;
        catalog.push(definition(&catalog));
        Self { catalog: Arc::new(catalog) }
    }
}

fn definition(others: &[CommandDefinition]) -> CommandDefinition {
    let mut command =
        CommandOptionDefinition::new(OptionType::String, "command", "Command to describe");
    for other in others.iter().take(24) {
        command = command.choice(other.name.as_str(), other.name.as_str());
    }
    command = command.choice(COMMAND, COMMAND);

    CommandDefinition::new(COMMAND, "List the available commands or describe one of them")
        .option(command)
}

impl HandlerModule for HelpModule {
    fn name(&self) -> &str {
        COMMAND
    }

    fn exports(&self) -> Result<ModuleExports, RegistryError> {
        let definition = self
            .catalog
            .iter()
            .find(|definition| definition.name == COMMAND)
            .cloned()
            .ok_or_else(|| RegistryError::MissingDefinition(COMMAND.to_owned()))?;

        let command = Arc::new(HelpCommand { catalog: Arc::clone(&self.catalog) });
        Ok(ModuleExports {
            slash_command: Some(
                HandlerEntry::command(definition, command)
                    .requirements(Requirements::none().bot(Permissions::EMBED_LINKS))
                    .cooldown(COOLDOWN),
            ),
            ..ModuleExports::default()
        })
    }
}

struct HelpCommand {
    catalog: Arc<Vec<CommandDefinition>>,
}

#[async_trait]
impl InteractionHandler for HelpCommand {
    async fn run(&self, ctx: &InteractionContext) -> Result<HandlerReply, HandlerError> {
        let requested = ctx.options().and_then(|options| options.get_str("command"));

        let embed = match requested {
            None => overview(&self.catalog),
            Some(name) => {
                let name = name.trim_start_matches('/');
                let found = self
                    .catalog
                    .iter()
                    .find(|definition| definition.name.eq_ignore_ascii_case(name));
                match found {
                    Some(definition) => details(definition),
                    None => return Ok(HandlerReply::Notice(format!("Unknown command `{name}`"))),
                }
            }
        };

        Ok(HandlerReply::Edit(MessagePayload::new().embed(embed)))
    }
}

fn overview(catalog: &[CommandDefinition]) -> Embed {
    let mut sorted: Vec<&CommandDefinition> = catalog.iter().collect();
    sorted.sort_by(|left, right| left.name.cmp(&right.name));

    let embed = Embed::new()
        .color(HELP_COLOR)
        .title("Commands")
        .description("For additional info on a command, use `/help <command>`");
    sorted.into_iter().fold(embed, |embed, definition| {
        embed.field(format!("`{}`", definition.usage()), &definition.description, false)
    })
}

fn details(definition: &CommandDefinition) -> Embed {
    let options: Vec<String> = definition
        .options
        .iter()
        .map(|option| {
            let required = if option.required { " (required)" } else { "" };
            format!("`{}` - {}{required}", option.name, option.description)
        })
        .collect();

    let mut embed = Embed::new()
        .color(HELP_COLOR)
        .title(definition.usage())
        .field("Description", &definition.description, false);
    if !options.is_empty() {
        embed = embed.field("Options", options.join("\n"), false);
    }
    let direct_messages = if definition.dm_permission { "Allowed" } else { "Server only" };
    embed.field("Direct messages", direct_messages, true)
}
