use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docbot_core::custom_id::CustomId;
use docbot_core::errors::HandlerError;
use docbot_core::permissions::{Permissions, Requirements};
use docbot_docs::{DocGraph, DocGraphStore, DocNode, FetchMode, NodeKind};
use tracing::warn;

use super::component_error;
use crate::commands::{CommandDefinition, CommandOptionDefinition, OptionType};
use crate::components::{
    documentation_message, sent_confirmation, ActionRow, AutocompleteChoice, Embed, MessagePayload,
    SelectMenu, SelectOption, AUTOCOMPLETE_CHOICE_LIMIT, SELECT_OPTION_LIMIT,
};
use crate::events::{FocusedOption, InteractionContext};
use crate::registry::{
    AutocompleteHandler, HandlerEntry, HandlerModule, HandlerReply, InteractionHandler,
    ModuleExports, RegistryError,
};

pub const COMMAND: &str = "djs";
pub const SELECT_PREFIX: &str = "djsselect";

const DJS_COLOR: u32 = 0x2296F3;
const DJS_ICON_URL: &str = "https://discord.js.org/favicon.ico";
const COOLDOWN: Duration = Duration::from_secs(3);

pub struct DjsModule {
    graphs: Arc<DocGraphStore>,
}

impl DjsModule {
    pub fn new(graphs: Arc<DocGraphStore>) -> Self {
        Self { graphs }
    }

    fn definition(&self) -> CommandDefinition {
        let mut source = CommandOptionDefinition::new(
            OptionType::String,
            "source",
            format!("Documentation source, defaults to {}", self.graphs.default_source()),
        );
        for name in self.graphs.sources() {
            source = source.choice(name.as_str(), name.as_str());
        }

        let query = CommandOptionDefinition::new(
            OptionType::String,
            "query",
            "Class or member, e.g. Guild#members",
        );

        CommandDefinition::new(COMMAND, "Search the discord.js documentation")
            .option(query.required().autocomplete())
            .option(source)
            .option(CommandOptionDefinition::new(
                OptionType::Boolean,
                "private",
                "Include private members in the results",
            ))
            .guild_only()
    }
}

impl HandlerModule for DjsModule {
    fn name(&self) -> &str {
        COMMAND
    }

    fn exports(&self) -> Result<ModuleExports, RegistryError> {
        let requirements = Requirements::none().bot(Permissions::EMBED_LINKS).guild_only();
        let graphs = Arc::clone(&self.graphs);
        let command = Arc::new(DjsCommand { graphs: Arc::clone(&graphs) });

        Ok(ModuleExports {
            slash_command: Some(
                HandlerEntry::command(self.definition(), command)
                    .requirements(requirements)
                    .cooldown(COOLDOWN),
            ),
            select_menus: vec![HandlerEntry::interaction(
                SELECT_PREFIX,
                Arc::new(DjsSelect { graphs: Arc::clone(&graphs) }),
            )
            .requirements(requirements)],
            autocomplete: vec![HandlerEntry::autocomplete(
                COMMAND,
                "query",
                Arc::new(DjsAutocomplete { graphs }),
            )],
            ..ModuleExports::default()
        })
    }
}

struct DjsCommand {
    graphs: Arc<DocGraphStore>,
}

#[async_trait]
impl InteractionHandler for DjsCommand {
    async fn run(&self, ctx: &InteractionContext) -> Result<HandlerReply, HandlerError> {
        let options = ctx
            .options()
            .ok_or_else(|| HandlerError::InvalidInput("command options".to_owned()))?;
        let query = options
            .get_str("query")
            .ok_or_else(|| HandlerError::MissingOption("query".to_owned()))?;
        let source = options.get_str("source").unwrap_or(self.graphs.default_source());
        let include_private = options.get_bool("private").unwrap_or(false);

        if !self.graphs.is_known_source(source) {
            return Ok(HandlerReply::Notice(format!("Unknown documentation source `{source}`")));
        }

        let graph = match self.graphs.get(source, FetchMode::Fresh).await {
            Ok(graph) => graph,
            Err(error) => return Ok(fetch_failed(source, &error.to_string())),
        };

        if let Some(node) = visible_exact(&graph, query, include_private) {
            return documentation_reply(&graph, node, source, &ctx.actor.id);
        }

        let hits = graph.search(query, include_private, SELECT_OPTION_LIMIT);
        if hits.is_empty() {
            return Ok(HandlerReply::Notice(format!("No results found for `{query}`")));
        }

        let custom_id = CustomId::new(SELECT_PREFIX)
            .param(source)
            .param(include_private.to_string())
            .param(ctx.actor.id.as_str());
        let mut menu = SelectMenu::new(&custom_id)
            .map_err(component_error)?
            .placeholder("Select documentation to send");
        for node in &hits {
            let name = node.formatted_name();
            let option = SelectOption::new(&name, &name).description(first_line(&node.description));
            menu = menu.option(option);
        }

        Ok(HandlerReply::Edit(
            MessagePayload::text(format!("Found {} results for `{query}`", hits.len()))
                .row(ActionRow::new().select_menu(menu)),
        ))
    }
}

struct DjsSelect {
    graphs: Arc<DocGraphStore>,
}

#[async_trait]
impl InteractionHandler for DjsSelect {
    async fn run(&self, ctx: &InteractionContext) -> Result<HandlerReply, HandlerError> {
        let custom_id =
            ctx.custom_id().ok_or_else(|| HandlerError::InvalidInput("custom id".to_owned()))?;
        let (Some(source), Some(include_private), Some(owner)) =
            (custom_id.get(0), custom_id.get(1), custom_id.get(2))
        else {
            return Err(HandlerError::InvalidInput(format!("malformed menu id `{custom_id}`")));
        };
        let selected = ctx
            .selected_values()
            .first()
            .ok_or_else(|| HandlerError::InvalidInput("no menu value selected".to_owned()))?;

        let graph = match self.graphs.get(source, FetchMode::Fresh).await {
            Ok(graph) => graph,
            Err(error) => return Ok(fetch_failed(source, &error.to_string())),
        };

        match visible_exact(&graph, selected, include_private == "true") {
            Some(node) => documentation_reply(&graph, node, source, owner),
            None => Ok(HandlerReply::Notice(format!(
                "Couldn't find `{selected}` in the {source} docs"
            ))),
        }
    }
}

struct DjsAutocomplete {
    graphs: Arc<DocGraphStore>,
}

#[async_trait]
impl AutocompleteHandler for DjsAutocomplete {
    async fn suggest(
        &self,
        ctx: &InteractionContext,
        focused: &FocusedOption,
    ) -> Result<Vec<AutocompleteChoice>, HandlerError> {
        let query = focused.value.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let source = ctx
            .options()
            .and_then(|options| options.get_str("source"))
            .filter(|source| self.graphs.is_known_source(source))
            .unwrap_or(self.graphs.default_source());

        let graph = self.graphs.get(source, FetchMode::Cached).await?;
        if let Some(node) = graph.resolve_exact(query) {
            return Ok(vec![AutocompleteChoice::same(node.formatted_name())]);
        }

        Ok(graph
            .search(query, true, AUTOCOMPLETE_CHOICE_LIMIT)
            .into_iter()
            .map(|node| AutocompleteChoice::same(node.formatted_name()))
            .collect())
    }
}

fn visible_exact<'a>(
    graph: &'a DocGraph,
    query: &str,
    include_private: bool,
) -> Option<&'a DocNode> {
    graph.resolve_exact(query).filter(|node| include_private || !node.private)
}

fn fetch_failed(source: &str, detail: &str) -> HandlerReply {
    warn!(
        event_name = "docs.djs.fetch_failed",
        source,
        error = detail,
        "discord.js documentation unavailable"
    );
    HandlerReply::Notice(format!(
        "Couldn't fetch the discord.js docs for `{source}`, try again later"
    ))
}

fn documentation_reply(
    graph: &DocGraph,
    node: &DocNode,
    source: &str,
    owner_id: &str,
) -> Result<HandlerReply, HandlerError> {
    let name = node.formatted_name();
    let follow_up =
        documentation_message(node_embed(graph, node, source), owner_id).map_err(component_error)?;
    Ok(HandlerReply::EditAndFollowUp { edit: sent_confirmation(&name), follow_up })
}

pub(crate) fn node_embed(graph: &DocGraph, node: &DocNode, source: &str) -> Embed {
    let description = if node.description.is_empty() {
        "No description available."
    } else {
        node.description.as_str()
    };
    let mut embed = Embed::new()
        .author(format!("discord.js ({source})"), Some(DJS_ICON_URL))
        .color(DJS_COLOR)
        .title(node.formatted_name())
        .url(node.site_url(source))
        .description(description)
        .footer(node.kind.to_string());

    if node.kind.is_top_level() {
        let sections = [
            ("Properties", NodeKind::Property),
            ("Methods", NodeKind::Method),
            ("Events", NodeKind::Event),
        ];
        for (label, kind) in sections {
            let members: Vec<String> = graph
                .children_of(node)
                .filter(|child| child.kind == kind && !child.private)
                .map(|child| format!("`{}`", child.name))
                .collect();
            if !members.is_empty() {
                embed = embed.field(label, members.join(" "), false);
            }
        }
    }
    embed
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use docbot_core::errors::HandlerError;
    use serde_json::json;

    use super::DjsModule;
    use crate::events::fixtures::{component, guild_command};
    use crate::events::{FocusedOption, InteractionContext};
    use crate::handlers::testing::{deps, deps_with, FakeGraphs, FakePages};
    use crate::registry::{HandlerAction, HandlerModule, HandlerReply};

    async fn run_command(
        module: &DjsModule,
        options: serde_json::Value,
    ) -> Result<HandlerReply, HandlerError> {
        let exports = module.exports().expect("exports");
        let entry = exports.slash_command.expect("slash command");
        let HandlerAction::Interaction(handler) = entry.action else {
            panic!("interaction action")
        };
        let ctx = InteractionContext::from_value(guild_command("djs", options)).expect("ctx");
        handler.run(&ctx).await
    }

    fn query(value: &str) -> serde_json::Value {
        json!([{"name": "query", "type": 3, "value": value}])
    }

    fn focused(value: &str) -> FocusedOption {
        FocusedOption { name: "query".to_owned(), value: value.to_owned() }
    }

    #[tokio::test]
    async fn exact_match_sends_confirmation_and_public_embed() {
        let module = DjsModule::new(deps().graphs);
        let reply = run_command(&module, query("Guild#members")).await.expect("reply");

        let HandlerReply::EditAndFollowUp { edit, follow_up } = reply else {
            panic!("unexpected {reply:?}")
        };
        assert_eq!(edit.content.as_deref(), Some("Sent documentations for Guild#members"));
        assert_eq!(edit.components, Some(Vec::new()));
        assert!(!follow_up.is_ephemeral());

        let embed = &follow_up.embeds.as_ref().expect("embeds")[0];
        assert_eq!(embed.title.as_deref(), Some("Guild#members"));
        let buttons: Vec<_> = follow_up.buttons().collect();
        assert_eq!(buttons[0].custom_id, "deletebtn/501");
    }

    #[tokio::test]
    async fn fuzzy_query_offers_a_menu_bound_to_source_and_initiator() {
        let module = DjsModule::new(deps().graphs);
        let reply = run_command(
            &module,
            json!([
                {"name": "query", "type": 3, "value": "fetch"},
                {"name": "source", "type": 3, "value": "main"}
            ]),
        )
        .await
        .expect("reply");

        let HandlerReply::Edit(payload) = reply else { panic!("unexpected {reply:?}") };
        let menu = payload.select_menus().next().expect("menu");
        assert_eq!(menu.custom_id, "djsselect/main/false/501");
        let values: Vec<&str> = menu.options.iter().map(|option| option.value.as_str()).collect();
        assert_eq!(values, vec!["Guild#fetch()", "Guild#fetchAuditLogs()"]);
    }

    #[tokio::test]
    async fn private_members_need_the_private_flag() {
        let module = DjsModule::new(deps().graphs);
        let hidden = run_command(&module, query("Guild#shardId")).await.expect("reply");
        assert!(
            matches!(hidden, HandlerReply::Notice(ref text) if text.starts_with("No results found"))
        );

        let shown = run_command(
            &module,
            json!([
                {"name": "query", "type": 3, "value": "Guild#shardId"},
                {"name": "private", "type": 5, "value": true}
            ]),
        )
        .await
        .expect("reply");
        assert!(matches!(shown, HandlerReply::EditAndFollowUp { .. }));
    }

    #[tokio::test]
    async fn unknown_source_and_fetch_failure_become_notices() {
        let graphs = FakeGraphs::new();
        graphs.failing.store(true, Ordering::SeqCst);
        let module = DjsModule::new(deps_with(graphs, FakePages::default()).graphs);

        let unknown = run_command(
            &module,
            json!([
                {"name": "query", "type": 3, "value": "Guild"},
                {"name": "source", "type": 3, "value": "v11"}
            ]),
        )
        .await
        .expect("reply");
        assert_eq!(unknown, HandlerReply::Notice("Unknown documentation source `v11`".to_owned()));

        let failed = run_command(&module, query("Guild")).await.expect("reply");
        assert!(
            matches!(failed, HandlerReply::Notice(ref text) if text.starts_with("Couldn't fetch"))
        );
    }

    #[tokio::test]
    async fn select_resolves_value_and_keeps_initiator_as_owner() {
        let module = DjsModule::new(deps().graphs);
        let exports = module.exports().expect("exports");
        let HandlerAction::Interaction(handler) = &exports.select_menus[0].action else {
            panic!("interaction")
        };
        let ctx = InteractionContext::from_value(component(
            3,
            "djsselect/stable/false/501",
            &["Util.resolveColor()"],
            "777",
        ))
        .expect("ctx");

        let reply = handler.run(&ctx).await.expect("reply");
        let HandlerReply::EditAndFollowUp { edit, follow_up } = reply else {
            panic!("unexpected {reply:?}")
        };
        assert_eq!(edit.content.as_deref(), Some("Sent documentations for Util.resolveColor()"));
        let delete = follow_up.buttons().next().map(|button| button.custom_id.as_str());
        assert_eq!(delete, Some("deletebtn/501"));
    }

    #[tokio::test]
    async fn autocomplete_uses_cached_graph_and_includes_private_members() {
        let graphs = FakeGraphs::new();
        let module = DjsModule::new(deps_with(graphs.clone(), FakePages::default()).graphs);
        let exports = module.exports().expect("exports");
        let HandlerAction::Autocomplete(handler) = &exports.autocomplete[0].action else {
            panic!("autocomplete")
        };
        let ctx = InteractionContext::from_value(guild_command("djs", json!([]))).expect("ctx");

        let choices = handler
            .suggest(&ctx, &focused("shard"))
            .await
            .expect("choices");
        let again = handler
            .suggest(&ctx, &focused("guild#members"))
            .await
            .expect("choices");

        assert_eq!(choices[0].value, "Guild#shardId");
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].name, "Guild#members");
        assert_eq!(graphs.fetches.load(Ordering::SeqCst), 1);
    }
}
