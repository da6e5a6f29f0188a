use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docbot_core::custom_id::CustomId;
use docbot_core::errors::HandlerError;
use docbot_core::permissions::{Permissions, Requirements};
use docbot_docs::{CatalogEntry, DocIndexCache, MdnPage, PageSource};
use tracing::warn;

use super::component_error;
use crate::commands::{CommandDefinition, CommandOptionDefinition, OptionType};
use crate::components::{
    documentation_message, sent_confirmation, ActionRow, AutocompleteChoice, Embed, MessagePayload,
    SelectMenu, SelectOption,
};
use crate::events::{FocusedOption, InteractionContext};
use crate::registry::{
    AutocompleteHandler, HandlerEntry, HandlerModule, HandlerReply, InteractionHandler,
    ModuleExports,
    RegistryError,
};

pub const COMMAND: &str = "mdn";
pub const SELECT_PREFIX: &str = "mdnselect";

const MDN_ICON_URL: &str = "https://i.imgur.com/1P4wotC.png";
const PAGE_COLOR: u32 = 0xFFFFFF;
const SEARCH_LIMIT: usize = 10;
/// Paths at least this long are shown as their last two segments.
const LONG_PATH: usize = 99;
const COOLDOWN: Duration = Duration::from_secs(3);

pub struct MdnModule {
    index: Arc<DocIndexCache>,
    pages: Arc<dyn PageSource>,
}

impl MdnModule {
    pub fn new(index: Arc<DocIndexCache>, pages: Arc<dyn PageSource>) -> Self {
        Self { index, pages }
    }

    fn lookup(&self) -> MdnLookup {
        MdnLookup { index: Arc::clone(&self.index), pages: Arc::clone(&self.pages) }
    }
}

impl HandlerModule for MdnModule {
    fn name(&self) -> &str {
        COMMAND
    }

    fn exports(&self) -> Result<ModuleExports, RegistryError> {
        let requirements = Requirements::none().bot(Permissions::EMBED_LINKS).guild_only();
        let query = CommandOptionDefinition::new(
            OptionType::String,
            "query",
            "What to look up, e.g. Array.filter",
        );
        let definition = CommandDefinition::new(COMMAND, "Search the MDN web documentation")
            .option(query.required().autocomplete())
            .guild_only();

        Ok(ModuleExports {
            slash_command: Some(
                HandlerEntry::command(definition, Arc::new(MdnCommand(self.lookup())))
                    .requirements(requirements)
                    .cooldown(COOLDOWN),
            ),
            select_menus: vec![HandlerEntry::interaction(
                SELECT_PREFIX,
                Arc::new(MdnSelect(self.lookup())),
            )
            .requirements(requirements)],
            autocomplete: vec![HandlerEntry::autocomplete(
                COMMAND,
                "query",
                Arc::new(MdnAutocomplete(Arc::clone(&self.index))),
            )],
            ..ModuleExports::default()
        })
    }
}

struct MdnLookup {
    index: Arc<DocIndexCache>,
    pages: Arc<dyn PageSource>,
}

impl MdnLookup {
    /// A full catalog path, or a shortened label exactly as autocomplete shows it.
    /// Any other suffix goes through search.
    async fn resolve_command_query(&self, query: &str) -> Option<CatalogEntry> {
        if let Some(entry) = self.index.resolve_exact(query).await {
            return Some(entry);
        }
        self.index
            .resolve_suffix(query)
            .await
            .filter(|entry| display_path(&entry.path).eq_ignore_ascii_case(query.trim()))
    }

    async fn page_reply(
        &self,
        path: &str,
        label: &str,
        owner_id: &str,
    ) -> Result<HandlerReply, HandlerError> {
        let page = match self.pages.fetch_page(path).await {
            Ok(page) => page,
            Err(error) => {
                warn!(
                    event_name = "docs.mdn.page_failed",
                    path,
                    error = %error,
                    "MDN page unavailable"
                );
                let notice = format!("Couldn't fetch the MDN page for `{label}`");
                return Ok(HandlerReply::Notice(notice));
            }
        };

        let follow_up =
            documentation_message(page_embed(&page), owner_id).map_err(component_error)?;
        Ok(HandlerReply::EditAndFollowUp { edit: sent_confirmation(label), follow_up })
    }
}

struct MdnCommand(MdnLookup);

#[async_trait]
impl InteractionHandler for MdnCommand {
    async fn run(&self, ctx: &InteractionContext) -> Result<HandlerReply, HandlerError> {
        let query = ctx
            .options()
            .and_then(|options| options.get_str("query"))
            .ok_or_else(|| HandlerError::MissingOption("query".to_owned()))?;

        if let Some(entry) = self.0.resolve_command_query(query).await {
            return self.0.page_reply(&entry.path, &display_path(&entry.path), &ctx.actor.id).await;
        }

        let hits: Vec<CatalogEntry> = self.0.index.search(query, SEARCH_LIMIT).await.collect();
        match hits.as_slice() {
            [] => Ok(HandlerReply::Notice(format!("No results found for `{query}`"))),
            [single] => {
                let label = display_path(&single.path);
                self.0.page_reply(&single.path, &label, &ctx.actor.id).await
            }
            many => {
                let custom_id = CustomId::new(SELECT_PREFIX).param(ctx.actor.id.as_str());
                let mut menu = SelectMenu::new(&custom_id)
                    .map_err(component_error)?
                    .placeholder("Select documentation to send");
                for entry in many {
                    let shown = display_path(&entry.path);
                    menu = menu.option(SelectOption::new(shown.replace(['_', '-'], " "), &shown));
                }
                Ok(HandlerReply::Edit(
                    MessagePayload::text(format!("Found {} results for `{query}`", many.len()))
                        .row(ActionRow::new().select_menu(menu)),
                ))
            }
        }
    }
}

struct MdnSelect(MdnLookup);

#[async_trait]
impl InteractionHandler for MdnSelect {
    async fn run(&self, ctx: &InteractionContext) -> Result<HandlerReply, HandlerError> {
        let owner = ctx
            .custom_id()
            .and_then(|custom_id| custom_id.get(0))
            .ok_or_else(|| HandlerError::InvalidInput("menu id without initiator".to_owned()))?;
        let selected = ctx
            .selected_values()
            .first()
            .ok_or_else(|| HandlerError::InvalidInput("no menu value selected".to_owned()))?;

        match self.0.index.resolve_suffix(selected).await {
            Some(entry) => self.0.page_reply(&entry.path, selected, owner).await,
            None => Ok(HandlerReply::Notice(format!("Couldn't find `{selected}` on MDN"))),
        }
    }
}

struct MdnAutocomplete(Arc<DocIndexCache>);

#[async_trait]
impl AutocompleteHandler for MdnAutocomplete {
    async fn suggest(
        &self,
        _ctx: &InteractionContext,
        focused: &FocusedOption,
    ) -> Result<Vec<AutocompleteChoice>, HandlerError> {
        let query = focused.value.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .0
            .search(query, SEARCH_LIMIT)
            .await
            .map(|entry| AutocompleteChoice::same(display_path(&entry.path)))
            .collect())
    }
}

/// Long catalog paths are cut to their last two segments; the cache resolves
/// them back by unique suffix.
pub(crate) fn display_path(path: &str) -> String {
    if path.chars().count() < LONG_PATH {
        return path.to_owned();
    }
    let segments: Vec<&str> = path.rsplitn(3, '/').take(2).collect();
    segments.into_iter().rev().collect::<Vec<_>>().join("/")
}

fn page_embed(page: &MdnPage) -> Embed {
    let summary = if page.summary.trim().is_empty() {
        "No summary available."
    } else {
        page.summary.as_str()
    };
    Embed::new()
        .color(PAGE_COLOR)
        .author("MDN Documentation", Some(MDN_ICON_URL))
        .title(&page.title)
        .url(page.url.clone())
        .thumbnail(MDN_ICON_URL)
        .description(summary)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{display_path, MdnModule};
    use crate::events::fixtures::{component, guild_command};
    use crate::events::{FocusedOption, InteractionContext};
    use crate::handlers::testing::{deps, deps_with, FakeGraphs, FakePages};
    use crate::handlers::HandlerDeps;
    use crate::registry::{HandlerAction, HandlerModule, HandlerReply};

    fn module(deps: HandlerDeps) -> MdnModule {
        MdnModule::new(deps.mdn_index, deps.mdn_pages)
    }

    async fn run_command(module: &MdnModule, query: &str) -> HandlerReply {
        let exports = module.exports().expect("exports");
        let entry = exports.slash_command.expect("slash command");
        let HandlerAction::Interaction(handler) = entry.action else {
            panic!("interaction action")
        };
        let ctx = InteractionContext::from_value(guild_command(
            "mdn",
            json!([{"name": "query", "type": 3, "value": query}]),
        ))
        .expect("ctx");
        handler.run(&ctx).await.expect("reply")
    }

    #[test]
    fn long_paths_keep_their_last_two_segments() {
        assert_eq!(display_path("Web/API/Fetch_API"), "Web/API/Fetch_API");
        let long = format!("Web/{}/Element/click_event", "Nested/".repeat(14));
        assert!(long.len() >= 99);
        assert_eq!(display_path(&long), "Element/click_event");
    }

    #[tokio::test]
    async fn single_hit_sends_the_page() {
        let reply = run_command(&module(deps()), "promise").await;

        let HandlerReply::EditAndFollowUp { edit, follow_up } = reply else {
            panic!("unexpected {reply:?}")
        };
        assert_eq!(
            edit.content.as_deref(),
            Some("Sent documentations for Web/JavaScript/Reference/Global_Objects/Promise")
        );
        let embed = &follow_up.embeds.as_ref().expect("embeds")[0];
        assert_eq!(embed.color, Some(0xFFFFFF));
        assert_eq!(embed.title.as_deref(), Some("Promise"));
        let author = embed.author.as_ref().map(|author| author.name.as_str());
        assert_eq!(author, Some("MDN Documentation"));
    }

    #[tokio::test]
    async fn bare_leaf_name_searches_instead_of_jumping_to_a_page() {
        let reply = run_command(&module(deps()), "find").await;

        let HandlerReply::Edit(payload) = reply else { panic!("unexpected {reply:?}") };
        let menu = payload.select_menus().next().expect("menu");
        assert_eq!(menu.options.len(), 2);
    }

    #[tokio::test]
    async fn several_hits_offer_a_menu() {
        let reply = run_command(&module(deps()), "array find").await;

        let HandlerReply::Edit(payload) = reply else { panic!("unexpected {reply:?}") };
        let menu = payload.select_menus().next().expect("menu");
        assert_eq!(menu.custom_id, "mdnselect/501");
        assert_eq!(menu.options.len(), 2);
        assert!(menu.options.iter().all(|option| option.value.chars().count() <= 100));
    }

    #[tokio::test]
    async fn no_hits_and_page_failures_become_notices() {
        let none = run_command(&module(deps()), "qwertyuiop").await;
        assert_eq!(none, HandlerReply::Notice("No results found for `qwertyuiop`".to_owned()));

        let mut pages = FakePages::default();
        pages.missing.insert("Web/API/Fetch_API".to_owned(), 404);
        let failing = module(deps_with(FakeGraphs::new(), pages));
        let failed = run_command(&failing, "Web/API/Fetch_API").await;
        assert!(
            matches!(failed, HandlerReply::Notice(ref text) if text.starts_with("Couldn't fetch"))
        );
    }

    #[tokio::test]
    async fn select_sends_page_owned_by_initiator() {
        let mdn = module(deps());
        let exports = mdn.exports().expect("exports");
        let HandlerAction::Interaction(handler) = &exports.select_menus[0].action else {
            panic!("interaction")
        };
        let select = component(3, "mdnselect/501", &["Web/API/Fetch_API"], "888");
        let ctx = InteractionContext::from_value(select).expect("ctx");

        let reply = handler.run(&ctx).await.expect("reply");
        let HandlerReply::EditAndFollowUp { follow_up, .. } = reply else {
            panic!("unexpected {reply:?}")
        };
        let delete = follow_up.buttons().next().map(|button| button.custom_id.as_str());
        assert_eq!(delete, Some("deletebtn/501"));
    }

    #[tokio::test]
    async fn autocomplete_suggests_display_paths() {
        let mdn = module(deps());
        let exports = mdn.exports().expect("exports");
        let HandlerAction::Autocomplete(handler) = &exports.autocomplete[0].action else {
            panic!("autocomplete")
        };
        let ctx = InteractionContext::from_value(guild_command("mdn", json!([]))).expect("ctx");

        let choices = handler
            .suggest(&ctx, &FocusedOption { name: "query".to_owned(), value: "filter".to_owned() })
            .await
            .expect("choices");
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].value, "Web/JavaScript/Reference/Global_Objects/Array/filter");

        let empty = handler
            .suggest(&ctx, &FocusedOption { name: "query".to_owned(), value: "  ".to_owned() })
            .await
            .expect("choices");
        assert!(empty.is_empty());
    }
}
