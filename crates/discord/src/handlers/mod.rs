//! Handler modules shipped with docbot. Each module exports its slash command
//! and the buttons, select menus and autocomplete bindings that belong to it.

use std::sync::Arc;

use docbot_core::custom_id::CustomIdError;
use docbot_core::errors::HandlerError;
use docbot_docs::{DocGraphStore, DocIndexCache, PageSource};

use crate::commands::CommandDefinition;
use crate::registry::HandlerModule;

pub mod delete;
pub mod djs;
pub mod help;
pub mod mdn;

/// Documentation backends shared by the handler modules.
#[derive(Clone)]
pub struct HandlerDeps {
    pub graphs: Arc<DocGraphStore>,
    pub mdn_index: Arc<DocIndexCache>,
    pub mdn_pages: Arc<dyn PageSource>,
}

/// `djs`, `mdn` and the delete button, followed by `help` describing all of them.
pub fn default_modules(deps: &HandlerDeps) -> Vec<Arc<dyn HandlerModule>> {
    let mut modules: Vec<Arc<dyn HandlerModule>> = vec![
        Arc::new(djs::DjsModule::new(Arc::clone(&deps.graphs))),
        Arc::new(mdn::MdnModule::new(Arc::clone(&deps.mdn_index), Arc::clone(&deps.mdn_pages))),
        Arc::new(delete::DeleteModule),
    ];

    let catalog = command_catalog(&modules);
    modules.push(Arc::new(help::HelpModule::new(catalog)));
    modules
}

/// Slash-command definitions of every module that exports cleanly.
pub fn command_catalog(modules: &[Arc<dyn HandlerModule>]) -> Vec<CommandDefinition> {
    modules
        .iter()
        .filter_map(|module| module.exports().ok())
        .filter_map(|exports| exports.slash_command)
        .filter_map(|entry| entry.definition)
        .collect()
}

pub(crate) fn component_error(error: CustomIdError) -> HandlerError {
    HandlerError::Internal(format!("could not build component: {error}"))
}


#[cfg(test)]
mod tests {
    use super::testing::deps;
    use super::{command_catalog, default_modules};
    use crate::registry::{CommandRegistry, HandlerKind};

    #[test]
    fn default_modules_register_every_binding() {
        let modules = default_modules(&deps());
        let mut registry = CommandRegistry::new();
        let report = registry.load(&modules);

        assert_eq!(report.loaded_modules, vec!["djs", "mdn", "delete", "help"]);
        assert!(report.skipped_modules.is_empty());
        assert_eq!(registry.count(HandlerKind::SlashCommand), 3);
        assert!(registry.lookup(HandlerKind::SelectMenu, "djsselect").is_some());
        assert!(registry.lookup(HandlerKind::SelectMenu, "mdnselect").is_some());
        assert!(registry.lookup(HandlerKind::Button, "deletebtn").is_some());
        assert!(registry.lookup(HandlerKind::Autocomplete, "djs/query").is_some());
        assert!(registry.lookup(HandlerKind::Autocomplete, "mdn/query").is_some());

        let names: Vec<String> =
            registry.definitions().into_iter().map(|definition| definition.name).collect();
        assert_eq!(names, vec!["djs", "help", "mdn"]);
    }

    #[test]
    fn catalog_skips_modules_without_slash_commands() {
        let modules = default_modules(&deps());
        let names: Vec<String> =
            command_catalog(&modules).into_iter().map(|definition| definition.name).collect();
        assert_eq!(names, vec!["djs", "mdn", "help"]);
    }
}
