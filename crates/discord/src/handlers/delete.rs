use std::sync::Arc;

use async_trait::async_trait;
use docbot_core::errors::HandlerError;

use crate::components::DELETE_BUTTON_PREFIX;
use crate::events::InteractionContext;
use crate::registry::{
    HandlerEntry, HandlerModule, HandlerReply, InteractionHandler, ModuleExports, RegistryError,
};

pub const NOT_OWNER: &str = "Only the command initiator is allowed to delete this message";

/// Trash-can button attached to public documentation messages.
pub struct DeleteModule;

impl HandlerModule for DeleteModule {
    fn name(&self) -> &str {
        "delete"
    }

    fn exports(&self) -> Result<ModuleExports, RegistryError> {
        Ok(ModuleExports {
            buttons: vec![HandlerEntry::interaction(DELETE_BUTTON_PREFIX, Arc::new(DeleteButton))],
            ..ModuleExports::default()
        })
    }
}

struct DeleteButton;

#[async_trait]
impl InteractionHandler for DeleteButton {
    async fn run(&self, ctx: &InteractionContext) -> Result<HandlerReply, HandlerError> {
        let owner = ctx
            .custom_id()
            .and_then(|custom_id| custom_id.get(0))
            .ok_or_else(|| HandlerError::InvalidInput("delete button without owner".to_owned()))?;

        if owner != ctx.actor.id {
            return Ok(HandlerReply::Notice(NOT_OWNER.to_owned()));
        }

        match (&ctx.channel_id, &ctx.message_id) {
            (Some(channel_id), Some(message_id)) => Ok(HandlerReply::DeleteMessage {
                channel_id: channel_id.clone(),
                message_id: message_id.clone(),
            }),
            _ => Err(HandlerError::InvalidInput("button interaction without a message".to_owned())),
        }
    }
}
