use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use docbot_core::cooldown::{format_remaining, CooldownDecision, CooldownTracker};
use docbot_core::errors::{HandlerError, InterfaceError};
use docbot_core::permissions::{self, GateDecision};
use futures_util::FutureExt;
use tracing::{debug, error, info, warn};

use crate::components::{AutocompleteChoice, MessagePayload, AUTOCOMPLETE_CHOICE_LIMIT};
use crate::events::{FocusedOption, InteractionContext, InteractionKind};
use crate::registry::{
    autocomplete_key, CommandRegistry, HandlerAction, HandlerEntry, HandlerKind, HandlerReply,
};
use crate::responder::{Acknowledgement, InteractionResponder, ReplyError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    Denied,
    Handler,
    Transport,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Ignored,
    Replied,
    Failed(FailureKind),
}

/// Runs one interaction through lookup, permission gate, cooldown and handler,
/// and owns the defer/edit/follow-up reply protocol around it.
pub struct InteractionDispatcher {
    registry: Arc<CommandRegistry>,
    cooldowns: Arc<CooldownTracker>,
    responder: Arc<dyn InteractionResponder>,
}

impl InteractionDispatcher {
    pub fn new(
        registry: Arc<CommandRegistry>,
        cooldowns: Arc<CooldownTracker>,
        responder: Arc<dyn InteractionResponder>,
    ) -> Self {
        Self { registry, cooldowns, responder }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub async fn dispatch(&self, ctx: &InteractionContext) -> DispatchOutcome {
        let (kind, acknowledgement, not_found) = match &ctx.kind {
            InteractionKind::Command { .. } => (
                HandlerKind::SlashCommand,
                Acknowledgement::DeferReply { ephemeral: true },
                "Command not found",
            ),
            InteractionKind::Button { .. } => {
                (HandlerKind::Button, Acknowledgement::DeferUpdate, "Unknown button")
            }
            InteractionKind::SelectMenu { .. } => {
                (HandlerKind::SelectMenu, Acknowledgement::DeferUpdate, "Unknown menu")
            }
            InteractionKind::Autocomplete { command, focused, .. } => {
                return self.autocomplete(ctx, command, focused).await;
            }
            InteractionKind::Unsupported { type_code, component_type } => {
                debug!(
                    event_name = "dispatch.ignored",
                    correlation_id = %ctx.id,
                    type_code,
                    component_type = ?component_type,
                    "ignoring unsupported interaction"
                );
                return DispatchOutcome::Ignored;
            }
        };

        if !self.sent("acknowledge", ctx, self.responder.acknowledge(ctx, acknowledgement).await) {
            return DispatchOutcome::Failed(FailureKind::Transport);
        }

        let Some(entry) = ctx.route_key().and_then(|key| self.registry.lookup(kind, key)) else {
            let failure = InterfaceError::NotFound {
                message: not_found.to_owned(),
                correlation_id: ctx.id.clone(),
            };
            return self.fail(ctx, FailureKind::NotFound, &failure).await;
        };

        if let Some(denial) = self.admission(ctx, &entry) {
            debug!(
                event_name = "dispatch.denied",
                correlation_id = %ctx.id,
                handler = %entry.identifier,
                actor_id = %ctx.actor.id,
                reason = %denial.user_message(),
                "interaction denied before execution"
            );
            return self.fail(ctx, FailureKind::Denied, &denial).await;
        }

        let HandlerAction::Interaction(handler) = &entry.action else {
            let failure = HandlerError::Internal(format!(
                "`{}` is registered as {kind} but carries an autocomplete action",
                entry.identifier
            ))
            .into_interface(ctx.id.clone());
            return self.handler_failed(ctx, &entry, failure).await;
        };

        info!(
            event_name = "dispatch.handler_started",
            correlation_id = %ctx.id,
            kind = %kind,
            handler = %entry.identifier,
            actor_id = %ctx.actor.id,
            "running interaction handler"
        );

        let reply = match AssertUnwindSafe(handler.run(ctx)).catch_unwind().await {
            Ok(Ok(reply)) => reply,
            Ok(Err(handler_error)) => {
                return self
                    .handler_failed(ctx, &entry, handler_error.into_interface(ctx.id.clone()))
                    .await;
            }
            Err(panic) => {
                let message = format!("handler panicked: {}", panic_message(panic.as_ref()));
                let failure = HandlerError::Internal(message).into_interface(ctx.id.clone());
                return self.handler_failed(ctx, &entry, failure).await;
            }
        };

        if self.deliver(ctx, reply).await {
            DispatchOutcome::Replied
        } else {
            DispatchOutcome::Failed(FailureKind::Transport)
        }
    }

    /// Gate first, then cooldown. A gate denial never writes a cooldown record.
    fn admission(&self, ctx: &InteractionContext, entry: &HandlerEntry) -> Option<InterfaceError> {
        let decision = permissions::check(&ctx.location(), &entry.requirements);
        if let GateDecision::Deny(reason) = decision {
            return Some(InterfaceError::Denied {
                message: reason.user_message(),
                correlation_id: ctx.id.clone(),
            });
        }

        match self.cooldowns.check(&ctx.actor.id, &entry.identifier, entry.cooldown) {
            CooldownDecision::Allow => None,
            CooldownDecision::Deny { remaining } => Some(InterfaceError::Denied {
                message: format!(
                    "Please wait {} before using the command again",
                    format_remaining(remaining)
                ),
                correlation_id: ctx.id.clone(),
            }),
        }
    }

    async fn autocomplete(
        &self,
        ctx: &InteractionContext,
        command: &str,
        focused: &FocusedOption,
    ) -> DispatchOutcome {
        let key = autocomplete_key(command, &focused.name);
        let entry = self.registry.lookup(HandlerKind::Autocomplete, &key);

        let choices = match entry.as_deref().map(|entry| &entry.action) {
            Some(HandlerAction::Autocomplete(handler)) => {
                match AssertUnwindSafe(handler.suggest(ctx, focused)).catch_unwind().await {
                    Ok(Ok(choices)) => choices,
                    Ok(Err(handler_error)) => {
                        warn!(
                            event_name = "dispatch.autocomplete_failed",
                            correlation_id = %ctx.id,
                            handler = %key,
                            error = %handler_error,
                            "autocomplete handler failed; answering with no choices"
                        );
                        Vec::new()
                    }
                    Err(panic) => {
                        error!(
                            event_name = "dispatch.autocomplete_failed",
                            correlation_id = %ctx.id,
                            handler = %key,
                            panic = %panic_message(panic.as_ref()),
                            "autocomplete handler panicked; answering with no choices"
                        );
                        Vec::new()
                    }
                }
            }
            _ => {
                debug!(
                    event_name = "dispatch.autocomplete_unrouted",
                    correlation_id = %ctx.id,
                    handler = %key,
                    "no autocomplete binding"
                );
                Vec::new()
            }
        };

        let choices = clamp_choices(choices);
        if self.sent("autocomplete", ctx, self.responder.autocomplete(ctx, &choices).await) {
            DispatchOutcome::Replied
        } else {
            DispatchOutcome::Failed(FailureKind::Transport)
        }
    }

    async fn handler_failed(
        &self,
        ctx: &InteractionContext,
        entry: &HandlerEntry,
        failure: InterfaceError,
    ) -> DispatchOutcome {
        error!(
            event_name = "dispatch.handler_failed",
            correlation_id = %failure.correlation_id(),
            handler = %entry.identifier,
            actor_id = %ctx.actor.id,
            error = %failure,
            "interaction handler failed"
        );
        self.fail(ctx, FailureKind::Handler, &failure).await
    }

    async fn fail(
        &self,
        ctx: &InteractionContext,
        kind: FailureKind,
        failure: &InterfaceError,
    ) -> DispatchOutcome {
        self.notify(ctx, failure.user_message()).await;
        DispatchOutcome::Failed(kind)
    }

    /// Short text for the invoking user: the command placeholder is edited,
    /// components get an ephemeral follow-up since their message is public.
    async fn notify(&self, ctx: &InteractionContext, text: String) -> bool {
        match ctx.kind {
            InteractionKind::Command { .. } => {
                let payload = MessagePayload::text(text);
                self.sent("edit_original", ctx, self.responder.edit_original(ctx, &payload).await)
            }
            _ => {
                let payload = MessagePayload::text(text).ephemeral();
                self.sent("follow_up", ctx, self.responder.follow_up(ctx, &payload).await)
            }
        }
    }

    async fn deliver(&self, ctx: &InteractionContext, reply: HandlerReply) -> bool {
        match reply {
            HandlerReply::Edit(payload) => {
                self.sent("edit_original", ctx, self.responder.edit_original(ctx, &payload).await)
            }
            HandlerReply::EditAndFollowUp { edit, follow_up } => {
                let edited = self.responder.edit_original(ctx, &edit).await;
                let edited = self.sent("edit_original", ctx, edited);
                let followed = self.responder.follow_up(ctx, &follow_up).await;
                let followed = self.sent("follow_up", ctx, followed);
                edited && followed
            }
            HandlerReply::Notice(text) => self.notify(ctx, text).await,
            HandlerReply::DeleteMessage { channel_id, message_id } => self.sent(
                "delete_message",
                ctx,
                self.responder.delete_message(&channel_id, &message_id).await,
            ),
            HandlerReply::Nothing => true,
        }
    }

    /// The one place reply transport failures are logged.
    fn sent(
        &self,
        operation: &'static str,
        ctx: &InteractionContext,
        result: Result<(), ReplyError>,
    ) -> bool {
        match result {
            Ok(()) => true,
            Err(reply_error) => {
                warn!(
                    event_name = "dispatch.reply_failed",
                    correlation_id = %ctx.id,
                    operation,
                    kind = ctx.kind.label(),
                    error = %reply_error,
                    "reply transport call failed"
                );
                false
            }
        }
    }
}

fn clamp_choices(choices: Vec<AutocompleteChoice>) -> Vec<AutocompleteChoice> {
    choices
        .into_iter()
        .take(AUTOCOMPLETE_CHOICE_LIMIT)
        .map(|choice| AutocompleteChoice::new(choice.name, choice.value))
        .collect()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use docbot_core::cooldown::CooldownTracker;
    use docbot_core::errors::HandlerError;
    use docbot_core::permissions::{Permissions, Requirements};
    use serde_json::json;
    use tokio::sync::Mutex;

    use super::{DispatchOutcome, FailureKind, InteractionDispatcher};
    use crate::commands::CommandDefinition;
    use crate::components::{AutocompleteChoice, MessagePayload};
    use crate::events::fixtures::{component, guild_command};
    use crate::events::{FocusedOption, InteractionContext};
    use crate::registry::{
        AutocompleteHandler, CommandRegistry, HandlerEntry, HandlerKind, HandlerReply,
        InteractionHandler,
    };
    use crate::responder::{Acknowledgement, InteractionResponder, ReplyError};

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Call {
        Acknowledge(Acknowledgement),
        Edit(MessagePayload),
        FollowUp(MessagePayload),
        Autocomplete(Vec<AutocompleteChoice>),
        Delete { channel_id: String, message_id: String },
    }

    #[derive(Default)]
    struct RecordingResponder {
        calls: Mutex<Vec<Call>>,
        fail_acknowledge: bool,
    }

    impl RecordingResponder {
        async fn calls(&self) -> Vec<Call> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl InteractionResponder for RecordingResponder {
        async fn acknowledge(
            &self,
            _ctx: &InteractionContext,
            acknowledgement: Acknowledgement,
        ) -> Result<(), ReplyError> {
            self.calls.lock().await.push(Call::Acknowledge(acknowledgement));
            if self.fail_acknowledge {
                return Err(ReplyError::Status {
                    operation: "acknowledge",
                    status: 404,
                    body: "Unknown interaction".to_owned(),
                });
            }
            Ok(())
        }

        async fn edit_original(
            &self,
            _ctx: &InteractionContext,
            payload: &MessagePayload,
        ) -> Result<(), ReplyError> {
            self.calls.lock().await.push(Call::Edit(payload.clone()));
            Ok(())
        }

        async fn follow_up(
            &self,
            _ctx: &InteractionContext,
            payload: &MessagePayload,
        ) -> Result<(), ReplyError> {
            self.calls.lock().await.push(Call::FollowUp(payload.clone()));
            Ok(())
        }

        async fn autocomplete(
            &self,
            _ctx: &InteractionContext,
            choices: &[AutocompleteChoice],
        ) -> Result<(), ReplyError> {
            self.calls.lock().await.push(Call::Autocomplete(choices.to_vec()));
            Ok(())
        }

        async fn delete_message(
            &self,
            channel_id: &str,
            message_id: &str,
        ) -> Result<(), ReplyError> {
            self.calls.lock().await.push(Call::Delete {
                channel_id: channel_id.to_owned(),
                message_id: message_id.to_owned(),
            });
            Ok(())
        }
    }

    enum Behaviour {
        Reply(HandlerReply),
        Fail,
        Panic,
    }

    struct CountingHandler {
        runs: AtomicUsize,
        behaviour: Behaviour,
    }

    impl CountingHandler {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self { runs: AtomicUsize::new(0), behaviour })
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InteractionHandler for CountingHandler {
        async fn run(&self, _ctx: &InteractionContext) -> Result<HandlerReply, HandlerError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            match &self.behaviour {
                Behaviour::Reply(reply) => Ok(reply.clone()),
                Behaviour::Fail => Err(HandlerError::Internal("backend exploded".to_owned())),
                Behaviour::Panic => panic!("handler bug"),
            }
        }
    }

    struct ManyChoices;

    #[async_trait]
    impl AutocompleteHandler for ManyChoices {
        async fn suggest(
            &self,
            _ctx: &InteractionContext,
            focused: &FocusedOption,
        ) -> Result<Vec<AutocompleteChoice>, HandlerError> {
            Ok((0..40)
                .map(|index| AutocompleteChoice {
                    name: format!("{}-{index}-{}", focused.value, "x".repeat(120)),
                    value: format!("value-{index}"),
                })
                .collect())
        }
    }

    struct FailingChoices;

    #[async_trait]
    impl AutocompleteHandler for FailingChoices {
        async fn suggest(
            &self,
            _ctx: &InteractionContext,
            _focused: &FocusedOption,
        ) -> Result<Vec<AutocompleteChoice>, HandlerError> {
            Err(HandlerError::Internal("index offline".to_owned()))
        }
    }

    fn dispatcher_with(
        entries: Vec<(HandlerKind, HandlerEntry)>,
        responder: Arc<RecordingResponder>,
    ) -> InteractionDispatcher {
        let mut registry = CommandRegistry::new();
        for (kind, entry) in entries {
            registry.register(kind, entry);
        }
        InteractionDispatcher::new(Arc::new(registry), Arc::new(CooldownTracker::new()), responder)
    }

    fn command_entry(name: &str, handler: Arc<CountingHandler>) -> (HandlerKind, HandlerEntry) {
        let definition = CommandDefinition::new(name, "test command");
        (HandlerKind::SlashCommand, HandlerEntry::command(definition, handler))
    }

    fn context(raw: serde_json::Value) -> InteractionContext {
        InteractionContext::from_value(raw).expect("interaction fixture")
    }

    fn dm_command(name: &str) -> InteractionContext {
        context(json!({
            "id": "1400", "application_id": "900", "type": 2, "token": "tok-1400",
            "channel_id": "55",
            "user": {"id": "42", "username": "dm-user"},
            "data": {"name": name}
        }))
    }

    #[tokio::test]
    async fn unsupported_interactions_produce_no_replies() {
        let responder = Arc::new(RecordingResponder::default());
        let dispatcher = dispatcher_with(Vec::new(), responder.clone());

        let modal_submit = context(json!({
            "id": "1", "application_id": "900", "type": 5, "token": "t",
            "user": {"id": "42", "username": "someone"},
            "data": {"custom_id": "feedback"}
        }));
        let text_input = context(component(4, "anything", &[], "501"));

        assert_eq!(dispatcher.dispatch(&modal_submit).await, DispatchOutcome::Ignored);
        assert_eq!(dispatcher.dispatch(&text_input).await, DispatchOutcome::Ignored);
        assert!(responder.calls().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_command_edits_deferred_ephemeral_placeholder() {
        let responder = Arc::new(RecordingResponder::default());
        let dispatcher = dispatcher_with(Vec::new(), responder.clone());

        let outcome = dispatcher.dispatch(&context(guild_command("nope", json!([])))).await;

        assert_eq!(outcome, DispatchOutcome::Failed(FailureKind::NotFound));
        assert_eq!(
            responder.calls().await,
            vec![
                Call::Acknowledge(Acknowledgement::DeferReply { ephemeral: true }),
                Call::Edit(MessagePayload::text("Command not found")),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_menu_gets_ephemeral_follow_up_after_deferred_update() {
        let responder = Arc::new(RecordingResponder::default());
        let dispatcher = dispatcher_with(Vec::new(), responder.clone());

        let outcome = dispatcher.dispatch(&context(component(3, "gone/1", &["x"], "501"))).await;

        assert_eq!(outcome, DispatchOutcome::Failed(FailureKind::NotFound));
        assert_eq!(
            responder.calls().await,
            vec![
                Call::Acknowledge(Acknowledgement::DeferUpdate),
                Call::FollowUp(MessagePayload::text("Unknown menu").ephemeral()),
            ]
        );
    }

    #[tokio::test]
    async fn server_only_command_is_denied_in_private_context() {
        let handler = CountingHandler::new(Behaviour::Reply(HandlerReply::Nothing));
        let (kind, entry) = command_entry("djs", handler.clone());
        let responder = Arc::new(RecordingResponder::default());
        let entry = entry.requirements(Requirements::none().guild_only());
        let dispatcher = dispatcher_with(vec![(kind, entry)], responder.clone());

        let outcome = dispatcher.dispatch(&dm_command("djs")).await;

        assert_eq!(outcome, DispatchOutcome::Failed(FailureKind::Denied));
        assert_eq!(handler.runs(), 0);
        assert_eq!(
            responder.calls().await.last(),
            Some(&Call::Edit(MessagePayload::text(
                "This is a guild exclusive command, not to be executed in a dm"
            )))
        );
    }

    #[tokio::test]
    async fn missing_bot_permission_names_the_capability() {
        let handler = CountingHandler::new(Behaviour::Reply(HandlerReply::Nothing));
        let (kind, entry) = command_entry("mdn", handler.clone());
        let requirements =
            Requirements::none().bot(Permissions::EMBED_LINKS | Permissions::USE_EXTERNAL_EMOJIS);
        let responder = Arc::new(RecordingResponder::default());
        let entry = entry.requirements(requirements);
        let dispatcher = dispatcher_with(vec![(kind, entry)], responder.clone());

        dispatcher.dispatch(&context(guild_command("mdn", json!([])))).await;

        let calls = responder.calls().await;
        let Some(Call::Edit(payload)) = calls.last() else {
            panic!("expected an edit, got {calls:?}")
        };
        let content = payload.content.as_deref().unwrap_or_default();
        assert!(content.contains("USE_EXTERNAL_EMOJIS"), "{content}");
        assert!(!content.contains("EMBED_LINKS"), "granted permissions are not listed: {content}");
        assert_eq!(handler.runs(), 0);
    }

    #[tokio::test]
    async fn cooldown_denies_second_invocation_without_running_handler() {
        let reply = HandlerReply::Edit(MessagePayload::text("ok"));
        let handler = CountingHandler::new(Behaviour::Reply(reply));
        let (kind, entry) = command_entry("mdn", handler.clone());
        let responder = Arc::new(RecordingResponder::default());
        let entry = entry.cooldown(Duration::from_secs(30));
        let dispatcher = dispatcher_with(vec![(kind, entry)], responder.clone());
        let ctx = context(guild_command("mdn", json!([])));

        assert_eq!(dispatcher.dispatch(&ctx).await, DispatchOutcome::Replied);
        assert_eq!(dispatcher.dispatch(&ctx).await, DispatchOutcome::Failed(FailureKind::Denied));
        assert_eq!(handler.runs(), 1);

        let calls = responder.calls().await;
        let Some(Call::Edit(payload)) = calls.last() else {
            panic!("expected an edit, got {calls:?}")
        };
        let content = payload.content.as_deref().unwrap_or_default();
        assert!(content.starts_with("Please wait 30 seconds"), "{content}");
        assert!(content.ends_with("before using the command again"));
    }

    #[tokio::test]
    async fn handler_errors_and_panics_surface_generic_message() {
        for behaviour in [Behaviour::Fail, Behaviour::Panic] {
            let handler = CountingHandler::new(behaviour);
            let responder = Arc::new(RecordingResponder::default());
            let dispatcher =
                dispatcher_with(vec![command_entry("help", handler.clone())], responder.clone());

            let outcome = dispatcher.dispatch(&context(guild_command("help", json!([])))).await;

            assert_eq!(outcome, DispatchOutcome::Failed(FailureKind::Handler));
            assert_eq!(handler.runs(), 1);
            assert_eq!(
                responder.calls().await.last(),
                Some(&Call::Edit(MessagePayload::text("An error has occurred")))
            );
        }
    }

    #[tokio::test]
    async fn edit_and_follow_up_replies_are_sent_in_order() {
        let edit = MessagePayload::text("Sent documentations for Guild").clear_components();
        let follow_up = MessagePayload::text("public doc");
        let handler = CountingHandler::new(Behaviour::Reply(HandlerReply::EditAndFollowUp {
            edit: edit.clone(),
            follow_up: follow_up.clone(),
        }));
        let responder = Arc::new(RecordingResponder::default());
        let dispatcher = dispatcher_with(
            vec![(HandlerKind::SelectMenu, HandlerEntry::interaction("djsselect", handler))],
            responder.clone(),
        );

        let select = component(3, "djsselect/stable/false/501", &["Guild"], "501");
        let outcome = dispatcher.dispatch(&context(select)).await;

        assert_eq!(outcome, DispatchOutcome::Replied);
        assert_eq!(
            responder.calls().await,
            vec![
                Call::Acknowledge(Acknowledgement::DeferUpdate),
                Call::Edit(edit),
                Call::FollowUp(follow_up),
            ]
        );
    }

    #[tokio::test]
    async fn failed_acknowledgement_stops_processing() {
        let handler = CountingHandler::new(Behaviour::Reply(HandlerReply::Nothing));
        let responder = Arc::new(RecordingResponder {
            fail_acknowledge: true,
            ..RecordingResponder::default()
        });
        let dispatcher =
            dispatcher_with(vec![command_entry("help", handler.clone())], responder.clone());

        let outcome = dispatcher.dispatch(&context(guild_command("help", json!([])))).await;

        assert_eq!(outcome, DispatchOutcome::Failed(FailureKind::Transport));
        assert_eq!(handler.runs(), 0);
        assert_eq!(responder.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn autocomplete_is_clamped_and_skips_defer() {
        let responder = Arc::new(RecordingResponder::default());
        let dispatcher = dispatcher_with(
            vec![(
                HandlerKind::Autocomplete,
                HandlerEntry::autocomplete("djs", "query", Arc::new(ManyChoices)),
            )],
            responder.clone(),
        );
        let ctx = context(json!({
            "id": "1", "application_id": "900", "type": 4, "token": "t",
            "guild_id": "700",
            "member": {"user": {"id": "501", "username": "ada"}, "permissions": "0"},
            "data": {
                "name": "djs",
                "options": [{"name": "query", "type": 3, "value": "gu", "focused": true}]
            }
        }));

        assert_eq!(dispatcher.dispatch(&ctx).await, DispatchOutcome::Replied);

        let calls = responder.calls().await;
        assert_eq!(calls.len(), 1, "autocomplete is answered directly");
        let Call::Autocomplete(choices) = &calls[0] else {
            panic!("expected autocomplete, got {calls:?}")
        };
        assert_eq!(choices.len(), 25);
        assert!(choices.iter().all(|choice| choice.name.chars().count() <= 100));
    }

    #[tokio::test]
    async fn autocomplete_failures_answer_with_empty_list() {
        let responder = Arc::new(RecordingResponder::default());
        let dispatcher = dispatcher_with(
            vec![(
                HandlerKind::Autocomplete,
                HandlerEntry::autocomplete("mdn", "query", Arc::new(FailingChoices)),
            )],
            responder.clone(),
        );
        let autocomplete = |command: &str| {
            context(json!({
                "id": "2", "application_id": "900", "type": 4, "token": "t",
                "user": {"id": "42", "username": "dm-user"},
                "data": {
                    "name": command,
                    "options": [{"name": "query", "type": 3, "value": "arr", "focused": true}]
                }
            }))
        };

        dispatcher.dispatch(&autocomplete("mdn")).await;
        dispatcher.dispatch(&autocomplete("unbound")).await;

        assert_eq!(
            responder.calls().await,
            vec![Call::Autocomplete(Vec::new()), Call::Autocomplete(Vec::new())]
        );
    }
}
