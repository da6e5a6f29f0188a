use async_trait::async_trait;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::components::{AutocompleteChoice, MessagePayload, EPHEMERAL_FLAG};
use crate::events::InteractionContext;

const CALLBACK_DEFERRED_REPLY: u8 = 5;
const CALLBACK_DEFERRED_UPDATE: u8 = 6;
const CALLBACK_AUTOCOMPLETE_RESULT: u8 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acknowledgement {
    /// "Thinking…" placeholder that is later edited.
    DeferReply { ephemeral: bool },
    /// Silent acknowledgement of a component; the message stays as it is.
    DeferUpdate,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplyError {
    #[error("{operation} request failed: {message}")]
    Request { operation: &'static str, message: String },
    #[error("{operation} was rejected with status {status}: {body}")]
    Status { operation: &'static str, status: u16, body: String },
}

/// Outbound half of the interaction protocol. Every call is attempted once.
#[async_trait]
pub trait InteractionResponder: Send + Sync {
    async fn acknowledge(
        &self,
        ctx: &InteractionContext,
        acknowledgement: Acknowledgement,
    ) -> Result<(), ReplyError>;

    async fn edit_original(
        &self,
        ctx: &InteractionContext,
        payload: &MessagePayload,
    ) -> Result<(), ReplyError>;

    async fn follow_up(
        &self,
        ctx: &InteractionContext,
        payload: &MessagePayload,
    ) -> Result<(), ReplyError>;

    async fn autocomplete(
        &self,
        ctx: &InteractionContext,
        choices: &[AutocompleteChoice],
    ) -> Result<(), ReplyError>;

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<(), ReplyError>;
}

#[derive(Default)]
pub struct NoopResponder;

#[async_trait]
impl InteractionResponder for NoopResponder {
    async fn acknowledge(
        &self,
        _ctx: &InteractionContext,
        _acknowledgement: Acknowledgement,
    ) -> Result<(), ReplyError> {
        Ok(())
    }

    async fn edit_original(
        &self,
        _ctx: &InteractionContext,
        _payload: &MessagePayload,
    ) -> Result<(), ReplyError> {
        Ok(())
    }

    async fn follow_up(
        &self,
        _ctx: &InteractionContext,
        _payload: &MessagePayload,
    ) -> Result<(), ReplyError> {
        Ok(())
    }

    async fn autocomplete(
        &self,
        _ctx: &InteractionContext,
        _choices: &[AutocompleteChoice],
    ) -> Result<(), ReplyError> {
        Ok(())
    }

    async fn delete_message(&self, _channel_id: &str, _message_id: &str) -> Result<(), ReplyError> {
        Ok(())
    }
}

/// REST implementation against the Discord HTTP API.
pub struct HttpResponder {
    http: reqwest::Client,
    api_base_url: String,
    bot_token: SecretString,
}

impl HttpResponder {
    pub fn new(
        http: reqwest::Client,
        api_base_url: impl Into<String>,
        bot_token: SecretString,
    ) -> Self {
        let api_base_url = api_base_url.into().trim_end_matches('/').to_owned();
        Self { http, api_base_url, bot_token }
    }

    fn callback_url(&self, ctx: &InteractionContext) -> String {
        format!("{}/interactions/{}/{}/callback", self.api_base_url, ctx.id, ctx.token)
    }

    fn webhook_url(&self, ctx: &InteractionContext) -> String {
        format!("{}/webhooks/{}/{}", self.api_base_url, ctx.application_id, ctx.token)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        operation: &'static str,
        method: Method,
        url: String,
        body: Option<&B>,
        authorized: bool,
    ) -> Result<(), ReplyError> {
        let mut request = self.http.request(method, &url);
        if authorized {
            request =
                request.header("Authorization", format!("Bot {}", self.bot_token.expose_secret()));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|error| ReplyError::Request { operation, message: error.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReplyError::Status { operation, status: status.as_u16(), body });
        }

        debug!(
            event_name = "egress.discord.reply_sent",
            operation,
            status = status.as_u16(),
            "reply sent"
        );
        Ok(())
    }
}

pub fn acknowledgement_body(acknowledgement: Acknowledgement) -> serde_json::Value {
    match acknowledgement {
        Acknowledgement::DeferReply { ephemeral: true } => {
            json!({"type": CALLBACK_DEFERRED_REPLY, "data": {"flags": EPHEMERAL_FLAG}})
        }
        Acknowledgement::DeferReply { ephemeral: false } => {
            json!({"type": CALLBACK_DEFERRED_REPLY})
        }
        Acknowledgement::DeferUpdate => json!({"type": CALLBACK_DEFERRED_UPDATE}),
    }
}

pub fn autocomplete_body(choices: &[AutocompleteChoice]) -> serde_json::Value {
    json!({"type": CALLBACK_AUTOCOMPLETE_RESULT, "data": {"choices": choices}})
}

#[async_trait]
impl InteractionResponder for HttpResponder {
    async fn acknowledge(
        &self,
        ctx: &InteractionContext,
        acknowledgement: Acknowledgement,
    ) -> Result<(), ReplyError> {
        let body = acknowledgement_body(acknowledgement);
        self.send("acknowledge", Method::POST, self.callback_url(ctx), Some(&body), false).await
    }

    async fn edit_original(
        &self,
        ctx: &InteractionContext,
        payload: &MessagePayload,
    ) -> Result<(), ReplyError> {
        let url = format!("{}/messages/@original", self.webhook_url(ctx));
        self.send("edit_original", Method::PATCH, url, Some(payload), false).await
    }

    async fn follow_up(
        &self,
        ctx: &InteractionContext,
        payload: &MessagePayload,
    ) -> Result<(), ReplyError> {
        self.send("follow_up", Method::POST, self.webhook_url(ctx), Some(payload), false).await
    }

    async fn autocomplete(
        &self,
        ctx: &InteractionContext,
        choices: &[AutocompleteChoice],
    ) -> Result<(), ReplyError> {
        let body = autocomplete_body(choices);
        self.send("autocomplete", Method::POST, self.callback_url(ctx), Some(&body), false).await
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<(), ReplyError> {
        let url = format!("{}/channels/{channel_id}/messages/{message_id}", self.api_base_url);
        self.send::<serde_json::Value>("delete_message", Method::DELETE, url, None, true).await
    }
}
