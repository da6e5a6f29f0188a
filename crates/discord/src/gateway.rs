use std::sync::atomic::{AtomicBool, Ordering};
use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use docbot_core::config::GatewayConfig;
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::dispatcher::InteractionDispatcher;
use crate::events::InteractionContext;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("gateway failed to connect: {0}")]
    Connect(String),
    #[error("gateway read failed: {0}")]
    Receive(String),
    #[error("gateway write failed: {0}")]
    Send(String),
    #[error("gateway session ended by server: {0}")]
    Session(String),
    #[error("gateway disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 1_000, max_delay_ms: 60_000 }
    }
}

impl From<&GatewayConfig> for ReconnectPolicy {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Source of raw `INTERACTION_CREATE` payloads. `Ok(None)` is a clean end of stream.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_interaction(&self) -> Result<Option<Value>, TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopGatewayTransport;

#[async_trait]
impl GatewayTransport for NoopGatewayTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_interaction(&self) -> Result<Option<Value>, TransportError> {
        Ok(None)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Shared view of whether the runner has given up on the gateway.
#[derive(Clone, Debug, Default)]
pub struct GatewayStatus {
    stopped: Arc<AtomicBool>,
}

impl GatewayStatus {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn mark_stopped(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}

struct SessionFailure {
    connected: bool,
    error: TransportError,
}

pub struct GatewayRunner {
    transport: Arc<dyn GatewayTransport>,
    dispatcher: Arc<InteractionDispatcher>,
    reconnect_policy: ReconnectPolicy,
    status: GatewayStatus,
}

impl GatewayRunner {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        dispatcher: Arc<InteractionDispatcher>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy, status: GatewayStatus::default() }
    }

    pub fn status(&self) -> GatewayStatus {
        self.status.clone()
    }

    /// Pumps interactions until the stream closes cleanly or reconnects are
    /// exhausted. A session that got connected resets the retry budget.
    /// Exhausted retries are an error; either way the status is marked stopped.
    pub async fn start(&self) -> Result<()> {
        let outcome = self.run_sessions().await;
        self.status.mark_stopped();
        outcome
    }

    async fn run_sessions(&self) -> Result<()> {
        let mut attempt = 0_u32;
        loop {
            let Err(failure) = self.connect_and_pump(attempt).await else {
                return Ok(());
            };
            if failure.connected {
                attempt = 0;
            }

            warn!(
                event_name = "ingress.discord.transport_failed",
                attempt,
                max_retries = self.reconnect_policy.max_retries,
                error = %failure.error,
                "discord gateway transport failed"
            );

            if attempt >= self.reconnect_policy.max_retries {
                return Err(anyhow!(
                    "discord gateway retries exhausted after {} attempts: {}",
                    attempt + 1,
                    failure.error
                ));
            }

            let delay = self.reconnect_policy.backoff(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), SessionFailure> {
        info!(attempt, "opening discord gateway connection");
        self.transport
            .connect()
            .await
            .map_err(|error| SessionFailure { connected: false, error })?;
        info!(attempt, "discord gateway connected");

        let mut in_flight = JoinSet::new();
        loop {
            while in_flight.try_join_next().is_some() {}

            let payload = match self.transport.next_interaction().await {
                Ok(Some(payload)) => payload,
                Ok(None) => {
                    info!(attempt, in_flight = in_flight.len(), "discord gateway stream closed");
                    while in_flight.join_next().await.is_some() {}
                    return self
                        .transport
                        .disconnect()
                        .await
                        .map_err(|error| SessionFailure { connected: true, error });
                }
                Err(error) => {
                    // Running handlers keep their own interaction tokens and finish on their own.
                    in_flight.detach_all();
                    return Err(SessionFailure { connected: true, error });
                }
            };

            let ctx = match InteractionContext::from_value(payload) {
                Ok(ctx) => ctx,
                Err(parse_error) => {
                    warn!(
                        event_name = "ingress.discord.interaction_rejected",
                        error = %parse_error,
                        "dropping unparseable interaction payload"
                    );
                    continue;
                }
            };

            info!(
                event_name = "ingress.discord.interaction_received",
                correlation_id = %ctx.id,
                kind = ctx.kind.label(),
                route = ctx.route_key().unwrap_or("none"),
                actor_id = %ctx.actor.id,
                guild_id = ctx.guild_id.as_deref().unwrap_or("dm"),
                "received discord interaction"
            );

            let dispatcher = Arc::clone(&self.dispatcher);
            in_flight.spawn(async move {
                let outcome = dispatcher.dispatch(&ctx).await;
                debug!(
                    event_name = "dispatch.completed",
                    correlation_id = %ctx.id,
                    outcome = ?outcome,
                    "interaction dispatch finished"
                );
            });
        }
    }
}
