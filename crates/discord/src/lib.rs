//! Discord interface for docbot
//!
//! - **Gateway** (`gateway`, `websocket`) - websocket session with heartbeat and
//!   reconnect policy; every `INTERACTION_CREATE` is parsed once and dispatched
//!   on its own task
//! - **Interactions** (`events`) - slash commands, buttons, select menus and
//!   autocomplete, classified into one `InteractionContext`
//! - **Dispatch** (`registry`, `dispatcher`) - handler lookup, permission gate,
//!   cooldowns and the defer/edit/follow-up reply protocol
//! - **Payloads** (`components`, `commands`) - embeds, buttons, select menus and
//!   slash-command definitions, clamped to platform limits
//! - **Replies** (`responder`) - REST transport for interaction callbacks
//!
//! # Architecture
//!
//! ```text
//! Gateway → GatewayRunner → InteractionDispatcher → HandlerEntry → docbot-docs
//!                                   ↓
//!                      InteractionResponder ← HandlerReply
//! ```

pub mod commands;
pub mod components;
pub mod dispatcher;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod registry;
pub mod responder;
pub mod websocket;
