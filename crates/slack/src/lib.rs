//! Slack delivery adapter for the cost estimator.
//!
//! - **Socket Mode** (`socket`) - WebSocket connection to Slack (no public URL needed)
//! - **Slash Commands** (`commands`) - `/estimate <architecture description>`
//! - **Events** (`events`) - direct messages and app mentions
//! - **Block Kit** (`blocks`) - reply formatting within Slack's size limits
//! - **Web API** (`web`) - `chat.postMessage` delivery of replies
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Enable Socket Mode and subscribe to `app_mention` and `message.im`
//! 3. Add the `/estimate` slash command
//! 4. Set env vars: `CLOUDCOST_SLACK_ENABLED=true`, `CLOUDCOST_SLACK_APP_TOKEN`, `CLOUDCOST_SLACK_BOT_TOKEN`
//!
//! # Architecture
//!
//! ```text
//! Slack Events → EventDispatcher → Handlers → EstimationService
//!                                      ↓
//!              chat.postMessage ← Block Kit reply
//! ```
//!
//! Handlers only translate: a message becomes a `Task`, the `Response` becomes
//! a threaded reply. Request signing and token exchange are handled by Slack
//! and the app-level token.

pub mod blocks;
pub mod commands;
pub mod events;
pub mod socket;
pub mod web;

pub use events::{estimation_dispatcher, EventDispatcher, OutboundMessage};
pub use socket::{ReconnectPolicy, SocketModeRunner, SocketTransport, WebSocketTransport};
pub use web::{MessagePoster, SlackWebClient};
