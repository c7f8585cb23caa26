use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use cloudcost_agent::EstimationService;
use cloudcost_core::Task;
use serde_json::Value;
use thiserror::Error;

use crate::{
    blocks::{self, MessageTemplate},
    commands::{run_estimate, CommandParseError, CommandRouter, SlashCommandPayload},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    DirectMessage(MessageEvent),
    AppMention(MessageEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::DirectMessage(_) => SlackEventType::DirectMessage,
            Self::AppMention(_) => SlackEventType::AppMention,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    DirectMessage,
    AppMention,
    Unsupported,
}

/// A user-authored message. Replies go to `thread_ts` when the message is
/// already in a thread, otherwise they start a thread under `message_ts`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel_id: String,
    pub message_ts: String,
    pub thread_ts: Option<String>,
    pub user_id: String,
    pub text: String,
}

impl MessageEvent {
    pub fn reply_thread(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.message_ts)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

/// Where a handler's reply should be posted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub channel_id: String,
    pub thread_ts: Option<String>,
    pub template: MessageTemplate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(OutboundMessage),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Every supported event routed to the same estimator.
pub fn estimation_dispatcher(service: Arc<dyn EstimationService>) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(Arc::clone(&service)));
    dispatcher.register(MessageHandler::direct_messages(Arc::clone(&service)));
    dispatcher.register(MessageHandler::app_mentions(service));
    dispatcher
}

pub struct SlashCommandHandler {
    router: CommandRouter,
}

impl SlashCommandHandler {
    pub fn new(service: Arc<dyn EstimationService>) -> Self {
        Self { router: CommandRouter::new(service) }
    }
}

#[async_trait]
impl EventHandler for SlashCommandHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let template = self.router.route(payload).await?;
        Ok(HandlerResult::Responded(OutboundMessage {
            channel_id: payload.channel_id.clone(),
            thread_ts: None,
            template,
        }))
    }
}

/// Handles direct messages or app mentions; one instance per event type.
pub struct MessageHandler {
    event_type: SlackEventType,
    service: Arc<dyn EstimationService>,
}

impl MessageHandler {
    pub fn direct_messages(service: Arc<dyn EstimationService>) -> Self {
        Self { event_type: SlackEventType::DirectMessage, service }
    }

    pub fn app_mentions(service: Arc<dyn EstimationService>) -> Self {
        Self { event_type: SlackEventType::AppMention, service }
    }
}

#[async_trait]
impl EventHandler for MessageHandler {
    fn event_type(&self) -> SlackEventType {
        self.event_type.clone()
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let (SlackEvent::DirectMessage(event) | SlackEvent::AppMention(event)) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let description = strip_mentions(&event.text);
        let template = if description.is_empty() || description.eq_ignore_ascii_case("help") {
            blocks::help_message()
        } else {
            let task = Task::new(description).with_requester(event.user_id.clone());
            run_estimate(self.service.as_ref(), &task).await
        };

        Ok(HandlerResult::Responded(OutboundMessage {
            channel_id: event.channel_id.clone(),
            thread_ts: Some(event.reply_thread().to_owned()),
            template,
        }))
    }
}

/// Removes `<@U123>` user mentions and collapses the surrounding whitespace.
pub fn strip_mentions(text: &str) -> String {
    let mut remaining = text;
    let mut stripped = String::with_capacity(text.len());

    while let Some(start) = remaining.find("<@") {
        stripped.push_str(&remaining[..start]);
        match remaining[start..].find('>') {
            Some(end) => remaining = &remaining[start + end + 1..],
            None => {
                remaining = &remaining[start..];
                break;
            }
        }
    }
    stripped.push_str(remaining);

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl SlackEnvelope {
    /// Decodes one Socket Mode frame. Frames without an envelope id (`hello`,
    /// `disconnect`) return `None`; unknown payloads become `Unsupported`.
    pub fn from_socket_frame(frame: &Value) -> Option<Self> {
        let envelope_id = frame.get("envelope_id")?.as_str()?.to_owned();
        let frame_type = str_field(frame, "type").unwrap_or_default();
        let payload = frame.get("payload").unwrap_or(&Value::Null);

        let event = match frame_type.as_str() {
            "slash_commands" => parse_slash_command(payload, &envelope_id),
            "events_api" => parse_event_callback(payload),
            other => SlackEvent::Unsupported { event_type: other.to_owned() },
        };

        Some(Self { envelope_id, event })
    }
}

fn parse_slash_command(payload: &Value, envelope_id: &str) -> SlackEvent {
    match (str_field(payload, "command"), str_field(payload, "channel_id"), str_field(payload, "user_id")) {
        (Some(command), Some(channel_id), Some(user_id)) => SlackEvent::SlashCommand(SlashCommandPayload {
            command,
            text: str_field(payload, "text").unwrap_or_default(),
            channel_id,
            user_id,
            trigger_id: str_field(payload, "trigger_id").unwrap_or_default(),
            request_id: envelope_id.to_owned(),
        }),
        _ => SlackEvent::Unsupported { event_type: "slash_commands".to_owned() },
    }
}

fn parse_event_callback(payload: &Value) -> SlackEvent {
    let event = payload.get("event").unwrap_or(&Value::Null);
    let event_type = str_field(event, "type").unwrap_or_else(|| "unknown".to_owned());

    // Bot echoes and edits carry a bot_id or a subtype; answering them would loop.
    if event.get("bot_id").is_some() || event.get("subtype").is_some() {
        return SlackEvent::Unsupported { event_type };
    }

    let Some(message) = parse_message_event(event) else {
        return SlackEvent::Unsupported { event_type };
    };

    match event_type.as_str() {
        "app_mention" => SlackEvent::AppMention(message),
        "message" if str_field(event, "channel_type").as_deref() == Some("im") => {
            SlackEvent::DirectMessage(message)
        }
        _ => SlackEvent::Unsupported { event_type },
    }
}

fn parse_message_event(event: &Value) -> Option<MessageEvent> {
    Some(MessageEvent {
        channel_id: str_field(event, "channel")?,
        message_ts: str_field(event, "ts")?,
        thread_ts: str_field(event, "thread_ts"),
        user_id: str_field(event, "user")?,
        text: str_field(event, "text").unwrap_or_default(),
    })
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}
