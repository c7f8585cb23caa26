use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use cloudcost_agent::EstimationService;
use cloudcost_core::config::SlackConfig;
use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::events::{
    estimation_dispatcher, EventContext, EventDispatcher, HandlerResult, SlackEnvelope, SlackEvent,
};
use crate::web::{MessagePoster, SlackWebClient};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
    #[error("server requested a reconnect: {0}")]
    Refresh(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
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

/// `next_envelope` returning `Ok(None)` means the stream is finished for good;
/// `TransportError::Refresh` asks the runner to reconnect without backoff.
#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket Mode over a real WebSocket. Each `connect` asks the Web API for a
/// fresh single-use URL.
pub struct WebSocketTransport {
    web: Arc<SlackWebClient>,
    app_token: SecretString,
    stream: Mutex<Option<SocketStream>>,
}

impl WebSocketTransport {
    pub fn new(web: Arc<SlackWebClient>, app_token: SecretString) -> Self {
        Self { web, app_token, stream: Mutex::new(None) }
    }
}

#[async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = self
            .web
            .open_connection(&self.app_token)
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (stream, _) =
            connect_async(url.as_str()).await.map_err(|error| TransportError::Connect(error.to_string()))?;

        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut guard = self.stream.lock().await;
        let Some(stream) = guard.as_mut() else {
            return Err(TransportError::Receive("socket is not connected".to_owned()));
        };

        while let Some(message) = stream.next().await {
            let message = message.map_err(|error| TransportError::Receive(error.to_string()))?;
            let text = match message {
                Message::Text(text) => text,
                Message::Close(frame) => {
                    let reason = frame.map(|frame| frame.reason.as_str().to_owned()).unwrap_or_default();
                    return Err(TransportError::Refresh(format!("socket closed: {reason}")));
                }
                // Pings are answered by the protocol layer.
                _ => continue,
            };

            let frame: Value = match serde_json::from_str(text.as_str()) {
                Ok(frame) => frame,
                Err(error) => {
                    warn!(event_name = "ingress.slack.frame_invalid", error = %error, "ignoring non-json socket frame");
                    continue;
                }
            };

            match frame.get("type").and_then(Value::as_str) {
                Some("hello") => {
                    debug!(event_name = "ingress.slack.hello", "socket mode session ready");
                }
                Some("disconnect") => {
                    let reason = frame.get("reason").and_then(Value::as_str).unwrap_or("unspecified");
                    return Err(TransportError::Refresh(reason.to_owned()));
                }
                _ => {
                    if let Some(envelope) = SlackEnvelope::from_socket_frame(&frame) {
                        return Ok(Some(envelope));
                    }
                }
            }
        }

        Err(TransportError::Refresh("socket stream ended".to_owned()))
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let mut guard = self.stream.lock().await;
        let Some(stream) = guard.as_mut() else {
            return Err(TransportError::Acknowledge("socket is not connected".to_owned()));
        };

        let ack = json!({ "envelope_id": envelope_id }).to_string();
        stream.send(Message::Text(ack.into())).await.map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let Some(mut stream) = self.stream.lock().await.take() else {
            return Ok(());
        };
        stream.close(None).await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: Arc<EventDispatcher>,
    poster: Arc<dyn MessagePoster>,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        poster: Arc<dyn MessagePoster>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher: Arc::new(dispatcher), poster, reconnect_policy }
    }

    /// Wires the WebSocket transport and Web API poster from configured tokens.
    pub fn from_config(config: &SlackConfig, service: Arc<dyn EstimationService>) -> Result<Self> {
        let web = Arc::new(SlackWebClient::new(config.bot_token.clone())?);
        let transport = Arc::new(WebSocketTransport::new(Arc::clone(&web), config.app_token.clone()));

        Ok(Self::new(transport, estimation_dispatcher(service), web, ReconnectPolicy::default()))
    }

    /// Runs until the transport finishes or retries are exhausted. Replies still
    /// being computed are awaited before returning.
    pub async fn start(&self) -> Result<()> {
        let mut in_flight = JoinSet::new();
        let mut attempt = 0;

        loop {
            match self.connect_and_pump(attempt, &mut in_flight).await {
                Ok(()) => break,
                Err(TransportError::Refresh(reason)) => {
                    info!(event_name = "ingress.slack.refresh", reason = %reason, "reconnecting socket mode transport");
                    if let Err(error) = self.transport.disconnect().await {
                        debug!(error = %error, "stale socket did not close cleanly");
                    }
                    attempt = 0;
                }
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; continuing process without crash"
                        );
                        break;
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }

        while in_flight.join_next().await.is_some() {}
        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32, in_flight: &mut JoinSet<()>) -> Result<(), TransportError> {
        info!(attempt, "opening socket mode transport connection");
        self.transport.connect().await?;
        info!(attempt, "socket mode transport connected");

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "socket mode transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                requester = requester(&envelope).unwrap_or("unknown"),
                "received slack envelope"
            );

            // Slack retries envelopes not acknowledged within three seconds, so the
            // ack goes out before the estimate runs.
            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    "acknowledged slack envelope"
                );
            }

            in_flight.spawn(handle_envelope(Arc::clone(&self.dispatcher), Arc::clone(&self.poster), envelope));
            while in_flight.try_join_next().is_some() {}
        }
    }
}

async fn handle_envelope(dispatcher: Arc<EventDispatcher>, poster: Arc<dyn MessagePoster>, envelope: SlackEnvelope) {
    let context = EventContext { correlation_id: envelope.envelope_id.clone() };

    match dispatcher.dispatch(&envelope, &context).await {
        Ok(HandlerResult::Responded(outbound)) => match poster.post(&outbound).await {
            Ok(()) => info!(
                event_name = "egress.slack.reply_posted",
                correlation_id = %context.correlation_id,
                channel_id = %outbound.channel_id,
                "posted slack reply"
            ),
            Err(error) => warn!(
                event_name = "egress.slack.reply_failed",
                correlation_id = %context.correlation_id,
                channel_id = %outbound.channel_id,
                error = %error,
                "failed to post slack reply"
            ),
        },
        Ok(HandlerResult::Processed | HandlerResult::Ignored) => {
            debug!(correlation_id = %context.correlation_id, "slack envelope needed no reply");
        }
        Err(error) => {
            warn!(
                envelope_id = %envelope.envelope_id,
                correlation_id = %context.correlation_id,
                error = %error,
                "event dispatch failed; continuing socket loop"
            );
        }
    }
}

fn requester(envelope: &SlackEnvelope) -> Option<&str> {
    match &envelope.event {
        SlackEvent::SlashCommand(payload) => Some(&payload.user_id),
        SlackEvent::DirectMessage(event) | SlackEvent::AppMention(event) => Some(&event.user_id),
        SlackEvent::Unsupported { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use cloudcost_core::Response;
    use tokio::sync::Mutex;

    use super::{requester, ReconnectPolicy, SocketModeRunner, SocketTransport, TransportError};
    use crate::commands::testing::RecordingEstimator;
    use crate::commands::SlashCommandPayload;
    use crate::events::{estimation_dispatcher, EventDispatcher, OutboundMessage, SlackEnvelope, SlackEvent};
    use crate::web::{MessagePoster, WebApiError};

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        envelopes: VecDeque<Result<Option<SlackEnvelope>, TransportError>>,
        connect_attempts: usize,
        acknowledgements: Vec<String>,
        disconnect_calls: usize,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            envelopes: Vec<Result<Option<SlackEnvelope>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    envelopes: envelopes.into(),
                    ..ScriptedState::default()
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn acknowledgements(&self) -> Vec<String> {
            self.state.lock().await.acknowledgements.clone()
        }

        async fn disconnect_calls(&self) -> usize {
            self.state.lock().await.disconnect_calls
        }
    }

    #[async_trait]
    impl SocketTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
            let mut state = self.state.lock().await;
            state.envelopes.pop_front().unwrap_or(Ok(None))
        }

        async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.acknowledgements.push(envelope_id.to_owned());
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.disconnect_calls += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingPoster {
        posted: Mutex<Vec<OutboundMessage>>,
    }

    #[async_trait]
    impl MessagePoster for RecordingPoster {
        async fn post(&self, message: &OutboundMessage) -> Result<(), WebApiError> {
            self.posted.lock().await.push(message.clone());
            Ok(())
        }
    }

    fn unsupported(envelope_id: &str) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: envelope_id.to_owned(),
            event: SlackEvent::Unsupported { event_type: "test".to_owned() },
        }
    }

    fn no_delay(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy { max_retries, base_delay_ms: 0, max_delay_ms: 0 }
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![Ok(Some(unsupported("env-1"))), Ok(None)],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            Arc::new(RecordingPoster::default()),
            no_delay(2),
        );

        runner.start().await.expect("runner should not fail");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.acknowledgements().await, vec!["env-1"]);
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            Arc::new(RecordingPoster::default()),
            no_delay(2),
        );

        runner.start().await.expect("runner should degrade gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn refresh_requests_do_not_consume_retries() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![],
            vec![
                Err(TransportError::Refresh("refresh_requested".to_owned())),
                Err(TransportError::Refresh("refresh_requested".to_owned())),
                Ok(Some(unsupported("env-2"))),
                Ok(None),
            ],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            Arc::new(RecordingPoster::default()),
            no_delay(0),
        );

        runner.start().await.expect("runner");

        assert_eq!(transport.connect_attempts().await, 3);
        assert_eq!(transport.acknowledgements().await, vec!["env-2"]);
        assert_eq!(transport.disconnect_calls().await, 3);
    }

    #[tokio::test]
    async fn slash_command_reply_is_posted_to_channel() {
        let envelope = SlackEnvelope {
            envelope_id: "env-3".to_owned(),
            event: SlackEvent::SlashCommand(SlashCommandPayload {
                command: "/estimate".to_owned(),
                text: "100 GB of S3 Standard".to_owned(),
                channel_id: "C7".to_owned(),
                user_id: "U7".to_owned(),
                trigger_id: "t".to_owned(),
                request_id: "env-3".to_owned(),
            }),
        };
        let transport = Arc::new(ScriptedTransport::with_script(vec![], vec![Ok(Some(envelope)), Ok(None)]));
        let poster = Arc::new(RecordingPoster::default());
        let estimator = Arc::new(RecordingEstimator::new(Response::answered("Total: $2.30/month")));

        let runner = SocketModeRunner::new(
            transport.clone(),
            estimation_dispatcher(estimator.clone()),
            poster.clone(),
            no_delay(0),
        );
        runner.start().await.expect("runner");

        let posted = poster.posted.lock().await.clone();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].channel_id, "C7");
        assert_eq!(posted[0].thread_ts, None);
        assert_eq!(posted[0].template.fallback_text, "Total: $2.30/month");
        assert_eq!(estimator.tasks().await.len(), 1);
    }

    #[test]
    fn requester_comes_from_event_sender() {
        assert_eq!(requester(&unsupported("env-4")), None);
    }
}
