use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::gateway::{GatewayTransport, TransportError};

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

/// Interactions arrive without any privileged intent.
const INTENTS: u64 = 0;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Sink = Arc<Mutex<SplitSink<Socket, Message>>>;
type Sequence = Arc<Mutex<Option<u64>>>;

#[derive(Debug, Deserialize)]
struct GatewayFrame {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

#[derive(Debug, PartialEq)]
enum FrameAction {
    Interaction(Value),
    Ready,
    HeartbeatNow,
    HeartbeatAck,
    Reconnect,
    InvalidSession,
    Skip,
}

fn interpret(frame: GatewayFrame) -> FrameAction {
    match frame.op {
        OP_DISPATCH => match frame.t.as_deref() {
            Some("INTERACTION_CREATE") => FrameAction::Interaction(frame.d),
            Some("READY") => FrameAction::Ready,
            _ => FrameAction::Skip,
        },
        OP_HEARTBEAT => FrameAction::HeartbeatNow,
        OP_HEARTBEAT_ACK => FrameAction::HeartbeatAck,
        OP_RECONNECT => FrameAction::Reconnect,
        OP_INVALID_SESSION => FrameAction::InvalidSession,
        _ => FrameAction::Skip,
    }
}

fn identify_payload(token: &SecretString) -> Value {
    json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": token.expose_secret(),
            "intents": INTENTS,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "docbot",
                "device": "docbot"
            }
        }
    })
}

fn heartbeat_payload(sequence: Option<u64>) -> Value {
    json!({"op": OP_HEARTBEAT, "d": sequence})
}

fn hello_interval(frame: &GatewayFrame) -> Option<Duration> {
    if frame.op != OP_HELLO {
        return None;
    }
    frame.d.get("heartbeat_interval").and_then(Value::as_u64).map(Duration::from_millis)
}

async fn send_json(sink: &Sink, payload: &Value) -> Result<(), TransportError> {
    sink.lock()
        .await
        .send(Message::Text(payload.to_string().into()))
        .await
        .map_err(|error| TransportError::Send(error.to_string()))
}

/// Beats every `interval` after a jittered first beat. Each beat requires the
/// previous one to have been acknowledged; the returned reason ends the session.
async fn heartbeat_loop<F, Fut>(
    interval: Duration,
    jitter: f64,
    acked: Arc<AtomicBool>,
    mut beat: F,
) -> String
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), TransportError>>,
{
    acked.store(true, Ordering::Release);
    tokio::time::sleep(interval.mul_f64(jitter)).await;
    loop {
        if !acked.swap(false, Ordering::AcqRel) {
            return "heartbeat not acknowledged".to_owned();
        }
        if let Err(error) = beat().await {
            return format!("heartbeat send failed: {error}");
        }
        tokio::time::sleep(interval).await;
    }
}

struct Session {
    source: SplitStream<Socket>,
    sink: Sink,
    sequence: Sequence,
    acked: Arc<AtomicBool>,
    heartbeat_failure: oneshot::Receiver<String>,
    heartbeat: JoinHandle<()>,
}

impl Session {
    fn shutdown(self) -> Sink {
        self.heartbeat.abort();
        self.sink
    }
}

/// Discord gateway websocket session: Hello, Identify, a background heartbeat,
/// then a stream of `INTERACTION_CREATE` payloads. Resume is not attempted;
/// any server-initiated end surfaces as an error so the runner reconnects.
pub struct WebSocketGateway {
    url: String,
    token: SecretString,
    session: Mutex<Option<Session>>,
}

impl WebSocketGateway {
    pub fn new(url: impl Into<String>, token: SecretString) -> Self {
        Self { url: url.into(), token, session: Mutex::new(None) }
    }

    fn spawn_heartbeat(
        sink: Sink,
        sequence: Sequence,
        acked: Arc<AtomicBool>,
        interval: Duration,
        failure: oneshot::Sender<String>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let beat = || {
                let sink = Arc::clone(&sink);
                let sequence = Arc::clone(&sequence);
                async move {
                    let last = *sequence.lock().await;
                    send_json(&sink, &heartbeat_payload(last)).await?;
                    debug!(sequence = ?last, "discord gateway heartbeat sent");
                    Ok::<(), TransportError>(())
                }
            };
            let reason = heartbeat_loop(interval, rand::random::<f64>(), acked, beat).await;
            warn!(
                event_name = "ingress.discord.heartbeat_failed",
                reason = %reason,
                "stopping heartbeat"
            );
            let _ = failure.send(reason);
        })
    }
}

async fn read_frame(source: &mut SplitStream<Socket>) -> Result<GatewayFrame, TransportError> {
    loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(text.as_str()).map_err(|error| {
                    TransportError::Receive(format!("invalid gateway frame: {error}"))
                });
            }
            Some(Ok(Message::Close(frame))) => {
                let reason = frame
                    .map(|frame| {
                        let code = u16::from(frame.code);
                        format!("closed with code {code}: {}", frame.reason.as_str())
                    })
                    .unwrap_or_else(|| "closed without a close frame".to_owned());
                return Err(TransportError::Session(reason));
            }
            Some(Ok(_)) => continue,
            Some(Err(error)) => return Err(TransportError::Receive(error.to_string())),
            None => return Err(TransportError::Session("stream ended".to_owned())),
        }
    }
}

#[async_trait]
impl GatewayTransport for WebSocketGateway {
    async fn connect(&self) -> Result<(), TransportError> {
        let (socket, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (sink, mut source) = socket.split();
        let sink: Sink = Arc::new(Mutex::new(sink));

        let hello = read_frame(&mut source).await?;
        let interval = hello_interval(&hello).ok_or_else(|| {
            TransportError::Connect(format!("expected hello, got opcode {}", hello.op))
        })?;

        send_json(&sink, &identify_payload(&self.token)).await?;

        let sequence: Sequence = Arc::new(Mutex::new(None));
        let acked = Arc::new(AtomicBool::new(true));
        let (failure, heartbeat_failure) = oneshot::channel();
        let heartbeat = Self::spawn_heartbeat(
            Arc::clone(&sink),
            Arc::clone(&sequence),
            Arc::clone(&acked),
            interval,
            failure,
        );

        let session = Session { source, sink, sequence, acked, heartbeat_failure, heartbeat };
        let previous = self.session.lock().await.replace(session);
        if let Some(previous) = previous {
            previous.shutdown();
        }

        info!(
            event_name = "ingress.discord.identified",
            heartbeat_interval_ms = interval.as_millis() as u64,
            "discord gateway identified"
        );
        Ok(())
    }

    async fn next_interaction(&self) -> Result<Option<Value>, TransportError> {
        let mut guard = self.session.lock().await;
        let Some(session) = guard.as_mut() else {
            return Err(TransportError::Receive("gateway is not connected".to_owned()));
        };

        let result = loop {
            let read = tokio::select! {
                read = read_frame(&mut session.source) => read,
                reason = &mut session.heartbeat_failure => {
                    let reason = reason.unwrap_or_else(|_| "heartbeat task stopped".to_owned());
                    break Err(TransportError::Session(reason));
                }
            };
            let frame = match read {
                Ok(frame) => frame,
                Err(error) => break Err(error),
            };
            if let Some(sequence) = frame.s {
                *session.sequence.lock().await = Some(sequence);
            }

            match interpret(frame) {
                FrameAction::Interaction(payload) => return Ok(Some(payload)),
                FrameAction::Ready => info!("discord gateway session ready"),
                FrameAction::HeartbeatNow => {
                    let last = *session.sequence.lock().await;
                    if let Err(error) = send_json(&session.sink, &heartbeat_payload(last)).await {
                        break Err(error);
                    }
                }
                FrameAction::Reconnect => {
                    break Err(TransportError::Session("server requested reconnect".to_owned()))
                }
                FrameAction::InvalidSession => {
                    break Err(TransportError::Session("session invalidated".to_owned()))
                }
                FrameAction::HeartbeatAck => {
                    session.acked.store(true, Ordering::Release);
                    debug!("discord gateway heartbeat acknowledged");
                }
                FrameAction::Skip => {}
            }
        };

        if let Some(session) = guard.take() {
            session.shutdown();
        }
        result
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let Some(session) = self.session.lock().await.take() else {
            return Ok(());
        };
        let sink = session.shutdown();
        let mut writer = sink.lock().await;
        writer.close().await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::{
        heartbeat_loop, heartbeat_payload, hello_interval, identify_payload, interpret, FrameAction,
        GatewayFrame, OP_HEARTBEAT_ACK,
    };
    use crate::gateway::TransportError;

    fn frame(value: serde_json::Value) -> GatewayFrame {
        serde_json::from_value(value).expect("gateway frame")
    }

    #[test]
    fn only_interaction_dispatches_are_yielded() {
        let interaction =
            frame(json!({"op": 0, "s": 4, "t": "INTERACTION_CREATE", "d": {"id": "1"}}));
        assert_eq!(interpret(interaction), FrameAction::Interaction(json!({"id": "1"})));

        let message = frame(json!({"op": 0, "s": 5, "t": "MESSAGE_CREATE", "d": {}}));
        assert_eq!(interpret(message), FrameAction::Skip);

        let ack = frame(json!({"op": OP_HEARTBEAT_ACK}));
        assert_eq!(interpret(ack), FrameAction::HeartbeatAck);
    }

    #[test]
    fn session_control_opcodes_are_recognised() {
        assert_eq!(interpret(frame(json!({"op": 1, "d": null}))), FrameAction::HeartbeatNow);
        assert_eq!(interpret(frame(json!({"op": 7, "d": null}))), FrameAction::Reconnect);
        assert_eq!(interpret(frame(json!({"op": 9, "d": false}))), FrameAction::InvalidSession);
        assert_eq!(interpret(frame(json!({"op": 0, "t": "READY", "d": {}}))), FrameAction::Ready);
    }

    #[test]
    fn hello_carries_heartbeat_interval() {
        let hello = frame(json!({"op": 10, "d": {"heartbeat_interval": 41_250}}));
        assert_eq!(hello_interval(&hello), Some(Duration::from_millis(41_250)));
        assert_eq!(hello_interval(&frame(json!({"op": 11}))), None);
    }

    #[test]
    fn identify_and_heartbeat_payloads() {
        let identify = identify_payload(&"secret-token".to_owned().into());
        assert_eq!(identify["op"], 2);
        assert_eq!(identify["d"]["token"], "secret-token");
        assert_eq!(identify["d"]["intents"], 0);

        assert_eq!(heartbeat_payload(None), json!({"op": 1, "d": null}));
        assert_eq!(heartbeat_payload(Some(42)), json!({"op": 1, "d": 42}));
    }

    #[tokio::test]
    async fn unacknowledged_heartbeat_ends_the_session() {
        let beats = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&beats);
        let acked = Arc::new(AtomicBool::new(true));

        let reason = tokio::time::timeout(
            Duration::from_secs(2),
            heartbeat_loop(Duration::from_millis(10), 0.0, acked, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            }),
        )
        .await
        .expect("heartbeat loop should give up");

        assert_eq!(reason, "heartbeat not acknowledged");
        assert_eq!(beats.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn acknowledged_heartbeats_continue_until_a_send_fails() {
        let beats = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&beats);
        let acked = Arc::new(AtomicBool::new(true));
        let ack = Arc::clone(&acked);

        let reason = tokio::time::timeout(
            Duration::from_secs(2),
            heartbeat_loop(Duration::from_millis(5), 0.5, acked, move || {
                let sent = counter.fetch_add(1, Ordering::SeqCst) + 1;
                ack.store(true, Ordering::Release);
                async move {
                    if sent == 3 {
                        return Err(TransportError::Send("broken pipe".to_owned()));
                    }
                    Ok(())
                }
            }),
        )
        .await
        .expect("heartbeat loop should give up");

        assert_eq!(reason, "heartbeat send failed: gateway write failed: broken pipe");
        assert_eq!(beats.load(Ordering::SeqCst), 3);
    }
}
