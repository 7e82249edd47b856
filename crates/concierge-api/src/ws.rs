//! Chat WebSocket: envelope parsing, dispatch and the socket loop.

use axum::extract::ws::{Message, WebSocket};
use chrono::{DateTime, Utc};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use concierge_chat::ConversationHub;
use concierge_core::{ConversationStats, ExperienceList};

pub use concierge_chat::CLEARED_MESSAGE;

pub const WELCOME_MESSAGE: &str =
    "Connected to the experience concierge! Ask me about adventures, getaways and more.";
pub const GENERIC_ERROR_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

/// A parsed inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Chat(String),
    ClearMemory,
    GetStats,
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

/// An outbound frame, serialized with a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    System {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
    Typing {
        timestamp: DateTime<Utc>,
    },
    Response {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        experiences: Option<ExperienceList>,
        timestamp: DateTime<Utc>,
    },
    Stats {
        data: ConversationStats,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl ServerFrame {
    pub fn welcome(client_id: &str) -> Self {
        ServerFrame::System {
            message: WELCOME_MESSAGE.to_string(),
            client_id: Some(client_id.to_string()),
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Error {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    fn typing() -> Self {
        ServerFrame::Typing {
            timestamp: Utc::now(),
        }
    }
}

/// Parse one text frame. A missing `type` means chat; `user_message` is
/// accepted as an alias of `chat`.
pub fn parse_envelope(raw: &str) -> Result<Inbound, ServerFrame> {
    let envelope: RawEnvelope = serde_json::from_str(raw)
        .map_err(|_| ServerFrame::error("Invalid message format: expected a JSON object"))?;

    match envelope.kind.as_deref().unwrap_or("chat") {
        "chat" | "user_message" => Ok(Inbound::Chat(envelope.message.unwrap_or_default())),
        "clear_memory" => Ok(Inbound::ClearMemory),
        "get_stats" => Ok(Inbound::GetStats),
        other => Err(ServerFrame::error(format!("Unknown message type: {}", other))),
    }
}

/// Answer a parsed envelope.
pub async fn dispatch(hub: &ConversationHub, client_id: &str, inbound: Inbound) -> ServerFrame {
    match inbound {
        Inbound::Chat(message) => match hub.handle_chat(client_id, &message).await {
            Ok(reply) => ServerFrame::Response {
                message: reply.message,
                experiences: reply.experiences,
                timestamp: Utc::now(),
            },
            Err(e) if e.is_validation() => ServerFrame::error(e.to_string()),
            Err(e) => {
                warn!(client_id, error = %e, "Chat failed");
                ServerFrame::error(GENERIC_ERROR_MESSAGE)
            }
        },
        Inbound::ClearMemory => match hub.clear(client_id).await {
            Ok(()) => ServerFrame::System {
                message: CLEARED_MESSAGE.to_string(),
                client_id: None,
                timestamp: Utc::now(),
            },
            Err(e) => {
                warn!(client_id, error = %e, "Clear failed");
                ServerFrame::error(GENERIC_ERROR_MESSAGE)
            }
        },
        Inbound::GetStats => ServerFrame::Stats {
            data: hub.stats(client_id).await,
            timestamp: Utc::now(),
        },
    }
}

/// Drive one upgraded socket until the client goes away.
pub async fn run_socket(socket: WebSocket, hub: &ConversationHub, client_id: String) {
    let (sink, stream) = socket.split();
    serve_connection(sink, stream, hub, &client_id).await;
}

/// The connection loop: welcome, then one answer per inbound frame, with a
/// typing frame ahead of every chat reply. The session ends when the stream
/// closes or a send fails.
pub async fn serve_connection<Si, St>(mut sink: Si, mut stream: St, hub: &ConversationHub, client_id: &str)
where
    Si: Sink<Message> + Unpin,
    St: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    hub.begin_session(client_id).await;

    if send(&mut sink, &ServerFrame::welcome(client_id)).await {
        while let Some(msg) = stream.next().await {
            let raw = match msg {
                Ok(Message::Text(text)) => text.as_str().to_owned(),
                Ok(Message::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    debug!(client_id, error = %e, "WebSocket receive failed");
                    break;
                }
            };

            let frame = match parse_envelope(&raw) {
                Ok(inbound) => {
                    if matches!(inbound, Inbound::Chat(_))
                        && !send(&mut sink, &ServerFrame::typing()).await
                    {
                        break;
                    }
                    dispatch(hub, client_id, inbound).await
                }
                Err(frame) => frame,
            };

            if !send(&mut sink, &frame).await {
                break;
            }
        }
    }

    hub.end_session(client_id);
    info!(client_id, "WebSocket closed");
}

/// Serialize and send one frame. False once the peer is gone.
async fn send<Si>(sink: &mut Si, frame: &ServerFrame) -> bool
where
    Si: Sink<Message> + Unpin,
{
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to serialize frame");
            return true;
        }
    };
    sink.send(Message::Text(json.into())).await.is_ok()
}
