use std::sync::Arc;

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};
use warp::ws::{Message, WebSocket, Ws};
use warp::Filter;

use crate::call_service::CallService;
use crate::chat::ChatHub;
use crate::id::ParticipantId;
use crate::signal::Signal;

/// Every connecting client is routed into this single room. Swapping in real
/// room routing is a transport-only change: the coordinator and call service
/// already treat a room/session identifier as an opaque string.
const DEMO_ROOM: &str = "demo";

#[derive(Debug, Deserialize)]
struct InboundEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    payload: String,
}

#[derive(Debug, Serialize)]
struct OutboundSignalEnvelope {
    #[serde(rename = "type")]
    kind: &'static str,
    payload: Signal,
}

/// Delivers a coordinator-originated signal to whichever connection is
/// currently serving that participant, if any. Registered once, at startup,
/// as the coordinator's signal callback.
#[derive(Default)]
pub struct ConnectionRegistry {
    senders: DashMap<ParticipantId, mpsc::UnboundedSender<Message>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        ConnectionRegistry {
            senders: DashMap::new(),
        }
    }

    fn register(&self, participant_id: ParticipantId, sender: mpsc::UnboundedSender<Message>) {
        self.senders.insert(participant_id, sender);
    }

    fn unregister(&self, participant_id: &ParticipantId) {
        self.senders.remove(participant_id);
    }

    /// Best-effort delivery: a signal addressed to a participant who has
    /// already disconnected is simply dropped.
    pub fn send_signal(&self, participant_id: &ParticipantId, signal: Signal) {
        let Some(sender) = self.senders.get(participant_id) else {
            debug!(participant = %participant_id, "dropping signal for disconnected participant");
            return;
        };
        let envelope = OutboundSignalEnvelope { kind: "signal", payload: signal };
        let Ok(json) = serde_json::to_string(&envelope) else {
            return;
        };
        let _ = sender.send(Message::text(json));
    }
}

pub fn routes(
    call_service: Arc<CallService>,
    chat_hub: Arc<ChatHub>,
    connections: Arc<ConnectionRegistry>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("ws").and(warp::ws()).map(move |ws: Ws| {
        let call_service = call_service.clone();
        let chat_hub = chat_hub.clone();
        let connections = connections.clone();
        ws.on_upgrade(move |socket| handle_connection(socket, call_service, chat_hub, connections))
    })
}

async fn handle_connection(
    socket: WebSocket,
    call_service: Arc<CallService>,
    chat_hub: Arc<ChatHub>,
    connections: Arc<ConnectionRegistry>,
) {
    let participant_id = ParticipantId::generate();
    info!(participant = %participant_id, "client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Message>();

    connections.register(participant_id.clone(), out_tx.clone());
    chat_hub.register(participant_id.clone(), out_tx.clone());

    let mut out_rx = UnboundedReceiverStream::new(out_rx);
    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.next().await {
            if ws_tx.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = ws_rx.next().await {
        let message = match result {
            Ok(message) => message,
            Err(e) => {
                warn!(participant = %participant_id, error = %e, "websocket read error");
                break;
            }
        };

        if message.is_close() {
            break;
        }
        let Ok(text) = message.to_str() else {
            continue;
        };

        let envelope: InboundEnvelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(participant = %participant_id, error = %e, "malformed envelope, dropping connection");
                break;
            }
        };

        match envelope.kind.as_str() {
            "join_call" => match call_service.join(DEMO_ROOM, participant_id.clone()).await {
                Ok(offer) => connections.send_signal(&participant_id, offer),
                Err(e) => error!(participant = %participant_id, error = %e, "join failed"),
            },
            "signal" => {
                let signal: Signal = match serde_json::from_str(&envelope.payload) {
                    Ok(signal) => signal,
                    Err(e) => {
                        warn!(participant = %participant_id, error = %e, "malformed signal payload");
                        continue;
                    }
                };
                if let Err(e) = call_service.signal(DEMO_ROOM, participant_id.clone(), signal).await {
                    error!(participant = %participant_id, error = %e, "failed to apply signal");
                }
            }
            _ => chat_hub.broadcast(&participant_id, envelope.content),
        }
    }

    info!(participant = %participant_id, "client disconnected");
    connections.unregister(&participant_id);
    chat_hub.unregister(&participant_id);
    call_service.leave(DEMO_ROOM, participant_id).await;
    writer.abort();
}
