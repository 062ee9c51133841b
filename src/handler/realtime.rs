//! WebSocket endpoint for the realtime bus.
//!
//! Client → server:
//! ```json
//! { "type": "subscribe", "topic": "ticket.<id>" }
//! { "type": "unsubscribe", "topic": "ticket.<id>" }
//! { "type": "ping" }
//! ```
//!
//! Server → client:
//! ```json
//! { "type": "subscribed", "topic": "ticket.<id>" }
//! { "type": "event", "topic": "ticket.<id>", "event": { "type": "message_created", ... } }
//! { "type": "error", "topic": "ticket.<id>", "message": "..." }
//! ```
//!
//! Every connection is joined to its own `user.<id>` topic on connect.
use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Extension, Router,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
};
use uuid::Uuid;

use crate::{
    db::ticketdb::TicketExt,
    middleware::JWTAuthMiddeware,
    models::usermodel::User,
    service::{
        error::ServiceError,
        realtime::{user_topic, RealtimeBus, RealtimeEvent},
    },
    AppState,
};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    Ping,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Subscribed { topic: String },
    Unsubscribed { topic: String },
    Event { topic: String, event: RealtimeEvent },
    Error { topic: Option<String>, message: String },
    Pong,
}

pub fn realtime_handler() -> Router {
    Router::new().route("/ws", get(ws_handler))
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection requested by {}", auth.user.id);
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, auth.user))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user: User) {
    let user_id = user.id;
    let (mut sender, mut receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerMessage>();

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let Ok(json) = serde_json::to_string(&message) else {
                continue;
            };
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_state = app_state.clone();
    let recv_tx = out_tx.clone();
    let mut recv_task = tokio::spawn(async move {
        // Dropping a stop sender ends its forwarder, so losing this map
        // (normal exit or abort) tears every subscription down.
        let mut forwarders: HashMap<String, oneshot::Sender<()>> = HashMap::new();

        let own_topic = user_topic(user.id);
        let rx = recv_state.realtime.subscribe(&own_topic).await;
        let (stop, _) = forward(recv_state.realtime.clone(), own_topic.clone(), rx, recv_tx.clone());
        forwarders.insert(own_topic, stop);

        while let Some(Ok(msg)) = receiver.next().await {
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let reply = match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Subscribe { topic }) => {
                    if forwarders.contains_key(&topic) {
                        ServerMessage::Subscribed { topic }
                    } else {
                        match authorize_topic(&recv_state, &user, &topic).await {
                            Ok(rx) => {
                                let (stop, _) = forward(
                                    recv_state.realtime.clone(),
                                    topic.clone(),
                                    rx,
                                    recv_tx.clone(),
                                );
                                forwarders.insert(topic.clone(), stop);
                                tracing::info!("User {} subscribed to {}", user.id, topic);
                                ServerMessage::Subscribed { topic }
                            }
                            Err(e) => ServerMessage::Error {
                                topic: Some(topic),
                                message: e.to_string(),
                            },
                        }
                    }
                }
                Ok(ClientMessage::Unsubscribe { topic }) => {
                    forwarders.remove(&topic);
                    ServerMessage::Unsubscribed { topic }
                }
                Ok(ClientMessage::Ping) => ServerMessage::Pong,
                Err(e) => ServerMessage::Error {
                    topic: None,
                    message: format!("Invalid message: {}", e),
                },
            };

            if recv_tx.send(reply).is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    tracing::info!("WebSocket connection closed for {}", user_id);
}

/// Only `ticket.<id>` topics the user may view can be joined explicitly.
async fn authorize_topic(
    app_state: &AppState,
    user: &User,
    topic: &str,
) -> Result<broadcast::Receiver<RealtimeEvent>, ServiceError> {
    let ticket_id = topic
        .strip_prefix("ticket.")
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or_else(|| ServiceError::validation("topic", "Unknown topic"))?;

    let ticket = app_state
        .db_client
        .get_ticket(ticket_id)
        .await?
        .ok_or(ServiceError::TicketNotFound(ticket_id))?;

    app_state.realtime.subscribe_ticket(user, &ticket).await
}

/// Pipes one topic into the socket's outbound queue until the returned stop
/// sender is dropped or fired, the socket goes away, or the topic closes.
/// On exit the topic is pruned from the bus if nobody else listens.
fn forward(
    bus: RealtimeBus,
    topic: String,
    mut rx: broadcast::Receiver<RealtimeEvent>,
    tx: mpsc::UnboundedSender<ServerMessage>,
) -> (oneshot::Sender<()>, JoinHandle<()>) {
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = tx.closed() => break,
                received = rx.recv() => match received {
                    Ok(event) => {
                        let message = ServerMessage::Event {
                            topic: topic.clone(),
                            event,
                        };
                        if tx.send(message).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Subscriber on {} lagging, skipped {} events", topic, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        drop(rx);
        bus.prune(&topic).await;
    });

    (stop_tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_client_messages() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"subscribe","topic":"ticket.abc"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Subscribe { topic } if topic == "ticket.abc"));

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"shout"}"#).is_err());
    }

    #[tokio::test]
    async fn test_forwarder_prunes_topic_when_stopped() {
        let bus = RealtimeBus::new();
        let (tx, mut rx_out) = mpsc::unbounded_channel();
        let rx = bus.subscribe("ticket.t").await;

        let (stop, handle) = forward(bus.clone(), "ticket.t".to_string(), rx, tx);
        bus.publish(
            "ticket.t",
            RealtimeEvent::SupportTimeUpdated {
                ticket_id: Uuid::nil(),
                remaining_seconds: 5,
            },
        )
        .await;
        assert!(matches!(rx_out.recv().await, Some(ServerMessage::Event { .. })));

        drop(stop);
        handle.await.unwrap();
        assert_eq!(bus.topic_count().await, 0);
    }

    #[tokio::test]
    async fn test_forwarder_stops_when_socket_queue_closes() {
        let bus = RealtimeBus::new();
        let (tx, rx_out) = mpsc::unbounded_channel();
        let rx = bus.subscribe("user.u").await;

        let (_stop, handle) = forward(bus.clone(), "user.u".to_string(), rx, tx);
        drop(rx_out);
        handle.await.unwrap();

        assert_eq!(bus.topic_count().await, 0);
    }

    #[test]
    fn test_event_envelope_shape() {
        let ticket_id = Uuid::nil();
        let message = ServerMessage::Event {
            topic: format!("ticket.{}", ticket_id),
            event: RealtimeEvent::SupportTimeUpdated {
                ticket_id,
                remaining_seconds: 42,
            },
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["event"]["type"], "support_time_updated");
        assert_eq!(json["event"]["remaining_seconds"], 42);
    }
}
