use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::api::rest::ApiState;
use crate::router::engine::RouterEngine;
use crate::router::registry::OutboundMessage;
use crate::types::asset::AssetClass;
use crate::types::ids::ConnectionId;

/// Symbol payloads historically arrived both as a bare string and as an
/// array; both are valid. Normalization to a list happens here at the edge,
/// once, so nothing deeper ever sees the ambiguity.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum SymbolSelector {
    One(String),
    Many(Vec<String>),
}

impl SymbolSelector {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            SymbolSelector::One(symbol) => vec![symbol],
            SymbolSelector::Many(symbols) => symbols,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ClientRequest {
    #[serde(rename_all = "camelCase")]
    Subscribe {
        asset_class: AssetClass,
        #[serde(default)]
        symbols: Option<SymbolSelector>,
    },
    #[serde(rename_all = "camelCase")]
    Unsubscribe {
        asset_class: AssetClass,
        #[serde(default)]
        symbols: Option<SymbolSelector>,
    },
    #[serde(rename_all = "camelCase")]
    SubscribeClass {
        asset_class: AssetClass,
    },
    #[serde(rename_all = "camelCase")]
    UnsubscribeClass {
        asset_class: AssetClass,
    },
    Ping,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ApiState>>,
) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let connection_id = ConnectionId::new();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<OutboundMessage>();
    state.engine.register_connection(connection_id, out_tx);
    tracing::info!(connection = %connection_id, "websocket connected");

    let (mut sender, mut receiver) = socket.split();

    // Drain the outbound queue into the socket; the queue decouples the
    // router from socket backpressure.
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let engine = state.engine.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => handle_client_request(&engine, connection_id, &text),
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    // The single full-cleanup path, reached on normal and abnormal
    // disconnects alike.
    state.engine.remove_connection(connection_id);
    tracing::info!(connection = %connection_id, "websocket disconnected");
}

fn handle_client_request(engine: &Arc<RouterEngine>, id: ConnectionId, text: &str) {
    let registry = engine.registry();

    let request: ClientRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            let _ = registry.send_to(
                id,
                OutboundMessage::Error {
                    code: "BadRequest".to_string(),
                    message: e.to_string(),
                },
            );
            return;
        }
    };

    match request {
        ClientRequest::Subscribe {
            asset_class,
            symbols,
        } => {
            let symbols = symbols.map(SymbolSelector::into_vec).unwrap_or_default();
            match engine.subscribe(id, asset_class, &symbols) {
                Ok(_) => {
                    let _ = registry.send_to(
                        id,
                        OutboundMessage::Subscribed {
                            asset_class,
                            symbols,
                        },
                    );
                }
                Err(e) => {
                    let _ = registry.send_to(
                        id,
                        OutboundMessage::Error {
                            code: e.code().to_string(),
                            message: e.to_string(),
                        },
                    );
                }
            }
        }
        ClientRequest::Unsubscribe {
            asset_class,
            symbols,
        } => {
            let symbols = symbols.map(SymbolSelector::into_vec).unwrap_or_default();
            match engine.unsubscribe(id, &symbols) {
                Ok(()) => {
                    let _ = registry.send_to(
                        id,
                        OutboundMessage::Unsubscribed {
                            asset_class,
                            symbols,
                        },
                    );
                }
                Err(e) => {
                    let _ = registry.send_to(
                        id,
                        OutboundMessage::Error {
                            code: e.code().to_string(),
                            message: e.to_string(),
                        },
                    );
                }
            }
        }
        ClientRequest::SubscribeClass { asset_class } => {
            if let Err(e) = engine.subscribe_class(id, asset_class) {
                let _ = registry.send_to(
                    id,
                    OutboundMessage::Error {
                        code: e.code().to_string(),
                        message: e.to_string(),
                    },
                );
            }
        }
        ClientRequest::UnsubscribeClass { asset_class } => {
            let _ = engine.unsubscribe_class(id, asset_class);
        }
        ClientRequest::Ping => {
            let _ = registry.send_to(id, OutboundMessage::Pong);
        }
    }
}
