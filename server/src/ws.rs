use crate::{
    relay::{self, Association},
    state::{AppState, PeerHandle},
};
use axum::{
    extract::{
        ConnectInfo, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures_util::{Sink, SinkExt, StreamExt};
use sketchrelay_shared::{ConnectionId, WsMessage};
use std::net::SocketAddr;
use tokio::{select, sync::mpsc};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Canvas snapshots arrive as self-contained data URIs, so frames are large;
/// anything beyond this is dropped along with the connection.
const MAX_MESSAGE_LEN: usize = 8 * 1024 * 1024;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

#[tracing::instrument(skip(socket, state), fields(client_addr = %addr))]
async fn handle_socket(socket: WebSocket, state: AppState, addr: SocketAddr) {
    let connection_id: ConnectionId = Uuid::new_v4().to_string().parse().unwrap();

    let (tx, mut outbound_rx) = mpsc::unbounded_channel();
    state
        .peers
        .write()
        .await
        .insert(connection_id.clone(), PeerHandle { tx });

    let (mut sender, mut ws_reader) = socket.split();
    send_ws_json(
        &mut sender,
        &WsMessage::Connected {
            connection_id: connection_id.clone(),
        },
    )
    .await;

    info!(connection_id = %connection_id, "Client connected.");

    let mut association: Option<Association> = None;

    loop {
        select! {
            outbound = outbound_rx.recv() => match outbound {
                Some(msg) => send_ws_json(&mut sender, &msg).await,
                None => break,
            },
            msg = ws_reader.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) if text.len() > MAX_MESSAGE_LEN => {
                        warn!("Received excessively long message, disconnecting.");
                        break;
                    }
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<WsMessage>(&text) {
                            Ok(msg) => {
                                handle_client_message(&state, &connection_id, &mut association, msg)
                                    .await;
                            }
                            Err(err) => {
                                warn!("Failed to parse WebSocket message: {err}");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        continue;
                    }
                    msg => {
                        warn!("Invalid WebSocket message: {msg:?}");
                        break;
                    }
                }
            }
        }
    }

    info!(connection_id = %connection_id, "Client disconnected.");
    relay::handle_disconnect(&state, &connection_id, association.take()).await;
}

async fn handle_client_message(
    state: &AppState,
    connection_id: &ConnectionId,
    association: &mut Option<Association>,
    msg: WsMessage,
) {
    match msg {
        WsMessage::Join {
            room_id,
            display_name,
        } => {
            *association = Some(
                relay::handle_join(state, connection_id, association.take(), room_id, display_name)
                    .await,
            );
        }
        WsMessage::CanvasUpdate { room_id, data, to } => {
            relay::handle_canvas_update(state, connection_id, &room_id, data, to).await;
        }
        WsMessage::RequestResync { room_id } => {
            relay::handle_resync(state, connection_id, &room_id).await;
        }
        _ => {
            // Ignore server-to-client message types echoed by a client
        }
    }
}

async fn send_ws_json(sender: &mut (impl Sink<Message> + Unpin), msg: &WsMessage) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            let _ = sender.send(Message::Text(json.into())).await;
        }
        Err(err) => {
            error!("Failed to serialize message '{msg:?}': {err}");
        }
    }
}
