use crate::state::AppState;
use sketchrelay_shared::{ConnectionId, DisplayName, RoomId, WsMessage};
use tracing::info;

/// A connection's current room association, kept by its socket task and
/// replayed into `leave()` once the connection fully closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub room_id: RoomId,
    pub display_name: DisplayName,
}

/// Register a connection in a room and emit the derived state.
///
/// The first joiner is designated creator and told it has no peers yet.
/// Every later joiner bumps the occupancy pushed to the creator, makes the
/// creator push its canvas to the newcomer, and triggers a roster broadcast
/// to the whole room.
pub async fn handle_join(
    state: &AppState,
    connection_id: &ConnectionId,
    prev: Option<Association>,
    room_id: RoomId,
    display_name: DisplayName,
) -> Association {
    let association = Association {
        room_id,
        display_name,
    };

    // A connection holds one association at a time; a join elsewhere is a
    // departure from the previous room.
    if let Some(prev) = prev.filter(|prev| *prev != association) {
        state
            .registry
            .write()
            .await
            .leave(&prev.room_id, connection_id, &prev.display_name);
        schedule_settled_recompute(state, prev.room_id);
    }

    let (outcome, count, creator, names) = {
        let mut registry = state.registry.write().await;
        let outcome = registry.join(&association.room_id, connection_id, &association.display_name);
        (
            outcome,
            registry.occupancy_count(&association.room_id),
            registry.creator_of(&association.room_id),
            registry.roster_of(&association.room_id),
        )
    };

    info!(
        room_id = %association.room_id,
        connection_id = %connection_id,
        display_name = %association.display_name,
        is_creator = outcome.is_creator,
        "User joined room."
    );

    if outcome.is_creator {
        // No peers yet; nobody else to notify.
        send_to(state, connection_id, WsMessage::Occupancy { count }).await;
    } else {
        if let Some(creator) = creator {
            send_to(state, &creator, WsMessage::Occupancy { count }).await;
            send_to(
                state,
                &creator,
                WsMessage::SnapshotRequest {
                    to: connection_id.clone(),
                },
            )
            .await;
        }
        broadcast_to_room(
            state,
            &association.room_id,
            WsMessage::Roster { names },
            None,
        )
        .await;
    }

    association
}

/// Relay a canvas snapshot. Targeted updates go to exactly one connection;
/// untargeted ones fan out to every room member except the sender. The
/// payload is never inspected.
pub async fn handle_canvas_update(
    state: &AppState,
    sender_id: &ConnectionId,
    room_id: &RoomId,
    data: String,
    to: Option<ConnectionId>,
) {
    state.registry.write().await.touch(room_id);
    match to {
        Some(target) => send_to(state, &target, WsMessage::Canvas { data }).await,
        None => broadcast_to_room(state, room_id, WsMessage::Canvas { data }, Some(sender_id)).await,
    }
}

/// Ask the room's creator to push its current canvas to the requester.
pub async fn handle_resync(state: &AppState, sender_id: &ConnectionId, room_id: &RoomId) {
    let Some(creator) = state.registry.read().await.creator_of(room_id) else {
        return;
    };
    if creator == *sender_id {
        return;
    }
    send_to(
        state,
        &creator,
        WsMessage::SnapshotRequest {
            to: sender_id.clone(),
        },
    )
    .await;
}

/// Finalize a closed connection: deregister its outbound queue, release its
/// room bookkeeping and schedule the settled occupancy recompute.
pub async fn handle_disconnect(
    state: &AppState,
    connection_id: &ConnectionId,
    association: Option<Association>,
) {
    state.peers.write().await.remove(connection_id);

    let Some(Association {
        room_id,
        display_name,
    }) = association
    else {
        return;
    };

    state
        .registry
        .write()
        .await
        .leave(&room_id, connection_id, &display_name);
    schedule_settled_recompute(state, room_id);
}

/// Schedule the post-disconnect occupancy recompute after a short fixed
/// delay, so it runs once the transport has settled the departure. The task
/// is not cancellable per connection; a reconnect inside the window just
/// gets one stale push.
pub fn schedule_settled_recompute(state: &AppState, room_id: RoomId) {
    let state = state.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = state.shutdown.cancelled() => return,
            _ = tokio::time::sleep(state.settle_delay) => {}
        }
        settled_recompute(&state, &room_id).await;
    });
}

async fn settled_recompute(state: &AppState, room_id: &RoomId) {
    let (exists, count, creator, names) = {
        let registry = state.registry.read().await;
        (
            registry.contains_room(room_id),
            registry.occupancy_count(room_id),
            registry.creator_of(room_id),
            registry.roster_of(room_id),
        )
    };
    if !exists {
        return;
    }

    if let Some(creator) = creator {
        send_to(state, &creator, WsMessage::Occupancy { count }).await;
    }
    broadcast_to_room(state, room_id, WsMessage::Roster { names }, None).await;

    if state.registry.write().await.prune_if_empty(room_id) {
        info!(room_id = %room_id, "Removed empty room.");
    }
}

/// Best-effort point-to-point delivery; unknown or departed connections are
/// silently skipped.
async fn send_to(state: &AppState, connection_id: &ConnectionId, msg: WsMessage) {
    let peers = state.peers.read().await;
    if let Some(peer) = peers.get(connection_id) {
        let _ = peer.tx.send(msg);
    }
}

async fn broadcast_to_room(
    state: &AppState,
    room_id: &RoomId,
    msg: WsMessage,
    exclude: Option<&ConnectionId>,
) {
    let members = state.registry.read().await.members_of(room_id);
    let peers = state.peers.read().await;
    for member in &members {
        if exclude == Some(member) {
            continue;
        }
        if let Some(peer) = peers.get(member) {
            let _ = peer.tx.send(msg.clone());
        }
    }
}
