use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use parlor_common::protocol::{ClientMessage, ServerMessage};
use parlor_common::room::{DenyReason, RoomSnapshot, RoomState};

use crate::manager::GameManager;
use crate::room::PRE_ROUND_DELAY_MS;
use crate::server::SharedState;

/// Chat text is truncated to this many characters before relay.
pub const CHAT_MAX_CHARS: usize = 100;

/// Lock order is manager before connections, everywhere. Each message is
/// handled to completion, broadcasts included, before the connection
/// reads the next one.
pub async fn handle_message(
    player_id: Uuid,
    msg: ClientMessage,
    state: &SharedState,
) -> anyhow::Result<()> {
    match msg {
        // Handshake is handled by the gateway; a repeat is ignored.
        ClientMessage::Hello { .. } => {}

        ClientMessage::GetLobby => {
            let mgr = state.manager.read().await;
            let rooms = mgr.lobby_listing();
            drop(mgr);
            send_to_player(player_id, ServerMessage::LobbyUpdate { rooms }, state).await;
        }

        ClientMessage::CreateRoom {
            max_players,
            password,
        } => {
            let mut mgr = state.manager.write().await;
            let mut conns = state.connections.write().await;

            let identity = match conns.get(&player_id) {
                Some(conn) => conn.identity.clone(),
                None => return Ok(()),
            };

            // Membership is exclusive: leaving any current room first,
            // or that room would keep a ghost record and never empty.
            let old_update = conns
                .get(&player_id)
                .and_then(|c| c.room_id)
                .and_then(|old_id| remove_from_room(&mut mgr, old_id, player_id));

            let room_id = mgr.create_room(&identity, max_players, password);
            if let Some(conn) = conns.get_mut(&player_id) {
                conn.room_id = Some(room_id);
            }

            let snapshot = match mgr.get_room(&room_id) {
                Some(room) => room.snapshot(),
                None => return Ok(()),
            };
            drop(conns);
            drop(mgr);

            if let Some((old_snapshot, old_members)) = old_update {
                broadcast_to_list(
                    &old_members,
                    &ServerMessage::StateUpdate { room: old_snapshot },
                    state,
                )
                .await;
            }
            send_to_player(
                player_id,
                ServerMessage::RoomJoined {
                    room: snapshot.clone(),
                },
                state,
            )
            .await;
            send_to_player(player_id, ServerMessage::StateUpdate { room: snapshot }, state).await;
            broadcast_lobby(state).await;
        }

        ClientMessage::JoinRoom { code, password } => {
            let mut mgr = state.manager.write().await;
            let mut conns = state.connections.write().await;

            let identity = match conns.get(&player_id) {
                Some(conn) => conn.identity.clone(),
                None => return Ok(()),
            };

            let room_id = match mgr.room_by_code(&code) {
                Some(id) => id,
                None => {
                    drop(conns);
                    drop(mgr);
                    send_to_player(
                        player_id,
                        ServerMessage::RoomError {
                            reason: DenyReason::RoomNotFound,
                        },
                        state,
                    )
                    .await;
                    return Ok(());
                }
            };

            // Admission check, previous-room removal and the
            // slot-acquiring mutation all happen under the same lock,
            // with no yield point in between.
            match mgr.get_room(&room_id) {
                Some(room) => {
                    // A denied join must not disturb current membership.
                    if let Err(reason) = room.can_join(password.as_deref()) {
                        drop(conns);
                        drop(mgr);
                        send_to_player(player_id, ServerMessage::RoomError { reason }, state)
                            .await;
                        return Ok(());
                    }
                }
                None => return Ok(()),
            }

            // Rejoining the same room is the reconnect path and keeps
            // the existing record; any other room is left first.
            let old_update = conns
                .get(&player_id)
                .and_then(|c| c.room_id)
                .filter(|old_id| *old_id != room_id)
                .and_then(|old_id| remove_from_room(&mut mgr, old_id, player_id));

            let (snapshot, members) = match mgr.get_room_mut(&room_id) {
                Some(room) => {
                    room.add_player(&identity);
                    (room.snapshot(), room.member_ids())
                }
                None => return Ok(()),
            };
            if let Some(conn) = conns.get_mut(&player_id) {
                conn.room_id = Some(room_id);
            }
            drop(conns);
            drop(mgr);

            if let Some((old_snapshot, old_members)) = old_update {
                broadcast_to_list(
                    &old_members,
                    &ServerMessage::StateUpdate { room: old_snapshot },
                    state,
                )
                .await;
            }
            send_to_player(
                player_id,
                ServerMessage::RoomJoined {
                    room: snapshot.clone(),
                },
                state,
            )
            .await;
            broadcast_to_list(&members, &ServerMessage::StateUpdate { room: snapshot }, state)
                .await;
            broadcast_lobby(state).await;
        }

        ClientMessage::StartGame => {
            let mut mgr = state.manager.write().await;
            let conns = state.connections.read().await;
            let room_id = match conns.get(&player_id).and_then(|c| c.room_id) {
                Some(id) => id,
                None => return Ok(()),
            };
            drop(conns);

            let room = match mgr.get_room_mut(&room_id) {
                Some(r) => r,
                None => return Ok(()),
            };

            if room.host_id != player_id {
                drop(mgr);
                send_to_player(
                    player_id,
                    ServerMessage::RoomError {
                        reason: DenyReason::NotHost,
                    },
                    state,
                )
                .await;
                return Ok(());
            }

            // No-op outside the lobby; at most one transition.
            if !room.start_game() {
                return Ok(());
            }

            let snapshot = room.snapshot();
            let members = room.member_ids();

            let timer_state = state.clone();
            room.round_timer = Some(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(PRE_ROUND_DELAY_MS)).await;
                run_round_start(room_id, &timer_state).await;
            }));
            drop(mgr);

            broadcast_to_list(&members, &ServerMessage::StateUpdate { room: snapshot }, state)
                .await;
        }

        ClientMessage::Chat { text } => {
            let mgr = state.manager.read().await;
            let conns = state.connections.read().await;

            let room_id = match conns.get(&player_id).and_then(|c| c.room_id) {
                Some(id) => id,
                None => return Ok(()),
            };
            let room = match mgr.get_room(&room_id) {
                Some(r) => r,
                None => return Ok(()),
            };
            // Only current members may relay chat into the room.
            if !room.players.contains_key(&player_id) {
                return Ok(());
            }
            let members = room.member_ids();
            drop(conns);
            drop(mgr);

            let text: String = text.chars().take(CHAT_MAX_CHARS).collect();
            let msg = ServerMessage::ChatBroadcast {
                id: Uuid::new_v4(),
                sender_id: player_id,
                text,
                timestamp: Utc::now().timestamp_millis(),
            };
            // Echoed to everyone, the sender included.
            broadcast_to_list(&members, &msg, state).await;
        }

        ClientMessage::KickPlayer { target_id } => {
            let mut mgr = state.manager.write().await;
            let mut conns = state.connections.write().await;

            let room_id = match conns.get(&player_id).and_then(|c| c.room_id) {
                Some(id) => id,
                None => return Ok(()),
            };
            let room = match mgr.get_room_mut(&room_id) {
                Some(r) => r,
                None => return Ok(()),
            };

            if let Err(reason) = room.check_kick(player_id, target_id) {
                drop(conns);
                drop(mgr);
                send_to_player(player_id, ServerMessage::RoomError { reason }, state).await;
                return Ok(());
            }

            room.remove_player(&target_id);
            let snapshot = room.snapshot();
            let members = room.member_ids();

            // The room has no connection authority; the manager layer
            // force-unsubscribes the kicked connection.
            if let Some(conn) = conns.get_mut(&target_id) {
                conn.room_id = None;
            }
            drop(conns);
            drop(mgr);

            send_to_player(
                target_id,
                ServerMessage::Kicked {
                    message: "Removed from room by host".into(),
                },
                state,
            )
            .await;
            broadcast_to_list(&members, &ServerMessage::StateUpdate { room: snapshot }, state)
                .await;
            broadcast_lobby(state).await;
        }

        ClientMessage::Ping => {
            send_to_player(
                player_id,
                ServerMessage::Pong {
                    server_timestamp: Utc::now().timestamp_millis(),
                },
                state,
            )
            .await;
        }

        ClientMessage::Disconnect => {
            handle_disconnect(player_id, state).await;
        }
    }

    Ok(())
}

/// Deferred PreRound -> Playing transition. The timer handle is parked
/// on the room and aborted on deletion, so a fired timer either finds
/// the room still in PreRound or does nothing.
async fn run_round_start(room_id: Uuid, state: &SharedState) {
    let mut mgr = state.manager.write().await;
    let update = match mgr.get_room_mut(&room_id) {
        Some(room) if room.state == RoomState::PreRound => {
            room.begin_round();
            room.round_timer = None;
            Some((room.snapshot(), room.member_ids()))
        }
        _ => None,
    };
    drop(mgr);

    if let Some((snapshot, members)) = update {
        broadcast_to_list(&members, &ServerMessage::StateUpdate { room: snapshot }, state).await;
    }
}

/// Disconnect is a normal lifecycle event: remove the player, delete the
/// room if it emptied, then exactly one lobby rebroadcast reflecting the
/// final state.
pub async fn handle_disconnect(player_id: Uuid, state: &SharedState) {
    let mut mgr = state.manager.write().await;
    let conns = state.connections.read().await;

    let room_id = conns
        .get(&player_id)
        .and_then(|c| c.room_id)
        .or_else(|| mgr.find_player_room(player_id));
    drop(conns);

    let update = match room_id {
        Some(room_id) => remove_from_room(&mut mgr, room_id, player_id),
        None => None,
    };
    drop(mgr);

    state.connections.write().await.remove(&player_id);

    if let Some((snapshot, members)) = update {
        broadcast_to_list(&members, &ServerMessage::StateUpdate { room: snapshot }, state).await;
    }
    if room_id.is_some() {
        broadcast_lobby(state).await;
    }
}

/// Remove a player from a room, deleting the room once it empties (which
/// frees its code). Returns the post-removal snapshot and member list
/// when the room survives, for the caller to broadcast after releasing
/// locks.
fn remove_from_room(
    mgr: &mut GameManager,
    room_id: Uuid,
    player_id: Uuid,
) -> Option<(RoomSnapshot, Vec<Uuid>)> {
    let mut update = None;
    let mut emptied = false;
    if let Some(room) = mgr.get_room_mut(&room_id) {
        room.remove_player(&player_id);
        if room.is_empty() {
            emptied = true;
        } else {
            update = Some((room.snapshot(), room.member_ids()));
        }
    }
    if emptied {
        mgr.remove_room(&room_id);
    }
    update
}

async fn send_to_player(player_id: Uuid, msg: ServerMessage, state: &SharedState) {
    let conns = state.connections.read().await;
    if let Some(conn) = conns.get(&player_id) {
        let _ = conn.tx.send(msg).await;
    }
}

/// Fire-and-forget multicast to a member list; a closed receiver never
/// blocks delivery to the rest.
async fn broadcast_to_list(member_ids: &[Uuid], msg: &ServerMessage, state: &SharedState) {
    let conns = state.connections.read().await;
    for id in member_ids {
        if let Some(conn) = conns.get(id) {
            let _ = conn.tx.send(msg.clone()).await;
        }
    }
}

/// Public directory fan-out to every connection, sent whenever room
/// membership or the room set changes.
async fn broadcast_lobby(state: &SharedState) {
    let mgr = state.manager.read().await;
    let rooms = mgr.lobby_listing();
    drop(mgr);

    let msg = ServerMessage::LobbyUpdate { rooms };
    let conns = state.connections.read().await;
    for conn in conns.values() {
        let _ = conn.tx.send(msg.clone()).await;
    }
}
