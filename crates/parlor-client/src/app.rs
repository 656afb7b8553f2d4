use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use uuid::Uuid;

use parlor_common::protocol::{ClientMessage, ServerMessage};
use parlor_common::room::{RoomSnapshot, RoomState};

use crate::network;
use crate::timesync::TimeSync;

/// Line-oriented client loop: stdin commands in, server events out.
pub async fn run(addr: &str, nickname: &str, avatar_id: Option<String>) -> anyhow::Result<()> {
    let (player_id, tx, mut server_rx) = network::connect(addr, nickname, avatar_id).await?;
    println!("connected as {} ({})", nickname, player_id);

    // Route pongs to the clock-sync service, everything else to the
    // event loop.
    let (pong_tx, mut pong_rx) = mpsc::channel::<i64>(8);
    let (event_tx, mut event_rx) = mpsc::channel::<ServerMessage>(64);
    tokio::spawn(async move {
        while let Some(msg) = server_rx.recv().await {
            match msg {
                ServerMessage::Pong { server_timestamp } => {
                    let _ = pong_tx.send(server_timestamp).await;
                }
                other => {
                    if event_tx.send(other).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut clock = TimeSync::new();
    if let Err(e) = clock.sync(&tx, &mut pong_rx).await {
        tracing::warn!("clock sync failed, countdowns may drift: {}", e);
    }

    tx.send(ClientMessage::GetLobby).await?;
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    None => break,
                    Some(line) => {
                        if !handle_input(line.trim(), &tx).await? {
                            break;
                        }
                    }
                }
            }
            event = event_rx.recv() => {
                match event {
                    None => {
                        println!("server closed the connection");
                        break;
                    }
                    Some(msg) => print_event(&msg, &clock),
                }
            }
        }
    }

    let _ = tx.send(ClientMessage::Disconnect).await;
    Ok(())
}

/// Returns false when the user asked to quit.
async fn handle_input(line: &str, tx: &mpsc::Sender<ClientMessage>) -> anyhow::Result<bool> {
    if line.is_empty() {
        return Ok(true);
    }

    if let Some(rest) = line.strip_prefix('/') {
        let mut parts = rest.split_whitespace();
        match parts.next() {
            Some("create") => {
                let max_players = parts.next().and_then(|p| p.parse().ok()).unwrap_or(4);
                let password = parts.next().map(String::from);
                tx.send(ClientMessage::CreateRoom {
                    max_players,
                    password,
                })
                .await?;
            }
            Some("join") => match parts.next() {
                Some(code) => {
                    let password = parts.next().map(String::from);
                    tx.send(ClientMessage::JoinRoom {
                        code: code.to_string(),
                        password,
                    })
                    .await?;
                }
                None => println!("usage: /join CODE [password]"),
            },
            Some("lobby") => tx.send(ClientMessage::GetLobby).await?,
            Some("start") => tx.send(ClientMessage::StartGame).await?,
            Some("kick") => match parts.next().and_then(|s| Uuid::parse_str(s).ok()) {
                Some(target_id) => tx.send(ClientMessage::KickPlayer { target_id }).await?,
                None => println!("usage: /kick PLAYER-UUID"),
            },
            Some("quit") => return Ok(false),
            _ => print_help(),
        }
    } else {
        tx.send(ClientMessage::Chat {
            text: line.to_string(),
        })
        .await?;
    }
    Ok(true)
}

fn print_help() {
    println!("commands: /create [max] [password], /join CODE [password], /lobby, /start, /kick UUID, /quit; anything else is chat");
}

fn print_event(msg: &ServerMessage, clock: &TimeSync) {
    match msg {
        ServerMessage::RoomJoined { room } => {
            println!("joined room {} ({} players)", room.code, room.players.len());
            print_room(room, clock);
        }
        ServerMessage::StateUpdate { room } => print_room(room, clock),
        ServerMessage::RoomError { reason } => println!("error: {}", reason),
        ServerMessage::LobbyUpdate { rooms } => {
            if rooms.is_empty() {
                println!("no open rooms");
            }
            for entry in rooms {
                println!(
                    "  [{}] {}/{} players{}",
                    entry.code,
                    entry.player_count,
                    entry.max_players,
                    if entry.is_private { " (private)" } else { "" }
                );
            }
        }
        ServerMessage::ChatBroadcast {
            sender_id, text, ..
        } => println!("<{}> {}", sender_id, text),
        ServerMessage::Kicked { message } => println!("kicked: {}", message),
        ServerMessage::Welcome { .. }
        | ServerMessage::HandshakeError { .. }
        | ServerMessage::Pong { .. } => {}
    }
}

fn print_room(room: &RoomSnapshot, clock: &TimeSync) {
    let mut players: Vec<_> = room.players.values().collect();
    players.sort_by_key(|p| p.slot);

    println!("room {} [{:?}]", room.code, room.state);
    for p in players {
        let host_mark = if p.id == room.host_id { "*" } else { " " };
        println!("  {}seat {}: {} (score {})", host_mark, p.slot, p.nickname, p.score);
    }

    if room.state == RoomState::Playing {
        if let Some(start) = room.round_start_time {
            let end = start + i64::from(room.round_duration) * 1000;
            let remaining_ms = end - clock.server_time_ms();
            if clock.is_synced() && remaining_ms > 0 {
                println!(
                    "  round {} of {}: {:.1}s remaining",
                    room.current_round_index + 1,
                    room.total_rounds,
                    remaining_ms as f64 / 1000.0
                );
            }
        }
    }
}
