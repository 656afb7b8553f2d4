use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use uuid::Uuid;

use parlor_common::player::Identity;
use parlor_common::protocol::{
    self, ClientMessage, ServerMessage, framed_transport, serialize_message,
};

use crate::handler;
use crate::server::SharedState;

pub struct ConnectionHandle {
    pub identity: Identity,
    pub tx: mpsc::Sender<ServerMessage>,
    /// Room channel this connection is subscribed to, if any.
    pub room_id: Option<Uuid>,
}

/// Gateway for one inbound connection: handshake-first, identity
/// attached before any room event is processed. An unauthenticated
/// connection never reaches the game manager.
pub async fn handle_connection(stream: TcpStream, state: SharedState) -> anyhow::Result<()> {
    let mut transport = framed_transport(stream);

    let hello: ClientMessage = match protocol::recv_message(&mut transport).await? {
        Some(msg) => msg,
        None => return Ok(()),
    };

    let identity = match hello {
        ClientMessage::Hello {
            nickname,
            avatar_id,
            version,
        } => match state.auth.authenticate(&nickname, avatar_id) {
            Ok(identity) => {
                tracing::info!(
                    "Player '{}' connected as {} (client version: {})",
                    identity.nickname,
                    identity.id,
                    version
                );
                protocol::send_message(
                    &mut transport,
                    &ServerMessage::Welcome {
                        player_id: identity.id,
                        server_version: env!("CARGO_PKG_VERSION").to_string(),
                    },
                )
                .await?;
                identity
            }
            Err(e) => {
                protocol::send_message(
                    &mut transport,
                    &ServerMessage::HandshakeError {
                        reason: e.to_string(),
                    },
                )
                .await?;
                return Ok(());
            }
        },
        _ => {
            protocol::send_message(
                &mut transport,
                &ServerMessage::HandshakeError {
                    reason: "Expected Hello message".into(),
                },
            )
            .await?;
            return Ok(());
        }
    };

    let player_id = identity.id;
    let player_name = identity.nickname.clone();

    let (tx, mut rx) = mpsc::channel::<ServerMessage>(64);

    {
        let handle = ConnectionHandle {
            identity,
            tx: tx.clone(),
            room_id: None,
        };
        state.connections.write().await.insert(player_id, handle);
    }

    // Split transport for independent read/write
    let (mut sink, mut stream) = transport.split();

    // Writer task: drains rx and writes to sink
    let write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serialize_message(&msg) {
                Ok(bytes) => {
                    if sink.send(bytes.into()).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize message: {}", e);
                }
            }
        }
    });

    // Reader loop: one message handled to completion at a time. Handler
    // errors are logged and degrade to a no-op for that message.
    loop {
        match stream.next().await {
            Some(Ok(frame)) => match protocol::deserialize_message::<ClientMessage>(&frame) {
                Ok(msg) => {
                    if let Err(e) = handler::handle_message(player_id, msg, &state).await {
                        tracing::error!("Handler error for {}: {}", player_name, e);
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to parse message from {}: {}", player_name, e);
                }
            },
            Some(Err(e)) => {
                tracing::warn!("Read error from {}: {}", player_name, e);
                break;
            }
            None => {
                tracing::info!("Player '{}' disconnected", player_name);
                break;
            }
        }
    }

    // Cleanup
    handler::handle_disconnect(player_id, &state).await;
    write_task.abort();
    Ok(())
}
