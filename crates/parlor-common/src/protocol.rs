use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use uuid::Uuid;

use crate::room::{DenyReason, LobbyEntry, RoomSnapshot};

// -- Framing --

pub type Transport = Framed<TcpStream, LengthDelimitedCodec>;

pub fn framed_transport(stream: TcpStream) -> Transport {
    LengthDelimitedCodec::builder()
        .max_frame_length(64 * 1024)
        .new_framed(stream)
}

// -- Client -> Server Messages --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Handshake. Must be the first frame on a new connection.
    Hello {
        nickname: String,
        avatar_id: Option<String>,
        version: String,
    },

    // Rooms
    CreateRoom {
        max_players: u8,
        password: Option<String>,
    },
    JoinRoom {
        code: String,
        password: Option<String>,
    },
    GetLobby,
    StartGame,
    KickPlayer {
        target_id: Uuid,
    },

    // Chat
    Chat {
        text: String,
    },

    // Clock-sync probe
    Ping,

    Disconnect,
}

// -- Server -> Client Messages --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    // Handshake
    Welcome {
        player_id: Uuid,
        server_version: String,
    },
    HandshakeError {
        reason: String,
    },

    /// Ack of a successful create or join.
    RoomJoined {
        room: RoomSnapshot,
    },
    RoomError {
        reason: DenyReason,
    },
    /// Full room state after any mutation.
    StateUpdate {
        room: RoomSnapshot,
    },
    LobbyUpdate {
        rooms: Vec<LobbyEntry>,
    },
    Kicked {
        message: String,
    },

    ChatBroadcast {
        id: Uuid,
        sender_id: Uuid,
        text: String,
        /// Epoch milliseconds, server clock.
        timestamp: i64,
    },

    /// Clock-sync reply; epoch milliseconds, server clock.
    Pong {
        server_timestamp: i64,
    },
}

// -- Serialization helpers --

pub fn serialize_message<T: Serialize>(msg: &T) -> Result<Bytes, serde_json::Error> {
    let json = serde_json::to_vec(msg)?;
    Ok(Bytes::from(json))
}

pub fn deserialize_message<T: for<'de> Deserialize<'de>>(
    data: &[u8],
) -> Result<T, serde_json::Error> {
    serde_json::from_slice(data)
}

// -- Transport helpers --

pub async fn send_message<T: Serialize>(
    transport: &mut Transport,
    msg: &T,
) -> anyhow::Result<()> {
    let bytes = serialize_message(msg).map_err(|e| anyhow::anyhow!("serialize error: {}", e))?;
    transport
        .send(bytes.into())
        .await
        .map_err(|e| anyhow::anyhow!("send error: {}", e))
}

pub async fn recv_message<T: for<'de> Deserialize<'de>>(
    transport: &mut Transport,
) -> anyhow::Result<Option<T>> {
    match transport.next().await {
        Some(Ok(frame)) => {
            let msg = deserialize_message(&frame)
                .map_err(|e| anyhow::anyhow!("deserialize error: {}", e))?;
            Ok(Some(msg))
        }
        Some(Err(e)) => Err(anyhow::anyhow!("recv error: {}", e)),
        None => Ok(None),
    }
}
