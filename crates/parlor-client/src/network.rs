use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use uuid::Uuid;

use parlor_common::protocol::{
    self, ClientMessage, ServerMessage, deserialize_message, framed_transport, serialize_message,
};

/// Connect, run the Hello/Welcome handshake, and return the assigned
/// player id plus channels for bidirectional communication.
pub async fn connect(
    addr: &str,
    nickname: &str,
    avatar_id: Option<String>,
) -> anyhow::Result<(Uuid, mpsc::Sender<ClientMessage>, mpsc::Receiver<ServerMessage>)> {
    let stream = TcpStream::connect(addr).await?;
    let mut transport = framed_transport(stream);

    protocol::send_message(
        &mut transport,
        &ClientMessage::Hello {
            nickname: nickname.to_string(),
            avatar_id,
            version: parlor_common::VERSION.to_string(),
        },
    )
    .await?;

    let player_id = match protocol::recv_message::<ServerMessage>(&mut transport).await? {
        Some(ServerMessage::Welcome {
            player_id,
            server_version,
        }) => {
            tracing::debug!("connected to server v{}", server_version);
            player_id
        }
        Some(ServerMessage::HandshakeError { reason }) => {
            anyhow::bail!("handshake rejected: {}", reason);
        }
        Some(_) => anyhow::bail!("unexpected handshake reply"),
        None => anyhow::bail!("server closed connection during handshake"),
    };

    let (mut sink, mut stream) = transport.split();

    let (client_tx, mut client_rx) = mpsc::channel::<ClientMessage>(64);
    let (server_tx, server_rx) = mpsc::channel::<ServerMessage>(64);

    // Writer task: client_rx -> TCP sink
    tokio::spawn(async move {
        while let Some(msg) = client_rx.recv().await {
            match serialize_message(&msg) {
                Ok(bytes) => {
                    if sink.send(bytes.into()).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize client message: {}", e);
                }
            }
        }
    });

    // Reader task: TCP stream -> server_tx
    tokio::spawn(async move {
        while let Some(Ok(frame)) = stream.next().await {
            match deserialize_message::<ServerMessage>(&frame) {
                Ok(msg) => {
                    if server_tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to parse server message: {}", e);
                }
            }
        }
    });

    Ok((player_id, client_tx, server_rx))
}
