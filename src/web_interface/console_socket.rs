use futures_util::{SinkExt, StreamExt};
use log::{debug, error, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};

use crate::network::gateway::{Gateway, OUTBOUND_BUFFER};
use crate::network::protocol::ServerMessage;

/// Serves one browser terminal over an upgraded WebSocket.
///
/// Inbound frames are handled one at a time in arrival order. Outbound events go through a
/// single writer task, so the client sees them in the order they were queued. The outbound
/// queue is bounded: a client that reads slowly holds back its own session only.
pub async fn serve_socket(gateway: Arc<Gateway>, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_BUFFER);
    let mut connection = gateway.open_connection(outbound);
    let connection_id = connection.id();

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let text = match message.to_json() {
                Ok(text) => text,
                Err(e) => {
                    error!("[{}] Unable to encode event: {}", connection_id, e);
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::text(text)).await {
                debug!("[{}] WebSocket send failed: {}", connection_id, e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = stream.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(e) => {
                warn!("[{}] WebSocket error: {}", connection_id, e);
                break;
            }
        };

        if message.is_close() {
            break;
        }
        if let Ok(text) = message.to_str() {
            connection.handle_text(text).await;
        } else if message.is_binary() {
            connection.handle_binary(message.as_bytes()).await;
        }
    }

    // Dropping the connection releases the last strong sender, which ends the writer.
    connection.close().await;
    let _ = writer.await;
}
