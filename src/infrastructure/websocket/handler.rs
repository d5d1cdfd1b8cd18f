//! WebSocket upgrade endpoint and the per-connection task.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::transport::WsTransport;
use crate::delivery::DeliveryManager;

/// Query parameters accepted on connect.
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    /// Recipient identifier to bind the new channel to.
    pub recipient: Option<String>,
}

/// Upgrades the request and hands the socket to [`serve_socket`].
///
/// # Endpoint
///
/// `GET /ws?recipient=<id>`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(delivery): State<Arc<DeliveryManager>>,
    Query(params): Query<ConnectParams>,
) -> Response {
    let recipient = params.recipient.filter(|r| !r.trim().is_empty());
    ws.on_upgrade(move |socket| serve_socket(socket, delivery, recipient))
}

/// Runs one connection until the peer leaves or the server closes it.
///
/// Frames from the socket are handed to the manager one at a time, in
/// arrival order.
pub async fn serve_socket(
    socket: WebSocket,
    delivery: Arc<DeliveryManager>,
    recipient: Option<String>,
) {
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
    let transport = Arc::new(WsTransport::new(outbound_tx));

    let writer_transport = transport.clone();
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let is_close = matches!(message, Message::Close(_));
            if let Err(e) = sink.send(message).await {
                debug!(error = %e, "WebSocket write failed");
                break;
            }
            if is_close {
                break;
            }
        }
        writer_transport.mark_closed();
    });

    transport.mark_open();
    let channel_id = delivery
        .connect(transport.clone(), recipient.as_deref())
        .await;

    loop {
        tokio::select! {
            _ = transport.closed() => break,
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    delivery.on_inbound_frame(&channel_id, text.as_str()).await;
                }
                Some(Ok(Message::Binary(_))) => {
                    debug!(%channel_id, "Ignoring binary frame");
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    delivery.registry().touch(&channel_id).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!(%channel_id, error = %e, "WebSocket read failed");
                    break;
                }
            }
        }
    }

    delivery.disconnect(&channel_id).await;
    drop(transport);
    let _ = writer.await;
}
