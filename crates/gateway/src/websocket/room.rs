//! Room WebSocket handler
//!
//! Adapts an axum `WebSocket` to the relay's connection halves: outbound
//! frames go through a channel drained by a writer task, inbound frames are
//! mapped onto `InboundFrame` and handed to the stream handler.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tokio::{sync::mpsc::UnboundedReceiver, task::JoinHandle};
use tracing::{debug, info, warn};

use parlor_chats::{ChannelSink, Connection, Identity, InboundFrame, OutboundFrame, TransportError};

use crate::error::{GatewayError, GatewayResult};
use crate::middleware::Authenticated;
use crate::state::GatewayState;

/// How long a finished session waits for queued frames to be flushed.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Upgrade `GET /v1/ws/:room_id` into a relay session.
///
/// Requests without a verified identity are rejected with 401 before the
/// upgrade, so they never join the room.
pub async fn room_websocket_handler(
    State(state): State<Arc<GatewayState>>,
    Path(room_id): Path<String>,
    caller: Result<Authenticated, GatewayError>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> GatewayResult<Response> {
    let ws = ws.map_err(|rejection| {
        debug!(room_id = %room_id, error = %rejection, "websocket upgrade rejected");
        GatewayError::WebSocketError(rejection.body_text())
    })?;

    let Authenticated(identity) = caller.map_err(|err| {
        warn!(room_id = %room_id, error = %err, "websocket upgrade without identity");
        err
    })?;

    if room_id.trim().is_empty() {
        return Err(GatewayError::InvalidRequest("room id must not be empty".to_string()));
    }

    Ok(ws
        .on_failed_upgrade(|err| debug!(error = %err, "websocket upgrade failed"))
        .on_upgrade(move |socket| serve_socket(socket, state, room_id, Some(identity))))
}

async fn serve_socket(
    socket: WebSocket,
    state: Arc<GatewayState>,
    room_id: String,
    identity: Option<Identity>,
) {
    let (ws_sender, ws_receiver) = socket.split();
    let (sink, outbound) = ChannelSink::pair();
    let writer = tokio::spawn(write_frames(ws_sender, outbound));

    let connection = Connection::new(Arc::new(sink), ws_receiver.map(inbound_frame));
    let connection_id = connection.id();

    let summary = state.handler.run(&room_id, identity, connection).await;

    // The handler dropped its sink, so the writer drains what is queued and stops.
    if !finish_writer(writer, WRITER_DRAIN_TIMEOUT).await {
        debug!(connection_id = %connection_id, "websocket writer did not finish cleanly");
    }

    info!(
        room_id = %room_id,
        connection_id = %connection_id,
        relayed = summary.messages_relayed,
        "websocket closed"
    );
}

async fn write_frames(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound: UnboundedReceiver<OutboundFrame>,
) {
    while let Some(frame) = outbound.recv().await {
        let (message, closing) = match frame {
            OutboundFrame::Text(text) => (Message::Text(text.to_string()), false),
            OutboundFrame::Close(notice) => (
                Message::Close(Some(CloseFrame {
                    code: notice.code,
                    reason: notice.reason.into(),
                })),
                true,
            ),
        };

        if let Err(err) = sender.send(message).await {
            debug!(error = %err, "websocket write failed; stopping writer");
            break;
        }
        if closing {
            break;
        }
    }

    let _ = sender.close().await;
}

/// Wait up to `limit` for the writer to flush, then abort it.
///
/// Returns `true` when the writer finished on its own.
async fn finish_writer(mut writer: JoinHandle<()>, limit: Duration) -> bool {
    match tokio::time::timeout(limit, &mut writer).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            debug!(error = %err, "websocket writer task failed");
            false
        }
        Err(_) => {
            warn!(limit_ms = limit.as_millis(), "websocket writer stalled; aborting");
            writer.abort();
            false
        }
    }
}

fn inbound_frame(message: Result<Message, axum::Error>) -> Result<InboundFrame, TransportError> {
    match message {
        Ok(Message::Text(text)) => Ok(InboundFrame::Text(text)),
        Ok(Message::Binary(bytes)) => Ok(InboundFrame::Binary(bytes)),
        Ok(Message::Ping(_)) => Ok(InboundFrame::Ping),
        Ok(Message::Pong(_)) => Ok(InboundFrame::Pong),
        Ok(Message::Close(_)) => Ok(InboundFrame::Close),
        Err(err) => Err(TransportError::Receive(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_messages_map_to_inbound_frames() {
        assert_eq!(
            inbound_frame(Ok(Message::Text("hi".into()))),
            Ok(InboundFrame::Text("hi".into()))
        );
        assert_eq!(inbound_frame(Ok(Message::Ping(vec![1]))), Ok(InboundFrame::Ping));
        assert_eq!(inbound_frame(Ok(Message::Close(None))), Ok(InboundFrame::Close));
        assert!(matches!(
            inbound_frame(Err(axum::Error::new("reset"))),
            Err(TransportError::Receive(_))
        ));
    }

    #[tokio::test]
    async fn writer_that_finishes_is_awaited() {
        let writer = tokio::spawn(async {});
        assert!(finish_writer(writer, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn stalled_writer_is_aborted_after_limit() {
        let writer = tokio::spawn(std::future::pending::<()>());
        let finished = tokio::time::timeout(
            Duration::from_secs(2),
            finish_writer(writer, Duration::from_millis(50)),
        )
        .await
        .expect("finish_writer returns once the limit elapses");
        assert!(!finished);
    }
}
