//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::codec::ClientMessage;
use crate::movement::ControllerId;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::world::{ObserverFrame, PartitionHandle};

/// Frames addressed to one controller that may queue before it is dropped
const DIRECT_QUEUE: usize = 256;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let controller = ControllerId::new();
    let (ws_sink, ws_stream) = socket.split();

    // subscribe first so nothing broadcast after the join is missed
    let observed = state.partition.subscribe();
    let (direct_tx, direct_rx) = mpsc::channel(DIRECT_QUEUE);

    let Some(actor) = state.partition.connect(controller, direct_tx).await else {
        error!(controller = %controller, "Partition is not running");
        return;
    };
    info!(controller = %controller, actor = %actor, "New WebSocket connection");

    let limiter = ConnectionRateLimiter::new(state.config.input_rate_limit);
    run_session(
        controller,
        &state.partition,
        limiter,
        ws_sink,
        ws_stream,
        direct_rx,
        observed,
    )
    .await;

    state.partition.disconnect(controller).await;
    info!(controller = %controller, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    controller: ControllerId,
    partition: &PartitionHandle,
    limiter: ConnectionRateLimiter,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    mut direct_rx: mpsc::Receiver<Bytes>,
    mut observed: broadcast::Receiver<ObserverFrame>,
) {
    // Writer: partition -> WebSocket
    let mut writer = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                direct = direct_rx.recv() => match direct {
                    Some(frame) => frame,
                    None => {
                        debug!(controller = %controller, "Partition released this controller");
                        break;
                    }
                },
                observed_frame = observed.recv() => match observed_frame {
                    Ok(frame) if frame.is_for(controller) => frame.frame,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(controller = %controller, lagged_count = n, "Client lagged, skipping {} frames", n);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(controller = %controller, "Observer channel closed");
                        break;
                    }
                },
            };

            if let Err(e) = ws_sink.send(Message::Binary(frame.to_vec())).await {
                debug!(controller = %controller, error = %e, "WebSocket send failed");
                break;
            }
        }
        let _ = ws_sink.close().await;
    });

    // Reader: WebSocket -> partition
    let reader = async {
        while let Some(result) = ws_stream.next().await {
            match result {
                Ok(Message::Binary(data)) => {
                    if !limiter.check_frame() {
                        warn!(controller = %controller, "Rate limited client frame");
                        continue;
                    }

                    match ClientMessage::decode(&data) {
                        Ok(message) => {
                            if !partition.submit(controller, message).await {
                                debug!(controller = %controller, "Partition input closed");
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(controller = %controller, error = %e, "Failed to decode client frame");
                        }
                    }
                }
                Ok(Message::Text(_)) => {
                    warn!(controller = %controller, "Received text message, ignoring");
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Close(_)) => {
                    info!(controller = %controller, "Client initiated close");
                    break;
                }
                Err(e) => {
                    error!(controller = %controller, error = %e, "WebSocket error");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = reader => {}
        _ = &mut writer => {
            info!(controller = %controller, "Session ended by server");
        }
    }
    writer.abort();
}
