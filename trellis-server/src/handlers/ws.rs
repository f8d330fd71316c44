use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::time::sleep;
use tracing::debug;

use crate::infra::app_state::AppState;
use crate::infra::websocket::TopologyEvent;

/// Handle a websocket upgrade for the live topology feed.
pub async fn topology_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection loop: races hub events, inbound frames, and the
/// keepalive timer; whichever fires first wins and the others are
/// cancelled. Inbound frames carry no command protocol yet and are
/// drained. Any send failure means the peer is gone.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (id, mut events) = state.hub.subscribe();
    let keepalive = state.config.ws_keepalive();
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if sink.send(event.to_message()).await.is_err() {
                    break;
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(%id, "websocket error: {e}");
                        break;
                    }
                }
            }
            _ = sleep(keepalive) => {
                if sink.send(TopologyEvent::Ping.to_message()).await.is_err() {
                    break;
                }
            }
        }
    }

    state.hub.unsubscribe(id);
}
