use std::sync::Arc;
use axum::{
    extract::{State, ws::{Message, WebSocket, WebSocketUpgrade}},
    response::Response,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use futures_util::{StreamExt, SinkExt};
use uuid::Uuid;

use crate::AppState;
use crate::models::ReceivedMessage;
use crate::ws::guard::ConnectionGuard;
use crate::ws::session::Session;


/// WebSocket handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    info!("New WebSocket connection attempt");
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {

    // Generate unique connection ID to identify this client
    let connection_id = Uuid::new_v4().to_string();
    info!("WebSocket connection established with connection_id: {}", connection_id);

    // Register the outbox that every delivery to this connection goes through
    let (outbox, mut outbox_rx) = mpsc::channel::<String>(app_state.config.outbox_capacity);
    app_state.relay.connect(&connection_id, outbox);

    // Relay state is cleaned up even if this future is dropped mid-flight
    let _cleanup = ConnectionGuard::new(app_state.relay.clone(), connection_id.clone());

    let mut session = Session::new(connection_id.clone(), app_state.relay.clone());

    // Split the socket into sender and receiver
    let (mut sender, mut receiver) = socket.split();

    // Forward queued frames to the client
    let send_id = connection_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outbox_rx.recv().await {
            if sender.send(Message::Text(frame)).await.is_err() {
                debug!("Socket of {} closed while sending", send_id);
                break;
            }
        }
    });

    // Feed client frames into the session until either side goes away
    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ReceivedMessage>(&text) {
                        Ok(msg) => {
                            debug!("Received message from {}: {:?}", connection_id, msg);
                            session.handle(msg);
                        }
                        Err(e) => {
                            warn!("Dropping malformed frame from {}: {}", connection_id, e);
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    debug!("WebSocket error on {}: {}", connection_id, e);
                    break;
                }
            },
            _ = &mut send_task => break,
        }
    }

    session.on_disconnect();
    send_task.abort();
    info!("WebSocket connection {} terminated", connection_id);
}
