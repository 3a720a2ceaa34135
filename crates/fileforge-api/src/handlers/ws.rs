use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use fileforge_notify::{ProgressHub, SubscriberId};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientFrame {
    #[serde(rename_all = "camelCase")]
    Join { job_id: String },
    #[serde(rename_all = "camelCase")]
    Leave { job_id: String },
}

pub async fn progress_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(mut socket: WebSocket, state: AppState) {
    let mut subscription = match state.hub.connect() {
        Ok(subscription) => subscription,
        Err(err) => {
            warn!(error = %err, "rejecting progress socket");
            return;
        }
    };
    let id = subscription.id();

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else { break };
                let frame = match event.to_wire() {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!(subscriber = %id, error = %err, "failed to encode progress frame");
                        continue;
                    }
                };
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => handle_frame(&state.hub, id, text.as_str()),
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.hub.disconnect(id);
}

fn handle_frame(hub: &ProgressHub, id: SubscriberId, text: &str) {
    let outcome = match serde_json::from_str::<ClientFrame>(text) {
        Ok(ClientFrame::Join { job_id }) => hub.join(id, &job_id),
        Ok(ClientFrame::Leave { job_id }) => hub.leave(id, &job_id),
        Err(err) => {
            debug!(subscriber = %id, error = %err, "ignoring unrecognised client frame");
            return;
        }
    };
    if let Err(err) = outcome {
        warn!(subscriber = %id, error = %err, "room update failed");
    }
}

#[cfg(test)]
mod tests {
    use fileforge_notify::{DeliveryMode, ProgressHub};

    use super::*;

    #[test]
    fn parses_join_and_leave() {
        let join: ClientFrame = serde_json::from_str(r#"{"action":"join","jobId":"a"}"#).unwrap();
        assert!(matches!(join, ClientFrame::Join { job_id } if job_id == "a"));
        let leave: ClientFrame = serde_json::from_str(r#"{"action":"leave","jobId":"a"}"#).unwrap();
        assert!(matches!(leave, ClientFrame::Leave { .. }));
    }

    #[test]
    fn frames_update_rooms() {
        let hub = ProgressHub::new(DeliveryMode::RoomOnly);
        let subscription = hub.connect().unwrap();
        let id = subscription.id();

        handle_frame(&hub, id, r#"{"action":"join","jobId":"job-1"}"#);
        assert_eq!(hub.room_size("job-1"), 1);
        handle_frame(&hub, id, "not json");
        handle_frame(&hub, id, r#"{"action":"leave","jobId":"job-1"}"#);
        assert_eq!(hub.room_size("job-1"), 0);
    }
}
