//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::logic;
use crate::protocol::{attempt_out, exercise_out, ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "draggle_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "draggle_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target = "draggle_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "draggle_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "draggle_backend", "WebSocket disconnected");
}

#[instrument(level = "info", skip(state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::NewExercise { concept } => {
      let concept = concept.unwrap_or_else(|| "for loop".into());
      match logic::start_exercise(state, &concept).await {
        Ok((exercise, attempt, origin)) => {
          tracing::info!(target: "exercise", %concept, id = %exercise.id, %origin, "WS new_exercise served");
          ServerWsMessage::Exercise {
            exercise: exercise_out(&exercise),
            attempt: attempt_out(&attempt),
            origin: origin.to_string(),
          }
        }
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }

    ClientWsMessage::MoveLine { attempt_id, token_id, position } => {
      match logic::move_line(state, &attempt_id, token_id, position).await {
        Ok(attempt) => ServerWsMessage::Sequence { attempt: attempt_out(&attempt) },
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }

    ClientWsMessage::SubmitOrder { attempt_id } => {
      match logic::submit_order(state, &attempt_id).await {
        Ok(outcome) => {
          tracing::info!(target: "exercise", id = %attempt_id, solved = outcome.solved, "WS submit_order evaluated");
          ServerWsMessage::SubmitResult {
            attempt: attempt_out(&outcome.attempt),
            per_line_correct: outcome.per_line,
            solved: outcome.solved,
            message: outcome.message,
            applied: outcome.applied,
          }
        }
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }

    ClientWsMessage::Preview { attempt_id } => {
      match logic::render_preview(state, &attempt_id).await {
        Ok(code) => ServerWsMessage::Preview { attempt_id, code },
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }

    ClientWsMessage::AttemptStatus { attempt_id } => {
      match logic::attempt_status(state, &attempt_id).await {
        Ok(attempt) => ServerWsMessage::Status { attempt: attempt_out(&attempt) },
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }
  }
}
