//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; failures map to a status code plus a
//! user-visible message and never touch exercise state themselves.

use std::sync::Arc;
use axum::{extract::{State, Query}, http::StatusCode, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::gateway::GatewayError;
use crate::logic::{self, SubmitError};
use crate::protocol::*;
use crate::sequence::ReorderError;
use crate::state::{AppState, AttemptError};

fn attempt_error_status(e: &AttemptError) -> StatusCode {
  match e {
    AttemptError::UnknownAttempt(_) => StatusCode::NOT_FOUND,
    AttemptError::AlreadyCompleted(_) => StatusCode::CONFLICT,
    AttemptError::Reorder(ReorderError::NotFound(_)) => StatusCode::NOT_FOUND,
    AttemptError::Reorder(ReorderError::OutOfRange { .. }) => StatusCode::BAD_REQUEST,
  }
}

fn gateway_error_status(e: &GatewayError) -> StatusCode {
  match e {
    GatewayError::ServiceUnavailable(_) => StatusCode::BAD_GATEWAY,
    GatewayError::InvalidTopic(_) => StatusCode::UNPROCESSABLE_ENTITY,
    GatewayError::InvalidResponseShape(_) => StatusCode::BAD_GATEWAY,
  }
}

fn submit_error_status(e: &SubmitError) -> StatusCode {
  match e {
    SubmitError::Attempt(e) => attempt_error_status(e),
    SubmitError::Gateway(e) => gateway_error_status(e),
    SubmitError::UnknownExercise(_) => StatusCode::NOT_FOUND,
  }
}

fn error_body(status: StatusCode, message: String) -> (StatusCode, Json<ErrorOut>) {
  (status, Json(ErrorOut { message }))
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state, body), fields(concept = %body.concept.clone().unwrap_or_else(|| "for loop".into())))]
pub async fn http_new_exercise(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ExerciseIn>,
) -> Result<Json<ExerciseCreatedOut>, (StatusCode, Json<ErrorOut>)> {
  let concept = body.concept.unwrap_or_else(|| "for loop".into());
  let (exercise, attempt, origin) = logic::start_exercise(&state, &concept)
    .await
    .map_err(|e| error_body(gateway_error_status(&e), e.to_string()))?;
  info!(target: "exercise", %concept, id = %exercise.id, %origin, "HTTP exercise served");
  Ok(Json(ExerciseCreatedOut {
    exercise: exercise_out(&exercise),
    attempt: attempt_out(&attempt),
    origin: origin.to_string(),
  }))
}

#[instrument(level = "info", skip(state, body), fields(%body.attempt_id, token_id = body.token_id, position = body.position))]
pub async fn http_post_reorder(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ReorderIn>,
) -> Result<Json<AttemptOut>, (StatusCode, Json<ErrorOut>)> {
  let attempt = logic::move_line(&state, &body.attempt_id, body.token_id, body.position)
    .await
    .map_err(|e| error_body(attempt_error_status(&e), e.to_string()))?;
  Ok(Json(attempt_out(&attempt)))
}

#[instrument(level = "info", skip(state, body), fields(%body.attempt_id))]
pub async fn http_post_submit(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SubmitIn>,
) -> Result<Json<SubmitOut>, (StatusCode, Json<ErrorOut>)> {
  let outcome = logic::submit_order(&state, &body.attempt_id)
    .await
    .map_err(|e| error_body(submit_error_status(&e), e.to_string()))?;
  info!(target: "exercise", id = %body.attempt_id, solved = outcome.solved, applied = outcome.applied, "HTTP submit evaluated");
  Ok(Json(SubmitOut::from(&outcome)))
}

#[instrument(level = "info", skip(state), fields(%q.attempt_id))]
pub async fn http_get_preview(
  State(state): State<Arc<AppState>>,
  Query(q): Query<AttemptQuery>,
) -> Result<Json<PreviewOut>, (StatusCode, Json<ErrorOut>)> {
  let code = logic::render_preview(&state, &q.attempt_id)
    .await
    .map_err(|e| error_body(attempt_error_status(&e), e.to_string()))?;
  Ok(Json(PreviewOut { code }))
}

#[instrument(level = "info", skip(state), fields(%q.attempt_id))]
pub async fn http_get_attempt(
  State(state): State<Arc<AppState>>,
  Query(q): Query<AttemptQuery>,
) -> Result<Json<AttemptOut>, (StatusCode, Json<ErrorOut>)> {
  let attempt = logic::attempt_status(&state, &q.attempt_id)
    .await
    .map_err(|e| error_body(attempt_error_status(&e), e.to_string()))?;
  Ok(Json(attempt_out(&attempt)))
}
