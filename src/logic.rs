//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Starting an exercise (selection + fresh attempt)
//!   - Applying a move to an attempt's arrangement
//!   - Grading a submission (locally, or via the remote challenge service)
//!   - Rendering the code preview

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::domain::Exercise;
use crate::gateway::{GatewayError, RemoteVerdict};
use crate::sequence::Sequence;
use crate::state::{AppState, Attempt, AttemptError};
use crate::util::tabs_to_spaces;

#[derive(Debug, Error)]
pub enum SubmitError {
  #[error(transparent)]
  Attempt(#[from] AttemptError),
  #[error(transparent)]
  Gateway(#[from] GatewayError),
  #[error("unknown exercise: {0}")]
  UnknownExercise(String),
}

/// Outcome of grading one submission.
#[derive(Debug)]
pub struct SubmitOutcome {
  /// Attempt state after the verdict landed (or the current state when the
  /// verdict was superseded).
  pub attempt: Attempt,
  /// Per-position verdict for the arrangement that was submitted.
  pub per_line: Vec<bool>,
  pub solved: bool,
  pub message: String,
  /// False when the verdict was discarded because a newer submission or a
  /// later edit superseded it.
  pub applied: bool,
}

/// Pick an exercise for the concept and start a fresh attempt on it.
/// A gateway failure propagates untouched: no attempt is created and any
/// prior attempt stays exactly as it was.
#[instrument(level = "info", skip(state), fields(%concept))]
pub async fn start_exercise(
  state: &AppState,
  concept: &str,
) -> Result<(Exercise, Attempt, &'static str), GatewayError> {
  let (exercise, origin) = state.choose_exercise(concept).await?;
  let attempt = state.start_attempt(&exercise).await;
  info!(target: "exercise", %concept, exercise_id = %exercise.id, attempt_id = %attempt.id, %origin, "Exercise started");
  Ok((exercise, attempt, origin))
}

/// Apply one "move token X to position Y" event from the presentation layer.
#[instrument(level = "info", skip(state), fields(%attempt_id, token_id, position))]
pub async fn move_line(
  state: &AppState,
  attempt_id: &str,
  token_id: u32,
  position: usize,
) -> Result<Attempt, AttemptError> {
  state.reorder_attempt(attempt_id, token_id, position).await
}

/// Grade the attempt's current arrangement.
///
/// Local exercises are checked positionally against their reference; remote
/// ones go through the challenge service. The arrangement is captured before
/// the (possibly slow) check, and a verdict that was superseded by further
/// edits or a newer submission is discarded rather than applied.
#[instrument(level = "info", skip(state), fields(%attempt_id))]
pub async fn submit_order(state: &AppState, attempt_id: &str) -> Result<SubmitOutcome, SubmitError> {
  let snapshot = state.begin_submission(attempt_id).await?;
  let exercise = state
    .get_exercise(&snapshot.exercise_id)
    .await
    .ok_or_else(|| SubmitError::UnknownExercise(snapshot.exercise_id.clone()))?;

  let (per_line, solved, message) = if exercise.grades_locally() {
    let seq = Sequence::new(snapshot.tokens.clone());
    let vector = seq.match_vector(&exercise.reference);
    let solved = seq.solves(&exercise.reference);
    (vector, solved, String::new())
  } else if let Some(gw) = &state.gateway {
    match gw.check_submission(&exercise.id, &snapshot.tokens).await? {
      RemoteVerdict::PerLine(vector) => {
        let solved = vector.len() == snapshot.tokens.len() && vector.iter().all(|m| *m);
        (vector, solved, String::new())
      }
      // Single-verdict variant: no per-line detail, so the whole arrangement
      // is marked uniformly and the service's message is passed through.
      RemoteVerdict::Overall { success, message } => {
        (vec![success; snapshot.tokens.len()], success, message)
      }
    }
  } else {
    return Err(SubmitError::Gateway(GatewayError::ServiceUnavailable(
      "no challenge service configured for this exercise".into(),
    )));
  };

  let landed = state.apply_verdict(&snapshot, per_line.clone(), solved).await?;
  let applied = landed.is_some();
  let attempt = match landed {
    Some(a) => a,
    None => state
      .get_attempt(attempt_id)
      .await
      .ok_or_else(|| AttemptError::UnknownAttempt(attempt_id.to_string()))
      .map_err(SubmitError::Attempt)?,
  };

  if applied {
    info!(target: "exercise", %attempt_id, solved, "Submission graded");
  } else {
    warn!(target: "exercise", %attempt_id, "Submission verdict superseded; current state returned");
  }

  Ok(SubmitOutcome { attempt, per_line, solved, message, applied })
}

/// Render the attempt's current arrangement as one source string.
/// Tab expansion here is display-only; grading compares lines verbatim.
#[instrument(level = "info", skip(state), fields(%attempt_id))]
pub async fn render_preview(state: &AppState, attempt_id: &str) -> Result<String, AttemptError> {
  let attempt = state
    .get_attempt(attempt_id)
    .await
    .ok_or_else(|| AttemptError::UnknownAttempt(attempt_id.to_string()))?;
  Ok(tabs_to_spaces(&attempt.sequence.render()))
}

/// Current state of an attempt (phase, arrangement, last verdict, elapsed).
#[instrument(level = "debug", skip(state), fields(%attempt_id))]
pub async fn attempt_status(state: &AppState, attempt_id: &str) -> Result<Attempt, AttemptError> {
  state
    .get_attempt(attempt_id)
    .await
    .ok_or_else(|| AttemptError::UnknownAttempt(attempt_id.to_string()))
}
