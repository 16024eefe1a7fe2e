//! Domain models used by the backend: line tokens, exercises and their
//! provenance, and the attempt lifecycle.

use serde::{Deserialize, Serialize};

/// One draggable unit: a single line of code with an identity that stays
/// stable across reorderings. The id is NOT the position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
  pub id: u32,
  pub text: String,
}

/// Where did we get the exercise from?
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseSource {
  LocalBank,   // from user-provided TOML bank
  Generated,   // generated via the remote challenge service
  Seed,  // built-in seeds (last resort)
}

/// Core exercise structure persisted in-memory.
///
/// Exactly one of the two line fields is populated:
///   - `reference` holds the correct ordering for exercises we grade locally
///     (bank + seeds); the initial arrangement is produced by shuffling it.
///   - `delivered` holds the lines as handed out by the remote service
///     (already shuffled there); the matching reference never reaches us and
///     grading goes back through the service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Exercise {
  pub id: String,
  pub concept: String,   // free-form topic hint (e.g., "for loop")
  pub task: String,
  pub source: ExerciseSource,

  #[serde(default)] pub reference: Vec<String>,
  #[serde(default)] pub delivered: Vec<String>,
}

impl Exercise {
  /// True when we hold the correct ordering ourselves and can grade locally.
  pub fn grades_locally(&self) -> bool {
    !self.reference.is_empty()
  }
}

/// Lifecycle of one attempt at an exercise.
///
/// `Loading` is the window while generation is in flight; a failed generation
/// never leaves it (no attempt is created and any prior attempt is untouched).
/// `Completed` is terminal for the attempt; a new exercise starts a fresh one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPhase {
  Loading,
  Ready,
  Submitted,
  Completed,
}
