//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{AttemptPhase, Exercise, ExerciseSource, Token};
use crate::logic::SubmitOutcome;
use crate::state::Attempt;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    NewExercise {
        concept: Option<String>,
    },
    MoveLine {
        #[serde(rename = "attemptId")]
        attempt_id: String,
        #[serde(rename = "tokenId")]
        token_id: u32,
        position: usize,
    },
    SubmitOrder {
        #[serde(rename = "attemptId")]
        attempt_id: String,
    },
    Preview {
        #[serde(rename = "attemptId")]
        attempt_id: String,
    },
    AttemptStatus {
        #[serde(rename = "attemptId")]
        attempt_id: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Exercise {
        exercise: ExerciseOut,
        attempt: AttemptOut,
        origin: String,
    },
    Sequence {
        attempt: AttemptOut,
    },
    SubmitResult {
        attempt: AttemptOut,
        #[serde(rename = "perLineCorrect")]
        per_line_correct: Vec<bool>,
        solved: bool,
        message: String,
        applied: bool,
    },
    Preview {
        #[serde(rename = "attemptId")]
        attempt_id: String,
        code: String,
    },
    Status {
        attempt: AttemptOut,
    },
    Error {
        message: String,
    },
}

/// DTO used by both WS and HTTP for exercise delivery.
/// Deliberately omits the reference ordering: the correct answer never
/// travels to the client.
#[derive(Debug, Serialize)]
pub struct ExerciseOut {
    pub id: String,
    pub concept: String,
    pub task: String,
    pub source: ExerciseSource,
}

/// DTO for the attempt state the presentation layer renders.
#[derive(Debug, Serialize)]
pub struct AttemptOut {
    pub id: String,
    #[serde(rename = "exerciseId")]
    pub exercise_id: String,
    pub phase: AttemptPhase,
    pub tokens: Vec<Token>,
    #[serde(rename = "matchVector")]
    pub match_vector: Option<Vec<bool>>,
    #[serde(rename = "elapsedSecs")]
    pub elapsed_secs: u64,
}

/// Convert the internal `Exercise` to the public DTO.
pub fn exercise_out(ex: &Exercise) -> ExerciseOut {
    ExerciseOut {
        id: ex.id.clone(),
        concept: ex.concept.clone(),
        task: ex.task.clone(),
        source: ex.source.clone(),
    }
}

/// Convert the internal `Attempt` to the public DTO.
pub fn attempt_out(a: &Attempt) -> AttemptOut {
    AttemptOut {
        id: a.id.clone(),
        exercise_id: a.exercise_id.clone(),
        phase: a.phase,
        tokens: a.sequence.tokens().to_vec(),
        match_vector: a.match_vector.clone(),
        elapsed_secs: a.elapsed_secs(),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct ExerciseIn {
    pub concept: Option<String>,
}

#[derive(Serialize)]
pub struct ExerciseCreatedOut {
    pub exercise: ExerciseOut,
    pub attempt: AttemptOut,
    pub origin: String,
}

#[derive(Debug, Deserialize)]
pub struct ReorderIn {
    #[serde(rename = "attemptId")]
    pub attempt_id: String,
    #[serde(rename = "tokenId")]
    pub token_id: u32,
    pub position: usize,
}

#[derive(Debug, Deserialize)]
pub struct SubmitIn {
    #[serde(rename = "attemptId")]
    pub attempt_id: String,
}
#[derive(Serialize)]
pub struct SubmitOut {
    pub attempt: AttemptOut,
    #[serde(rename = "perLineCorrect")]
    pub per_line_correct: Vec<bool>,
    pub solved: bool,
    pub message: String,
    pub applied: bool,
}

impl From<&SubmitOutcome> for SubmitOut {
    fn from(o: &SubmitOutcome) -> Self {
        SubmitOut {
            attempt: attempt_out(&o.attempt),
            per_line_correct: o.per_line.clone(),
            solved: o.solved,
            message: o.message.clone(),
            applied: o.applied,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AttemptQuery {
    #[serde(rename = "attemptId")]
    pub attempt_id: String,
}

#[derive(Serialize)]
pub struct PreviewOut {
    pub code: String,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
