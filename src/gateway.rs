//! Minimal client for the remote challenge service.
//!
//! Two endpoints: POST {base}/generate and POST {base}/check. The service is
//! an opaque collaborator; we only pin down the request/response shapes and
//! normalize the two check-response variants observed in the wild. Calls are
//! instrumented and log latencies and response sizes, not payload contents.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::domain::Token;
use crate::util::trunc_for_log;

/// Failure modes of the remote service, per call.
/// None of these touch local exercise state; callers surface the message and
/// leave the attempt where it was.
#[derive(Debug, Error)]
pub enum GatewayError {
  #[error("challenge service unavailable: {0}")]
  ServiceUnavailable(String),
  #[error("challenge service rejected the topic: {0}")]
  InvalidTopic(String),
  #[error("challenge service returned an unrecognized response: {0}")]
  InvalidResponseShape(String),
}

/// What the service handed back for a fresh exercise. `lines` arrive already
/// shuffled; the matching reference stays on the service side.
#[derive(Debug)]
pub struct GeneratedExercise {
  pub challenge_id: String,
  pub task: String,
  pub lines: Vec<String>,
}

/// Normalized check verdict. The positional-flags shape is canonical; the
/// single-verdict shape is kept as-is and mapped by the caller.
#[derive(Debug, PartialEq, Eq)]
pub enum RemoteVerdict {
  PerLine(Vec<bool>),
  Overall { success: bool, message: String },
}

#[derive(Clone)]
pub struct Gateway {
  pub client: reqwest::Client,
  pub base_url: String,
}

impl Gateway {
  /// Construct the client if CHALLENGE_API_URL is set; otherwise return None
  /// and the caller falls back to local exercises.
  pub fn from_env() -> Option<Self> {
    let base_url = std::env::var("CHALLENGE_API_URL").ok()?;
    let base_url = base_url.trim_end_matches('/').to_string();

    let timeout = std::env::var("CHALLENGE_API_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .unwrap_or(20);

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(timeout))
      .build()
      .ok()?;

    Some(Self { client, base_url })
  }

  /// Ask the service for a new exercise on `concept`.
  #[instrument(level = "info", skip(self), fields(%concept))]
  pub async fn generate_exercise(&self, concept: &str) -> Result<GeneratedExercise, GatewayError> {
    let url = format!("{}/generate", self.base_url);
    let start = std::time::Instant::now();

    let res = self.client.post(&url)
      .header(USER_AGENT, "draggle-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&GenerateRequest { concept: concept.to_string() })
      .send().await
      .map_err(|e| GatewayError::ServiceUnavailable(e.to_string()))?;

    let status = res.status();
    if !status.is_success() {
      let body = res.text().await.unwrap_or_default();
      let msg = extract_service_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      error!(target: "exercise", %status, %msg, "generate call failed");
      return Err(classify_failure(status, msg));
    }

    let body: GenerateWire = res.json().await
      .map_err(|e| GatewayError::InvalidResponseShape(e.to_string()))?;

    let lines: Vec<String> = body.code_lines.into_iter().map(CodeLineWire::into_code).collect();
    if lines.is_empty() {
      return Err(GatewayError::InvalidResponseShape("generate returned no code lines".into()));
    }

    info!(target: "exercise", challenge_id = %body.challenge_id, lines = lines.len(),
      elapsed_ms = start.elapsed().as_millis() as u64, "Exercise generated remotely");

    Ok(GeneratedExercise { challenge_id: body.challenge_id, task: body.task, lines })
  }

  /// Submit the user's current ordering for grading. Both observed response
  /// shapes are accepted and normalized.
  #[instrument(level = "info", skip(self, lines), fields(%challenge_id, line_count = lines.len()))]
  pub async fn check_submission(&self, challenge_id: &str, lines: &[Token]) -> Result<RemoteVerdict, GatewayError> {
    let url = format!("{}/check", self.base_url);
    let req = CheckRequest {
      challenge_id: challenge_id.to_string(),
      code_lines: lines.iter()
        .map(|t| CodeLineOut { id: t.id, code: t.text.clone() })
        .collect(),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "draggle-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&req)
      .send().await
      .map_err(|e| GatewayError::ServiceUnavailable(e.to_string()))?;

    let status = res.status();
    if !status.is_success() {
      let body = res.text().await.unwrap_or_default();
      let msg = extract_service_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      error!(target: "exercise", %status, %msg, "check call failed");
      return Err(GatewayError::ServiceUnavailable(format!("HTTP {}: {}", status, msg)));
    }

    let text = res.text().await
      .map_err(|e| GatewayError::ServiceUnavailable(e.to_string()))?;
    parse_check_response(&text)
  }
}

/// 4xx on generate means the topic itself was rejected; anything else is the
/// service being unavailable to us.
fn classify_failure(status: StatusCode, msg: String) -> GatewayError {
  if status.is_client_error() {
    GatewayError::InvalidTopic(msg)
  } else {
    GatewayError::ServiceUnavailable(format!("HTTP {}: {}", status, msg))
  }
}

/// Accept either check-response shape and normalize it.
fn parse_check_response(body: &str) -> Result<RemoteVerdict, GatewayError> {
  let wire: CheckWire = serde_json::from_str(body)
    .map_err(|_| GatewayError::InvalidResponseShape(trunc_for_log(body, 200)))?;
  Ok(match wire {
    CheckWire::PerLine { code_lines } => {
      RemoteVerdict::PerLine(code_lines.into_iter().map(|f| f != 0).collect())
    }
    CheckWire::Overall { success, message } => RemoteVerdict::Overall { success, message },
  })
}

// --- Wire DTOs ---

#[derive(Serialize)]
struct GenerateRequest { concept: String }

#[derive(Deserialize)]
struct GenerateWire {
  challenge_id: String,
  task: String,
  code_lines: Vec<CodeLineWire>,
}

/// The documented contract carries `{id, code}` objects, but the original
/// service emitted bare strings; accept both.
#[derive(Deserialize)]
#[serde(untagged)]
enum CodeLineWire {
  Tagged {
    #[allow(dead_code)] id: serde_json::Value,
    code: String,
  },
  Plain(String),
}

impl CodeLineWire {
  fn into_code(self) -> String {
    match self {
      CodeLineWire::Tagged { code, .. } => code,
      CodeLineWire::Plain(code) => code,
    }
  }
}

#[derive(Serialize)]
struct CheckRequest {
  challenge_id: String,
  code_lines: Vec<CodeLineOut>,
}
#[derive(Serialize)]
struct CodeLineOut { id: u32, code: String }

#[derive(Deserialize)]
#[serde(untagged)]
enum CheckWire {
  PerLine { code_lines: Vec<u8> },
  Overall { success: bool, message: String },
}

/// Try to extract a clean error message from the service's error body
/// (FastAPI-style `{"detail": "..."}`).
fn extract_service_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { detail: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.detail),
    Err(_) => None,
  }
}
