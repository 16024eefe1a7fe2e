//! Loading the optional exercise bank from TOML.
//!
//! See `BankConfig` and `ExerciseCfg` for the expected schema. The bank lets
//! deployments ship their own curriculum without touching the binary; when
//! it is absent we fall back to the built-in seeds.

use serde::Deserialize;
use tracing::{info, error};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct BankConfig {
  #[serde(default)]
  pub exercises: Vec<ExerciseCfg>,
}

/// Exercise entry accepted in TOML configuration.
/// `lines` is the correct ordering; the backend shuffles it on delivery.
#[derive(Clone, Debug, Deserialize)]
pub struct ExerciseCfg {
  #[serde(default)] pub id: Option<String>,
  pub concept: String,
  #[serde(default)] pub task: Option<String>,
  #[serde(default)] pub lines: Vec<String>,
}

/// Attempt to load `BankConfig` from EXERCISE_BANK_PATH. On any parsing/IO
/// error, returns None.
pub fn load_bank_from_env() -> Option<BankConfig> {
  let path = std::env::var("EXERCISE_BANK_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<BankConfig>(&s) {
      Ok(cfg) => {
        info!(target: "draggle_backend", %path, count = cfg.exercises.len(), "Loaded exercise bank (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "draggle_backend", %path, error = %e, "Failed to parse TOML exercise bank");
        None
      }
    },
    Err(e) => {
      error!(target: "draggle_backend", %path, error = %e, "Failed to read TOML exercise bank file");
      None
    }
  }
}
