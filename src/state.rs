//! Application state: in-memory stores, the attempt registry, and selection
//! logic.
//!
//! This module owns:
//!   - exercise stores (by id, by concept, last-by-concept)
//!   - the attempt registry (one entry per in-flight attempt)
//!   - the optional remote challenge gateway
//!
//! When the gateway is configured, new exercises come from it and generation
//! failures surface to the caller. Without a gateway we serve the local pool
//! (TOML bank + built-in seeds) and fall back to a hard fallback exercise.

use std::{collections::HashMap, sync::Arc, time::Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::{load_bank_from_env, BankConfig};
use crate::domain::{AttemptPhase, Exercise, ExerciseSource, Token};
use crate::gateway::{Gateway, GatewayError};
use crate::seeds::{hard_fallback_exercise, seed_exercises};
use crate::sequence::{ReorderError, Sequence};

#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("unknown attempt: {0}")]
    UnknownAttempt(String),
    #[error("attempt {0} is already completed")]
    AlreadyCompleted(String),
    #[error(transparent)]
    Reorder(#[from] ReorderError),
}

/// One in-flight attempt at an exercise. Attempts are created directly in
/// `Ready`: the `Loading` phase is the window before an attempt exists, so a
/// failed generation cannot leave a half-built attempt behind.
#[derive(Clone, Debug)]
pub struct Attempt {
    pub id: String,
    pub exercise_id: String,
    pub sequence: Sequence,
    pub phase: AttemptPhase,
    pub match_vector: Option<Vec<bool>>,
    /// Bumps on every accepted reorder; verdicts that raced with further
    /// edits are spotted by comparing against this.
    pub revision: u64,
    /// Last issued submission number; a verdict tagged with an older number
    /// was superseded and gets discarded.
    pub check_seq: u64,
    pub started_at: Instant,
    pub completed_at: Option<Instant>,
}

impl Attempt {
    /// Elapsed seconds for the timer display. Completion freezes the clock.
    pub fn elapsed_secs(&self) -> u64 {
        let end = self.completed_at.unwrap_or_else(Instant::now);
        end.duration_since(self.started_at).as_secs()
    }
}

/// Sequence state captured when a submission is issued. The verdict is
/// matched against this snapshot, not against whatever the user dragged
/// while the check was in flight.
#[derive(Clone, Debug)]
pub struct SubmissionSnapshot {
    pub attempt_id: String,
    pub exercise_id: String,
    pub tokens: Vec<Token>,
    pub revision: u64,
    pub check_seq: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub by_id: Arc<RwLock<HashMap<String, Exercise>>>,
    pub by_concept: Arc<RwLock<HashMap<String, Vec<String>>>>,
    pub last_by_concept: Arc<RwLock<HashMap<String, String>>>,
    pub attempts: Arc<RwLock<HashMap<String, Attempt>>>,
    pub gateway: Option<Gateway>,
}

impl AppState {
    /// Build state from env: load the bank, seed exercises, build indices,
    /// init the gateway.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let state = Self::from_parts(load_bank_from_env(), Gateway::from_env());
        if let Some(gw) = &state.gateway {
            info!(target: "draggle_backend", base_url = %gw.base_url, "Remote challenge service enabled.");
        } else {
            info!(target: "draggle_backend", "Remote challenge service disabled (no CHALLENGE_API_URL). Using local exercises.");
        }
        state
    }

    /// Assemble state from explicit parts. `new()` wires in env-derived
    /// values; tests pass their own.
    pub fn from_parts(bank: Option<BankConfig>, gateway: Option<Gateway>) -> Self {
        let mut id_map = HashMap::<String, Exercise>::new();
        let mut concept_map = HashMap::<String, Vec<String>>::new();

        // Insert bank-based exercises (if any). Entries without lines cannot
        // be graded, so they are skipped loudly.
        if let Some(bank) = &bank {
            for cfg in &bank.exercises {
                let id = cfg.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
                let concept = cfg.concept.clone();
                if cfg.lines.len() < 2 {
                    warn!(target: "exercise", %id, %concept, "Skipping bank item: needs at least two lines.");
                    continue;
                }
                let ex = Exercise {
                    id: id.clone(),
                    concept: concept.clone(),
                    task: cfg.task.clone().unwrap_or_else(|| {
                        format!("Arrange the lines into a working program ({}).", concept)
                    }),
                    source: ExerciseSource::LocalBank,
                    reference: cfg.lines.clone(),
                    delivered: vec![],
                };
                concept_map.entry(concept).or_default().push(id.clone());
                id_map.insert(id, ex);
            }
        }

        // Always insert built-in seeds, but don't overwrite existing ids.
        for ex in seed_exercises() {
            let id = ex.id.clone();
            concept_map.entry(ex.concept.clone()).or_default().push(id.clone());
            id_map.entry(id).or_insert(ex);
        }

        // Inventory summary by concept/source.
        let mut count_by_concept: HashMap<String, (usize, usize)> = HashMap::new();
        for ex in id_map.values() {
            let entry = count_by_concept.entry(ex.concept.clone()).or_insert((0, 0));
            match ex.source {
                ExerciseSource::LocalBank => entry.0 += 1,
                ExerciseSource::Seed => entry.1 += 1,
                ExerciseSource::Generated => {}
            }
        }
        for (concept, (bank_n, seed_n)) in count_by_concept {
            info!(target: "exercise", %concept, local_bank = bank_n, seed = seed_n, "Startup exercise inventory");
        }

        Self {
            by_id: Arc::new(RwLock::new(id_map)),
            by_concept: Arc::new(RwLock::new(concept_map)),
            last_by_concept: Arc::new(RwLock::new(HashMap::new())),
            attempts: Arc::new(RwLock::new(HashMap::new())),
            gateway,
        }
    }

    /// Insert exercise into stores (by_id and by_concept).
    #[instrument(level = "debug", skip(self, ex), fields(id = %ex.id))]
    pub async fn insert_exercise(&self, ex: Exercise) {
        let mut by_id = self.by_id.write().await;
        let mut by_concept = self.by_concept.write().await;
        let id = ex.id.clone();
        let concept = ex.concept.clone();
        by_id.insert(id.clone(), ex);
        by_concept.entry(concept).or_default().push(id);
    }

    /// Selection policy:
    /// With a gateway, generate a fresh exercise remotely; a failure there is
    /// the caller's to surface (no silent fallback, the user asked for the
    /// remote service). Without one, serve the local pool for the concept,
    /// avoiding an immediate repeat, then the hard fallback.
    #[instrument(level = "info", skip(self), fields(%concept))]
    pub async fn choose_exercise(&self, concept: &str) -> Result<(Exercise, &'static str), GatewayError> {
        if let Some(gw) = &self.gateway {
            let gen = gw.generate_exercise(concept).await?;
            let ex = Exercise {
                id: gen.challenge_id,
                concept: concept.to_string(),
                task: gen.task,
                source: ExerciseSource::Generated,
                reference: vec![],
                delivered: gen.lines,
            };
            let id = ex.id.clone();
            self.insert_exercise(ex.clone()).await;
            self.last_by_concept
                .write()
                .await
                .insert(concept.to_string(), id.clone());
            info!(target: "exercise", %concept, chosen = %id, source = "remote_generated_new", "Generated fresh exercise");
            return Ok((ex, "remote_generated_new"));
        }

        // Local pool for this concept (bank or built-in seeds), avoiding the
        // last-served exercise when there is a choice.
        if let Some(ids) = { self.by_concept.read().await.get(concept).cloned() } {
            if !ids.is_empty() {
                let last = { self.last_by_concept.read().await.get(concept).cloned() };
                let chosen_id = if ids.len() == 1 {
                    ids[0].clone()
                } else if let Some(last_id) = last {
                    ids.iter()
                        .find(|id| *id != &last_id)
                        .cloned()
                        .unwrap_or_else(|| ids[0].clone())
                } else {
                    ids[0].clone()
                };

                if let Some(ex) = { self.by_id.read().await.get(&chosen_id).cloned() } {
                    self.last_by_concept
                        .write()
                        .await
                        .insert(concept.to_string(), chosen_id.clone());
                    info!(target: "exercise", %concept, chosen = %chosen_id, source = "existing_pool", "Serving existing exercise");
                    return Ok((ex, "existing_pool"));
                }
            }
        }

        // Absolute last resort: hard fallback.
        let ex = hard_fallback_exercise(concept.to_string());
        let id = ex.id.clone();
        self.insert_exercise(ex.clone()).await;
        self.last_by_concept
            .write()
            .await
            .insert(concept.to_string(), id.clone());
        warn!(target: "exercise", %concept, chosen = %id, source = "hard_fallback", "Inserted hard fallback exercise");
        Ok((ex, "hard_fallback"))
    }

    /// Read-only access to an exercise by id.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_exercise(&self, id: &str) -> Option<Exercise> {
        let by_id = self.by_id.read().await;
        by_id.get(id).cloned()
    }

    /// Start a fresh attempt for an exercise. Local exercises get a shuffled
    /// arrangement of their reference; remote ones keep the delivered order
    /// (the service shuffled already).
    #[instrument(level = "info", skip(self, ex), fields(exercise_id = %ex.id))]
    pub async fn start_attempt(&self, ex: &Exercise) -> Attempt {
        let sequence = if ex.grades_locally() {
            Sequence::shuffled(&ex.reference, &mut rand::thread_rng())
        } else {
            Sequence::from_lines(&ex.delivered)
        };
        let attempt = Attempt {
            id: Uuid::new_v4().to_string(),
            exercise_id: ex.id.clone(),
            sequence,
            phase: AttemptPhase::Ready,
            match_vector: None,
            revision: 0,
            check_seq: 0,
            started_at: Instant::now(),
            completed_at: None,
        };
        self.attempts
            .write()
            .await
            .insert(attempt.id.clone(), attempt.clone());
        info!(target: "exercise", attempt_id = %attempt.id, lines = attempt.sequence.len(), "Attempt started");
        attempt
    }

    /// Read-only access to an attempt by id.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_attempt(&self, id: &str) -> Option<Attempt> {
        let attempts = self.attempts.read().await;
        attempts.get(id).cloned()
    }

    /// Apply one move. A failed reorder aborts the mutation and leaves the
    /// prior sequence intact; an accepted one bumps the revision and drops a
    /// `Submitted` attempt back to `Ready`.
    #[instrument(level = "debug", skip(self, target), fields(%attempt_id, token_id, position = target))]
    pub async fn reorder_attempt(
        &self,
        attempt_id: &str,
        token_id: u32,
        target: usize,
    ) -> Result<Attempt, AttemptError> {
        let mut attempts = self.attempts.write().await;
        let attempt = attempts
            .get_mut(attempt_id)
            .ok_or_else(|| AttemptError::UnknownAttempt(attempt_id.to_string()))?;
        if attempt.phase == AttemptPhase::Completed {
            return Err(AttemptError::AlreadyCompleted(attempt_id.to_string()));
        }
        let next = attempt.sequence.reorder(token_id, target)?;
        // A no-op drag is not an edit: it neither bumps the revision nor
        // drops a Submitted attempt back to Ready.
        if next != attempt.sequence {
            attempt.sequence = next;
            attempt.revision += 1;
            attempt.phase = AttemptPhase::Ready;
        }
        Ok(attempt.clone())
    }

    /// Capture the arrangement for grading and issue a submission number.
    /// The phase is left alone: it only becomes `Submitted` once a verdict
    /// actually lands, so a failed check changes nothing.
    #[instrument(level = "debug", skip(self), fields(%attempt_id))]
    pub async fn begin_submission(&self, attempt_id: &str) -> Result<SubmissionSnapshot, AttemptError> {
        let mut attempts = self.attempts.write().await;
        let attempt = attempts
            .get_mut(attempt_id)
            .ok_or_else(|| AttemptError::UnknownAttempt(attempt_id.to_string()))?;
        if attempt.phase == AttemptPhase::Completed {
            return Err(AttemptError::AlreadyCompleted(attempt_id.to_string()));
        }
        attempt.check_seq += 1;
        Ok(SubmissionSnapshot {
            attempt_id: attempt.id.clone(),
            exercise_id: attempt.exercise_id.clone(),
            tokens: attempt.sequence.tokens().to_vec(),
            revision: attempt.revision,
            check_seq: attempt.check_seq,
        })
    }

    /// Land a verdict for a submission. Returns None when the verdict was
    /// superseded: either a newer submission was issued or the user kept
    /// dragging while the check was in flight.
    #[instrument(level = "debug", skip(self, snapshot, match_vector), fields(attempt_id = %snapshot.attempt_id, solved))]
    pub async fn apply_verdict(
        &self,
        snapshot: &SubmissionSnapshot,
        match_vector: Vec<bool>,
        solved: bool,
    ) -> Result<Option<Attempt>, AttemptError> {
        let mut attempts = self.attempts.write().await;
        let attempt = attempts
            .get_mut(&snapshot.attempt_id)
            .ok_or_else(|| AttemptError::UnknownAttempt(snapshot.attempt_id.clone()))?;

        if attempt.check_seq != snapshot.check_seq || attempt.revision != snapshot.revision {
            debug!(target: "exercise", attempt_id = %attempt.id,
                have_seq = attempt.check_seq, got_seq = snapshot.check_seq,
                have_rev = attempt.revision, got_rev = snapshot.revision,
                "Discarding superseded verdict");
            return Ok(None);
        }

        attempt.match_vector = Some(match_vector);
        if solved {
            attempt.phase = AttemptPhase::Completed;
            attempt.completed_at = Some(Instant::now());
        } else {
            attempt.phase = AttemptPhase::Submitted;
        }
        Ok(Some(attempt.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_state() -> AppState {
        AppState::from_parts(None, None)
    }

    #[tokio::test]
    async fn seeds_are_served_without_gateway_or_bank() {
        let state = local_state();
        let (ex, origin) = state.choose_exercise("for loop").await.unwrap();
        assert_eq!(origin, "existing_pool");
        assert_eq!(ex.concept, "for loop");
        assert!(ex.grades_locally());
    }

    #[tokio::test]
    async fn unknown_concept_gets_the_hard_fallback() {
        let state = local_state();
        let (ex, origin) = state.choose_exercise("monads").await.unwrap();
        assert_eq!(origin, "hard_fallback");
        assert!(ex.grades_locally());
        // The fallback is now pooled; asking again serves it from the pool.
        let (again, origin2) = state.choose_exercise("monads").await.unwrap();
        assert_eq!(origin2, "existing_pool");
        assert_eq!(again.id, ex.id);
    }

    #[tokio::test]
    async fn bank_entries_take_part_in_selection() {
        let bank: BankConfig = toml::from_str(
            r#"
            [[exercises]]
            id = "bank-1"
            concept = "while loop"
            lines = ["n = 3", "while n > 0:", "    n -= 1"]
            "#,
        )
        .unwrap();
        let state = AppState::from_parts(Some(bank), None);
        let (ex, _) = state.choose_exercise("while loop").await.unwrap();
        assert_eq!(ex.id, "bank-1");
        assert_eq!(ex.source, ExerciseSource::LocalBank);
    }

    #[tokio::test]
    async fn bank_entries_without_enough_lines_are_skipped() {
        let bank: BankConfig = toml::from_str(
            r#"
            [[exercises]]
            id = "bank-short"
            concept = "oneliner"
            lines = ["print('hi')"]
            "#,
        )
        .unwrap();
        let state = AppState::from_parts(Some(bank), None);
        assert!(state.get_exercise("bank-short").await.is_none());
    }

    #[tokio::test]
    async fn attempt_starts_ready_with_a_permutation_of_the_reference() {
        let state = local_state();
        let (ex, _) = state.choose_exercise("functions").await.unwrap();
        let attempt = state.start_attempt(&ex).await;
        assert_eq!(attempt.phase, AttemptPhase::Ready);
        assert_eq!(attempt.sequence.len(), ex.reference.len());
        let mut texts: Vec<String> = attempt
            .sequence
            .tokens()
            .iter()
            .map(|t| t.text.clone())
            .collect();
        texts.sort();
        let mut expected = ex.reference.clone();
        expected.sort();
        assert_eq!(texts, expected);
    }

    #[tokio::test]
    async fn failed_reorder_leaves_the_attempt_untouched() {
        let state = local_state();
        let (ex, _) = state.choose_exercise("functions").await.unwrap();
        let attempt = state.start_attempt(&ex).await;
        let before = attempt.sequence.clone();

        let err = state.reorder_attempt(&attempt.id, 999, 0).await.unwrap_err();
        assert!(matches!(err, AttemptError::Reorder(ReorderError::NotFound(999))));

        let after = state.get_attempt(&attempt.id).await.unwrap();
        assert_eq!(after.sequence, before);
        assert_eq!(after.revision, 0);
    }

    #[tokio::test]
    async fn verdict_moves_the_attempt_to_submitted_or_completed() {
        let state = local_state();
        let (ex, _) = state.choose_exercise("functions").await.unwrap();
        let attempt = state.start_attempt(&ex).await;

        let snap = state.begin_submission(&attempt.id).await.unwrap();
        let seq = Sequence::new(snap.tokens.clone());
        let vector = seq.match_vector(&ex.reference);
        let solved = seq.solves(&ex.reference);
        let landed = state
            .apply_verdict(&snap, vector, solved)
            .await
            .unwrap()
            .expect("verdict should land");
        if solved {
            assert_eq!(landed.phase, AttemptPhase::Completed);
        } else {
            assert_eq!(landed.phase, AttemptPhase::Submitted);
        }
        assert!(landed.match_vector.is_some());
    }

    #[tokio::test]
    async fn editing_after_submission_supersedes_the_verdict() {
        let state = local_state();
        let (ex, _) = state.choose_exercise("functions").await.unwrap();
        let attempt = state.start_attempt(&ex).await;

        let snap = state.begin_submission(&attempt.id).await.unwrap();
        // User keeps dragging while the check is in flight.
        let first_id = attempt.sequence.tokens()[0].id;
        let last = attempt.sequence.len() - 1;
        state.reorder_attempt(&attempt.id, first_id, last).await.unwrap();

        let landed = state
            .apply_verdict(&snap, vec![true; snap.tokens.len()], true)
            .await
            .unwrap();
        assert!(landed.is_none(), "stale verdict must be discarded");

        let after = state.get_attempt(&attempt.id).await.unwrap();
        assert_eq!(after.phase, AttemptPhase::Ready);
        assert!(after.match_vector.is_none());
    }

    #[tokio::test]
    async fn a_newer_submission_supersedes_an_older_one() {
        let state = local_state();
        let (ex, _) = state.choose_exercise("functions").await.unwrap();
        let attempt = state.start_attempt(&ex).await;

        let old = state.begin_submission(&attempt.id).await.unwrap();
        let new = state.begin_submission(&attempt.id).await.unwrap();
        assert!(new.check_seq > old.check_seq);

        let stale = state
            .apply_verdict(&old, vec![false; old.tokens.len()], false)
            .await
            .unwrap();
        assert!(stale.is_none());

        let fresh = state
            .apply_verdict(&new, vec![false; new.tokens.len()], false)
            .await
            .unwrap();
        assert!(fresh.is_some());
    }

    #[tokio::test]
    async fn completed_is_terminal() {
        let state = local_state();
        let (ex, _) = state.choose_exercise("functions").await.unwrap();
        let attempt = state.start_attempt(&ex).await;

        let snap = state.begin_submission(&attempt.id).await.unwrap();
        state
            .apply_verdict(&snap, vec![true; snap.tokens.len()], true)
            .await
            .unwrap();

        let tok = attempt.sequence.tokens()[0].id;
        let err = state.reorder_attempt(&attempt.id, tok, 0).await.unwrap_err();
        assert!(matches!(err, AttemptError::AlreadyCompleted(_)));
        let err = state.begin_submission(&attempt.id).await.unwrap_err();
        assert!(matches!(err, AttemptError::AlreadyCompleted(_)));
    }
}
