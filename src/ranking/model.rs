// File: src/ranking/model.rs
//! Recipe scoring and the retraining state machine.
//!
//! Scoring reads an `Arc<ModelSnapshot>` cloned out from behind a read lock,
//! so a retrain never blocks a query and a query never sees half-updated
//! weights. Retraining builds the next snapshot off-lock and swaps it in with
//! a single write.
//!
//! ```text
//! Untrained ──retrain──▶ Retraining ──ok──▶ Trained ──retrain──▶ Retraining
//!                           │                                        │
//!                           └──error: back to the previous phase ◀───┘
//! ```

use crate::config::RankingSettings;
use crate::core::clock::Clock;
use crate::core::types::{FeedbackEvent, NormalizedQuery, Recipe};
use crate::error::{PersistenceError, TrainingError};
use crate::learning::LearningEngine;
use crate::persistence::{load_snapshot, save_snapshot};
use crate::ranking::context::AffinityTable;
use crate::ranking::features::{FeatureVector, Weights, FEATURE_NAMES};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelPhase {
    Untrained,
    Trained,
    Retraining,
}

/// The weights and affinity in effect for scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub weights: Weights,
    pub affinity: AffinityTable,
    pub last_trained_at: Option<DateTime<Utc>>,
    /// Events in the window the weights were fitted on.
    pub training_event_count: usize,
    /// Ledger length when the window was taken.
    pub ledger_len: usize,
}

impl Default for ModelSnapshot {
    /// Neutral weights: the match ratio alone decides the order.
    fn default() -> Self {
        Self {
            weights: FEATURE_NAMES.iter().map(|name| (name.to_string(), 0.0)).collect(),
            affinity: AffinityTable::new(),
            last_trained_at: None,
            training_event_count: 0,
            ledger_len: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoredRecipe {
    pub recipe: Recipe,
    pub score: f64,
    pub preference: f64,
}

pub enum RetrainOutcome {
    Applied(Arc<ModelSnapshot>),
    /// Another retrain was already running.
    Skipped,
}

struct TrainingState {
    phase: ModelPhase,
    last_attempt_len: usize,
    last_attempt_at: Option<DateTime<Utc>>,
}

/// Held by whoever moved the model into `Retraining`. Dropping it without
/// a successful `finish_retrain` puts the previous phase back.
#[must_use]
pub struct RetrainTicket {
    state: Arc<Mutex<TrainingState>>,
    previous: ModelPhase,
    settled: bool,
}

impl RetrainTicket {
    fn settle(mut self, phase: ModelPhase) {
        self.state.lock().phase = phase;
        self.settled = true;
    }
}

impl Drop for RetrainTicket {
    fn drop(&mut self) {
        if !self.settled {
            self.state.lock().phase = self.previous;
        }
    }
}

pub struct RankingModel {
    snapshot: RwLock<Arc<ModelSnapshot>>,
    state: Arc<Mutex<TrainingState>>,
    trainer: LearningEngine,
    settings: RankingSettings,
    clock: Arc<dyn Clock>,
}

impl RankingModel {
    pub fn new(settings: &RankingSettings, clock: Arc<dyn Clock>) -> Self {
        Self::with_snapshot(settings, clock, None)
    }

    /// Loads the saved snapshot from `settings.model_path` if there is one.
    /// An unreadable snapshot leaves the model untrained.
    pub fn open(settings: &RankingSettings, clock: Arc<dyn Clock>) -> Self {
        let snapshot = settings.model_path.as_deref().and_then(|path| {
            match load_snapshot::<ModelSnapshot>(path) {
                Ok(Some(snapshot)) => {
                    info!(
                        path = %path.display(),
                        events = snapshot.training_event_count,
                        "ranking model loaded"
                    );
                    Some(snapshot)
                }
                Ok(None) => None,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "model snapshot unreadable, starting untrained");
                    None
                }
            }
        });
        Self::with_snapshot(settings, clock, snapshot)
    }

    fn with_snapshot(
        settings: &RankingSettings,
        clock: Arc<dyn Clock>,
        snapshot: Option<ModelSnapshot>,
    ) -> Self {
        let phase = match &snapshot {
            Some(s) if s.last_trained_at.is_some() => ModelPhase::Trained,
            _ => ModelPhase::Untrained,
        };
        let snapshot = snapshot.unwrap_or_default();
        Self {
            state: Arc::new(Mutex::new(TrainingState {
                phase,
                last_attempt_len: snapshot.ledger_len,
                last_attempt_at: snapshot.last_trained_at,
            })),
            snapshot: RwLock::new(Arc::new(snapshot)),
            trainer: LearningEngine::new(settings),
            settings: settings.clone(),
            clock,
        }
    }

    pub fn phase(&self) -> ModelPhase {
        self.state.lock().phase
    }

    pub fn snapshot(&self) -> Arc<ModelSnapshot> {
        self.snapshot.read().clone()
    }

    pub fn features(&self, recipe: &Recipe, query: &NormalizedQuery) -> FeatureVector {
        features_in(&self.snapshot(), recipe, query, self.clock.now(), &self.settings)
    }

    /// Learned part of the score. 0.0 before any training.
    pub fn preference(&self, recipe: &Recipe, query: &NormalizedQuery) -> f64 {
        let snapshot = self.snapshot();
        features_in(&snapshot, recipe, query, self.clock.now(), &self.settings).dot(&snapshot.weights)
    }

    pub fn score(&self, recipe: &Recipe, query: &NormalizedQuery) -> f64 {
        recipe.match_ratio() + self.preference(recipe, query)
    }

    /// Orders `candidates` by descending score, then higher matched count,
    /// then ascending id. Every candidate is scored against one snapshot.
    pub fn rank_scored(&self, candidates: Vec<Recipe>, query: &NormalizedQuery) -> Vec<ScoredRecipe> {
        let snapshot = self.snapshot();
        let now = self.clock.now();
        let mut scored: Vec<ScoredRecipe> = candidates
            .into_iter()
            .map(|recipe| {
                let preference =
                    features_in(&snapshot, &recipe, query, now, &self.settings).dot(&snapshot.weights);
                ScoredRecipe {
                    score: recipe.match_ratio() + preference,
                    preference,
                    recipe,
                }
            })
            .collect();
        scored.sort_by(compare_scored);
        scored
    }

    pub fn rank(&self, candidates: Vec<Recipe>, query: &NormalizedQuery) -> Vec<Recipe> {
        self.rank_scored(candidates, query)
            .into_iter()
            .map(|scored| scored.recipe)
            .collect()
    }

    /// Whether enough new feedback (or time) has accumulated since the last
    /// training attempt.
    pub fn is_due(&self, ledger_len: usize) -> bool {
        self.due(&self.state.lock(), ledger_len)
    }

    fn due(&self, state: &TrainingState, ledger_len: usize) -> bool {
        if state.phase == ModelPhase::Retraining || ledger_len <= state.last_attempt_len {
            return false;
        }
        if ledger_len - state.last_attempt_len >= self.settings.retrain_every {
            return true;
        }
        match (self.settings.retrain_interval(), state.last_attempt_at) {
            (Some(interval), Some(last)) => self.clock.now() - last >= interval,
            _ => false,
        }
    }

    fn begin(&self, state: &mut TrainingState, ledger_len: usize) -> RetrainTicket {
        let previous = state.phase;
        state.phase = ModelPhase::Retraining;
        state.last_attempt_len = ledger_len;
        state.last_attempt_at = Some(self.clock.now());
        RetrainTicket {
            state: self.state.clone(),
            previous,
            settled: false,
        }
    }

    /// Checks the triggers and, when due, claims the retrain in the same
    /// critical section. Callers that get `None` must not train.
    pub fn try_begin_retrain(&self, ledger_len: usize) -> Option<RetrainTicket> {
        let mut state = self.state.lock();
        if !self.due(&state, ledger_len) {
            return None;
        }
        Some(self.begin(&mut state, ledger_len))
    }

    /// Refits on `window` (the latest events of a ledger of length
    /// `ledger_len`). On failure the current snapshot stays in effect.
    pub fn retrain(
        &self,
        window: &[FeedbackEvent],
        ledger_len: usize,
    ) -> Result<RetrainOutcome, TrainingError> {
        let ticket = {
            let mut state = self.state.lock();
            if state.phase == ModelPhase::Retraining {
                debug!("retrain already running, skipping");
                return Ok(RetrainOutcome::Skipped);
            }
            self.begin(&mut state, ledger_len)
        };
        self.finish_retrain(ticket, window, ledger_len)
    }

    /// Trains for a retrain claimed with `try_begin_retrain` and swaps the
    /// result in.
    pub fn finish_retrain(
        &self,
        ticket: RetrainTicket,
        window: &[FeedbackEvent],
        ledger_len: usize,
    ) -> Result<RetrainOutcome, TrainingError> {
        {
            let mut state = self.state.lock();
            state.last_attempt_len = state.last_attempt_len.max(ledger_len);
        }

        match self.trainer.train(window) {
            Ok(outcome) => {
                let snapshot = Arc::new(ModelSnapshot {
                    weights: outcome.weights,
                    affinity: outcome.affinity,
                    last_trained_at: Some(self.clock.now()),
                    training_event_count: outcome.examples,
                    ledger_len,
                });
                *self.snapshot.write() = snapshot.clone();
                ticket.settle(ModelPhase::Trained);
                info!(
                    events = outcome.examples,
                    positives = outcome.positives,
                    log_loss = outcome.log_loss,
                    weights = ?snapshot.weights,
                    "ranking model retrained"
                );
                Ok(RetrainOutcome::Applied(snapshot))
            }
            Err(err) => {
                drop(ticket);
                warn!(error = %err, events = window.len(), "retraining failed, keeping previous weights");
                Err(err)
            }
        }
    }

    /// Writes the current snapshot to `model_path`, if configured.
    pub fn save(&self) -> Result<(), PersistenceError> {
        match &self.settings.model_path {
            Some(path) => save_snapshot(&*self.snapshot(), path),
            None => Ok(()),
        }
    }
}

fn features_in(
    snapshot: &ModelSnapshot,
    recipe: &Recipe,
    query: &NormalizedQuery,
    now: DateTime<Utc>,
    settings: &RankingSettings,
) -> FeatureVector {
    snapshot.affinity.features(
        recipe.id,
        &recipe.traits(),
        query,
        now,
        settings.recency_half_life_days,
    )
}

fn compare_scored(a: &ScoredRecipe, b: &ScoredRecipe) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.recipe.matched_count.cmp(&a.recipe.matched_count))
        .then_with(|| a.recipe.id.cmp(&b.recipe.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::types::{RecipeTraits, UserAction};
    use std::collections::BTreeSet;

    fn model() -> RankingModel {
        RankingModel::new(&RankingSettings::default(), Arc::new(ManualClock::default()))
    }

    fn recipe(id: u64, required: &[&str], have: &[&str]) -> Recipe {
        let have: BTreeSet<String> = have.iter().map(|s| s.to_string()).collect();
        Recipe::matched_against(id, format!("recipe {}", id), required.iter().copied(), &have)
    }

    #[test]
    fn untrained_model_scores_by_match_ratio() {
        let model = model();
        let query = NormalizedQuery::new(["eggs", "rice"]);
        let full = recipe(1, &["eggs", "rice"], &["eggs", "rice"]);
        assert_eq!(model.phase(), ModelPhase::Untrained);
        assert_eq!(model.preference(&full, &query), 0.0);
        assert_eq!(model.score(&full, &query), 1.0);
    }

    #[test]
    fn ties_break_on_matched_count_then_id() {
        let model = model();
        let query = NormalizedQuery::new(["a", "b"]);
        // Same ratio (1/2), different matched counts.
        let small = recipe(5, &["a", "x"], &["a", "b"]);
        let large = recipe(9, &["a", "b", "x", "y"], &["a", "b"]);
        let twin = recipe(3, &["a", "y"], &["a", "b"]);
        let ranked: Vec<u64> = model
            .rank(vec![small, large, twin], &query)
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ranked, vec![9, 3, 5]);
    }

    #[test]
    fn failed_retrain_keeps_phase_and_weights() {
        let model = model();
        let before = model.snapshot();
        let result = model.retrain(&[], 0);
        assert!(matches!(result, Err(TrainingError::EmptyWindow)));
        assert_eq!(model.phase(), ModelPhase::Untrained);
        assert_eq!(*model.snapshot(), *before);
    }

    #[test]
    fn due_after_retrain_every_new_events() {
        let settings = RankingSettings {
            retrain_every: 3,
            ..RankingSettings::default()
        };
        let model = RankingModel::new(&settings, Arc::new(ManualClock::default()));
        assert!(!model.is_due(2));
        assert!(model.is_due(3));

        let events: Vec<FeedbackEvent> = (0..3)
            .map(|i| FeedbackEvent {
                recipe_id: i,
                user_action: UserAction::Like,
                query_context: NormalizedQuery::new(["rice"]),
                timestamp: DateTime::<Utc>::UNIX_EPOCH,
                traits: RecipeTraits::default(),
            })
            .collect();
        // Single-class: fails, but still counts as an attempt.
        assert!(model.retrain(&events, 3).is_err());
        assert!(!model.is_due(4));
        assert!(model.is_due(6));
    }

    #[test]
    fn claimed_retrain_blocks_further_claims() {
        let settings = RankingSettings {
            retrain_every: 1,
            ..RankingSettings::default()
        };
        let model = RankingModel::new(&settings, Arc::new(ManualClock::default()));

        let ticket = model.try_begin_retrain(1).unwrap();
        assert_eq!(model.phase(), ModelPhase::Retraining);
        assert!(model.try_begin_retrain(2).is_none());
        assert!(matches!(model.retrain(&[], 2), Ok(RetrainOutcome::Skipped)));

        drop(ticket);
        assert_eq!(model.phase(), ModelPhase::Untrained);
        assert!(model.try_begin_retrain(2).is_some());
    }

    #[test]
    fn finished_ticket_moves_to_trained() {
        let model = model();
        let query = NormalizedQuery::new(["rice"]);
        let events: Vec<FeedbackEvent> = [UserAction::Like, UserAction::Dislike]
            .into_iter()
            .enumerate()
            .map(|(i, action)| FeedbackEvent {
                recipe_id: i as u64,
                user_action: action,
                query_context: query.clone(),
                timestamp: DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::minutes(i as i64),
                traits: RecipeTraits::default(),
            })
            .collect();

        let ticket = model.try_begin_retrain(10).unwrap();
        let outcome = model.finish_retrain(ticket, &events, 10).unwrap();
        assert!(matches!(outcome, RetrainOutcome::Applied(_)));
        assert_eq!(model.phase(), ModelPhase::Trained);
        assert!(!model.is_due(10));
    }
}
