// File: src/learning.rs
use crate::config::RankingSettings;
use crate::core::types::FeedbackEvent;
use crate::error::TrainingError;
use crate::ranking::context::AffinityTable;
use crate::ranking::features::{weights_from_array, Weights, FEATURE_COUNT};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Fits preference weights to a window of feedback.
///
/// Logistic regression without an intercept, trained by per-example SGD.
/// Each event's features come from the affinity built from the events
/// before it, so an event never sees its own label.
pub struct LearningEngine {
    learning_rate: f64,
    epochs: usize,
    l2: f64,
    max_weight: f64,
    half_life_days: f64,
    seed: u64,
}

pub struct TrainingOutcome {
    pub weights: Weights,
    /// Affinity over the whole window, used for scoring afterwards.
    pub affinity: AffinityTable,
    pub examples: usize,
    pub positives: usize,
    pub log_loss: f64,
}

struct Example {
    features: [f64; FEATURE_COUNT],
    label: f64,
}

impl LearningEngine {
    pub fn new(settings: &RankingSettings) -> Self {
        Self {
            learning_rate: settings.learning_rate,
            epochs: settings.epochs,
            l2: settings.l2,
            max_weight: settings.max_weight,
            half_life_days: settings.recency_half_life_days,
            seed: settings.seed,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn train(&self, window: &[FeedbackEvent]) -> Result<TrainingOutcome, TrainingError> {
        if window.is_empty() {
            return Err(TrainingError::EmptyWindow);
        }
        let positives = window.iter().filter(|e| e.user_action.is_positive()).count();
        if positives == 0 || positives == window.len() {
            return Err(TrainingError::SingleClass {
                positive: positives > 0,
            });
        }

        let mut ordered: Vec<&FeedbackEvent> = window.iter().collect();
        ordered.sort_by_key(|event| event.timestamp);

        let mut affinity = AffinityTable::new();
        let mut examples = Vec::with_capacity(ordered.len());
        for event in ordered {
            let features = affinity.features(
                event.recipe_id,
                &event.traits,
                &event.query_context,
                event.timestamp,
                self.half_life_days,
            );
            examples.push(Example {
                features: features.to_array(),
                label: if event.user_action.is_positive() { 1.0 } else { 0.0 },
            });
            affinity.observe(event);
        }

        let weights = self.fit(&examples)?;
        let log_loss = mean_log_loss(&examples, &weights);

        Ok(TrainingOutcome {
            weights: weights_from_array(weights),
            affinity,
            examples: examples.len(),
            positives,
            log_loss,
        })
    }

    fn fit(&self, examples: &[Example]) -> Result<[f64; FEATURE_COUNT], TrainingError> {
        let mut weights = [0.0; FEATURE_COUNT];
        let mut order: Vec<usize> = (0..examples.len()).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);

        for _ in 0..self.epochs {
            order.shuffle(&mut rng);
            for &i in &order {
                let example = &examples[i];
                let error = sigmoid(dot(&weights, &example.features)) - example.label;
                for (w, x) in weights.iter_mut().zip(example.features) {
                    *w -= self.learning_rate * (error * x + self.l2 * *w);
                    if !w.is_finite() {
                        return Err(TrainingError::NonFinite);
                    }
                    *w = w.clamp(-self.max_weight, self.max_weight);
                }
            }
        }
        Ok(weights)
    }
}

fn dot(weights: &[f64; FEATURE_COUNT], features: &[f64; FEATURE_COUNT]) -> f64 {
    weights.iter().zip(features).map(|(w, x)| w * x).sum()
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn mean_log_loss(examples: &[Example], weights: &[f64; FEATURE_COUNT]) -> f64 {
    const EPS: f64 = 1e-12;
    let total: f64 = examples
        .iter()
        .map(|example| {
            let p = sigmoid(dot(weights, &example.features)).clamp(EPS, 1.0 - EPS);
            -(example.label * p.ln() + (1.0 - example.label) * (1.0 - p).ln())
        })
        .sum();
    total / examples.len().max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{NormalizedQuery, RecipeId, RecipeTraits, UserAction};
    use crate::ranking::features::{weights_to_array, QUICK_PREP, RECIPE_LIKE_RATE};
    use chrono::{DateTime, Duration, Utc};

    fn event(recipe_id: RecipeId, action: UserAction, minute: i64, items: &[&str]) -> FeedbackEvent {
        FeedbackEvent {
            recipe_id,
            user_action: action,
            query_context: NormalizedQuery::new(items.iter().copied()),
            timestamp: DateTime::<Utc>::UNIX_EPOCH + Duration::minutes(minute),
            traits: RecipeTraits::default(),
        }
    }

    fn mixed_window() -> Vec<FeedbackEvent> {
        let mut events = Vec::new();
        for i in 0..12 {
            events.push(event(1, UserAction::Like, 2 * i, &["pasta", "tomato"]));
            events.push(event(2, UserAction::Dislike, 2 * i + 1, &["tuna", "olives"]));
        }
        events
    }

    #[test]
    fn empty_window_is_rejected() {
        let engine = LearningEngine::new(&RankingSettings::default());
        assert_eq!(engine.train(&[]).err(), Some(TrainingError::EmptyWindow));
    }

    #[test]
    fn single_class_window_is_rejected() {
        let engine = LearningEngine::new(&RankingSettings::default());
        let window = vec![
            event(1, UserAction::Dislike, 0, &["rice"]),
            event(2, UserAction::Dislike, 1, &["rice"]),
        ];
        assert_eq!(
            engine.train(&window).err(),
            Some(TrainingError::SingleClass { positive: false })
        );
    }

    #[test]
    fn consistent_feedback_learns_positive_like_rate_weight() {
        let engine = LearningEngine::new(&RankingSettings::default());
        let outcome = engine.train(&mixed_window()).unwrap();
        assert!(outcome.weights[RECIPE_LIKE_RATE] > 0.0);
        assert_eq!(outcome.examples, 24);
        assert_eq!(outcome.positives, 12);
        assert!(outcome.log_loss < std::f64::consts::LN_2);
    }

    #[test]
    fn weights_stay_within_clamp() {
        let settings = RankingSettings {
            learning_rate: 50.0,
            max_weight: 1.5,
            l2: 0.0,
            ..RankingSettings::default()
        };
        let outcome = LearningEngine::new(&settings).train(&mixed_window()).unwrap();
        assert!(weights_to_array(&outcome.weights).iter().all(|w| w.abs() <= 1.5));
    }

    #[test]
    fn same_seed_gives_same_weights() {
        let settings = RankingSettings::default();
        let a = LearningEngine::new(&settings).with_seed(7).train(&mixed_window()).unwrap();
        let b = LearningEngine::new(&settings).with_seed(7).train(&mixed_window()).unwrap();
        assert_eq!(a.weights, b.weights);
    }

    #[test]
    fn liking_quick_recipes_learns_positive_quick_prep_weight() {
        let timed = |id: RecipeId, action, minute, minutes| FeedbackEvent {
            traits: RecipeTraits {
                ready_in_minutes: Some(minutes),
                ..RecipeTraits::default()
            },
            ..event(id, action, minute, &[])
        };
        let window: Vec<FeedbackEvent> = (0..10)
            .flat_map(|i| {
                [
                    timed(100 + i, UserAction::Save, 2 * i as i64, 20),
                    timed(200 + i, UserAction::Dislike, 2 * i as i64 + 1, 90),
                ]
            })
            .collect();

        let outcome = LearningEngine::new(&RankingSettings::default()).train(&window).unwrap();
        assert!(outcome.weights[QUICK_PREP] > 0.0);
    }
}
