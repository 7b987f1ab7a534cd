// File: src/ranking/context.rs
use crate::core::types::{CanonicalName, FeedbackEvent, NormalizedQuery, RecipeId, RecipeTraits};
use crate::ranking::features::FeatureVector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub positive: u64,
    pub negative: u64,
}

impl Tally {
    fn record(&mut self, positive: bool) {
        if positive {
            self.positive += 1;
        } else {
            self.negative += 1;
        }
    }

    /// Laplace-smoothed like-rate shifted so that "no evidence" is 0.0.
    pub fn centered_rate(&self) -> f64 {
        let total = (self.positive + self.negative) as f64;
        (self.positive as f64 + 1.0) / (total + 2.0) - 0.5
    }
}

/// Historical reaction counts per recipe and per ingredient, plus the time
/// of each recipe's latest positive reaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AffinityTable {
    recipes: HashMap<RecipeId, Tally>,
    ingredients: HashMap<CanonicalName, Tally>,
    last_positive: HashMap<RecipeId, DateTime<Utc>>,
}

impl AffinityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one event into the counts. O(ingredients in the query).
    pub fn observe(&mut self, event: &FeedbackEvent) {
        let positive = event.user_action.is_positive();
        self.recipes.entry(event.recipe_id).or_default().record(positive);
        for name in &event.query_context.ingredients {
            self.ingredients.entry(name.clone()).or_default().record(positive);
        }
        if positive {
            let latest = self.last_positive.entry(event.recipe_id).or_insert(event.timestamp);
            if event.timestamp > *latest {
                *latest = event.timestamp;
            }
        }
    }

    pub fn recipe_tally(&self, recipe_id: RecipeId) -> Tally {
        self.recipes.get(&recipe_id).copied().unwrap_or_default()
    }

    /// Features for showing `recipe_id` (with `traits`) in answer to `query`
    /// at time `now`.
    pub fn features(
        &self,
        recipe_id: RecipeId,
        traits: &RecipeTraits,
        query: &NormalizedQuery,
        now: DateTime<Utc>,
        half_life_days: f64,
    ) -> FeatureVector {
        FeatureVector {
            cuisine_match: cuisine_match(traits.cuisine.as_deref(), query),
            recipe_like_rate: self.recipe_tally(recipe_id).centered_rate(),
            ingredient_like_rate: self.ingredient_like_rate(query),
            recency: self.recency(recipe_id, now, half_life_days),
            quick_prep: quick_prep(traits.ready_in_minutes),
            health: health(traits.health_score),
        }
    }

    fn ingredient_like_rate(&self, query: &NormalizedQuery) -> f64 {
        if query.ingredients.is_empty() {
            return 0.0;
        }
        let sum: f64 = query
            .ingredients
            .iter()
            .map(|name| self.ingredients.get(name).map_or(0.0, Tally::centered_rate))
            .sum();
        sum / query.ingredients.len() as f64
    }

    /// Exponential decay since the recipe was last liked or saved.
    fn recency(&self, recipe_id: RecipeId, now: DateTime<Utc>, half_life_days: f64) -> f64 {
        let Some(last) = self.last_positive.get(&recipe_id) else {
            return 0.0;
        };
        let age_days = ((now - *last).num_seconds().max(0) as f64) / 86_400.0;
        0.5_f64.powf(age_days / half_life_days).clamp(0.0, 1.0)
    }
}

pub fn cuisine_match(cuisine: Option<&str>, query: &NormalizedQuery) -> f64 {
    match (cuisine, query.filter("cuisine")) {
        (Some(recipe), Some(wanted)) if recipe.trim().eq_ignore_ascii_case(wanted) => 1.0,
        _ => 0.0,
    }
}

/// 1.0 for half an hour or less, 0.5 up to 45 minutes, otherwise 0.0.
/// Unknown times count as slow.
pub fn quick_prep(ready_in_minutes: Option<u32>) -> f64 {
    match ready_in_minutes {
        Some(minutes) if minutes <= 30 => 1.0,
        Some(minutes) if minutes <= 45 => 0.5,
        _ => 0.0,
    }
}

/// Health score scaled to [0, 1]; unknown is 0.0.
pub fn health(health_score: Option<f64>) -> f64 {
    match health_score {
        Some(score) if score.is_finite() => (score / 100.0).clamp(0.0, 1.0),
        _ => 0.0,
    }
}
