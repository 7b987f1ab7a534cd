// File: src/ranking/features.rs
use std::collections::BTreeMap;

pub const CUISINE_MATCH: &str = "cuisine_match";
pub const RECIPE_LIKE_RATE: &str = "recipe_like_rate";
pub const INGREDIENT_LIKE_RATE: &str = "ingredient_like_rate";
pub const RECENCY: &str = "recency";
pub const QUICK_PREP: &str = "quick_prep";
pub const HEALTH: &str = "health";

pub const FEATURE_COUNT: usize = 6;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    CUISINE_MATCH,
    RECIPE_LIKE_RATE,
    INGREDIENT_LIKE_RATE,
    RECENCY,
    QUICK_PREP,
    HEALTH,
];

/// Feature name → learned weight. Missing names weigh 0.0.
pub type Weights = BTreeMap<String, f64>;

/// Every component is bounded: the like-rates in [-0.5, 0.5], the rest
/// in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeatureVector {
    pub cuisine_match: f64,
    pub recipe_like_rate: f64,
    pub ingredient_like_rate: f64,
    pub recency: f64,
    pub quick_prep: f64,
    pub health: f64,
}

impl FeatureVector {
    /// Components in [`FEATURE_NAMES`] order.
    pub fn to_array(self) -> [f64; FEATURE_COUNT] {
        [
            self.cuisine_match,
            self.recipe_like_rate,
            self.ingredient_like_rate,
            self.recency,
            self.quick_prep,
            self.health,
        ]
    }

    pub fn dot(&self, weights: &Weights) -> f64 {
        FEATURE_NAMES
            .iter()
            .zip(self.to_array())
            .map(|(name, value)| weights.get(*name).copied().unwrap_or(0.0) * value)
            .sum()
    }
}

pub fn weights_from_array(values: [f64; FEATURE_COUNT]) -> Weights {
    FEATURE_NAMES
        .iter()
        .zip(values)
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

pub fn weights_to_array(weights: &Weights) -> [f64; FEATURE_COUNT] {
    FEATURE_NAMES.map(|name| weights.get(name).copied().unwrap_or(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_ignores_unknown_and_defaults_missing() {
        let mut weights = weights_from_array([1.0, 2.0, 0.0, 0.0, 0.0, 0.0]);
        weights.remove(RECIPE_LIKE_RATE);
        weights.insert("retired_feature".into(), 100.0);
        let features = FeatureVector {
            cuisine_match: 1.0,
            recipe_like_rate: 0.5,
            ..FeatureVector::default()
        };
        assert_eq!(features.dot(&weights), 1.0);
    }
}
