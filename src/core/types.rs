// src/core/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A unique identifier for a recipe, as assigned by the recipe provider.
pub type RecipeId = u64;

/// A normalized identifier for an ingredient concept, e.g. "mozzarella cheese".
pub type CanonicalName = String;

/// Active search filters, kept in key order so iteration is stable.
pub type Filters = BTreeMap<String, String>;

/// How a phrase was resolved to its canonical name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchKind {
    Exact,
    Fuzzy,
    /// No table entry was close enough; the cleaned phrase is its own identity.
    Unmatched,
}

/// One ingredient phrase from the user's text and what it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub raw_text: String,
    pub canonical_name: CanonicalName,
    pub match_kind: MatchKind,
}

/// A canonical ingredient set plus filters. Two queries built from the same
/// set and filters compare equal regardless of construction order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedQuery {
    pub ingredients: BTreeSet<CanonicalName>,
    #[serde(default)]
    pub filters: Filters,
}

impl NormalizedQuery {
    pub fn new<I, S>(ingredients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CanonicalName>,
    {
        Self {
            ingredients: ingredients.into_iter().map(Into::into).collect(),
            filters: Filters::new(),
        }
    }

    /// Adds a filter. Keys and values are trimmed and lower-cased; an empty
    /// value removes the filter, so "absent" and "empty" are the same query.
    pub fn with_filter(mut self, key: &str, value: &str) -> Self {
        self.set_filter(key, value);
        self
    }

    pub fn set_filter(&mut self, key: &str, value: &str) {
        let key = key.trim().to_lowercase();
        let value = value.trim().to_lowercase();
        if key.is_empty() {
            return;
        }
        if value.is_empty() {
            self.filters.remove(&key);
        } else {
            self.filters.insert(key, value);
        }
    }

    pub fn filter(&self, key: &str) -> Option<&str> {
        self.filters.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.ingredients.is_empty()
    }
}

/// Provider-supplied details that do not take part in matching.
/// Every field is optional so older and newer records both decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeMetadata {
    pub cuisine: Option<String>,
    pub ready_in_minutes: Option<u32>,
    pub servings: Option<u32>,
    pub health_score: Option<f64>,
    pub image: Option<String>,
    pub source_url: Option<String>,
    pub summary: Option<String>,
    /// Set on the canned results served when the provider is unavailable.
    pub mock: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub title: String,
    pub ingredients_required: BTreeSet<CanonicalName>,
    pub matched_count: usize,
    pub missing_count: usize,
    #[serde(default)]
    pub metadata: RecipeMetadata,
}

impl Recipe {
    /// Builds a recipe whose matched/missing counts are taken against the
    /// ingredients the user has.
    pub fn matched_against<I, S>(
        id: RecipeId,
        title: impl Into<String>,
        required: I,
        available: &BTreeSet<CanonicalName>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CanonicalName>,
    {
        let ingredients_required: BTreeSet<CanonicalName> =
            required.into_iter().map(Into::into).collect();
        let matched_count = ingredients_required
            .iter()
            .filter(|name| available.contains(*name))
            .count();
        Self {
            id,
            title: title.into(),
            missing_count: ingredients_required.len() - matched_count,
            matched_count,
            ingredients_required,
            metadata: RecipeMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: RecipeMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Share of the recipe's required ingredients the user already has.
    pub fn match_ratio(&self) -> f64 {
        if self.ingredients_required.is_empty() {
            return 0.0;
        }
        (self.matched_count as f64 / self.ingredients_required.len() as f64).clamp(0.0, 1.0)
    }

    pub fn cuisine(&self) -> Option<&str> {
        self.metadata.cuisine.as_deref()
    }

    pub fn traits(&self) -> RecipeTraits {
        RecipeTraits {
            cuisine: self.metadata.cuisine.clone(),
            ready_in_minutes: self.metadata.ready_in_minutes,
            health_score: self.metadata.health_score,
        }
    }
}

/// The recipe details the ranker reads, copied into each feedback event so
/// training does not need the recipe itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeTraits {
    pub cuisine: Option<String>,
    pub ready_in_minutes: Option<u32>,
    /// Provider health score, 0 to 100.
    pub health_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserAction {
    Like,
    Dislike,
    Save,
}

impl UserAction {
    /// Training label: likes and saves are positive, dislikes negative.
    pub fn is_positive(self) -> bool {
        matches!(self, UserAction::Like | UserAction::Save)
    }
}

impl std::str::FromStr for UserAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "like" => Ok(UserAction::Like),
            "dislike" => Ok(UserAction::Dislike),
            "save" => Ok(UserAction::Save),
            other => Err(format!("unknown action '{}'", other)),
        }
    }
}

/// A single user reaction. Immutable once appended to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub recipe_id: RecipeId,
    pub user_action: UserAction,
    pub query_context: NormalizedQuery,
    pub timestamp: DateTime<Utc>,
    /// What was known about the recipe at the time of the reaction.
    #[serde(flatten)]
    pub traits: RecipeTraits,
}
