// src/lib.rs

pub mod cache;
pub mod config;
pub mod core;
pub mod error;
pub mod fetcher;
pub mod fuzzy;
pub mod learning;
pub mod ledger;
pub mod observability;
pub mod persistence;
pub mod ranking;

pub use crate::core::engine::{Engine, Notice, Suggestions};
pub use crate::core::fingerprint::{fingerprint, Fingerprint};
pub use crate::core::normalizer::Normalizer;
pub use crate::core::types::{
    FeedbackEvent, Filters, Ingredient, MatchKind, NormalizedQuery, Recipe, RecipeId,
    RecipeMetadata, RecipeTraits, UserAction,
};
pub use crate::error::{FetchError, PantryError};
