// File: src/ranking/mod.rs
pub mod context;
pub mod features;
pub mod model;

pub use model::{
    ModelPhase, ModelSnapshot, RankingModel, RetrainOutcome, RetrainTicket, ScoredRecipe,
};
