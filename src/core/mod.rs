// File: src/core/mod.rs
pub mod clock;
pub mod engine;
pub mod fingerprint;
pub mod normalizer;
pub mod types;
pub mod vocabulary;
