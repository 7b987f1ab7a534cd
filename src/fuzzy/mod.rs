// src/fuzzy/mod.rs

pub mod similarity;
pub mod symspell;
