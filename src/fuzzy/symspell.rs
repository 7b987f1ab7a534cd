// File: src/fuzzy/symspell.rs
use std::collections::{HashMap, HashSet};

/// Index of an entry in the dictionary that owns this SymSpell instance.
pub type EntryId = usize;

/// Candidate generator based on the Symmetric Delete (SymSpell) algorithm.
/// Every dictionary entry is expanded into its delete variants once; a lookup
/// only expands the input, so the cost does not grow with dictionary size.
/// Candidates are not verified here; the caller scores them.
#[derive(Clone)]
pub struct SymSpell {
    /// Maps a delete variant (e.g., "mozarela") to the entries it could have
    /// come from (e.g., [id_for_mozzarella]).
    deletes: HashMap<String, HashSet<EntryId>>,
    max_edit_distance: usize,
}

impl SymSpell {
    pub fn new(max_edit_distance: usize) -> Self {
        Self {
            deletes: HashMap::new(),
            max_edit_distance,
        }
    }

    /// Adds an entry by generating all its delete variants up to the
    /// configured edit distance and mapping them back to the entry's ID.
    pub fn add_word(&mut self, word: &str, entry_id: EntryId) {
        for edit in self.generate_edits(word) {
            self.deletes.entry(edit).or_default().insert(entry_id);
        }
    }

    /// Returns every entry sharing at least one delete variant with `input`.
    pub fn lookup(&self, input: &str) -> HashSet<EntryId> {
        let mut candidates = HashSet::new();
        for edit in self.generate_edits(input) {
            if let Some(entry_ids) = self.deletes.get(&edit) {
                candidates.extend(entry_ids.iter().copied());
            }
        }
        candidates
    }

    /// Generates all unique variants within max_edit_distance deletions,
    /// including the original string itself. Works on chars, not bytes.
    fn generate_edits(&self, word: &str) -> HashSet<String> {
        let mut edits = HashSet::new();
        edits.insert(word.to_string());

        let mut current_edits = vec![word.chars().collect::<Vec<char>>()];

        for _ in 0..self.max_edit_distance {
            let mut next_edits = Vec::new();
            for edit in &current_edits {
                if edit.len() <= 1 {
                    continue;
                }
                for i in 0..edit.len() {
                    let mut deleted_variant = edit.clone();
                    deleted_variant.remove(i);
                    if edits.insert(deleted_variant.iter().collect()) {
                        next_edits.push(deleted_variant);
                    }
                }
            }
            current_edits = next_edits;
        }

        edits
    }
}
