// File: src/core/normalizer.rs
use crate::config::NormalizerSettings;
use crate::core::types::{CanonicalName, Ingredient, MatchKind};
use crate::core::vocabulary::{LEAD_INS, STOP_TOKENS, SYNONYM_TABLE};
use crate::fuzzy::similarity::similarity_ratio;
use crate::fuzzy::symspell::SymSpell;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Separators between ingredient phrases, besides the word "and".
const PHRASE_SEPARATORS: &[char] = &[',', ';', '\n', '\r', '•', '&', '|'];

/// Unicode vulgar fractions that count as quantities.
const FRACTIONS: &[char] = &['½', '⅓', '⅔', '¼', '¾', '⅕', '⅛'];

/// A source of canonical names for cleaned ingredient phrases.
pub trait IngredientMatcher: Send + Sync {
    fn resolve(&self, phrase: &str) -> Option<CanonicalName>;
    fn kind(&self) -> MatchKind;
}

/// Exact lookup in a phrase → canonical table.
pub struct ExactTable {
    table: HashMap<String, CanonicalName>,
}

impl ExactTable {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<CanonicalName>,
    {
        Self {
            table: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// The built-in kitchen vocabulary.
    pub fn builtin() -> Self {
        Self::from_pairs(SYNONYM_TABLE.iter().map(|(k, v)| (*k, *v)))
    }
}

impl IngredientMatcher for ExactTable {
    fn resolve(&self, phrase: &str) -> Option<CanonicalName> {
        self.table.get(phrase).cloned()
    }

    fn kind(&self) -> MatchKind {
        MatchKind::Exact
    }
}

/// Approximate lookup: SymSpell proposes table phrases sharing a delete
/// variant with the input, and the best similarity ratio at or above the
/// threshold wins. Ties go to the lexicographically smaller phrase.
/// Inputs longer than any table phrase plus the edit distance are not looked up.
pub struct SimilarityMatcher {
    phrases: Vec<String>,
    targets: Vec<CanonicalName>,
    index: SymSpell,
    threshold: f64,
    max_input_chars: usize,
}

impl SimilarityMatcher {
    pub fn from_pairs<I, K, V>(pairs: I, threshold: f64, max_edit_distance: usize) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<CanonicalName>,
    {
        let mut entries: Vec<(String, CanonicalName)> =
            pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        entries.sort();

        let mut index = SymSpell::new(max_edit_distance);
        let mut longest = 0;
        for (id, (phrase, _)) in entries.iter().enumerate() {
            index.add_word(phrase, id);
            longest = longest.max(phrase.chars().count());
        }
        let (phrases, targets) = entries.into_iter().unzip();

        Self {
            phrases,
            targets,
            index,
            threshold,
            max_input_chars: longest + max_edit_distance,
        }
    }

    pub fn builtin(threshold: f64, max_edit_distance: usize) -> Self {
        Self::from_pairs(
            SYNONYM_TABLE.iter().map(|(k, v)| (*k, *v)),
            threshold,
            max_edit_distance,
        )
    }
}

impl IngredientMatcher for SimilarityMatcher {
    fn resolve(&self, phrase: &str) -> Option<CanonicalName> {
        if phrase.chars().count() > self.max_input_chars {
            return None;
        }
        let mut best: Option<(f64, usize)> = None;
        for id in self.index.lookup(phrase) {
            let ratio = similarity_ratio(phrase, &self.phrases[id]);
            if ratio < self.threshold {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_ratio, best_id)) => {
                    ratio > best_ratio || (ratio == best_ratio && id < best_id)
                }
            };
            if better {
                best = Some((ratio, id));
            }
        }
        best.map(|(_, id)| self.targets[id].clone())
    }

    fn kind(&self) -> MatchKind {
        MatchKind::Fuzzy
    }
}

/// Turns free text into canonical ingredient names. Pure: the output depends
/// only on the input and the matcher chain fixed at construction.
pub struct Normalizer {
    matchers: Vec<Box<dyn IngredientMatcher>>,
}

impl Normalizer {
    /// Exact table first, then the similarity matcher, both over the
    /// built-in vocabulary.
    pub fn new(settings: &NormalizerSettings) -> Self {
        Self::with_matchers(vec![
            Box::new(ExactTable::builtin()),
            Box::new(SimilarityMatcher::builtin(
                settings.fuzzy_threshold,
                settings.max_edit_distance,
            )),
        ])
    }

    pub fn with_matchers(matchers: Vec<Box<dyn IngredientMatcher>>) -> Self {
        Self { matchers }
    }

    /// Canonical ingredient set for `raw`. Empty or unusable input yields an
    /// empty set.
    pub fn normalize(&self, raw: &str) -> BTreeSet<CanonicalName> {
        self.parse(raw)
            .into_iter()
            .map(|ingredient| ingredient.canonical_name)
            .collect()
    }

    /// Per-phrase view of `normalize`, in input order, first occurrence of
    /// each canonical name only.
    pub fn parse(&self, raw: &str) -> Vec<Ingredient> {
        let mut seen = HashSet::new();
        let mut ingredients = Vec::new();

        for phrase in split_phrases(raw) {
            let cleaned = clean_phrase(&phrase);
            if cleaned.is_empty() {
                continue;
            }
            let (canonical_name, match_kind) = self.resolve(&cleaned);
            if match_kind == MatchKind::Unmatched {
                debug!(phrase = %cleaned, "no vocabulary match, keeping phrase as its own identity");
            }
            if seen.insert(canonical_name.clone()) {
                ingredients.push(Ingredient {
                    raw_text: phrase,
                    canonical_name,
                    match_kind,
                });
            }
        }
        ingredients
    }

    fn resolve(&self, cleaned: &str) -> (CanonicalName, MatchKind) {
        let singular = singularize(cleaned);
        let candidates: Vec<&str> = std::iter::once(cleaned).chain(singular.as_deref()).collect();

        for matcher in &self.matchers {
            for candidate in &candidates {
                if let Some(name) = matcher.resolve(candidate) {
                    return (name, matcher.kind());
                }
            }
        }
        (cleaned.to_string(), MatchKind::Unmatched)
    }
}

/// Splits on separators and on the standalone word "and", and removes
/// parenthesised asides. Returned phrases are trimmed, original case.
fn split_phrases(raw: &str) -> Vec<String> {
    let mut without_asides = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => without_asides.push(c),
            _ => {}
        }
    }

    let mut phrases = Vec::new();
    for piece in without_asides.split(PHRASE_SEPARATORS) {
        let mut current: Vec<&str> = Vec::new();
        for token in piece.split_whitespace() {
            if token.eq_ignore_ascii_case("and") {
                if !current.is_empty() {
                    phrases.push(current.join(" "));
                    current.clear();
                }
            } else {
                current.push(token);
            }
        }
        if !current.is_empty() {
            phrases.push(current.join(" "));
        }
    }
    phrases
}

/// Lower-cases, drops lead-ins, quantities, units, descriptors and one-letter
/// leftovers. The result is a space-joined token string, possibly empty, and
/// cleaning it again leaves it unchanged.
fn clean_phrase(phrase: &str) -> String {
    let mut text = phrase.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
    // Dropping a token can bring two halves of a lead-in together.
    loop {
        let cleaned = drop_stop_tokens(&strip_lead_ins(&text));
        if cleaned == text {
            return cleaned;
        }
        text = cleaned;
    }
}

fn strip_lead_ins(text: &str) -> String {
    let mut padded = format!(" {} ", text);
    for lead_in in LEAD_INS {
        let needle = format!(" {} ", lead_in);
        while padded.contains(&needle) {
            padded = padded.replace(&needle, " ");
        }
    }
    padded.trim().to_string()
}

fn drop_stop_tokens(text: &str) -> String {
    text.split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|token| token.chars().count() > 1)
        .filter(|token| !is_quantity(token))
        .filter(|token| !STOP_TOKENS.contains(*token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// "2", "1/2", "1.5", "200g", "2%", "½".
fn is_quantity(token: &str) -> bool {
    token
        .chars()
        .next()
        .map(|c| c.is_ascii_digit() || FRACTIONS.contains(&c))
        .unwrap_or(false)
}

fn singularize(phrase: &str) -> Option<String> {
    if phrase.chars().count() > 3 && phrase.ends_with('s') && !phrase.ends_with("ss") {
        Some(phrase[..phrase.len() - 1].to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::new(&NormalizerSettings::default())
    }

    fn set(names: &[&str]) -> BTreeSet<CanonicalName> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn normalizes_the_kitchen_example() {
        let names = normalizer().normalize("eggs, leftover chicken, half a bell pepper, shredded mozz");
        assert_eq!(names, set(&["eggs", "chicken", "bell pepper", "mozzarella cheese"]));
    }

    #[test]
    fn strips_quantities_and_descriptors() {
        let names = normalizer().normalize("two eggs, some shredded mozz");
        assert_eq!(names, set(&["eggs", "mozzarella cheese"]));

        let names = normalizer().normalize("2 cups chopped tomatoes; 1/2 lb ground beef");
        assert_eq!(names, set(&["tomato", "beef"]));
    }

    #[test]
    fn splits_on_the_word_and() {
        let names = normalizer().normalize("I have rice and beans & garlic");
        assert_eq!(names, set(&["rice", "beans", "garlic"]));
    }

    #[test]
    fn empty_and_garbage_input_give_empty_set() {
        assert!(normalizer().normalize("").is_empty());
        assert!(normalizer().normalize("   \n ").is_empty());
        assert!(normalizer().normalize("!!! 123, ½, ...").is_empty());
    }

    #[test]
    fn fuzzy_matches_typos() {
        let parsed = normalizer().parse("mozarella, brocoli");
        let names: Vec<&str> = parsed.iter().map(|i| i.canonical_name.as_str()).collect();
        assert_eq!(names, vec!["mozzarella cheese", "broccoli"]);
        assert!(parsed.iter().all(|i| i.match_kind == MatchKind::Fuzzy));
    }

    #[test]
    fn unmatched_phrase_becomes_its_own_identity() {
        let parsed = normalizer().parse("Fresh Dragonfruit");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].canonical_name, "dragonfruit");
        assert_eq!(parsed[0].match_kind, MatchKind::Unmatched);
        assert_eq!(parsed[0].raw_text, "Fresh Dragonfruit");
    }

    #[test]
    fn long_phrase_skips_fuzzy_lookup() {
        let matcher = SimilarityMatcher::from_pairs([("basil", "basil")], 0.85, 2);
        assert_eq!(matcher.resolve("basill"), Some("basil".to_string()));
        assert_eq!(matcher.resolve("basilbasil"), None);

        let paragraph = "tomato soup recipe idea ".repeat(84);
        let started = std::time::Instant::now();
        let parsed = normalizer().parse(&paragraph);
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].match_kind, MatchKind::Unmatched);
        assert!(parsed[0].canonical_name.chars().count() >= 2000);
    }

    #[test]
    fn plural_falls_back_to_singular_entry() {
        assert_eq!(normalizer().normalize("zucchinis"), set(&["zucchini"]));
    }

    #[test]
    fn duplicates_collapse() {
        let parsed = normalizer().parse("egg, eggs, 3 eggs");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].canonical_name, "eggs");
    }

    #[test]
    fn parenthesised_asides_are_ignored() {
        assert_eq!(normalizer().normalize("butter (unsalted, 2 sticks)"), set(&["butter"]));
    }

    #[test]
    fn normalizing_canonical_output_is_idempotent() {
        let normalizer = normalizer();
        let inputs = [
            "eggs, leftover chicken, half a bell pepper, shredded mozz",
            "3 roma tomatoes, handful of fresh basil, olive oil and sea salt",
            "dragonfruit, weird thing, mozarella",
            "I have some leftover rice (about 2 cups), peas and a couple carrots",
            "we fresh have",
            "there chopped 2 are lots fresh of",
            "",
        ];
        for input in inputs {
            let once = normalizer.normalize(input);
            let joined = once.iter().cloned().collect::<Vec<_>>().join(", ");
            assert_eq!(normalizer.normalize(&joined), once, "input: {}", input);
        }
    }

    #[test]
    fn lead_in_exposed_by_dropped_descriptor_is_removed() {
        let normalizer = normalizer();
        assert!(normalizer.normalize("we fresh have").is_empty());
        assert_eq!(normalizer.normalize("we fresh have rice"), set(&["rice"]));
    }

    #[test]
    fn every_canonical_name_maps_to_itself() {
        let normalizer = normalizer();
        for name in crate::core::vocabulary::CANONICAL_NAMES {
            assert_eq!(normalizer.normalize(name), set(&[name]));
        }
    }

    #[test]
    fn matcher_chain_is_swappable() {
        let custom = Normalizer::with_matchers(vec![Box::new(ExactTable::from_pairs([
            ("aubergine", "eggplant"),
        ]))]);
        assert_eq!(custom.normalize("aubergine, eggs"), set(&["eggplant", "eggs"]));
    }
}
