// File: src/core/engine.rs
use crate::cache::CacheStore;
use crate::config::Settings;
use crate::core::clock::{Clock, SystemClock};
use crate::core::fingerprint::fingerprint;
use crate::core::normalizer::Normalizer;
use crate::core::types::{
    FeedbackEvent, Filters, Ingredient, NormalizedQuery, Recipe, RecipeId, RecipeTraits,
    UserAction,
};
use crate::error::{PantryError, TrainingError};
use crate::fetcher::{fetch_with_timeout, mock_recipes, RecipeFetcher};
use crate::ledger::FeedbackLedger;
use crate::ranking::{RankingModel, RetrainOutcome, ScoredRecipe};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Filter key carrying the configured result limit to the fetcher.
const MAX_RESULTS_FILTER: &str = "max_results";

/// Recipes feedback may refer to, with their traits. Bounded: once over
/// capacity the least recently served ids are forgotten.
struct KnownRecipes {
    recipes: HashMap<RecipeId, (RecipeTraits, u64)>,
    tick: u64,
    capacity: usize,
}

impl KnownRecipes {
    fn new(capacity: usize) -> Self {
        Self {
            recipes: HashMap::new(),
            tick: 0,
            capacity: capacity.max(1),
        }
    }

    fn remember(&mut self, id: RecipeId, traits: RecipeTraits) {
        self.tick += 1;
        self.recipes.insert(id, (traits, self.tick));
    }

    fn traits(&self, id: RecipeId) -> Option<RecipeTraits> {
        self.recipes.get(&id).map(|(traits, _)| traits.clone())
    }

    fn trim(&mut self) {
        if self.recipes.len() <= self.capacity {
            return;
        }
        let mut ticks: Vec<u64> = self.recipes.values().map(|(_, tick)| *tick).collect();
        let excess = self.recipes.len() - self.capacity;
        let (_, cutoff, _) = ticks.select_nth_unstable(excess - 1);
        let cutoff = *cutoff;
        self.recipes.retain(|_, (_, tick)| *tick > cutoff);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.recipes.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The provider failed; the list is the canned fallback.
    LimitedResults { reason: &'static str },
}

#[derive(Debug, Clone)]
pub struct Suggestions {
    pub query: NormalizedQuery,
    pub ingredients: Vec<Ingredient>,
    pub recipes: Vec<ScoredRecipe>,
    pub notice: Option<Notice>,
    pub from_cache: bool,
}

/// The whole pipeline: normalize, fingerprint, cache or fetch, rank.
/// Owns the shared cache and model; sessions call it through `&self`.
pub struct Engine {
    normalizer: Normalizer,
    cache: Arc<CacheStore>,
    fetcher: Arc<dyn RecipeFetcher>,
    model: Arc<RankingModel>,
    ledger: Arc<FeedbackLedger>,
    /// Recently served recipes and those in the ledger.
    known_recipes: RwLock<KnownRecipes>,
    retrain_workers: Mutex<Vec<JoinHandle<()>>>,
    settings: Settings,
    clock: Arc<dyn Clock>,
}

impl Engine {
    pub fn open(settings: Settings, fetcher: Arc<dyn RecipeFetcher>) -> Self {
        Self::open_with_clock(settings, fetcher, Arc::new(SystemClock))
    }

    /// Opens the cache, ledger and model named in `settings`. Missing or
    /// unreadable state starts empty.
    pub fn open_with_clock(
        settings: Settings,
        fetcher: Arc<dyn RecipeFetcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = Arc::new(CacheStore::open(&settings.cache, clock.clone()));
        let ledger = Arc::new(FeedbackLedger::open(&settings.ledger));
        let model = Arc::new(RankingModel::open(&settings.ranking, clock.clone()));

        let mut known_recipes = KnownRecipes::new(known_recipe_capacity(&settings));
        for event in ledger.events() {
            known_recipes.remember(event.recipe_id, event.traits);
        }
        known_recipes.trim();

        info!(
            cached = cache.len(),
            feedback = ledger.len(),
            phase = ?model.phase(),
            "engine ready"
        );

        Self {
            normalizer: Normalizer::new(&settings.normalizer),
            cache,
            fetcher,
            model,
            ledger,
            known_recipes: RwLock::new(known_recipes),
            retrain_workers: Mutex::new(Vec::new()),
            settings,
            clock,
        }
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn model(&self) -> &RankingModel {
        &self.model
    }

    pub fn ledger(&self) -> &FeedbackLedger {
        &self.ledger
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Ranked recipes for the ingredients in `raw`.
    ///
    /// Fails only with [`PantryError::InvalidQuery`] when nothing usable is
    /// left after normalization. Provider failures degrade to the mock list
    /// with a [`Notice::LimitedResults`]; those lists are not cached.
    pub fn suggest(&self, raw: &str, filters: &Filters) -> Result<Suggestions, PantryError> {
        let ingredients = self.normalizer.parse(raw);
        let mut query = NormalizedQuery::new(ingredients.iter().map(|i| i.canonical_name.clone()));
        for (key, value) in filters {
            query.set_filter(key, value);
        }
        if query.is_empty() {
            return Err(PantryError::InvalidQuery { raw: raw.to_string() });
        }

        let key = fingerprint(&query);
        let mut notice = None;
        let mut from_cache = false;

        let candidates = match self.cache.get(&key) {
            Some(entry) => {
                debug!(fingerprint = %key, "cache hit");
                from_cache = true;
                entry.recipes
            }
            None => {
                debug!(fingerprint = %key, "cache miss, fetching");
                match self.fetch(&query) {
                    Ok(recipes) => {
                        self.cache.put(key, recipes.clone());
                        recipes
                    }
                    Err(reason) => {
                        notice = Some(Notice::LimitedResults { reason });
                        mock_recipes(&query)
                    }
                }
            }
        };

        let mut recipes = self.model.rank_scored(candidates, &query);
        recipes.truncate(self.settings.fetch.max_results);
        self.remember(&recipes);

        Ok(Suggestions {
            query,
            ingredients,
            recipes,
            notice,
            from_cache,
        })
    }

    fn fetch(&self, query: &NormalizedQuery) -> Result<Vec<Recipe>, &'static str> {
        let mut filters = query.filters.clone();
        filters
            .entry(MAX_RESULTS_FILTER.to_string())
            .or_insert_with(|| self.settings.fetch.max_results.to_string());

        fetch_with_timeout(
            self.fetcher.clone(),
            &query.ingredients,
            &filters,
            self.settings.fetch.timeout(),
        )
        .map_err(|err| {
            warn!(error = %err, reason = err.reason(), "recipe fetch failed, serving fallback results");
            err.reason()
        })
    }

    fn remember(&self, served: &[ScoredRecipe]) {
        let mut known = self.known_recipes.write();
        for scored in served {
            known.remember(scored.recipe.id, scored.recipe.traits());
        }
        known.trim();
    }

    /// Appends a reaction to the ledger and retrains in the background when
    /// due. Unknown recipe ids are logged and ignored; returns whether the
    /// event was recorded.
    pub fn record_feedback(
        &self,
        recipe_id: RecipeId,
        action: UserAction,
        query_context: &NormalizedQuery,
    ) -> bool {
        let traits = match self.known_recipes.read().traits(recipe_id) {
            Some(traits) => traits,
            None => {
                warn!(recipe_id, ?action, "feedback for unknown recipe ignored");
                return false;
            }
        };

        let event = FeedbackEvent {
            recipe_id,
            user_action: action,
            query_context: query_context.clone(),
            timestamp: self.clock.now(),
            traits,
        };
        if let Err(err) = self.ledger.append(event) {
            warn!(error = %err, recipe_id, "feedback kept in memory but not persisted");
        }
        debug!(recipe_id, ?action, "feedback recorded");

        self.maybe_retrain();
        true
    }

    /// Starts a background retrain if the model is due. Scoring keeps using
    /// the current snapshot until the new one is swapped in.
    pub fn maybe_retrain(&self) {
        let Some(ticket) = self.model.try_begin_retrain(self.ledger.len()) else {
            return;
        };

        let model = self.model.clone();
        let ledger = self.ledger.clone();
        let window_size = self.settings.ranking.training_window;

        let spawned = thread::Builder::new()
            .name("ranking-retrain".into())
            .spawn(move || {
                let (window, ledger_len) = ledger.training_window(window_size);
                if let Ok(RetrainOutcome::Applied(_)) = model.finish_retrain(ticket, &window, ledger_len) {
                    if let Err(err) = model.save() {
                        warn!(error = %err, "failed to save ranking model");
                    }
                }
            });

        match spawned {
            Ok(handle) => {
                let mut workers = self.retrain_workers.lock();
                workers.retain(|worker| !worker.is_finished());
                workers.push(handle);
            }
            // The ticket went down with the closure, so the phase is restored.
            Err(err) => warn!(error = %err, "could not start retrain worker"),
        }
    }

    /// Retrains on the calling thread, regardless of the triggers.
    pub fn retrain_now(&self) -> Result<RetrainOutcome, TrainingError> {
        let (window, ledger_len) = self.ledger.training_window(self.settings.ranking.training_window);
        let outcome = self.model.retrain(&window, ledger_len)?;
        if let RetrainOutcome::Applied(_) = outcome {
            if let Err(err) = self.model.save() {
                warn!(error = %err, "failed to save ranking model");
            }
        }
        Ok(outcome)
    }

    /// Blocks until background retrains have finished.
    pub fn wait_for_retraining(&self) {
        let workers: Vec<JoinHandle<()>> = self.retrain_workers.lock().drain(..).collect();
        for worker in workers {
            if worker.join().is_err() {
                warn!("retrain worker panicked");
            }
        }
    }

    /// Waits for retraining, then flushes the cache and saves the model.
    pub fn shutdown(&self) -> Result<(), PantryError> {
        self.wait_for_retraining();
        self.cache.flush()?;
        self.model.save()?;
        info!(
            cached = self.cache.len(),
            feedback = self.ledger.len(),
            "engine shut down"
        );
        Ok(())
    }
}

/// Enough to cover every list the cache can hand out.
fn known_recipe_capacity(settings: &Settings) -> usize {
    settings
        .cache
        .max_entries
        .saturating_mul(settings.fetch.max_results)
        .max(1)
}
