// File: src/fetcher.rs
use crate::core::types::{CanonicalName, Filters, NormalizedQuery, Recipe, RecipeMetadata};
use crate::error::FetchError;
use std::collections::BTreeSet;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// The external recipe source. Implementations may block and may fail.
pub trait RecipeFetcher: Send + Sync {
    fn fetch(
        &self,
        ingredients: &BTreeSet<CanonicalName>,
        filters: &Filters,
    ) -> Result<Vec<Recipe>, FetchError>;
}

/// Runs `fetcher` on a worker thread and waits at most `timeout` for it.
/// A worker that overruns is left to finish on its own; its result is dropped.
pub fn fetch_with_timeout(
    fetcher: Arc<dyn RecipeFetcher>,
    ingredients: &BTreeSet<CanonicalName>,
    filters: &Filters,
    timeout: Duration,
) -> Result<Vec<Recipe>, FetchError> {
    let (tx, rx) = mpsc::channel();
    let ingredients = ingredients.clone();
    let filters = filters.clone();

    thread::Builder::new()
        .name("recipe-fetch".into())
        .spawn(move || {
            let result = fetcher.fetch(&ingredients, &filters);
            // The receiver is gone if we already timed out.
            let _ = tx.send(result);
        })
        .map_err(|err| FetchError::Network(format!("could not start fetch worker: {}", err)))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            debug!(?timeout, "recipe fetch timed out");
            Err(FetchError::Timeout(timeout))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(FetchError::Disconnected),
    }
}

/// Canned suggestions served when the provider is unavailable. They are
/// built from the query's own ingredients so the list still looks relevant.
pub fn mock_recipes(query: &NormalizedQuery) -> Vec<Recipe> {
    let have: Vec<&CanonicalName> = query.ingredients.iter().collect();

    let template = |id, title: &str, uses: usize, missing: &[&str], minutes, servings| {
        let required = have
            .iter()
            .take(uses)
            .map(|name| name.to_string())
            .chain(missing.iter().map(|name| name.to_string()));
        Recipe::matched_against(id, title, required, &query.ingredients).with_metadata(
            RecipeMetadata {
                ready_in_minutes: Some(minutes),
                servings: Some(servings),
                summary: Some("Suggested while the recipe service is unavailable.".into()),
                mock: true,
                ..RecipeMetadata::default()
            },
        )
    };

    vec![
        template(1, "Quick Veggie Scramble", 3, &["salt", "pepper"], 15, 2),
        template(2, "Simple Stir Fry", 4, &["soy sauce", "garlic"], 20, 3),
        template(3, "One-Pot Wonder", 2, &["broth", "herbs"], 30, 4),
    ]
}
