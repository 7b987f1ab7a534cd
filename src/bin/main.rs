use clap::Parser;
use crossterm::style::Stylize;
use pantry_core::config::Settings;
use pantry_core::core::types::CanonicalName;
use pantry_core::fetcher::RecipeFetcher;
use pantry_core::observability::init_tracing;
use pantry_core::ranking::RetrainOutcome;
use pantry_core::{
    Engine, FetchError, Filters, MatchKind, Notice, PantryError, Recipe, RecipeMetadata,
    Suggestions, UserAction,
};
use std::collections::BTreeSet;
use std::io::{stdin, stdout, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "pantry_engine", about = "Suggest recipes from what is in your kitchen")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulate an unreachable recipe service
    #[arg(long)]
    offline: bool,
}

/// A small built-in catalog standing in for a remote recipe service.
struct DemoCatalog;

const CATALOG: &[(u64, &str, &str, &[&str])] = &[
    (101, "Chicken Pepper Omelette", "french", &["eggs", "chicken", "bell pepper", "butter"]),
    (102, "Cheesy Chicken Bake", "american", &["chicken", "mozzarella cheese", "tomato", "onion"]),
    (103, "Shakshuka", "middle eastern", &["eggs", "tomato", "bell pepper", "onion", "garlic"]),
    (104, "Margherita Pizza", "italian", &["flour", "mozzarella cheese", "tomato", "basil"]),
    (105, "Chicken Fried Rice", "chinese", &["rice", "chicken", "eggs", "soy sauce", "scallion"]),
    (106, "Caprese Salad", "italian", &["tomato", "mozzarella cheese", "basil", "oil"]),
    (107, "Stuffed Peppers", "american", &["bell pepper", "beef", "rice", "tomato"]),
    (108, "Spinach Frittata", "italian", &["eggs", "spinach", "parmesan cheese", "onion"]),
    (109, "Garlic Butter Pasta", "italian", &["pasta", "garlic", "butter", "parmesan cheese"]),
    (110, "Black Bean Tacos", "mexican", &["beans", "tortilla", "onion", "cheddar cheese"]),
    (111, "Thai Basil Chicken", "thai", &["chicken", "basil", "garlic", "soy sauce", "rice"]),
    (112, "Potato Hash", "american", &["potato", "onion", "bell pepper", "eggs"]),
];

impl RecipeFetcher for DemoCatalog {
    fn fetch(
        &self,
        ingredients: &BTreeSet<CanonicalName>,
        filters: &Filters,
    ) -> Result<Vec<Recipe>, FetchError> {
        let cuisine = filters.get("cuisine");
        let limit = match filters.get("max_results") {
            Some(value) => value
                .parse::<usize>()
                .map_err(|_| FetchError::MalformedResponse(format!("bad max_results '{}'", value)))?,
            None => CATALOG.len(),
        };

        let mut recipes: Vec<Recipe> = CATALOG
            .iter()
            .filter(|(_, _, kind, _)| cuisine.map_or(true, |wanted| wanted.as_str() == *kind))
            .map(|(id, title, kind, required)| {
                Recipe::matched_against(*id, *title, required.iter().copied(), ingredients)
                    .with_metadata(RecipeMetadata {
                        cuisine: Some(kind.to_string()),
                        ready_in_minutes: Some(15 + (*id % 4) as u32 * 10),
                        health_score: Some(40.0 + (*id % 5) as f64 * 12.0),
                        ..RecipeMetadata::default()
                    })
            })
            .filter(|recipe| recipe.matched_count > 0)
            .collect();
        recipes.sort_by(|a, b| b.matched_count.cmp(&a.matched_count).then(a.id.cmp(&b.id)));
        recipes.truncate(limit);
        Ok(recipes)
    }
}

struct Offline;

impl RecipeFetcher for Offline {
    fn fetch(&self, _: &BTreeSet<CanonicalName>, _: &Filters) -> Result<Vec<Recipe>, FetchError> {
        Err(FetchError::Network("connection refused".into()))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    init_tracing(&settings.observability)?;

    let fetcher: Arc<dyn RecipeFetcher> = if cli.offline {
        Arc::new(Offline)
    } else {
        Arc::new(DemoCatalog)
    };
    let engine = Engine::open(settings, fetcher);
    let mut filters = Filters::new();
    let mut last: Option<Suggestions> = None;

    print_banner();
    prompt()?;

    for line in stdin().lock().lines() {
        let input = line?;
        let cmd = input.trim();

        match cmd {
            "" => {}
            "exit" | ":quit" => break,
            ":retrain" => match engine.retrain_now() {
                Ok(RetrainOutcome::Applied(snapshot)) => {
                    println!("{} on {} events", "Retrained".green(), snapshot.training_event_count);
                    for (name, weight) in &snapshot.weights {
                        println!("  {:<22} {:+.3}", name, weight);
                    }
                }
                Ok(RetrainOutcome::Skipped) => println!("A retrain is already running."),
                Err(err) => println!("{} {}", "Not retrained:".yellow(), err),
            },
            ":stats" => {
                let stats = engine.cache().stats();
                println!(
                    "cache: {} entries ({} recipes), {} hits, {} misses, {} evictions, avg age {}s",
                    stats.entries,
                    stats.recipes_cached,
                    stats.hits,
                    stats.misses,
                    stats.evictions,
                    stats.average_age.num_seconds()
                );
                println!(
                    "model: {:?}, feedback events: {}",
                    engine.model().phase(),
                    engine.ledger().len()
                );
            }
            ":clear" => {
                engine.cache().clear();
                println!("Cache cleared.");
            }
            s if s.starts_with(":cuisine") => {
                let value = s[":cuisine".len()..].trim();
                if value.is_empty() {
                    filters.remove("cuisine");
                    println!("Cuisine filter cleared.");
                } else {
                    filters.insert("cuisine".into(), value.to_string());
                    println!("Cuisine filter: {}", value);
                }
            }
            s if s.starts_with(':') => match parse_feedback(s) {
                Some((action, n)) => record(&engine, last.as_ref(), action, n),
                None => println!("Unknown command '{}'.", s),
            },
            raw => match engine.suggest(raw, &filters) {
                Ok(suggestions) => {
                    print_suggestions(&suggestions);
                    last = Some(suggestions);
                }
                Err(err @ PantryError::InvalidQuery { .. }) => println!("{}", err.to_string().yellow()),
                Err(err) => println!("{} {}", "Error:".red(), err),
            },
        }
        prompt()?;
    }

    println!("\nSaving state...");
    engine.shutdown()?;
    Ok(())
}

fn parse_feedback(cmd: &str) -> Option<(UserAction, usize)> {
    let mut parts = cmd.trim_start_matches(':').split_whitespace();
    let action = parts.next()?.parse::<UserAction>().ok()?;
    let n = parts.next()?.parse::<usize>().ok()?;
    Some((action, n))
}

fn record(engine: &Engine, last: Option<&Suggestions>, action: UserAction, n: usize) {
    let Some(suggestions) = last else {
        println!("Search for something first.");
        return;
    };
    let Some(scored) = n.checked_sub(1).and_then(|i| suggestions.recipes.get(i)) else {
        println!("No result #{}.", n);
        return;
    };
    if engine.record_feedback(scored.recipe.id, action, &suggestions.query) {
        println!("Noted: {:?} '{}'", action, scored.recipe.title);
    } else {
        println!("That recipe is no longer known.");
    }
}

fn print_banner() {
    println!("{}", "Pantry Recipe Suggestions".bold());
    println!("---------------------------------------------------------------");
    println!("List your ingredients, e.g. 'eggs, leftover chicken, shredded mozz'.");
    println!("Rate results with ':like N', ':dislike N', ':save N'.");
    println!("':cuisine NAME' filters, ':retrain', ':stats', ':clear', 'exit' to save and quit.\n");
}

fn print_suggestions(suggestions: &Suggestions) {
    let understood: Vec<String> = suggestions
        .ingredients
        .iter()
        .map(|ingredient| match ingredient.match_kind {
            MatchKind::Exact => ingredient.canonical_name.clone(),
            MatchKind::Fuzzy => format!("{} (from '{}')", ingredient.canonical_name, ingredient.raw_text),
            MatchKind::Unmatched => format!("{}?", ingredient.canonical_name),
        })
        .collect();
    println!("\nIngredients: {}", understood.join(", "));

    if let Some(Notice::LimitedResults { reason }) = &suggestions.notice {
        println!(
            "{}",
            format!("Limited results: recipe service unavailable ({}).", reason).yellow()
        );
    } else if suggestions.from_cache {
        println!("{}", "(cached)".dark_grey());
    }

    if suggestions.recipes.is_empty() {
        println!("No recipes found.");
        return;
    }
    for (i, scored) in suggestions.recipes.iter().enumerate() {
        let recipe = &scored.recipe;
        println!(
            "  :{} {} {}",
            i + 1,
            recipe.title.as_str().bold(),
            format!(
                "(score {:.2}, have {}/{}, missing {})",
                scored.score,
                recipe.matched_count,
                recipe.ingredients_required.len(),
                recipe.missing_count
            )
            .dark_grey()
        );
    }
}

fn prompt() -> std::io::Result<()> {
    print!("\n> ");
    stdout().flush()
}
