// File: src/core/vocabulary.rs
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

/// The closed vocabulary of canonical ingredient names.
pub const CANONICAL_NAMES: &[&str] = &[
    "eggs", "chicken", "beef", "pork", "bacon", "turkey", "lamb", "fish", "salmon", "tuna",
    "shrimp", "tofu", "beans", "lentils", "chickpeas", "rice", "pasta", "noodles", "bread",
    "breadcrumbs", "flour", "quinoa", "oats", "sugar", "honey", "salt", "pepper", "oil",
    "vinegar", "soy sauce", "broth", "butter", "milk", "cream", "yogurt", "cheese",
    "mozzarella cheese", "parmesan cheese", "cheddar cheese", "swiss cheese", "ricotta cheese",
    "feta cheese", "onion", "scallion", "garlic", "tomato", "potato", "carrot", "celery",
    "spinach", "lettuce", "broccoli", "cauliflower", "mushroom", "bell pepper", "cucumber",
    "zucchini", "avocado", "corn", "peas", "apple", "banana", "lemon", "lime", "orange",
    "strawberry", "blueberry", "basil", "oregano", "thyme", "rosemary", "parsley", "cilantro",
    "cinnamon", "ginger", "tortilla",
];

/// Alternate phrasings mapped to their canonical name.
const SYNONYMS: &[(&str, &str)] = &[
    // Cheese
    ("mozz", "mozzarella cheese"),
    ("mozzarella", "mozzarella cheese"),
    ("parm", "parmesan cheese"),
    ("parmesan", "parmesan cheese"),
    ("parmigiano", "parmesan cheese"),
    ("cheddar", "cheddar cheese"),
    ("swiss", "swiss cheese"),
    ("ricotta", "ricotta cheese"),
    ("feta", "feta cheese"),
    // Meat and fish
    ("egg", "eggs"),
    ("chicken breast", "chicken"),
    ("chicken breasts", "chicken"),
    ("chicken thigh", "chicken"),
    ("chicken thighs", "chicken"),
    ("chicken leg", "chicken"),
    ("chicken legs", "chicken"),
    ("beef mince", "beef"),
    ("beef steak", "beef"),
    ("pork chop", "pork"),
    ("pork chops", "pork"),
    ("bacon strips", "bacon"),
    ("salmon fillet", "salmon"),
    ("tuna steak", "tuna"),
    ("prawns", "shrimp"),
    // Vegetables
    ("bell peppers", "bell pepper"),
    ("green pepper", "bell pepper"),
    ("red pepper", "bell pepper"),
    ("yellow pepper", "bell pepper"),
    ("sweet pepper", "bell pepper"),
    ("peppers", "pepper"),
    ("green onion", "scallion"),
    ("green onions", "scallion"),
    ("spring onion", "scallion"),
    ("spring onions", "scallion"),
    ("scallions", "scallion"),
    ("onions", "onion"),
    ("roma tomato", "tomato"),
    ("cherry tomato", "tomato"),
    ("cherry tomatoes", "tomato"),
    ("grape tomato", "tomato"),
    ("tomatoes", "tomato"),
    ("potatoes", "potato"),
    ("carrots", "carrot"),
    ("mushrooms", "mushroom"),
    ("courgette", "zucchini"),
    ("bean", "beans"),
    ("pea", "peas"),
    // Fruit
    ("apples", "apple"),
    ("bananas", "banana"),
    ("lemons", "lemon"),
    ("limes", "lime"),
    ("oranges", "orange"),
    ("strawberries", "strawberry"),
    ("blueberries", "blueberry"),
    // Pantry
    ("olive oil", "oil"),
    ("vegetable oil", "oil"),
    ("canola oil", "oil"),
    ("coconut oil", "oil"),
    ("sea salt", "salt"),
    ("table salt", "salt"),
    ("kosher salt", "salt"),
    ("black pepper", "pepper"),
    ("white pepper", "pepper"),
    ("balsamic vinegar", "vinegar"),
    ("white vinegar", "vinegar"),
    ("apple cider vinegar", "vinegar"),
    ("stock", "broth"),
    ("chicken stock", "broth"),
    ("bread crumbs", "breadcrumbs"),
    ("panko", "breadcrumbs"),
    // Dairy
    ("skim milk", "milk"),
    ("heavy cream", "cream"),
    ("sour cream", "cream"),
    ("greek yogurt", "yogurt"),
    ("plain yogurt", "yogurt"),
    // Grains and starches
    ("brown rice", "rice"),
    ("white rice", "rice"),
    ("jasmine rice", "rice"),
    ("basmati rice", "rice"),
    ("wheat pasta", "pasta"),
    ("penne", "pasta"),
    ("penne pasta", "pasta"),
    ("spaghetti", "pasta"),
    ("macaroni", "pasta"),
    ("oatmeal", "oats"),
];

/// Phrase → canonical name. Every canonical name maps to itself.
pub static SYNONYM_TABLE: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut table: HashMap<&'static str, &'static str> =
        CANONICAL_NAMES.iter().map(|name| (*name, *name)).collect();
    for (phrase, canonical) in SYNONYMS {
        table.insert(*phrase, *canonical);
    }
    table
});

/// Units of measure.
static UNITS: &[&str] = &[
    "cup", "cups", "tablespoon", "tablespoons", "tbsp", "teaspoon", "teaspoons", "tsp",
    "pound", "pounds", "lb", "lbs", "ounce", "ounces", "oz", "gram", "grams", "kilogram",
    "kilograms", "kg", "ml", "liter", "liters", "litre", "litres", "piece", "pieces", "slice",
    "slices", "clove", "cloves", "bunch", "bunches", "head", "heads", "can", "cans", "jar",
    "jars", "bottle", "bottles", "package", "packages", "pack", "bag", "bags", "box", "boxes",
    "container", "containers", "stick", "sticks", "handful", "pinch", "dash",
];

/// Vague amounts and number words.
static QUANTITY_WORDS: &[&str] = &[
    "an", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "dozen", "half", "quarter", "third", "some", "little", "bit", "lots",
    "lot", "few", "several", "many", "much", "couple", "leftover", "leftovers", "remaining",
    "any", "more",
];

/// Preparation and quality descriptors that do not change what the ingredient is.
static DESCRIPTORS: &[&str] = &[
    "fresh", "dried", "frozen", "canned", "chopped", "diced", "minced", "sliced", "shredded",
    "grated", "cooked", "raw", "organic", "whole", "ground", "crushed", "fine", "coarse",
    "extra", "virgin", "pure", "unsalted", "salted", "sweetened", "unsweetened", "large",
    "small", "medium", "big", "thin", "thick", "free-range", "boneless", "skinless", "ripe",
    "roasted", "roast", "grilled", "baked", "boiled", "steamed", "smoked",
];

static FILLERS: &[&str] = &["of", "the", "for", "to", "or", "my", "our", "with"];

/// Every token that is stripped from an ingredient phrase.
pub static STOP_TOKENS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    UNITS
        .iter()
        .chain(QUANTITY_WORDS)
        .chain(DESCRIPTORS)
        .chain(FILLERS)
        .copied()
        .collect()
});

/// Conversational lead-ins removed before splitting.
pub const LEAD_INS: &[&str] = &[
    "i have", "we have", "i've got", "there is", "there are", "a little", "a bit of",
    "lots of", "bunch of", "left over",
];
