//! Template-based breakfast recipes and the starter favorites list.

use std::sync::OnceLock;

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;

use crate::models::{Recipe, RecipeId};
use crate::util::unix_timestamp_millis;

struct RecipeTemplate {
    title: &'static str,
    description: &'static str,
    prep_time: &'static str,
    image: &'static str,
    base_ingredients: &'static [&'static str],
    per_person_ingredients: &'static [&'static str],
    instructions: &'static [&'static str],
}

const TEMPLATES: &[RecipeTemplate] = &[
    RecipeTemplate {
        title: "Fluffy Buttermilk Pancakes",
        description: "Deliciously fluffy pancakes served with maple syrup and fresh berries",
        prep_time: "20 min",
        image: "https://images.unsplash.com/photo-1484723091739-30a097e8f929?auto=format&fit=crop&w=480&q=80",
        base_ingredients: &[
            "1 1/2 cups all-purpose flour",
            "3 tablespoons sugar",
            "1 teaspoon baking powder",
            "1/2 teaspoon baking soda",
            "1/4 teaspoon salt",
            "1 3/4 cups buttermilk",
            "2 large eggs",
            "3 tablespoons unsalted butter, melted",
            "Vegetable oil for griddle",
            "Maple syrup and fresh berries for serving",
        ],
        per_person_ingredients: &["1 large egg", "1/4 cup fresh berries"],
        instructions: &[
            "Whisk together flour, sugar, baking powder, baking soda, and salt in a large bowl",
            "In a separate bowl, whisk buttermilk, eggs, and melted butter",
            "Pour wet ingredients into dry ingredients and whisk until just combined (lumps are okay)",
            "Heat griddle or non-stick pan over medium heat and brush with oil",
            "Pour 1/4 cup batter for each pancake and cook until bubbles appear on surface",
            "Flip and cook until golden brown on other side",
            "Serve with maple syrup and fresh berries",
        ],
    },
    RecipeTemplate {
        title: "Avocado Toast with Poached Eggs",
        description: "Creamy avocado on toasted sourdough topped with perfectly poached eggs",
        prep_time: "15 min",
        image: "https://images.unsplash.com/photo-1533089860892-a7c6f0a88666?auto=format&fit=crop&w=480&q=80",
        base_ingredients: &[
            "Sourdough bread slices",
            "Ripe avocados",
            "Fresh lemon juice",
            "Salt and pepper",
            "Red pepper flakes",
            "Large eggs",
            "1 tablespoon white vinegar (for poaching)",
            "Fresh herbs for garnish (optional)",
        ],
        per_person_ingredients: &["1 slice sourdough bread", "1/2 avocado", "1 large egg"],
        instructions: &[
            "Toast bread slices until golden and crisp",
            "In a bowl, mash avocados with lemon juice, salt and pepper",
            "Bring a pot of water to a gentle simmer, add vinegar",
            "Crack eggs one at a time into a small cup, then gently slide into water",
            "Poach eggs for 3-4 minutes until whites are set but yolks are still runny",
            "Spread mashed avocado on toast slices",
            "Top each toast with a poached egg, sprinkle with salt, pepper, and red pepper flakes",
        ],
    },
    RecipeTemplate {
        title: "Berry Protein Smoothie Bowl",
        description: "Nutrient-packed smoothie bowl topped with granola, seeds, and fresh fruit",
        prep_time: "10 min",
        image: "https://images.unsplash.com/photo-1494390248081-4e521a5940db?auto=format&fit=crop&w=480&q=80",
        base_ingredients: &[
            "Frozen mixed berries",
            "Banana",
            "Greek yogurt",
            "Protein powder (optional)",
            "Almond milk",
            "Honey or maple syrup",
            "Granola",
            "Chia seeds",
            "Fresh berries for topping",
            "Sliced almonds",
        ],
        per_person_ingredients: &[
            "1/2 cup frozen berries",
            "1/4 banana",
            "1/4 cup Greek yogurt",
            "1/4 cup granola",
        ],
        instructions: &[
            "Blend frozen berries, banana, yogurt, protein powder (if using), almond milk, and sweetener until smooth",
            "Pour into bowls (mixture should be thick enough to eat with a spoon)",
            "Top with granola, fresh berries, chia seeds, and sliced almonds",
            "Drizzle with additional honey if desired",
        ],
    },
    RecipeTemplate {
        title: "Vegetable Frittata",
        description: "Italian-style baked egg dish with seasonal vegetables and cheese",
        prep_time: "25 min",
        image: "https://images.unsplash.com/photo-1525351484163-7529414344d8?auto=format&fit=crop&w=480&q=80",
        base_ingredients: &[
            "Large eggs",
            "Milk",
            "Olive oil",
            "Red bell pepper, diced",
            "Spinach leaves",
            "Onion, diced",
            "Shredded cheese (cheddar, mozzarella, or feta)",
            "Fresh herbs (parsley, chives)",
            "Salt and pepper",
        ],
        per_person_ingredients: &["2 large eggs", "2 tablespoons milk", "1/4 cup shredded cheese"],
        instructions: &[
            "Preheat oven to 350°F (175°C)",
            "Whisk eggs with milk, salt, and pepper in a bowl",
            "Heat olive oil in an oven-safe skillet over medium heat",
            "Sauté onions and peppers until soft, about 5 minutes",
            "Add spinach and cook until wilted",
            "Pour egg mixture over vegetables and cook until edges begin to set",
            "Sprinkle cheese on top",
            "Transfer skillet to oven and bake until fully set, about 15 minutes",
            "Let cool slightly before slicing and serving",
        ],
    },
    RecipeTemplate {
        title: "Overnight Chia Pudding",
        description: "No-cook breakfast pudding with chia seeds, coconut milk, and fresh fruit",
        prep_time: "5 min + overnight",
        image: "https://images.unsplash.com/photo-1504113888839-1c8eb50233d3?auto=format&fit=crop&w=480&q=80",
        base_ingredients: &[
            "Chia seeds",
            "Coconut milk (or almond milk)",
            "Maple syrup or honey",
            "Vanilla extract",
            "Pinch of salt",
            "Fresh fruits (berries, mango, banana)",
            "Shredded coconut for topping",
            "Nuts or granola for topping",
        ],
        per_person_ingredients: &[
            "3 tablespoons chia seeds",
            "3/4 cup coconut milk",
            "1 teaspoon maple syrup",
        ],
        instructions: &[
            "In a bowl or jar, mix chia seeds, milk, sweetener, vanilla, and salt",
            "Stir well, making sure there are no clumps",
            "Cover and refrigerate overnight (at least 4 hours)",
            "Stir again before serving",
            "Top with fresh fruits, coconut, and nuts or granola",
            "Can be stored in the refrigerator for up to 3 days",
        ],
    },
];

/// Titles of every generator template.
pub fn template_titles() -> impl Iterator<Item = &'static str> {
    TEMPLATES.iter().map(|template| template.title)
}

/// Generate a recipe from a random template, scaled for `servings` people.
///
/// The id is the current Unix time in milliseconds.
pub fn generate_recipe(servings: u32, rng: &mut impl Rng) -> Recipe {
    let servings = servings.max(1);
    let template = TEMPLATES.choose(rng).unwrap_or(&TEMPLATES[0]);

    let mut ingredients: Vec<String> = template
        .base_ingredients
        .iter()
        .map(ToString::to_string)
        .collect();
    if servings > 1 {
        ingredients.extend(
            template
                .per_person_ingredients
                .iter()
                .map(|ingredient| scale_ingredient(ingredient, servings)),
        );
    }

    Recipe {
        id: RecipeId::Local(unix_timestamp_millis()),
        title: template.title.to_string(),
        description: template.description.to_string(),
        prep_time: Some(template.prep_time.to_string()),
        image: Some(template.image.to_string()),
        image_path: None,
        ingredients: Some(ingredients),
        instructions: Some(
            template
                .instructions
                .iter()
                .map(ToString::to_string)
                .collect(),
        ),
        servings: Some(servings),
    }
}

fn amount_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)(?:/(\d+))?\s+(.+)$").expect("Invalid regex"))
}

/// Multiply the leading amount of a per-person ingredient by `servings`.
///
/// `"1/4 cup granola"` for 3 people becomes `"3/4 cup granola"`. Ingredients
/// without a leading amount are prefixed with the servings count.
pub fn scale_ingredient(ingredient: &str, servings: u32) -> String {
    let Some(captures) = amount_pattern().captures(ingredient.trim()) else {
        return format!("{servings} {ingredient}");
    };

    let numerator: u64 = captures[1].parse().unwrap_or(1);
    let denominator: u64 = captures
        .get(2)
        .and_then(|value| value.as_str().parse().ok())
        .filter(|value| *value > 0)
        .unwrap_or(1);
    let rest = &captures[3];

    format!(
        "{} {rest}",
        format_quantity(numerator * u64::from(servings), denominator)
    )
}

fn format_quantity(numerator: u64, denominator: u64) -> String {
    let divisor = gcd(numerator, denominator).max(1);
    let (numerator, denominator) = (numerator / divisor, denominator / divisor);
    let whole = numerator / denominator;
    let remainder = numerator % denominator;

    match (whole, remainder) {
        (whole, 0) => whole.to_string(),
        (0, remainder) => format!("{remainder}/{denominator}"),
        (whole, remainder) => format!("{whole} {remainder}/{denominator}"),
    }
}

const fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let next = a % b;
        a = b;
        b = next;
    }
    a
}

/// Starter favorites written to the local store on first run.
pub fn sample_recipes() -> Vec<Recipe> {
    #[allow(clippy::too_many_arguments)]
    fn sample(
        id: i64,
        title: &str,
        description: &str,
        prep_time: &str,
        servings: u32,
        image: &str,
        ingredients: &[&str],
        instructions: &[&str],
    ) -> Recipe {
        Recipe {
            id: RecipeId::Local(id),
            title: title.to_string(),
            description: description.to_string(),
            prep_time: Some(prep_time.to_string()),
            image: Some(image.to_string()),
            image_path: None,
            ingredients: Some(ingredients.iter().map(ToString::to_string).collect()),
            instructions: Some(instructions.iter().map(ToString::to_string).collect()),
            servings: Some(servings),
        }
    }

    vec![
        sample(
            1,
            "Classic Pancakes",
            "Fluffy pancakes with maple syrup and fresh berries",
            "15 min",
            2,
            "https://images.unsplash.com/photo-1567620905732-2d1ec7ab7445?auto=format&fit=crop&w=480&q=80",
            &[
                "1 cup all-purpose flour",
                "2 tbsp sugar",
                "2 tsp baking powder",
                "1/2 tsp salt",
                "1 cup milk",
                "1 large egg",
                "2 tbsp melted butter",
            ],
            &[
                "Mix dry ingredients",
                "Whisk wet ingredients separately",
                "Combine mixtures until just blended",
                "Cook on hot griddle until bubbles form",
                "Flip and cook other side until golden",
            ],
        ),
        sample(
            2,
            "Avocado Toast",
            "Healthy breakfast with sourdough bread and smashed avocado",
            "10 min",
            1,
            "https://images.unsplash.com/photo-1541519227354-08fa5d50c44d?auto=format&fit=crop&w=480&q=80",
            &[
                "2 slices sourdough bread",
                "1 ripe avocado",
                "1/2 lemon",
                "Salt and pepper to taste",
                "Red pepper flakes",
                "Poached egg (optional)",
            ],
            &[
                "Toast bread until golden",
                "Mash avocado with lemon juice",
                "Spread on toast",
                "Season with salt, pepper and red pepper flakes",
            ],
        ),
        sample(
            3,
            "Berry Smoothie Bowl",
            "Refreshing fruit bowl with granola and fresh berries",
            "8 min",
            1,
            "https://images.unsplash.com/photo-1511690743698-d9d85f2fbf38?auto=format&fit=crop&w=480&q=80",
            &[
                "1 cup frozen mixed berries",
                "1 ripe banana",
                "1/2 cup Greek yogurt",
                "1/4 cup almond milk",
                "1 tbsp honey",
                "1/4 cup granola",
                "Fresh berries for topping",
            ],
            &[
                "Blend berries, banana, yogurt, milk and honey",
                "Pour into bowl",
                "Top with granola and fresh fruit",
            ],
        ),
        sample(
            4,
            "Eggs Benedict",
            "Classic breakfast with hollandaise sauce and Canadian bacon",
            "25 min",
            2,
            "https://images.unsplash.com/photo-1608039829572-78524f79c4c7?auto=format&fit=crop&w=480&q=80",
            &[
                "4 English muffins",
                "4 large eggs",
                "4 slices Canadian bacon",
                "2 egg yolks",
                "1 tbsp lemon juice",
                "1/2 cup melted butter",
                "Salt and cayenne pepper",
            ],
            &[
                "Make hollandaise: whisk yolks with lemon juice over low heat",
                "Slowly add melted butter until thick",
                "Poach eggs for 3 minutes",
                "Toast muffins, heat bacon",
                "Layer muffins with bacon, poached eggs, and sauce",
            ],
        ),
        sample(
            5,
            "Overnight Oats",
            "Easy make-ahead breakfast with chia seeds and fruit",
            "5 min + overnight",
            1,
            "https://images.unsplash.com/photo-1517673132405-a56a62b18caf?auto=format&fit=crop&w=480&q=80",
            &[
                "1/2 cup rolled oats",
                "1/2 cup milk of choice",
                "1 tbsp chia seeds",
                "1 tbsp honey or maple syrup",
                "1/4 tsp vanilla extract",
                "Pinch of salt",
                "Sliced fruits for topping",
            ],
            &[
                "Mix all ingredients except toppings",
                "Place in jar with lid",
                "Refrigerate overnight",
                "Add fruits before serving",
            ],
        ),
    ]
}
