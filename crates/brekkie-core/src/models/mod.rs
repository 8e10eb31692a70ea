//! Data models for brekkie

mod meal;
mod profile;
mod recipe;

pub use meal::{random_meal_time, MealId, MealStatus, PlannedMeal, PlannedMeals};
pub use profile::{UserProfile, DEFAULT_GREETING_NAME};
pub use recipe::{Recipe, RecipeId};
