//! Row layouts of the remote `recipes` and `planned_meals` tables.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::GatewayResult;
use crate::models::{MealId, MealStatus, PlannedMeal, Recipe, RecipeId};

/// A `recipes` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub prep_time: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub ingredients: Option<Vec<String>>,
    #[serde(default)]
    pub instructions: Option<Vec<String>>,
    #[serde(default)]
    pub servings: Option<u32>,
}

impl RecipeRow {
    /// Row for `recipe` owned by `user_id`, stored under `id`.
    pub fn from_recipe(id: impl Into<String>, user_id: impl Into<String>, recipe: &Recipe) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            title: recipe.title.clone(),
            description: Some(recipe.description.clone()),
            prep_time: recipe.prep_time.clone(),
            image_url: recipe.image.clone(),
            image_path: recipe.image_path.clone(),
            ingredients: recipe.ingredients.clone(),
            instructions: recipe.instructions.clone(),
            servings: recipe.servings,
        }
    }

    #[must_use]
    pub fn into_recipe(self) -> Recipe {
        Recipe {
            id: RecipeId::Remote(self.id),
            title: self.title,
            description: self.description.unwrap_or_default(),
            prep_time: self.prep_time,
            image: self.image_url,
            image_path: self.image_path,
            ingredients: self.ingredients,
            instructions: self.instructions,
            servings: self.servings,
        }
    }
}

/// A `planned_meals` row, optionally with its recipe embedded via `recipes(*)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedMealRow {
    pub id: String,
    pub user_id: String,
    pub recipe_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub status: MealStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipes: Option<RecipeRow>,
}

impl PlannedMealRow {
    pub fn from_meal(user_id: impl Into<String>, recipe_id: impl Into<String>, date: NaiveDate, meal: &PlannedMeal) -> Self {
        Self {
            id: meal.id.to_string(),
            user_id: user_id.into(),
            recipe_id: recipe_id.into(),
            date,
            time: Some(meal.time.clone()),
            status: meal.status,
            recipes: None,
        }
    }

    /// Convert a joined row into a planned meal.
    ///
    /// Returns `None` when the embedded recipe is missing (deleted recipe) or
    /// the row id is not a UUID.
    #[must_use]
    pub fn into_planned_meal(self) -> Option<(NaiveDate, PlannedMeal)> {
        let Ok(id) = self.id.parse::<MealId>() else {
            tracing::warn!("Skipping planned meal with non-UUID id {}", self.id);
            return None;
        };
        let recipe = self.recipes?.into_recipe();
        Some((
            self.date,
            PlannedMeal {
                id,
                recipe,
                time: self.time.unwrap_or_default(),
                status: self.status,
            },
        ))
    }
}

pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> GatewayResult<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(Into::into))
        .collect()
}

pub fn encode_row<T: Serialize>(row: &T) -> GatewayResult<Value> {
    Ok(serde_json::to_value(row)?)
}
