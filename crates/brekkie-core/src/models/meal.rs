//! Planned meal model

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::recipe::Recipe;

/// Planned meals grouped by calendar date. A date never maps to an empty list.
pub type PlannedMeals = BTreeMap<NaiveDate, Vec<PlannedMeal>>;

/// A stable identifier for one planned meal, using UUID v7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MealId(Uuid);

impl MealId {
    /// Create a new unique meal ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for MealId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MealId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Completion status of a planned meal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MealStatus {
    #[default]
    Planned,
    Completed,
}

impl MealStatus {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Planned => Self::Completed,
            Self::Completed => Self::Planned,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for MealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recipe copy placed on a calendar date.
///
/// Locally the recipe fields are flattened next to `time`, `status` and
/// `mealId`. Entries written before meals had ids get a fresh one on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedMeal {
    #[serde(rename = "mealId", default)]
    pub id: MealId,
    #[serde(flatten)]
    pub recipe: Recipe,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub status: MealStatus,
}

impl PlannedMeal {
    /// Plan a recipe with a pseudo-random breakfast time.
    #[must_use]
    pub fn plan(recipe: Recipe, rng: &mut impl Rng) -> Self {
        Self {
            id: MealId::new(),
            recipe,
            time: random_meal_time(rng),
            status: MealStatus::Planned,
        }
    }
}

/// Pick a breakfast time between 7:00 and 8:45 AM.
///
/// Minutes favour the full hour: `00` half of the time, `15` a quarter,
/// `30` and `45` an eighth each.
pub fn random_meal_time(rng: &mut impl Rng) -> String {
    let hour = rng.gen_range(7..=8);
    let minutes = if rng.gen_bool(0.5) {
        "00"
    } else if rng.gen_bool(0.5) {
        "15"
    } else if rng.gen_bool(0.5) {
        "30"
    } else {
        "45"
    };
    format!("{hour}:{minutes} AM")
}
