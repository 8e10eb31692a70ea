//! Recipe model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A recipe identifier.
///
/// Recipes created on this device carry a numeric id (Unix millis or a seed
/// index). Rows stored in Supabase carry a UUID string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecipeId {
    Local(i64),
    Remote(String),
}

impl RecipeId {
    /// Remote UUID when this recipe already lives in the remote `recipes` table.
    #[must_use]
    pub fn remote(&self) -> Option<&str> {
        match self {
            Self::Local(_) => None,
            Self::Remote(id) => Some(id.as_str()),
        }
    }

    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(id) => write!(f, "{id}"),
            Self::Remote(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for RecipeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("Recipe id cannot be empty".to_string()));
        }
        Ok(trimmed
            .parse::<i64>()
            .map_or_else(|_| Self::Remote(trimmed.to_string()), Self::Local))
    }
}

impl From<i64> for RecipeId {
    fn from(value: i64) -> Self {
        Self::Local(value)
    }
}

/// A breakfast recipe.
///
/// Serialized in the layout the local store has always used (camelCase,
/// `image` for the URL), so previously written data keeps loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: RecipeId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep_time: Option<String>,
    /// Public image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Object path inside the recipe image bucket.
    #[serde(default, rename = "image_path", skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<u32>,
}

impl Recipe {
    /// Create a bare recipe with only a title and description.
    #[must_use]
    pub fn new(id: RecipeId, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            prep_time: None,
            image: None,
            image_path: None,
            ingredients: None,
            instructions: None,
            servings: None,
        }
    }

    /// Case-insensitive title comparison used to match local and remote copies.
    #[must_use]
    pub fn same_title(&self, title: &str) -> bool {
        self.title.trim().eq_ignore_ascii_case(title.trim())
    }
}
