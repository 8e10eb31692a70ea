//! Remote data gateway: Supabase tables and storage buckets.
//!
//! Every call carries the signed-in user's access token. Failures come back
//! as [`GatewayError`] values so callers can notify and keep their state.

mod probe;
mod rows;
mod supabase;

#[cfg(test)]
pub(crate) mod memory;

use serde_json::Value;
use thiserror::Error;

pub use probe::{probe_tables, ProbeReport};
pub use rows::{decode_rows, encode_row, PlannedMealRow, RecipeRow};
pub use supabase::SupabaseGateway;

pub const RECIPES_TABLE: &str = "recipes";
pub const PLANNED_MEALS_TABLE: &str = "planned_meals";
pub const PROFILES_TABLE: &str = "profiles";

/// Object path prefix of the shared stock photos, which are never deleted.
pub const TEMPLATE_IMAGE_PREFIX: &str = "template/";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{message} ({status})")]
    Api { status: u16, message: String },
}

impl GatewayError {
    /// HTTP status of an API error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// An equality filter (`column = value`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl ToString) -> Self {
        Self {
            column: column.into(),
            value: value.to_string(),
        }
    }
}

/// Column selection plus filters for a table read.
///
/// `columns` follows the PostgREST syntax, so `"*, recipes(*)"` embeds the
/// referenced recipe row into each planned meal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub columns: String,
    pub filters: Vec<Filter>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn select(columns: impl Into<String>) -> Self {
        Self {
            columns: columns.into(),
            filters: Vec::new(),
            limit: None,
        }
    }

    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Table and object storage operations consumed by the planner, recipe
/// manager, migration and profile service.
#[allow(async_fn_in_trait)]
pub trait RemoteGateway: Send + Sync {
    async fn select(&self, access_token: &str, table: &str, query: &Query)
        -> GatewayResult<Vec<Value>>;

    /// Insert rows and return them as stored.
    async fn insert(&self, access_token: &str, table: &str, rows: &[Value])
        -> GatewayResult<Vec<Value>>;

    /// Apply `patch` to every row matching `filters` and return the updated rows.
    async fn update(
        &self,
        access_token: &str,
        table: &str,
        patch: &Value,
        filters: &[Filter],
    ) -> GatewayResult<Vec<Value>>;

    async fn delete(&self, access_token: &str, table: &str, filters: &[Filter])
        -> GatewayResult<()>;

    async fn upload_object(
        &self,
        access_token: &str,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> GatewayResult<()>;

    async fn remove_objects(&self, access_token: &str, bucket: &str, paths: &[String])
        -> GatewayResult<()>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}
