use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] brekkie_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("'{0}' is neither a meal position nor a meal id")]
    InvalidMealRef(String),
    #[error("Recipe not found for id/title: {0}")]
    RecipeNotFound(String),
    #[error("{0}")]
    AmbiguousRecipe(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Not signed in. Run `brekkie auth login` first.")]
    NotSignedIn,
    #[error(
        "Supabase is not configured. Run `brekkie config init` or set SUPABASE_URL and SUPABASE_ANON_KEY."
    )]
    RemoteNotConfigured,
}
