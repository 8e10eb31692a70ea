use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use brekkie_core::auth::AuthSession;
use brekkie_core::calendar::{parse_date_key, short_label};
use brekkie_core::config::ClientConfig;
use brekkie_core::generator::sample_recipes;
use brekkie_core::local::LocalStore;
use brekkie_core::notify::{Notice, NoticeLevel, RecordingNotifier, SharedNotifier};
use brekkie_core::planner::MealPlanner;
use brekkie_core::profile::ProfileService;
use brekkie_core::recipes::RecipeManager;
use brekkie_core::remote::SupabaseGateway;
use brekkie_core::session::SessionManager;
use brekkie_core::{MealId, PlannedMeal, Recipe};
use chrono::NaiveDate;
use serde::Serialize;

use crate::auth::KeyringSessionStore;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub const DB_PATH_ENV: &str = "BREKKIE_DB_PATH";

pub type CliSessionManager = SessionManager<KeyringSessionStore, SupabaseGateway>;

/// Everything a command needs: resolved profile, local store, session and
/// the notices raised while it runs.
pub struct AppContext {
    pub profile_name: String,
    pub config: ClientConfig,
    pub local: LocalStore,
    pub notices: RecordingNotifier,
    pub sessions: CliSessionManager,
}

impl AppContext {
    pub async fn open(db_path: &Path, profile: Option<&str>) -> Result<Self, CliError> {
        let profiles = CliProfilesConfig::load().map_err(CliError::Config)?;
        let profile_name = profiles.resolve_profile_name(profile);
        let fallback = profiles
            .profile(&profile_name)
            .map(|profile| profile.client_config())
            .unwrap_or_default();
        let config = ClientConfig::from_env()?.or(&fallback);
        config.validate()?;

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let local = LocalStore::open_path(db_path.to_path_buf()).await?;
        Ok(Self::with_parts(profile_name, config, local))
    }

    pub fn with_parts(profile_name: String, config: ClientConfig, local: LocalStore) -> Self {
        let notices = RecordingNotifier::new();
        let auth = config
            .auth_client(KeyringSessionStore::new(&profile_name))
            .ok();
        let sessions = SessionManager::new(
            auth,
            config.gateway().ok(),
            local.clone(),
            Arc::new(notices.clone()),
        );
        Self {
            profile_name,
            config,
            local,
            notices,
            sessions,
        }
    }

    pub fn notifier(&self) -> SharedNotifier {
        Arc::new(self.notices.clone())
    }

    /// Restore the stored session. A failed restore falls back to local mode.
    pub async fn restore_session(&self) -> Option<AuthSession> {
        match self.sessions.initialize().await {
            Ok(session) => session,
            Err(error) => {
                tracing::warn!("Continuing without a session: {}", error);
                None
            }
        }
    }

    pub async fn require_session(&self) -> Result<AuthSession, CliError> {
        if !self.config.is_remote_enabled() {
            return Err(CliError::RemoteNotConfigured);
        }
        self.restore_session().await.ok_or(CliError::NotSignedIn)
    }

    fn gateway(&self) -> Result<SupabaseGateway, CliError> {
        self.config
            .gateway()
            .map_err(|_| CliError::RemoteNotConfigured)
    }

    pub fn planner(&self) -> MealPlanner<SupabaseGateway> {
        MealPlanner::new(
            self.local.clone(),
            self.config.gateway().ok(),
            self.config.recipe_bucket.clone(),
            self.notifier(),
        )
    }

    pub fn recipe_manager(&self) -> Result<RecipeManager<SupabaseGateway>, CliError> {
        Ok(RecipeManager::new(
            self.gateway()?,
            self.config.recipe_bucket.clone(),
            self.notifier(),
        ))
    }

    pub fn profile_service(&self) -> Result<ProfileService<SupabaseGateway>, CliError> {
        Ok(ProfileService::new(
            self.gateway()?,
            self.config.avatar_bucket.clone(),
            self.notifier(),
        ))
    }

    /// Print and clear the notices raised so far.
    pub fn flush_notices(&self) {
        for notice in self.notices.drain() {
            eprintln!("{}", format_notice(&notice));
        }
    }
}

pub fn format_notice(notice: &Notice) -> String {
    let marker = match notice.level {
        NoticeLevel::Info => "info",
        NoticeLevel::Warning => "warning",
        NoticeLevel::Error => "error",
    };
    if notice.description.is_empty() {
        format!("[{marker}] {}", notice.title)
    } else {
        format!("[{marker}] {}: {}", notice.title, notice.description)
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("brekkie")
        .join("brekkie.db")
}

pub fn parse_date_arg(value: &str) -> Result<NaiveDate, CliError> {
    parse_date_key(value).map_err(|_| CliError::InvalidDate(value.trim().to_string()))
}

pub fn resolve_date_arg(value: Option<&str>) -> Result<NaiveDate, CliError> {
    value.map_or_else(|| Ok(chrono::Local::now().date_naive()), parse_date_arg)
}

/// A meal addressed either by its position on a date or by its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MealRef {
    Index(usize),
    Id(MealId),
}

pub fn parse_meal_ref(value: &str) -> Result<MealRef, CliError> {
    let value = value.trim();
    if let Ok(index) = value.parse::<usize>() {
        return Ok(MealRef::Index(index));
    }
    value
        .parse::<MealId>()
        .map(MealRef::Id)
        .map_err(|_| CliError::InvalidMealRef(value.to_string()))
}

/// Find a recipe by exact id, then by case-insensitive title, then by title prefix.
pub fn find_recipe<'a>(
    query: &str,
    candidates: impl IntoIterator<Item = &'a Recipe>,
) -> Result<Recipe, CliError> {
    let query = query.trim();
    let candidates = candidates.into_iter().collect::<Vec<_>>();

    if let Some(recipe) = candidates
        .iter()
        .find(|recipe| recipe.id.to_string() == query)
    {
        return Ok((*recipe).clone());
    }
    if let Some(recipe) = candidates.iter().find(|recipe| recipe.same_title(query)) {
        return Ok((*recipe).clone());
    }

    let needle = query.to_lowercase();
    let mut seen = HashSet::new();
    let matches = candidates
        .iter()
        .filter(|recipe| recipe.title.to_lowercase().starts_with(&needle))
        .filter(|recipe| seen.insert(recipe.title.to_lowercase()))
        .collect::<Vec<_>>();

    match matches.as_slice() {
        [] => Err(CliError::RecipeNotFound(query.to_string())),
        [recipe] => Ok((**recipe).clone()),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|recipe| recipe.title.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousRecipe(format!(
                "Recipe '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// Recipes a command may refer to: favorites, the user's saved recipes and
/// the built-in samples.
pub async fn recipe_candidates(
    ctx: &AppContext,
    session: Option<&AuthSession>,
    favorites: &[Recipe],
) -> Vec<Recipe> {
    let mut candidates = favorites.to_vec();
    if session.is_some() {
        if let Ok(mut manager) = ctx.recipe_manager() {
            match manager.refresh(session).await {
                Ok(recipes) => candidates.extend_from_slice(recipes),
                Err(error) => tracing::warn!("Could not load saved recipes: {}", error),
            }
        }
    }
    candidates.extend(sample_recipes());
    candidates
}

#[derive(Debug, Serialize)]
pub struct PlanDay {
    pub date: NaiveDate,
    pub meals: Vec<PlannedMeal>,
}

pub fn format_plan_lines(days: &[PlanDay]) -> Vec<String> {
    let mut lines = Vec::new();
    for day in days {
        lines.push(format!(
            "{}  {}",
            day.date.format("%a %Y-%m-%d"),
            short_label(day.date)
        ));
        if day.meals.is_empty() {
            lines.push("  (nothing planned)".to_string());
        }
        for (index, meal) in day.meals.iter().enumerate() {
            lines.push(format!(
                "  [{index}] {:<8} {:<32} {:<9} {}",
                meal.time,
                meal.recipe.title,
                meal.status.to_string(),
                meal.id
            ));
        }
    }
    lines
}

pub fn format_recipe_lines(recipes: &[Recipe]) -> Vec<String> {
    recipes
        .iter()
        .map(|recipe| {
            let id = recipe.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let prep = recipe.prep_time.as_deref().unwrap_or("-");
            format!("{short_id:<13}  {:<32}  {prep}", recipe.title)
        })
        .collect()
}

pub fn format_recipe_detail(recipe: &Recipe) -> Vec<String> {
    let mut lines = vec![format!("{} ({})", recipe.title, recipe.id)];
    if !recipe.description.is_empty() {
        lines.push(recipe.description.clone());
    }
    if let Some(prep) = &recipe.prep_time {
        lines.push(format!("Prep: {prep}"));
    }
    if let Some(servings) = recipe.servings {
        lines.push(format!("Servings: {servings}"));
    }
    if let Some(ingredients) = &recipe.ingredients {
        lines.push("Ingredients:".to_string());
        lines.extend(ingredients.iter().map(|item| format!("  - {item}")));
    }
    if let Some(instructions) = &recipe.instructions {
        lines.push("Instructions:".to_string());
        lines.extend(
            instructions
                .iter()
                .enumerate()
                .map(|(step, item)| format!("  {}. {item}", step + 1)),
        );
    }
    lines
}
