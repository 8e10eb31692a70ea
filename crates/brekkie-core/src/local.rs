//! Offline key-value store used when no session exists.
//!
//! Wraps the libSQL database behind a cheap-to-clone handle and stores
//! planner data as JSON documents under fixed keys.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::db::{Database, KeyValueRepository, LibSqlKeyValueRepository};
use crate::models::{PlannedMeals, Recipe};
use crate::Result;

/// Key holding the JSON array of liked recipes.
pub const LIKED_RECIPES_KEY: &str = "likedRecipes";
/// Key holding the JSON object of planned meals by date.
pub const PLANNED_MEALS_KEY: &str = "plannedMeals";
const MIGRATED_KEY_PREFIX: &str = "migrated_";

/// Key of the per-user "local data already migrated" flag.
pub fn migration_flag_key(user_id: &str) -> String {
    format!("{MIGRATED_KEY_PREFIX}{user_id}")
}

/// Thread-safe handle to the offline store.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl LocalStore {
    /// Open the store at the given filesystem path.
    ///
    /// A file that is not a database is moved aside and a fresh one created.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path).await {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local store at {} is unreadable: {}. Starting with a fresh file.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_files(&db_path)?;
                Database::open(&db_path).await?
            }
            Err(error) => return Err(error),
        };

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Filesystem path of the store, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn is_corrupted_db_error(error: &crate::Error) -> bool {
        error
            .to_string()
            .to_ascii_lowercase()
            .contains("file is not a database")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            let timestamp = chrono::Utc::now().timestamp_millis();
            let base_name = db_path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("brekkie.db");
            let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));

            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted local store from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        let Some(parent) = db_path.parent() else {
            return Ok(());
        };
        let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
            return Ok(());
        };
        let sidecar_prefix = format!("{base_name}-");

        for entry in std::fs::read_dir(parent)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with(&sidecar_prefix) {
                let path = entry.path();
                std::fs::remove_file(&path)?;
                tracing::warn!("Removed stale local store file {}", path.display());
            }
        }

        Ok(())
    }

    /// Read and decode the JSON document stored under `key`.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw = {
            let db = self.db.lock().await;
            let repo = LibSqlKeyValueRepository::new(db.connection());
            repo.get(key).await?
        };
        raw.map(|raw| serde_json::from_str(&raw).map_err(Into::into))
            .transpose()
    }

    /// Encode `value` as JSON and store it under `key`.
    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        let db = self.db.lock().await;
        let repo = LibSqlKeyValueRepository::new(db.connection());
        repo.set(key, &raw).await
    }

    /// Delete `key`.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlKeyValueRepository::new(db.connection());
        repo.remove(key).await
    }

    /// Liked recipes, `None` when the key has never been written.
    pub async fn liked_recipes(&self) -> Result<Option<Vec<Recipe>>> {
        self.get_json(LIKED_RECIPES_KEY).await
    }

    pub async fn save_liked_recipes(&self, recipes: &[Recipe]) -> Result<()> {
        self.set_json(LIKED_RECIPES_KEY, recipes).await
    }

    /// Planned meals by date; a missing key reads as an empty plan.
    pub async fn planned_meals(&self) -> Result<PlannedMeals> {
        Ok(self
            .get_json::<PlannedMeals>(PLANNED_MEALS_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn save_planned_meals(&self, meals: &PlannedMeals) -> Result<()> {
        self.set_json(PLANNED_MEALS_KEY, meals).await
    }

    /// Whether local data was already migrated for `user_id`.
    pub async fn is_migrated(&self, user_id: &str) -> Result<bool> {
        Ok(self
            .get_json::<bool>(&migration_flag_key(user_id))
            .await?
            .unwrap_or(false))
    }

    pub async fn mark_migrated(&self, user_id: &str) -> Result<()> {
        self.set_json(&migration_flag_key(user_id), &true).await
    }

    /// User ids whose local data has been migrated.
    pub async fn migrated_users(&self) -> Result<Vec<String>> {
        let db = self.db.lock().await;
        let repo = LibSqlKeyValueRepository::new(db.connection());
        let keys = repo.keys_with_prefix(MIGRATED_KEY_PREFIX).await?;
        Ok(keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(MIGRATED_KEY_PREFIX).map(ToString::to_string))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::models::{PlannedMeal, RecipeId};

    #[tokio::test(flavor = "multi_thread")]
    async fn planned_meals_default_to_empty() {
        let store = LocalStore::open_in_memory().await.unwrap();
        assert!(store.planned_meals().await.unwrap().is_empty());
        assert!(store.liked_recipes().await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn planned_meals_persist_between_reads() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let mut meals = PlannedMeals::new();
        meals.insert(
            date,
            vec![PlannedMeal::plan(
                Recipe::new(RecipeId::Local(1), "Classic Pancakes", "Fluffy"),
                &mut rng,
            )],
        );

        store.save_planned_meals(&meals).await.unwrap();
        assert_eq!(store.planned_meals().await.unwrap(), meals);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn migration_flag_is_per_user() {
        let store = LocalStore::open_in_memory().await.unwrap();
        store.mark_migrated("user-a").await.unwrap();

        assert!(store.is_migrated("user-a").await.unwrap());
        assert!(!store.is_migrated("user-b").await.unwrap());
        assert_eq!(store.migrated_users().await.unwrap(), vec!["user-a"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_path_recovers_from_corrupted_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("brekkie.db");
        std::fs::write(&db_path, b"this is not a sqlite database file").unwrap();
        std::fs::write(tmp.path().join("brekkie.db-wal"), b"wal").unwrap();

        let store = LocalStore::open_path(&db_path).await.unwrap();
        store.save_liked_recipes(&[]).await.unwrap();

        let backups = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("brekkie.db.corrupt-")
            })
            .count();
        assert_eq!(backups, 1);
    }
}
