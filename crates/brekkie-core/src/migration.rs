//! One-time copy of offline planner data into the signed-in user's tables.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::auth::AuthSession;
use crate::local::LocalStore;
use crate::models::Recipe;
use crate::notify::{Notice, SharedNotifier};
use crate::recipes::fetch_user_recipes;
use crate::remote::{
    encode_row, GatewayResult, PlannedMealRow, Query, RecipeRow, RemoteGateway,
    PLANNED_MEALS_TABLE, RECIPES_TABLE,
};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The flag for this user was already set; nothing was read or written.
    Skipped,
    Migrated(MigrationReport),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub recipes_inserted: usize,
    pub recipes_matched: usize,
    pub meals_inserted: usize,
    /// Meals whose row already existed remotely from an earlier attempt.
    pub meals_existing: usize,
}

/// Copy local favorites and planned meals to the remote tables once per user.
///
/// Recipes already present remotely (same title) are not inserted again.
/// A planned meal whose recipe is not remote yet gets a recipe row built
/// from its own copy of the recipe. Meal rows keep their local ids, so rows
/// left by an earlier attempt are recognized and not written twice. The
/// migrated flag is only set when every write succeeded, so a failed run is
/// retried on the next sign-in; rows written before the failure stay in place.
pub async fn migrate_local_data<G: RemoteGateway>(
    local: &LocalStore,
    gateway: &G,
    session: &AuthSession,
    notifier: &SharedNotifier,
) -> Result<MigrationOutcome> {
    let user_id = session.user_id();
    if local.is_migrated(user_id).await? {
        tracing::debug!("Local data already migrated for {}", user_id);
        return Ok(MigrationOutcome::Skipped);
    }

    let copied = match copy_local_data(local, gateway, session).await {
        Ok(report) => local.mark_migrated(user_id).await.map(|()| report),
        Err(error) => Err(error),
    };

    match copied {
        Ok(report) => {
            tracing::info!(
                "Migrated local data for {}: {} recipe(s), {} meal(s), {} meal(s) already present",
                user_id,
                report.recipes_inserted,
                report.meals_inserted,
                report.meals_existing
            );
            Ok(MigrationOutcome::Migrated(report))
        }
        Err(error) => {
            tracing::error!("Local data migration failed for {}: {}", user_id, error);
            notifier.notify(Notice::error(
                "Migration Failed",
                format!("Could not copy your local meal plan to your account: {error}"),
            ));
            Err(error)
        }
    }
}

fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

async fn copy_local_data<G: RemoteGateway>(
    local: &LocalStore,
    gateway: &G,
    session: &AuthSession,
) -> Result<MigrationReport> {
    let mut report = MigrationReport::default();
    let liked = local.liked_recipes().await?.unwrap_or_default();
    let planned = local.planned_meals().await?;

    let mut title_to_id: HashMap<String, String> = fetch_user_recipes(gateway, session)
        .await?
        .into_iter()
        .map(|row| (title_key(&row.title), row.id))
        .collect();

    let mut new_rows = Vec::new();
    let mut stage = |recipe: &Recipe, new_rows: &mut Vec<RecipeRow>| -> bool {
        let key = title_key(&recipe.title);
        if title_to_id.contains_key(&key) {
            return false;
        }
        let row = RecipeRow::from_recipe(Uuid::now_v7().to_string(), session.user_id(), recipe);
        title_to_id.insert(key, row.id.clone());
        new_rows.push(row);
        true
    };

    for recipe in &liked {
        if !stage(recipe, &mut new_rows) {
            report.recipes_matched += 1;
        }
    }
    for meal in planned.values().flatten() {
        stage(&meal.recipe, &mut new_rows);
    }

    if !new_rows.is_empty() {
        let values = new_rows
            .iter()
            .map(encode_row)
            .collect::<GatewayResult<Vec<_>>>()?;
        gateway
            .insert(&session.access_token, RECIPES_TABLE, &values)
            .await?;
        report.recipes_inserted = new_rows.len();
    }

    let existing_meals: HashSet<String> = gateway
        .select(
            &session.access_token,
            PLANNED_MEALS_TABLE,
            &Query::select("id").eq("user_id", session.user_id()),
        )
        .await?
        .iter()
        .filter_map(|row| row.get("id").and_then(|id| id.as_str()).map(str::to_string))
        .collect();

    let mut meal_rows = Vec::new();
    for (date, meals) in &planned {
        for meal in meals {
            if existing_meals.contains(&meal.id.to_string()) {
                report.meals_existing += 1;
                continue;
            }
            let Some(recipe_id) = title_to_id.get(&title_key(&meal.recipe.title)) else {
                continue;
            };
            meal_rows.push(encode_row(&PlannedMealRow::from_meal(
                session.user_id(),
                recipe_id,
                *date,
                meal,
            ))?);
        }
    }

    if !meal_rows.is_empty() {
        gateway
            .insert(&session.access_token, PLANNED_MEALS_TABLE, &meal_rows)
            .await?;
        report.meals_inserted = meal_rows.len();
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::generator::sample_recipes;
    use crate::models::{PlannedMeal, PlannedMeals, Recipe, RecipeId};
    use crate::notify::{NoticeLevel, RecordingNotifier};
    use crate::recipes::tests::test_session;
    use crate::remote::memory::InMemoryGateway;

    async fn seeded_local() -> LocalStore {
        let local = LocalStore::open_in_memory().await.unwrap();
        local.save_liked_recipes(&sample_recipes()).await.unwrap();

        let mut rng = StdRng::seed_from_u64(9);
        let mut planned = PlannedMeals::new();
        planned.insert(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            vec![
                PlannedMeal::plan(sample_recipes()[0].clone(), &mut rng),
                PlannedMeal::plan(
                    Recipe::new(RecipeId::Local(77), "Mystery Hash", "Not a favorite"),
                    &mut rng,
                ),
            ],
        );
        local.save_planned_meals(&planned).await.unwrap();
        local
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn migrates_recipes_and_meals_once() {
        let local = seeded_local().await;
        let gateway = InMemoryGateway::new();
        gateway.seed(
            RECIPES_TABLE,
            vec![serde_json::json!({
                "id": "existing",
                "user_id": "u1",
                "title": "classic pancakes"
            })],
        );
        let notifier: SharedNotifier = Arc::new(RecordingNotifier::new());
        let session = test_session("u1");

        let outcome = migrate_local_data(&local, &gateway, &session, &notifier)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            MigrationOutcome::Migrated(MigrationReport {
                recipes_inserted: 5,
                recipes_matched: 1,
                meals_inserted: 2,
                meals_existing: 0,
            })
        );
        let recipes = gateway.rows(RECIPES_TABLE);
        assert_eq!(recipes.len(), 6);
        let hash_id = recipes
            .iter()
            .find(|row| row["title"] == "Mystery Hash")
            .map(|row| row["id"].clone())
            .unwrap();
        let meals = gateway.rows(PLANNED_MEALS_TABLE);
        assert_eq!(meals.len(), 2);
        assert_eq!(meals[0]["recipe_id"], "existing");
        assert_eq!(meals[1]["recipe_id"], hash_id);
        assert_eq!(meals[1]["date"], "2024-06-01");
        assert!(local.is_migrated("u1").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn planned_meal_without_favorite_still_arrives() {
        let local = LocalStore::open_in_memory().await.unwrap();
        local.save_liked_recipes(&[]).await.unwrap();
        let mut planned = PlannedMeals::new();
        planned.insert(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            vec![PlannedMeal::plan(
                sample_recipes()[0].clone(),
                &mut StdRng::seed_from_u64(3),
            )],
        );
        local.save_planned_meals(&planned).await.unwrap();
        let gateway = InMemoryGateway::new();
        let notifier: SharedNotifier = Arc::new(RecordingNotifier::new());
        let session = test_session("u1");

        let outcome = migrate_local_data(&local, &gateway, &session, &notifier)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            MigrationOutcome::Migrated(MigrationReport { recipes_inserted: 1, meals_inserted: 1, .. })
        ));
        let recipes = gateway.rows(RECIPES_TABLE);
        let meals = gateway.rows(PLANNED_MEALS_TABLE);
        assert_eq!(meals.len(), 1);
        assert_eq!(meals[0]["recipe_id"], recipes[0]["id"]);
        assert_eq!(recipes[0]["title"], "Classic Pancakes");

        let again = migrate_local_data(&local, &gateway, &session, &notifier)
            .await
            .unwrap();
        assert_eq!(again, MigrationOutcome::Skipped);
        assert_eq!(gateway.rows(PLANNED_MEALS_TABLE).len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rerun_after_lost_flag_reuses_existing_rows() {
        let first = seeded_local().await;
        let gateway = InMemoryGateway::new();
        let notifier: SharedNotifier = Arc::new(RecordingNotifier::new());
        let session = test_session("u1");
        migrate_local_data(&first, &gateway, &session, &notifier)
            .await
            .unwrap();

        // Same offline data, but the migrated flag never got written.
        let second = LocalStore::open_in_memory().await.unwrap();
        second
            .save_liked_recipes(&first.liked_recipes().await.unwrap().unwrap())
            .await
            .unwrap();
        second
            .save_planned_meals(&first.planned_meals().await.unwrap())
            .await
            .unwrap();

        let outcome = migrate_local_data(&second, &gateway, &session, &notifier)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            MigrationOutcome::Migrated(MigrationReport {
                recipes_inserted: 0,
                recipes_matched: 5,
                meals_inserted: 0,
                meals_existing: 2,
            })
        );
        assert_eq!(gateway.rows(RECIPES_TABLE).len(), 6);
        assert_eq!(gateway.rows(PLANNED_MEALS_TABLE).len(), 2);
        assert!(second.is_migrated("u1").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn flagged_user_performs_no_remote_writes() {
        let local = seeded_local().await;
        local.mark_migrated("u1").await.unwrap();
        let gateway = InMemoryGateway::new();
        let notifier: SharedNotifier = Arc::new(RecordingNotifier::new());

        let outcome = migrate_local_data(&local, &gateway, &test_session("u1"), &notifier)
            .await
            .unwrap();

        assert_eq!(outcome, MigrationOutcome::Skipped);
        assert_eq!(gateway.write_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failure_notifies_and_leaves_flag_unset() {
        let local = seeded_local().await;
        let gateway = InMemoryGateway::new();
        gateway.fail_table(PLANNED_MEALS_TABLE);
        let recorder = RecordingNotifier::new();
        let notifier: SharedNotifier = Arc::new(recorder.clone());
        let session = test_session("u1");

        let result = migrate_local_data(&local, &gateway, &session, &notifier).await;

        assert!(result.is_err());
        assert!(!local.is_migrated("u1").await.unwrap());
        assert_eq!(recorder.notices().len(), 1);
        assert!(recorder.has_level(NoticeLevel::Error));
        // Recipe rows written before the failure are kept.
        assert_eq!(gateway.rows(RECIPES_TABLE).len(), 6);

        gateway.heal_table(PLANNED_MEALS_TABLE);
        let retried = migrate_local_data(&local, &gateway, &session, &notifier)
            .await
            .unwrap();
        assert!(matches!(
            retried,
            MigrationOutcome::Migrated(MigrationReport { recipes_inserted: 0, recipes_matched: 5, meals_inserted: 2, .. })
        ));
        assert_eq!(gateway.rows(RECIPES_TABLE).len(), 6);
        assert!(local.is_migrated("u1").await.unwrap());
    }
}
