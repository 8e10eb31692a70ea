//! Meal planner state: planned meals by date plus the favorites list.
//!
//! Each operation picks a [`PlannerStore`] from the session it is given:
//! signed-in users read and write the remote tables, everyone else the
//! offline store.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::AuthSession;
use crate::calendar::short_label;
use crate::generator::sample_recipes;
use crate::local::{LocalStore, PLANNED_MEALS_KEY};
use crate::models::{MealId, MealStatus, PlannedMeal, PlannedMeals, Recipe, RecipeId};
use crate::notify::{Notice, SharedNotifier};
use crate::recipes::{fetch_user_recipes, upload_recipe_image, ImageUpload};
use crate::remote::{
    decode_rows, encode_row, Filter, PlannedMealRow, Query, RecipeRow, RemoteGateway,
    PLANNED_MEALS_TABLE, RECIPES_TABLE,
};
use crate::util::is_http_url;
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlannerState {
    pub planned_meals: PlannedMeals,
    pub liked_recipes: Vec<Recipe>,
}

impl PlannerState {
    pub fn meals_on(&self, date: NaiveDate) -> &[PlannedMeal] {
        self.planned_meals.get(&date).map_or(&[], Vec::as_slice)
    }

    fn meal(&self, date: NaiveDate, meal_id: MealId) -> Result<&PlannedMeal> {
        self.meals_on(date)
            .iter()
            .find(|meal| meal.id == meal_id)
            .ok_or_else(|| Error::NotFound(format!("Meal {meal_id} on {date}")))
    }

    fn meal_id_at(&self, date: NaiveDate, index: usize) -> Result<MealId> {
        self.meals_on(date)
            .get(index)
            .map(|meal| meal.id)
            .ok_or_else(|| Error::NotFound(format!("Meal #{index} on {date}")))
    }
}

/// Where one planner operation reads and writes.
enum PlannerStore<'a, G: RemoteGateway> {
    Remote {
        gateway: &'a G,
        session: &'a AuthSession,
        bucket: &'a str,
    },
    Local(&'a LocalStore),
}

/// Identifies which data the cached state was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LoadKey {
    token: u64,
    user_id: Option<String>,
}

pub struct MealPlanner<G: RemoteGateway> {
    local: LocalStore,
    gateway: Option<G>,
    bucket: String,
    notifier: SharedNotifier,
    state: PlannerState,
    cache_token: u64,
    loaded: Option<LoadKey>,
    rng: StdRng,
}

impl<G: RemoteGateway> MealPlanner<G> {
    /// Planner over `local`, plus `gateway` when the remote backend is configured.
    pub fn new(
        local: LocalStore,
        gateway: Option<G>,
        bucket: impl Into<String>,
        notifier: SharedNotifier,
    ) -> Self {
        Self {
            local,
            gateway,
            bucket: bucket.into(),
            notifier,
            state: PlannerState::default(),
            cache_token: 0,
            loaded: None,
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a seeded generator for meal times.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> &PlannerState {
        &self.state
    }

    pub const fn cache_token(&self) -> u64 {
        self.cache_token
    }

    /// Invalidate the cached state; the next [`Self::load`] re-reads it.
    pub fn force_refresh(&mut self) {
        self.cache_token = self.cache_token.wrapping_add(1);
    }

    fn store<'a>(&'a self, session: Option<&'a AuthSession>) -> PlannerStore<'a, G> {
        match (session, self.gateway.as_ref()) {
            (Some(session), Some(gateway)) => PlannerStore::Remote {
                gateway,
                session,
                bucket: &self.bucket,
            },
            (Some(_), None) => {
                tracing::debug!("Signed in without a remote backend; using local store");
                PlannerStore::Local(&self.local)
            }
            (None, _) => PlannerStore::Local(&self.local),
        }
    }

    /// Load planner state unless it is already current for this session.
    ///
    /// On failure the previous state is kept.
    pub async fn load(&mut self, session: Option<&AuthSession>) -> Result<&PlannerState> {
        let key = LoadKey {
            token: self.cache_token,
            user_id: session.map(|session| session.user_id().to_string()),
        };
        if self.loaded.as_ref() == Some(&key) {
            return Ok(&self.state);
        }

        let loaded = match self.store(session) {
            PlannerStore::Remote {
                gateway, session, ..
            } => load_remote(gateway, session).await,
            PlannerStore::Local(local) => load_local(local).await,
        };

        match loaded {
            Ok(state) => {
                tracing::info!(
                    "Loaded planner: {} favorite(s), {} planned date(s)",
                    state.liked_recipes.len(),
                    state.planned_meals.len()
                );
                self.state = state;
                self.loaded = Some(key);
                Ok(&self.state)
            }
            Err(error) => Err(self.report(error)),
        }
    }

    /// Plan `recipe` on `date` with a random breakfast time.
    pub async fn add_recipe_to_planner(
        &mut self,
        session: Option<&AuthSession>,
        recipe: &Recipe,
        date: NaiveDate,
    ) -> Result<PlannedMeal> {
        self.load(session).await?;
        let mut meal = PlannedMeal::plan(recipe.clone(), &mut self.rng);

        let written = match self.store(session) {
            PlannerStore::Remote {
                gateway,
                session,
                bucket,
            } => add_remote(gateway, session, bucket, &meal, date)
                .await
                .map(|stored_recipe| {
                    meal.recipe = stored_recipe;
                    let mut meals = self.state.planned_meals.clone();
                    meals.entry(date).or_default().push(meal.clone());
                    meals
                }),
            PlannerStore::Local(local) => {
                let mut meals = self.state.planned_meals.clone();
                meals.entry(date).or_default().push(meal.clone());
                local.save_planned_meals(&meals).await.map(|()| meals)
            }
        };

        match written {
            Ok(meals) => {
                self.state.planned_meals = meals;
                self.notifier.notify(Notice::info(
                    "Recipe Added",
                    format!("{} added to {}", recipe.title, short_label(date)),
                ));
                Ok(meal)
            }
            Err(error) => Err(self.report(error)),
        }
    }

    /// Flip the status of the meal at `index` on `date`.
    pub async fn toggle_meal_status(
        &mut self,
        session: Option<&AuthSession>,
        date: NaiveDate,
        index: usize,
    ) -> Result<MealStatus> {
        self.load(session).await?;
        let meal_id = self.state.meal_id_at(date, index)?;
        self.toggle_meal(session, date, meal_id).await
    }

    pub async fn toggle_meal(
        &mut self,
        session: Option<&AuthSession>,
        date: NaiveDate,
        meal_id: MealId,
    ) -> Result<MealStatus> {
        self.load(session).await?;
        let status = self.state.meal(date, meal_id)?.status.toggled();

        let mut meals = self.state.planned_meals.clone();
        if let Some(meal) = meals
            .get_mut(&date)
            .and_then(|list| list.iter_mut().find(|meal| meal.id == meal_id))
        {
            meal.status = status;
        }

        let written = match self.store(session) {
            PlannerStore::Remote {
                gateway, session, ..
            } => update_remote_status(gateway, session, meal_id, status).await,
            PlannerStore::Local(local) => local.save_planned_meals(&meals).await,
        };

        match written {
            Ok(()) => {
                self.state.planned_meals = meals;
                Ok(status)
            }
            Err(error) => Err(self.report(error)),
        }
    }

    /// Remove the meal at `index` on `date`.
    pub async fn remove_meal(
        &mut self,
        session: Option<&AuthSession>,
        date: NaiveDate,
        index: usize,
    ) -> Result<PlannedMeal> {
        self.load(session).await?;
        let meal_id = self.state.meal_id_at(date, index)?;
        self.remove_meal_by_id(session, date, meal_id).await
    }

    pub async fn remove_meal_by_id(
        &mut self,
        session: Option<&AuthSession>,
        date: NaiveDate,
        meal_id: MealId,
    ) -> Result<PlannedMeal> {
        self.load(session).await?;
        let removed = self.state.meal(date, meal_id)?.clone();

        let mut meals = self.state.planned_meals.clone();
        if let Some(list) = meals.get_mut(&date) {
            list.retain(|meal| meal.id != meal_id);
            if list.is_empty() {
                meals.remove(&date);
            }
        }

        let written = match self.store(session) {
            PlannerStore::Remote {
                gateway, session, ..
            } => gateway
                .delete(
                    &session.access_token,
                    PLANNED_MEALS_TABLE,
                    &[
                        Filter::eq("id", meal_id),
                        Filter::eq("user_id", session.user_id()),
                    ],
                )
                .await
                .map_err(Error::from),
            PlannerStore::Local(local) => local.save_planned_meals(&meals).await,
        };

        match written {
            Ok(()) => {
                self.state.planned_meals = meals;
                self.notifier.notify(Notice::info(
                    "Meal Removed",
                    "Breakfast has been removed from your plan",
                ));
                Ok(removed)
            }
            Err(error) => Err(self.report(error)),
        }
    }

    /// Add `recipe` to the favorites. Already-liked recipes are left alone.
    pub async fn like_recipe(&mut self, session: Option<&AuthSession>, recipe: &Recipe) -> Result<Recipe> {
        self.load(session).await?;
        if let Some(existing) = self
            .state
            .liked_recipes
            .iter()
            .find(|liked| liked.id == recipe.id)
        {
            return Ok(existing.clone());
        }

        let written = match self.store(session) {
            PlannerStore::Remote {
                gateway,
                session,
                bucket,
            } => ensure_remote_recipe(gateway, session, bucket, recipe)
                .await
                .map(RecipeRow::into_recipe),
            PlannerStore::Local(local) => {
                let mut liked = self.state.liked_recipes.clone();
                liked.push(recipe.clone());
                local
                    .save_liked_recipes(&liked)
                    .await
                    .map(|()| recipe.clone())
            }
        };

        match written {
            Ok(stored) => {
                if !self.state.liked_recipes.iter().any(|liked| liked.id == stored.id) {
                    self.state.liked_recipes.push(stored.clone());
                }
                Ok(stored)
            }
            Err(error) => Err(self.report(error)),
        }
    }

    /// Drop a recipe from the favorites.
    pub async fn unlike_recipe(
        &mut self,
        session: Option<&AuthSession>,
        recipe_id: &RecipeId,
    ) -> Result<Recipe> {
        self.load(session).await?;
        let Some(position) = self
            .state
            .liked_recipes
            .iter()
            .position(|liked| &liked.id == recipe_id)
        else {
            return Err(Error::NotFound(format!("Favorite recipe {recipe_id}")));
        };

        let mut liked = self.state.liked_recipes.clone();
        let removed = liked.remove(position);

        let written = match self.store(session) {
            PlannerStore::Remote {
                gateway, session, ..
            } => match recipe_id.remote() {
                Some(id) => gateway
                    .delete(
                        &session.access_token,
                        RECIPES_TABLE,
                        &[Filter::eq("id", id), Filter::eq("user_id", session.user_id())],
                    )
                    .await
                    .map_err(Error::from),
                None => Ok(()),
            },
            PlannerStore::Local(local) => local.save_liked_recipes(&liked).await,
        };

        match written {
            Ok(()) => {
                self.state.liked_recipes = liked;
                Ok(removed)
            }
            Err(error) => Err(self.report(error)),
        }
    }

    fn report(&self, error: Error) -> Error {
        tracing::error!("Planner operation failed: {}", error);
        self.notifier.notify(Notice::error("Error", error.to_string()));
        error
    }
}

async fn load_local(local: &LocalStore) -> Result<PlannerState> {
    let liked_recipes = match local.liked_recipes().await? {
        Some(recipes) => recipes,
        None => {
            let samples = sample_recipes();
            local.save_liked_recipes(&samples).await?;
            samples
        }
    };

    let raw: Option<Value> = local.get_json(PLANNED_MEALS_KEY).await?;
    let Some(raw) = raw else {
        return Ok(PlannerState {
            planned_meals: PlannedMeals::new(),
            liked_recipes,
        });
    };

    let needs_ids = has_meals_without_id(&raw);
    let mut planned_meals: PlannedMeals = serde_json::from_value(raw)?;
    planned_meals.retain(|_, meals| !meals.is_empty());
    if needs_ids {
        // Persist the ids assigned to older entries so they stay addressable.
        local.save_planned_meals(&planned_meals).await?;
    }

    Ok(PlannerState {
        planned_meals,
        liked_recipes,
    })
}

fn has_meals_without_id(raw: &Value) -> bool {
    raw.as_object().is_some_and(|dates| {
        dates.values().any(|meals| {
            meals.as_array().is_some_and(|meals| {
                meals.iter().any(|meal| meal.get("mealId").is_none())
            })
        })
    })
}

async fn load_remote<G: RemoteGateway>(gateway: &G, session: &AuthSession) -> Result<PlannerState> {
    let liked_recipes = fetch_user_recipes(gateway, session)
        .await?
        .into_iter()
        .map(RecipeRow::into_recipe)
        .collect();

    let rows = gateway
        .select(
            &session.access_token,
            PLANNED_MEALS_TABLE,
            &Query::select("*, recipes(*)").eq("user_id", session.user_id()),
        )
        .await?;
    let rows: Vec<PlannedMealRow> = decode_rows(rows)?;

    let mut planned_meals = PlannedMeals::new();
    for (date, meal) in rows.into_iter().filter_map(PlannedMealRow::into_planned_meal) {
        planned_meals.entry(date).or_default().push(meal);
    }

    Ok(PlannerState {
        planned_meals,
        liked_recipes,
    })
}

/// Make sure `recipe` exists in the user's remote recipes and return the row.
///
/// Matches by remote id first, then by case-insensitive title. A new row uploads a local
/// image file first.
pub(crate) async fn ensure_remote_recipe<G: RemoteGateway>(
    gateway: &G,
    session: &AuthSession,
    bucket: &str,
    recipe: &Recipe,
) -> Result<RecipeRow> {
    if let Some(id) = recipe.id.remote() {
        let rows = gateway
            .select(
                &session.access_token,
                RECIPES_TABLE,
                &Query::select("*")
                    .eq("id", id)
                    .eq("user_id", session.user_id())
                    .limit(1),
            )
            .await?;
        if let Some(row) = decode_rows::<RecipeRow>(rows)?.into_iter().next() {
            return Ok(row);
        }
    }

    // Title match ignores case.
    if let Some(row) = fetch_user_recipes(gateway, session)
        .await?
        .into_iter()
        .find(|row| recipe.same_title(&row.title))
    {
        return Ok(row);
    }

    let mut stored = recipe.clone();
    if let Some(image) = recipe.image.as_deref().filter(|image| !is_http_url(image)) {
        let upload = ImageUpload::from_path(std::path::Path::new(image))?;
        let (url, path) = upload_recipe_image(gateway, session, bucket, upload).await?;
        stored.image = Some(url);
        stored.image_path = Some(path);
    }

    let row = RecipeRow::from_recipe(Uuid::now_v7().to_string(), session.user_id(), &stored);
    let inserted = gateway
        .insert(&session.access_token, RECIPES_TABLE, &[encode_row(&row)?])
        .await?;
    tracing::info!("Created remote recipe {} for {}", row.id, recipe.title);
    Ok(decode_rows::<RecipeRow>(inserted)?
        .into_iter()
        .next()
        .unwrap_or(row))
}

async fn add_remote<G: RemoteGateway>(
    gateway: &G,
    session: &AuthSession,
    bucket: &str,
    meal: &PlannedMeal,
    date: NaiveDate,
) -> Result<Recipe> {
    let recipe_row = ensure_remote_recipe(gateway, session, bucket, &meal.recipe).await?;
    let meal_row = PlannedMealRow::from_meal(session.user_id(), &recipe_row.id, date, meal);
    gateway
        .insert(
            &session.access_token,
            PLANNED_MEALS_TABLE,
            &[encode_row(&meal_row)?],
        )
        .await?;
    Ok(recipe_row.into_recipe())
}

async fn update_remote_status<G: RemoteGateway>(
    gateway: &G,
    session: &AuthSession,
    meal_id: MealId,
    status: MealStatus,
) -> Result<()> {
    let updated = gateway
        .update(
            &session.access_token,
            PLANNED_MEALS_TABLE,
            &serde_json::json!({ "status": status }),
            &[
                Filter::eq("id", meal_id),
                Filter::eq("user_id", session.user_id()),
            ],
        )
        .await?;
    if updated.is_empty() {
        return Err(Error::NotFound(format!("Planned meal {meal_id}")));
    }
    Ok(())
}
