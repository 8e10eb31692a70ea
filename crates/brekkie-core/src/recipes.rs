//! User-authored recipes stored in the remote `recipes` table.
//!
//! Recipe authoring has no offline fallback: every operation needs a session.

use std::path::Path;

use uuid::Uuid;

use crate::auth::AuthSession;
use crate::models::Recipe;
use crate::notify::{Notice, SharedNotifier};
use crate::remote::{
    decode_rows, encode_row, Filter, GatewayResult, Query, RecipeRow, RemoteGateway,
    RECIPES_TABLE, TEMPLATE_IMAGE_PREFIX,
};
use crate::util::{normalize_text_option, sanitize_file_name, unix_timestamp_millis};
use crate::{Error, Result};

/// Image bytes picked by the user, ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("image")
            .to_string();
        Ok(Self::new(file_name, bytes))
    }

    /// Lowercase extension of the file name, `jpg` when there is none.
    pub fn extension(&self) -> String {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or_else(|| "jpg".to_string(), str::to_ascii_lowercase)
    }
}

/// Object path for a new recipe image: `<user_id>/<millis>-<uuid>-<name>`.
pub fn recipe_image_path(user_id: &str, file_name: &str) -> String {
    format!(
        "{user_id}/{}-{}-{}",
        unix_timestamp_millis(),
        Uuid::now_v7().simple(),
        sanitize_file_name(file_name)
    )
}

/// Upload `image` into the recipe bucket and return its public URL and path.
pub(crate) async fn upload_recipe_image<G: RemoteGateway>(
    gateway: &G,
    session: &AuthSession,
    bucket: &str,
    image: ImageUpload,
) -> GatewayResult<(String, String)> {
    let path = recipe_image_path(session.user_id(), &image.file_name);
    gateway
        .upload_object(
            &session.access_token,
            bucket,
            &path,
            image.bytes,
            &image.content_type,
            false,
        )
        .await?;
    Ok((gateway.public_url(bucket, &path), path))
}

/// All recipes owned by the session's user.
pub(crate) async fn fetch_user_recipes<G: RemoteGateway>(
    gateway: &G,
    session: &AuthSession,
) -> Result<Vec<RecipeRow>> {
    let rows = gateway
        .select(
            &session.access_token,
            RECIPES_TABLE,
            &Query::select("*").eq("user_id", session.user_id()),
        )
        .await?;
    Ok(decode_rows(rows)?)
}

/// Editable recipe fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeDraft {
    /// Remote id of the recipe being edited; `None` creates a new recipe.
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub prep_time: Option<String>,
    pub image: Option<String>,
    pub image_path: Option<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub servings: Option<u32>,
}

impl RecipeDraft {
    /// Draft editing an existing recipe. Local ids start a new remote recipe.
    pub fn from_recipe(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id.remote().map(ToString::to_string),
            title: recipe.title.clone(),
            description: recipe.description.clone(),
            prep_time: recipe.prep_time.clone(),
            image: recipe.image.clone(),
            image_path: recipe.image_path.clone(),
            ingredients: recipe.ingredients.clone().unwrap_or_default(),
            instructions: recipe.instructions.clone().unwrap_or_default(),
            servings: recipe.servings,
        }
    }

    fn into_row(self, id: String, user_id: &str) -> Result<RecipeRow> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::InvalidInput("Recipe title is required".to_string()));
        }
        let keep_filled = |items: Vec<String>| -> Vec<String> {
            items
                .into_iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        };

        Ok(RecipeRow {
            id,
            user_id: user_id.to_string(),
            title,
            description: Some(self.description.trim().to_string()),
            prep_time: normalize_text_option(self.prep_time),
            image_url: normalize_text_option(self.image),
            image_path: normalize_text_option(self.image_path),
            ingredients: Some(keep_filled(self.ingredients)),
            instructions: Some(keep_filled(self.instructions)),
            servings: self.servings,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub recipe_id: String,
    pub created: bool,
    pub image_uploaded: bool,
}

/// CRUD over the signed-in user's recipes, with a cached list.
pub struct RecipeManager<G: RemoteGateway> {
    gateway: G,
    bucket: String,
    notifier: SharedNotifier,
    recipes: Vec<Recipe>,
}

impl<G: RemoteGateway> RecipeManager<G> {
    pub fn new(gateway: G, bucket: impl Into<String>, notifier: SharedNotifier) -> Self {
        Self {
            gateway,
            bucket: bucket.into(),
            notifier,
            recipes: Vec::new(),
        }
    }

    /// Recipes from the last refresh.
    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    /// Reload the user's recipes. Without a session the list is empty.
    pub async fn refresh(&mut self, session: Option<&AuthSession>) -> Result<&[Recipe]> {
        let Some(session) = session else {
            self.recipes.clear();
            return Ok(&self.recipes);
        };

        match fetch_user_recipes(&self.gateway, session).await {
            Ok(rows) => {
                self.recipes = rows.into_iter().map(RecipeRow::into_recipe).collect();
                tracing::debug!("Loaded {} recipe(s)", self.recipes.len());
                Ok(&self.recipes)
            }
            Err(error) => Err(self.report(error)),
        }
    }

    /// Create or update a recipe, uploading `image` first when given.
    ///
    /// A failed upload does not stop the save; the recipe keeps whatever
    /// image it had before.
    pub async fn save_recipe(
        &mut self,
        session: Option<&AuthSession>,
        mut draft: RecipeDraft,
        image: Option<ImageUpload>,
    ) -> Result<SaveOutcome> {
        let Some(session) = session else {
            self.notifier.notify(Notice::error(
                "Authentication Required",
                "Please log in to save recipes.",
            ));
            return Err(Error::NotAuthenticated);
        };

        let mut image_uploaded = false;
        if let Some(image) = image {
            match upload_recipe_image(&self.gateway, session, &self.bucket, image).await {
                Ok((url, path)) => {
                    draft.image = Some(url);
                    draft.image_path = Some(path);
                    image_uploaded = true;
                }
                Err(error) => {
                    tracing::warn!("Recipe image upload failed: {}", error);
                    self.notifier.notify(Notice::warning(
                        "Image Upload Failed",
                        "Could not upload image. Recipe will be saved without an image.",
                    ));
                }
            }
        }

        let existing_id = draft.id.clone().and_then(|id| normalize_text_option(Some(id)));
        let created = existing_id.is_none();
        let recipe_id = existing_id.unwrap_or_else(|| Uuid::now_v7().to_string());
        let row = draft.into_row(recipe_id.clone(), session.user_id())?;

        let result = self.write_row(session, &row, created).await;
        if let Err(error) = result {
            return Err(self.report(error));
        }

        self.notifier.notify(if created {
            Notice::info("Recipe Created", "Your recipe has been created successfully!")
        } else {
            Notice::info("Recipe Updated", "Your recipe has been updated successfully!")
        });
        tracing::info!("Saved recipe {} (created: {})", recipe_id, created);

        // The save already succeeded; a failed reload only leaves the list stale.
        if let Err(error) = self.refresh(Some(session)).await {
            tracing::warn!("Failed to reload recipes after save: {}", error);
        }

        Ok(SaveOutcome {
            recipe_id,
            created,
            image_uploaded,
        })
    }

    async fn write_row(&self, session: &AuthSession, row: &RecipeRow, created: bool) -> Result<()> {
        let value = encode_row(row)?;
        if created {
            self.gateway
                .insert(&session.access_token, RECIPES_TABLE, &[value])
                .await?;
            return Ok(());
        }

        let updated = self
            .gateway
            .update(
                &session.access_token,
                RECIPES_TABLE,
                &value,
                &[
                    Filter::eq("id", &row.id),
                    Filter::eq("user_id", session.user_id()),
                ],
            )
            .await?;
        if updated.is_empty() {
            return Err(Error::NotFound(format!("Recipe {}", row.id)));
        }
        Ok(())
    }

    /// Delete a recipe and its uploaded image. Shared template images stay.
    pub async fn delete_recipe(&mut self, session: Option<&AuthSession>, recipe_id: &str) -> Result<()> {
        let session = session.ok_or(Error::NotAuthenticated)?;

        let image_path = match self.cached_image_path(session, recipe_id).await {
            Ok(path) => path,
            Err(error) => return Err(self.report(error)),
        };

        let deleted = self
            .gateway
            .delete(
                &session.access_token,
                RECIPES_TABLE,
                &[
                    Filter::eq("id", recipe_id),
                    Filter::eq("user_id", session.user_id()),
                ],
            )
            .await;
        if let Err(error) = deleted {
            return Err(self.report(error.into()));
        }

        if let Some(path) = image_path.filter(|path| !path.starts_with(TEMPLATE_IMAGE_PREFIX)) {
            if let Err(error) = self
                .gateway
                .remove_objects(&session.access_token, &self.bucket, &[path.clone()])
                .await
            {
                tracing::warn!("Failed to remove recipe image {}: {}", path, error);
            }
        }

        self.recipes
            .retain(|recipe| recipe.id.remote() != Some(recipe_id));
        self.notifier.notify(Notice::info(
            "Recipe Deleted",
            "Your recipe has been deleted successfully.",
        ));
        tracing::info!("Deleted recipe {}", recipe_id);
        Ok(())
    }

    async fn cached_image_path(&self, session: &AuthSession, recipe_id: &str) -> Result<Option<String>> {
        if let Some(recipe) = self
            .recipes
            .iter()
            .find(|recipe| recipe.id.remote() == Some(recipe_id))
        {
            return Ok(recipe.image_path.clone());
        }

        let rows = self
            .gateway
            .select(
                &session.access_token,
                RECIPES_TABLE,
                &Query::select("*")
                    .eq("id", recipe_id)
                    .eq("user_id", session.user_id())
                    .limit(1),
            )
            .await?;
        let rows: Vec<RecipeRow> = decode_rows(rows)?;
        match rows.into_iter().next() {
            Some(row) => Ok(row.image_path),
            None => Err(Error::NotFound(format!("Recipe {recipe_id}"))),
        }
    }

    fn report(&self, error: Error) -> Error {
        tracing::error!("Recipe operation failed: {}", error);
        self.notifier.notify(Notice::error("Error", error.to_string()));
        error
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::auth::{AuthUser, UserMetadata};
    use crate::models::RecipeId;
    use crate::notify::{NoticeLevel, RecordingNotifier};
    use crate::remote::memory::InMemoryGateway;

    pub(crate) fn test_session(user_id: &str) -> AuthSession {
        AuthSession {
            access_token: format!("token-{user_id}"),
            refresh_token: "refresh".to_string(),
            expires_at: i64::MAX,
            user: AuthUser {
                id: user_id.to_string(),
                email: Some(format!("{user_id}@example.com")),
                metadata: UserMetadata::default(),
            },
        }
    }

    fn manager(gateway: &InMemoryGateway) -> (RecipeManager<InMemoryGateway>, RecordingNotifier) {
        let notifier = RecordingNotifier::new();
        let manager = RecipeManager::new(gateway.clone(), "recipe-images", Arc::new(notifier.clone()));
        (manager, notifier)
    }

    fn draft(title: &str) -> RecipeDraft {
        RecipeDraft {
            title: title.to_string(),
            description: "Weekend favourite".to_string(),
            ingredients: vec!["2 eggs".to_string(), "  ".to_string()],
            instructions: vec!["Whisk".to_string()],
            ..RecipeDraft::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn save_requires_session() {
        let gateway = InMemoryGateway::new();
        let (mut manager, notifier) = manager(&gateway);

        let result = manager.save_recipe(None, draft("Shakshuka"), None).await;

        assert!(matches!(result, Err(Error::NotAuthenticated)));
        assert_eq!(notifier.notices()[0].title, "Authentication Required");
        assert_eq!(gateway.write_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn save_creates_recipe_with_uploaded_image() {
        let gateway = InMemoryGateway::new();
        let (mut manager, notifier) = manager(&gateway);
        let session = test_session("u1");

        let outcome = manager
            .save_recipe(
                Some(&session),
                draft("Shakshuka"),
                Some(ImageUpload::new("My Photo.PNG", vec![1, 2, 3])),
            )
            .await
            .unwrap();

        assert!(outcome.created);
        assert!(outcome.image_uploaded);
        let rows = gateway.rows(RECIPES_TABLE);
        assert_eq!(rows.len(), 1);
        let path = rows[0]["image_path"].as_str().unwrap();
        assert!(path.starts_with("u1/"), "{path}");
        assert!(path.ends_with("-my-photo.png"), "{path}");
        assert!(gateway.has_object("recipe-images", path));
        assert_eq!(rows[0]["ingredients"], serde_json::json!(["2 eggs"]));

        assert_eq!(manager.recipes().len(), 1);
        assert_eq!(notifier.notices()[0].title, "Recipe Created");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_upload_still_saves_recipe_without_image() {
        let gateway = InMemoryGateway::new();
        gateway.fail_uploads();
        let (mut manager, notifier) = manager(&gateway);
        let session = test_session("u1");

        let outcome = manager
            .save_recipe(
                Some(&session),
                draft("Shakshuka"),
                Some(ImageUpload::new("eggs.jpg", vec![0; 16])),
            )
            .await
            .unwrap();

        assert!(!outcome.image_uploaded);
        let rows = gateway.rows(RECIPES_TABLE);
        assert_eq!(rows.len(), 1);
        assert!(rows[0]["image_url"].is_null());
        assert!(notifier.has_level(NoticeLevel::Warning));
        let warning = notifier
            .notices()
            .into_iter()
            .find(|notice| notice.level == NoticeLevel::Warning)
            .unwrap();
        assert_eq!(warning.title, "Image Upload Failed");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_is_scoped_to_owner() {
        let gateway = InMemoryGateway::new();
        let (mut manager, notifier) = manager(&gateway);
        let owner = test_session("u1");
        let outcome = manager
            .save_recipe(Some(&owner), draft("Granola"), None)
            .await
            .unwrap();

        let mut edit = RecipeDraft::from_recipe(&manager.recipes()[0]);
        edit.title = "Crunchy Granola".to_string();
        let other = test_session("u2");
        let result = manager.save_recipe(Some(&other), edit.clone(), None).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(notifier.notices().last().unwrap().level, NoticeLevel::Error);

        let updated = manager.save_recipe(Some(&owner), edit, None).await.unwrap();
        assert!(!updated.created);
        assert_eq!(updated.recipe_id, outcome.recipe_id);
        assert_eq!(manager.recipes()[0].title, "Crunchy Granola");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_removes_uploaded_image_but_keeps_templates() {
        let gateway = InMemoryGateway::new();
        let (mut manager, notifier) = manager(&gateway);
        let session = test_session("u1");

        let uploaded = manager
            .save_recipe(
                Some(&session),
                draft("Crepes"),
                Some(ImageUpload::new("crepes.jpg", vec![9])),
            )
            .await
            .unwrap();
        let mut template = draft("Porridge");
        template.image_path = Some("template/porridge.jpg".to_string());
        let templated = manager.save_recipe(Some(&session), template, None).await.unwrap();
        gateway
            .upload_object("t", "recipe-images", "template/porridge.jpg", vec![1], "image/jpeg", true)
            .await
            .unwrap();

        manager.delete_recipe(Some(&session), &uploaded.recipe_id).await.unwrap();
        manager.delete_recipe(Some(&session), &templated.recipe_id).await.unwrap();

        assert!(gateway.rows(RECIPES_TABLE).is_empty());
        assert_eq!(gateway.object_paths("recipe-images"), vec!["template/porridge.jpg"]);
        assert!(manager.recipes().is_empty());
        assert_eq!(notifier.notices().last().unwrap().title, "Recipe Deleted");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn refresh_without_session_is_empty() {
        let gateway = InMemoryGateway::new();
        let (mut manager, _) = manager(&gateway);
        assert!(manager.refresh(None).await.unwrap().is_empty());
    }

    #[test]
    fn draft_from_local_recipe_creates_new_remote_row() {
        let recipe = Recipe::new(RecipeId::Local(3), "Berry Smoothie Bowl", "");
        assert_eq!(RecipeDraft::from_recipe(&recipe).id, None);
        assert_eq!(
            ImageUpload::new("photo.webp", Vec::new()).content_type,
            "image/webp"
        );
        assert_eq!(ImageUpload::new("photo", Vec::new()).extension(), "jpg");
    }
}
