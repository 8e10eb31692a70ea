//! The signed-in user's `profiles` row and avatar.

use serde_json::{Map, Value};

use crate::auth::{AuthSession, SessionPersistence, SupabaseAuthClient, UserMetadata};
use crate::models::{UserProfile, DEFAULT_GREETING_NAME};
use crate::notify::{Notice, SharedNotifier};
use crate::recipes::ImageUpload;
use crate::remote::{decode_rows, Filter, Query, RemoteGateway, PROFILES_TABLE};
use crate::util::normalize_text_option;
use crate::{Error, Result};

/// Profile fields to change. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdateOutcome {
    pub profile: UserProfile,
    pub avatar_uploaded: bool,
    /// Session carrying the refreshed user metadata, when that update worked.
    pub session: Option<AuthSession>,
}

/// Object path of a user's avatar: `<user_id>/avatar.<ext>`.
pub fn avatar_path(user_id: &str, image: &ImageUpload) -> String {
    format!("{user_id}/avatar.{}", image.extension())
}

pub struct ProfileService<G: RemoteGateway> {
    gateway: G,
    bucket: String,
    notifier: SharedNotifier,
}

impl<G: RemoteGateway> ProfileService<G> {
    pub fn new(gateway: G, bucket: impl Into<String>, notifier: SharedNotifier) -> Self {
        Self {
            gateway,
            bucket: bucket.into(),
            notifier,
        }
    }

    pub async fn fetch(&self, session: &AuthSession) -> Result<Option<UserProfile>> {
        match self.select_profile(session).await {
            Ok(profile) => Ok(profile),
            Err(error) => {
                tracing::error!("Error fetching profile: {}", error);
                self.notifier.notify(Notice::error(
                    "Error",
                    "Failed to load profile information",
                ));
                Err(error)
            }
        }
    }

    async fn select_profile(&self, session: &AuthSession) -> Result<Option<UserProfile>> {
        let rows = self
            .gateway
            .select(
                &session.access_token,
                PROFILES_TABLE,
                &Query::select("*").eq("id", session.user_id()).limit(1),
            )
            .await?;
        Ok(decode_rows::<UserProfile>(rows)?.into_iter().next())
    }

    /// Name to greet the user with; lookup failures fall back to "there".
    pub async fn greeting_name(&self, session: &AuthSession) -> String {
        match self.select_profile(session).await {
            Ok(Some(profile)) => profile.greeting_name(),
            Ok(None) => DEFAULT_GREETING_NAME.to_string(),
            Err(error) => {
                tracing::warn!("Error fetching username: {}", error);
                DEFAULT_GREETING_NAME.to_string()
            }
        }
    }

    /// Update the profile row, uploading a new avatar first when given.
    ///
    /// A failed avatar upload keeps the previous avatar. The auth metadata
    /// update afterwards is best-effort.
    pub async fn update<S: SessionPersistence>(
        &self,
        session: &AuthSession,
        update: ProfileUpdate,
        avatar: Option<ImageUpload>,
        auth: Option<&SupabaseAuthClient<S>>,
    ) -> Result<ProfileUpdateOutcome> {
        let mut patch = Map::new();
        if let Some(username) = update.username {
            patch.insert("username".to_string(), optional_text(username));
        }
        if let Some(display_name) = update.display_name {
            patch.insert("display_name".to_string(), optional_text(display_name));
        }

        let mut avatar_uploaded = false;
        if let Some(image) = avatar {
            let path = avatar_path(session.user_id(), &image);
            match self
                .gateway
                .upload_object(
                    &session.access_token,
                    &self.bucket,
                    &path,
                    image.bytes,
                    &image.content_type,
                    true,
                )
                .await
            {
                Ok(()) => {
                    let url = self.gateway.public_url(&self.bucket, &path);
                    patch.insert("avatar_url".to_string(), Value::String(url));
                    avatar_uploaded = true;
                }
                Err(error) => {
                    tracing::error!("Error uploading avatar: {}", error);
                    self.notifier.notify(Notice::error(
                        "Upload failed",
                        "Failed to upload avatar image",
                    ));
                }
            }
        }

        patch.insert(
            "updated_at".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );

        let updated = self
            .gateway
            .update(
                &session.access_token,
                PROFILES_TABLE,
                &Value::Object(patch),
                &[Filter::eq("id", session.user_id())],
            )
            .await
            .map_err(Error::from)
            .and_then(|rows| {
                decode_rows::<UserProfile>(rows)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::NotFound(format!("Profile {}", session.user_id())))
            });
        let profile = match updated {
            Ok(profile) => profile,
            Err(error) => {
                tracing::error!("Error updating profile: {}", error);
                self.notifier
                    .notify(Notice::error("Update failed", "Failed to update profile"));
                return Err(error);
            }
        };

        self.notifier.notify(Notice::info(
            "Profile updated",
            "Your profile has been successfully updated",
        ));

        let session = match auth {
            Some(auth) => {
                let metadata = UserMetadata {
                    full_name: profile.display_name.clone(),
                    avatar_url: profile.avatar_url.clone(),
                };
                match auth.update_user_metadata(session, &metadata).await {
                    Ok(session) => Some(session),
                    Err(error) => {
                        tracing::warn!("Failed to update auth metadata: {}", error);
                        None
                    }
                }
            }
            None => None,
        };

        Ok(ProfileUpdateOutcome {
            profile,
            avatar_uploaded,
            session,
        })
    }
}

fn optional_text(value: String) -> Value {
    normalize_text_option(Some(value)).map_or(Value::Null, Value::String)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::auth::MemorySessionStore;
    use crate::notify::RecordingNotifier;
    use crate::recipes::tests::test_session;
    use crate::remote::memory::InMemoryGateway;

    fn service(gateway: &InMemoryGateway) -> (ProfileService<InMemoryGateway>, RecordingNotifier) {
        let notifier = RecordingNotifier::new();
        (
            ProfileService::new(gateway.clone(), "avatars", Arc::new(notifier.clone())),
            notifier,
        )
    }

    fn seed_profile(gateway: &InMemoryGateway) {
        gateway.seed(
            PROFILES_TABLE,
            vec![serde_json::json!({
                "id": "u1",
                "username": "sunny",
                "display_name": null,
                "avatar_url": "https://storage.test/avatars/old.png"
            })],
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn greeting_name_falls_back_through_fields() {
        let gateway = InMemoryGateway::new();
        let (service, _) = service(&gateway);
        let session = test_session("u1");

        assert_eq!(service.greeting_name(&session).await, "there");
        seed_profile(&gateway);
        assert_eq!(service.greeting_name(&session).await, "sunny");

        gateway.fail_table(PROFILES_TABLE);
        assert_eq!(service.greeting_name(&session).await, "there");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_uploads_avatar_with_upsert_path() {
        let gateway = InMemoryGateway::new();
        seed_profile(&gateway);
        let (service, notifier) = service(&gateway);
        let session = test_session("u1");

        let outcome = service
            .update::<MemorySessionStore>(
                &session,
                ProfileUpdate {
                    display_name: Some("Sunny Side".to_string()),
                    ..ProfileUpdate::default()
                },
                Some(ImageUpload::new("me.PNG", vec![1, 2])),
                None,
            )
            .await
            .unwrap();

        assert!(outcome.avatar_uploaded);
        assert!(gateway.has_object("avatars", "u1/avatar.png"));
        assert_eq!(outcome.profile.display_name.as_deref(), Some("Sunny Side"));
        assert_eq!(outcome.profile.username.as_deref(), Some("sunny"));
        assert_eq!(
            outcome.profile.avatar_url.as_deref(),
            Some("https://storage.test/avatars/u1/avatar.png")
        );
        assert_eq!(notifier.notices().last().unwrap().title, "Profile updated");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_avatar_upload_keeps_old_url() {
        let gateway = InMemoryGateway::new();
        seed_profile(&gateway);
        gateway.fail_uploads();
        let (service, notifier) = service(&gateway);

        let outcome = service
            .update::<MemorySessionStore>(
                &test_session("u1"),
                ProfileUpdate::default(),
                Some(ImageUpload::new("me.jpg", vec![1])),
                None,
            )
            .await
            .unwrap();

        assert!(!outcome.avatar_uploaded);
        assert_eq!(
            outcome.profile.avatar_url.as_deref(),
            Some("https://storage.test/avatars/old.png")
        );
        let titles: Vec<String> = notifier.notices().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["Upload failed", "Profile updated"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_profile_row_reports_update_failure() {
        let gateway = InMemoryGateway::new();
        let (service, notifier) = service(&gateway);

        let result = service
            .update::<MemorySessionStore>(&test_session("u9"), ProfileUpdate::default(), None, None)
            .await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(notifier.notices().last().unwrap().title, "Update failed");
    }
}
