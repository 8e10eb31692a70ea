//! Session lifecycle shared by every interface.
//!
//! [`SessionManager`] owns the current [`AuthState`], broadcasts changes over
//! a `watch` channel, reports outcomes through the notifier, and runs the
//! one-time local data migration whenever a user becomes signed in.

use tokio::sync::watch;

use crate::auth::{AuthSession, AuthUser, SessionPersistence, SignUpOutcome, SupabaseAuthClient};
use crate::local::LocalStore;
use crate::migration::{migrate_local_data, MigrationOutcome};
use crate::notify::{Notice, SharedNotifier};
use crate::remote::RemoteGateway;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub session: Option<AuthSession>,
    pub loading: bool,
}

impl AuthState {
    pub fn user(&self) -> Option<&AuthUser> {
        self.session.as_ref().map(|session| &session.user)
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            session: None,
            loading: true,
        }
    }
}

pub struct SessionManager<S: SessionPersistence, G: RemoteGateway> {
    auth: Option<SupabaseAuthClient<S>>,
    gateway: Option<G>,
    local: LocalStore,
    notifier: SharedNotifier,
    state: watch::Sender<AuthState>,
}

impl<S: SessionPersistence, G: RemoteGateway> SessionManager<S, G> {
    /// `auth` and `gateway` are `None` when the remote backend is not configured.
    pub fn new(
        auth: Option<SupabaseAuthClient<S>>,
        gateway: Option<G>,
        local: LocalStore,
        notifier: SharedNotifier,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            auth,
            gateway,
            local,
            notifier,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Option<AuthSession> {
        self.state.borrow().session.clone()
    }

    pub const fn auth_client(&self) -> Option<&SupabaseAuthClient<S>> {
        self.auth.as_ref()
    }

    pub fn is_remote_enabled(&self) -> bool {
        self.auth.is_some()
    }

    fn publish(&self, session: Option<AuthSession>) {
        self.state.send_replace(AuthState {
            session,
            loading: false,
        });
    }

    /// Replace the current session, e.g. after a metadata update.
    pub fn set_session(&self, session: AuthSession) {
        self.publish(Some(session));
    }

    fn client(&self) -> Result<&SupabaseAuthClient<S>> {
        self.auth.as_ref().ok_or(Error::NotConfigured)
    }

    /// Restore the persisted session and finish loading.
    pub async fn initialize(&self) -> Result<Option<AuthSession>> {
        let Some(auth) = self.auth.as_ref() else {
            self.publish(None);
            return Ok(None);
        };

        match auth.restore_session().await {
            Ok(session) => {
                if let Some(session) = &session {
                    tracing::info!("User authenticated: {}", display_user(&session.user));
                    self.after_sign_in(session).await;
                }
                self.publish(session.clone());
                Ok(session)
            }
            Err(error) => {
                tracing::error!("Error getting session: {}", error);
                self.notifier.notify(Notice::error(
                    "Authentication Error",
                    "Failed to retrieve authentication session",
                ));
                self.publish(None);
                Err(error.into())
            }
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        let result = match self.client() {
            Ok(auth) => auth.sign_up(email, password).await.map_err(Error::from),
            Err(error) => Err(error),
        };

        match result {
            Ok(SignUpOutcome::SignedIn(session)) => {
                self.notifier.notify(Notice::info(
                    "Sign Up Successful",
                    "Your account has been created.",
                ));
                self.after_sign_in(&session).await;
                self.publish(Some(session.clone()));
                Ok(SignUpOutcome::SignedIn(session))
            }
            Ok(SignUpOutcome::ConfirmationRequired) => {
                self.notifier.notify(Notice::info(
                    "Verification Email Sent",
                    "Please check your email to confirm your account.",
                ));
                Ok(SignUpOutcome::ConfirmationRequired)
            }
            Err(error) => {
                tracing::error!("Email sign up error: {}", error);
                self.notifier
                    .notify(Notice::error("Sign Up Failed", error.to_string()));
                Err(error)
            }
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let result = match self.client() {
            Ok(auth) => auth.sign_in(email, password).await.map_err(Error::from),
            Err(error) => Err(error),
        };
        self.finish_sign_in(result, "Sign In Failed").await
    }

    /// URL to open in a browser to sign in with an OAuth provider.
    pub fn oauth_url(&self, provider: &str, redirect_to: &str) -> Result<String> {
        let result = self
            .client()
            .and_then(|auth| {
                auth.oauth_authorize_url(provider, redirect_to)
                    .map_err(Error::from)
            });
        if let Err(error) = &result {
            self.notifier.notify(Notice::error(
                oauth_failure_title(provider),
                error.to_string(),
            ));
        }
        result
    }

    /// Complete an OAuth sign-in from the redirect URL.
    pub async fn complete_oauth(&self, callback_url: &str) -> Result<AuthSession> {
        let result = match self.client() {
            Ok(auth) => auth
                .complete_oauth_callback(callback_url)
                .await
                .map_err(Error::from),
            Err(error) => Err(error),
        };
        self.finish_sign_in(result, "OAuth Sign In Failed").await
    }

    async fn finish_sign_in(
        &self,
        result: Result<AuthSession>,
        failure_title: &str,
    ) -> Result<AuthSession> {
        match result {
            Ok(session) => {
                self.notifier
                    .notify(Notice::info("Sign In Successful", "Welcome back!"));
                tracing::info!("Signed in as {}", display_user(&session.user));
                self.after_sign_in(&session).await;
                self.publish(Some(session.clone()));
                Ok(session)
            }
            Err(error) => {
                tracing::error!("Sign in error: {}", error);
                self.notifier
                    .notify(Notice::error(failure_title, error.to_string()));
                Err(error)
            }
        }
    }

    pub async fn sign_out(&self) -> Result<()> {
        let auth = match self.client() {
            Ok(auth) => auth,
            Err(error) => {
                self.notifier
                    .notify(Notice::error("Sign Out Failed", error.to_string()));
                return Err(error);
            }
        };

        let result = match self.session() {
            Some(session) => auth
                .sign_out(&session.access_token)
                .await
                .map_err(Error::from),
            None => auth.store().clear_session().map_err(Error::from),
        };

        match result {
            Ok(()) => {
                self.publish(None);
                self.notifier.notify(Notice::info(
                    "Sign Out Successful",
                    "You have been signed out.",
                ));
                Ok(())
            }
            Err(error) => {
                self.notifier
                    .notify(Notice::error("Sign Out Failed", error.to_string()));
                Err(error)
            }
        }
    }

    /// Run the one-time migration for the signed-in user.
    ///
    /// Failures are already reported by the migration; sign-in still succeeds.
    async fn after_sign_in(&self, session: &AuthSession) {
        let Some(gateway) = self.gateway.as_ref() else {
            return;
        };
        if let Err(error) = migrate_local_data(&self.local, gateway, session, &self.notifier).await {
            tracing::warn!("Migration will be retried on next sign-in: {}", error);
        }
    }

    /// Run the migration on demand for the current session.
    pub async fn migrate_now(&self) -> Result<MigrationOutcome> {
        let session = self.session().ok_or(Error::NotAuthenticated)?;
        let gateway = self.gateway.as_ref().ok_or(Error::NotConfigured)?;
        migrate_local_data(&self.local, gateway, &session, &self.notifier).await
    }
}

fn display_user(user: &AuthUser) -> &str {
    user.email.as_deref().unwrap_or(&user.id)
}

fn oauth_failure_title(provider: &str) -> String {
    let mut chars = provider.trim().chars();
    match chars.next() {
        Some(first) => format!(
            "{}{} Sign In Failed",
            first.to_uppercase(),
            chars.as_str()
        ),
        None => "OAuth Sign In Failed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::MemorySessionStore;
    use crate::generator::sample_recipes;
    use crate::notify::{NoticeLevel, RecordingNotifier};
    use crate::recipes::tests::test_session;
    use crate::remote::memory::InMemoryGateway;
    use crate::remote::RECIPES_TABLE;

    async fn manager(
        store: MemorySessionStore,
        gateway: &InMemoryGateway,
    ) -> (
        SessionManager<MemorySessionStore, InMemoryGateway>,
        LocalStore,
        RecordingNotifier,
    ) {
        let local = LocalStore::open_in_memory().await.unwrap();
        let notifier = RecordingNotifier::new();
        let auth = SupabaseAuthClient::new("https://demo.supabase.co", "anon", store).unwrap();
        let manager = SessionManager::new(
            Some(auth),
            Some(gateway.clone()),
            local.clone(),
            Arc::new(notifier.clone()),
        );
        (manager, local, notifier)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn initialize_restores_session_and_migrates_once() {
        let store = MemorySessionStore::default();
        store.save_session(&test_session("u1")).unwrap();
        let gateway = InMemoryGateway::new();
        let (manager, local, _) = manager(store, &gateway).await;
        local.save_liked_recipes(&sample_recipes()).await.unwrap();
        let mut updates = manager.subscribe();
        assert!(updates.borrow().loading);

        let session = manager.initialize().await.unwrap();

        assert_eq!(session.map(|session| session.user.id), Some("u1".to_string()));
        updates.changed().await.unwrap();
        let state = updates.borrow().clone();
        assert!(!state.loading);
        assert_eq!(state.user().map(|user| user.id.as_str()), Some("u1"));
        assert_eq!(gateway.rows(RECIPES_TABLE).len(), 5);
        assert!(local.is_migrated("u1").await.unwrap());

        let writes = gateway.write_count();
        manager.initialize().await.unwrap();
        assert_eq!(gateway.write_count(), writes);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn initialize_without_stored_session_is_signed_out() {
        let gateway = InMemoryGateway::new();
        let (manager, _, notifier) = manager(MemorySessionStore::default(), &gateway).await;

        assert!(manager.initialize().await.unwrap().is_none());
        assert_eq!(manager.current(), AuthState { session: None, loading: false });
        assert!(notifier.notices().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sign_in_validation_failure_notifies() {
        let gateway = InMemoryGateway::new();
        let (manager, _, notifier) = manager(MemorySessionStore::default(), &gateway).await;

        let result = manager.sign_in("  ", "secret").await;

        assert!(result.is_err());
        let notice = notifier.notices().pop().unwrap();
        assert_eq!(notice.title, "Sign In Failed");
        assert_eq!(notice.description, "Email is required");
        assert_eq!(notice.level, NoticeLevel::Error);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn local_only_mode_reports_not_configured() {
        let notifier = RecordingNotifier::new();
        let manager: SessionManager<MemorySessionStore, InMemoryGateway> = SessionManager::new(
            None,
            None,
            LocalStore::open_in_memory().await.unwrap(),
            Arc::new(notifier.clone()),
        );

        assert!(manager.initialize().await.unwrap().is_none());
        assert!(matches!(
            manager.sign_in("a@example.com", "pw").await,
            Err(Error::NotConfigured)
        ));
        assert!(matches!(manager.migrate_now().await, Err(Error::NotAuthenticated)));
        assert!(matches!(
            manager.oauth_url("google", "http://localhost"),
            Err(Error::NotConfigured)
        ));
        assert_eq!(notifier.notices().last().unwrap().title, "Google Sign In Failed");
    }

    #[test]
    fn oauth_failure_title_capitalizes_provider() {
        assert_eq!(oauth_failure_title("github"), "Github Sign In Failed");
        assert_eq!(oauth_failure_title(""), "OAuth Sign In Failed");
    }
}
