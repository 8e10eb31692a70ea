//! Supabase GoTrue client: email and OAuth sign-in, refresh, sign-out.
//!
//! Sessions are persisted through a [`SessionPersistence`] implementation
//! supplied by the frontend (OS keyring in the CLI).

mod store;

use std::fmt;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::util::{api_error_message, normalize_text_option, unix_timestamp_now};

pub use store::MemorySessionStore;

const EXPIRY_SKEW_SECONDS: i64 = 60;

/// User metadata fields the planner reads (`full_name`, `avatar_url`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub metadata: UserMetadata,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(AuthSession),
    ConfirmationRequired,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Supabase auth is not configured for this build.")]
    NotConfigured,
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Api(String),
    #[error("OAuth callback error: {0}")]
    Callback(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

#[derive(Clone)]
pub struct SupabaseAuthClient<S: SessionPersistence> {
    auth_url: String,
    anon_key: String,
    client: Client,
    store: S,
}

impl<S: SessionPersistence> SupabaseAuthClient<S> {
    pub fn new(url: impl AsRef<str>, anon_key: impl Into<String>, store: S) -> AuthResult<Self> {
        let auth_url = normalize_auth_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Supabase anon key must not be empty",
            ));
        }

        Ok(Self {
            auth_url,
            anon_key,
            client: Client::builder().build()?,
            store,
        })
    }

    /// Session persisted by a previous run, refreshed when about to expire.
    ///
    /// A session whose refresh fails is cleared and reported as signed out.
    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored) = self.store.load_session()? else {
            return Ok(None);
        };

        if !stored.is_expired() {
            return Ok(Some(stored));
        }

        match self.refresh_session(&stored.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        validate_credentials(email, password)?;

        let payload = serde_json::json!({
            "email": email.trim(),
            "password": password,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/signup", self.auth_url))
                .json(&payload),
        );
        let response = send_auth_request(request).await?;
        match response.into_session()? {
            Some(session) => {
                self.store.save_session(&session)?;
                Ok(SignUpOutcome::SignedIn(session))
            }
            None => Ok(SignUpOutcome::ConfirmationRequired),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;

        let payload = serde_json::json!({
            "email": email.trim(),
            "password": password,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "password")])
                .json(&payload),
        );

        let session = send_auth_request(request)
            .await?
            .into_session()?
            .ok_or_else(|| {
                AuthError::Api("Sign-in response did not include an active session".to_string())
            })?;

        self.store.save_session(&session)?;
        Ok(session)
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }

        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "refresh_token")])
                .json(&serde_json::json!({ "refresh_token": refresh_token })),
        );
        let session = send_auth_request(request)
            .await?
            .into_session()?
            .ok_or_else(|| {
                AuthError::Api("Refresh response did not include an active session".to_string())
            })?;

        self.store.save_session(&session)?;
        Ok(session)
    }

    /// Revoke the session remotely and forget it locally.
    ///
    /// An already-invalid token (401) still counts as signed out.
    pub async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let request = self
            .client
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token);

        let response = request.send().await?;
        if !(response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED) {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(api_error_message(status, &body)));
        }

        self.store.clear_session()?;
        Ok(())
    }

    /// Browser URL that starts an OAuth sign-in with `provider` (e.g. `google`).
    pub fn oauth_authorize_url(&self, provider: &str, redirect_to: &str) -> AuthResult<String> {
        let provider = provider.trim();
        if provider.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "OAuth provider must not be empty",
            ));
        }
        let mut url = Url::parse(&format!("{}/authorize", self.auth_url))
            .map_err(|_| AuthError::InvalidConfiguration("Supabase URL is not a valid URL"))?;
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("redirect_to", redirect_to.trim());
        Ok(url.into())
    }

    /// Finish an OAuth sign-in from the URL the provider redirected to.
    pub async fn complete_oauth_callback(&self, callback_url: &str) -> AuthResult<AuthSession> {
        let tokens = parse_callback_url(callback_url)?;
        let user = self.fetch_user(&tokens.access_token).await?;
        let session = AuthSession {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens.expires_at,
            user,
        };
        self.store.save_session(&session)?;
        Ok(session)
    }

    pub async fn fetch_user(&self, access_token: &str) -> AuthResult<AuthUser> {
        let request = self
            .client
            .get(format!("{}/user", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token);
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(api_error_message(status, &body)));
        }
        Ok(response.json::<SupabaseUser>().await?.into())
    }

    /// Replace the user's metadata and keep the persisted session in step.
    pub async fn update_user_metadata(
        &self,
        session: &AuthSession,
        metadata: &UserMetadata,
    ) -> AuthResult<AuthSession> {
        let request = self
            .client
            .put(format!("{}/user", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .json(&serde_json::json!({ "data": metadata }));
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(api_error_message(status, &body)));
        }

        let user: AuthUser = response.json::<SupabaseUser>().await?.into();
        let updated = AuthSession {
            user,
            ..session.clone()
        };
        self.store.save_session(&updated)?;
        Ok(updated)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn public_request(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }
}

async fn send_auth_request(request: RequestBuilder) -> AuthResult<SupabaseAuthResponse> {
    let response = request.send().await?;
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::Api(api_error_message(status, &body)));
    }
    Ok(response.json::<SupabaseAuthResponse>().await?)
}

pub fn normalize_auth_url(url: &str) -> AuthResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must not be empty",
        ));
    }
    if !crate::util::is_http_url(trimmed) {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must include http:// or https://",
        ));
    }
    if trimmed.ends_with("/auth/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/auth/v1"))
    }
}

fn validate_credentials(email: &str, password: &str) -> AuthResult<()> {
    if email.trim().is_empty() {
        return Err(AuthError::Api("Email is required".to_string()));
    }
    if password.trim().is_empty() {
        return Err(AuthError::Api("Password is required".to_string()));
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
struct CallbackTokens {
    access_token: String,
    refresh_token: String,
    expires_at: i64,
}

/// Read the session tokens GoTrue appends to the redirect URL, from the
/// fragment (implicit flow) or the query string.
fn parse_callback_url(callback_url: &str) -> AuthResult<CallbackTokens> {
    let url = Url::parse(callback_url.trim())
        .map_err(|error| AuthError::Callback(format!("invalid callback URL: {error}")))?;

    let fragment_pairs = url
        .fragment()
        .map(|fragment| {
            url::form_urlencoded::parse(fragment.as_bytes())
                .into_owned()
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let query_pairs = url.query_pairs().into_owned().collect::<Vec<_>>();
    let lookup = |name: &str| {
        fragment_pairs
            .iter()
            .chain(query_pairs.iter())
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| normalize_text_option(Some(value.clone())))
    };

    if let Some(error) = lookup("error_description").or_else(|| lookup("error")) {
        return Err(AuthError::Callback(error));
    }

    let access_token = lookup("access_token")
        .ok_or_else(|| AuthError::Callback("callback is missing access_token".to_string()))?;
    let refresh_token = lookup("refresh_token")
        .ok_or_else(|| AuthError::Callback("callback is missing refresh_token".to_string()))?;
    let expires_at = lookup("expires_at")
        .and_then(|value| value.parse::<i64>().ok())
        .or_else(|| {
            lookup("expires_in")
                .and_then(|value| value.parse::<i64>().ok())
                .map(|expires_in| unix_timestamp_now().saturating_add(expires_in))
        })
        .ok_or_else(|| AuthError::Callback("callback is missing token expiry".to_string()))?;

    Ok(CallbackTokens {
        access_token,
        refresh_token,
        expires_at,
    })
}

#[derive(Debug, Deserialize)]
struct SupabaseAuthResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<SupabaseUser>,
    session: Option<SupabaseAuthResponseSession>,
}

impl SupabaseAuthResponse {
    fn into_session(self) -> AuthResult<Option<AuthSession>> {
        let nested = self.session;
        let access_token = self
            .access_token
            .or_else(|| nested.as_ref().and_then(|session| session.access_token.clone()));
        let refresh_token = self
            .refresh_token
            .or_else(|| nested.as_ref().and_then(|session| session.refresh_token.clone()));
        let expires_in = self
            .expires_in
            .or_else(|| nested.as_ref().and_then(|session| session.expires_in));
        let expires_at = self
            .expires_at
            .or_else(|| nested.as_ref().and_then(|session| session.expires_at))
            .or_else(|| expires_in.map(|seconds| unix_timestamp_now().saturating_add(seconds)));
        let user = self
            .user
            .or_else(|| nested.and_then(|session| session.user))
            .map(Into::into);

        match (access_token, refresh_token, expires_at, user) {
            (Some(access_token), Some(refresh_token), Some(expires_at), Some(user)) => {
                Ok(Some(AuthSession {
                    access_token,
                    refresh_token,
                    expires_at,
                    user,
                }))
            }
            (None, None, None, Some(_)) => Ok(None),
            _ => Err(AuthError::Api(
                "Auth response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseAuthResponseSession {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<SupabaseUser>,
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<UserMetadata>,
}

impl From<SupabaseUser> for AuthUser {
    fn from(value: SupabaseUser) -> Self {
        Self {
            id: value.id,
            email: value.email,
            metadata: value.user_metadata.unwrap_or_default(),
        }
    }
}
