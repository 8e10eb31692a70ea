//! Client configuration for the remote backend.
//!
//! Supabase settings come from the environment. Leaving both unset runs the
//! planner in local-only mode; setting only one of them is an error.

use serde::{Deserialize, Serialize};

use crate::auth::{SessionPersistence, SupabaseAuthClient};
use crate::remote::SupabaseGateway;
use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
pub const SUPABASE_ANON_KEY_ENV: &str = "SUPABASE_ANON_KEY";
pub const RECIPE_BUCKET_ENV: &str = "BREKKIE_RECIPE_BUCKET";
pub const AVATAR_BUCKET_ENV: &str = "BREKKIE_AVATAR_BUCKET";

pub const DEFAULT_RECIPE_BUCKET: &str = "recipe-images";
pub const DEFAULT_AVATAR_BUCKET: &str = "avatars";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    #[serde(default = "default_recipe_bucket")]
    pub recipe_bucket: String,
    #[serde(default = "default_avatar_bucket")]
    pub avatar_bucket: String,
}

fn default_recipe_bucket() -> String {
    DEFAULT_RECIPE_BUCKET.to_string()
}

fn default_avatar_bucket() -> String {
    DEFAULT_AVATAR_BUCKET.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_anon_key: None,
            recipe_bucket: default_recipe_bucket(),
            avatar_bucket: default_avatar_bucket(),
        }
    }
}

impl ClientConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            supabase_url: normalize_text_option(lookup(SUPABASE_URL_ENV)),
            supabase_anon_key: normalize_text_option(lookup(SUPABASE_ANON_KEY_ENV)),
            recipe_bucket: normalize_text_option(lookup(RECIPE_BUCKET_ENV))
                .unwrap_or_else(default_recipe_bucket),
            avatar_bucket: normalize_text_option(lookup(AVATAR_BUCKET_ENV))
                .unwrap_or_else(default_avatar_bucket),
        };
        config.validate()?;
        Ok(config)
    }

    /// Fill unset fields from `fallback` (e.g. a saved CLI profile).
    #[must_use]
    pub fn or(self, fallback: &Self) -> Self {
        let (supabase_url, supabase_anon_key) = if self.supabase().is_some() {
            (self.supabase_url, self.supabase_anon_key)
        } else {
            (
                self.supabase_url.or_else(|| fallback.supabase_url.clone()),
                self.supabase_anon_key
                    .or_else(|| fallback.supabase_anon_key.clone()),
            )
        };
        Self {
            supabase_url,
            supabase_anon_key,
            recipe_bucket: self.recipe_bucket,
            avatar_bucket: self.avatar_bucket,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match (&self.supabase_url, &self.supabase_anon_key) {
            (None, None) => {}
            (Some(url), Some(_)) => {
                if !is_http_url(url) {
                    return Err(Error::InvalidInput(format!(
                        "{SUPABASE_URL_ENV} must include http:// or https://"
                    )));
                }
            }
            _ => {
                return Err(Error::InvalidInput(format!(
                    "{SUPABASE_URL_ENV} and {SUPABASE_ANON_KEY_ENV} must be set together"
                )));
            }
        }
        if self.recipe_bucket.trim().is_empty() || self.avatar_bucket.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Storage bucket names must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Supabase URL and anon key, when the remote backend is configured.
    pub fn supabase(&self) -> Option<(&str, &str)> {
        match (&self.supabase_url, &self.supabase_anon_key) {
            (Some(url), Some(key)) => Some((url.as_str(), key.as_str())),
            _ => None,
        }
    }

    pub fn is_remote_enabled(&self) -> bool {
        self.supabase().is_some()
    }

    pub fn gateway(&self) -> Result<SupabaseGateway> {
        let (url, key) = self.supabase().ok_or(Error::NotConfigured)?;
        Ok(SupabaseGateway::new(url, key)?)
    }

    pub fn auth_client<S: SessionPersistence>(&self, store: S) -> Result<SupabaseAuthClient<S>> {
        let (url, key) = self.supabase().ok_or(Error::NotConfigured)?;
        Ok(SupabaseAuthClient::new(url, key, store)?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn empty_environment_means_local_only() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert!(!config.is_remote_enabled());
        assert!(matches!(config.gateway(), Err(Error::NotConfigured)));
    }

    #[test]
    fn full_environment_enables_remote() {
        let config = ClientConfig::from_lookup(lookup(&[
            (SUPABASE_URL_ENV, "https://demo.supabase.co"),
            (SUPABASE_ANON_KEY_ENV, " anon "),
            (RECIPE_BUCKET_ENV, "images"),
        ]))
        .unwrap();
        assert_eq!(config.supabase(), Some(("https://demo.supabase.co", "anon")));
        assert_eq!(config.recipe_bucket, "images");
        assert_eq!(config.avatar_bucket, DEFAULT_AVATAR_BUCKET);
        assert!(config.gateway().is_ok());
    }

    #[test]
    fn partial_environment_is_rejected() {
        let result =
            ClientConfig::from_lookup(lookup(&[(SUPABASE_URL_ENV, "https://demo.supabase.co")]));
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        let result = ClientConfig::from_lookup(lookup(&[
            (SUPABASE_URL_ENV, "demo.supabase.co"),
            (SUPABASE_ANON_KEY_ENV, "anon"),
        ]));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn profile_fills_missing_supabase_settings() {
        let saved = ClientConfig {
            supabase_url: Some("https://saved.supabase.co".to_string()),
            supabase_anon_key: Some("saved".to_string()),
            ..ClientConfig::default()
        };
        let merged = ClientConfig::default().or(&saved);
        assert_eq!(merged.supabase(), Some(("https://saved.supabase.co", "saved")));
    }
}
