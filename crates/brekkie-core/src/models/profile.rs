//! User profile model

use serde::{Deserialize, Serialize};

use crate::util::normalize_text_option;

/// Greeting used when a profile has neither a display name nor a username.
pub const DEFAULT_GREETING_NAME: &str = "there";

/// A row of the remote `profiles` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl UserProfile {
    /// Name to greet the user with: display name, then username, then "there".
    #[must_use]
    pub fn greeting_name(&self) -> String {
        normalize_text_option(self.display_name.clone())
            .or_else(|| normalize_text_option(self.username.clone()))
            .unwrap_or_else(|| DEFAULT_GREETING_NAME.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_name_prefers_display_name() {
        let profile = UserProfile {
            id: "user".to_string(),
            username: Some("sunny".to_string()),
            display_name: Some(" Sunny Side ".to_string()),
            avatar_url: None,
        };
        assert_eq!(profile.greeting_name(), "Sunny Side");
    }

    #[test]
    fn greeting_name_falls_back_to_default() {
        let profile = UserProfile {
            id: "user".to_string(),
            display_name: Some("   ".to_string()),
            ..UserProfile::default()
        };
        assert_eq!(profile.greeting_name(), DEFAULT_GREETING_NAME);
    }
}
