//! Application model - an OAuth client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::utils::{generate_client_id, generate_client_secret, join_owner_name};

/// Claim shape an application's tokens carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenFormat {
    /// Whole user record plus registered claims.
    #[default]
    #[serde(rename = "JWT")]
    Full,
    /// Only `{owner, name}` plus registered claims.
    #[serde(rename = "JWT-Empty", alias = "Short")]
    Short,
}

impl TokenFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenFormat::Full => "JWT",
            TokenFormat::Short => "JWT-Empty",
        }
    }
}

impl From<String> for TokenFormat {
    fn from(value: String) -> Self {
        match value.as_str() {
            "JWT-Empty" | "Short" | "short" => TokenFormat::Short,
            _ => TokenFormat::Full,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub owner: String,
    pub name: String,
    pub created_time: DateTime<Utc>,
    pub display_name: String,
    pub organization: String,
    /// Signing cert name; `None` selects the system default.
    pub cert: Option<String>,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uris: Vec<String>,
    pub expire_in_hours: i64,
    pub refresh_expire_in_hours: i64,
    #[sqlx(try_from = "String")]
    pub token_format: TokenFormat,
}

impl Application {
    /// A fresh client with random credentials and a one-week token lifetime.
    pub fn new(owner: &str, name: &str, organization: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            created_time: Utc::now(),
            display_name: name.to_string(),
            organization: organization.to_string(),
            cert: None,
            client_id: generate_client_id(),
            client_secret: generate_client_secret(),
            redirect_uris: Vec::new(),
            expire_in_hours: 168,
            refresh_expire_in_hours: 168,
            token_format: TokenFormat::Full,
        }
    }

    pub fn full_id(&self) -> String {
        join_owner_name(&self.owner, &self.name)
    }

    /// Copy suitable for rendering to an unauthenticated caller.
    pub fn masked(&self) -> Self {
        Self {
            client_secret: String::new(),
            ..self.clone()
        }
    }

    /// Entries are matched by substring, so `https://app.example.com` admits
    /// every callback under that origin.
    pub fn allows_redirect_uri(&self, redirect_uri: &str) -> bool {
        self.redirect_uris
            .iter()
            .any(|allowed| redirect_uri.contains(allowed.as_str()))
    }
}
