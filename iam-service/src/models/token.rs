//! Token model - one row per issued authorization grant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub owner: String,
    pub name: String,
    pub created_time: DateTime<Utc>,
    pub application: String,
    pub organization: String,
    #[sqlx(rename = "user_name")]
    pub user: String,
    pub code: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Minutes.
    pub expires_in: i64,
    pub scope: String,
    pub token_type: String,
    pub code_challenge: String,
    pub code_consumed: bool,
    pub refresh_revoked: bool,
}

/// Token endpoint response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenWrapper {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub scope: String,
}

impl TokenWrapper {
    pub fn from_token(token: &Token) -> Self {
        Self {
            access_token: token.access_token.clone(),
            id_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            token_type: token.token_type.clone(),
            expires_in: token.expires_in,
            scope: token.scope.clone(),
        }
    }

    /// Legacy error shape: message in `access_token`, every other field empty.
    pub fn error(message: impl std::fmt::Display) -> Self {
        Self {
            access_token: format!("error: {}", message),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.access_token.starts_with("error: ")
    }
}

/// Authorization code endpoint response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Code {
    pub code: String,
    pub message: String,
}

impl Code {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            code: String::new(),
            message: message.into(),
        }
    }
}
