//! User model - an authenticated subject.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A user belongs to exactly one organization (`owner`).
///
/// `owner`, `name` and `id` are mandatory when decoding; this is what lets a
/// full claim set be told apart from a short `{owner, name}` one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub owner: String,
    pub name: String,
    pub id: String,
    #[serde(default)]
    pub created_time: DateTime<Utc>,
    #[serde(rename = "type", default)]
    pub user_type: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub affiliation: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_global_admin: bool,
    #[serde(default)]
    pub is_forbidden: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub signup_application: String,
}

impl User {
    pub fn new(owner: &str, name: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            id: crate::utils::generate_id(),
            created_time: Utc::now(),
            user_type: "normal-user".to_string(),
            password: String::new(),
            display_name: name.to_string(),
            avatar: String::new(),
            email: String::new(),
            phone: String::new(),
            affiliation: String::new(),
            tag: String::new(),
            region: String::new(),
            language: String::new(),
            score: 0,
            is_admin: false,
            is_global_admin: false,
            is_forbidden: false,
            is_deleted: false,
            signup_application: String::new(),
        }
    }

    pub fn full_id(&self) -> String {
        crate::utils::join_owner_name(&self.owner, &self.name)
    }

    /// Copy safe to hand out: password cleared.
    pub fn sanitized(&self) -> Self {
        Self {
            password: String::new(),
            ..self.clone()
        }
    }

    pub fn short(&self) -> UserShort {
        UserShort {
            owner: self.owner.clone(),
            name: self.name.clone(),
        }
    }
}

/// The two-field identity embedded by short-format tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserShort {
    pub owner: String,
    pub name: String,
}
