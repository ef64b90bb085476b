//! Credential and rule store contracts, plus the in-memory backend used in
//! development and tests.

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

use super::error::StoreError;
use crate::models::{Application, Cert, PolicyRule, Token, User};

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    async fn get_application(&self, owner: &str, name: &str)
        -> Result<Option<Application>, StoreError>;

    async fn get_application_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<Application>, StoreError>;

    async fn insert_application(&self, application: &Application) -> Result<(), StoreError>;

    async fn get_user(&self, owner: &str, name: &str) -> Result<Option<User>, StoreError>;

    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    async fn get_cert(&self, owner: &str, name: &str) -> Result<Option<Cert>, StoreError>;

    async fn insert_cert(&self, cert: &Cert) -> Result<(), StoreError>;

    async fn get_token_by_code(&self, code: &str) -> Result<Option<Token>, StoreError>;

    async fn get_token_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<Token>, StoreError>;

    async fn insert_token(&self, token: &Token) -> Result<(), StoreError>;

    /// Marks the code as exchanged. Returns `false` when it already was, or
    /// does not exist.
    async fn consume_code(&self, code: &str) -> Result<bool, StoreError>;

    /// Revokes `refresh_token` and inserts `replacement` in one step.
    /// Returns `false` without inserting when the refresh token was already
    /// revoked; at most one of several concurrent callers wins.
    async fn rotate_token(
        &self,
        refresh_token: &str,
        replacement: &Token,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait PolicyRuleStore: Send + Sync {
    async fn load_rules(&self) -> Result<Vec<PolicyRule>, StoreError>;

    /// Replaces the stored rule set wholesale.
    async fn replace_rules(&self, rules: &[PolicyRule]) -> Result<(), StoreError>;
}

#[derive(Default)]
struct Tables {
    applications: Vec<Application>,
    users: Vec<User>,
    certs: Vec<Cert>,
    tokens: Vec<Token>,
    rules: Vec<PolicyRule>,
}

/// Mutex-guarded tables. Inserts replace a row with the same `owner/name`.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("memory store mutex poisoned: {}", e)))
    }

    pub fn token_count(&self) -> Result<usize, StoreError> {
        Ok(self.tables()?.tokens.len())
    }
}

fn upsert<T: Clone>(rows: &mut Vec<T>, row: &T, same: impl Fn(&T) -> bool) {
    match rows.iter_mut().find(|existing| same(existing)) {
        Some(existing) => *existing = row.clone(),
        None => rows.push(row.clone()),
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.tables().map(|_| ())
    }

    async fn get_application(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<Application>, StoreError> {
        Ok(self
            .tables()?
            .applications
            .iter()
            .find(|a| a.owner == owner && a.name == name)
            .cloned())
    }

    async fn get_application_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<Application>, StoreError> {
        Ok(self
            .tables()?
            .applications
            .iter()
            .find(|a| a.client_id == client_id)
            .cloned())
    }

    async fn insert_application(&self, application: &Application) -> Result<(), StoreError> {
        upsert(&mut self.tables()?.applications, application, |a| {
            a.owner == application.owner && a.name == application.name
        });
        Ok(())
    }

    async fn get_user(&self, owner: &str, name: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .tables()?
            .users
            .iter()
            .find(|u| u.owner == owner && u.name == name)
            .cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        upsert(&mut self.tables()?.users, user, |u| {
            u.owner == user.owner && u.name == user.name
        });
        Ok(())
    }

    async fn get_cert(&self, owner: &str, name: &str) -> Result<Option<Cert>, StoreError> {
        Ok(self
            .tables()?
            .certs
            .iter()
            .find(|c| c.owner == owner && c.name == name)
            .cloned())
    }

    async fn insert_cert(&self, cert: &Cert) -> Result<(), StoreError> {
        upsert(&mut self.tables()?.certs, cert, |c| {
            c.owner == cert.owner && c.name == cert.name
        });
        Ok(())
    }

    async fn get_token_by_code(&self, code: &str) -> Result<Option<Token>, StoreError> {
        Ok(self
            .tables()?
            .tokens
            .iter()
            .find(|t| t.code == code)
            .cloned())
    }

    async fn get_token_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<Token>, StoreError> {
        Ok(self
            .tables()?
            .tokens
            .iter()
            .find(|t| t.refresh_token == refresh_token)
            .cloned())
    }

    async fn insert_token(&self, token: &Token) -> Result<(), StoreError> {
        upsert(&mut self.tables()?.tokens, token, |t| {
            t.owner == token.owner && t.name == token.name
        });
        Ok(())
    }

    async fn consume_code(&self, code: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables()?;
        match tables
            .tokens
            .iter_mut()
            .find(|t| t.code == code && !t.code_consumed)
        {
            Some(token) => {
                token.code_consumed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn rotate_token(
        &self,
        refresh_token: &str,
        replacement: &Token,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables()?;
        let Some(current) = tables
            .tokens
            .iter_mut()
            .find(|t| t.refresh_token == refresh_token && !t.refresh_revoked)
        else {
            return Ok(false);
        };

        current.refresh_revoked = true;
        upsert(&mut tables.tokens, replacement, |t| {
            t.owner == replacement.owner && t.name == replacement.name
        });
        Ok(true)
    }
}

#[async_trait]
impl PolicyRuleStore for MemoryStore {
    async fn load_rules(&self) -> Result<Vec<PolicyRule>, StoreError> {
        Ok(self.tables()?.rules.clone())
    }

    async fn replace_rules(&self, rules: &[PolicyRule]) -> Result<(), StoreError> {
        self.tables()?.rules = rules.to_vec();
        Ok(())
    }
}
