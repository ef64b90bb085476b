//! PostgreSQL credential and rule store.

use async_trait::async_trait;
use sqlx::postgres::PgPool;

use super::error::StoreError;
use super::store::{CredentialStore, PolicyRuleStore};
use crate::models::{Application, Cert, PolicyRule, Token, User};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TOKEN_COLUMNS: &str = "owner, name, created_time, application, organization, user_name, \
     code, access_token, refresh_token, expires_in, scope, token_type, code_challenge, \
     code_consumed, refresh_revoked";

async fn insert_token_with<'e, E>(executor: E, token: &Token) -> Result<(), sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO tokens (owner, name, created_time, application, organization, user_name,
                            code, access_token, refresh_token, expires_in, scope, token_type,
                            code_challenge, code_consumed, refresh_revoked)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        "#,
    )
    .bind(&token.owner)
    .bind(&token.name)
    .bind(token.created_time)
    .bind(&token.application)
    .bind(&token.organization)
    .bind(&token.user)
    .bind(&token.code)
    .bind(&token.access_token)
    .bind(&token.refresh_token)
    .bind(token.expires_in)
    .bind(&token.scope)
    .bind(&token.token_type)
    .bind(&token.code_challenge)
    .bind(token.code_consumed)
    .bind(token.refresh_revoked)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl CredentialStore for Database {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(|e| {
            tracing::error!("Database health check failed: {}", e);
            StoreError::from(e)
        })?;
        Ok(())
    }

    async fn get_application(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<Application>, StoreError> {
        Ok(
            sqlx::query_as::<_, Application>(
                "SELECT * FROM applications WHERE owner = $1 AND name = $2",
            )
            .bind(owner)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?,
        )
    }

    async fn get_application_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<Application>, StoreError> {
        Ok(
            sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE client_id = $1")
                .bind(client_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn insert_application(&self, application: &Application) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO applications (owner, name, created_time, display_name, organization, cert,
                                      client_id, client_secret, redirect_uris, expire_in_hours,
                                      refresh_expire_in_hours, token_format)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (owner, name) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                organization = EXCLUDED.organization,
                cert = EXCLUDED.cert,
                client_id = EXCLUDED.client_id,
                client_secret = EXCLUDED.client_secret,
                redirect_uris = EXCLUDED.redirect_uris,
                expire_in_hours = EXCLUDED.expire_in_hours,
                refresh_expire_in_hours = EXCLUDED.refresh_expire_in_hours,
                token_format = EXCLUDED.token_format
            "#,
        )
        .bind(&application.owner)
        .bind(&application.name)
        .bind(application.created_time)
        .bind(&application.display_name)
        .bind(&application.organization)
        .bind(&application.cert)
        .bind(&application.client_id)
        .bind(&application.client_secret)
        .bind(&application.redirect_uris)
        .bind(application.expire_in_hours)
        .bind(application.refresh_expire_in_hours)
        .bind(application.token_format.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_user(&self, owner: &str, name: &str) -> Result<Option<User>, StoreError> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE owner = $1 AND name = $2")
                .bind(owner)
                .bind(name)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (owner, name, id, created_time, user_type, password, display_name,
                               avatar, email, phone, affiliation, tag, region, language, score,
                               is_admin, is_global_admin, is_forbidden, is_deleted,
                               signup_application)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20)
            ON CONFLICT (owner, name) DO UPDATE SET
                user_type = EXCLUDED.user_type,
                password = EXCLUDED.password,
                display_name = EXCLUDED.display_name,
                avatar = EXCLUDED.avatar,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                affiliation = EXCLUDED.affiliation,
                tag = EXCLUDED.tag,
                region = EXCLUDED.region,
                language = EXCLUDED.language,
                score = EXCLUDED.score,
                is_admin = EXCLUDED.is_admin,
                is_global_admin = EXCLUDED.is_global_admin,
                is_forbidden = EXCLUDED.is_forbidden,
                is_deleted = EXCLUDED.is_deleted,
                signup_application = EXCLUDED.signup_application
            "#,
        )
        .bind(&user.owner)
        .bind(&user.name)
        .bind(&user.id)
        .bind(user.created_time)
        .bind(&user.user_type)
        .bind(&user.password)
        .bind(&user.display_name)
        .bind(&user.avatar)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.affiliation)
        .bind(&user.tag)
        .bind(&user.region)
        .bind(&user.language)
        .bind(user.score)
        .bind(user.is_admin)
        .bind(user.is_global_admin)
        .bind(user.is_forbidden)
        .bind(user.is_deleted)
        .bind(&user.signup_application)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_cert(&self, owner: &str, name: &str) -> Result<Option<Cert>, StoreError> {
        Ok(
            sqlx::query_as::<_, Cert>("SELECT * FROM certs WHERE owner = $1 AND name = $2")
                .bind(owner)
                .bind(name)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn insert_cert(&self, cert: &Cert) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO certs (owner, name, created_time, display_name, scope, cert_type,
                               crypto_algorithm, bit_size, expire_in_years, public_key, private_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (owner, name) DO UPDATE SET
                public_key = EXCLUDED.public_key,
                private_key = EXCLUDED.private_key,
                bit_size = EXCLUDED.bit_size
            "#,
        )
        .bind(&cert.owner)
        .bind(&cert.name)
        .bind(cert.created_time)
        .bind(&cert.display_name)
        .bind(&cert.scope)
        .bind(&cert.cert_type)
        .bind(&cert.crypto_algorithm)
        .bind(cert.bit_size)
        .bind(cert.expire_in_years)
        .bind(&cert.public_key)
        .bind(&cert.private_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_token_by_code(&self, code: &str) -> Result<Option<Token>, StoreError> {
        Ok(sqlx::query_as::<_, Token>(&format!(
            "SELECT {} FROM tokens WHERE code = $1",
            TOKEN_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn get_token_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<Token>, StoreError> {
        Ok(sqlx::query_as::<_, Token>(&format!(
            "SELECT {} FROM tokens WHERE refresh_token = $1 ORDER BY created_time LIMIT 1",
            TOKEN_COLUMNS
        ))
        .bind(refresh_token)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_token(&self, token: &Token) -> Result<(), StoreError> {
        insert_token_with(&self.pool, token).await?;
        Ok(())
    }

    async fn consume_code(&self, code: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE tokens SET code_consumed = TRUE WHERE code = $1 AND code_consumed = FALSE",
        )
        .bind(code)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn rotate_token(
        &self,
        refresh_token: &str,
        replacement: &Token,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let revoked = sqlx::query(
            "UPDATE tokens SET refresh_revoked = TRUE \
             WHERE refresh_token = $1 AND refresh_revoked = FALSE",
        )
        .bind(refresh_token)
        .execute(&mut *tx)
        .await?;

        if revoked.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_token_with(&mut *tx, replacement).await?;
        tx.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl PolicyRuleStore for Database {
    async fn load_rules(&self) -> Result<Vec<PolicyRule>, StoreError> {
        Ok(sqlx::query_as::<_, PolicyRule>(
            "SELECT sub_owner, sub_name, method, url_path, obj_owner, obj_name \
             FROM policy_rules ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn replace_rules(&self, rules: &[PolicyRule]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM policy_rules")
            .execute(&mut *tx)
            .await?;

        for rule in rules {
            sqlx::query(
                r#"
                INSERT INTO policy_rules (sub_owner, sub_name, method, url_path, obj_owner, obj_name)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(&rule.sub_owner)
            .bind(&rule.sub_name)
            .bind(&rule.method)
            .bind(&rule.url_path)
            .bind(&rule.obj_owner)
            .bind(&rule.obj_name)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
