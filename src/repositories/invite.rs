// src/repositories/invite.rs - Data access
use async_trait::async_trait;
use log::{debug, error};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::{Database, DatabaseHealth};
use crate::errors::RepositoryError;
use crate::models::{Invite, InvitePatch};

pub type Result<T> = std::result::Result<T, RepositoryError>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InviteRepositoryTrait: Send + Sync {
    /// Finds an invite by its short code
    ///
    /// ### Errors
    /// * `RepositoryError::Database` - If a database error occurs
    async fn find_by_code(&self, code: &str) -> Result<Option<Invite>>;

    /// Finds an invite by its bearer token
    ///
    /// ### Errors
    /// * `RepositoryError::Database` - If a database error occurs
    async fn find_by_token(&self, token: &str) -> Result<Option<Invite>>;

    /// Finds an invite created from `ip` that points at `url`
    ///
    /// ### Errors
    /// * `RepositoryError::Database` - If a database error occurs
    async fn find_by_url_and_ip(&self, url: &str, ip: &str) -> Result<Option<Invite>>;

    /// Inserts a new invite
    ///
    /// ### Errors
    /// * `RepositoryError::Conflict` - If the code or token is already taken
    /// * `RepositoryError::Database` - If a database error occurs
    async fn insert(&self, invite: &Invite) -> Result<()>;

    /// Applies `patch` to the invite owning `token` and returns the updated record
    ///
    /// ### Errors
    /// * `RepositoryError::NotFound` - If no invite owns the token
    /// * `RepositoryError::Conflict` - If the new code is already taken
    /// * `RepositoryError::Database` - If a database error occurs
    async fn update_by_token(&self, token: &str, patch: &InvitePatch) -> Result<Invite>;

    /// Reports whether the backing store is reachable
    async fn health_check(&self) -> DatabaseHealth;
}

// Implementation using actual database
pub struct InviteRepository {
    db: Database,
}

impl InviteRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn pool(&self) -> &PgPool {
        self.db.get_pool()
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<Invite>> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT code, token, url, ip FROM invites WHERE ");
        builder.push(column).push(" = ").push_bind(value.to_string());
        builder.push(" LIMIT 1");

        builder
            .build_query_as::<Invite>()
            .fetch_optional(self.pool())
            .await
            .map_err(RepositoryError::from)
    }
}

#[async_trait]
impl InviteRepositoryTrait for InviteRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<Invite>> {
        self.find_one("code", code).await
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Invite>> {
        self.find_one("token", token).await
    }

    async fn find_by_url_and_ip(&self, url: &str, ip: &str) -> Result<Option<Invite>> {
        sqlx::query_as::<_, Invite>(
            r#"
            SELECT code, token, url, ip
            FROM invites
            WHERE url = $1 AND ip = $2
            LIMIT 1
            "#,
        )
        .bind(url)
        .bind(ip)
        .fetch_optional(self.pool())
        .await
        .map_err(RepositoryError::from)
    }

    async fn insert(&self, invite: &Invite) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO invites (code, token, url, ip)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&invite.code)
        .bind(&invite.token)
        .bind(&invite.url)
        .bind(&invite.ip)
        .execute(self.pool())
        .await
        .map_err(|e| {
            error!("Failed to insert invite '{}': {}", invite.code, e);
            RepositoryError::from(e)
        })?;

        Ok(())
    }

    async fn update_by_token(&self, token: &str, patch: &InvitePatch) -> Result<Invite> {
        debug!("Updating invite with patch: {:?}", patch);

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE invites SET ");
        let mut separated = builder.separated(", ");

        separated.push("url = ").push_bind_unseparated(patch.url.clone());

        if let Some(code) = &patch.code {
            separated.push("code = ").push_bind_unseparated(code.clone());
        }

        builder.push(" WHERE token = ").push_bind(token.to_string());
        builder.push(" RETURNING code, token, url, ip");

        builder
            .build_query_as::<Invite>()
            .fetch_optional(self.pool())
            .await
            .map_err(|e| {
                error!("Failed to update invite: {}", e);
                RepositoryError::from(e)
            })?
            .ok_or_else(|| RepositoryError::NotFound("No invite owns this token".to_string()))
    }

    async fn health_check(&self) -> DatabaseHealth {
        self.db.health_check().await
    }
}
