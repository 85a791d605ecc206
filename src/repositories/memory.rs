use async_trait::async_trait;
use tokio::sync::RwLock;

use super::invite::{InviteRepositoryTrait, Result};
use crate::db::{DBHealthStatus, DatabaseHealth};
use crate::errors::RepositoryError;
use crate::models::{Invite, InvitePatch};

/// Process-local invite store for development and tests. Contents are lost
/// on restart.
#[derive(Default)]
pub struct InMemoryInviteRepository {
    invites: RwLock<Vec<Invite>>,
}

impl InMemoryInviteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn find_where<F>(&self, predicate: F) -> Result<Option<Invite>>
    where
        F: Fn(&Invite) -> bool + Send,
    {
        let invites = self.invites.read().await;
        Ok(invites.iter().find(|invite| predicate(invite)).cloned())
    }
}

#[async_trait]
impl InviteRepositoryTrait for InMemoryInviteRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<Invite>> {
        self.find_where(|invite| invite.code == code).await
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Invite>> {
        self.find_where(|invite| invite.token == token).await
    }

    async fn find_by_url_and_ip(&self, url: &str, ip: &str) -> Result<Option<Invite>> {
        self.find_where(|invite| invite.url == url && invite.ip == ip).await
    }

    async fn insert(&self, invite: &Invite) -> Result<()> {
        let mut invites = self.invites.write().await;

        if invites.iter().any(|existing| existing.code == invite.code) {
            return Err(RepositoryError::Conflict(format!("Code '{}' is taken", invite.code)));
        }
        if invites.iter().any(|existing| existing.token == invite.token) {
            return Err(RepositoryError::Conflict("Token is taken".to_string()));
        }

        invites.push(invite.clone());
        Ok(())
    }

    async fn update_by_token(&self, token: &str, patch: &InvitePatch) -> Result<Invite> {
        let mut invites = self.invites.write().await;

        let index = invites
            .iter()
            .position(|invite| invite.token == token)
            .ok_or_else(|| RepositoryError::NotFound("No invite owns this token".to_string()))?;

        if let Some(code) = &patch.code {
            if invites.iter().any(|existing| existing.code == *code && existing.token != token) {
                return Err(RepositoryError::Conflict(format!("Code '{}' is taken", code)));
            }
        }

        let invite = &mut invites[index];
        invite.url = patch.url.clone();
        if let Some(code) = &patch.code {
            invite.code = code.clone();
        }

        Ok(invite.clone())
    }

    async fn health_check(&self) -> DatabaseHealth {
        DatabaseHealth {
            status: DBHealthStatus::Healthy,
            response_time_ms: 0,
            message: Some("in-memory store".to_string()),
            db_info: None,
        }
    }
}
