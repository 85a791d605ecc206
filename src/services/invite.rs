// src/services/invite.rs - Business logic
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::db::DatabaseHealth;
use crate::errors::{ApiError, RepositoryError};
use crate::models::{
    CreateInviteDto, CreatedInviteResponse, Invite, InvitePatch, UpdateInviteDto,
    UpdatedInviteResponse,
};
use crate::repositories::InviteRepositoryTrait;
use crate::utils::id_generator;
use crate::validations::{is_code_shaped, validate_discord_url, validate_vanity_code};

use super::rate_limiter::{CreationRateLimiter, RateLimitStatus};

type Result<T> = std::result::Result<T, ApiError>;

#[async_trait]
pub trait InviteServiceTrait {
    /// Registers a new invite for `ip`
    async fn create(&self, dto: CreateInviteDto, ip: &str) -> Result<CreatedInviteResponse>;

    /// Repoints (and optionally re-codes) the invite owning the token
    async fn update(&self, dto: UpdateInviteDto, ip: &str) -> Result<UpdatedInviteResponse>;

    /// Target URL for a redirect path segment, if any
    async fn resolve(&self, code: &str) -> Result<Option<String>>;

    async fn store_health(&self) -> DatabaseHealth;
}

pub struct InviteService {
    repository: Arc<dyn InviteRepositoryTrait>,
    rate_limiter: Arc<CreationRateLimiter>,
    bot_secret: Option<String>,
}

impl InviteService {
    pub fn new(
        repository: Arc<dyn InviteRepositoryTrait>,
        rate_limiter: Arc<CreationRateLimiter>,
        bot_secret: Option<String>,
    ) -> Self {
        Self {
            repository,
            rate_limiter,
            bot_secret,
        }
    }

    /// Callers holding the bot secret skip the vanity rate limit and the
    /// per-server invite limit
    fn is_privileged(&self, bot_secret: Option<&str>) -> bool {
        matches!(
            (self.bot_secret.as_deref(), bot_secret),
            (Some(expected), Some(given)) if expected == given
        )
    }

    /// Re-rolls until the code is not in the store
    pub async fn generate_unique_code(&self) -> Result<String> {
        let mut code = id_generator::generate_code();
        while self.repository.find_by_code(&code).await?.is_some() {
            debug!("Generated code '{}' collided, re-rolling", code);
            code = id_generator::generate_code();
        }
        Ok(code)
    }

    /// Re-rolls until the token is not in the store
    pub async fn generate_unique_token(&self) -> Result<String> {
        let mut token = id_generator::generate_token();
        while self.repository.find_by_token(&token).await?.is_some() {
            token = id_generator::generate_token();
        }
        Ok(token)
    }

    /// One invite per server per address. `except_token` excludes the
    /// invite being updated.
    async fn enforce_invite_limit(&self, url: &str, ip: &str, except_token: Option<&str>) -> Result<()> {
        match self.repository.find_by_url_and_ip(url, ip).await? {
            Some(existing) if Some(existing.token.as_str()) != except_token => {
                info!("Address {} already has an invite for {}", ip, url);
                Err(ApiError::InviteLimit)
            }
            _ => Ok(()),
        }
    }

    /// Cooldown, character set, keyword and uniqueness rules for a vanity code.
    /// Returns whether a cooldown slot was reserved for `ip`.
    async fn check_vanity_code(&self, code: &str, ip: &str, privileged: bool) -> Result<bool> {
        if !privileged {
            if let RateLimitStatus::Limited { remaining_minutes } =
                self.rate_limiter.check_and_reserve(ip).await
            {
                info!(
                    "Vanity code creation from {} rate limited for {} more minutes",
                    ip, remaining_minutes
                );
                return Err(ApiError::CreationRatelimit {
                    resource: "invite",
                    remaining_minutes,
                });
            }
        }

        let reserved = !privileged;
        let available = self.check_code_available(code).await;
        self.settle(ip, reserved, available).await?;

        Ok(reserved)
    }

    async fn check_code_available(&self, code: &str) -> Result<()> {
        validate_vanity_code(code)?;

        if self.repository.find_by_code(code).await?.is_some() {
            return Err(ApiError::Exists("invite_code"));
        }

        Ok(())
    }

    /// Hands a reserved cooldown back when the vanity change failed
    async fn settle<T>(&self, ip: &str, reserved: bool, result: Result<T>) -> Result<T> {
        if reserved && result.is_err() {
            self.rate_limiter.release(ip).await;
        }
        result
    }

    async fn insert_invite(&self, code: String, url: String, ip: &str) -> Result<Invite> {
        let invite = Invite {
            code,
            token: self.generate_unique_token().await?,
            url,
            ip: ip.to_string(),
        };
        self.repository.insert(&invite).await?;
        Ok(invite)
    }
}

#[async_trait]
impl InviteServiceTrait for InviteService {
    async fn create(&self, dto: CreateInviteDto, ip: &str) -> Result<CreatedInviteResponse> {
        let url = validate_discord_url(&dto.discord_url)?;
        let privileged = self.is_privileged(dto.bot_secret.as_deref());

        if !privileged {
            self.enforce_invite_limit(&url, ip, None).await?;
        }

        let (code, reserved) = match dto.invite_code {
            Some(code) => {
                let reserved = self.check_vanity_code(&code, ip, privileged).await?;
                (code, reserved)
            }
            None => (self.generate_unique_code().await?, false),
        };

        let stored = self.insert_invite(code, url, ip).await;
        let invite = self.settle(ip, reserved, stored).await?;

        info!("Created invite '{}' -> {} for {}", invite.code, invite.url, ip);

        Ok(CreatedInviteResponse {
            text: "Created new invite!".to_string(),
            token: invite.token,
            code: invite.code,
        })
    }

    async fn update(&self, dto: UpdateInviteDto, ip: &str) -> Result<UpdatedInviteResponse> {
        let invite = self
            .repository
            .find_by_token(&dto.invite_token)
            .await?
            .ok_or(ApiError::InvalidAuth("invite_token"))?;

        let url = validate_discord_url(&dto.discord_url)?;
        let privileged = self.is_privileged(dto.bot_secret.as_deref());

        let mut patch = InvitePatch { url, code: None };
        let mut reserved = false;

        // Re-submitting the current code is not a vanity change
        if let Some(code) = dto.invite_code.filter(|code| *code != invite.code) {
            if !privileged {
                self.enforce_invite_limit(&patch.url, ip, Some(&invite.token)).await?;
            }
            reserved = self.check_vanity_code(&code, ip, privileged).await?;
            patch.code = Some(code);
        }

        let updated = self
            .repository
            .update_by_token(&invite.token, &patch)
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound(_) => ApiError::InvalidAuth("invite_token"),
                err => ApiError::from(err),
            });
        let updated = self.settle(ip, reserved, updated).await?;

        info!("Updated invite '{}' -> {}", updated.code, updated.url);

        Ok(UpdatedInviteResponse {
            text: "Updated invite!".to_string(),
            url: updated.url,
            code: updated.code,
        })
    }

    async fn resolve(&self, code: &str) -> Result<Option<String>> {
        if !is_code_shaped(code) {
            debug!("Ignoring malformed code '{}'", code);
            return Ok(None);
        }

        let invite = self.repository.find_by_code(code).await.map_err(|err| {
            warn!("Lookup for code '{}' failed: {}", code, err);
            ApiError::from(err)
        })?;

        Ok(invite.map(|invite| invite.url))
    }

    async fn store_health(&self) -> DatabaseHealth {
        self.repository.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::Duration;

    use super::*;
    use crate::repositories::{InMemoryInviteRepository, MockInviteRepositoryTrait};

    const IP: &str = "198.51.100.7";

    fn bot_secret() -> String {
        "B".repeat(64)
    }

    fn service() -> InviteService {
        InviteService::new(
            Arc::new(InMemoryInviteRepository::new()),
            Arc::new(CreationRateLimiter::new(Duration::hours(1))),
            Some(bot_secret()),
        )
    }

    fn create(url: &str, code: Option<&str>) -> CreateInviteDto {
        CreateInviteDto {
            discord_url: url.to_string(),
            invite_code: code.map(str::to_string),
            bot_secret: None,
        }
    }

    fn update(token: &str, url: &str, code: Option<&str>) -> UpdateInviteDto {
        UpdateInviteDto {
            invite_token: token.to_string(),
            discord_url: url.to_string(),
            invite_code: code.map(str::to_string),
            bot_secret: None,
        }
    }

    #[tokio::test]
    async fn test_create_generates_code_and_token() {
        let service = service();
        let created = service.create(create("discord.gg/abc123", None), IP).await.unwrap();

        assert_eq!(created.text, "Created new invite!");
        assert_eq!(created.code.len(), 6);
        assert_eq!(created.token.len(), 64);
        assert_eq!(
            service.resolve(&created.code).await.unwrap().as_deref(),
            Some("https://discord.gg/abc123")
        );
    }

    #[tokio::test]
    async fn test_second_vanity_code_from_same_address_is_rate_limited() {
        let service = service();
        service
            .create(create("discord.gg/first", Some("firstcode")), IP)
            .await
            .unwrap();

        let err = service
            .create(create("discord.gg/second", Some("secondcode")), IP)
            .await
            .unwrap_err();

        match err {
            ApiError::CreationRatelimit {
                resource,
                remaining_minutes,
            } => {
                assert_eq!(resource, "invite");
                assert!(remaining_minutes > 0);
            }
            other => panic!("expected creation_ratelimit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generated_codes_do_not_start_cooldown() {
        let service = service();
        service.create(create("discord.gg/first", None), IP).await.unwrap();
        service
            .create(create("discord.gg/second", Some("vanity1")), IP)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_same_server_twice_hits_invite_limit() {
        let service = service();
        service.create(create("discord.gg/abc123", None), IP).await.unwrap();

        let err = service
            .create(create("https://discord.gg/abc123", None), IP)
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::InviteLimit);

        let err = service
            .create(create("discord.gg/abc123", Some("vanity1")), IP)
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::InviteLimit);

        // Another address may still link the same server
        service
            .create(create("discord.gg/abc123", None), "198.51.100.8")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_bot_secret_bypasses_limits() {
        let service = service();
        let mut dto = create("discord.gg/abc123", Some("botcode1"));
        dto.bot_secret = Some(bot_secret());
        service.create(dto, IP).await.unwrap();

        let mut dto = create("discord.gg/abc123", Some("botcode2"));
        dto.bot_secret = Some(bot_secret());
        service.create(dto, IP).await.unwrap();

        // Privileged creations leave no cooldown behind
        service
            .create(create("discord.gg/other", Some("usercode")), IP)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wrong_bot_secret_is_not_privileged() {
        let service = service();
        service
            .create(create("discord.gg/one", Some("vanity1")), IP)
            .await
            .unwrap();

        let mut dto = create("discord.gg/two", Some("vanity2"));
        dto.bot_secret = Some("X".repeat(64));
        assert!(matches!(
            service.create(dto, IP).await,
            Err(ApiError::CreationRatelimit { .. })
        ));
    }

    #[tokio::test]
    async fn test_vanity_code_rules() {
        let service = service();

        assert_eq!(
            service
                .create(create("discord.gg/a1", Some("my-code")), "203.0.113.1")
                .await
                .unwrap_err(),
            ApiError::NotPrintable("invite_code")
        );
        assert_eq!(
            service
                .create(create("discord.gg/a2", Some("myApiCode")), "203.0.113.2")
                .await
                .unwrap_err(),
            ApiError::BlockedKeywords("invite_code")
        );

        service
            .create(create("discord.gg/a3", Some("taken")), "203.0.113.3")
            .await
            .unwrap();
        assert_eq!(
            service
                .create(create("discord.gg/a4", Some("taken")), "203.0.113.4")
                .await
                .unwrap_err(),
            ApiError::Exists("invite_code")
        );
    }

    #[tokio::test]
    async fn test_rejected_discord_urls() {
        let service = service();
        assert_eq!(
            service
                .create(create("https://example.com/abc", None), IP)
                .await
                .unwrap_err(),
            ApiError::InvalidDiscordUrl
        );
        assert_eq!(
            service
                .create(create("discord.gg/abc!def", None), IP)
                .await
                .unwrap_err(),
            ApiError::NotPrintable("discord_url")
        );
    }

    #[tokio::test]
    async fn test_update_with_unknown_token_is_invalid_auth() {
        let service = service();
        let token = "T".repeat(64);

        for url in ["discord.gg/abc", "https://example.com", "nonsense"] {
            assert_eq!(
                service.update(update(&token, url, None), IP).await.unwrap_err(),
                ApiError::InvalidAuth("invite_token")
            );
        }
        assert_eq!(
            service
                .update(update(&token, "discord.gg/abc", Some("newcode")), IP)
                .await
                .unwrap_err(),
            ApiError::InvalidAuth("invite_token")
        );
    }

    #[tokio::test]
    async fn test_update_repoints_and_recodes() {
        let service = service();
        let created = service.create(create("discord.gg/old", None), IP).await.unwrap();

        let updated = service
            .update(update(&created.token, "discord.com/invite/new", Some("renamed")), IP)
            .await
            .unwrap();

        assert_eq!(updated.text, "Updated invite!");
        assert_eq!(updated.url, "https://discord.com/invite/new");
        assert_eq!(updated.code, "renamed");
        assert_eq!(service.resolve(&created.code).await.unwrap(), None);
        assert_eq!(
            service.resolve("renamed").await.unwrap().as_deref(),
            Some("https://discord.com/invite/new")
        );
    }

    #[tokio::test]
    async fn test_update_keeping_code_skips_vanity_checks() {
        let service = service();
        let created = service
            .create(create("discord.gg/old", Some("keepme")), IP)
            .await
            .unwrap();

        // Still inside the cooldown, but the code does not change
        let updated = service
            .update(update(&created.token, "discord.gg/old", Some("keepme")), IP)
            .await
            .unwrap();
        assert_eq!(updated.code, "keepme");

        let err = service
            .update(update(&created.token, "discord.gg/old", Some("another")), IP)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::CreationRatelimit { .. }));
    }

    type RepoResult<T> = std::result::Result<T, RepositoryError>;

    /// Store whose inserts stall, widening the window between the cooldown
    /// check and the write
    struct SlowInsertRepository {
        inner: InMemoryInviteRepository,
    }

    #[async_trait]
    impl InviteRepositoryTrait for SlowInsertRepository {
        async fn find_by_code(&self, code: &str) -> RepoResult<Option<Invite>> {
            self.inner.find_by_code(code).await
        }

        async fn find_by_token(&self, token: &str) -> RepoResult<Option<Invite>> {
            self.inner.find_by_token(token).await
        }

        async fn find_by_url_and_ip(
            &self,
            url: &str,
            ip: &str,
        ) -> RepoResult<Option<Invite>> {
            self.inner.find_by_url_and_ip(url, ip).await
        }

        async fn insert(&self, invite: &Invite) -> RepoResult<()> {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            self.inner.insert(invite).await
        }

        async fn update_by_token(
            &self,
            token: &str,
            patch: &InvitePatch,
        ) -> RepoResult<Invite> {
            self.inner.update_by_token(token, patch).await
        }

        async fn health_check(&self) -> DatabaseHealth {
            self.inner.health_check().await
        }
    }

    #[tokio::test]
    async fn test_parallel_vanity_creates_admit_one() {
        let service = InviteService::new(
            Arc::new(SlowInsertRepository {
                inner: InMemoryInviteRepository::new(),
            }),
            Arc::new(CreationRateLimiter::new(Duration::hours(1))),
            None,
        );
        let ip = "198.51.100.1";

        let (a, b, c) = tokio::join!(
            service.create(create("discord.gg/one", Some("vanityone")), ip),
            service.create(create("discord.gg/two", Some("vanitytwo")), ip),
            service.create(create("discord.gg/three", Some("vanitythree")), ip),
        );
        let results = [a, b, c];

        assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|result| matches!(result, Err(ApiError::CreationRatelimit { .. })))
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_rejected_vanity_code_does_not_start_cooldown() {
        let service = service();
        service
            .create(create("discord.gg/a1", Some("taken")), "203.0.113.1")
            .await
            .unwrap();

        for code in ["taken", "my-code", "adminroom"] {
            assert!(service
                .create(create("discord.gg/a2", Some(code)), IP)
                .await
                .is_err());
        }

        let created = service
            .create(create("discord.gg/a2", Some("freecode")), IP)
            .await
            .unwrap();
        assert_eq!(created.code, "freecode");
    }

    #[tokio::test]
    async fn test_failed_insert_releases_cooldown() {
        let mut repository = MockInviteRepositoryTrait::new();
        repository.expect_find_by_url_and_ip().returning(|_, _| Ok(None));
        repository.expect_find_by_code().returning(|_| Ok(None));
        repository.expect_find_by_token().returning(|_| Ok(None));
        repository
            .expect_insert()
            .times(1)
            .returning(|_| Err(RepositoryError::Conflict("invites_code_key".to_string())));

        let limiter = Arc::new(CreationRateLimiter::new(Duration::hours(1)));
        let service = InviteService::new(Arc::new(repository), limiter.clone(), None);

        let err = service
            .create(create("discord.gg/raced", Some("racedcode")), IP)
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Exists("invite_code"));
        assert_eq!(limiter.check_and_reserve(IP).await, RateLimitStatus::Allowed);
    }

    #[tokio::test]
    async fn test_update_to_linked_server_hits_invite_limit() {
        let service = service();
        let first = service.create(create("discord.gg/shared", None), IP).await.unwrap();
        let second = service.create(create("discord.gg/other", None), IP).await.unwrap();

        let err = service
            .update(update(&second.token, "discord.gg/shared", Some("moved")), IP)
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::InviteLimit);

        // The invite being updated does not count against itself
        let updated = service
            .update(update(&first.token, "discord.gg/shared", Some("renamed")), IP)
            .await
            .unwrap();
        assert_eq!(updated.code, "renamed");
    }

    #[tokio::test]
    async fn test_update_to_taken_code_exists() {
        let service = service();
        service
            .create(create("discord.gg/one", Some("taken")), "203.0.113.1")
            .await
            .unwrap();
        let mine = service.create(create("discord.gg/two", None), IP).await.unwrap();

        let err = service
            .update(update(&mine.token, "discord.gg/two", Some("taken")), IP)
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Exists("invite_code"));
    }

    #[tokio::test]
    async fn test_update_rejects_bad_vanity_codes() {
        let service = service();
        let mine = service.create(create("discord.gg/two", None), IP).await.unwrap();

        assert_eq!(
            service
                .update(update(&mine.token, "discord.gg/two", Some("HealthCheck")), IP)
                .await
                .unwrap_err(),
            ApiError::BlockedKeywords("invite_code")
        );
        assert_eq!(
            service
                .update(update(&mine.token, "discord.gg/two", Some("bad_code")), IP)
                .await
                .unwrap_err(),
            ApiError::NotPrintable("invite_code")
        );

        // Neither rejection held the cooldown
        let updated = service
            .update(update(&mine.token, "discord.gg/two", Some("goodcode")), IP)
            .await
            .unwrap();
        assert_eq!(updated.code, "goodcode");
    }

    #[tokio::test]
    async fn test_resolve_ignores_malformed_codes() {
        let service = service();
        assert_eq!(service.resolve("favicon.ico").await.unwrap(), None);
        assert_eq!(service.resolve("").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_generate_unique_code_rerolls_on_collision() {
        let mut repository = MockInviteRepositoryTrait::new();
        let mut calls = 0;
        repository
            .expect_find_by_code()
            .times(4)
            .returning(move |code| {
                calls += 1;
                if calls <= 3 {
                    Ok(Some(Invite {
                        code: code.to_string(),
                        token: format!("token{}", calls),
                        url: "https://discord.gg/abc".to_string(),
                        ip: IP.to_string(),
                    }))
                } else {
                    Ok(None)
                }
            });

        let service = InviteService::new(
            Arc::new(repository),
            Arc::new(CreationRateLimiter::new(Duration::hours(1))),
            None,
        );

        let code = service.generate_unique_code().await.unwrap();
        assert_eq!(code.len(), 6);
    }

    #[tokio::test]
    async fn test_generate_unique_token_avoids_taken_values() {
        let mut repository = MockInviteRepositoryTrait::new();
        let taken: Arc<std::sync::Mutex<HashSet<String>>> = Arc::default();
        let seen = taken.clone();
        repository.expect_find_by_token().returning(move |token| {
            let mut seen = seen.lock().unwrap();
            // The first two candidates are reported as taken
            if seen.len() < 2 {
                seen.insert(token.to_string());
                Ok(Some(Invite {
                    code: "abcdef".to_string(),
                    token: token.to_string(),
                    url: "https://discord.gg/abc".to_string(),
                    ip: IP.to_string(),
                }))
            } else {
                Ok(None)
            }
        });

        let service = InviteService::new(
            Arc::new(repository),
            Arc::new(CreationRateLimiter::new(Duration::hours(1))),
            None,
        );

        let token = service.generate_unique_token().await.unwrap();
        assert_eq!(token.len(), 64);
        assert!(!taken.lock().unwrap().contains(&token));
    }

    #[tokio::test]
    async fn test_store_failures_become_internal_errors() {
        let mut repository = MockInviteRepositoryTrait::new();
        repository
            .expect_find_by_token()
            .returning(|_| Err(RepositoryError::Database(sqlx::Error::PoolTimedOut)));

        let service = InviteService::new(
            Arc::new(repository),
            Arc::new(CreationRateLimiter::new(Duration::hours(1))),
            None,
        );

        let err = service
            .update(update(&"T".repeat(64), "discord.gg/abc", None), IP)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
