use std::{collections::HashMap, sync::Arc};

use actix_web::rt::{self, task::JoinHandle, time};
use chrono::{DateTime, Duration, Utc};
use log::debug;
use tokio::sync::Mutex;

use crate::config::RateLimitConfig;

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitStatus {
    Allowed,
    Limited { remaining_minutes: i64 },
}

/// Per-address cooldown for vanity code creation.
///
/// State lives in process memory only: it is neither shared between
/// instances nor kept across restarts.
pub struct CreationRateLimiter {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
    cooldown: Duration,
}

impl CreationRateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            cooldown,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        let cooldown = i64::try_from(config.vanity_cooldown_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or_else(|| Duration::weeks(52));
        Self::new(cooldown)
    }

    /// Checks the cooldown for `ip` and, when it has none, starts one in the
    /// same critical section. `Allowed` means the caller now holds the slot and
    /// must `release` it if the creation does not go through.
    pub async fn check_and_reserve(&self, ip: &str) -> RateLimitStatus {
        self.check_and_reserve_at(ip, Utc::now()).await
    }

    pub async fn check_and_reserve_at(&self, ip: &str, now: DateTime<Utc>) -> RateLimitStatus {
        let mut entries = self.entries.lock().await;

        if let Some(expiry) = entries.get(ip) {
            if now < *expiry {
                let remaining_ms = (*expiry - now).num_milliseconds();
                // Round up to whole minutes
                let remaining_minutes = ((remaining_ms + 59_999) / 60_000).max(1);
                return RateLimitStatus::Limited { remaining_minutes };
            }
        }

        let expiry = now.checked_add_signed(self.cooldown).unwrap_or(DateTime::<Utc>::MAX_UTC);
        entries.insert(ip.to_string(), expiry);
        RateLimitStatus::Allowed
    }

    /// Gives back a slot taken by `check_and_reserve`
    pub async fn release(&self, ip: &str) {
        if self.entries.lock().await.remove(ip).is_some() {
            debug!("Released vanity cooldown for {}", ip);
        }
    }

    /// Drops expired entries, returning how many were removed
    pub async fn prune(&self) -> usize {
        self.prune_at(Utc::now()).await
    }

    pub async fn prune_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, expiry| now < *expiry);
        before - entries.len()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// Periodically prunes `limiter` on the current runtime
pub fn spawn_pruner(limiter: Arc<CreationRateLimiter>, every: std::time::Duration) -> JoinHandle<()> {
    rt::spawn(async move {
        let mut interval = time::interval(every);
        loop {
            interval.tick().await;
            let removed = limiter.prune().await;
            if removed > 0 {
                debug!("Pruned {} expired rate-limit entries", removed);
            }
        }
    })
}
