use std::sync::Arc;

use actix_web::web;

mod invite;
mod rate_limiter;

pub use invite::{InviteService, InviteServiceTrait};
pub use rate_limiter::{spawn_pruner, CreationRateLimiter};

use crate::{config::Config, repositories::InviteRepositoryTrait};

/// Service Register
pub fn build(
    repository: Arc<dyn InviteRepositoryTrait>,
    rate_limiter: Arc<CreationRateLimiter>,
    config: &Config,
) -> web::Data<InviteService> {
    let invite_service = InviteService::new(
        repository,
        rate_limiter,
        config.security.bot_secret.clone(),
    );
    web::Data::new(invite_service)
}
