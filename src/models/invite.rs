// src/models/invite.rs - Invite records and request/response payloads
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{
    errors::ApiError,
    validations::{validate_body, JsonBody, CREATE_INVITE_FIELDS, UPDATE_INVITE_FIELDS},
};

/// A stored short code pointing at a Discord invite
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Invite {
    /// Short code served at `/{code}`
    pub code: String,

    /// Bearer token that authorizes updates
    pub token: String,

    /// Normalized Discord invite URL
    pub url: String,

    /// Source address that created the invite
    pub ip: String,
}

/// Partial update applied to the invite matched by token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitePatch {
    pub url: String,
    pub code: Option<String>,
}

// DTO for `POST /api/invite/create`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateInviteDto {
    pub discord_url: String,
    pub invite_code: Option<String>,
    pub bot_secret: Option<String>,
}

impl CreateInviteDto {
    pub fn from_body(body: Option<&JsonBody>) -> Result<Self, ApiError> {
        let mut fields = validate_body(&CREATE_INVITE_FIELDS, body)?;

        Ok(Self {
            discord_url: fields.require_text("discord_url")?,
            invite_code: fields.take_text("invite_code"),
            bot_secret: fields.take_text("bot_secret"),
        })
    }
}

// DTO for `POST /api/invite/update`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateInviteDto {
    pub invite_token: String,
    pub discord_url: String,
    pub invite_code: Option<String>,
    pub bot_secret: Option<String>,
}

impl UpdateInviteDto {
    pub fn from_body(body: Option<&JsonBody>) -> Result<Self, ApiError> {
        let mut fields = validate_body(&UPDATE_INVITE_FIELDS, body)?;

        Ok(Self {
            invite_token: fields.require_text("invite_token")?,
            discord_url: fields.require_text("discord_url")?,
            invite_code: fields.take_text("invite_code"),
            bot_secret: fields.take_text("bot_secret"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedInviteResponse {
    pub text: String,
    pub token: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedInviteResponse {
    pub text: String,
    pub url: String,
    pub code: String,
}
