use url::{ParseError, Url};

use super::fields::FieldSpec;
use crate::errors::ApiError;

/// Accepted Discord invite URL prefixes
pub const DISCORD_URL_PREFIXES: [&str; 2] = ["https://discord.gg/", "https://discord.com/invite/"];

/// Substrings a vanity code may not contain (case-insensitive)
pub const BLOCKED_KEYWORDS: [&str; 3] = ["api", "admin", "health"];

pub const DISCORD_URL: FieldSpec = FieldSpec::new("discord_url");
pub const INVITE_CODE: FieldSpec = FieldSpec::new("invite_code").length(4, 20).optional();
pub const BOT_SECRET: FieldSpec = FieldSpec::new("bot_secret").length(64, 64).optional();
pub const INVITE_TOKEN: FieldSpec = FieldSpec::new("invite_token").length(64, 64);
pub const INVITE_SECRET: FieldSpec = FieldSpec::new("invite_secret").length(64, 64);

/// Shape of a code taken from the redirect path
pub const PATH_CODE: FieldSpec = FieldSpec::new("code").length(1, 20);

pub const CREATE_INVITE_FIELDS: [FieldSpec; 3] = [DISCORD_URL, INVITE_CODE, BOT_SECRET];
pub const UPDATE_INVITE_FIELDS: [FieldSpec; 4] = [INVITE_TOKEN, DISCORD_URL, INVITE_CODE, BOT_SECRET];
pub const INVITE_GATE_HEADERS: [FieldSpec; 1] = [INVITE_SECRET];

/// Prefixes `https://` when the URL carries no scheme
pub fn normalize_discord_url(raw: &str) -> String {
    match Url::parse(raw) {
        Err(ParseError::RelativeUrlWithoutBase) => format!("https://{}", raw),
        _ => raw.to_string(),
    }
}

/// Normalizes a submitted Discord URL and checks it points at an invite.
///
/// Returns the normalized URL, which is what gets stored and redirected to.
pub fn validate_discord_url(raw: &str) -> Result<String, ApiError> {
    let url = normalize_discord_url(raw);

    let invite_code = DISCORD_URL_PREFIXES
        .iter()
        .find_map(|prefix| url.strip_prefix(prefix))
        .ok_or(ApiError::InvalidDiscordUrl)?;

    if invite_code.is_empty() || !invite_code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiError::NotPrintable("discord_url"));
    }

    Ok(url)
}

/// Character set and keyword rules for a user-chosen code
pub fn validate_vanity_code(code: &str) -> Result<(), ApiError> {
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiError::NotPrintable("invite_code"));
    }

    let lowered = code.to_lowercase();
    if BLOCKED_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
        return Err(ApiError::BlockedKeywords("invite_code"));
    }

    Ok(())
}

/// Whether a redirect path segment could be a stored code
pub fn is_code_shaped(code: &str) -> bool {
    matches!(PATH_CODE.check_str(code), Ok(Some(_))) && code.chars().all(|c| c.is_ascii_alphanumeric())
}
