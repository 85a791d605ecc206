use std::fmt::{self, Write};

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{errors::RepositoryError, validations::FieldType};

/// Every failure a client can observe, one entry per catalog row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    Unspecified,
    BadType,
    OutOfRange,
    NotPrintable,
    BlockedKeywords,
    Exists,
    Invalid,
    InvalidAuth,
    CreationRatelimit,
    InviteLimit,
    InvalidDiscordUrl,
    InvalidInviteSecret,
    Internal,
}

/// Catalog entry. Templates use `{}` for the next positional argument and
/// `{n}` for argument `n`.
#[derive(Debug, Clone, Copy)]
pub struct ErrorTemplate {
    pub text: &'static str,
    pub error: &'static str,
    pub status: StatusCode,
}

impl ErrorKind {
    pub const fn template(self) -> ErrorTemplate {
        match self {
            ErrorKind::BadRequest => ErrorTemplate {
                text: "Bad request!",
                error: "bad_request",
                status: StatusCode::BAD_REQUEST,
            },
            ErrorKind::Unspecified => ErrorTemplate {
                text: "Please specify a value for '{}'!",
                error: "{}_unspecified",
                status: StatusCode::BAD_REQUEST,
            },
            ErrorKind::BadType => ErrorTemplate {
                text: "Value for '{}' must be type {}!",
                error: "{}_bad_type",
                status: StatusCode::BAD_REQUEST,
            },
            ErrorKind::OutOfRange => ErrorTemplate {
                text: "Value for '{}' must be between {} and {} characters!",
                error: "{}_out_of_range",
                status: StatusCode::BAD_REQUEST,
            },
            ErrorKind::NotPrintable => ErrorTemplate {
                text: "Value for '{}' uses invalid characters!",
                error: "{}_not_printable",
                status: StatusCode::BAD_REQUEST,
            },
            ErrorKind::BlockedKeywords => ErrorTemplate {
                text: "Value for '{}' uses blocked keywords!",
                error: "{}_blocked_keywords",
                status: StatusCode::BAD_REQUEST,
            },
            ErrorKind::Exists => ErrorTemplate {
                text: "Value for '{}' already exists/is taken!",
                error: "{}_exists",
                status: StatusCode::CONFLICT,
            },
            ErrorKind::Invalid => ErrorTemplate {
                text: "Value for '{}' does not exist!",
                error: "{}_invalid",
                status: StatusCode::NOT_FOUND,
            },
            ErrorKind::InvalidAuth => ErrorTemplate {
                text: "Value for '{}' does not exist or could not be used to authenticate you!",
                error: "{}_invalid_auth",
                status: StatusCode::UNAUTHORIZED,
            },
            ErrorKind::CreationRatelimit => ErrorTemplate {
                text: "You must wait {1} minutes before creating a new {0}!",
                error: "{0}_creation_ratelimit",
                status: StatusCode::TOO_MANY_REQUESTS,
            },
            ErrorKind::InviteLimit => ErrorTemplate {
                text: "You have already created an invite for this server!",
                error: "invite_limit",
                status: StatusCode::TOO_MANY_REQUESTS,
            },
            ErrorKind::InvalidDiscordUrl => ErrorTemplate {
                text: "Discord URL must start with 'https://discord.gg/' or 'https://discord.com/invite/'!",
                error: "invalid_discord_url",
                status: StatusCode::BAD_REQUEST,
            },
            ErrorKind::InvalidInviteSecret => ErrorTemplate {
                text: "Value for 'invite_secret' is invalid!",
                error: "invalid_invite_secret",
                status: StatusCode::UNAUTHORIZED,
            },
            ErrorKind::Internal => ErrorTemplate {
                text: "Something went wrong, please try again later!",
                error: "internal_error",
                status: StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

/// JSON body of every error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub text: String,
    pub error: String,
}

/// Formats a catalog entry with positional arguments.
///
/// Both templates are rendered into fresh strings; the catalog itself is
/// never touched.
pub fn get_http_error(kind: ErrorKind, args: &[&dyn fmt::Display]) -> (ErrorBody, StatusCode) {
    let template = kind.template();
    let body = ErrorBody {
        text: fill_template(template.text, args),
        error: fill_template(template.error, args),
    };

    (body, template.status)
}

fn fill_template(template: &str, args: &[&dyn fmt::Display]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut next = 0;
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };

        let placeholder = &after[..end];
        let position = if placeholder.is_empty() {
            next += 1;
            Some(next - 1)
        } else {
            placeholder.parse::<usize>().ok()
        };

        match position.and_then(|p| args.get(p)) {
            Some(arg) => {
                let _ = write!(out, "{}", arg);
            }
            // Unknown placeholders stay verbatim
            None => out.push_str(&rest[start..start + end + 2]),
        }

        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

/// Typed client-facing error carrying the arguments of its catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("bad request")]
    BadRequest,
    #[error("'{0}' was not specified")]
    Unspecified(&'static str),
    #[error("'{field}' is not of type {expected}")]
    BadType {
        field: &'static str,
        expected: FieldType,
    },
    #[error("'{field}' must be between {min} and {max} characters")]
    OutOfRange {
        field: &'static str,
        min: usize,
        max: usize,
    },
    #[error("'{0}' contains invalid characters")]
    NotPrintable(&'static str),
    #[error("'{0}' contains blocked keywords")]
    BlockedKeywords(&'static str),
    #[error("'{0}' already exists")]
    Exists(&'static str),
    // Catalog entry kept for lookups that report a missing resource
    #[allow(dead_code)]
    #[error("'{0}' does not exist")]
    Invalid(&'static str),
    #[error("'{0}' failed authentication")]
    InvalidAuth(&'static str),
    #[error("{resource} creation rate limited for {remaining_minutes} more minutes")]
    CreationRatelimit {
        resource: &'static str,
        remaining_minutes: i64,
    },
    #[error("invite limit reached for this server")]
    InviteLimit,
    #[error("invalid discord url")]
    InvalidDiscordUrl,
    #[error("invalid invite secret")]
    InvalidInviteSecret,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::BadRequest => ErrorKind::BadRequest,
            ApiError::Unspecified(_) => ErrorKind::Unspecified,
            ApiError::BadType { .. } => ErrorKind::BadType,
            ApiError::OutOfRange { .. } => ErrorKind::OutOfRange,
            ApiError::NotPrintable(_) => ErrorKind::NotPrintable,
            ApiError::BlockedKeywords(_) => ErrorKind::BlockedKeywords,
            ApiError::Exists(_) => ErrorKind::Exists,
            ApiError::Invalid(_) => ErrorKind::Invalid,
            ApiError::InvalidAuth(_) => ErrorKind::InvalidAuth,
            ApiError::CreationRatelimit { .. } => ErrorKind::CreationRatelimit,
            ApiError::InviteLimit => ErrorKind::InviteLimit,
            ApiError::InvalidDiscordUrl => ErrorKind::InvalidDiscordUrl,
            ApiError::InvalidInviteSecret => ErrorKind::InvalidInviteSecret,
            ApiError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Renders the catalog entry for this error
    pub fn render(&self) -> (ErrorBody, StatusCode) {
        let kind = self.kind();
        match self {
            ApiError::Unspecified(field)
            | ApiError::NotPrintable(field)
            | ApiError::BlockedKeywords(field)
            | ApiError::Exists(field)
            | ApiError::Invalid(field)
            | ApiError::InvalidAuth(field) => get_http_error(kind, &[field]),
            ApiError::BadType { field, expected } => get_http_error(kind, &[field, expected]),
            ApiError::OutOfRange { field, min, max } => get_http_error(kind, &[field, min, max]),
            ApiError::CreationRatelimit {
                resource,
                remaining_minutes,
            } => get_http_error(kind, &[resource, remaining_minutes]),
            ApiError::BadRequest
            | ApiError::InviteLimit
            | ApiError::InvalidDiscordUrl
            | ApiError::InvalidInviteSecret
            | ApiError::Internal(_) => get_http_error(kind, &[]),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // Unique index on code lost a race with another request
            RepositoryError::Conflict(_) => ApiError::Exists("invite_code"),
            err => {
                error!("Invite store operation failed: {}", err);
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.kind().template().status
    }

    fn error_response(&self) -> HttpResponse {
        let (body, status) = self.render();
        HttpResponse::build(status).json(body)
    }
}
