use actix_web::{http::header::LOCATION, web, HttpRequest, HttpResponse, Responder};
use log::{debug, info, warn};

use crate::{
    config::{Config, CreationMode},
    errors::ApiError,
    models::{CreateInviteDto, UpdateInviteDto},
    services::{InviteService, InviteServiceTrait},
    types::ApiResult,
    validations::{parse_json_body, validate_headers, INVITE_GATE_HEADERS},
};

/// Address used as the rate-limit and invite-limit key
pub fn source_address(req: &HttpRequest) -> String {
    req.connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string()
}

/// In gated mode, rejects callers without the configured `invite_secret` header
fn check_invite_gate(req: &HttpRequest, config: &Config) -> ApiResult<()> {
    if config.app.creation_mode != CreationMode::Gated {
        return Ok(());
    }

    let mut headers = validate_headers(&INVITE_GATE_HEADERS, req.headers())?;
    let given = headers.require_text("invite_secret")?;

    match config.security.invite_secret.as_deref() {
        Some(expected) if expected == given => Ok(()),
        _ => {
            warn!("Rejected invite creation with a bad invite secret");
            Err(ApiError::InvalidInviteSecret)
        }
    }
}

/// Create invite route handler
pub async fn create_handler(
    req: HttpRequest,
    body: web::Bytes,
    service: web::Data<InviteService>,
    config: web::Data<Config>,
) -> ApiResult<impl Responder> {
    check_invite_gate(&req, &config)?;

    let body = parse_json_body(&body);
    let dto = CreateInviteDto::from_body(body.as_ref())?;
    let ip = source_address(&req);

    let created = service.create(dto, &ip).await?;
    Ok(HttpResponse::Ok().json(created))
}

/// Update invite route handler
pub async fn update_handler(
    req: HttpRequest,
    body: web::Bytes,
    service: web::Data<InviteService>,
) -> ApiResult<impl Responder> {
    let body = parse_json_body(&body);
    let dto = UpdateInviteDto::from_body(body.as_ref())?;
    let ip = source_address(&req);

    let updated = service.update(dto, &ip).await?;
    Ok(HttpResponse::Ok().json(updated))
}

/// Redirect route handler; always answers with a redirect
pub async fn redirect_handler(
    path: web::Path<String>,
    service: web::Data<InviteService>,
) -> impl Responder {
    let code = path.into_inner();
    debug!("Redirect requested for code: {}", code);

    let target = match service.resolve(&code).await {
        Ok(Some(url)) => {
            info!("Redirecting '{}' to '{}'", code, url);
            url
        }
        Ok(None) => {
            debug!("No invite for code '{}', redirecting to root", code);
            "/".to_string()
        }
        Err(_) => "/".to_string(),
    };

    HttpResponse::TemporaryRedirect()
        .insert_header((LOCATION, target))
        .finish()
}
