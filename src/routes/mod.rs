use actix_web::{web, HttpResponse, Responder};

use crate::{
    services::{InviteService, InviteServiceTrait},
    types::{AppState, HealthStatus, ResponsePayload},
};

mod invite;

// Handler function for the root route "/"
async fn index() -> impl Responder {
    let welcome_message = ResponsePayload {
        status: 200,
        message: String::from("Welcome! Create an invite at POST /api/invite/create"),
    };

    HttpResponse::Ok().json(welcome_message)
}

// Handler function for the health check endpoint
async fn health_check(
    data: web::Data<AppState>,
    service: web::Data<InviteService>,
) -> impl Responder {
    // Calculate uptime in seconds
    let uptime = data.start_time.elapsed().as_secs();
    let db_health = service.store_health().await;

    let status = HealthStatus {
        status: String::from("OK"),
        version: data.version.clone(),
        db_health: Some(db_health),
        uptime_seconds: uptime,
    };

    HttpResponse::Ok().json(status)
}

// Configure all routes function
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index));
    cfg.route("/health", web::get().to(health_check));
    invite::configure_api_routes(cfg);
    invite::configure_redirect_route(cfg);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{http::StatusCode, test, App};
    use chrono::Duration;
    use serde_json::Value;

    use super::*;
    use crate::{
        config::Config,
        repositories::InMemoryInviteRepository,
        services::{self, CreationRateLimiter},
    };

    #[actix_web::test]
    async fn test_index_and_health_are_not_redirects() {
        let service = services::build(
            Arc::new(InMemoryInviteRepository::new()),
            Arc::new(CreationRateLimiter::new(Duration::hours(1))),
            &Config::default(),
        );
        let app = test::init_service(
            App::new()
                .app_data(service)
                .app_data(web::Data::new(AppState::new("1.2.3".to_string())))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "OK");
        assert_eq!(body["version"], "1.2.3");
        assert_eq!(body["db_health"]["status"], "healthy");
    }
}
