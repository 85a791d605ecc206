use actix_web::web;

use crate::handlers::{create_handler, redirect_handler, update_handler};

// Configure invite API routes
pub fn configure_api_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/invite")
            .route("/create", web::post().to(create_handler))
            .route("/update", web::post().to(update_handler)),
    );
}

// The catch-all redirect goes last so it cannot shadow other routes
pub fn configure_redirect_route(cfg: &mut web::ServiceConfig) {
    cfg.route("/{code}", web::get().to(redirect_handler));
}
