use std::{sync::Arc, time::Duration};

use actix_cors::Cors;
use actix_web::{
    http::{header, Method},
    middleware::{DefaultHeaders, Logger},
    web, App, HttpServer,
};
use env_logger::Env;
use log::{debug, info};

use crate::{
    config::{Config, CreationMode, Environment, StorageBackend},
    db::Database,
    errors::AppError,
    middleware::RequestLogger,
    repositories::{InMemoryInviteRepository, InviteRepository, InviteRepositoryTrait},
    routes,
    services::{self, spawn_pruner, CreationRateLimiter},
    types::AppState,
};

// Custom result type for the application
pub type AppResult<T> = Result<T, AppError>;

// Setup logging with custom format and configuration
fn setup_logging(config: &Config) -> AppResult<()> {
    // Configure log level based on environment and config
    let log_level = match config.app.environment {
        Environment::Development => config.app.log_level.clone(),
        Environment::Testing => "debug,actix_web=info".to_string(),
        Environment::Production => "info,actix_web=warn".to_string(),
    };

    let env = Env::default()
        .filter_or("RUST_LOG", log_level)
        .write_style_or("RUST_LOG_STYLE", "always");

    env_logger::try_init_from_env(env)
        .map_err(|e| AppError::Logger(format!("Failed to initialize logger: {}", e)))
}

fn build_cors(allowed_origin: Option<&str>) -> Cors {
    match allowed_origin {
        Some(origin) => Cors::default()
            .allowed_origin(origin)
            .allowed_methods([Method::GET, Method::POST])
            .allowed_headers([header::CONTENT_TYPE, header::ACCEPT])
            .allowed_header("invite_secret")
            .max_age(3600),
        None => Cors::permissive(),
    }
}

pub async fn server() -> AppResult<()> {
    let config = Config::load()?;

    setup_logging(&config)?;

    info!("Starting {} v{}", config.app.name, config.app.version);
    info!("Environment: {:?}", config.app.environment);
    info!(
        "Binding to {}:{} with {} workers",
        config.server.host, config.server.port, config.server.workers
    );

    if config.app.environment == Environment::Development {
        debug!("Debug logging enabled");
        debug!("Full configuration: {:?}", config);
    }

    if config.app.creation_mode == CreationMode::Gated {
        info!("Invite creation is gated by the invite_secret header");
    }

    // Connect the invite store
    let mut database = None;
    let repository: Arc<dyn InviteRepositoryTrait> = match config.db.backend {
        StorageBackend::Postgres => {
            let db = Database::connect(&config.db).await?;
            database = Some(db.clone());
            Arc::new(InviteRepository::new(db))
        }
        StorageBackend::Memory => {
            info!("Using the in-memory invite store; invites are lost on restart");
            Arc::new(InMemoryInviteRepository::new())
        }
    };

    let rate_limiter = Arc::new(CreationRateLimiter::from_config(&config.rate_limit));
    let pruner = spawn_pruner(
        rate_limiter.clone(),
        Duration::from_secs(config.rate_limit.prune_interval_seconds),
    );

    let invite_service = services::build(repository, rate_limiter, &config);
    let app_state = web::Data::new(AppState::new(config.app.version.clone()));

    // Determine if we should enable more verbose logging
    let enable_debug_logging = config.app.environment != Environment::Production;

    // Determine log format based on environment
    let log_format = if enable_debug_logging {
        "%a \"%r\" %s %b %T \"%{Referer}i\" \"%{User-Agent}i\" %{X-Request-ID}o"
    } else {
        "%a \"%r\" %s %b %T"
    };

    let app_config = web::Data::new(config.clone());

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(app_config.clone())
            .app_data(invite_service.clone())
            .wrap(RequestLogger::new(enable_debug_logging))
            .wrap(Logger::new(log_format))
            .wrap(DefaultHeaders::new().add(("X-Content-Type-Options", "nosniff")))
            .wrap(build_cors(app_config.app.allowed_origin.as_deref()))
            .configure(routes::configure_routes)
    })
    .workers(config.server.workers)
    .bind((config.server.host.to_string(), config.server.port))?
    .run()
    .await?;

    pruner.abort();
    if let Some(database) = database {
        database.shutdown().await;
    }

    Ok(())
}
