use std::path::{Path, PathBuf};
use std::sync::Arc;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::dev::{fn_service, ServiceRequest};
use actix_web::error::InternalError;
use actix_web::http::header;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::Context;
use log::{error, info, warn};

use crate::auth;
use crate::config::AppConfig;
use crate::inference::{ChurnPredictor, ProcessPredictor};
use crate::models::ErrorResponse;
use crate::routes;
use crate::session::{self, SessionStore};
use crate::store::{CredentialStore, PredictionStore, SqliteStore};

/// Shared by every worker for the life of the server.
pub struct AppState {
    pub predictor: Arc<dyn ChurnPredictor>,
    pub predictions: Arc<dyn PredictionStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub sessions: SessionStore,
    pub public_dir: PathBuf,
    pub report_dir: PathBuf,
}

/// Registers every route. Page and API routes behind `require_login` redirect
/// to the login page when there is no live session.
pub fn configure(cfg: &mut web::ServiceConfig, public_dir: &Path) {
    cfg.app_data(json_config())
        .route("/api/health", web::get().to(routes::health_check))
        .route("/api/login", web::post().to(routes::login))
        .route("/api/logout", web::post().to(routes::logout))
        .service(
            web::resource("/")
                .wrap_fn(|req, srv| session::require_login(req, srv))
                .route(web::get().to(routes::index)),
        )
        .service(
            web::resource("/api/predict")
                .wrap_fn(|req, srv| session::require_login(req, srv))
                .route(web::post().to(routes::predict)),
        )
        .service(
            web::resource("/api/download-results")
                .wrap_fn(|req, srv| session::require_login(req, srv))
                .route(web::get().to(routes::download_results)),
        );

    if public_dir.is_dir() {
        cfg.service(
            Files::new("/", public_dir)
                .prefer_utf8(true)
                .default_handler(fn_service(|req: ServiceRequest| async {
                    let res = HttpResponse::NotFound().json(ErrorResponse::new("Endpoint not found"));
                    Ok::<_, actix_web::Error>(req.into_response(res))
                })),
        );
    } else {
        cfg.default_service(web::route().to(routes::not_found));
    }
}

/// Body extraction failures answer with the same `{error}` shape as the
/// handlers.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(1024 * 1024)
        .error_handler(|err, _req| {
            let message = err.to_string();
            warn!("Rejected request body: {}", message);
            let response = HttpResponse::BadRequest().json(ErrorResponse::new(message));
            InternalError::from_response(err, response).into()
        })
}

fn cors(origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600);

    if origins.is_empty() {
        cors.allow_any_origin()
    } else {
        origins
            .iter()
            .fold(cors, |cors, origin| cors.allowed_origin(origin))
            .supports_credentials()
    }
}

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let store = SqliteStore::open(&config.database_path).with_context(|| {
        format!(
            "failed to open database at {}",
            config.database_path.display()
        )
    })?;
    let store = Arc::new(store);

    let bootstrap_store = store.clone();
    let (username, password, cost) = (
        config.admin_username.clone(),
        config.admin_password.clone(),
        config.bcrypt_cost,
    );
    match web::block(move || {
        auth::ensure_admin_user(bootstrap_store.as_ref(), &username, &password, cost)
    })
    .await
    {
        Ok(Ok(true)) => info!("Initial admin user created"),
        Ok(Ok(false)) => {}
        Ok(Err(e)) => error!("Database initialization error: {}", e),
        Err(e) => error!("Database initialization task failed: {}", e),
    }

    let predictor = ProcessPredictor::new(
        config.predictor_program.clone(),
        config.predictor_args.clone(),
    )
    .with_timeout(config.inference_timeout());
    if config.inference_timeout().is_none() {
        info!("No inference timeout configured, predictor runs are unbounded");
    }

    let state = web::Data::new(AppState {
        predictor: Arc::new(predictor),
        predictions: store.clone(),
        credentials: store,
        sessions: SessionStore::new(config.session_ttl()),
        public_dir: config.public_dir.clone(),
        report_dir: config.report_dir(),
    });

    let bind_address = config.bind_address();
    let workers = config.worker_count();

    info!("Churn prediction server listening on http://{}", bind_address);
    info!("Workers: {}", workers);
    info!("Login page: http://{}{}", bind_address, session::LOGIN_PAGE);
    info!("Endpoints:");
    info!("   GET  /api/health            - health check");
    info!("   POST /api/login             - start a session");
    info!("   POST /api/logout            - end the session");
    info!("   POST /api/predict           - churn prediction (session)");
    info!("   GET  /api/download-results  - results report (session)");

    let public_dir = config.public_dir.clone();
    let origins = config.cors_origins.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(DefaultHeaders::new().add(("X-Content-Type-Options", "nosniff")))
            .wrap(cors(&origins))
            .app_data(state.clone())
            .configure(|cfg| configure(cfg, &public_dir))
    })
    .workers(workers)
    .bind(&bind_address)
    .with_context(|| format!("failed to bind {}", bind_address))?
    .run()
    .await
    .context("server terminated with an error")
}
