use actix_files::NamedFile;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::{error, info, warn};
use serde_json::{json, Map, Value};

use crate::auth;
use crate::error::{AuthError, PredictionError, ReportError, StoreError};
use crate::models::{
    ErrorResponse, LoggedPrediction, LoginRequest, LoginResponse, PredictionInput,
    PredictionResponse,
};
use crate::pipeline;
use crate::report::{self, TempReport, REPORT_FILENAME};
use crate::server::AppState;
use crate::session::{removal_cookie, session_cookie, SESSION_COOKIE};

pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

pub async fn index(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    match NamedFile::open_async(state.public_dir.join("index.html")).await {
        Ok(file) => file.into_response(&req),
        Err(e) => {
            error!("Failed to open index page: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::new("Failed to load page"))
        }
    }
}

pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AuthError> {
    let LoginRequest { username, password } = body.into_inner();
    let credentials = state.credentials.clone();
    let user = username.clone();

    let verified = web::block(move || auth::verify_credentials(credentials.as_ref(), &user, &password))
        .await?;

    match verified {
        Ok(()) => {
            let token = state.sessions.create();
            info!("User '{}' logged in", username);
            Ok(HttpResponse::Ok()
                .cookie(session_cookie(&token, state.sessions.ttl()))
                .json(LoginResponse::success("/")))
        }
        Err(AuthError::InvalidCredentials) => {
            warn!("Rejected login for '{}'", username);
            Err(AuthError::InvalidCredentials)
        }
        Err(e) => {
            error!("Login database error: {}", e);
            Err(e)
        }
    }
}

pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        state.sessions.remove(cookie.value());
    }
    HttpResponse::Ok()
        .cookie(removal_cookie())
        .json(json!({ "success": true, "redirect": "/login.html" }))
}

pub async fn predict(
    state: web::Data<AppState>,
    body: web::Json<Map<String, Value>>,
) -> Result<HttpResponse, PredictionError> {
    let input = PredictionInput::from_body(body.into_inner());
    let logged =
        pipeline::run_prediction(state.predictor.as_ref(), state.predictions.clone(), input).await?;
    if let LoggedPrediction::Unlogged { reason, .. } = &logged {
        error!("Database logging failed, returning prediction anyway: {}", reason);
    }
    Ok(HttpResponse::Ok().json(PredictionResponse::from(logged)))
}

pub async fn download_results(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ReportError> {
    let store = state.predictions.clone();
    let table = web::block(move || store.fetch_all())
        .await
        .map_err(StoreError::from)
        .and_then(|result| result)
        .inspect_err(|e| error!("Failed to fetch prediction records: {}", e))?;

    let report = TempReport::write(&state.report_dir, &report::render(&table))
        .inspect_err(|e| error!("Failed to write report file: {}", e))?;
    info!(
        "Wrote {} records to {}",
        table.rows.len(),
        report.path().display()
    );

    let file = NamedFile::open_async(report.path())
        .await?
        .set_content_disposition(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(REPORT_FILENAME.to_string())],
        });

    // The open handle keeps streaming after `report` removes the path.
    Ok(file.into_response(&req))
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse::new("Endpoint not found"))
}
