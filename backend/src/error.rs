use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::{ErrorResponse, LoginResponse};

pub const LOGIN_FAILED_MESSAGE: &str = "Invalid username or password.";
pub const LOGIN_ERROR_MESSAGE: &str = "Server authentication error.";
pub const REPORT_FAILED_MESSAGE: &str = "Failed to fetch or create results file. Check server logs.";

/// Failures that occur before a prediction code exists.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error(
        "Failed to start prediction process: {0}. Check that the predictor program is installed and on PATH."
    )]
    Launch(String),
    #[error("Prediction script failed. Code: {}. Error: {stderr}", exit_code_label(.exit_code))]
    Process {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("Prediction format error. Raw output: {0}")]
    Format(String),
    #[error("Prediction process timed out after {0:?}")]
    TimedOut(Duration),
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "terminated by signal".to_string(),
    }
}

impl ResponseError for PredictionError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(ErrorResponse::new(format!("Prediction service failed: {}", self)))
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("password hash error: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("store task failed: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
    #[error("failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("database schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: i32, supported: i32 },
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<actix_web::error::BlockingError> for AuthError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        AuthError::Store(StoreError::from(err))
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AuthError::InvalidCredentials => LOGIN_FAILED_MESSAGE,
            AuthError::Store(_) => LOGIN_ERROR_MESSAGE,
        };
        HttpResponse::build(self.status_code()).json(LoginResponse::failure(message))
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("report file error: {0}")]
    File(#[from] std::io::Error),
}

impl ResponseError for ReportError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse::new(REPORT_FAILED_MESSAGE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_failure_message_carries_code_and_stderr() {
        let err = PredictionError::Process {
            exit_code: Some(1),
            stderr: "Prediction failed: bad input".into(),
        };
        assert_eq!(
            err.to_string(),
            "Prediction script failed. Code: 1. Error: Prediction failed: bad input"
        );
    }

    #[test]
    fn signal_termination_has_no_numeric_code() {
        let err = PredictionError::Process {
            exit_code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("Code: terminated by signal."));
    }

    #[test]
    fn auth_failures_never_map_to_server_error_for_bad_credentials() {
        assert_eq!(
            AuthError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        let store_err = AuthError::Store(StoreError::SchemaTooNew {
            found: 9,
            supported: 1,
        });
        assert_eq!(store_err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
