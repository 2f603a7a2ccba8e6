use std::sync::Arc;

use actix_web::web;
use log::{error, info};

use crate::error::{PredictionError, StoreError};
use crate::inference::ChurnPredictor;
use crate::models::{LoggedPrediction, PredictionInput, PredictionRecord};
use crate::store::PredictionStore;

/// Predicts, then logs the record.
///
/// An error means no prediction exists and nothing was written. Once a
/// prediction exists it is always returned; a failed write only downgrades
/// it to `LoggedPrediction::Unlogged`.
pub async fn run_prediction(
    predictor: &dyn ChurnPredictor,
    store: Arc<dyn PredictionStore>,
    input: PredictionInput,
) -> Result<LoggedPrediction, PredictionError> {
    let outcome = predictor.predict(&input).await.inspect_err(|e| {
        error!("Prediction error: {}", e);
    })?;
    info!(
        "Prediction received: code={} status={}",
        outcome.code(),
        outcome.status()
    );

    Ok(persist(store, PredictionRecord::new(input, outcome)).await)
}

/// Writes the record once, without retrying. The caller reports a failure.
pub async fn persist(store: Arc<dyn PredictionStore>, record: PredictionRecord) -> LoggedPrediction {
    let row = record.clone();
    let result = match web::block(move || store.insert(&row)).await {
        Ok(result) => result,
        Err(e) => Err(StoreError::from(e)),
    };

    match result {
        Ok(()) => LoggedPrediction::Logged(record),
        Err(e) => LoggedPrediction::Unlogged {
            record,
            reason: e.to_string(),
        },
    }
}
