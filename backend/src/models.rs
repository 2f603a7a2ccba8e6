use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request body keys, in the order the predictor expects them.
pub const FEATURE_NAMES: [&str; 10] = [
    "CreditScore",
    "Geography",
    "Gender",
    "Age",
    "Tenure",
    "Balance",
    "NumOfProducts",
    "HasCrCard",
    "IsActiveMember",
    "EstimatedSalary",
];

/// Customer attributes taken from a prediction request.
///
/// Values are not type-checked. A missing key becomes `null`, both in the
/// argument handed to the predictor and in the persisted row.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionInput {
    features: [Value; 10],
    body: Map<String, Value>,
}

impl PredictionInput {
    pub fn from_body(body: Map<String, Value>) -> Self {
        let features = FEATURE_NAMES.map(|name| body.get(name).cloned().unwrap_or(Value::Null));
        Self { features, body }
    }

    /// Feature values in `FEATURE_NAMES` order.
    pub fn features(&self) -> &[Value; 10] {
        &self.features
    }

    /// The request body as received, echoed back to the caller.
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// JSON array handed to the predictor as its argument.
    pub fn to_argument(&self) -> String {
        Value::Array(self.features.to_vec()).to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionOutcome {
    code: u8,
}

impl PredictionOutcome {
    pub fn new(code: u8) -> Self {
        Self { code }
    }

    pub fn code(&self) -> u8 {
        self.code
    }

    pub fn status(&self) -> &'static str {
        if self.code == 0 { "Stay" } else { "Leave" }
    }
}

/// One row of `prediction_results`.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub input: PredictionInput,
    pub outcome: PredictionOutcome,
}

impl PredictionRecord {
    pub fn new(input: PredictionInput, outcome: PredictionOutcome) -> Self {
        Self { input, outcome }
    }
}

/// A computed prediction and whether it reached the store.
#[derive(Debug)]
pub enum LoggedPrediction {
    Logged(PredictionRecord),
    Unlogged {
        record: PredictionRecord,
        reason: String,
    },
}

impl LoggedPrediction {
    pub fn record(&self) -> &PredictionRecord {
        match self {
            LoggedPrediction::Logged(record) => record,
            LoggedPrediction::Unlogged { record, .. } => record,
        }
    }

    pub fn is_logged(&self) -> bool {
        matches!(self, LoggedPrediction::Logged(_))
    }
}

pub const LOGGING_FAILED_MESSAGE: &str = "Database logging failed, but prediction received.";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    pub prediction: u8,
    pub status: &'static str,
    pub input_data: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<LoggedPrediction> for PredictionResponse {
    fn from(logged: LoggedPrediction) -> Self {
        let (record, error) = match logged {
            LoggedPrediction::Logged(record) => (record, None),
            LoggedPrediction::Unlogged { record, .. } => {
                (record, Some(LOGGING_FAILED_MESSAGE.to_string()))
            }
        };
        PredictionResponse {
            prediction: record.outcome.code(),
            status: record.outcome.status(),
            input_data: record.input.body,
            error,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LoginResponse {
    pub fn success(redirect: &'static str) -> Self {
        LoginResponse {
            success: true,
            redirect: Some(redirect),
            message: None,
        }
    }

    pub fn failure(message: &str) -> Self {
        LoginResponse {
            success: false,
            redirect: None,
            message: Some(message.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorResponse {
            error: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn argument_follows_feature_order_not_body_order() {
        let input = PredictionInput::from_body(body(json!({
            "EstimatedSalary": 101348.88,
            "IsActiveMember": 1,
            "HasCrCard": 1,
            "NumOfProducts": 1,
            "Balance": 0.0,
            "Tenure": 2,
            "Age": 42,
            "Gender": "Female",
            "Geography": "France",
            "CreditScore": 619,
        })));

        assert_eq!(
            input.to_argument(),
            r#"[619,"France","Female",42,2,0.0,1,1,1,101348.88]"#
        );
    }

    #[test]
    fn missing_features_become_null() {
        let input = PredictionInput::from_body(body(json!({ "Age": 30, "Extra": true })));

        assert_eq!(
            input.to_argument(),
            "[null,null,null,30,null,null,null,null,null,null]"
        );
        assert_eq!(input.body().get("Extra"), Some(&json!(true)));
    }

    #[test]
    fn status_is_stay_only_for_zero() {
        assert_eq!(PredictionOutcome::new(0).status(), "Stay");
        assert_eq!(PredictionOutcome::new(1).status(), "Leave");
        assert_eq!(PredictionOutcome::new(7).status(), "Leave");
    }

    #[test]
    fn unlogged_prediction_keeps_result_and_annotates() {
        let record = PredictionRecord::new(
            PredictionInput::from_body(body(json!({ "CreditScore": 600 }))),
            PredictionOutcome::new(1),
        );
        let response = PredictionResponse::from(LoggedPrediction::Unlogged {
            record,
            reason: "disk full".into(),
        });
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["prediction"], json!(1));
        assert_eq!(value["status"], json!("Leave"));
        assert_eq!(value["inputData"], json!({ "CreditScore": 600 }));
        assert_eq!(value["error"], json!(LOGGING_FAILED_MESSAGE));
    }

    #[test]
    fn logged_prediction_has_no_error_field() {
        let record = PredictionRecord::new(
            PredictionInput::from_body(Map::new()),
            PredictionOutcome::new(0),
        );
        let value = serde_json::to_value(PredictionResponse::from(LoggedPrediction::Logged(record)))
            .unwrap();

        assert_eq!(value["status"], json!("Stay"));
        assert!(value.get("error").is_none());
    }
}
