use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;

use crate::error::PredictionError;
use crate::models::{PredictionInput, PredictionOutcome};

static PREDICTION_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Prediction: ([0-9])").expect("prediction pattern is valid"));

/// Anything that can turn customer attributes into a churn prediction.
#[async_trait]
pub trait ChurnPredictor: Send + Sync {
    async fn predict(&self, input: &PredictionInput) -> Result<PredictionOutcome, PredictionError>;
}

/// How one run of the external predictor ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationResult {
    Success(String),
    ProcessFailure {
        exit_code: Option<i32>,
        stderr: String,
    },
    LaunchFailure(String),
    TimedOut(Duration),
}

/// Runs `<program> [args...] <json-array>` once per prediction.
#[derive(Debug, Clone)]
pub struct ProcessPredictor {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ProcessPredictor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: None,
        }
    }

    /// Kill the process and fail the request if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn invoke(&self, argument: &str) -> InvocationResult {
        debug!(
            "Spawning predictor: {} {} {}",
            self.program,
            self.args.join(" "),
            argument
        );

        // The child is killed if this future is dropped, so a timeout or an
        // early return never leaves a process or its pipes behind.
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(argument)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => return InvocationResult::LaunchFailure(e.to_string()),
        };

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output,
                Err(_) => {
                    warn!("Predictor exceeded {:?}, killing it", limit);
                    return InvocationResult::TimedOut(limit);
                }
            },
            None => child.wait_with_output().await,
        };

        match output {
            Ok(output) if output.status.success() => {
                InvocationResult::Success(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => InvocationResult::ProcessFailure {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
            Err(e) => InvocationResult::ProcessFailure {
                exit_code: None,
                stderr: format!("failed to collect predictor output: {}", e),
            },
        }
    }
}

#[async_trait]
impl ChurnPredictor for ProcessPredictor {
    async fn predict(&self, input: &PredictionInput) -> Result<PredictionOutcome, PredictionError> {
        interpret(self.invoke(&input.to_argument()).await)
    }
}

/// Turns a finished invocation into an outcome.
///
/// Only `Success` is parsed. Every other variant becomes the matching error
/// unchanged.
pub fn interpret(result: InvocationResult) -> Result<PredictionOutcome, PredictionError> {
    match result {
        InvocationResult::Success(stdout) => parse_prediction(&stdout)
            .map(PredictionOutcome::new)
            .ok_or_else(|| PredictionError::Format(stdout.trim().to_string())),
        InvocationResult::ProcessFailure { exit_code, stderr } => Err(PredictionError::Process {
            exit_code,
            stderr: stderr.trim().to_string(),
        }),
        InvocationResult::LaunchFailure(reason) => Err(PredictionError::Launch(reason)),
        InvocationResult::TimedOut(limit) => Err(PredictionError::TimedOut(limit)),
    }
}

fn parse_prediction(stdout: &str) -> Option<u8> {
    let digit = PREDICTION_LINE.captures(stdout)?.get(1)?;
    digit.as_str().parse().ok()
}
