//! Prediction client adapter.
//!
//! Wraps one remote emotion prediction: supplies tuning parameters, measures latency
//! around the call and folds every transport or protocol failure into a
//! [`PredictionOutcome::Failure`]. Nothing raised by the backend escapes [`predict`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::normalizer::parse_struct;

pub const DEFAULT_ALPHA: f64 = 0.1;
pub const DEFAULT_Z: f64 = 1.0;
pub const DEFAULT_STEPS: i64 = 1;

/// Prefix shared by every failure message surfaced to clients.
pub const ERROR_PREFIX: &str = "Error:";

/// Model-specific inference knobs, passed through unchanged to the Space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TuningParameters {
    pub alpha: f64,
    pub z: f64,
    pub steps: i64,
}

impl Default for TuningParameters {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            z: DEFAULT_Z,
            steps: DEFAULT_STEPS,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TuningError {
    #[error("{name} must be a number, got {value:?}")]
    NotANumber { name: &'static str, value: String },
    #[error("{name} must be an integer, got {value:?}")]
    NotAnInteger { name: &'static str, value: String },
}

impl TuningParameters {
    /// Overlays raw query values on `defaults`. Absent or empty values keep the default;
    /// present values that do not parse are rejected.
    pub fn from_raw(
        alpha: Option<&str>,
        z: Option<&str>,
        steps: Option<&str>,
        defaults: TuningParameters,
    ) -> Result<Self, TuningError> {
        Ok(Self {
            alpha: match present(alpha) {
                Some(v) => parse_float("alpha", v)?,
                None => defaults.alpha,
            },
            z: match present(z) {
                Some(v) => parse_float("z", v)?,
                None => defaults.z,
            },
            steps: match present(steps) {
                Some(v) => v.parse().map_err(|_| TuningError::NotAnInteger {
                    name: "steps",
                    value: v.to_string(),
                })?,
                None => defaults.steps,
            },
        })
    }
}

fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_float(name: &'static str, raw: &str) -> Result<f64, TuningError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| TuningError::NotANumber {
            name,
            value: raw.to_string(),
        })
}

/// Failures talking to the remote Space.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Space reported an error: {0}")]
    Space(String),
    #[error("unexpected response: {0}")]
    Protocol(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Remote emotion prediction. Returns the Space's positional output list.
#[async_trait]
pub trait PredictionBackend: Send + Sync {
    async fn predict(
        &self,
        text: &str,
        params: &TuningParameters,
    ) -> Result<Vec<Value>, RemoteError>;
}

/// Result of one adapter call. Latency (seconds) is populated on both paths.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    Success { result: Value, latency: f64 },
    Failure { message: String, latency: f64 },
}

impl PredictionOutcome {
    pub fn latency(&self) -> f64 {
        match self {
            PredictionOutcome::Success { latency, .. } | PredictionOutcome::Failure { latency, .. } => {
                *latency
            }
        }
    }
}

/// Runs one prediction over the serialized transcript `text`.
///
/// The third output slot is normalized with [`parse_struct`]. Fewer than three outputs
/// is a protocol-shape failure; a normalized result that is itself an `Error:` string
/// is reported as a failure as well.
pub async fn predict(
    backend: &dyn PredictionBackend,
    text: &str,
    params: TuningParameters,
    timeout: Duration,
) -> PredictionOutcome {
    let started = Instant::now();
    let called = tokio::time::timeout(timeout, backend.predict(text, &params)).await;
    let latency = started.elapsed().as_secs_f64();

    let outputs = match called {
        Ok(Ok(outputs)) => outputs,
        Ok(Err(e)) => return call_failure(&e, latency),
        Err(_) => return call_failure(&RemoteError::Timeout(timeout), latency),
    };
    tracing::debug!(outputs = outputs.len(), latency, "Space prediction returned");

    if outputs.len() <= 2 {
        let message = format!(
            "{} API 응답 형식이 올바르지 않습니다. 응답: {}",
            ERROR_PREFIX,
            Value::Array(outputs)
        );
        tracing::warn!("{}", message);
        return PredictionOutcome::Failure { message, latency };
    }

    let result = match outputs.into_iter().nth(2) {
        Some(slot) => parse_struct(slot),
        None => Value::Null,
    };
    if let Some(text) = result.as_str() {
        if text.starts_with(ERROR_PREFIX) {
            return PredictionOutcome::Failure {
                message: text.to_string(),
                latency,
            };
        }
    }
    PredictionOutcome::Success { result, latency }
}

fn call_failure(error: &RemoteError, latency: f64) -> PredictionOutcome {
    let message = format!("{} API 호출 중 오류 발생: {}", ERROR_PREFIX, error);
    tracing::warn!(latency, "{}", message);
    PredictionOutcome::Failure { message, latency }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct Canned {
        reply: Mutex<Option<Result<Vec<Value>, RemoteError>>>,
        seen: Mutex<Vec<(String, TuningParameters)>>,
    }

    impl Canned {
        fn new(reply: Result<Vec<Value>, RemoteError>) -> Self {
            Self {
                reply: Mutex::new(Some(reply)),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PredictionBackend for Canned {
        async fn predict(
            &self,
            text: &str,
            params: &TuningParameters,
        ) -> Result<Vec<Value>, RemoteError> {
            self.seen.lock().unwrap().push((text.to_string(), *params));
            self.reply.lock().unwrap().take().unwrap()
        }
    }

    struct Stalled;

    #[async_trait]
    impl PredictionBackend for Stalled {
        async fn predict(&self, _: &str, _: &TuningParameters) -> Result<Vec<Value>, RemoteError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    const T: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn third_slot_is_normalized() {
        let backend = Canned::new(Ok(vec![json!("x"), json!(null), json!("{\"emotion\":\"joy\"}")]));
        let params = TuningParameters { alpha: 0.5, z: 1.8, steps: 3 };
        let out = predict(&backend, "Alice: I am happy", params, T).await;
        match out {
            PredictionOutcome::Success { result, latency } => {
                assert_eq!(result, json!({"emotion": "joy"}));
                assert!(latency >= 0.0);
            }
            other => panic!("expected success, got {:?}", other),
        }
        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].0, "Alice: I am happy");
        assert_eq!(seen[0].1, params);
    }

    #[tokio::test]
    async fn short_output_is_a_shape_failure() {
        let backend = Canned::new(Ok(vec![json!("a"), json!("b")]));
        let out = predict(&backend, "x", TuningParameters::default(), T).await;
        match out {
            PredictionOutcome::Failure { message, .. } => {
                assert!(message.starts_with("Error: API 응답 형식이 올바르지 않습니다."));
                assert!(message.contains("[\"a\",\"b\"]"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn call_error_is_caught() {
        let backend = Canned::new(Err(RemoteError::Space("boom".into())));
        let out = predict(&backend, "x", TuningParameters::default(), T).await;
        match out {
            PredictionOutcome::Failure { message, .. } => {
                assert_eq!(message, "Error: API 호출 중 오류 발생: Space reported an error: boom");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn stalled_call_times_out() {
        let out = predict(&Stalled, "x", TuningParameters::default(), Duration::from_millis(50)).await;
        match out {
            PredictionOutcome::Failure { message, latency } => {
                assert!(message.contains("timed out"));
                assert!(latency >= 0.0);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn error_string_result_counts_as_failure() {
        let backend = Canned::new(Ok(vec![json!(1), json!(2), json!("Error: quota exceeded")]));
        let out = predict(&backend, "x", TuningParameters::default(), T).await;
        assert_eq!(
            out,
            PredictionOutcome::Failure {
                message: "Error: quota exceeded".into(),
                latency: out.latency()
            }
        );
    }

    #[test]
    fn tuning_defaults_fill_absent_values() {
        let p = TuningParameters::from_raw(None, Some(""), None, TuningParameters::default()).unwrap();
        assert_eq!(p, TuningParameters { alpha: 0.1, z: 1.0, steps: 1 });
        let p = TuningParameters::from_raw(Some("0.3"), Some(" 1.8 "), Some("3"), TuningParameters::default())
            .unwrap();
        assert_eq!(p, TuningParameters { alpha: 0.3, z: 1.8, steps: 3 });
    }

    #[test]
    fn tuning_rejects_garbage() {
        let d = TuningParameters::default();
        assert_eq!(
            TuningParameters::from_raw(Some("abc"), None, None, d),
            Err(TuningError::NotANumber { name: "alpha", value: "abc".into() })
        );
        assert!(TuningParameters::from_raw(None, Some("nan"), None, d).is_err());
        assert_eq!(
            TuningParameters::from_raw(None, None, Some("2.5"), d),
            Err(TuningError::NotAnInteger { name: "steps", value: "2.5".into() })
        );
    }
}
