//! HTTP handlers: validate input, drive the dialogue session and the prediction adapter,
//! shape the JSON reply.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::Html,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tamnone_core::{
    predict, PredictionBackend, PredictionOutcome, SnapshotLine, Transcript, TuningParameters,
};

use crate::app::AppState;
use crate::error::ApiError;

/// Speaker used when an append request omits one.
const DEFAULT_SPEAKER: &str = "화자";
const RESET_MESSAGE: &str = "대화 기록이 초기화되었습니다.";

/// Raw tuning overrides; parsed against the configured defaults.
#[derive(Debug, Default, Deserialize)]
pub struct TuningQuery {
    alpha: Option<String>,
    z: Option<String>,
    steps: Option<String>,
}

impl TuningQuery {
    fn resolve(&self, defaults: TuningParameters) -> Result<TuningParameters, ApiError> {
        Ok(TuningParameters::from_raw(
            self.alpha.as_deref(),
            self.z.as_deref(),
            self.steps.as_deref(),
            defaults,
        )?)
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    speaker: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// Landing page.
pub async fn home() -> Html<&'static str> {
    const INDEX: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/static/index.html"));
    Html(INDEX)
}

pub async fn ping() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "return": "200 OK" })))
}

fn backend(state: &AppState) -> Result<&dyn PredictionBackend, ApiError> {
    state.backend.as_deref().ok_or(ApiError::ClientUnavailable)
}

/// POST /analyze: append one utterance and analyze the whole transcript.
/// The utterance is committed only when the prediction succeeds.
pub async fn analyze(
    State(state): State<AppState>,
    Query(query): Query<TuningQuery>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let backend = backend(&state)?;
    let tuning = query.resolve(state.tuning_defaults)?;
    let Json(req) = body?;

    let speaker = req.speaker.as_deref().unwrap_or(DEFAULT_SPEAKER);
    let text = req.text.as_deref().unwrap_or_default();
    let staged = state.session.stage_append(speaker, text).await?;

    let dialogue = staged.text();
    tracing::info!(
        utterances = staged.transcript().len(),
        "{}개 발화 분석 요청 중",
        staged.transcript().len()
    );
    tracing::debug!("{}", dialogue);

    match predict(backend, &dialogue, tuning, state.request_timeout).await {
        PredictionOutcome::Success { result, latency } => {
            state.session.commit_append(staged).await;
            Ok(Json(json!({ "result": result, "latency": latency })))
        }
        PredictionOutcome::Failure { message, latency } => {
            // staged append is dropped: nothing was committed
            Err(ApiError::Remote { message, latency })
        }
    }
}

/// POST /analyze_snapshot: replace the transcript with the supplied lines, then analyze.
/// The replacement is persisted before the call and kept whatever the outcome.
pub async fn analyze_snapshot(
    State(state): State<AppState>,
    Query(query): Query<TuningQuery>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let backend = backend(&state)?;
    let tuning = query.resolve(state.tuning_defaults)?;
    let Json(data) = body?;

    // an absent body or absent `lines` is an empty snapshot
    let lines = match (&data, data.get("lines")) {
        (Value::Null, _) | (Value::Object(_), None | Some(Value::Null)) => Vec::new(),
        (_, Some(Value::Array(lines))) => lines.iter().filter_map(SnapshotLine::from_value).collect(),
        _ => return Err(ApiError::Validation("lines must be a list".to_string())),
    };

    let transcript = Transcript::replace(lines)?;
    state.session.replace(transcript.clone()).await;
    tracing::info!(utterances = transcript.len(), "Snapshot replaced dialogue history");

    match predict(backend, &transcript.render(), tuning, state.request_timeout).await {
        PredictionOutcome::Success { result, latency } => Ok(Json(json!({
            "result": result,
            "latency": latency,
            "history": transcript.lines(),
        }))),
        PredictionOutcome::Failure { message, latency } => Err(ApiError::Remote { message, latency }),
    }
}

pub async fn reset(State(state): State<AppState>) -> Json<Value> {
    state.session.reset().await;
    tracing::info!("{}", RESET_MESSAGE);
    Json(json!({ "message": RESET_MESSAGE }))
}

pub async fn history(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "history": state.session.lines().await }))
}
