//! Space Client: calls a hosted emotion model Space over its HTTP call protocol.
//! Two steps: `POST {base}{prefix}/call/{name}` queues the job and returns an event id,
//! then `GET {base}{prefix}/call/{name}/{event_id}` streams server-sent events until the
//! job completes or fails. reqwest only; no SDK.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::prediction::{PredictionBackend, RemoteError, TuningParameters};

/// Host suffix for Spaces addressed by `owner/name`.
const SPACE_HOST_SUFFIX: &str = "hf.space";

#[derive(Debug, Deserialize)]
struct SpaceConfig {
    #[serde(default)]
    api_prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueuedCall {
    event_id: String,
}

/// Connected handle to one Space endpoint.
#[derive(Debug, Clone)]
pub struct SpaceClient {
    http: reqwest::Client,
    base_url: String,
    api_prefix: String,
    endpoint: String,
    token: Option<String>,
}

/// Derive the public URL of a Space from its `owner/name` id
/// (`leewatson/kshs33_emotion_predict` → `https://leewatson-kshs33-emotion-predict.hf.space`).
pub fn space_url(space_id: &str) -> String {
    let sub: String = space_id
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '_' | '.' => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect();
    format!("https://{}.{}", sub, SPACE_HOST_SUFFIX)
}

impl SpaceClient {
    /// Connect to the Space at `base_url` and read its config to find the API prefix.
    /// Fails when the Space is unreachable or does not answer with a config document.
    pub async fn connect(
        http: reqwest::Client,
        base_url: &str,
        api_name: &str,
        token: Option<String>,
    ) -> Result<Self, RemoteError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let mut client = Self {
            http,
            base_url,
            api_prefix: String::new(),
            endpoint: api_name.trim().trim_start_matches('/').to_string(),
            token,
        };

        let res = client
            .authorized(client.http.get(format!("{}/config", client.base_url)))
            .send()
            .await?;
        let res = check_status(res).await?;
        let config: SpaceConfig = res
            .json()
            .await
            .map_err(|e| RemoteError::Protocol(format!("Space config: {}", e)))?;
        client.api_prefix = config
            .api_prefix
            .map(|p| p.trim_end_matches('/').to_string())
            .unwrap_or_default();

        tracing::info!(
            base_url = %client.base_url,
            api_prefix = %client.api_prefix,
            endpoint = %client.endpoint,
            "Space client connected"
        );
        Ok(client)
    }

    fn call_url(&self) -> String {
        format!("{}{}/call/{}", self.base_url, self.api_prefix, self.endpoint)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token.as_deref() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Invoke the endpoint with positional `data` and return its output list.
    pub async fn call(&self, data: Vec<Value>) -> Result<Vec<Value>, RemoteError> {
        let res = self
            .authorized(self.http.post(self.call_url()))
            .json(&json!({ "data": data }))
            .send()
            .await?;
        let queued: QueuedCall = check_status(res)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::Protocol(format!("missing event id: {}", e)))?;
        tracing::debug!(event_id = %queued.event_id, "Space call queued");

        let res = self
            .authorized(
                self.http
                    .get(format!("{}/{}", self.call_url(), queued.event_id)),
            )
            .send()
            .await?;
        let res = check_status(res).await?;
        read_result_stream(res).await
    }
}

#[async_trait]
impl PredictionBackend for SpaceClient {
    async fn predict(
        &self,
        text: &str,
        params: &TuningParameters,
    ) -> Result<Vec<Value>, RemoteError> {
        self.call(vec![
            json!(text),
            json!(params.alpha),
            json!(params.z),
            json!(params.steps),
        ])
        .await
    }
}

async fn check_status(res: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Reads server-sent events until `complete` (output list) or `error`.
async fn read_result_stream(res: reqwest::Response) -> Result<Vec<Value>, RemoteError> {
    read_events(res.bytes_stream()).await
}

/// Buffers raw bytes so a chunk boundary inside a multi-byte character is harmless;
/// only whole events are decoded.
async fn read_events<S, B>(stream: S) -> Result<Vec<Value>, RemoteError>
where
    S: futures_util::Stream<Item = Result<B, reqwest::Error>>,
    B: AsRef<[u8]>,
{
    let mut stream = std::pin::pin!(stream);
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = stream.next().await {
        // CR never occurs inside a UTF-8 sequence
        buf.extend(chunk?.as_ref().iter().copied().filter(|b| *b != b'\r'));
        while let Some(end) = buf.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = buf.drain(..end + 2).collect();
            if let Some(done) = handle_event(decode_event(&block)?)? {
                return Ok(done);
            }
        }
    }
    // trailing event without the final blank line
    if !buf.iter().all(u8::is_ascii_whitespace) {
        if let Some(done) = handle_event(decode_event(&buf)?)? {
            return Ok(done);
        }
    }
    Err(RemoteError::Protocol(
        "event stream ended without a result".to_string(),
    ))
}

fn decode_event(block: &[u8]) -> Result<&str, RemoteError> {
    std::str::from_utf8(block)
        .map_err(|e| RemoteError::Protocol(format!("event is not valid UTF-8: {}", e)))
}

fn handle_event(block: &str) -> Result<Option<Vec<Value>>, RemoteError> {
    let mut event = "message";
    let mut data = Vec::new();
    for line in block.lines() {
        if let Some(v) = line.strip_prefix("event:") {
            event = v.trim();
        } else if let Some(v) = line.strip_prefix("data:") {
            data.push(v.strip_prefix(' ').unwrap_or(v));
        }
    }
    let data = data.join("\n");
    match event {
        "complete" => match serde_json::from_str::<Value>(&data) {
            Ok(Value::Array(outputs)) => Ok(Some(outputs)),
            Ok(other) => Err(RemoteError::Protocol(format!(
                "expected an output list, got {}",
                other
            ))),
            Err(e) => Err(RemoteError::Protocol(format!("complete event: {}", e))),
        },
        "error" => Err(RemoteError::Space(if data.is_empty() || data == "null" {
            "unknown error".to_string()
        } else {
            data
        })),
        _ => Ok(None),
    }
}
