//! HTTP client for remote pipehost pipelines
//!
//! Mirrors the server surface for one pipeline prefix: invoke, batch,
//! stream, and schema introspection. Streaming parses the SSE frames back
//! into `StreamEvent`s; dropping the returned stream disconnects, which the
//! server observes as cancellation of the remote run.
//!
//! # Usage
//!
//! ```ignore
//! use pipehost_http::PipehostClient;
//!
//! let client = PipehostClient::new("http://localhost:8000/agent")?;
//! let output = client.invoke(serde_json::json!({"input": "2 + 2"}), None).await?;
//! ```

use crate::error::{Error, Result};
use futures::StreamExt;
use pipehost_core::{ErrorPayload, RunConfig, Schema, StreamEvent};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Deadline for non-streaming requests
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Events received from a remote streaming invocation
///
/// Ends after the terminal event. Dropping it mid-stream closes the
/// connection and cancels the remote run.
pub type ClientEventStream = UnboundedReceiverStream<StreamEvent>;

/// Client for one pipeline served under a URL prefix
pub struct PipehostClient {
    /// Pipeline base URL including its prefix (e.g. "http://localhost:8000/agent")
    base_url: String,

    /// Reqwest HTTP client
    client: reqwest::Client,
}

/// Response body from /invoke
#[derive(Debug, Deserialize)]
struct InvokeResponse {
    output: Value,
}

/// Response body from /batch
#[derive(Debug, Deserialize)]
struct BatchResponse {
    outputs: Vec<Value>,
}

impl PipehostClient {
    /// Create a new client for a pipeline URL
    ///
    /// # Arguments
    ///
    /// * `base_url` - Pipeline URL including its prefix
    ///   (e.g. "http://localhost:8000/agent")
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        if base_url.is_empty() {
            return Err(Error::Connection("base_url cannot be empty".to_string()));
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::Connection(format!(
                "base_url must start with http:// or https://, got: {}",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Connection(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { base_url, client })
    }

    /// Single invocation via POST /invoke
    pub async fn invoke(&self, input: Value, config: Option<RunConfig>) -> Result<Value> {
        let url = format!("{}/invoke", self.base_url);
        let body = request_body(input, config)?;

        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;
        let response = check(response).await?;

        let invoke: InvokeResponse = response.json().await?;
        Ok(invoke.output)
    }

    /// Batch invocation via POST /batch
    ///
    /// Slots come back index-aligned with the inputs; a slot holding an
    /// error object in place of an output is surfaced as `Err(payload)`.
    pub async fn batch(
        &self,
        inputs: Vec<Value>,
        config: Option<RunConfig>,
    ) -> Result<Vec<std::result::Result<Value, ErrorPayload>>> {
        let url = format!("{}/batch", self.base_url);
        let mut body = json!({ "inputs": inputs });
        if let Some(config) = config {
            body["config"] = serde_json::to_value(config)?;
        }

        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;
        let response = check(response).await?;

        let batch: BatchResponse = response.json().await?;
        Ok(batch.outputs.into_iter().map(slot_result).collect())
    }

    /// Streaming invocation via POST /stream
    ///
    /// No request deadline: the stream lives as long as the pipeline
    /// produces. The background reader stops as soon as the receiver is
    /// dropped or the terminal event arrives.
    pub async fn stream(&self, input: Value, config: Option<RunConfig>) -> Result<ClientEventStream> {
        let url = format!("{}/stream", self.base_url);
        let body = request_body(input, config)?;

        let response = self.client.post(&url).json(&body).send().await?;
        let response = check(response).await?;

        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        tracing::debug!("SSE transport error: {}", e);
                        break;
                    }
                };
                if let Ok(text) = std::str::from_utf8(&chunk) {
                    buffer.push_str(text);
                }

                // Process complete SSE frames ("\n\n"-delimited)
                while let Some(frame_end) = buffer.find("\n\n") {
                    let raw = buffer[..frame_end].to_string();
                    buffer.drain(..frame_end + 2);

                    if let Some(event) = parse_sse_frame(&raw) {
                        let terminal = event.is_terminal();
                        if tx.send(event).is_err() {
                            // Receiver dropped; dropping the response here
                            // closes the connection and cancels the run.
                            tracing::debug!("SSE receiver dropped, disconnecting");
                            return;
                        }
                        if terminal {
                            return;
                        }
                    }
                }
            }
        });

        Ok(UnboundedReceiverStream::new(rx))
    }

    /// GET /input_schema
    pub async fn input_schema(&self) -> Result<Schema> {
        self.fetch_schema("input_schema").await
    }

    /// GET /output_schema
    pub async fn output_schema(&self) -> Result<Schema> {
        self.fetch_schema("output_schema").await
    }

    /// GET /config_schema
    pub async fn config_schema(&self) -> Result<Schema> {
        self.fetch_schema("config_schema").await
    }

    async fn fetch_schema(&self, route: &str) -> Result<Schema> {
        let url = format!("{}/{}", self.base_url, route);
        let response = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let response = check(response).await?;
        Ok(response.json().await?)
    }
}

/// Build the common `{input, config?}` request body
fn request_body(input: Value, config: Option<RunConfig>) -> Result<Value> {
    let mut body = json!({ "input": input });
    if let Some(config) = config {
        body["config"] = serde_json::to_value(config)?;
    }
    Ok(body)
}

/// Map a non-success response to a structured remote error
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorPayload>(&text) {
        Ok(payload) => Err(Error::Remote(payload)),
        Err(_) => Err(Error::Connection(format!("HTTP {}: {}", status, text))),
    }
}

/// A batch slot holds the output value, or `{"error": ...}` in its place
fn slot_result(value: Value) -> std::result::Result<Value, ErrorPayload> {
    if let Some(error) = value.get("error") {
        if let Ok(payload) = serde_json::from_value::<ErrorPayload>(error.clone()) {
            return Err(payload);
        }
    }
    Ok(value)
}

/// Parse one SSE frame ("event:" + "data:" lines) into a stream event
///
/// Comment lines (keep-alive pings) produce no event.
fn parse_sse_frame(raw: &str) -> Option<StreamEvent> {
    let mut name = "";
    let mut data = String::new();

    for line in raw.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            name = rest.trim();
        } else if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            // The SSE format allows one leading space after the colon
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    match name {
        "data" => serde_json::from_str(&data)
            .ok()
            .map(|value| StreamEvent::Data { data: value }),
        "end" => Some(StreamEvent::End),
        "error" => serde_json::from_str(&data)
            .ok()
            .map(|error| StreamEvent::Error { error }),
        _ => None,
    }
}
