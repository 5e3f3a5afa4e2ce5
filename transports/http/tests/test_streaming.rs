//! Streaming behavior over the HTTP surface: frame order, terminal-frame
//! guarantees, validation before streaming, and cancellation on disconnect.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use http_body_util::BodyExt;
use pipehost_core::{
    DispatchOptions, Dispatcher, Error, OutputStream, Pipeline, RegistryBuilder, Result,
    RunConfig, Schema,
};
use pipehost_http::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Streams the input text word by word; fails midway when a word is "boom"
struct WordStreamPipeline {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Pipeline for WordStreamPipeline {
    fn name(&self) -> &str {
        "words"
    }

    fn describe_input(&self) -> Schema {
        Schema::object()
            .required("text", Schema::string())
            .closed()
            .build()
    }

    fn describe_output(&self) -> Schema {
        Schema::object().required("token", Schema::string()).build()
    }

    async fn call(&self, input: Value, _config: &RunConfig) -> Result<Value> {
        Ok(input)
    }

    async fn call_stream(&self, input: Value, _config: &RunConfig) -> Result<OutputStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let words: Vec<String> = input
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let stream = futures::stream::iter(words).map(|word| {
            if word == "boom" {
                Err(Error::Pipeline("bad token".into()))
            } else {
                Ok(json!({"token": word}))
            }
        });
        Ok(stream.boxed())
    }
}

/// Sets a flag when its stream is dropped
struct CancelGuard(Arc<AtomicBool>);

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Yields two chunks, then blocks forever; used to observe cancellation
struct StallingPipeline {
    released: Arc<AtomicBool>,
}

#[async_trait]
impl Pipeline for StallingPipeline {
    fn name(&self) -> &str {
        "stalling"
    }

    fn describe_input(&self) -> Schema {
        Schema::any()
    }

    fn describe_output(&self) -> Schema {
        Schema::any()
    }

    async fn call(&self, input: Value, _config: &RunConfig) -> Result<Value> {
        Ok(input)
    }

    async fn call_stream(&self, _input: Value, _config: &RunConfig) -> Result<OutputStream> {
        let guard = CancelGuard(Arc::clone(&self.released));
        let stream = futures::stream::unfold((0usize, guard), |(i, guard)| async move {
            if i < 2 {
                Some((Ok(json!({"chunk": i})), (i + 1, guard)))
            } else {
                futures::future::pending::<()>().await;
                None
            }
        });
        Ok(stream.boxed())
    }
}

fn router_with(pipeline: Arc<dyn Pipeline>) -> Router {
    let registry = RegistryBuilder::new()
        .register("p", pipeline)
        .unwrap()
        .build();
    let state = AppState::new(
        Arc::new(registry),
        Arc::new(Dispatcher::new(DispatchOptions::default())),
    );
    build_router(state)
}

fn stream_request(input: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/p/stream")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"input": input}).to_string()))
        .unwrap()
}

/// Split an SSE body into (event name, data) pairs, skipping comments
fn parse_frames(body: &str) -> Vec<(String, String)> {
    body.split("\n\n")
        .filter(|frame| !frame.trim().is_empty())
        .filter_map(|frame| {
            let mut name = None;
            let mut data = String::new();
            for line in frame.lines() {
                if let Some(rest) = line.strip_prefix("event:") {
                    name = Some(rest.trim().to_string());
                } else if let Some(rest) = line.strip_prefix("data:") {
                    data.push_str(rest.trim_start_matches(' '));
                }
            }
            name.map(|name| (name, data))
        })
        .collect()
}

#[tokio::test]
async fn test_stream_frames_in_order_with_single_end() {
    let router = router_with(Arc::new(WordStreamPipeline {
        calls: Arc::new(AtomicUsize::new(0)),
    }));

    let response = router
        .oneshot(stream_request(json!({"text": "to be or not"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let frames = parse_frames(std::str::from_utf8(&bytes).unwrap());

    let data_frames: Vec<&(String, String)> =
        frames.iter().filter(|(name, _)| name == "data").collect();
    assert_eq!(data_frames.len(), 4);
    assert_eq!(data_frames[0].1, r#"{"token":"to"}"#);
    assert_eq!(data_frames[3].1, r#"{"token":"not"}"#);

    let terminals: Vec<&(String, String)> = frames
        .iter()
        .filter(|(name, _)| name == "end" || name == "error")
        .collect();
    assert_eq!(terminals.len(), 1);
    assert_eq!(terminals[0].0, "end");
    // Nothing after the terminal frame
    assert_eq!(frames.last().unwrap().0, "end");
}

#[tokio::test]
async fn test_stream_error_frame_is_terminal() {
    let router = router_with(Arc::new(WordStreamPipeline {
        calls: Arc::new(AtomicUsize::new(0)),
    }));

    let response = router
        .oneshot(stream_request(json!({"text": "ok boom never"})))
        .await
        .unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let frames = parse_frames(std::str::from_utf8(&bytes).unwrap());

    // One data frame, then the error, then nothing.
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].0, "data");
    assert_eq!(frames[1].0, "error");

    let payload: Value = serde_json::from_str(&frames[1].1).unwrap();
    assert_eq!(payload["kind"], "invocation");
}

#[tokio::test]
async fn test_stream_validation_rejects_before_pipeline() {
    let calls = Arc::new(AtomicUsize::new(0));
    let router = router_with(Arc::new(WordStreamPipeline {
        calls: Arc::clone(&calls),
    }));

    let response = router
        .oneshot(stream_request(json!({"wrong": "shape"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["kind"], "validation");
    assert_eq!(calls.load(Ordering::SeqCst), 0, "pipeline stream was opened");
}

#[tokio::test]
async fn test_stream_unknown_prefix_is_404() {
    let router = router_with(Arc::new(WordStreamPipeline {
        calls: Arc::new(AtomicUsize::new(0)),
    }));

    let request = Request::builder()
        .method("POST")
        .uri("/ghost/stream")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"input": {}}).to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_disconnect_cancels_pipeline_stream() {
    let released = Arc::new(AtomicBool::new(false));
    let router = router_with(Arc::new(StallingPipeline {
        released: Arc::clone(&released),
    }));

    let response = router.oneshot(stream_request(json!(null))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Read the two produced chunks, then disconnect mid-stream.
    let mut body = response.into_body().into_data_stream();
    let mut seen = String::new();
    while seen.matches("event: data").count() < 2 {
        match body.next().await {
            Some(Ok(bytes)) => seen.push_str(std::str::from_utf8(&bytes).unwrap_or_default()),
            Some(Err(_)) | None => break,
        }
    }
    drop(body);

    // The producer must stop polling and drop the pipeline's stream.
    for _ in 0..100 {
        if released.load(Ordering::SeqCst) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("pipeline stream was not released after client disconnect");
}
