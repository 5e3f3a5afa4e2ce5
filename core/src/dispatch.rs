//! Invocation dispatch
//!
//! Executes `invoke`, `batch`, and `stream` calls against a pipeline,
//! enforcing timeouts and concurrency limits. Every failure raised by a
//! pipeline is caught at this boundary and re-emitted as an invocation-kind
//! error; raw pipeline internals never cross it.
//!
//! # Streaming
//!
//! A streaming invocation runs as a producer task feeding a bounded channel.
//! The consumer side is an ordinary `Stream`; dropping it closes the channel,
//! which the producer observes and stops polling the pipeline. Cancellation
//! propagates, it is not best-effort.

use crate::error::{Error, Result};
use crate::event::StreamEvent;
use crate::pipeline::{InvocationRequest, Pipeline, RunConfig};
use futures::StreamExt;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Tunables for the dispatcher
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Deadline for a single invocation; None disables the timeout
    pub invoke_timeout: Option<Duration>,

    /// Concurrency ceiling for batch calls when the request does not
    /// override it. Excess elements queue; this is the only backpressure
    /// mechanism in the dispatch layer.
    pub batch_max_concurrency: usize,

    /// Capacity of the bounded channel between a stream producer task and
    /// its consumer
    pub stream_buffer: usize,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            invoke_timeout: Some(Duration::from_secs(60)),
            batch_max_concurrency: 8,
            stream_buffer: 32,
        }
    }
}

/// Ordered sequence of events produced by a streaming invocation
///
/// Exactly one terminal event (`end` or `error`) is emitted. Dropping the
/// stream cancels the underlying pipeline call.
pub type EventStream = ReceiverStream<StreamEvent>;

/// Executes invoke, batch, and stream calls against pipelines
///
/// Stateless apart from its options; safe to share across request tasks.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    options: DispatchOptions,
}

impl Dispatcher {
    /// Create a dispatcher with the given options
    pub fn new(options: DispatchOptions) -> Self {
        Self { options }
    }

    /// The options this dispatcher runs with
    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Single invocation, bounded by the configured timeout
    ///
    /// # Errors
    ///
    /// * `Error::Timeout` - The deadline elapsed before the pipeline finished
    /// * `Error::Pipeline` - The pipeline raised an error
    pub async fn invoke(
        &self,
        pipeline: &Arc<dyn Pipeline>,
        request: InvocationRequest,
    ) -> Result<Value> {
        let InvocationRequest {
            input,
            mut config,
            kwargs,
        } = request;
        merge_kwargs(&mut config, kwargs);
        let run_id = config.ensure_run_id();

        tracing::debug!(pipeline = pipeline.name(), %run_id, "invoke");
        call_bounded(
            Arc::clone(pipeline),
            input,
            config,
            self.options.invoke_timeout,
        )
        .await
    }

    /// Batch invocation: bounded-concurrency ordered fan-out
    ///
    /// Output positions correspond 1:1 with input positions regardless of
    /// completion order. A failing element records its error in its slot
    /// while sibling elements complete independently; the batch call itself
    /// never aborts.
    pub async fn batch(
        &self,
        pipeline: &Arc<dyn Pipeline>,
        inputs: Vec<Value>,
        config: RunConfig,
    ) -> Vec<Result<Value>> {
        let limit = config
            .max_concurrency
            .unwrap_or(self.options.batch_max_concurrency)
            .max(1);
        let timeout = self.options.invoke_timeout;

        tracing::debug!(
            pipeline = pipeline.name(),
            elements = inputs.len(),
            max_concurrency = limit,
            "batch"
        );

        let calls = inputs.into_iter().map(|input| {
            let pipeline = Arc::clone(pipeline);
            let config = config.clone();
            call_bounded(pipeline, input, config, timeout)
        });

        futures::stream::iter(calls)
            .buffered(limit)
            .collect::<Vec<Result<Value>>>()
            .await
    }

    /// Streaming invocation
    ///
    /// Spawns a producer task that drives the pipeline's stream and forwards
    /// events over a bounded channel. The returned stream yields events in
    /// production order and always ends with exactly one terminal event
    /// unless the consumer disconnects first. Dropping the returned stream
    /// closes the channel; the producer stops polling the pipeline and the
    /// pipeline's stream is dropped, releasing its resources.
    pub fn stream(&self, pipeline: Arc<dyn Pipeline>, request: InvocationRequest) -> EventStream {
        let (tx, rx) = mpsc::channel(self.options.stream_buffer.max(1));
        tokio::spawn(stream_producer(pipeline, request, tx));
        ReceiverStream::new(rx)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DispatchOptions::default())
    }
}

/// kwargs ride alongside configurable fields when crossing the pipeline
/// boundary; explicit configurable entries win on key collisions.
fn merge_kwargs(config: &mut RunConfig, kwargs: Map<String, Value>) {
    for (key, value) in kwargs {
        config.configurable.entry(key).or_insert(value);
    }
}

/// Run one pipeline call under the invocation deadline
async fn call_bounded(
    pipeline: Arc<dyn Pipeline>,
    input: Value,
    config: RunConfig,
    timeout: Option<Duration>,
) -> Result<Value> {
    let call = pipeline.call(input, &config);
    match timeout {
        Some(deadline) => match tokio::time::timeout(deadline, call).await {
            Ok(result) => result.map_err(Error::into_invocation),
            Err(_) => Err(Error::Timeout(deadline)),
        },
        None => call.await.map_err(Error::into_invocation),
    }
}

/// Producer task for one streaming invocation
async fn stream_producer(
    pipeline: Arc<dyn Pipeline>,
    request: InvocationRequest,
    tx: mpsc::Sender<StreamEvent>,
) {
    let InvocationRequest {
        input,
        mut config,
        kwargs,
    } = request;
    merge_kwargs(&mut config, kwargs);
    let run_id = config.ensure_run_id();
    let name = pipeline.name().to_string();

    let mut stream = match pipeline.call_stream(input, &config).await {
        Ok(stream) => stream,
        Err(error) => {
            let error = error.into_invocation();
            tracing::debug!(pipeline = %name, %run_id, %error, "stream setup failed");
            let _ = tx.send(StreamEvent::error(&error)).await;
            return;
        }
    };

    loop {
        tokio::select! {
            item = stream.next() => match item {
                Some(Ok(value)) => {
                    if tx.send(StreamEvent::data(value)).await.is_err() {
                        // Consumer went away mid-send; stop polling so the
                        // pipeline stream drops and releases its resources.
                        tracing::debug!(pipeline = %name, %run_id, "stream consumer disconnected, cancelling");
                        return;
                    }
                }
                Some(Err(error)) => {
                    let error = error.into_invocation();
                    tracing::debug!(pipeline = %name, %run_id, %error, "stream failed");
                    let _ = tx.send(StreamEvent::error(&error)).await;
                    return;
                }
                None => {
                    let _ = tx.send(StreamEvent::End).await;
                    return;
                }
            },
            _ = tx.closed() => {
                tracing::debug!(pipeline = %name, %run_id, "stream consumer disconnected, cancelling");
                return;
            }
        }
    }
}
