//! Pipeline abstraction consumed by the dispatch layer
//!
//! A pipeline is an opaque computation unit (an agent, a retrieval chain)
//! invoked with structured input and producing structured output, possibly
//! incrementally. The dispatch layer knows nothing about what happens inside
//! a pipeline; it only requires the operations defined here.
//!
//! # Cancellation
//!
//! Streaming implementations must tie resources to the returned stream:
//! when the dispatcher drops the stream (consumer disconnected), the
//! pipeline must stop producing and release whatever it was holding.

use crate::error::Result;
use crate::schema::Schema;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Lazy sequence of partial outputs produced by a streaming call
pub type OutputStream = BoxStream<'static, Result<Value>>;

/// Per-call configuration overrides carried alongside the input payload
///
/// Clients may send any subset of these fields; unknown keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Free-form labels attached to the run
    pub tags: Vec<String>,

    /// Caller-supplied run identifier; minted by the dispatcher when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,

    /// Arbitrary key-value context forwarded to the pipeline
    pub metadata: Map<String, Value>,

    /// Pipeline-specific configurable fields
    pub configurable: Map<String, Value>,

    /// Concurrency ceiling for batch calls; server default when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
}

impl RunConfig {
    /// Run id for this call, minting one if the client did not send one
    pub fn ensure_run_id(&mut self) -> Uuid {
        match self.run_id {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                self.run_id = Some(id);
                id
            }
        }
    }
}

/// One invocation, exclusively owned by the request's task
#[derive(Debug, Clone, Default)]
pub struct InvocationRequest {
    /// Schema-validated input payload
    pub input: Value,
    /// Per-call configuration overrides
    pub config: RunConfig,
    /// Extra keyword arguments; merged into configurable fields at dispatch
    pub kwargs: Map<String, Value>,
}

impl InvocationRequest {
    /// Build a request from an input payload with default config
    pub fn new(input: Value) -> Self {
        Self {
            input,
            config: RunConfig::default(),
            kwargs: Map::new(),
        }
    }

    /// Builder pattern: set the per-call config
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Builder pattern: set extra keyword arguments
    pub fn with_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }
}

/// An invokable computation exposed over the dispatch layer
///
/// Implementations must be Send + Sync; the dispatcher shares them across
/// concurrent request tasks behind an `Arc`.
///
/// Every pipeline describes its own shapes through the `describe_*`
/// operations. Schemas are captured once at registration and must not change
/// afterwards; schema drift across calls is a contract violation.
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Human-readable pipeline name, used in descriptors and logs
    fn name(&self) -> &str;

    /// Schema of accepted input payloads
    fn describe_input(&self) -> Schema;

    /// Schema of produced output payloads
    fn describe_output(&self) -> Schema;

    /// Schema of accepted configurable fields
    ///
    /// Defaults to an open object for pipelines with no configurable fields.
    fn describe_config(&self) -> Schema {
        Schema::object().title("config").build()
    }

    /// Invoke with a single input, producing a single output
    async fn call(&self, input: Value, config: &RunConfig) -> Result<Value>;

    /// Invoke with a batch of inputs, producing index-aligned outputs
    ///
    /// The default runs inputs sequentially through `call`. Pipelines with a
    /// native batch path should override this. Note the dispatcher's batch
    /// operation fans out over `call` itself so it can bound concurrency and
    /// report per-element errors; this method is the direct-embedding path.
    async fn call_batch(&self, inputs: Vec<Value>, config: &RunConfig) -> Result<Vec<Value>> {
        let mut outputs = Vec::with_capacity(inputs.len());
        for input in inputs {
            outputs.push(self.call(input, config).await?);
        }
        Ok(outputs)
    }

    /// Invoke with a single input, producing a lazy sequence of partial outputs
    ///
    /// The default yields the complete `call` output as a single chunk, so
    /// every pipeline is streamable.
    async fn call_stream(&self, input: Value, config: &RunConfig) -> Result<OutputStream> {
        let output = self.call(input, config).await?;
        Ok(futures::stream::once(async move { Ok(output) }).boxed())
    }
}
