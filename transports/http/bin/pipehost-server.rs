//! Pipehost demo server binary
//!
//! Hosts two demonstration pipelines behind the standard dispatch layer: an
//! agent that routes requests to built-in tools, and a retrieval pipeline
//! answering from a small built-in corpus. Real deployments register their
//! own `Pipeline` implementations through the same API.

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use pipehost_core::{OutputStream, Pipeline, RegistryBuilder, RunConfig, Schema};
use pipehost_http::{Config, PipelineServer};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Agent that dispatches to built-in tools by keyword
///
/// `calc <expr>` evaluates a binary arithmetic expression; anything else is
/// answered by the notes-search tool, which defers to the retrieval
/// pipeline.
struct ToolAgentPipeline;

#[async_trait]
impl Pipeline for ToolAgentPipeline {
    fn name(&self) -> &str {
        "tool-agent"
    }

    fn describe_input(&self) -> Schema {
        Schema::object()
            .title("AgentInput")
            .required("input", Schema::string())
            .closed()
            .build()
    }

    fn describe_output(&self) -> Schema {
        Schema::object()
            .title("AgentOutput")
            .required("output", Schema::string())
            .build()
    }

    async fn call(&self, input: Value, _config: &RunConfig) -> pipehost_core::Result<Value> {
        let text = input.get("input").and_then(Value::as_str).unwrap_or_default();

        let answer = match text.strip_prefix("calc ") {
            Some(expression) => calculator(expression)?,
            None => "Use the retrieval pipeline at /rag for knowledge queries".to_string(),
        };

        Ok(json!({"output": answer}))
    }

    async fn call_stream(
        &self,
        input: Value,
        config: &RunConfig,
    ) -> pipehost_core::Result<OutputStream> {
        let output = self.call(input, config).await?;
        let answer = output
            .get("output")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(stream_words(answer))
    }
}

/// Evaluate a binary arithmetic expression ("a <op> b")
fn calculator(expression: &str) -> pipehost_core::Result<String> {
    let parts: Vec<&str> = expression.split_whitespace().collect();
    let &[lhs, op, rhs] = parts.as_slice() else {
        return Err(pipehost_core::Error::Pipeline(format!(
            "calculator expects 'a <op> b', got '{}'",
            expression
        )));
    };

    let parse = |s: &str| {
        s.parse::<f64>()
            .map_err(|_| pipehost_core::Error::Pipeline(format!("'{}' is not a number", s)))
    };
    let (a, b) = (parse(lhs)?, parse(rhs)?);

    let result = match op {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        "/" if b != 0.0 => a / b,
        "/" => {
            return Err(pipehost_core::Error::Pipeline(
                "division by zero".to_string(),
            ))
        }
        other => {
            return Err(pipehost_core::Error::Pipeline(format!(
                "unsupported operator '{}'",
                other
            )))
        }
    };

    Ok(result.to_string())
}

/// Term-overlap retrieval over a built-in corpus
struct RetrievalPipeline {
    corpus: Vec<(&'static str, &'static str)>,
}

impl RetrievalPipeline {
    fn with_default_corpus() -> Self {
        Self {
            corpus: vec![
                (
                    "gradient-descent",
                    "Gradient descent updates parameters along the negative gradient of the loss, scaled by the learning rate.",
                ),
                (
                    "overfitting",
                    "Overfitting happens when a model memorizes training data; regularization and early stopping reduce it.",
                ),
                (
                    "embeddings",
                    "Embeddings map tokens to dense vectors so that semantic similarity becomes geometric proximity.",
                ),
                (
                    "attention",
                    "Attention lets a model weight tokens by relevance to the current position instead of fixed windows.",
                ),
            ],
        }
    }

    /// Best-overlap document for a query, if any term matches
    fn retrieve(&self, query: &str) -> Option<(&'static str, &'static str)> {
        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        self.corpus
            .iter()
            .map(|(title, body)| {
                let haystack = format!("{} {}", title, body).to_lowercase();
                let score = terms.iter().filter(|t| haystack.contains(*t)).count();
                (score, *title, *body)
            })
            .filter(|(score, _, _)| *score > 0)
            .max_by_key(|(score, _, _)| *score)
            .map(|(_, title, body)| (title, body))
    }
}

#[async_trait]
impl Pipeline for RetrievalPipeline {
    fn name(&self) -> &str {
        "rag-chain"
    }

    fn describe_input(&self) -> Schema {
        Schema::object()
            .title("RagInput")
            .required("query", Schema::string())
            .closed()
            .build()
    }

    fn describe_output(&self) -> Schema {
        Schema::object()
            .title("RagOutput")
            .required("answer", Schema::string())
            .required("sources", Schema::array(Schema::string()))
            .build()
    }

    async fn call(&self, input: Value, _config: &RunConfig) -> pipehost_core::Result<Value> {
        let query = input.get("query").and_then(Value::as_str).unwrap_or_default();

        match self.retrieve(query) {
            Some((title, body)) => Ok(json!({"answer": body, "sources": [title]})),
            None => Ok(json!({"answer": "No relevant notes found", "sources": []})),
        }
    }

    async fn call_stream(
        &self,
        input: Value,
        config: &RunConfig,
    ) -> pipehost_core::Result<OutputStream> {
        let output = self.call(input, config).await?;
        let answer = output
            .get("answer")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(stream_words(answer))
    }
}

/// Stream a text answer word by word, the way a token stream would arrive
fn stream_words(text: String) -> OutputStream {
    let words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    futures::stream::iter(words)
        .map(|word| Ok::<_, pipehost_core::Error>(json!({"output": word})))
        .boxed()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting pipehost server...");

    // Load configuration (optional TOML path as first argument)
    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref().map(Path::new))?;

    tracing::info!(
        "Configuration: bind={}, invoke_timeout={}s, batch_concurrency={}",
        config.server.bind_address(),
        config.dispatch.invoke_timeout_seconds,
        config.dispatch.batch_max_concurrency
    );

    // Register pipelines; the registry is immutable from here on
    let registry = RegistryBuilder::new()
        .register("agent", Arc::new(ToolAgentPipeline))?
        .register("rag", Arc::new(RetrievalPipeline::with_default_corpus()))?
        .build();

    let server = PipelineServer::new(
        config.server.bind_address(),
        registry,
        config.dispatch.options(),
    );

    // Serves until SIGTERM/SIGINT, then drains gracefully
    server.serve().await?;

    tracing::info!("pipehost server shutdown complete");
    Ok(())
}
