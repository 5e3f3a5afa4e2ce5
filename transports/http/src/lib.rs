//! Pipehost HTTP transport
//!
//! Exposes registered pipelines over HTTP/REST with SSE streaming:
//! - `server`: axum router and `PipelineServer` (invoke, batch, stream,
//!   schema introspection, liveness)
//! - `sse`: the streaming encoder turning dispatcher events into SSE frames
//! - `client`: reqwest client SDK mirroring the server surface
//! - `config`: TOML/env configuration for the hosting process
//! - `error`: transport errors and the core-error-to-response mapper
//!
//! The core dispatch semantics (validation before invocation, timeouts,
//! bounded batch concurrency, stream cancellation) live in `pipehost-core`;
//! this crate only translates them to and from the wire.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod server;
pub mod sse;

pub use client::{ClientEventStream, PipehostClient};
pub use config::Config;
pub use error::{ApiError, Error, Result};
pub use server::{build_router, AppState, PipelineServer};
