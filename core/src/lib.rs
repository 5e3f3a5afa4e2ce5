//! Pipehost core - transport-agnostic invocation and streaming dispatch
//!
//! This crate provides the dispatch layer between wire transports and
//! registered pipelines, with no transport-specific dependencies.
//!
//! # Architecture
//!
//! The core is a pure library that:
//! - Defines the pipeline abstraction (`Pipeline` trait: describe, call,
//!   batch, stream)
//! - Validates request payloads against each pipeline's declared input
//!   schema before any invocation (`validation`)
//! - Executes invoke/batch/stream calls with timeouts, bounded concurrency,
//!   and cancellation propagation (`Dispatcher`)
//! - Maps every failure into a stable, structured error taxonomy (`Error`,
//!   `ErrorPayload`)
//! - Binds pipelines to URL prefixes through a write-once registry
//!   (`RouteRegistry`)
//!
//! Transport implementations (HTTP today) are separate crates that depend on
//! this one, look pipelines up in the registry, and hand invocations to the
//! dispatcher.
//!
//! # Example
//!
//! ```ignore
//! use pipehost_core::{Dispatcher, DispatchOptions, InvocationRequest, RegistryBuilder};
//! use std::sync::Arc;
//!
//! let registry = RegistryBuilder::new()
//!     .register("agent", Arc::new(my_pipeline))?
//!     .build();
//!
//! let dispatcher = Dispatcher::new(DispatchOptions::default());
//! let entry = registry.get("agent").expect("registered above");
//! entry.validate_input(&input)?;
//! let output = dispatcher
//!     .invoke(entry.pipeline(), InvocationRequest::new(input))
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dispatch;
pub mod event;
pub mod pipeline;
pub mod registry;
pub mod schema;
pub mod validation;

mod error;

pub use error::{Error, Result};

// Re-export key types for convenience
pub use dispatch::{DispatchOptions, Dispatcher, EventStream};
pub use event::{ErrorKind, ErrorPayload, StreamEvent};
pub use pipeline::{InvocationRequest, OutputStream, Pipeline, RunConfig};
pub use registry::{PipelineDescriptor, RegisteredPipeline, RegistryBuilder, RouteRegistry};
pub use schema::Schema;
