//! Pipeline registration and prefix routing
//!
//! The registry binds each pipeline to a URL prefix and captures its
//! descriptor (name, prefix, schemas) plus a pre-compiled input validator at
//! registration time. Registration happens once at process startup through
//! `RegistryBuilder`; the built `RouteRegistry` is immutable, so reads after
//! startup need no synchronization.

use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::schema::Schema;
use crate::validation::SchemaValidator;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Identity and declared shapes of a registered pipeline
///
/// Immutable once registered; owned by the registry for the process lifetime.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineDescriptor {
    /// Pipeline name as reported by the pipeline itself
    pub name: String,
    /// URL prefix the pipeline is served under (no slashes)
    pub prefix: String,
    /// Schema of accepted input payloads
    pub input_schema: Schema,
    /// Schema of produced output payloads
    pub output_schema: Schema,
    /// Schema of accepted configurable fields
    pub config_schema: Schema,
}

/// A pipeline bound to its descriptor and pre-compiled input validator
pub struct RegisteredPipeline {
    descriptor: PipelineDescriptor,
    pipeline: Arc<dyn Pipeline>,
    input_validator: SchemaValidator,
}

impl RegisteredPipeline {
    /// The captured descriptor
    pub fn descriptor(&self) -> &PipelineDescriptor {
        &self.descriptor
    }

    /// The pipeline instance
    pub fn pipeline(&self) -> &Arc<dyn Pipeline> {
        &self.pipeline
    }

    /// Validate a single input payload against the captured input schema
    pub fn validate_input(&self, payload: &Value) -> Result<()> {
        self.input_validator
            .validate(payload)
            .map_err(Error::Validation)
    }

    /// Validate a batch of input payloads; paths carry the element index
    pub fn validate_inputs(&self, payloads: &[Value]) -> Result<()> {
        self.input_validator
            .validate_batch(payloads)
            .map_err(Error::Validation)
    }
}

/// Builder for the route registry, used once at startup
pub struct RegistryBuilder {
    entries: HashMap<String, RegisteredPipeline>,
}

impl RegistryBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a pipeline under a URL prefix
    ///
    /// Captures the pipeline's schemas and compiles its input validator. A
    /// pipeline that cannot describe its own shape fails here, at startup,
    /// rather than on individual requests.
    ///
    /// # Errors
    ///
    /// * `Error::Registry` - Prefix is malformed or already taken
    /// * `Error::Schema` - A declared schema does not compile
    pub fn register(mut self, prefix: &str, pipeline: Arc<dyn Pipeline>) -> Result<Self> {
        let prefix = normalize_prefix(prefix)?;
        if self.entries.contains_key(&prefix) {
            return Err(Error::Registry(format!(
                "prefix '{}' is already registered",
                prefix
            )));
        }

        let input_schema = pipeline.describe_input();
        let output_schema = pipeline.describe_output();
        let config_schema = pipeline.describe_config();

        let input_validator = SchemaValidator::compile(&input_schema)?;
        // Output and config schemas are never used to validate requests, but
        // a shape the pipeline cannot express coherently is still a
        // registration failure.
        SchemaValidator::compile(&output_schema)?;
        SchemaValidator::compile(&config_schema)?;

        let descriptor = PipelineDescriptor {
            name: pipeline.name().to_string(),
            prefix: prefix.clone(),
            input_schema,
            output_schema,
            config_schema,
        };

        tracing::info!(
            pipeline = %descriptor.name,
            prefix = %prefix,
            "registered pipeline"
        );

        self.entries.insert(
            prefix,
            RegisteredPipeline {
                descriptor,
                pipeline,
                input_validator,
            },
        );

        Ok(self)
    }

    /// Finish building; the registry is immutable from here on
    pub fn build(self) -> RouteRegistry {
        RouteRegistry {
            entries: self.entries,
        }
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable prefix-to-pipeline table
///
/// Write-once at startup, read-many thereafter. The only process-wide shared
/// state in the dispatch layer.
pub struct RouteRegistry {
    entries: HashMap<String, RegisteredPipeline>,
}

impl RouteRegistry {
    /// Look up a pipeline by prefix (leading/trailing slashes tolerated)
    pub fn get(&self, prefix: &str) -> Option<&RegisteredPipeline> {
        self.entries.get(prefix.trim_matches('/'))
    }

    /// All registered prefixes, sorted for deterministic listings
    pub fn prefixes(&self) -> Vec<&str> {
        let mut prefixes: Vec<&str> = self.entries.keys().map(|s| s.as_str()).collect();
        prefixes.sort_unstable();
        prefixes
    }

    /// Number of registered pipelines
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Normalize and validate a URL prefix
fn normalize_prefix(raw: &str) -> Result<String> {
    let trimmed = raw.trim_matches('/');
    if trimmed.is_empty() {
        return Err(Error::Registry("prefix must not be empty".to_string()));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(Error::Registry(format!(
            "prefix '{}' contains invalid characters",
            trimmed
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RunConfig;
    use async_trait::async_trait;
    use serde_json::json;

    struct StubPipeline {
        input: Schema,
    }

    impl StubPipeline {
        fn text_in() -> Self {
            Self {
                input: Schema::object()
                    .required("text", Schema::string())
                    .closed()
                    .build(),
            }
        }

        fn broken() -> Self {
            Self {
                input: Schema::new(json!({"type": 123})),
            }
        }
    }

    #[async_trait]
    impl Pipeline for StubPipeline {
        fn name(&self) -> &str {
            "stub"
        }

        fn describe_input(&self) -> Schema {
            self.input.clone()
        }

        fn describe_output(&self) -> Schema {
            Schema::object().required("result", Schema::string()).build()
        }

        async fn call(&self, input: Value, _config: &RunConfig) -> Result<Value> {
            Ok(input)
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = RegistryBuilder::new()
            .register("agent", Arc::new(StubPipeline::text_in()))
            .unwrap()
            .build();

        assert_eq!(registry.len(), 1);
        assert!(registry.get("agent").is_some());
        assert!(registry.get("/agent/").is_some());
        assert!(registry.get("rag").is_none());
    }

    #[test]
    fn test_prefix_is_normalized() {
        let registry = RegistryBuilder::new()
            .register("/rag/", Arc::new(StubPipeline::text_in()))
            .unwrap()
            .build();

        let entry = registry.get("rag").unwrap();
        assert_eq!(entry.descriptor().prefix, "rag");
    }

    #[test]
    fn test_duplicate_prefix_rejected() {
        let result = RegistryBuilder::new()
            .register("agent", Arc::new(StubPipeline::text_in()))
            .unwrap()
            .register("agent", Arc::new(StubPipeline::text_in()));

        assert!(matches!(result, Err(Error::Registry(_))));
    }

    #[test]
    fn test_invalid_prefix_rejected() {
        for prefix in ["", "a/b", "a b", "agent!"] {
            let result =
                RegistryBuilder::new().register(prefix, Arc::new(StubPipeline::text_in()));
            assert!(matches!(result, Err(Error::Registry(_))), "prefix {:?}", prefix);
        }
    }

    #[test]
    fn test_broken_schema_fails_registration() {
        let result = RegistryBuilder::new().register("agent", Arc::new(StubPipeline::broken()));
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn test_descriptor_captures_schemas() {
        let registry = RegistryBuilder::new()
            .register("agent", Arc::new(StubPipeline::text_in()))
            .unwrap()
            .build();

        let descriptor = registry.get("agent").unwrap().descriptor();
        assert_eq!(descriptor.name, "stub");
        assert_eq!(
            descriptor.input_schema.as_value()["properties"]["text"]["type"],
            json!("string")
        );
        assert_eq!(
            descriptor.output_schema.as_value()["properties"]["result"]["type"],
            json!("string")
        );
    }

    #[test]
    fn test_validate_input_through_entry() {
        let registry = RegistryBuilder::new()
            .register("agent", Arc::new(StubPipeline::text_in()))
            .unwrap()
            .build();

        let entry = registry.get("agent").unwrap();
        assert!(entry.validate_input(&json!({"text": "hi"})).is_ok());
        assert!(matches!(
            entry.validate_input(&json!({})),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_prefixes_sorted() {
        let registry = RegistryBuilder::new()
            .register("rag", Arc::new(StubPipeline::text_in()))
            .unwrap()
            .register("agent", Arc::new(StubPipeline::text_in()))
            .unwrap()
            .build();

        assert_eq!(registry.prefixes(), vec!["agent", "rag"]);
    }
}
