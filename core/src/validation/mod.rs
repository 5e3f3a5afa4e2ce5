//! Request payload validation
//!
//! Validates incoming payloads against a pipeline's declared input schema
//! before any invocation happens. A rejected payload never reaches the
//! pipeline. Validation errors carry the offending field path as a JSON
//! pointer for diagnosability.
//!
//! # Usage
//!
//! ```ignore
//! use pipehost_core::schema::Schema;
//! use pipehost_core::validation::SchemaValidator;
//!
//! // Compiled once at registration, reused for every request
//! let schema = Schema::object().required("text", Schema::string()).build();
//! let validator = SchemaValidator::compile(&schema)?;
//!
//! match validator.validate(&payload) {
//!     Ok(()) => { /* dispatch the invocation */ }
//!     Err(errors) => { /* return a validation error, pipeline untouched */ }
//! }
//! ```

mod error;

pub use error::{ValidationConstraint, ValidationError};

use crate::error::{Error, Result};
use crate::schema::Schema;
use jsonschema::{ValidationError as JsonSchemaError, Validator};
use serde_json::Value;

/// Pre-compiled validator for one pipeline's input schema
pub struct SchemaValidator {
    /// Original schema, served by the introspection routes
    schema: Schema,
    /// Pre-compiled validator
    compiled: Validator,
}

impl SchemaValidator {
    /// Compile a schema for validation
    ///
    /// Compilation happens once at pipeline registration; a schema that does
    /// not compile fails registration, not individual requests.
    pub fn compile(schema: &Schema) -> Result<Self> {
        // Draft 7 is what schemars generates
        let compiled = jsonschema::draft7::new(schema.as_value())
            .map_err(|e| Error::Schema(format!("schema does not compile: {}", e)))?;

        Ok(Self {
            schema: schema.clone(),
            compiled,
        })
    }

    /// The schema this validator was compiled from
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Validate a payload against the schema
    ///
    /// Collects every violation rather than stopping at the first, so a
    /// client sees all offending fields in one round trip.
    pub fn validate(&self, payload: &Value) -> std::result::Result<(), Vec<ValidationError>> {
        if self.compiled.validate(payload).is_ok() {
            return Ok(());
        }

        let errors: Vec<ValidationError> = self
            .compiled
            .iter_errors(payload)
            .map(convert_jsonschema_error)
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate a batch of payloads
    ///
    /// Field paths are prefixed with the element index ("/0/text"), so a
    /// client can tell which batch element was rejected. Any invalid element
    /// rejects the whole batch before a single pipeline call happens.
    pub fn validate_batch(
        &self,
        payloads: &[Value],
    ) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for (index, payload) in payloads.iter().enumerate() {
            if let Err(element_errors) = self.validate(payload) {
                errors.extend(element_errors.into_iter().map(|error| {
                    let suffix = error.path.trim_start_matches('/');
                    let path = if suffix.is_empty() {
                        format!("/{}", index)
                    } else {
                        format!("/{}/{}", index, suffix)
                    };
                    error.at_path(path)
                }));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Convert a jsonschema error to our ValidationError type
fn convert_jsonschema_error(error: JsonSchemaError<'_>) -> ValidationError {
    let path = format!("/{}", error.instance_path);
    let (constraint, expected, received) = extract_constraint_info(&error);

    ValidationError::new(path, constraint, expected, received)
}

/// Extract constraint type and expected/received values from a jsonschema error
fn extract_constraint_info(error: &JsonSchemaError<'_>) -> (ValidationConstraint, String, String) {
    use jsonschema::error::ValidationErrorKind;

    let instance_str = error.instance.to_string();

    match &error.kind {
        ValidationErrorKind::Type { kind } => {
            let expected_type = format!("{:?}", kind);
            (
                ValidationConstraint::Type,
                expected_type.to_lowercase(),
                describe_value_type(&error.instance),
            )
        }
        ValidationErrorKind::Required { property } => (
            ValidationConstraint::Required,
            format!("field {}", property),
            "(missing)".to_string(),
        ),
        ValidationErrorKind::Minimum { limit } => (
            ValidationConstraint::Minimum,
            limit.to_string(),
            instance_str,
        ),
        ValidationErrorKind::Maximum { limit } => (
            ValidationConstraint::Maximum,
            limit.to_string(),
            instance_str,
        ),
        ValidationErrorKind::ExclusiveMinimum { limit } => (
            ValidationConstraint::ExclusiveMinimum,
            limit.to_string(),
            instance_str,
        ),
        ValidationErrorKind::ExclusiveMaximum { limit } => (
            ValidationConstraint::ExclusiveMaximum,
            limit.to_string(),
            instance_str,
        ),
        ValidationErrorKind::Enum { options } => {
            let options_str = if let Some(arr) = options.as_array() {
                arr.iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            } else {
                options.to_string()
            };
            (ValidationConstraint::Enum, options_str, instance_str)
        }
        ValidationErrorKind::Pattern { pattern } => (
            ValidationConstraint::Pattern,
            pattern.to_string(),
            instance_str,
        ),
        ValidationErrorKind::MinLength { limit } => (
            ValidationConstraint::MinLength,
            limit.to_string(),
            format!("{} characters", instance_str.len().saturating_sub(2)),
        ),
        ValidationErrorKind::MaxLength { limit } => (
            ValidationConstraint::MaxLength,
            limit.to_string(),
            format!("{} characters", instance_str.len().saturating_sub(2)),
        ),
        ValidationErrorKind::MinItems { limit } => {
            let count = error.instance.as_array().map(|a| a.len()).unwrap_or(0);
            (
                ValidationConstraint::MinItems,
                limit.to_string(),
                format!("{} items", count),
            )
        }
        ValidationErrorKind::MaxItems { limit } => {
            let count = error.instance.as_array().map(|a| a.len()).unwrap_or(0);
            (
                ValidationConstraint::MaxItems,
                limit.to_string(),
                format!("{} items", count),
            )
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => (
            ValidationConstraint::AdditionalProperties,
            "no additional fields".to_string(),
            unexpected.join(", "),
        ),
        ValidationErrorKind::Format { format } => (
            ValidationConstraint::Format,
            format.to_string(),
            instance_str,
        ),
        _ => (
            ValidationConstraint::Other(format!("{:?}", error.kind)),
            "constraint".to_string(),
            instance_str,
        ),
    }
}

/// Get a human-readable description of a JSON value's type
fn describe_value_type(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer".to_string()
            } else {
                "number".to_string()
            }
        }
        Value::String(_) => "string".to_string(),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn closed_validator() -> SchemaValidator {
        let schema = Schema::object()
            .required("text", Schema::string())
            .optional("limit", Schema::integer())
            .closed()
            .build();
        SchemaValidator::compile(&schema).unwrap()
    }

    fn open_validator() -> SchemaValidator {
        let schema = Schema::object().required("text", Schema::string()).build();
        SchemaValidator::compile(&schema).unwrap()
    }

    #[test]
    fn test_valid_payload() {
        let validator = closed_validator();
        let payload = json!({"text": "hi", "limit": 3});
        assert!(validator.validate(&payload).is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let validator = closed_validator();
        let errors = validator.validate(&json!({})).unwrap_err();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].constraint, ValidationConstraint::Required);
        assert!(errors[0].message.contains("text"));
    }

    #[test]
    fn test_wrong_type() {
        let validator = closed_validator();
        let errors = validator.validate(&json!({"text": 42})).unwrap_err();

        assert!(errors
            .iter()
            .any(|e| e.constraint == ValidationConstraint::Type && e.path == "/text"));
    }

    #[test]
    fn test_closed_schema_rejects_unknown_field() {
        let validator = closed_validator();
        let errors = validator
            .validate(&json!({"text": "hi", "extra": true}))
            .unwrap_err();

        assert!(errors
            .iter()
            .any(|e| e.constraint == ValidationConstraint::AdditionalProperties));
        assert!(errors.iter().any(|e| e.received.contains("extra")));
    }

    #[test]
    fn test_open_schema_passes_unknown_field() {
        let validator = open_validator();
        let payload = json!({"text": "hi", "extra": true});
        assert!(validator.validate(&payload).is_ok());
    }

    #[test]
    fn test_multiple_errors_collected() {
        let validator = closed_validator();
        let errors = validator
            .validate(&json!({"text": 1, "limit": "three"}))
            .unwrap_err();

        assert!(errors.len() >= 2);
    }

    #[test]
    fn test_nested_field_path() {
        let schema = Schema::object()
            .required(
                "retriever",
                Schema::object().required("k", Schema::integer()).build(),
            )
            .build();
        let validator = SchemaValidator::compile(&schema).unwrap();

        let errors = validator
            .validate(&json!({"retriever": {"k": "five"}}))
            .unwrap_err();

        assert!(errors[0].path.contains("retriever"));
        assert!(errors[0].path.contains("k"));
    }

    #[test]
    fn test_batch_paths_carry_element_index() {
        let validator = closed_validator();
        let payloads = vec![json!({"text": "ok"}), json!({"text": 42}), json!({})];

        let errors = validator.validate_batch(&payloads).unwrap_err();

        assert!(errors.iter().any(|e| e.path.starts_with("/1")));
        assert!(errors.iter().any(|e| e.path.starts_with("/2")));
        assert!(!errors.iter().any(|e| e.path.starts_with("/0")));
    }

    #[test]
    fn test_batch_all_valid() {
        let validator = closed_validator();
        let payloads = vec![json!({"text": "a"}), json!({"text": "b"})];
        assert!(validator.validate_batch(&payloads).is_ok());
    }

    #[test]
    fn test_malformed_schema_fails_compilation() {
        let schema = Schema::new(json!({"type": 123}));
        let result = SchemaValidator::compile(&schema);
        assert!(matches!(result, Err(Error::Schema(_))));
    }
}
