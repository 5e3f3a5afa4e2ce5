//! Validation error types
//!
//! Structured error types for request payload validation failures.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Constraint type that was violated
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationConstraint {
    /// Value has wrong JSON type (e.g., string instead of number)
    Type,
    /// Required field is missing
    Required,
    /// Numeric value below minimum
    Minimum,
    /// Numeric value above maximum
    Maximum,
    /// Numeric value at or below exclusive minimum
    ExclusiveMinimum,
    /// Numeric value at or above exclusive maximum
    ExclusiveMaximum,
    /// Value not in allowed enum set
    Enum,
    /// String doesn't match regex pattern
    Pattern,
    /// String shorter than minimum length
    MinLength,
    /// String longer than maximum length
    MaxLength,
    /// Array has fewer items than minimum
    MinItems,
    /// Array has more items than maximum
    MaxItems,
    /// Object has fields not allowed by a closed schema
    AdditionalProperties,
    /// Value doesn't match format (e.g., "uri", "email")
    Format,
    /// Other JSON Schema constraint
    Other(String),
}

impl ValidationConstraint {
    /// Get a human-readable description of this constraint type
    pub fn description(&self) -> &str {
        match self {
            ValidationConstraint::Type => "type mismatch",
            ValidationConstraint::Required => "required field missing",
            ValidationConstraint::Minimum => "value below minimum",
            ValidationConstraint::Maximum => "value above maximum",
            ValidationConstraint::ExclusiveMinimum => "value at or below exclusive minimum",
            ValidationConstraint::ExclusiveMaximum => "value at or above exclusive maximum",
            ValidationConstraint::Enum => "value not in allowed set",
            ValidationConstraint::Pattern => "string doesn't match pattern",
            ValidationConstraint::MinLength => "string too short",
            ValidationConstraint::MaxLength => "string too long",
            ValidationConstraint::MinItems => "array has too few items",
            ValidationConstraint::MaxItems => "array has too many items",
            ValidationConstraint::AdditionalProperties => "unexpected field",
            ValidationConstraint::Format => "invalid format",
            ValidationConstraint::Other(_) => "constraint violation",
        }
    }
}

impl fmt::Display for ValidationConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationConstraint::Other(s) => write!(f, "{}", s),
            _ => write!(f, "{}", self.description()),
        }
    }
}

/// A single validation error for a request payload field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// JSON pointer path to the offending field (e.g., "/text")
    pub path: String,
    /// Type of constraint violated
    pub constraint: ValidationConstraint,
    /// Human-readable expected value description
    pub expected: String,
    /// String representation of the actual value
    pub received: String,
    /// Complete error message
    pub message: String,
}

impl ValidationError {
    /// Create a new validation error with auto-generated message
    pub fn new(
        path: impl Into<String>,
        constraint: ValidationConstraint,
        expected: impl Into<String>,
        received: impl Into<String>,
    ) -> Self {
        let path = path.into();
        let expected = expected.into();
        let received = received.into();

        let message = Self::format_message(&path, &constraint, &expected, &received);

        Self {
            path,
            constraint,
            expected,
            received,
            message,
        }
    }

    /// Format a human-readable error message
    fn format_message(
        path: &str,
        constraint: &ValidationConstraint,
        expected: &str,
        received: &str,
    ) -> String {
        // Extract field name from JSON pointer path
        let field_name = path.trim_start_matches('/').replace('/', ".");
        let field_display = if field_name.is_empty() {
            "(root)".to_string()
        } else {
            format!("'{}'", field_name)
        };

        match constraint {
            ValidationConstraint::Type => {
                format!(
                    "field {} expected type '{}', got {}",
                    field_display, expected, received
                )
            }
            ValidationConstraint::Required => {
                // For Required errors, the field name is in the expected field
                // (format: "field 'name'")
                format!("required {} is missing", expected)
            }
            ValidationConstraint::Minimum => {
                format!(
                    "field {} must be >= {}, got {}",
                    field_display, expected, received
                )
            }
            ValidationConstraint::Maximum => {
                format!(
                    "field {} must be <= {}, got {}",
                    field_display, expected, received
                )
            }
            ValidationConstraint::ExclusiveMinimum => {
                format!(
                    "field {} must be > {}, got {}",
                    field_display, expected, received
                )
            }
            ValidationConstraint::ExclusiveMaximum => {
                format!(
                    "field {} must be < {}, got {}",
                    field_display, expected, received
                )
            }
            ValidationConstraint::Enum => {
                format!(
                    "field {} must be one of [{}], got {}",
                    field_display, expected, received
                )
            }
            ValidationConstraint::Pattern => {
                format!(
                    "field {} must match pattern '{}', got {}",
                    field_display, expected, received
                )
            }
            ValidationConstraint::MinLength => {
                format!(
                    "field {} must have length >= {}, got {}",
                    field_display, expected, received
                )
            }
            ValidationConstraint::MaxLength => {
                format!(
                    "field {} must have length <= {}, got {}",
                    field_display, expected, received
                )
            }
            ValidationConstraint::MinItems => {
                format!(
                    "field {} must have at least {} items, got {}",
                    field_display, expected, received
                )
            }
            ValidationConstraint::MaxItems => {
                format!(
                    "field {} must have at most {} items, got {}",
                    field_display, expected, received
                )
            }
            ValidationConstraint::AdditionalProperties => {
                format!(
                    "field {} contains unexpected field(s): {}",
                    field_display, received
                )
            }
            ValidationConstraint::Format => {
                format!(
                    "field {} must be a valid '{}', got {}",
                    field_display, expected, received
                )
            }
            ValidationConstraint::Other(constraint_name) => {
                format!(
                    "field {} failed constraint '{}': expected {}, got {}",
                    field_display, constraint_name, expected, received
                )
            }
        }
    }

    /// Rebuild this error under a new path, regenerating the message.
    ///
    /// Used to prefix batch element indices onto field paths.
    pub fn at_path(self, path: impl Into<String>) -> Self {
        Self::new(path, self.constraint, self.expected, self.received)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationError {}
