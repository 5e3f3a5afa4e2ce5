//! Structural schemas for pipeline self-description
//!
//! Every pipeline declares the shapes it accepts and produces as explicit
//! schema values rather than through runtime reflection. A `Schema` wraps a
//! JSON Schema document: it is what the validator compiles, what the schema
//! introspection routes serve, and what registration captures into the
//! pipeline's descriptor.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A structural description of the data shapes a pipeline accepts or produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema(Value);

impl Schema {
    /// Wrap a raw JSON Schema value
    pub fn new(value: Value) -> Self {
        Schema(value)
    }

    /// Schema that accepts any value
    pub fn any() -> Self {
        Schema(json!({}))
    }

    /// `{"type": "string"}`
    pub fn string() -> Self {
        Schema(json!({"type": "string"}))
    }

    /// `{"type": "integer"}`
    pub fn integer() -> Self {
        Schema(json!({"type": "integer"}))
    }

    /// `{"type": "number"}`
    pub fn number() -> Self {
        Schema(json!({"type": "number"}))
    }

    /// `{"type": "boolean"}`
    pub fn boolean() -> Self {
        Schema(json!({"type": "boolean"}))
    }

    /// Array schema with the given item shape
    pub fn array(items: Schema) -> Self {
        Schema(json!({"type": "array", "items": items.0}))
    }

    /// Start building an object schema
    pub fn object() -> ObjectSchema {
        ObjectSchema::default()
    }

    /// Derive a schema from a Rust type via schemars
    ///
    /// Produces draft-07, which is what the validator compiles against.
    pub fn of<T: schemars::JsonSchema>() -> Self {
        let root = schemars::gen::SchemaGenerator::default().into_root_schema_for::<T>();
        Schema(serde_json::to_value(root).unwrap_or_else(|_| json!({})))
    }

    /// Borrow the underlying JSON Schema value
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Take the underlying JSON Schema value
    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Builder for object schemas
///
/// Closed schemas (`additionalProperties: false`) reject unknown fields;
/// open schemas pass them through.
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    title: Option<String>,
    properties: Map<String, Value>,
    required: Vec<String>,
    closed: bool,
}

impl ObjectSchema {
    /// Set the schema title
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Add a required field
    pub fn required(mut self, name: impl Into<String>, schema: Schema) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.properties.insert(name, schema.0);
        self
    }

    /// Add an optional field
    pub fn optional(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.properties.insert(name.into(), schema.0);
        self
    }

    /// Reject fields not declared in the schema
    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    /// Finish building
    pub fn build(self) -> Schema {
        let mut object = Map::new();
        object.insert("type".to_string(), json!("object"));
        if let Some(title) = self.title {
            object.insert("title".to_string(), json!(title));
        }
        object.insert("properties".to_string(), Value::Object(self.properties));
        if !self.required.is_empty() {
            object.insert("required".to_string(), json!(self.required));
        }
        if self.closed {
            object.insert("additionalProperties".to_string(), json!(false));
        }
        Schema(Value::Object(object))
    }
}
