//! Payload schema validation.
//!
//! Untrusted signing payloads are JSON documents checked against a
//! caller-supplied JSON Schema. Only a payload that passes the schema AND has
//! the expected primitive types for the domain tag and body becomes a
//! [`StructuredPayload`]; nothing else can construct one.

use serde_json::Value;

use crate::error::ValidationError;

/// Field holding the domain separator tag.
pub const FIELD_DOMAIN: &str = "ARC60Domain";
/// Field holding the body to sign.
pub const FIELD_BODY: &str = "bytes";

/// Maximum number of violations reported per payload (bounded for logs).
pub const MAX_VIOLATIONS: usize = 10;

/// Embedded ARC-60 schema: a closed object with string `ARC60Domain` and `bytes`.
pub const ARC60_SIMPLE_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/arc60_simple.schema.json"
));

/// A schema-validated signing payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredPayload {
    domain_tag: String,
    body: Vec<u8>,
}

impl StructuredPayload {
    pub(crate) fn new(domain_tag: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            domain_tag: domain_tag.into(),
            body: body.into(),
        }
    }

    pub fn domain_tag(&self) -> &str {
        &self.domain_tag
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Schemas arrive with the request, so `$ref` may only point inside the
/// document itself. Any `http://`, `https://` or `file://` target is refused.
struct NoExternalRefs;

impl jsonschema::Retrieve for NoExternalRefs {
    fn retrieve(
        &self,
        uri: &jsonschema::Uri<String>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        Err(format!("external schema reference not allowed: {uri}").into())
    }
}

/// A compiled payload schema, reusable across attempts.
pub struct PayloadSchema {
    validator: jsonschema::Validator,
}

impl std::fmt::Debug for PayloadSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadSchema").finish_non_exhaustive()
    }
}

impl PayloadSchema {
    /// Parse and compile a JSON Schema source.
    pub fn compile(schema_source: &str) -> Result<Self, ValidationError> {
        let schema: Value =
            serde_json::from_str(schema_source).map_err(|e| ValidationError::SchemaMalformed {
                reason: format!("schema is not valid JSON: {e}"),
            })?;

        let validator = jsonschema::options()
            .with_retriever(NoExternalRefs)
            .build(&schema)
            .map_err(|e| ValidationError::SchemaMalformed {
                reason: format!("failed to compile schema: {e}"),
            })?;

        Ok(Self { validator })
    }

    /// The embedded ARC-60 schema.
    pub fn arc60() -> Result<Self, ValidationError> {
        Self::compile(ARC60_SIMPLE_SCHEMA)
    }

    /// Parse `raw_payload`, check it against the schema and extract the typed fields.
    pub fn validate(&self, raw_payload: &str) -> Result<StructuredPayload, ValidationError> {
        let payload: Value =
            serde_json::from_str(raw_payload).map_err(|e| ValidationError::PayloadMalformed {
                reason: format!("payload is not valid JSON: {e}"),
            })?;

        if !self.validator.is_valid(&payload) {
            let violations = self
                .validator
                .iter_errors(&payload)
                .take(MAX_VIOLATIONS)
                .map(|e| e.to_string())
                .collect();
            return Err(ValidationError::SchemaViolation { violations });
        }

        extract(&payload)
    }
}

/// Validate `raw_payload` against `schema_source` in one step.
pub fn validate(schema_source: &str, raw_payload: &str) -> Result<StructuredPayload, ValidationError> {
    PayloadSchema::compile(schema_source)?.validate(raw_payload)
}

/// Pull the domain tag and body out of a schema-valid payload.
///
/// The caller's schema may be permissive, so the primitive types are checked
/// here regardless of what the schema said.
fn extract(payload: &Value) -> Result<StructuredPayload, ValidationError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| violation("payload must be a JSON object"))?;

    let domain_tag = match obj.get(FIELD_DOMAIN) {
        Some(Value::String(tag)) => tag.clone(),
        Some(other) => {
            return Err(violation(format!(
                "{FIELD_DOMAIN:?} must be a string, got {}",
                type_name(other)
            )))
        }
        None => return Err(violation(format!("{FIELD_DOMAIN:?} is required"))),
    };

    let body = match obj.get(FIELD_BODY) {
        Some(Value::String(text)) => text.as_bytes().to_vec(),
        Some(Value::Array(items)) => body_from_array(items)?,
        Some(other) => {
            return Err(violation(format!(
                "{FIELD_BODY:?} must be a string or byte array, got {}",
                type_name(other)
            )))
        }
        None => return Err(violation(format!("{FIELD_BODY:?} is required"))),
    };

    Ok(StructuredPayload::new(domain_tag, body))
}

fn body_from_array(items: &[Value]) -> Result<Vec<u8>, ValidationError> {
    items
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| violation(format!("{FIELD_BODY:?}[{i}] is not a byte (0..=255)")))
        })
        .collect()
}

fn violation(msg: impl Into<String>) -> ValidationError {
    ValidationError::SchemaViolation {
        violations: vec![msg.into()],
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
