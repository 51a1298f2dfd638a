//! SchemaParser — `spec.md` §4.3. `parse(type, text) -> (ast, embedded_refs,
//! errors)` for Avro, Protobuf, and JSON Schema, producing a typed AST plus
//! the set of references embedded in the text itself (protobuf `import`
//! statements, JSON `$ref` targets). Avro has no such embedded-reference
//! syntax — all cross-schema references are supplied explicitly by the
//! caller via `SchemaReference`, per `spec.md` §4.2.

pub mod avro;
pub mod json;
pub mod protobuf;

use crate::error::Error;
use crate::fingerprint::SchemaReference;
use crate::types::SchemaType;

/// The typed AST for a successfully parsed schema, one variant per
/// supported schema language. Kept behind their crate features so a build
/// that only needs Avro doesn't pull in the protobuf/json toolchains.
#[derive(Debug, Clone)]
pub enum SchemaAst {
    #[cfg(feature = "avro")]
    Avro(Box<apache_avro::Schema>),
    #[cfg(feature = "proto")]
    Protobuf(Box<protobuf::ProtoFile>),
    #[cfg(feature = "json")]
    Json(Box<serde_json::Value>),
}

/// The output of parsing: the typed AST, the canonical text used for
/// fingerprinting, and any references the schema text itself names (as
/// opposed to the `references[]` the caller supplies explicitly).
#[derive(Debug, Clone)]
pub struct ParsedSchema {
    pub ast: SchemaAst,
    pub canonical_text: String,
    /// Import targets / `$ref` targets found inside the schema text.
    /// These are *names*, not yet resolved `(subject, version)` pairs —
    /// resolution against the explicit `references[]` list and the Store
    /// happens in `CompatibilityChecker`/`SubjectManager`.
    pub embedded_references: Vec<String>,
}

/// Parses `text` as `schema_type`, resolving `google.protobuf.*` well-known
/// types without any external lookup (Protobuf only) and exposing `$ref`
/// targets (JSON only). Malformed input yields [`Error::InvalidSchema`]
/// (`spec.md` error code `42201`).
pub fn parse(
    schema_type: SchemaType,
    text: &str,
    _references: &[SchemaReference],
) -> Result<ParsedSchema, Error> {
    if text.trim().is_empty() {
        return Err(Error::EmptySchemaBody);
    }
    match schema_type {
        #[cfg(feature = "avro")]
        SchemaType::Avro => avro::parse(text),
        #[cfg(not(feature = "avro"))]
        SchemaType::Avro => Err(Error::InvalidSchema(
            "this build was compiled without avro support".to_string(),
        )),
        #[cfg(feature = "proto")]
        SchemaType::Protobuf => protobuf::parse(text),
        #[cfg(not(feature = "proto"))]
        SchemaType::Protobuf => Err(Error::InvalidSchema(
            "this build was compiled without protobuf support".to_string(),
        )),
        #[cfg(feature = "json")]
        SchemaType::Json => json::parse(text),
        #[cfg(not(feature = "json"))]
        SchemaType::Json => Err(Error::InvalidSchema(
            "this build was compiled without json schema support".to_string(),
        )),
    }
}
