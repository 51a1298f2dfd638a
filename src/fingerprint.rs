//! Fingerprint — `spec.md` §4.2. Deterministic content-addressing hash over
//! `(schema_type, canonical_text, references[])`. `metadata` and `ruleSet`
//! never reach this module: they're envelope-level and must not perturb
//! the global ID (`spec.md` §4.2, §4.5 invariant).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Error;
use crate::parser::{self, ParsedSchema};
use crate::types::SchemaType;

/// A reference tuple, exactly as it contributes to the fingerprint hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaReference {
    pub name: String,
    pub subject: String,
    pub version: i32,
}

/// A stable, opaque content hash. Two `SchemaRecord`s with equal
/// fingerprints are, by definition, the same content-addressed schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Computes the fingerprint for a schema, canonicalizing per its type
/// before hashing. References contribute their `(name, subject, version)`
/// tuples sorted by `name`, so the hash is independent of the order the
/// caller happened to list them in, matching how the Avro/JSON
/// canonicalizers already sort structurally-unordered data.
pub fn compute(
    schema_type: SchemaType,
    schema_text: &str,
    references: &[SchemaReference],
) -> Result<Fingerprint, Error> {
    let canonical = canonicalize(schema_type, schema_text)?;
    Ok(hash_canonical(schema_type, &canonical, references))
}

/// Canonicalizes already-parsed schema text via the type-specific parser
/// output, useful when the caller has already parsed the schema (e.g.
/// `SubjectManager::register`) and doesn't want to parse twice.
pub fn compute_from_parsed(
    schema_type: SchemaType,
    parsed: &ParsedSchema,
    references: &[SchemaReference],
) -> Fingerprint {
    hash_canonical(schema_type, &parsed.canonical_text, references)
}

fn canonicalize(schema_type: SchemaType, schema_text: &str) -> Result<String, Error> {
    let parsed = parser::parse(schema_type, schema_text, &[])?;
    Ok(parsed.canonical_text)
}

fn hash_canonical(
    schema_type: SchemaType,
    canonical_text: &str,
    references: &[SchemaReference],
) -> Fingerprint {
    let mut sorted_references: Vec<&SchemaReference> = references.iter().collect();
    sorted_references.sort_by(|a, b| a.name.cmp(&b.name));

    let mut hasher = Sha256::new();
    hasher.update(schema_type.to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical_text.as_bytes());
    for r in sorted_references {
        hasher.update([0u8]);
        hasher.update(r.name.as_bytes());
        hasher.update([0u8]);
        hasher.update(r.subject.as_bytes());
        hasher.update([0u8]);
        hasher.update(r.version.to_le_bytes());
    }
    let digest = hasher.finalize();
    Fingerprint(base64::Engine::encode(
        &base64::engine::general_purpose::URL_SAFE_NO_PAD,
        digest,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_json_schemas_with_reordered_keys_fingerprint_equal() {
        let a = r#"{"type":"object","properties":{"a":{"type":"string"},"b":{"type":"integer"}}}"#;
        let b = r#"{"properties":{"b":{"type":"integer"},"a":{"type":"string"}},"type":"object"}"#;
        let fa = compute(SchemaType::Json, a, &[]).unwrap();
        let fb = compute(SchemaType::Json, b, &[]).unwrap();
        assert_eq!(fa, fb);
    }

    #[test]
    fn different_json_schemas_fingerprint_differently() {
        let a = r#"{"type":"object","properties":{"a":{"type":"string"}}}"#;
        let b = r#"{"type":"object","properties":{"a":{"type":"integer"}}}"#;
        let fa = compute(SchemaType::Json, a, &[]).unwrap();
        let fb = compute(SchemaType::Json, b, &[]).unwrap();
        assert_ne!(fa, fb);
    }

    #[test]
    fn references_contribute_to_the_hash() {
        let schema = r#"{"type":"object"}"#;
        let refs = vec![SchemaReference {
            name: "Base".into(),
            subject: "base-value".into(),
            version: 1,
        }];
        let f_no_refs = compute(SchemaType::Json, schema, &[]).unwrap();
        let f_with_refs = compute(SchemaType::Json, schema, &refs).unwrap();
        assert_ne!(f_no_refs, f_with_refs);
    }

    #[test]
    fn reference_order_does_not_affect_the_hash() {
        let schema = r#"{"type":"object"}"#;
        let a = SchemaReference {
            name: "A".into(),
            subject: "a-value".into(),
            version: 1,
        };
        let b = SchemaReference {
            name: "B".into(),
            subject: "b-value".into(),
            version: 1,
        };
        let f1 = compute(SchemaType::Json, schema, &[a.clone(), b.clone()]).unwrap();
        let f2 = compute(SchemaType::Json, schema, &[b, a]).unwrap();
        assert_eq!(f1, f2);
    }

    #[test]
    fn whitespace_only_differences_in_json_fingerprint_equal() {
        let a = r#"{"type": "string"}"#;
        let b = r#"{"type":"string"}"#;
        assert_eq!(
            compute(SchemaType::Json, a, &[]).unwrap(),
            compute(SchemaType::Json, b, &[]).unwrap()
        );
    }
}
