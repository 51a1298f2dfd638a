//! CompatibilityChecker — `spec.md` §4.4. Directional compatibility
//! verdicts, transitive expansion across the active-version set,
//! compatibility-group filtering, and JSON external-`$ref` resolution.
//! Hand-written against the per-type algorithms `spec.md` sketches rather
//! than wrapping an upstream compatibility library, per the explicit
//! Non-goal in `spec.md` §1.

pub mod avro;
pub mod json;
pub mod protobuf;

use crate::error::Error;
use crate::fingerprint::SchemaReference;
use crate::parser::ParsedSchema;
use crate::types::CompatibilityLevel;

/// A candidate being registered, already parsed.
pub struct Candidate<'a> {
    pub parsed: &'a ParsedSchema,
    pub references: &'a [SchemaReference],
}

/// An existing active version entered into the compatibility set.
pub struct Existing<'a> {
    pub parsed: &'a ParsedSchema,
    pub references: &'a [SchemaReference],
    /// The value of the `compatibilityGroup`-named metadata property, if
    /// any. `spec.md` §4.4: "Records in different compatibility groups ...
    /// are not compared; empty-group records compare to all."
    pub compatibility_group: Option<&'a str>,
}

/// Resolves a `(subject, version)` reference — or a JSON external `$ref`
/// target once mapped through the schema's `references[]` list — to the
/// referenced schema's parsed form. Supplied by `SubjectManager`, which has
/// `Store` access; this module stays storage-agnostic.
pub trait ReferenceResolver {
    fn resolve(&self, reference: &SchemaReference) -> Option<ParsedSchema>;
}

/// Runs the directional check `level` asks for between `candidate` and the
/// `existing` active-version set (already filtered to exclude soft-deleted
/// versions by the caller, per `spec.md` §4.4: "Soft-deleted versions are
/// excluded from the check set"). `existing` must be ordered oldest-first;
/// the last element is "latest".
///
/// Returns `Ok(())` when compatible, `Err(Error::CompatibilityViolation)`
/// otherwise (never any other error variant for a plain incompatibility —
/// parse/reference failures surface as their own variants).
pub fn check(
    level: CompatibilityLevel,
    candidate: &Candidate<'_>,
    candidate_group: Option<&str>,
    existing: &[Existing<'_>],
    resolver: &dyn ReferenceResolver,
) -> Result<(), Error> {
    if level == CompatibilityLevel::None {
        return Ok(());
    }

    let in_group: Vec<&Existing<'_>> = existing
        .iter()
        .filter(|e| groups_compare(candidate_group, e.compatibility_group))
        .collect();

    if in_group.is_empty() {
        return Ok(());
    }

    let latest = *in_group.last().expect("non-empty checked above");

    if level.checks_backward() {
        let targets: Vec<&Existing<'_>> = if level.is_transitive() {
            in_group.clone()
        } else {
            vec![latest]
        };
        for existing in targets {
            backward_pair(candidate, existing, resolver)?;
        }
    }

    if level.checks_forward() {
        let targets: Vec<&Existing<'_>> = if level.is_transitive() {
            in_group
        } else {
            vec![latest]
        };
        for existing in targets {
            forward_pair(candidate, existing, resolver)?;
        }
    }

    Ok(())
}

fn groups_compare(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

/// `candidate reads existing`: the new schema must be able to decode data
/// produced under the old one.
fn backward_pair(
    candidate: &Candidate<'_>,
    existing: &Existing<'_>,
    resolver: &dyn ReferenceResolver,
) -> Result<(), Error> {
    directional(candidate.parsed, existing.parsed, resolver).map_err(|failure| {
        failure.into_error("existing version (BACKWARD)")
    })
}

/// `existing reads candidate`: the old schema must still be able to decode
/// data produced under the new one.
fn forward_pair(
    candidate: &Candidate<'_>,
    existing: &Existing<'_>,
    resolver: &dyn ReferenceResolver,
) -> Result<(), Error> {
    directional(existing.parsed, candidate.parsed, resolver).map_err(|failure| {
        failure.into_error("existing version (FORWARD)")
    })
}

/// Why a directional check failed. Plain structural incompatibility becomes
/// `Error::CompatibilityViolation`; an unresolvable external JSON `$ref`
/// surfaces as `Error::InvalidSchema` instead, per `spec.md` §4.4.
enum CheckFailure {
    Incompatible(Vec<String>),
    UnresolvedReference(String),
}

impl CheckFailure {
    fn into_error(self, against: &str) -> Error {
        match self {
            CheckFailure::Incompatible(reasons) => Error::CompatibilityViolation {
                against: against.to_string(),
                reason: reasons.join("; "),
            },
            CheckFailure::UnresolvedReference(r) => {
                Error::InvalidSchema(format!("unresolved schema reference '{r}'"))
            }
        }
    }
}

/// `reader` must be able to decode data written by `writer`. Dispatches to
/// the per-type algorithm by matching on the parsed ASTs; a type mismatch
/// between reader and writer (e.g. comparing an Avro schema against a
/// Protobuf one) is itself incompatible, not an error — that should never
/// happen in practice since a subject's `schema_type` is fixed at creation.
fn directional(
    reader: &ParsedSchema,
    writer: &ParsedSchema,
    resolver: &dyn ReferenceResolver,
) -> Result<(), CheckFailure> {
    use crate::parser::SchemaAst;

    match (&reader.ast, &writer.ast) {
        #[cfg(feature = "avro")]
        (SchemaAst::Avro(r), SchemaAst::Avro(w)) => {
            avro::check_reads(r, w).map_err(CheckFailure::Incompatible)
        }
        #[cfg(feature = "proto")]
        (SchemaAst::Protobuf(r), SchemaAst::Protobuf(w)) => {
            protobuf::check_reads(r, w).map_err(CheckFailure::Incompatible)
        }
        #[cfg(feature = "json")]
        (SchemaAst::Json(r), SchemaAst::Json(w)) => {
            json::check_reads(r, w, resolver).map_err(|e| match e {
                json::JsonCheckError::Incompatible(reasons) => {
                    CheckFailure::Incompatible(reasons)
                }
                json::JsonCheckError::UnresolvedReference(r) => {
                    CheckFailure::UnresolvedReference(r)
                }
            })
        }
        #[allow(unreachable_patterns)]
        _ => Err(CheckFailure::Incompatible(vec![
            "schema type mismatch between versions".to_string(),
        ])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::types::SchemaType;

    struct NoRefs;
    impl ReferenceResolver for NoRefs {
        fn resolve(&self, _reference: &SchemaReference) -> Option<ParsedSchema> {
            None
        }
    }

    #[test]
    fn none_level_is_always_compatible() {
        let a = parser::parse(SchemaType::Json, r#"{"type":"string"}"#, &[]).unwrap();
        let b = parser::parse(SchemaType::Json, r#"{"type":"integer"}"#, &[]).unwrap();
        let candidate = Candidate {
            parsed: &b,
            references: &[],
        };
        let existing = Existing {
            parsed: &a,
            references: &[],
            compatibility_group: None,
        };
        assert!(check(
            CompatibilityLevel::None,
            &candidate,
            None,
            &[existing],
            &NoRefs
        )
        .is_ok());
    }

    #[test]
    fn distinct_compatibility_groups_are_not_compared() {
        let a = parser::parse(SchemaType::Json, r#"{"type":"string"}"#, &[]).unwrap();
        let b = parser::parse(SchemaType::Json, r#"{"type":"integer"}"#, &[]).unwrap();
        let candidate = Candidate {
            parsed: &b,
            references: &[],
        };
        let existing = Existing {
            parsed: &a,
            references: &[],
            compatibility_group: Some("group-a"),
        };
        // Incompatible types, but different groups means no comparison at all.
        assert!(check(
            CompatibilityLevel::Full,
            &candidate,
            Some("group-b"),
            &[existing],
            &NoRefs
        )
        .is_ok());
    }

    #[test]
    fn empty_group_candidate_compares_to_all() {
        let a = parser::parse(SchemaType::Json, r#"{"type":"string"}"#, &[]).unwrap();
        let b = parser::parse(SchemaType::Json, r#"{"type":"integer"}"#, &[]).unwrap();
        let candidate = Candidate {
            parsed: &b,
            references: &[],
        };
        let existing = Existing {
            parsed: &a,
            references: &[],
            compatibility_group: Some("group-a"),
        };
        assert!(check(
            CompatibilityLevel::Full,
            &candidate,
            None,
            &[existing],
            &NoRefs
        )
        .is_err());
    }
}
