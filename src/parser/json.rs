//! JSON Schema parsing. `serde_json::Value`'s default `Map` is a `BTreeMap`
//! (no `preserve_order` feature enabled), so re-serializing a parsed value
//! already yields object keys in sorted order — exactly the canonical form
//! `spec.md` §4.2 asks for, with no extra bookkeeping.

use serde_json::Value;

use super::{ParsedSchema, SchemaAst};
use crate::error::Error;

pub fn parse(text: &str) -> Result<ParsedSchema, Error> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| Error::InvalidSchema(e.to_string()))?;
    if !value.is_object() && !value.is_boolean() {
        return Err(Error::InvalidSchema(
            "a JSON Schema document must be an object or boolean".to_string(),
        ));
    }
    let canonical_text = serde_json::to_string(&value)?;
    let mut embedded_references = Vec::new();
    collect_refs(&value, &mut embedded_references);
    Ok(ParsedSchema {
        ast: SchemaAst::Json(Box::new(value)),
        canonical_text,
        embedded_references,
    })
}

pub fn as_value(parsed: &ParsedSchema) -> Option<&Value> {
    match &parsed.ast {
        SchemaAst::Json(v) => Some(v),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

/// Walks the document collecting every `$ref` target, so the caller can
/// decide whether each one resolves against the explicit `references[]`
/// list or is a local (`#/...`) pointer that needs no cross-subject lookup.
fn collect_refs(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(r)) = map.get("$ref") {
                out.push(r.clone());
            }
            for v in map.values() {
                collect_refs(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_refs(v, out);
            }
        }
        _ => {}
    }
}

/// External (non-local) `$ref` targets: anything that isn't a same-document
/// JSON Pointer (`#/...`). These must resolve against the schema's
/// `references[]` list, per `spec.md` §4.4 ("External `$ref` is resolved
/// against the reference set; if a reference cannot be resolved, the
/// verdict is `InvalidSchema`").
pub fn external_refs(parsed: &ParsedSchema) -> Vec<&str> {
    parsed
        .embedded_references
        .iter()
        .map(String::as_str)
        .filter(|r| !r.starts_with('#'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_key_order() {
        let a = parse(r#"{"type":"object","properties":{"b":1,"a":2}}"#).unwrap();
        let b = parse(r#"{"properties":{"a":2,"b":1},"type":"object"}"#).unwrap();
        assert_eq!(a.canonical_text, b.canonical_text);
    }

    #[test]
    fn collects_refs() {
        let parsed = parse(r#"{"properties":{"x":{"$ref":"other.json#/Foo"}}}"#).unwrap();
        assert_eq!(parsed.embedded_references, vec!["other.json#/Foo"]);
    }

    #[test]
    fn local_pointer_is_not_external() {
        let parsed = parse(r#"{"definitions":{"a":{}},"properties":{"x":{"$ref":"#/definitions/a"}}}"#).unwrap();
        assert!(external_refs(&parsed).is_empty());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(parse("{not json}").is_err());
    }

    #[test]
    fn rejects_empty_body() {
        assert!(super::parse("").is_err() || parse("").is_err());
    }
}
