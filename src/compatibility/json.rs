//! JSON Schema directional compatibility, per `spec.md` §4.4: widening a
//! constraint (loosening `required`, `additionalProperties`, numeric/string/
//! array bounds, `multipleOf`, `uniqueItems`, `const`, `pattern`, `format`,
//! `contains`/`propertyNames`/`dependentRequired`, or the `enum` set, and
//! every `allOf`/`anyOf`/`oneOf`/`not` branch) is backward-compatible;
//! tightening is not. External `$ref` targets resolve against the schema's
//! `references[]` list; an unresolvable one surfaces as `InvalidSchema`
//! rather than a plain incompatibility verdict.
//!
//! `pattern`/`format`/`not` changes can't be shown compatible without a
//! full regex/format-semantics engine, so any change there is treated
//! conservatively as a potential tightening rather than silently accepted.

use serde_json::Value;

use super::ReferenceResolver;
use crate::fingerprint::SchemaReference;

pub enum JsonCheckError {
    Incompatible(Vec<String>),
    UnresolvedReference(String),
}

pub fn check_reads(
    reader: &Value,
    writer: &Value,
    resolver: &dyn ReferenceResolver,
) -> Result<(), JsonCheckError> {
    let mut reasons = Vec::new();
    reads_inner(reader, writer, resolver, &mut reasons)?;
    if reasons.is_empty() {
        Ok(())
    } else {
        Err(JsonCheckError::Incompatible(reasons))
    }
}

fn reads_inner(
    reader: &Value,
    writer: &Value,
    resolver: &dyn ReferenceResolver,
    reasons: &mut Vec<String>,
) -> Result<(), JsonCheckError> {
    let reader = resolve_ref(reader, resolver)?;
    let writer = resolve_ref(writer, resolver)?;

    let (Value::Object(r), Value::Object(w)) = (reader, writer) else {
        return Ok(());
    };

    if let (Some(rt), Some(wt)) = (r.get("type"), w.get("type")) {
        if rt != wt {
            reasons.push(format!("'type' changed from {wt} to {rt}"));
        }
    }

    check_numeric_bound(&r, &w, "minimum", false, reasons);
    check_numeric_bound(&r, &w, "maximum", true, reasons);
    check_numeric_bound(&r, &w, "minLength", false, reasons);
    check_numeric_bound(&r, &w, "maxLength", true, reasons);
    check_numeric_bound(&r, &w, "minItems", false, reasons);
    check_numeric_bound(&r, &w, "maxItems", true, reasons);
    check_numeric_bound(&r, &w, "minContains", false, reasons);
    check_numeric_bound(&r, &w, "maxContains", true, reasons);

    check_required(&r, &w, reasons);
    check_enum(&r, &w, reasons);
    check_additional_properties(&r, &w, reasons);
    check_multiple_of(&r, &w, reasons);
    check_unique_items(&r, &w, reasons);
    check_const(&r, &w, reasons);
    check_pattern(&r, &w, reasons);
    check_format(&r, &w, reasons);
    check_dependent_required(&r, &w, reasons);

    if let (Some(Value::Object(rp)), Some(Value::Object(wp))) =
        (r.get("properties"), w.get("properties"))
    {
        for (name, writer_schema) in wp {
            if let Some(reader_schema) = rp.get(name) {
                reads_inner(reader_schema, writer_schema, resolver, reasons)?;
            }
            // A property the writer declares but the reader drops entirely
            // is fine for backward reads: the reader simply ignores it
            // unless `additionalProperties: false`, already checked above.
        }
    }

    if let (Some(Value::Object(rp)), Some(Value::Object(wp))) =
        (r.get("patternProperties"), w.get("patternProperties"))
    {
        for (pattern, writer_schema) in wp {
            if let Some(reader_schema) = rp.get(pattern) {
                reads_inner(reader_schema, writer_schema, resolver, reasons)?;
            }
        }
    }

    if let (Some(ri), Some(wi)) = (r.get("items"), w.get("items")) {
        reads_inner(ri, wi, resolver, reasons)?;
    }

    if let (Some(rc), Some(wc)) = (r.get("contains"), w.get("contains")) {
        reads_inner(rc, wc, resolver, reasons)?;
    } else if r.get("contains").is_some() && w.get("contains").is_none() {
        reasons.push("'contains' added a containment requirement the writer didn't have".to_string());
    }

    if let (Some(rn), Some(wn)) = (r.get("propertyNames"), w.get("propertyNames")) {
        reads_inner(rn, wn, resolver, reasons)?;
    } else if r.get("propertyNames").is_some() && w.get("propertyNames").is_none() {
        reasons.push("'propertyNames' added a name constraint the writer didn't have".to_string());
    }

    check_combinator(&r, &w, "allOf", resolver, reasons)?;
    check_combinator(&r, &w, "anyOf", resolver, reasons)?;
    check_combinator(&r, &w, "oneOf", resolver, reasons)?;

    if let (Some(rn), Some(wn)) = (r.get("not"), w.get("not")) {
        if rn != wn {
            reasons.push("'not' schema changed, which may exclude data the writer could produce".to_string());
        }
    } else if r.get("not").is_some() && w.get("not").is_none() {
        reasons.push("'not' added an exclusion the writer didn't have".to_string());
    }

    Ok(())
}

/// `allOf`/`anyOf`/`oneOf` are treated alike here: each writer alternative
/// must be acceptable to at least one reader alternative, mirroring the
/// Avro union handling in `compatibility::avro`. This is a structural
/// approximation — it doesn't model `oneOf`'s exactly-one constraint or
/// `allOf`'s conjunction precisely, but it catches a branch being dropped
/// or narrowed, which is the common incompatible change.
fn check_combinator(
    reader: &serde_json::Map<String, Value>,
    writer: &serde_json::Map<String, Value>,
    keyword: &str,
    resolver: &dyn ReferenceResolver,
    reasons: &mut Vec<String>,
) -> Result<(), JsonCheckError> {
    let (Some(Value::Array(r_branches)), Some(Value::Array(w_branches))) =
        (reader.get(keyword), writer.get(keyword))
    else {
        return Ok(());
    };

    for w_branch in w_branches {
        let mut accepted = false;
        for r_branch in r_branches {
            let mut branch_reasons = Vec::new();
            reads_inner(r_branch, w_branch, resolver, &mut branch_reasons)?;
            if branch_reasons.is_empty() {
                accepted = true;
                break;
            }
        }
        if !accepted {
            reasons.push(format!(
                "no '{keyword}' branch in reader accepts writer branch {w_branch:?}"
            ));
        }
    }
    Ok(())
}

/// A reader `multipleOf` that doesn't evenly divide the writer's means the
/// writer can still produce values the reader rejects.
fn check_multiple_of(
    reader: &serde_json::Map<String, Value>,
    writer: &serde_json::Map<String, Value>,
    reasons: &mut Vec<String>,
) {
    let (Some(r), Some(w)) = (
        reader.get("multipleOf").and_then(Value::as_f64),
        writer.get("multipleOf").and_then(Value::as_f64),
    ) else {
        return;
    };
    if r != w && (w / r).fract().abs() > f64::EPSILON {
        reasons.push(format!("'multipleOf' changed from {w} to {r}, which isn't a widening"));
    }
}

fn check_unique_items(
    reader: &serde_json::Map<String, Value>,
    writer: &serde_json::Map<String, Value>,
    reasons: &mut Vec<String>,
) {
    let reader_unique = matches!(reader.get("uniqueItems"), Some(Value::Bool(true)));
    let writer_unique = matches!(writer.get("uniqueItems"), Some(Value::Bool(true)));
    if reader_unique && !writer_unique {
        reasons.push("'uniqueItems' tightened to true; the writer allowed duplicates".to_string());
    }
}

/// `const` pins the value to exactly one literal; adding or changing it is
/// always a tightening relative to a writer that allowed more.
fn check_const(
    reader: &serde_json::Map<String, Value>,
    writer: &serde_json::Map<String, Value>,
    reasons: &mut Vec<String>,
) {
    match (reader.get("const"), writer.get("const")) {
        (Some(r), Some(w)) if r != w => {
            reasons.push(format!("'const' changed from {w} to {r}"));
        }
        (Some(r), None) => {
            reasons.push(format!("'const' added ({r}) where the writer had none"));
        }
        _ => {}
    }
}

/// Changing or adding a `pattern` can't be shown compatible without a regex
/// containment check, so any change is treated conservatively as a
/// potential tightening.
fn check_pattern(
    reader: &serde_json::Map<String, Value>,
    writer: &serde_json::Map<String, Value>,
    reasons: &mut Vec<String>,
) {
    if let Some(rp) = reader.get("pattern") {
        if writer.get("pattern") != Some(rp) {
            reasons.push(format!("'pattern' changed to {rp}, which may reject values the writer produced"));
        }
    }
}

fn check_format(
    reader: &serde_json::Map<String, Value>,
    writer: &serde_json::Map<String, Value>,
    reasons: &mut Vec<String>,
) {
    if let Some(rf) = reader.get("format") {
        if writer.get("format") != Some(rf) {
            reasons.push(format!("'format' changed to {rf}, which may reject values the writer produced"));
        }
    }
}

/// A reader `dependentRequired` entry whose list isn't a subset of the
/// writer's forces presence the writer never guaranteed.
fn check_dependent_required(
    reader: &serde_json::Map<String, Value>,
    writer: &serde_json::Map<String, Value>,
    reasons: &mut Vec<String>,
) {
    let (Some(Value::Object(rd)), wd) = (
        reader.get("dependentRequired"),
        writer.get("dependentRequired").and_then(Value::as_object),
    ) else {
        return;
    };

    for (property, reader_deps) in rd {
        let reader_list: Vec<&str> = reader_deps
            .as_array()
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let writer_list: Vec<&str> = wd
            .and_then(|m| m.get(property))
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        for dep in &reader_list {
            if !writer_list.contains(dep) {
                reasons.push(format!(
                    "'dependentRequired' now requires '{dep}' when '{property}' is present, which the writer didn't guarantee"
                ));
            }
        }
    }
}

/// A larger `minimum`/`maxLength`-style floor, or a smaller ceiling, in the
/// reader relative to the writer is a tightening: data the writer could
/// legally produce would now fail the reader's validation.
fn check_numeric_bound(
    reader: &serde_json::Map<String, Value>,
    writer: &serde_json::Map<String, Value>,
    key: &str,
    is_ceiling: bool,
    reasons: &mut Vec<String>,
) {
    let (Some(r), Some(w)) = (
        reader.get(key).and_then(Value::as_f64),
        writer.get(key).and_then(Value::as_f64),
    ) else {
        return;
    };

    let tightened = if is_ceiling { r < w } else { r > w };
    if tightened {
        reasons.push(format!("'{key}' tightened from {w} to {r}"));
    }
}

fn check_required(
    reader: &serde_json::Map<String, Value>,
    writer: &serde_json::Map<String, Value>,
    reasons: &mut Vec<String>,
) {
    let reader_required: Vec<&str> = reader
        .get("required")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let writer_required: Vec<&str> = writer
        .get("required")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    for name in &reader_required {
        if !writer_required.contains(name) {
            reasons.push(format!(
                "'{name}' became required but was optional for the writer"
            ));
        }
    }
}

/// A reader `enum` set narrower than the writer's rejects values the writer
/// could legitimately have produced.
fn check_enum(
    reader: &serde_json::Map<String, Value>,
    writer: &serde_json::Map<String, Value>,
    reasons: &mut Vec<String>,
) {
    let (Some(Value::Array(r)), Some(Value::Array(w))) = (reader.get("enum"), writer.get("enum"))
    else {
        return;
    };

    let missing: Vec<&Value> = w.iter().filter(|v| !r.contains(v)).collect();
    if !missing.is_empty() {
        reasons.push(format!(
            "'enum' dropped values still producible by the writer: {missing:?}"
        ));
    }
}

fn check_additional_properties(
    reader: &serde_json::Map<String, Value>,
    writer: &serde_json::Map<String, Value>,
    reasons: &mut Vec<String>,
) {
    let reader_closed = matches!(reader.get("additionalProperties"), Some(Value::Bool(false)));
    let writer_closed = matches!(writer.get("additionalProperties"), Some(Value::Bool(false)));

    if reader_closed && !writer_closed {
        reasons.push(
            "'additionalProperties' tightened to false; the writer allowed extra properties"
                .to_string(),
        );
    }
}

/// Resolves a local document into itself. A `$ref` object delegates to the
/// `ReferenceResolver`; external refs that don't resolve are reported via
/// `UnresolvedReference` rather than folded into a structural diff.
fn resolve_ref<'a>(
    value: &'a Value,
    resolver: &dyn ReferenceResolver,
) -> Result<std::borrow::Cow<'a, Value>, JsonCheckError> {
    let Value::Object(map) = value else {
        return Ok(std::borrow::Cow::Borrowed(value));
    };
    let Some(Value::String(r)) = map.get("$ref") else {
        return Ok(std::borrow::Cow::Borrowed(value));
    };
    if r.starts_with('#') {
        // Local pointer: compatibility across same-document definitions is
        // covered by comparing the enclosing structural keywords directly;
        // we don't re-walk the document here.
        return Ok(std::borrow::Cow::Borrowed(value));
    }

    let reference = SchemaReference {
        name: r.clone(),
        subject: r.clone(),
        version: -1,
    };
    match resolver.resolve(&reference) {
        Some(parsed) => match crate::parser::json::as_value(&parsed) {
            Some(v) => Ok(std::borrow::Cow::Owned(v.clone())),
            None => Err(JsonCheckError::UnresolvedReference(r.clone())),
        },
        None => Err(JsonCheckError::UnresolvedReference(r.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{self};
    use crate::types::SchemaType;

    struct NoRefs;
    impl ReferenceResolver for NoRefs {
        fn resolve(&self, _reference: &SchemaReference) -> Option<crate::parser::ParsedSchema> {
            None
        }
    }

    fn value(text: &str) -> Value {
        let parsed = parser::parse(SchemaType::Json, text, &[]).unwrap();
        parser::json::as_value(&parsed).unwrap().clone()
    }

    #[test]
    fn widening_minimum_is_backward_compatible() {
        let writer = value(r#"{"type":"number","minimum":10}"#);
        let reader = value(r#"{"type":"number","minimum":0}"#);
        assert!(check_reads(&reader, &writer, &NoRefs).is_ok());
    }

    #[test]
    fn tightening_minimum_is_not_backward_compatible() {
        let writer = value(r#"{"type":"number","minimum":0}"#);
        let reader = value(r#"{"type":"number","minimum":10}"#);
        assert!(matches!(
            check_reads(&reader, &writer, &NoRefs),
            Err(JsonCheckError::Incompatible(_))
        ));
    }

    #[test]
    fn adding_required_field_is_not_backward_compatible() {
        let writer = value(r#"{"type":"object","properties":{"a":{}}}"#);
        let reader = value(r#"{"type":"object","properties":{"a":{}},"required":["a"]}"#);
        assert!(check_reads(&reader, &writer, &NoRefs).is_err());
    }

    #[test]
    fn dropping_an_enum_value_is_not_backward_compatible() {
        let writer = value(r#"{"enum":["a","b"]}"#);
        let reader = value(r#"{"enum":["a"]}"#);
        assert!(check_reads(&reader, &writer, &NoRefs).is_err());
    }

    #[test]
    fn unresolved_external_ref_is_reported_distinctly() {
        let writer = value(r#"{"type":"object"}"#);
        let reader = value(r#"{"$ref":"other.json#/Foo"}"#);
        assert!(matches!(
            check_reads(&reader, &writer, &NoRefs),
            Err(JsonCheckError::UnresolvedReference(_))
        ));
    }

    #[test]
    fn tightening_multiple_of_is_not_backward_compatible() {
        let writer = value(r#"{"type":"number","multipleOf":2}"#);
        let reader = value(r#"{"type":"number","multipleOf":4}"#);
        assert!(check_reads(&reader, &writer, &NoRefs).is_err());
    }

    #[test]
    fn widening_multiple_of_is_backward_compatible() {
        let writer = value(r#"{"type":"number","multipleOf":4}"#);
        let reader = value(r#"{"type":"number","multipleOf":2}"#);
        assert!(check_reads(&reader, &writer, &NoRefs).is_ok());
    }

    #[test]
    fn tightening_unique_items_is_not_backward_compatible() {
        let writer = value(r#"{"type":"array"}"#);
        let reader = value(r#"{"type":"array","uniqueItems":true}"#);
        assert!(check_reads(&reader, &writer, &NoRefs).is_err());
    }

    #[test]
    fn adding_const_is_not_backward_compatible() {
        let writer = value(r#"{"type":"string"}"#);
        let reader = value(r#"{"type":"string","const":"x"}"#);
        assert!(check_reads(&reader, &writer, &NoRefs).is_err());
    }

    #[test]
    fn changing_pattern_is_not_backward_compatible() {
        let writer = value(r#"{"type":"string","pattern":"^a"}"#);
        let reader = value(r#"{"type":"string","pattern":"^b"}"#);
        assert!(check_reads(&reader, &writer, &NoRefs).is_err());
    }

    #[test]
    fn narrowing_one_of_branch_is_not_backward_compatible() {
        let writer = value(r#"{"oneOf":[{"type":"string"},{"type":"integer"}]}"#);
        let reader = value(r#"{"oneOf":[{"type":"string"}]}"#);
        assert!(check_reads(&reader, &writer, &NoRefs).is_err());
    }

    #[test]
    fn matching_one_of_branches_is_backward_compatible() {
        let writer = value(r#"{"oneOf":[{"type":"string"},{"type":"integer"}]}"#);
        let reader = value(r#"{"oneOf":[{"type":"integer"},{"type":"string"}]}"#);
        assert!(check_reads(&reader, &writer, &NoRefs).is_ok());
    }

    #[test]
    fn adding_dependent_required_is_not_backward_compatible() {
        let writer = value(r#"{"type":"object"}"#);
        let reader = value(r#"{"type":"object","dependentRequired":{"a":["b"]}}"#);
        assert!(check_reads(&reader, &writer, &NoRefs).is_err());
    }
}
