//! Avro directional compatibility, per `spec.md` §4.4: numeric promotion
//! `int -> long -> float -> double`, enum symbol additions are
//! backward-compatible, adding a field requires a default for backward,
//! removing a field without a default breaks forward.

use apache_avro::schema::{RecordField, Schema};

/// `reader` must be able to decode data written by `writer`. Returns the
/// list of incompatibility reasons, empty meaning compatible.
pub fn check_reads(reader: &Schema, writer: &Schema) -> Result<(), Vec<String>> {
    let mut reasons = Vec::new();
    reads_inner(reader, writer, &mut reasons);
    if reasons.is_empty() {
        Ok(())
    } else {
        Err(reasons)
    }
}

fn reads_inner(reader: &Schema, writer: &Schema, reasons: &mut Vec<String>) {
    use Schema::*;

    // A union on either side is resolved branch-wise rather than requiring
    // an exact structural match.
    if let Union(writer_variants) = writer {
        // Every branch the writer could have produced must be readable.
        for branch in writer_variants.variants() {
            let mut branch_reasons = Vec::new();
            reads_inner(reader, branch, &mut branch_reasons);
            if !branch_reasons.is_empty() {
                reasons.extend(branch_reasons);
            }
        }
        return;
    }
    if let Union(reader_variants) = reader {
        // At least one reader branch must accept the writer's schema.
        let compatible = reader_variants.variants().iter().any(|branch| {
            let mut branch_reasons = Vec::new();
            reads_inner(branch, writer, &mut branch_reasons);
            branch_reasons.is_empty()
        });
        if !compatible {
            reasons.push(format!(
                "no union branch in reader accepts writer schema {writer:?}"
            ));
        }
        return;
    }

    match (reader, writer) {
        (Null, Null) | (Boolean, Boolean) => {}
        (Int, Int) => {}
        (Long, Int) | (Long, Long) => {}
        (Float, Int) | (Float, Long) | (Float, Float) => {}
        (Double, Int) | (Double, Long) | (Double, Float) | (Double, Double) => {}
        (String, String) | (String, Bytes) => {}
        (Bytes, Bytes) | (Bytes, String) => {}
        (Array(r), Array(w)) => reads_inner(&r.items, &w.items, reasons),
        (Map(r), Map(w)) => reads_inner(&r.types, &w.types, reasons),
        (
            Fixed(r),
            Fixed(w),
        ) => {
            if r.size != w.size {
                reasons.push(format!(
                    "fixed size changed from {} to {} for '{}'",
                    w.size, r.size, r.name.name
                ));
            }
        }
        (Enum(r), Enum(w)) => {
            let missing: Vec<&String> = w
                .symbols
                .iter()
                .filter(|s| !r.symbols.contains(s))
                .collect();
            if !missing.is_empty() {
                reasons.push(format!(
                    "enum '{}' dropped symbols still producible by the writer: {:?}",
                    r.name.name, missing
                ));
            }
        }
        (Record(r), Record(w)) => check_record(r, w, reasons),
        (a, b) => {
            if std::mem::discriminant(a) != std::mem::discriminant(b) {
                reasons.push(format!(
                    "incompatible type change: reader expects {a:?}, writer produced {b:?}"
                ));
            }
        }
    }
}

fn check_record(
    reader: &apache_avro::schema::RecordSchema,
    writer: &apache_avro::schema::RecordSchema,
    reasons: &mut Vec<String>,
) {
    for rf in &reader.fields {
        match find_field(&writer.fields, &rf.name) {
            Some(wf) => {
                let mut field_reasons = Vec::new();
                reads_inner(&rf.schema, &wf.schema, &mut field_reasons);
                for r in field_reasons {
                    reasons.push(format!("field '{}': {r}", rf.name));
                }
            }
            None => {
                if !has_default(rf) {
                    reasons.push(format!(
                        "field '{}' added without a default and is missing from the writer schema",
                        rf.name
                    ));
                }
            }
        }
    }
}

fn find_field<'a>(fields: &'a [RecordField], name: &str) -> Option<&'a RecordField> {
    fields.iter().find(|f| f.name == name)
}

fn has_default(field: &RecordField) -> bool {
    field.default.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use apache_avro::Schema as AvroSchema;

    fn schema(s: &str) -> AvroSchema {
        AvroSchema::parse_str(s).unwrap()
    }

    #[test]
    fn adding_field_with_default_is_backward_compatible() {
        let writer = schema(r#"{"type":"record","name":"E","fields":[{"name":"id","type":"string"}]}"#);
        let reader = schema(
            r#"{"type":"record","name":"E","fields":[{"name":"id","type":"string"},{"name":"code","type":"int","default":0}]}"#,
        );
        assert!(check_reads(&reader, &writer).is_ok());
    }

    #[test]
    fn adding_field_without_default_is_not_backward_compatible() {
        let writer = schema(r#"{"type":"record","name":"E","fields":[{"name":"id","type":"string"}]}"#);
        let reader = schema(
            r#"{"type":"record","name":"E","fields":[{"name":"id","type":"string"},{"name":"code","type":"int"}]}"#,
        );
        assert!(check_reads(&reader, &writer).is_err());
    }

    #[test]
    fn int_to_long_promotion_is_compatible() {
        let writer = schema(r#"{"type":"record","name":"E","fields":[{"name":"n","type":"int"}]}"#);
        let reader = schema(r#"{"type":"record","name":"E","fields":[{"name":"n","type":"long"}]}"#);
        assert!(check_reads(&reader, &writer).is_ok());
    }

    #[test]
    fn narrowing_long_to_int_is_not_compatible() {
        let writer = schema(r#"{"type":"record","name":"E","fields":[{"name":"n","type":"long"}]}"#);
        let reader = schema(r#"{"type":"record","name":"E","fields":[{"name":"n","type":"int"}]}"#);
        assert!(check_reads(&reader, &writer).is_err());
    }

    #[test]
    fn enum_symbol_addition_is_backward_compatible() {
        let writer = schema(r#"{"type":"enum","name":"Color","symbols":["RED","GREEN"]}"#);
        let reader = schema(r#"{"type":"enum","name":"Color","symbols":["RED","GREEN","BLUE"]}"#);
        assert!(check_reads(&reader, &writer).is_ok());
    }

    #[test]
    fn enum_symbol_removal_is_not_backward_compatible() {
        let writer = schema(r#"{"type":"enum","name":"Color","symbols":["RED","GREEN"]}"#);
        let reader = schema(r#"{"type":"enum","name":"Color","symbols":["RED"]}"#);
        assert!(check_reads(&reader, &writer).is_err());
    }

    #[test]
    fn removing_field_without_default_breaks_forward_reads() {
        // Forward = "existing reads candidate": the OLD schema (here used
        // as `reader`) must still be able to read data written by the NEW
        // schema (here `writer`), which dropped a field entirely.
        let old_schema_as_reader =
            schema(r#"{"type":"record","name":"E","fields":[{"name":"id","type":"string"},{"name":"code","type":"string"}]}"#);
        let new_schema_as_writer =
            schema(r#"{"type":"record","name":"E","fields":[{"name":"id","type":"string"}]}"#);
        assert!(check_reads(&old_schema_as_reader, &new_schema_as_writer).is_err());
    }
}
