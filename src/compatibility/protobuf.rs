//! Protobuf directional compatibility, per `spec.md` §4.4: field numbers are
//! immutable, type changes are only permitted within compatible groups
//! (e.g. `{int32, sint32, sfixed32}`), and reserving, removing, or renaming a
//! numbered field is backward-incompatible.
//!
//! Compares `messages[0]` of each file — a schema in this registry always
//! carries exactly one root message, matching how `SubjectManager` registers
//! message schemas one-per-subject.

use protobuf::descriptor::field_descriptor_proto::Type;

use crate::parser::protobuf::{ProtoField, ProtoFile, ProtoMessage};

pub fn check_reads(reader: &ProtoFile, writer: &ProtoFile) -> Result<(), Vec<String>> {
    let mut reasons = Vec::new();

    match (reader.messages.first(), writer.messages.first()) {
        (Some(r), Some(w)) => check_message(r, w, &mut reasons),
        (None, None) => {}
        _ => reasons.push("one schema declares a root message, the other does not".to_string()),
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(reasons)
    }
}

fn check_message(reader: &ProtoMessage, writer: &ProtoMessage, reasons: &mut Vec<String>) {
    for wf in &writer.fields {
        // A number the writer could still produce must either still be
        // declared by the reader, or must have been explicitly reserved.
        match find_field(&reader.fields, wf.number) {
            Some(rf) => check_field(rf, wf, reasons),
            None => {
                if !is_reserved(reader, wf.number) {
                    reasons.push(format!(
                        "field number {} ('{}' in writer) was removed without reserving it",
                        wf.number, wf.name
                    ));
                }
            }
        }
    }

    // A field number still declared by the reader but dropped by the writer
    // is fine for decoding (the reader simply sees it absent/default); the
    // registry only needs to guard the direction actually being checked,
    // which is "does the reader understand what the writer could send".

    for rf in &reader.fields {
        if let Some(wf) = find_field(&writer.fields, rf.number) {
            if rf.name != wf.name {
                reasons.push(format!(
                    "field number {} was renamed from '{}' to '{}'",
                    rf.number, wf.name, rf.name
                ));
            }
        }
    }
}

fn check_field(reader: &ProtoField, writer: &ProtoField, reasons: &mut Vec<String>) {
    if reader.name != writer.name {
        reasons.push(format!(
            "field number {} was renamed from '{}' to '{}'",
            writer.number, writer.name, reader.name
        ));
    }

    if reader.oneof_index.is_some() != writer.oneof_index.is_some() {
        reasons.push(format!(
            "field '{}' changed oneof membership",
            reader.name
        ));
    }

    if reader.field_type != writer.field_type && !compatible_types(reader.field_type, writer.field_type) {
        reasons.push(format!(
            "field '{}' changed type from {:?} to {:?}, which is not a compatible widening",
            reader.name, writer.field_type, reader.field_type
        ));
    }

    if reader.label != writer.label {
        reasons.push(format!(
            "field '{}' changed cardinality ({:?} -> {:?})",
            reader.name, writer.label, reader.label
        ));
    }
}

fn find_field(fields: &[ProtoField], number: i32) -> Option<&ProtoField> {
    fields.iter().find(|f| f.number == number)
}

fn is_reserved(message: &ProtoMessage, number: i32) -> bool {
    message
        .reserved_numbers
        .iter()
        .any(|(start, end)| number >= *start && number < *end)
}

/// Groups of wire-compatible scalar types, per `spec.md` §4.4's own example
/// (`{int32, sint32, sfixed32}`) plus the symmetric varint/fixed groupings
/// the Protobuf wire format defines.
fn compatible_types(a: Type, b: Type) -> bool {
    use Type::*;

    const GROUPS: &[&[Type]] = &[
        &[TYPE_INT32, TYPE_SINT32, TYPE_SFIXED32],
        &[TYPE_INT64, TYPE_SINT64, TYPE_SFIXED64],
        &[TYPE_UINT32, TYPE_FIXED32],
        &[TYPE_UINT64, TYPE_FIXED64],
        &[TYPE_STRING, TYPE_BYTES],
    ];

    GROUPS
        .iter()
        .any(|group| group.contains(&a) && group.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::types::SchemaType;

    fn proto_file(text: &str) -> ProtoFile {
        let parsed = parser::parse(SchemaType::Protobuf, text, &[]).unwrap();
        crate::parser::protobuf::as_proto_file(&parsed).unwrap().clone()
    }

    #[test]
    fn unchanged_message_is_compatible() {
        let text = r#"syntax = "proto3"; message E { string id = 1; int32 code = 2; }"#;
        let a = proto_file(text);
        let b = proto_file(text);
        assert!(check_reads(&a, &b).is_ok());
    }

    #[test]
    fn removing_field_without_reserving_is_incompatible() {
        let writer = proto_file(r#"syntax = "proto3"; message E { string id = 1; int32 code = 2; }"#);
        let reader = proto_file(r#"syntax = "proto3"; message E { string id = 1; }"#);
        assert!(check_reads(&reader, &writer).is_err());
    }

    #[test]
    fn removing_field_with_reservation_is_compatible() {
        let writer = proto_file(r#"syntax = "proto3"; message E { string id = 1; int32 code = 2; }"#);
        let reader =
            proto_file(r#"syntax = "proto3"; message E { reserved 2; string id = 1; }"#);
        assert!(check_reads(&reader, &writer).is_ok());
    }

    #[test]
    fn compatible_numeric_group_change_is_allowed() {
        let writer = proto_file(r#"syntax = "proto3"; message E { int32 n = 1; }"#);
        let reader = proto_file(r#"syntax = "proto3"; message E { sint32 n = 1; }"#);
        assert!(check_reads(&reader, &writer).is_ok());
    }

    #[test]
    fn incompatible_type_change_is_rejected() {
        let writer = proto_file(r#"syntax = "proto3"; message E { int32 n = 1; }"#);
        let reader = proto_file(r#"syntax = "proto3"; message E { bool n = 1; }"#);
        assert!(check_reads(&reader, &writer).is_err());
    }

    #[test]
    fn renaming_a_field_number_is_rejected() {
        let writer = proto_file(r#"syntax = "proto3"; message E { string id = 1; }"#);
        let reader = proto_file(r#"syntax = "proto3"; message E { string identifier = 1; }"#);
        assert!(check_reads(&reader, &writer).is_err());
    }
}
