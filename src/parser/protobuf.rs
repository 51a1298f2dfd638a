//! Protobuf parsing and canonicalization. Parses raw `.proto` text with no
//! `protoc` dependency via `protobuf-parse`'s pure-Rust parser — the
//! teacher's own `protobuf` dependency (`rust-protobuf` v2, geared towards
//! consuming `protoc`-generated code) has no text parser at all, so this is
//! enriched from the wider ecosystem rather than the teacher itself (see
//! `DESIGN.md`). `google.protobuf.*` well-known types resolve against
//! `protobuf-parse`'s bundled well-known-types set, never an external
//! lookup.

use std::io::Write;

use protobuf::descriptor::field_descriptor_proto::{Label, Type};
use protobuf::descriptor::FileDescriptorProto;

use super::{ParsedSchema, SchemaAst};
use crate::error::Error;

/// A flattened, comparison-friendly view over a parsed `.proto` file. Field
/// numbers and oneof grouping are preserved verbatim from the descriptor —
/// the compatibility checker relies on both being exact, per `spec.md`
/// §4.4 ("field number immutable ... reserving, removing, or renaming
/// numbered fields is backward-incompatible").
#[derive(Debug, Clone)]
pub struct ProtoFile {
    pub package: String,
    pub dependencies: Vec<String>,
    pub messages: Vec<ProtoMessage>,
    pub enums: Vec<ProtoEnum>,
}

#[derive(Debug, Clone)]
pub struct ProtoMessage {
    pub name: String,
    pub fields: Vec<ProtoField>,
    pub oneofs: Vec<String>,
    pub reserved_numbers: Vec<(i32, i32)>,
}

#[derive(Debug, Clone)]
pub struct ProtoField {
    pub name: String,
    pub number: i32,
    pub field_type: Type,
    pub type_name: Option<String>,
    pub label: Label,
    pub oneof_index: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct ProtoEnum {
    pub name: String,
    pub values: Vec<(String, i32)>,
}

pub fn parse(text: &str) -> Result<ParsedSchema, Error> {
    let descriptor = parse_descriptor(text)?;
    let canonical_text = canonicalize(&descriptor);
    let embedded_references = descriptor.dependency.clone().into_vec();
    let proto_file = summarize(&descriptor);
    Ok(ParsedSchema {
        ast: SchemaAst::Protobuf(Box::new(proto_file)),
        canonical_text,
        embedded_references,
    })
}

fn parse_descriptor(text: &str) -> Result<FileDescriptorProto, Error> {
    let dir = tempfile::tempdir().map_err(|e| Error::InvalidSchema(e.to_string()))?;
    let file_name = "schema.proto";
    let file_path = dir.path().join(file_name);
    {
        let mut f =
            std::fs::File::create(&file_path).map_err(|e| Error::InvalidSchema(e.to_string()))?;
        f.write_all(text.as_bytes())
            .map_err(|e| Error::InvalidSchema(e.to_string()))?;
    }

    let parsed = protobuf_parse::Parser::new()
        .pure()
        .include(dir.path())
        .input(&file_path)
        .parse_and_typecheck()?;

    parsed
        .file_descriptors
        .into_iter()
        .find(|fd| fd.name() == file_name)
        .ok_or_else(|| Error::InvalidSchema("protobuf parser produced no file descriptor".into()))
}

/// Canonical text: a deterministic dump of the descriptor with imports
/// sorted, independent of the original file's whitespace/comment layout,
/// but with message/field declaration order (and therefore field numbers
/// and oneof grouping) preserved exactly as declared.
fn canonicalize(descriptor: &FileDescriptorProto) -> String {
    let mut sorted = descriptor.clone();
    sorted.dependency.sort();
    protobuf::text_format::print_to_string(&sorted)
}

fn summarize(descriptor: &FileDescriptorProto) -> ProtoFile {
    ProtoFile {
        package: descriptor.package().to_string(),
        dependencies: descriptor.dependency.clone().into_vec(),
        messages: descriptor.message_type.iter().map(summarize_message).collect(),
        enums: descriptor
            .enum_type
            .iter()
            .map(|e| ProtoEnum {
                name: e.name().to_string(),
                values: e
                    .value
                    .iter()
                    .map(|v| (v.name().to_string(), v.number()))
                    .collect(),
            })
            .collect(),
    }
}

fn summarize_message(msg: &protobuf::descriptor::DescriptorProto) -> ProtoMessage {
    ProtoMessage {
        name: msg.name().to_string(),
        fields: msg
            .field
            .iter()
            .map(|f| ProtoField {
                name: f.name().to_string(),
                number: f.number(),
                field_type: f.type_(),
                type_name: if f.has_type_name() {
                    Some(f.type_name().to_string())
                } else {
                    None
                },
                label: f.label(),
                oneof_index: if f.has_oneof_index() {
                    Some(f.oneof_index())
                } else {
                    None
                },
            })
            .collect(),
        oneofs: msg.oneof_decl.iter().map(|o| o.name().to_string()).collect(),
        reserved_numbers: msg
            .reserved_range
            .iter()
            .map(|r| (r.start(), r.end()))
            .collect(),
    }
}

pub fn as_proto_file(parsed: &ParsedSchema) -> Option<&ProtoFile> {
    match &parsed.ast {
        SchemaAst::Protobuf(p) => Some(p),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT_V1: &str = r#"
        syntax = "proto3";
        message Event {
            string id = 1;
            int32 code = 2;
        }
    "#;

    #[test]
    fn parses_field_numbers_and_types() {
        let parsed = parse(EVENT_V1).unwrap();
        let file = as_proto_file(&parsed).unwrap();
        let msg = &file.messages[0];
        assert_eq!(msg.name, "Event");
        assert_eq!(msg.fields[0].number, 1);
        assert_eq!(msg.fields[1].number, 2);
    }

    #[test]
    fn rejects_malformed_proto() {
        let bad = "message Event { not valid protobuf";
        assert!(parse(bad).is_err());
    }

    #[test]
    fn canonicalization_is_insensitive_to_comments_and_whitespace() {
        let a = parse(EVENT_V1).unwrap();
        let spaced = r#"
            syntax   =   "proto3"  ;
            // a comment
            message Event {
                string id = 1; // identifier
                int32 code = 2;
            }
        "#;
        let b = parse(spaced).unwrap();
        assert_eq!(a.canonical_text, b.canonical_text);
    }
}
