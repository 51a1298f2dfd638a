//! Shared vocabulary used across every module: schema types, compatibility
//! levels, modes, and the small enums the wire protocol serializes with
//! Confluent's exact casing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three schema languages the registry understands.
///
/// `Avro` is the historical default and is omitted from the wire
/// representation of a schema (see `spec.md` §6, response-shape contract);
/// `Protobuf` and `Json` are always explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaType {
    Avro,
    Protobuf,
    Json,
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaType::Avro => write!(f, "AVRO"),
            SchemaType::Protobuf => write!(f, "PROTOBUF"),
            SchemaType::Json => write!(f, "JSON"),
        }
    }
}

/// Directional compatibility level, per `spec.md` §3 and §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompatibilityLevel {
    Backward,
    BackwardTransitive,
    Forward,
    ForwardTransitive,
    Full,
    FullTransitive,
    None,
}

impl Default for CompatibilityLevel {
    fn default() -> Self {
        CompatibilityLevel::Backward
    }
}

impl CompatibilityLevel {
    /// Whether this level requires checking against every active version
    /// rather than just the latest one.
    pub fn is_transitive(&self) -> bool {
        matches!(
            self,
            CompatibilityLevel::BackwardTransitive
                | CompatibilityLevel::ForwardTransitive
                | CompatibilityLevel::FullTransitive
        )
    }

    pub fn checks_backward(&self) -> bool {
        matches!(
            self,
            CompatibilityLevel::Backward
                | CompatibilityLevel::BackwardTransitive
                | CompatibilityLevel::Full
                | CompatibilityLevel::FullTransitive
        )
    }

    pub fn checks_forward(&self) -> bool {
        matches!(
            self,
            CompatibilityLevel::Forward
                | CompatibilityLevel::ForwardTransitive
                | CompatibilityLevel::Full
                | CompatibilityLevel::FullTransitive
        )
    }
}

/// Mutation-gating mode, per `spec.md` §3 and §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    ReadWrite,
    ReadOnly,
    ReadOnlyOverride,
    Import,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::ReadWrite
    }
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::ReadWrite => "READWRITE",
            Mode::ReadOnly => "READONLY",
            Mode::ReadOnlyOverride => "READONLY_OVERRIDE",
            Mode::Import => "IMPORT",
        }
    }
}

/// DEK encryption algorithm, per `spec.md` §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Algorithm {
    Aes256Gcm,
    Aes128Gcm,
    Aes256Siv,
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::Aes256Gcm
    }
}

/// KMS backend a KEK's key material lives in, per `spec.md` §3. The actual
/// KMS call is an opaque, out-of-scope collaborator; this crate only tracks
/// which one a KEK is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KmsType {
    AwsKms,
    AzureKms,
    GcpKms,
}

/// Config/mode resolution scope, per `spec.md` §3 and §4.7's four-tier
/// chain (`subject -> context -> __GLOBAL -> server default`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Subject,
    Context,
    Global,
    Default,
}

/// A `(context, subject)` pair — the unit every operation ultimately acts
/// on once `ContextRouter` has resolved it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubjectKey {
    pub context: String,
    pub name: String,
}

impl SubjectKey {
    pub fn new(context: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}:{}", self.context, self.name)
    }
}
