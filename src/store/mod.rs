//! Store — `spec.md` §2/§3: the durable map every other component commits
//! through. Linearizable single-key ops; batched multi-key writes where a
//! single register/delete must move several keyspaces together. Kept as a
//! trait so the core stays agnostic to the real backend (Cassandra,
//! PostgreSQL — both out of scope per `spec.md` §1); `memory::MemoryStore`
//! is the in-process reference implementation used by tests and by
//! embedders who don't need real durability.

pub mod memory;

use async_trait::async_trait;

use crate::error::Error;
use crate::fingerprint::{Fingerprint, SchemaReference};
use crate::types::{Algorithm, CompatibilityLevel, KmsType, Mode, SchemaType, SubjectKey};

/// An immutable content-addressed schema body, keyed by its fingerprint
/// within a context. `spec.md` §3: `(schema_type, canonical_text,
/// references[])`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRecord {
    pub schema_type: SchemaType,
    pub canonical_text: String,
    pub references: Vec<SchemaReference>,
}

/// A single version entry for a subject. `spec.md` §3: `(subject,
/// version_number, global_id, metadata, ruleSet, deleted_flag)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub version: i32,
    pub global_id: u32,
    pub metadata: Option<serde_json::Value>,
    pub rule_set: Option<serde_json::Value>,
    pub deleted: bool,
}

/// The three scopes a config/mode row can live at. Server defaults are not
/// stored rows — `PolicyResolver` supplies them once every stored tier
/// misses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConfigScope {
    Subject(SubjectKey),
    Context(String),
    Global,
}

impl ConfigScope {
    fn store_key(&self) -> String {
        match self {
            ConfigScope::Subject(key) => format!("subject\0{}\0{}", key.context, key.name),
            ConfigScope::Context(ctx) => format!("context\0{ctx}"),
            ConfigScope::Global => "global".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRecord {
    pub compatibility_level: CompatibilityLevel,
    /// Names a metadata property (`spec.md` §4.4); same-value schemas form
    /// one compatibility group, empty/absent compares to all.
    pub compatibility_group: Option<String>,
    /// `spec.md` §4.1: single-hop alias target subject name.
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeRecord {
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KekRecord {
    pub name: String,
    pub kms_type: KmsType,
    pub kms_key_id: String,
    pub kms_props: std::collections::BTreeMap<String, String>,
    pub doc: Option<String>,
    pub shared: bool,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DekRecord {
    pub kek_name: String,
    pub subject: String,
    pub version: i32,
    pub algorithm: Algorithm,
    pub encrypted_key_material: String,
    pub deleted: bool,
}

/// The durable map. Every method that can race with a concurrent mutation
/// of the *same* subject is expected to be called from under
/// `lock::StripedLock` by the caller — the trait itself makes no promise
/// about cross-method atomicity beyond a single call.
#[async_trait]
pub trait Store: Send + Sync {
    // -- contexts --------------------------------------------------------
    async fn record_context(&self, context: &str) -> Result<(), Error>;
    async fn list_contexts(&self) -> Result<Vec<String>, Error>;

    // -- sequences --------------------------------------------------------
    /// Highest global id ever assigned in `context` (0 if none).
    async fn high_water_mark(&self, context: &str) -> Result<u32, Error>;
    /// Raises the high-water mark to at least `value`. Returns the mark
    /// after the update.
    async fn raise_high_water_mark(&self, context: &str, value: u32) -> Result<u32, Error>;

    // -- schemas ----------------------------------------------------------
    async fn find_global_id(
        &self,
        context: &str,
        fingerprint: &Fingerprint,
    ) -> Result<Option<u32>, Error>;
    async fn get_schema(&self, context: &str, global_id: u32) -> Result<Option<SchemaRecord>, Error>;
    async fn put_schema(
        &self,
        context: &str,
        global_id: u32,
        fingerprint: Fingerprint,
        record: SchemaRecord,
    ) -> Result<(), Error>;
    /// Removes a schema body entirely once its last referring version is
    /// gone (content GC, `spec.md` §3 lifecycle).
    async fn remove_schema_if_unreferenced(
        &self,
        context: &str,
        global_id: u32,
    ) -> Result<(), Error>;

    // -- subjects / versions ----------------------------------------------
    async fn list_subjects(&self, context: &str) -> Result<Vec<String>, Error>;
    /// All versions for a subject, oldest first, including soft-deleted.
    async fn get_versions(&self, key: &SubjectKey) -> Result<Vec<VersionRecord>, Error>;
    async fn put_version(&self, key: &SubjectKey, record: VersionRecord) -> Result<(), Error>;
    async fn set_version_deleted(
        &self,
        key: &SubjectKey,
        version: i32,
        deleted: bool,
    ) -> Result<(), Error>;
    async fn remove_version(&self, key: &SubjectKey, version: i32) -> Result<(), Error>;
    /// Drops every version row for a subject (permanent delete of a fully
    /// soft-deleted subject); the next registration restarts numbering at 1.
    async fn clear_subject(&self, key: &SubjectKey) -> Result<(), Error>;
    /// Whether any version (active or soft-deleted) still references
    /// `global_id` anywhere in `context` other than `excluding`.
    async fn has_other_referrer(
        &self,
        context: &str,
        global_id: u32,
        excluding: &SubjectKey,
        excluding_version: i32,
    ) -> Result<bool, Error>;
    /// Every `(subject, version)` in `context` whose references list names
    /// `(referenced_subject, referenced_version)`.
    async fn find_referrers(
        &self,
        context: &str,
        referenced_subject: &str,
        referenced_version: i32,
    ) -> Result<Vec<(SubjectKey, i32)>, Error>;
    /// Every subject in `context` with an active version bound to
    /// `global_id` (`GET /schemas/ids/{g}/subjects`).
    async fn subjects_for_global_id(
        &self,
        context: &str,
        global_id: u32,
    ) -> Result<Vec<String>, Error>;

    // -- config / mode ------------------------------------------------------
    async fn get_config(&self, scope: &ConfigScope) -> Result<Option<ConfigRecord>, Error>;
    async fn put_config(&self, scope: &ConfigScope, record: ConfigRecord) -> Result<(), Error>;
    async fn delete_config(&self, scope: &ConfigScope) -> Result<Option<ConfigRecord>, Error>;
    async fn get_mode(&self, scope: &ConfigScope) -> Result<Option<ModeRecord>, Error>;
    async fn put_mode(&self, scope: &ConfigScope, record: ModeRecord) -> Result<(), Error>;
    async fn delete_mode(&self, scope: &ConfigScope) -> Result<Option<ModeRecord>, Error>;

    // -- KEK / DEK ----------------------------------------------------------
    async fn get_kek(&self, name: &str) -> Result<Option<KekRecord>, Error>;
    async fn put_kek(&self, record: KekRecord) -> Result<(), Error>;
    async fn list_keks(&self, include_deleted: bool) -> Result<Vec<KekRecord>, Error>;
    async fn set_kek_deleted(&self, name: &str, deleted: bool) -> Result<(), Error>;
    async fn remove_kek(&self, name: &str) -> Result<(), Error>;

    async fn list_deks(
        &self,
        kek_name: &str,
        subject: &str,
        algorithm: Algorithm,
        include_deleted: bool,
    ) -> Result<Vec<DekRecord>, Error>;
    async fn put_dek(&self, record: DekRecord) -> Result<(), Error>;
    async fn set_dek_deleted(
        &self,
        kek_name: &str,
        subject: &str,
        algorithm: Algorithm,
        version: i32,
        deleted: bool,
    ) -> Result<(), Error>;
}
