//! In-memory reference `Store`, backed by `dashmap::DashMap` the way the
//! teacher shards its schema cache. Used by the test suite and by embedders
//! with no durable backend of their own; a full scan stands in for an index
//! a real backend would maintain (e.g. `find_referrers`), which is fine for
//! a reference implementation but would need a secondary index under
//! Cassandra/PostgreSQL.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

use super::{ConfigRecord, ConfigScope, DekRecord, KekRecord, ModeRecord, SchemaRecord, Store, VersionRecord};
use crate::error::Error;
use crate::fingerprint::Fingerprint;
use crate::types::{Algorithm, SubjectKey};

#[derive(Default)]
pub struct MemoryStore {
    contexts: DashSet<String>,
    high_water: DashMap<String, u32>,
    schemas: DashMap<(String, u32), SchemaRecord>,
    fingerprint_index: DashMap<(String, String), u32>,
    id_to_fingerprint: DashMap<(String, u32), String>,
    versions: DashMap<(String, String), Vec<VersionRecord>>,
    configs: DashMap<String, ConfigRecord>,
    modes: DashMap<String, ModeRecord>,
    keks: DashMap<String, KekRecord>,
    deks: DashMap<(String, String, Algorithm), Vec<DekRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn record_context(&self, context: &str) -> Result<(), Error> {
        self.contexts.insert(context.to_string());
        Ok(())
    }

    async fn list_contexts(&self) -> Result<Vec<String>, Error> {
        let mut contexts: Vec<String> = self
            .contexts
            .iter()
            .map(|c| c.clone())
            .filter(|c| !c.eq_ignore_ascii_case(crate::context::GLOBAL_CONTEXT))
            .collect();
        contexts.sort();
        Ok(contexts)
    }

    async fn high_water_mark(&self, context: &str) -> Result<u32, Error> {
        Ok(self.high_water.get(context).map(|v| *v).unwrap_or(0))
    }

    async fn raise_high_water_mark(&self, context: &str, value: u32) -> Result<u32, Error> {
        let mut entry = self.high_water.entry(context.to_string()).or_insert(0);
        if value > *entry {
            *entry = value;
        }
        Ok(*entry)
    }

    async fn find_global_id(
        &self,
        context: &str,
        fingerprint: &Fingerprint,
    ) -> Result<Option<u32>, Error> {
        Ok(self
            .fingerprint_index
            .get(&(context.to_string(), fingerprint.0.clone()))
            .map(|v| *v))
    }

    async fn get_schema(&self, context: &str, global_id: u32) -> Result<Option<SchemaRecord>, Error> {
        Ok(self
            .schemas
            .get(&(context.to_string(), global_id))
            .map(|r| r.clone()))
    }

    async fn put_schema(
        &self,
        context: &str,
        global_id: u32,
        fingerprint: Fingerprint,
        record: SchemaRecord,
    ) -> Result<(), Error> {
        self.fingerprint_index
            .insert((context.to_string(), fingerprint.0.clone()), global_id);
        self.id_to_fingerprint
            .insert((context.to_string(), global_id), fingerprint.0);
        self.schemas.insert((context.to_string(), global_id), record);
        Ok(())
    }

    async fn remove_schema_if_unreferenced(
        &self,
        context: &str,
        global_id: u32,
    ) -> Result<(), Error> {
        let still_referenced = self.versions.iter().any(|entry| {
            entry.key().0 == context && entry.value().iter().any(|v| v.global_id == global_id)
        });
        if still_referenced {
            return Ok(());
        }
        self.schemas.remove(&(context.to_string(), global_id));
        if let Some((_, fingerprint)) = self.id_to_fingerprint.remove(&(context.to_string(), global_id)) {
            self.fingerprint_index
                .remove(&(context.to_string(), fingerprint));
        }
        Ok(())
    }

    async fn list_subjects(&self, context: &str) -> Result<Vec<String>, Error> {
        let mut subjects: Vec<String> = self
            .versions
            .iter()
            .filter(|e| e.key().0 == context && !e.value().is_empty())
            .map(|e| e.key().1.clone())
            .collect();
        subjects.sort();
        Ok(subjects)
    }

    async fn get_versions(&self, key: &SubjectKey) -> Result<Vec<VersionRecord>, Error> {
        Ok(self
            .versions
            .get(&(key.context.clone(), key.name.clone()))
            .map(|v| v.clone())
            .unwrap_or_default())
    }

    async fn put_version(&self, key: &SubjectKey, record: VersionRecord) -> Result<(), Error> {
        let mut entry = self
            .versions
            .entry((key.context.clone(), key.name.clone()))
            .or_default();
        entry.retain(|v| v.version != record.version);
        entry.push(record);
        entry.sort_by_key(|v| v.version);
        Ok(())
    }

    async fn set_version_deleted(
        &self,
        key: &SubjectKey,
        version: i32,
        deleted: bool,
    ) -> Result<(), Error> {
        if let Some(mut entry) = self.versions.get_mut(&(key.context.clone(), key.name.clone())) {
            if let Some(v) = entry.iter_mut().find(|v| v.version == version) {
                v.deleted = deleted;
            }
        }
        Ok(())
    }

    async fn remove_version(&self, key: &SubjectKey, version: i32) -> Result<(), Error> {
        if let Some(mut entry) = self.versions.get_mut(&(key.context.clone(), key.name.clone())) {
            entry.retain(|v| v.version != version);
        }
        Ok(())
    }

    async fn clear_subject(&self, key: &SubjectKey) -> Result<(), Error> {
        self.versions.remove(&(key.context.clone(), key.name.clone()));
        Ok(())
    }

    async fn has_other_referrer(
        &self,
        context: &str,
        global_id: u32,
        excluding: &SubjectKey,
        excluding_version: i32,
    ) -> Result<bool, Error> {
        // A "referrer" is any version whose *schema's references* name the
        // `(subject, version)` being excluded; the schema itself doesn't
        // carry the referee's global_id directly, so we resolve through
        // `find_referrers` keyed on the excluded subject/version instead.
        let referrers = self
            .find_referrers(context, &excluding.name, excluding_version)
            .await?;
        let _ = global_id;
        Ok(referrers
            .iter()
            .any(|(s, v)| !(s == excluding && *v == excluding_version)))
    }

    async fn find_referrers(
        &self,
        context: &str,
        referenced_subject: &str,
        referenced_version: i32,
    ) -> Result<Vec<(SubjectKey, i32)>, Error> {
        let mut out = Vec::new();
        for entry in self.versions.iter().filter(|e| e.key().0 == context) {
            let subject_name = entry.key().1.clone();
            for version in entry.value() {
                if version.deleted {
                    continue;
                }
                if let Some(schema) = self.schemas.get(&(context.to_string(), version.global_id)) {
                    let references_target = schema.references.iter().any(|r| {
                        r.subject == referenced_subject && r.version == referenced_version
                    });
                    if references_target {
                        out.push((
                            SubjectKey::new(context.to_string(), subject_name.clone()),
                            version.version,
                        ));
                    }
                }
            }
        }
        Ok(out)
    }

    async fn subjects_for_global_id(
        &self,
        context: &str,
        global_id: u32,
    ) -> Result<Vec<String>, Error> {
        let mut out: Vec<String> = self
            .versions
            .iter()
            .filter(|e| e.key().0 == context)
            .filter(|e| {
                e.value()
                    .iter()
                    .any(|v| !v.deleted && v.global_id == global_id)
            })
            .map(|e| e.key().1.clone())
            .collect();
        out.sort();
        out.dedup();
        Ok(out)
    }

    async fn get_config(&self, scope: &ConfigScope) -> Result<Option<ConfigRecord>, Error> {
        Ok(self.configs.get(&scope.store_key()).map(|v| v.clone()))
    }

    async fn put_config(&self, scope: &ConfigScope, record: ConfigRecord) -> Result<(), Error> {
        self.configs.insert(scope.store_key(), record);
        Ok(())
    }

    async fn delete_config(&self, scope: &ConfigScope) -> Result<Option<ConfigRecord>, Error> {
        Ok(self.configs.remove(&scope.store_key()).map(|(_, v)| v))
    }

    async fn get_mode(&self, scope: &ConfigScope) -> Result<Option<ModeRecord>, Error> {
        Ok(self.modes.get(&scope.store_key()).map(|v| v.clone()))
    }

    async fn put_mode(&self, scope: &ConfigScope, record: ModeRecord) -> Result<(), Error> {
        self.modes.insert(scope.store_key(), record);
        Ok(())
    }

    async fn delete_mode(&self, scope: &ConfigScope) -> Result<Option<ModeRecord>, Error> {
        Ok(self.modes.remove(&scope.store_key()).map(|(_, v)| v))
    }

    async fn get_kek(&self, name: &str) -> Result<Option<KekRecord>, Error> {
        Ok(self.keks.get(name).map(|v| v.clone()))
    }

    async fn put_kek(&self, record: KekRecord) -> Result<(), Error> {
        self.keks.insert(record.name.clone(), record);
        Ok(())
    }

    async fn list_keks(&self, include_deleted: bool) -> Result<Vec<KekRecord>, Error> {
        let mut out: Vec<KekRecord> = self
            .keks
            .iter()
            .map(|e| e.value().clone())
            .filter(|k| include_deleted || !k.deleted)
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn set_kek_deleted(&self, name: &str, deleted: bool) -> Result<(), Error> {
        if let Some(mut kek) = self.keks.get_mut(name) {
            kek.deleted = deleted;
        }
        Ok(())
    }

    async fn remove_kek(&self, name: &str) -> Result<(), Error> {
        self.keks.remove(name);
        Ok(())
    }

    async fn list_deks(
        &self,
        kek_name: &str,
        subject: &str,
        algorithm: Algorithm,
        include_deleted: bool,
    ) -> Result<Vec<DekRecord>, Error> {
        let key = (kek_name.to_string(), subject.to_string(), algorithm);
        let mut out: Vec<DekRecord> = self
            .deks
            .get(&key)
            .map(|v| v.clone())
            .unwrap_or_default()
            .into_iter()
            .filter(|d| include_deleted || !d.deleted)
            .collect();
        out.sort_by_key(|d| d.version);
        Ok(out)
    }

    async fn put_dek(&self, record: DekRecord) -> Result<(), Error> {
        let key = (record.kek_name.clone(), record.subject.clone(), record.algorithm);
        let mut entry = self.deks.entry(key).or_default();
        entry.retain(|d| d.version != record.version);
        entry.push(record);
        Ok(())
    }

    async fn set_dek_deleted(
        &self,
        kek_name: &str,
        subject: &str,
        algorithm: Algorithm,
        version: i32,
        deleted: bool,
    ) -> Result<(), Error> {
        let key = (kek_name.to_string(), subject.to_string(), algorithm);
        if let Some(mut entry) = self.deks.get_mut(&key) {
            if let Some(d) = entry.iter_mut().find(|d| d.version == version) {
                d.deleted = deleted;
            }
        }
        Ok(())
    }
}
