//! SubjectManager — `spec.md` §4.6. Subject/version lifecycle: register
//! (the seven-step algorithm below), lookup-by-content, version resolution,
//! listing, soft/permanent delete at both granularities, and the
//! reference guard.

use std::collections::HashMap;

use serde_json::Value;

use crate::compatibility::{self, Candidate, Existing, ReferenceResolver};
use crate::error::Error;
use crate::fingerprint::{self, Fingerprint, SchemaReference};
use crate::identity;
use crate::parser::{self, ParsedSchema};
use crate::policy::{self, Operation};
use crate::settings::Settings;
use crate::store::{SchemaRecord, Store, VersionRecord};
use crate::types::{Mode, SchemaType, SubjectKey};

/// A registration request, pre-`ContextRouter`/alias resolution.
pub struct RegisterRequest {
    pub schema_type: SchemaType,
    pub schema_text: String,
    pub references: Vec<SchemaReference>,
    pub metadata: Option<Value>,
    pub rule_set: Option<Value>,
    /// Present only under IMPORT.
    pub explicit_id: Option<u32>,
    pub explicit_version: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisteredVersion {
    pub id: u32,
    pub version: i32,
}

/// Registers `request` under `key`, per the seven-step algorithm in
/// `spec.md` §4.6. Must be called with the caller already holding the
/// per-`(context, subject)` stripe lock (`spec.md` §5) — this function does
/// not lock internally so it composes with the reference-resolution and
/// gate checks the facade performs around it.
pub async fn register(
    store: &dyn Store,
    settings: &Settings,
    key: &SubjectKey,
    request: RegisterRequest,
) -> Result<RegisteredVersion, Error> {
    // 1. Policy gate.
    let mode = policy::resolve_mode(store, settings, key).await?;
    policy::check_gate(
        store,
        settings,
        key,
        Operation::Register {
            explicit_id: request.explicit_id.is_some(),
        },
    )
    .await?;

    // 2. Parse; resolve references.
    let parsed = parser::parse(request.schema_type, &request.schema_text, &request.references)?;
    let reference_schemas = resolve_references(store, &key.context, &request.references).await?;

    // 3. Fingerprint.
    let fingerprint =
        fingerprint::compute_from_parsed(request.schema_type, &parsed, &request.references);

    let all_versions = store.get_versions(key).await?;
    let next_expected_version = all_versions.iter().map(|v| v.version).max().unwrap_or(0) + 1;

    // 4. `confluent:version` CAS.
    let requested_version = extract_confluent_version(request.metadata.as_ref());
    if let Some(requested) = requested_version {
        if requested != next_expected_version {
            return Err(Error::InvalidSchema(format!(
                "confluent:version {requested} does not match the expected next version {next_expected_version}"
            )));
        }
    }

    let active_latest = all_versions.iter().filter(|v| !v.deleted).max_by_key(|v| v.version);

    // 5. Dedup / metadata-only new version.
    if let Some(latest) = active_latest {
        if let Some(latest_schema) = store.get_schema(&key.context, latest.global_id).await? {
            let latest_fingerprint = fingerprint::compute(
                latest_schema.schema_type,
                &latest_schema.canonical_text,
                &latest_schema.references,
            )?;
            if latest_fingerprint == fingerprint {
                let metadata = request.metadata.clone().or_else(|| latest.metadata.clone());
                let rule_set = request.rule_set.clone().or_else(|| latest.rule_set.clone());
                let identical_envelope =
                    metadata == latest.metadata && rule_set == latest.rule_set;
                if identical_envelope {
                    return Ok(RegisteredVersion {
                        id: latest.global_id,
                        version: latest.version,
                    });
                }
                // Same content, different envelope: new version, same id,
                // no compatibility check needed (content is unchanged).
                let version_number = next_expected_version;
                store
                    .put_version(
                        key,
                        VersionRecord {
                            version: version_number,
                            global_id: latest.global_id,
                            metadata,
                            rule_set,
                            deleted: false,
                        },
                    )
                    .await?;
                return Ok(RegisteredVersion {
                    id: latest.global_id,
                    version: version_number,
                });
            }
        }
    }

    // 6. Compatibility check (skipped entirely under IMPORT, per `spec.md`
    // §4.4 — and there's nothing meaningful to dedup against once content
    // differs from the active latest).
    if mode != Mode::Import {
        check_compatibility(
            store,
            settings,
            key,
            &parsed,
            request.metadata.as_ref(),
            &all_versions,
            &reference_schemas,
        )
        .await?;
    }

    // 7. Allocate version + global id.
    let record = SchemaRecord {
        schema_type: request.schema_type,
        canonical_text: parsed.canonical_text.clone(),
        references: request.references.clone(),
    };

    let assignment = match request.explicit_id {
        Some(id) => identity::assign_explicit(store, &key.context, id, &fingerprint, record).await?,
        None => identity::assign_auto(store, &key.context, &fingerprint, record).await?,
    };

    let version_number = request.explicit_version.unwrap_or(next_expected_version);
    store
        .put_version(
            key,
            VersionRecord {
                version: version_number,
                global_id: assignment.id(),
                metadata: request.metadata,
                rule_set: request.rule_set,
                deleted: false,
            },
        )
        .await?;
    store.record_context(&key.context).await?;

    Ok(RegisteredVersion {
        id: assignment.id(),
        version: version_number,
    })
}

fn extract_confluent_version(metadata: Option<&Value>) -> Option<i32> {
    let raw = metadata?.get("properties")?.get("confluent:version")?;
    let as_number = match raw {
        Value::String(s) => s.parse::<i32>().ok()?,
        Value::Number(n) => n.as_i64()? as i32,
        _ => return None,
    };
    if as_number <= 0 {
        None
    } else {
        Some(as_number)
    }
}

fn extract_group_value(metadata: Option<&Value>, property_name: &str) -> Option<String> {
    let raw = metadata?.get("properties")?.get(property_name)?;
    match raw {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

async fn resolve_references(
    store: &dyn Store,
    context: &str,
    references: &[SchemaReference],
) -> Result<HashMap<String, ParsedSchema>, Error> {
    let mut out = HashMap::new();
    for reference in references {
        let referenced_key = SubjectKey::new(context.to_string(), reference.subject.clone());
        let versions = store.get_versions(&referenced_key).await?;
        let version = versions
            .iter()
            .find(|v| v.version == reference.version)
            .ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "dangling reference: '{}' version {} does not exist",
                    reference.subject, reference.version
                ))
            })?;
        let schema = store
            .get_schema(context, version.global_id)
            .await?
            .ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "dangling reference: schema body for '{}' version {} is gone",
                    reference.subject, reference.version
                ))
            })?;
        let parsed = parser::parse(schema.schema_type, &schema.canonical_text, &schema.references)?;
        out.insert(reference.name.clone(), parsed);
    }
    Ok(out)
}

struct MapResolver<'a>(&'a HashMap<String, ParsedSchema>);

impl<'a> ReferenceResolver for MapResolver<'a> {
    fn resolve(&self, reference: &SchemaReference) -> Option<ParsedSchema> {
        self.0.get(&reference.name).cloned()
    }
}

#[allow(clippy::too_many_arguments)]
async fn check_compatibility(
    store: &dyn Store,
    settings: &Settings,
    key: &SubjectKey,
    candidate_parsed: &ParsedSchema,
    candidate_metadata: Option<&Value>,
    all_versions: &[VersionRecord],
    candidate_references: &HashMap<String, ParsedSchema>,
) -> Result<(), Error> {
    let effective = policy::resolve_config(store, settings, key).await?;

    let candidate_group = candidate_metadata.and_then(|m| {
        effective
            .compatibility_group
            .as_deref()
            .and_then(|prop| extract_group_value(Some(m), prop))
    });

    let mut existing_parsed = Vec::new();
    for version in all_versions.iter().filter(|v| !v.deleted) {
        let Some(schema) = store.get_schema(&key.context, version.global_id).await? else {
            continue;
        };
        let parsed = parser::parse(schema.schema_type, &schema.canonical_text, &schema.references)?;
        let group = effective
            .compatibility_group
            .as_deref()
            .and_then(|prop| extract_group_value(version.metadata.as_ref(), prop));
        existing_parsed.push((parsed, group));
    }

    let existing: Vec<Existing<'_>> = existing_parsed
        .iter()
        .map(|(parsed, group)| Existing {
            parsed,
            references: &[],
            compatibility_group: group.as_deref(),
        })
        .collect();

    let candidate = Candidate {
        parsed: candidate_parsed,
        references: &[],
    };

    let resolver = MapResolver(candidate_references);

    compatibility::check(
        effective.compatibility_level,
        &candidate,
        candidate_group.as_deref(),
        &existing,
        &resolver,
    )
}

/// Lookup a subject by schema content (`POST /subjects/{s}`), returning the
/// matching active version. `spec.md` §4.6.
pub async fn lookup_by_content(
    store: &dyn Store,
    key: &SubjectKey,
    schema_type: SchemaType,
    schema_text: &str,
    references: &[SchemaReference],
) -> Result<RegisteredVersion, Error> {
    let all_versions = store.get_versions(key).await?;
    if all_versions.is_empty() {
        return Err(Error::SubjectNotFound(key.name.clone()));
    }
    let fingerprint = fingerprint::compute(schema_type, schema_text, references)?;
    for version in all_versions.iter().filter(|v| !v.deleted) {
        if let Some(schema) = store.get_schema(&key.context, version.global_id).await? {
            let candidate_fp = fingerprint::compute(
                schema.schema_type,
                &schema.canonical_text,
                &schema.references,
            )?;
            if candidate_fp == fingerprint {
                return Ok(RegisteredVersion {
                    id: version.global_id,
                    version: version.version,
                });
            }
        }
    }
    Err(Error::SchemaNotFoundInSubject(key.name.clone()))
}

/// Version literal from the HTTP-shaped API: a positive integer, or the
/// `-1`/`latest` resolution hint. Never persisted (`spec.md` §9).
#[derive(Debug, Clone, Copy)]
pub enum VersionSelector {
    Exact(i32),
    Latest,
}

pub fn parse_version_selector(raw: &str) -> Result<VersionSelector, Error> {
    if raw == "latest" {
        return Ok(VersionSelector::Latest);
    }
    let n: i32 = raw
        .parse()
        .map_err(|_| Error::InvalidVersion(raw.to_string()))?;
    if n == -1 {
        Ok(VersionSelector::Latest)
    } else if n > 0 {
        Ok(VersionSelector::Exact(n))
    } else {
        Err(Error::InvalidVersion(raw.to_string()))
    }
}

/// `(s, v)`: resolves `v` against the version set. `include_deleted` widens
/// the set the way `?deleted=true` does.
pub async fn get_version(
    store: &dyn Store,
    key: &SubjectKey,
    selector: VersionSelector,
    include_deleted: bool,
) -> Result<VersionRecord, Error> {
    let all_versions = store.get_versions(key).await?;
    if all_versions.is_empty() {
        return Err(Error::SubjectNotFound(key.name.clone()));
    }
    let candidates: Vec<&VersionRecord> = all_versions
        .iter()
        .filter(|v| include_deleted || !v.deleted)
        .collect();

    match selector {
        VersionSelector::Latest => candidates
            .into_iter()
            .max_by_key(|v| v.version)
            .cloned()
            .ok_or_else(|| Error::VersionNotFound(-1, key.name.clone())),
        VersionSelector::Exact(n) => candidates
            .into_iter()
            .find(|v| v.version == n)
            .cloned()
            .ok_or(Error::VersionNotFound(n, key.name.clone())),
    }
}

/// Ordered list of version numbers. `spec.md` §4.6: when every version is
/// soft-deleted and `include_deleted` is false, the subject is reported as
/// not found rather than an empty list.
pub async fn list_versions(
    store: &dyn Store,
    key: &SubjectKey,
    include_deleted: bool,
) -> Result<Vec<i32>, Error> {
    let all_versions = store.get_versions(key).await?;
    if all_versions.is_empty() {
        return Err(Error::SubjectNotFound(key.name.clone()));
    }
    let mut numbers: Vec<i32> = all_versions
        .iter()
        .filter(|v| include_deleted || !v.deleted)
        .map(|v| v.version)
        .collect();
    if numbers.is_empty() && !include_deleted {
        return Err(Error::SubjectNotFound(key.name.clone()));
    }
    numbers.sort();
    Ok(numbers)
}

/// Soft-deletes every active version of a subject; returns the version
/// numbers marked. A second call on an already fully soft-deleted subject
/// is `40404`.
pub async fn soft_delete_subject(store: &dyn Store, key: &SubjectKey) -> Result<Vec<i32>, Error> {
    let all_versions = store.get_versions(key).await?;
    if all_versions.is_empty() {
        return Err(Error::SubjectNotFound(key.name.clone()));
    }
    let active: Vec<i32> = all_versions.iter().filter(|v| !v.deleted).map(|v| v.version).collect();
    if active.is_empty() {
        return Err(Error::DoubleSoftDelete(key.name.clone()));
    }
    for version in &active {
        guard_no_referrer(store, key, *version).await?;
    }
    for version in &active {
        store.set_version_deleted(key, *version, true).await?;
    }
    Ok(active)
}

/// Permanent delete of a subject: requires every version already
/// soft-deleted, guards against outstanding referrers across the whole
/// tombstoned set, then physically clears the subject so the next
/// registration restarts numbering at 1.
pub async fn permanently_delete_subject(store: &dyn Store, key: &SubjectKey) -> Result<Vec<i32>, Error> {
    let all_versions = store.get_versions(key).await?;
    if all_versions.is_empty() {
        return Err(Error::SubjectNotFound(key.name.clone()));
    }
    if all_versions.iter().any(|v| !v.deleted) {
        return Err(Error::InvalidSchema(
            "permanent delete requires the subject to be soft-deleted first".to_string(),
        ));
    }
    for version in &all_versions {
        guard_no_referrer(store, key, version.version).await?;
    }
    let numbers: Vec<i32> = all_versions.iter().map(|v| v.version).collect();
    let global_ids: Vec<u32> = all_versions.iter().map(|v| v.global_id).collect();
    store.clear_subject(key).await?;
    for id in global_ids {
        store.remove_schema_if_unreferenced(&key.context, id).await?;
    }
    Ok(numbers)
}

/// Soft-delete a single version. `spec.md` §4.6: analogous to subject-level
/// delete but scoped to one version.
pub async fn soft_delete_version(store: &dyn Store, key: &SubjectKey, version: i32) -> Result<(), Error> {
    let record = find_version(store, key, version).await?;
    if record.deleted {
        return Err(Error::DoubleSoftDelete(key.name.clone()));
    }
    guard_no_referrer(store, key, version).await?;
    store.set_version_deleted(key, version, true).await
}

/// Permanent delete of a single version. `settings.resolve_latest_on_permanent_delete`
/// governs whether the `latest` literal resolves and proceeds or is
/// rejected outright (`spec.md` §9 open question).
pub async fn permanently_delete_version(
    store: &dyn Store,
    settings: &Settings,
    key: &SubjectKey,
    selector: VersionSelector,
) -> Result<i32, Error> {
    let number = match selector {
        VersionSelector::Exact(n) => n,
        VersionSelector::Latest => {
            if !settings.resolve_latest_on_permanent_delete {
                return Err(Error::InvalidVersion("latest".to_string()));
            }
            get_version(store, key, VersionSelector::Latest, true).await?.version
        }
    };
    let record = find_version(store, key, number).await?;
    if !record.deleted {
        return Err(Error::InvalidSchema(
            "permanent delete requires the version to be soft-deleted first".to_string(),
        ));
    }
    guard_no_referrer(store, key, number).await?;
    store.remove_version(key, number).await?;
    store
        .remove_schema_if_unreferenced(&key.context, record.global_id)
        .await
}

async fn find_version(store: &dyn Store, key: &SubjectKey, version: i32) -> Result<VersionRecord, Error> {
    store
        .get_versions(key)
        .await?
        .into_iter()
        .find(|v| v.version == version)
        .ok_or(Error::VersionNotFound(version, key.name.clone()))
}

/// Any delete (soft or permanent) of a version with at least one active
/// referrer fails with `42206` (`spec.md` §4.6).
async fn guard_no_referrer(store: &dyn Store, key: &SubjectKey, version: i32) -> Result<(), Error> {
    let referrers = store
        .find_referrers(&key.context, &key.name, version)
        .await?;
    if referrers.is_empty() {
        Ok(())
    } else {
        Err(Error::ReferenceExists(format!(
            "'{}' version {} is still referenced by {} schema(s)",
            key.name,
            version,
            referrers.len()
        )))
    }
}

/// `GET /schemas/ids/{g}/subjects`: every subject in `context` with an
/// active version bound to `global_id`.
pub async fn subjects_for_schema_id(
    store: &dyn Store,
    context: &str,
    global_id: u32,
) -> Result<Vec<String>, Error> {
    store.subjects_for_global_id(context, global_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn key() -> SubjectKey {
        SubjectKey::new(".", "orders-value")
    }

    fn request(schema: &str) -> RegisterRequest {
        RegisterRequest {
            schema_type: SchemaType::Json,
            schema_text: schema.to_string(),
            references: vec![],
            metadata: None,
            rule_set: None,
            explicit_id: None,
            explicit_version: None,
        }
    }

    #[tokio::test]
    async fn first_registration_gets_version_one() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        let result = register(&store, &settings, &key(), request(r#"{"type":"string"}"#))
            .await
            .unwrap();
        assert_eq!(result.version, 1);
        assert_eq!(result.id, 1);
    }

    #[tokio::test]
    async fn re_registering_identical_content_dedups() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        let first = register(&store, &settings, &key(), request(r#"{"type":"string"}"#))
            .await
            .unwrap();
        let second = register(&store, &settings, &key(), request(r#"{"type":"string"}"#))
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn metadata_only_change_keeps_id_bumps_version() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        let first = register(&store, &settings, &key(), request(r#"{"type":"string"}"#))
            .await
            .unwrap();
        let mut second_request = request(r#"{"type":"string"}"#);
        second_request.metadata = Some(serde_json::json!({"properties": {"owner": "team-a"}}));
        let second = register(&store, &settings, &key(), second_request).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.version, first.version + 1);
    }

    #[tokio::test]
    async fn incompatible_change_is_rejected_under_backward() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        register(
            &store,
            &settings,
            &key(),
            request(r#"{"type":"object","properties":{"a":{"type":"string"}}}"#),
        )
        .await
        .unwrap();
        let mut incompatible =
            request(r#"{"type":"object","properties":{"a":{"type":"string"}},"required":["a"]}"#);
        incompatible.metadata = None;
        let err = register(&store, &settings, &key(), incompatible).await.unwrap_err();
        assert!(err.is_compatibility_violation());
    }

    #[tokio::test]
    async fn confluent_version_cas_rejects_mismatch() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        let mut req = request(r#"{"type":"string"}"#);
        req.metadata = Some(serde_json::json!({"properties": {"confluent:version": 2}}));
        let err = register(&store, &settings, &key(), req).await.unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));
    }

    #[tokio::test]
    async fn soft_delete_then_permanent_delete_resets_numbering() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        register(&store, &settings, &key(), request(r#"{"type":"string"}"#))
            .await
            .unwrap();
        soft_delete_subject(&store, &key()).await.unwrap();
        permanently_delete_subject(&store, &key()).await.unwrap();
        let result = register(&store, &settings, &key(), request(r#"{"type":"string"}"#))
            .await
            .unwrap();
        assert_eq!(result.version, 1);
    }

    #[tokio::test]
    async fn double_soft_delete_is_rejected() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        register(&store, &settings, &key(), request(r#"{"type":"string"}"#))
            .await
            .unwrap();
        soft_delete_subject(&store, &key()).await.unwrap();
        let err = soft_delete_subject(&store, &key()).await.unwrap_err();
        assert!(matches!(err, Error::DoubleSoftDelete(_)));
    }
}
