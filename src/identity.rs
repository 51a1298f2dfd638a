//! IdentityEngine — `spec.md` §4.5. Content-addressed global ID assignment
//! and the per-context sequence's rewind protection. Two entry paths: auto
//! assignment under READWRITE, explicit assignment under IMPORT.

use crate::error::Error;
use crate::fingerprint::Fingerprint;
use crate::store::{SchemaRecord, Store};

/// The outcome of resolving a candidate schema to a global ID: either it
/// already existed (dedup, no sequence advance) or it was freshly bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Existing(u32),
    New(u32),
}

impl Assignment {
    pub fn id(&self) -> u32 {
        match self {
            Assignment::Existing(id) | Assignment::New(id) => *id,
        }
    }
}

/// Auto path (`spec.md` §4.5): if `fingerprint` is already bound in
/// `context`, return the existing id without touching the sequence.
/// Otherwise allocate `high_water_mark + 1`, bind it, and advance the mark.
pub async fn assign_auto(
    store: &dyn Store,
    context: &str,
    fingerprint: &Fingerprint,
    record: SchemaRecord,
) -> Result<Assignment, Error> {
    if let Some(existing) = store.find_global_id(context, fingerprint).await? {
        return Ok(Assignment::Existing(existing));
    }
    let next = store.high_water_mark(context).await? + 1;
    store
        .put_schema(context, next, fingerprint.clone(), record)
        .await?;
    store.raise_high_water_mark(context, next).await?;
    Ok(Assignment::New(next))
}

/// Explicit path (`spec.md` §4.5, IMPORT only): the caller supplies `id`.
/// If it already points to a *different* fingerprint in this context, that's
/// `422` (`InvalidSchema`, a conflicting import). If it points to the same
/// fingerprint, return the existing binding unchanged. Otherwise bind
/// `id <-> fingerprint` and raise the high-water mark so the next auto
/// assignment in this context is guaranteed to exceed every id ever
/// explicitly imported (sequence-rewind protection, `spec.md` §4.5/§8
/// invariant 3).
pub async fn assign_explicit(
    store: &dyn Store,
    context: &str,
    id: u32,
    fingerprint: &Fingerprint,
    record: SchemaRecord,
) -> Result<Assignment, Error> {
    if let Some(existing_id) = store.find_global_id(context, fingerprint).await? {
        if existing_id == id {
            return Ok(Assignment::Existing(id));
        }
    }
    if store.get_schema(context, id).await?.is_some() {
        return Err(Error::InvalidSchema(format!(
            "id {id} is already bound to a different schema in this context"
        )));
    }
    store
        .put_schema(context, id, fingerprint.clone(), record)
        .await?;
    store.raise_high_water_mark(context, id).await?;
    Ok(Assignment::New(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::types::SchemaType;

    fn record() -> SchemaRecord {
        SchemaRecord {
            schema_type: SchemaType::Json,
            canonical_text: r#"{"type":"string"}"#.to_string(),
            references: vec![],
        }
    }

    #[tokio::test]
    async fn auto_assignment_starts_at_one() {
        let store = MemoryStore::new();
        let fp = Fingerprint("a".to_string());
        let assignment = assign_auto(&store, "ctx", &fp, record()).await.unwrap();
        assert_eq!(assignment, Assignment::New(1));
    }

    #[tokio::test]
    async fn auto_assignment_dedups_known_fingerprint() {
        let store = MemoryStore::new();
        let fp = Fingerprint("a".to_string());
        assign_auto(&store, "ctx", &fp, record()).await.unwrap();
        let second = assign_auto(&store, "ctx", &fp, record()).await.unwrap();
        assert_eq!(second, Assignment::Existing(1));
    }

    #[tokio::test]
    async fn explicit_import_then_auto_never_rewinds() {
        let store = MemoryStore::new();
        let imported_fp = Fingerprint("seq-import".to_string());
        assign_explicit(&store, "ctx", 50_000, &imported_fp, record())
            .await
            .unwrap();

        let new_fp = Fingerprint("seq-new".to_string());
        let next = assign_auto(&store, "ctx", &new_fp, record()).await.unwrap();
        assert!(next.id() > 50_000);
    }

    #[tokio::test]
    async fn explicit_import_of_conflicting_fingerprint_is_rejected() {
        let store = MemoryStore::new();
        let fp_a = Fingerprint("a".to_string());
        let fp_b = Fingerprint("b".to_string());
        assign_explicit(&store, "ctx", 1, &fp_a, record()).await.unwrap();
        let err = assign_explicit(&store, "ctx", 1, &fp_b, record())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));
    }

    #[tokio::test]
    async fn explicit_import_of_same_fingerprint_is_idempotent() {
        let store = MemoryStore::new();
        let fp = Fingerprint("a".to_string());
        assign_explicit(&store, "ctx", 1, &fp, record()).await.unwrap();
        let second = assign_explicit(&store, "ctx", 1, &fp, record()).await.unwrap();
        assert_eq!(second, Assignment::Existing(1));
    }
}
