//! DekRegistry — `spec.md` §4.8. KEK/DEK CRUD, soft-delete/undelete,
//! versioning of `(kek_name, subject, algorithm)` triples. Client-side
//! field-level encryption key metadata only — the KMS call itself and the
//! actual key material encryption/decryption are opaque, out-of-scope
//! collaborators (`spec.md` §1).

use crate::error::Error;
use crate::store::{DekRecord, KekRecord, Store};
use crate::types::{Algorithm, KmsType};

pub struct NewKek {
    pub name: String,
    pub kms_type: KmsType,
    pub kms_key_id: String,
    pub kms_props: std::collections::BTreeMap<String, String>,
    pub doc: Option<String>,
    pub shared: bool,
}

/// Creates a KEK. `40970` (`DuplicateKek`) if the name is already taken,
/// including by a soft-deleted KEK — names are unique regardless of
/// deletion state.
pub async fn create_kek(store: &dyn Store, new: NewKek) -> Result<KekRecord, Error> {
    if store.get_kek(&new.name).await?.is_some() {
        return Err(Error::DuplicateKek(new.name));
    }
    let record = KekRecord {
        name: new.name,
        kms_type: new.kms_type,
        kms_key_id: new.kms_key_id,
        kms_props: new.kms_props,
        doc: new.doc,
        shared: new.shared,
        deleted: false,
    };
    store.put_kek(record.clone()).await?;
    Ok(record)
}

pub async fn get_kek(store: &dyn Store, name: &str) -> Result<KekRecord, Error> {
    store
        .get_kek(name)
        .await?
        .ok_or_else(|| Error::KekNotFound(name.to_string()))
}

pub async fn list_keks(store: &dyn Store, include_deleted: bool) -> Result<Vec<KekRecord>, Error> {
    store.list_keks(include_deleted).await
}

pub async fn soft_delete_kek(store: &dyn Store, name: &str) -> Result<(), Error> {
    get_kek(store, name).await?;
    store.set_kek_deleted(name, true).await
}

pub async fn undelete_kek(store: &dyn Store, name: &str) -> Result<(), Error> {
    get_kek(store, name).await?;
    store.set_kek_deleted(name, false).await
}

/// Permanently removes a KEK. Unlike subjects, `spec.md` doesn't gate this
/// on prior soft-delete or on outstanding DEKs — DEK creation under a
/// soft-deleted KEK is explicitly permitted (`spec.md` §4.8), so this
/// registry treats KEK removal the same way: a pure metadata-table delete.
pub async fn permanently_delete_kek(store: &dyn Store, name: &str) -> Result<(), Error> {
    get_kek(store, name).await?;
    store.remove_kek(name).await
}

pub struct NewDek {
    pub kek_name: String,
    pub subject: String,
    pub algorithm: Algorithm,
    pub encrypted_key_material: String,
}

/// Creates a DEK, allocating `latest + 1` for `(kek_name, subject,
/// algorithm)`. DEK creation under a soft-deleted KEK is permitted
/// (`spec.md` §4.8) — the KEK must merely exist.
pub async fn create_dek(store: &dyn Store, new: NewDek) -> Result<DekRecord, Error> {
    get_kek(store, &new.kek_name).await?;
    let existing = store
        .list_deks(&new.kek_name, &new.subject, new.algorithm, true)
        .await?;
    let next_version = existing.iter().map(|d| d.version).max().unwrap_or(0) + 1;
    let record = DekRecord {
        kek_name: new.kek_name,
        subject: new.subject,
        version: next_version,
        algorithm: new.algorithm,
        encrypted_key_material: new.encrypted_key_material,
        deleted: false,
    };
    store.put_dek(record.clone()).await?;
    Ok(record)
}

pub async fn get_latest_dek(
    store: &dyn Store,
    kek_name: &str,
    subject: &str,
    algorithm: Algorithm,
    include_deleted: bool,
) -> Result<DekRecord, Error> {
    store
        .list_deks(kek_name, subject, algorithm, include_deleted)
        .await?
        .into_iter()
        .max_by_key(|d| d.version)
        .ok_or_else(|| Error::DekNotFound {
            kek: kek_name.to_string(),
            subject: subject.to_string(),
            algorithm,
        })
}

pub async fn set_dek_deleted(
    store: &dyn Store,
    kek_name: &str,
    subject: &str,
    algorithm: Algorithm,
    version: i32,
    deleted: bool,
) -> Result<(), Error> {
    let existing = store
        .list_deks(kek_name, subject, algorithm, true)
        .await?
        .into_iter()
        .any(|d| d.version == version);
    if !existing {
        return Err(Error::DekNotFound {
            kek: kek_name.to_string(),
            subject: subject.to_string(),
            algorithm,
        });
    }
    store
        .set_dek_deleted(kek_name, subject, algorithm, version, deleted)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn kek(name: &str) -> NewKek {
        NewKek {
            name: name.to_string(),
            kms_type: KmsType::AwsKms,
            kms_key_id: "arn:aws:kms:...".to_string(),
            kms_props: Default::default(),
            doc: None,
            shared: false,
        }
    }

    #[tokio::test]
    async fn duplicate_kek_name_is_rejected() {
        let store = MemoryStore::new();
        create_kek(&store, kek("my-kek")).await.unwrap();
        let err = create_kek(&store, kek("my-kek")).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateKek(_)));
    }

    #[tokio::test]
    async fn dek_versions_increment_per_triple() {
        let store = MemoryStore::new();
        create_kek(&store, kek("my-kek")).await.unwrap();
        let new_dek = || NewDek {
            kek_name: "my-kek".to_string(),
            subject: "orders-value".to_string(),
            algorithm: Algorithm::Aes256Gcm,
            encrypted_key_material: "ciphertext".to_string(),
        };
        let d1 = create_dek(&store, new_dek()).await.unwrap();
        let d2 = create_dek(&store, new_dek()).await.unwrap();
        assert_eq!(d1.version, 1);
        assert_eq!(d2.version, 2);
    }

    #[tokio::test]
    async fn dek_creation_under_soft_deleted_kek_is_permitted() {
        let store = MemoryStore::new();
        create_kek(&store, kek("my-kek")).await.unwrap();
        soft_delete_kek(&store, "my-kek").await.unwrap();
        let dek = create_dek(
            &store,
            NewDek {
                kek_name: "my-kek".to_string(),
                subject: "orders-value".to_string(),
                algorithm: Algorithm::Aes256Gcm,
                encrypted_key_material: "ciphertext".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(dek.version, 1);
    }
}
