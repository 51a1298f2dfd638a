//! `SchemaRegistryCore` — the facade wiring every component together:
//! ContextRouter resolves the request, PolicyResolver gates it, SubjectManager
//! calls IdentityEngine/CompatibilityChecker before committing to Store, all
//! under the per-`(context, subject)` striped lock (`spec.md` §2/§5).

use crate::context::{self, ParsedSubject};
use crate::dek::{self, NewDek, NewKek};
use crate::error::Error;
use crate::fingerprint::SchemaReference;
use crate::lock::StripedLock;
use crate::parser;
use crate::policy::{self, EffectiveConfig, Operation};
use crate::settings::Settings;
use crate::store::{ConfigRecord, ConfigScope, DekRecord, KekRecord, ModeRecord, SchemaRecord, Store, VersionRecord};
use crate::subject::{self, RegisterRequest, RegisteredVersion, VersionSelector};
use crate::types::{Algorithm, CompatibilityLevel, KmsType, Mode, SchemaType, SubjectKey};

pub struct SchemaRegistryCore<S: Store> {
    store: S,
    locks: StripedLock,
    settings: Settings,
}

impl<S: Store> SchemaRegistryCore<S> {
    pub fn new(store: S, settings: Settings) -> Self {
        let locks = StripedLock::new(settings.lock_stripes);
        Self { store, locks, settings }
    }

    fn store(&self) -> &dyn Store {
        &self.store
    }

    /// Resolves a request subject string (qualified or not) plus an
    /// optional URL-prefix context, then follows a single-hop alias if the
    /// subject's own config names one. `spec.md` §4.1.
    async fn route(&self, subject: &str, url_context: Option<&str>) -> Result<SubjectKey, Error> {
        let parsed: ParsedSubject = context::parse_with_url_context(subject, url_context)?;
        let key = parsed.require_subject()?;
        let config = self.store().get_config(&ConfigScope::Subject(key.clone())).await?;
        Ok(context::resolve_alias(&key, config.and_then(|c| c.alias)))
    }

    pub async fn register(
        &self,
        subject: &str,
        url_context: Option<&str>,
        request: RegisterRequest,
    ) -> Result<RegisteredVersion, Error> {
        let key = self.route(subject, url_context).await?;
        let _span = crate::telemetry::mutation_span("register", &key.context, &key.name);
        let _guard = self.locks.lock(&key.context, &key.name).await;
        subject::register(self.store(), &self.settings, &key, request).await
    }

    pub async fn lookup_by_content(
        &self,
        subject: &str,
        url_context: Option<&str>,
        schema_type: SchemaType,
        schema_text: &str,
        references: &[SchemaReference],
    ) -> Result<RegisteredVersion, Error> {
        let key = self.route(subject, url_context).await?;
        subject::lookup_by_content(self.store(), &key, schema_type, schema_text, references).await
    }

    pub async fn list_subjects(&self, context: &str) -> Result<Vec<String>, Error> {
        if policy::is_global_context(context) {
            return Err(Error::GlobalContextMisuse(
                "listing subjects under __GLOBAL is not permitted".to_string(),
            ));
        }
        self.store().list_subjects(context).await
    }

    pub async fn list_contexts(&self) -> Result<Vec<String>, Error> {
        self.store().list_contexts().await
    }

    pub async fn get_version(
        &self,
        subject: &str,
        url_context: Option<&str>,
        selector: VersionSelector,
        include_deleted: bool,
    ) -> Result<VersionRecord, Error> {
        let key = self.route(subject, url_context).await?;
        subject::get_version(self.store(), &key, selector, include_deleted).await
    }

    pub async fn list_versions(
        &self,
        subject: &str,
        url_context: Option<&str>,
        include_deleted: bool,
    ) -> Result<Vec<i32>, Error> {
        let key = self.route(subject, url_context).await?;
        subject::list_versions(self.store(), &key, include_deleted).await
    }

    pub async fn soft_delete_subject(
        &self,
        subject: &str,
        url_context: Option<&str>,
    ) -> Result<Vec<i32>, Error> {
        let key = self.route(subject, url_context).await?;
        let _span = crate::telemetry::mutation_span("soft_delete_subject", &key.context, &key.name);
        let _guard = self.locks.lock(&key.context, &key.name).await;
        policy::check_gate(self.store(), &self.settings, &key, Operation::DataMutation).await?;
        subject::soft_delete_subject(self.store(), &key).await
    }

    pub async fn permanently_delete_subject(
        &self,
        subject: &str,
        url_context: Option<&str>,
    ) -> Result<Vec<i32>, Error> {
        let key = self.route(subject, url_context).await?;
        let _span = crate::telemetry::mutation_span("permanently_delete_subject", &key.context, &key.name);
        let _guard = self.locks.lock(&key.context, &key.name).await;
        policy::check_gate(self.store(), &self.settings, &key, Operation::DataMutation).await?;
        subject::permanently_delete_subject(self.store(), &key).await
    }

    pub async fn soft_delete_version(
        &self,
        subject: &str,
        url_context: Option<&str>,
        version: i32,
    ) -> Result<(), Error> {
        let key = self.route(subject, url_context).await?;
        let _span = crate::telemetry::mutation_span("soft_delete_version", &key.context, &key.name);
        let _guard = self.locks.lock(&key.context, &key.name).await;
        policy::check_gate(self.store(), &self.settings, &key, Operation::DataMutation).await?;
        subject::soft_delete_version(self.store(), &key, version).await
    }

    pub async fn permanently_delete_version(
        &self,
        subject: &str,
        url_context: Option<&str>,
        selector: VersionSelector,
    ) -> Result<i32, Error> {
        let key = self.route(subject, url_context).await?;
        let _span = crate::telemetry::mutation_span("permanently_delete_version", &key.context, &key.name);
        let _guard = self.locks.lock(&key.context, &key.name).await;
        policy::check_gate(self.store(), &self.settings, &key, Operation::DataMutation).await?;
        subject::permanently_delete_version(self.store(), &self.settings, &key, selector).await
    }

    pub async fn get_schema_by_id(&self, context: &str, global_id: u32) -> Result<SchemaRecord, Error> {
        self.store()
            .get_schema(context, global_id)
            .await?
            .ok_or(Error::SchemaIdNotFound(global_id))
    }

    pub async fn subjects_for_schema_id(
        &self,
        context: &str,
        global_id: u32,
    ) -> Result<Vec<String>, Error> {
        subject::subjects_for_schema_id(self.store(), context, global_id).await
    }

    /// `POST /compatibility/subjects/{s}/versions/{v}` — dry-run check
    /// against a single stored version, without registering anything.
    pub async fn check_compatibility_dry_run(
        &self,
        subject: &str,
        url_context: Option<&str>,
        against: VersionSelector,
        schema_type: SchemaType,
        schema_text: &str,
        references: &[SchemaReference],
    ) -> Result<(), Error> {
        let key = self.route(subject, url_context).await?;
        let target = subject::get_version(self.store(), &key, against, false).await?;
        let target_schema = self
            .store()
            .get_schema(&key.context, target.global_id)
            .await?
            .ok_or(Error::SchemaIdNotFound(target.global_id))?;
        let target_parsed = parser::parse(
            target_schema.schema_type,
            &target_schema.canonical_text,
            &target_schema.references,
        )?;
        let candidate_parsed = parser::parse(schema_type, schema_text, references)?;

        let effective = policy::resolve_config(self.store(), &self.settings, &key).await?;

        struct EmptyResolver;
        impl crate::compatibility::ReferenceResolver for EmptyResolver {
            fn resolve(&self, _reference: &SchemaReference) -> Option<parser::ParsedSchema> {
                None
            }
        }

        let existing = crate::compatibility::Existing {
            parsed: &target_parsed,
            references: &[],
            compatibility_group: None,
        };
        let candidate = crate::compatibility::Candidate {
            parsed: &candidate_parsed,
            references: &[],
        };
        crate::compatibility::check(
            effective.compatibility_level,
            &candidate,
            None,
            &[existing],
            &EmptyResolver,
        )
    }

    // -- config / mode --------------------------------------------------

    pub async fn get_effective_config(
        &self,
        subject: &str,
        url_context: Option<&str>,
    ) -> Result<EffectiveConfig, Error> {
        let key = self.route(subject, url_context).await?;
        policy::resolve_config(self.store(), &self.settings, &key).await
    }

    pub async fn get_config_at_scope(&self, scope: ConfigScope) -> Result<Option<ConfigRecord>, Error> {
        policy::get_config_at_scope(self.store(), &scope).await
    }

    pub async fn put_config(
        &self,
        scope: ConfigScope,
        compatibility_level: CompatibilityLevel,
        compatibility_group: Option<String>,
        alias: Option<String>,
    ) -> Result<(), Error> {
        let _guard = match &scope {
            ConfigScope::Subject(key) => Some(self.locks.lock(&key.context, &key.name).await),
            _ => None,
        };
        if let ConfigScope::Subject(key) = &scope {
            policy::check_gate(self.store(), &self.settings, key, Operation::ConfigWrite).await?;
        }
        self.store()
            .put_config(
                &scope,
                ConfigRecord {
                    compatibility_level,
                    compatibility_group,
                    alias,
                },
            )
            .await
    }

    pub async fn delete_config(&self, scope: ConfigScope) -> Result<Option<ConfigRecord>, Error> {
        let _guard = match &scope {
            ConfigScope::Subject(key) => Some(self.locks.lock(&key.context, &key.name).await),
            _ => None,
        };
        if let ConfigScope::Subject(key) = &scope {
            policy::check_gate(self.store(), &self.settings, key, Operation::ConfigWrite).await?;
        }
        self.store().delete_config(&scope).await
    }

    pub async fn get_mode_at_scope(&self, scope: ConfigScope) -> Result<Option<ModeRecord>, Error> {
        policy::get_mode_at_scope(self.store(), &scope).await
    }

    pub async fn put_mode(&self, scope: ConfigScope, mode: Mode) -> Result<(), Error> {
        self.store().put_mode(&scope, ModeRecord { mode }).await
    }

    pub async fn delete_mode(&self, scope: ConfigScope) -> Result<Option<ModeRecord>, Error> {
        self.store().delete_mode(&scope).await
    }

    // -- DEK registry -----------------------------------------------------

    pub async fn create_kek(
        &self,
        name: String,
        kms_type: KmsType,
        kms_key_id: String,
        kms_props: std::collections::BTreeMap<String, String>,
        doc: Option<String>,
        shared: bool,
    ) -> Result<KekRecord, Error> {
        let _guard = self.locks.lock_kek(&name).await;
        dek::create_kek(
            self.store(),
            NewKek {
                name,
                kms_type,
                kms_key_id,
                kms_props,
                doc,
                shared,
            },
        )
        .await
    }

    pub async fn get_kek(&self, name: &str) -> Result<KekRecord, Error> {
        dek::get_kek(self.store(), name).await
    }

    pub async fn list_keks(&self, include_deleted: bool) -> Result<Vec<KekRecord>, Error> {
        dek::list_keks(self.store(), include_deleted).await
    }

    pub async fn soft_delete_kek(&self, name: &str) -> Result<(), Error> {
        let _guard = self.locks.lock_kek(name).await;
        dek::soft_delete_kek(self.store(), name).await
    }

    pub async fn undelete_kek(&self, name: &str) -> Result<(), Error> {
        let _guard = self.locks.lock_kek(name).await;
        dek::undelete_kek(self.store(), name).await
    }

    pub async fn permanently_delete_kek(&self, name: &str) -> Result<(), Error> {
        let _guard = self.locks.lock_kek(name).await;
        dek::permanently_delete_kek(self.store(), name).await
    }

    pub async fn create_dek(
        &self,
        kek_name: String,
        subject: String,
        algorithm: Algorithm,
        encrypted_key_material: String,
    ) -> Result<DekRecord, Error> {
        let _guard = self.locks.lock_kek(&kek_name).await;
        dek::create_dek(
            self.store(),
            NewDek {
                kek_name,
                subject,
                algorithm,
                encrypted_key_material,
            },
        )
        .await
    }

    pub async fn get_latest_dek(
        &self,
        kek_name: &str,
        subject: &str,
        algorithm: Algorithm,
        include_deleted: bool,
    ) -> Result<DekRecord, Error> {
        dek::get_latest_dek(self.store(), kek_name, subject, algorithm, include_deleted).await
    }

    pub async fn set_dek_deleted(
        &self,
        kek_name: &str,
        subject: &str,
        algorithm: Algorithm,
        version: i32,
        deleted: bool,
    ) -> Result<(), Error> {
        let _guard = self.locks.lock_kek(kek_name).await;
        dek::set_dek_deleted(self.store(), kek_name, subject, algorithm, version, deleted).await
    }
}
