//! PolicyResolver — `spec.md` §4.7. Four-tier compatibility/mode
//! inheritance (`subject -> context -> __GLOBAL -> server default`), the
//! mutation gate (`READONLY` / `READONLY_OVERRIDE` / `IMPORT`), and the two
//! configuration knobs `spec.md` §9 leaves open.

use crate::context::{DEFAULT_CONTEXT, GLOBAL_CONTEXT};
use crate::error::Error;
use crate::settings::Settings;
use crate::store::{ConfigRecord, ConfigScope, ModeRecord, Store};
use crate::types::{CompatibilityLevel, Mode, SubjectKey};

/// The kind of operation being gated, since `spec.md` §4.7 distinguishes
/// data mutation, config writes, and mode writes (mode writes are always
/// allowed so the system can't wedge itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    DataMutation,
    ConfigWrite,
    ModeWrite,
    /// Registration specifically, since `IMPORT` admits only explicit-id
    /// registrations (`spec.md` §4.7).
    Register { explicit_id: bool },
}

impl Operation {
    fn label(&self) -> &'static str {
        match self {
            Operation::DataMutation => "data_mutation",
            Operation::ConfigWrite => "config_write",
            Operation::ModeWrite => "mode_write",
            Operation::Register { explicit_id: true } => "register_explicit",
            Operation::Register { explicit_id: false } => "register",
        }
    }
}

/// Effective config resolved for a subject, along with which tier it came
/// from (useful for `?defaultToGlobal=true` callers that want the full
/// chain rather than just the answer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub compatibility_level: CompatibilityLevel,
    pub compatibility_group: Option<String>,
    pub alias: Option<String>,
}

/// Walks `subject -> context -> __GLOBAL -> server default`, returning the
/// first tier with a stored row, or the server default if none has one.
pub async fn resolve_config(
    store: &dyn Store,
    settings: &Settings,
    key: &SubjectKey,
) -> Result<EffectiveConfig, Error> {
    for scope in [
        ConfigScope::Subject(key.clone()),
        ConfigScope::Context(key.context.clone()),
        ConfigScope::Global,
    ] {
        if let Some(record) = store.get_config(&scope).await? {
            return Ok(EffectiveConfig {
                compatibility_level: record.compatibility_level,
                compatibility_group: record.compatibility_group,
                alias: record.alias,
            });
        }
    }
    Ok(EffectiveConfig {
        compatibility_level: settings.server_default_compatibility,
        compatibility_group: None,
        alias: None,
    })
}

/// As [`resolve_config`], but only the requested tier — used when the
/// caller did *not* pass `?defaultToGlobal=true`.
pub async fn get_config_at_scope(
    store: &dyn Store,
    scope: &ConfigScope,
) -> Result<Option<ConfigRecord>, Error> {
    store.get_config(scope).await
}

/// Walks the same chain for mode.
pub async fn resolve_mode(
    store: &dyn Store,
    settings: &Settings,
    key: &SubjectKey,
) -> Result<Mode, Error> {
    for scope in [
        ConfigScope::Subject(key.clone()),
        ConfigScope::Context(key.context.clone()),
        ConfigScope::Global,
    ] {
        if let Some(record) = store.get_mode(&scope).await? {
            return Ok(record.mode);
        }
    }
    Ok(settings.server_default_mode)
}

pub async fn get_mode_at_scope(
    store: &dyn Store,
    scope: &ConfigScope,
) -> Result<Option<ModeRecord>, Error> {
    store.get_mode(scope).await
}

/// The root `/config` and `/mode` endpoints (no path) apply only to the
/// default context, per `spec.md` §4.7 — named contexts and `__GLOBAL` have
/// their own explicit scope address.
pub fn root_scope() -> ConfigScope {
    ConfigScope::Context(DEFAULT_CONTEXT.to_string())
}

/// Applies the mutation gate before any mutating operation reaches
/// `SubjectManager`/`DekRegistry`. `spec.md` §4.7: mode changes are always
/// allowed; everything else is rejected under `READONLY`, and under
/// `READONLY_OVERRIDE` at the default context every per-subject `READWRITE`
/// is overridden. `IMPORT` admits only explicit-id registration.
pub async fn check_gate(
    store: &dyn Store,
    settings: &Settings,
    key: &SubjectKey,
    operation: Operation,
) -> Result<(), Error> {
    if operation == Operation::ModeWrite {
        return Ok(());
    }

    let effective_mode = resolve_mode(store, settings, key).await?;
    let readonly_override = matches!(
        store.get_mode(&ConfigScope::Context(DEFAULT_CONTEXT.to_string())).await?,
        Some(ModeRecord { mode: Mode::ReadOnlyOverride })
    );

    let mode = if readonly_override {
        Mode::ReadOnlyOverride
    } else {
        effective_mode
    };

    let result = match (mode, operation) {
        (Mode::ReadOnly, Operation::ConfigWrite) => {
            if settings.readonly_blocks_config_writes {
                Err(gate_error("configuration is read-only"))
            } else {
                Ok(())
            }
        }
        (Mode::ReadOnly, _) | (Mode::ReadOnlyOverride, _) => {
            Err(gate_error("registry is in read-only mode"))
        }
        (Mode::Import, Operation::Register { explicit_id: true }) => Ok(()),
        (Mode::Import, Operation::Register { explicit_id: false }) => Err(gate_error(
            "plain registration is not permitted while the subject is in IMPORT mode",
        )),
        (Mode::Import, Operation::DataMutation) => Ok(()),
        (Mode::Import, Operation::ConfigWrite) => Ok(()),
        (Mode::ReadWrite, Operation::Register { explicit_id: true }) => Err(gate_error(
            "explicit schema ids are only accepted while the subject is in IMPORT mode",
        )),
        (Mode::ReadWrite, _) => Ok(()),
        (_, Operation::ModeWrite) => unreachable!("handled above"),
    };

    crate::telemetry::gate_decision(operation.label(), mode.as_str(), result.is_ok());
    result
}

fn gate_error(message: &str) -> Error {
    Error::OperationNotPermitted(message.to_string())
}

/// Whether `context` is the virtual global context — config/mode may target
/// it, but no schema or subject operation may.
pub fn is_global_context(context: &str) -> bool {
    context.eq_ignore_ascii_case(GLOBAL_CONTEXT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn key() -> SubjectKey {
        SubjectKey::new(".", "orders-value")
    }

    #[tokio::test]
    async fn defaults_to_server_default_when_nothing_stored() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        let config = resolve_config(&store, &settings, &key()).await.unwrap();
        assert_eq!(config.compatibility_level, CompatibilityLevel::Backward);
    }

    #[tokio::test]
    async fn subject_tier_wins_over_context_and_global() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        store
            .put_config(
                &ConfigScope::Global,
                ConfigRecord {
                    compatibility_level: CompatibilityLevel::Full,
                    compatibility_group: None,
                    alias: None,
                },
            )
            .await
            .unwrap();
        store
            .put_config(
                &ConfigScope::Subject(key()),
                ConfigRecord {
                    compatibility_level: CompatibilityLevel::Forward,
                    compatibility_group: None,
                    alias: None,
                },
            )
            .await
            .unwrap();
        let config = resolve_config(&store, &settings, &key()).await.unwrap();
        assert_eq!(config.compatibility_level, CompatibilityLevel::Forward);
    }

    #[tokio::test]
    async fn readonly_rejects_data_mutations() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        store
            .put_mode(
                &ConfigScope::Subject(key()),
                ModeRecord { mode: Mode::ReadOnly },
            )
            .await
            .unwrap();
        let err = check_gate(&store, &settings, &key(), Operation::DataMutation)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OperationNotPermitted(_)));
    }

    #[tokio::test]
    async fn readonly_override_beats_per_subject_readwrite() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        store
            .put_mode(
                &ConfigScope::Context(DEFAULT_CONTEXT.to_string()),
                ModeRecord {
                    mode: Mode::ReadOnlyOverride,
                },
            )
            .await
            .unwrap();
        store
            .put_mode(&ConfigScope::Subject(key()), ModeRecord { mode: Mode::ReadWrite })
            .await
            .unwrap();
        let err = check_gate(&store, &settings, &key(), Operation::DataMutation)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OperationNotPermitted(_)));
    }

    #[tokio::test]
    async fn import_mode_rejects_plain_registration() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        store
            .put_mode(&ConfigScope::Subject(key()), ModeRecord { mode: Mode::Import })
            .await
            .unwrap();
        let err = check_gate(
            &store,
            &settings,
            &key(),
            Operation::Register { explicit_id: false },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::OperationNotPermitted(_)));
    }

    #[tokio::test]
    async fn mode_writes_are_always_allowed_under_readonly() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        store
            .put_mode(&ConfigScope::Subject(key()), ModeRecord { mode: Mode::ReadOnly })
            .await
            .unwrap();
        check_gate(&store, &settings, &key(), Operation::ModeWrite)
            .await
            .unwrap();
    }
}
