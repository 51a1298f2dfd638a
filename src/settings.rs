//! Ambient runtime configuration, in the style of the pack's
//! `ConfigManagerAdapter`: a plain `Default`-deriving struct plus one
//! environment-backed loader, no config-file format.

use std::env;

use crate::types::{CompatibilityLevel, Mode};

/// Runtime knobs that aren't part of the registry's persisted state —
/// lock striping and the two open questions `spec.md` §9 leaves to the
/// implementer.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Number of stripes in the per-`(context, subject)` lock table.
    pub lock_stripes: usize,
    /// `spec.md` §9: permanent-delete of `versions/latest` resolves the
    /// literal to the numeric version and proceeds when `true` (upstream
    /// Confluent behavior); rejects the literal outright when `false`.
    pub resolve_latest_on_permanent_delete: bool,
    /// `spec.md` §9: whether `READONLY` blocks config/mode writes at the
    /// same or lower scope in addition to data mutations.
    pub readonly_blocks_config_writes: bool,
    pub server_default_compatibility: CompatibilityLevel,
    pub server_default_mode: Mode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lock_stripes: 64,
            resolve_latest_on_permanent_delete: true,
            readonly_blocks_config_writes: true,
            server_default_compatibility: CompatibilityLevel::Backward,
            server_default_mode: Mode::ReadWrite,
        }
    }
}

impl Settings {
    /// Loads from `SCHEMA_REGISTRY_*` environment variables, falling back to
    /// [`Settings::default`] for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            lock_stripes: env_parsed("SCHEMA_REGISTRY_LOCK_STRIPES", defaults.lock_stripes),
            resolve_latest_on_permanent_delete: env_parsed(
                "SCHEMA_REGISTRY_RESOLVE_LATEST_ON_PERMANENT_DELETE",
                defaults.resolve_latest_on_permanent_delete,
            ),
            readonly_blocks_config_writes: env_parsed(
                "SCHEMA_REGISTRY_READONLY_BLOCKS_CONFIG_WRITES",
                defaults.readonly_blocks_config_writes,
            ),
            server_default_compatibility: defaults.server_default_compatibility,
            server_default_mode: defaults.server_default_mode,
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
