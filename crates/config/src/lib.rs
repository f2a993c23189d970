//! Configuration loading, env substitution, environment overrides and
//! validation.
//!
//! Config files: `bpi.toml`, `bpi.yaml`, `bpi.yml` or `bpi.json`,
//! searched in `./` then the user config directory (`~/.config/bpi/`).
//!
//! `${ENV_VAR}` placeholders are substituted in the raw file text. The
//! deployment variables (`PORT`, `CAI_HOST`, `QA_ACTIVE`, ...) are applied on
//! top of the parsed file.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{
        BpiConfig, MetricsConfig, NluConfig, QaConfig, QaUrlFilterConfig, ReconcileConfig,
        ServerConfig, SessionConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
