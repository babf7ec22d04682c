mod hub;

pub use hub::HubConfig;

use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::info;

/// Prefix of the environment variables overriding file settings.
pub const ENV_PREFIX: &str = "HEARTH";
const DEFAULT_CONFIG_PATH: &str = "hearth";

/// Custom error type for config loading.
#[hearth_derive::hearth_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// Loads a configuration that must exist on disk, with environment overrides.
///
/// Layering:
/// 1. **Base File**: `path` (extension optional, e.g. `hearth` finds `hearth.toml`).
///    Defaults to `"hearth"` in the current working directory.
/// 2. **Environment Overrides**: variables prefixed with `HEARTH__`; nested keys use
///    double underscores (`HEARTH__BUS__STARTUP_TIMEOUT_MS=0` maps to `bus.startup_timeout_ms`).
///
/// # Errors
/// Returns [`ConfigError::Config`] if the file is missing, unreadable, or does not
/// match the structure of `T`.
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    load(path, true)
}

/// Same as [`load_config`] but a missing file is not an error: `T` is then built
/// from its serde defaults plus environment overrides.
///
/// # Errors
/// Returns [`ConfigError::Config`] when an existing file or an override does not
/// match the structure of `T`.
pub fn load_config_or_defaults<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    load(path, false)
}

fn load<T>(path: Option<impl AsRef<Path>>, required: bool) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let effective_path =
        path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), |p| p.as_ref().to_path_buf());

    let builder = Config::builder()
        .add_source(File::from(effective_path.as_path()).required(required))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

    info!(path = %effective_path.display(), required, "Loading config");

    let config = builder
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")?;

    Ok(config)
}
