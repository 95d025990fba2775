//! Configuration loading helper functions
//! Provides utilities for loading configuration with fallback logic

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use errors::{FemcError, FemcResult};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Get configuration value with priority: explicit > ENV > Default
///
/// # Arguments
/// * `explicit` - Value given on the command line or by the caller
/// * `env_var` - Environment variable name to check
/// * `default` - Default value to use as fallback
pub fn get_config_value<T>(explicit: Option<T>, env_var: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    // Priority 1: explicit value
    if let Some(val) = explicit {
        debug!("Using {} from arguments", env_var);
        return val;
    }

    // Priority 2: Environment variable
    if let Ok(env_str) = std::env::var(env_var) {
        match env_str.parse::<T>() {
            Ok(val) => {
                info!("Using {} from environment: {}", env_var, env_str);
                return val;
            },
            Err(e) => {
                warn!("Failed to parse {} from environment: {}", env_var, e);
            },
        }
    }

    // Priority 3: Default value
    debug!("Using default value for {}", env_var);
    default
}

/// Figment provider for a file, chosen by its extension
fn file_figment(path: &Path) -> FemcResult<Figment> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| FemcError::Configuration("Config file must have an extension".into()))?;

    match extension {
        "toml" => Ok(Figment::new().merge(Toml::file(path))),
        "yaml" | "yml" => Ok(Figment::new().merge(Yaml::file(path))),
        "json" => Ok(Figment::new().merge(Json::file(path))),
        _ => Err(FemcError::Configuration(format!(
            "Unsupported config file format: {}",
            extension
        ))),
    }
}

/// Load configuration from a specific file
pub fn load_config_from_file<T, P>(path: P) -> FemcResult<T>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Err(FemcError::MissingConfig(path.display().to_string()));
    }

    file_figment(path)?
        .extract()
        .map_err(|e| FemcError::ParseError {
            file: path.display().to_string(),
            error: e.to_string(),
        })
}

/// Load configuration from layered sources
///
/// Priority (highest to lowest):
/// 1. Environment variables with `env_prefix` (nested keys split on `__`)
/// 2. The config file, when given and present
/// 3. `T::default()`
pub fn load_layered<T>(path: Option<&Path>, env_prefix: &str) -> FemcResult<T>
where
    T: for<'de> Deserialize<'de> + Serialize + Default,
{
    let mut figment = Figment::from(Serialized::defaults(T::default()));

    if let Some(path) = path {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            figment = figment.merge(file_figment(path)?);
        } else {
            warn!("Config file {} not found, using defaults", path.display());
        }
    }

    figment
        .merge(Env::prefixed(env_prefix).split("__"))
        .extract()
        .map_err(|e| FemcError::Configuration(format!("Failed to load configuration: {}", e)))
}
