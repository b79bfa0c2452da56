//! API root resolution.
//!
//! Three tiers, first match wins:
//! 1. `BIZDESK_API_BASE_URL`: full root, already carrying the API prefix.
//! 2. `BIZDESK_BACKEND_URL`: backend host; `/api` is appended.
//! 3. `/api`, left to the reverse proxy in front of the deployment.
//!
//! Trailing slashes are stripped and the result never ends with one.

use std::{collections::HashMap, path::Path, sync::OnceLock};

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use tracing::{info, warn};

/// Prefix shared by the environment variables this module reads.
pub const ENV_PREFIX: &str = "BIZDESK";

/// Relative root used when nothing is configured.
pub const DEFAULT_API_ROOT: &str = "/api";

/// Raw configuration inputs for the API root.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ClientSettings {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub backend_url: Option<String>,
}

impl ClientSettings {
    /// Read settings from `.env` in the working directory and the process
    /// environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(".env")
    }

    /// Read settings from the dotenv file at `path` and the process
    /// environment. Process variables override the file; a missing file is
    /// not an error.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut vars = HashMap::new();
        match dotenvy::from_path_iter(path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|e| ConfigError::Foreign(Box::new(e)))?;
                    vars.insert(key, value);
                }
                info!(path = %path.display(), "loaded .env");
            }
            Err(e) if e.not_found() => {}
            Err(e) => return Err(ConfigError::Foreign(Box::new(e))),
        }
        vars.extend(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        );
        Self::from_environment(Environment::with_prefix(ENV_PREFIX).source(Some(vars)))
    }

    /// Read settings from an explicit environment source.
    pub fn from_environment(env: Environment) -> Result<Self, ConfigError> {
        Config::builder().add_source(env).build()?.try_deserialize()
    }

    /// Resolve the API root from these settings.
    pub fn api_base(&self) -> String {
        resolve_api_base(self.api_base_url.as_deref(), self.backend_url.as_deref())
    }
}

/// Compute the API root from the two optional configuration values.
pub fn resolve_api_base(full: Option<&str>, host: Option<&str>) -> String {
    if let Some(full) = full.and_then(strip_slashes) {
        return full.to_string();
    }
    if let Some(host) = host.and_then(strip_slashes) {
        return format!("{host}{DEFAULT_API_ROOT}");
    }
    DEFAULT_API_ROOT.to_string()
}

/// Trim whitespace and trailing slashes; `None` if nothing is left.
fn strip_slashes(value: &str) -> Option<&str> {
    let stripped = value.trim().trim_end_matches('/');
    (!stripped.is_empty()).then_some(stripped)
}

/// The process-wide API root, resolved on first use and fixed afterwards.
pub struct ApiBase;

impl ApiBase {
    pub fn global() -> &'static str {
        static ROOT: OnceLock<String> = OnceLock::new();
        ROOT.get_or_init(|| {
            let settings = ClientSettings::load().unwrap_or_else(|e| {
                warn!(error = %e, "could not read API settings, using defaults");
                ClientSettings::default()
            });
            let root = settings.api_base();
            info!(root = %root, "resolved API root");
            root
        })
    }
}
