//! Cloud environment configuration.
//!
//! Precedence: explicit values > environment variables > config file > defaults.
//! Config files are TOML:
//!
//! ```toml
//! trace_user = true
//!
//! [env]
//! database = "prod-db"
//! functions = "prod-fn"
//! storage = "prod-st"
//! ```
//!
//! or `env = "prod"` to use one env for every service.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::CloudError;

pub const CONFIG_FILE_NAME: &str = "cloudlite.toml";

/// The three services an env can be chosen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Database,
    Functions,
    Storage,
}

/// Per-call config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudConfig {
    pub env: Option<String>,
    pub trace_user: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvConfig {
    Single(String),
    PerService {
        database: Option<String>,
        functions: Option<String>,
        storage: Option<String>,
    },
}

impl EnvConfig {
    pub fn for_service(&self, service: Service) -> Option<&str> {
        match self {
            EnvConfig::Single(env) => Some(env),
            EnvConfig::PerService { database, functions, storage } => match service {
                Service::Database => database.as_deref(),
                Service::Functions => functions.as_deref(),
                Service::Storage => storage.as_deref(),
            },
        }
    }
}

/// Config passed to `Cloud::init`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitCloudConfig {
    pub env: Option<EnvConfig>,
    pub trace_user: Option<bool>,
}

impl InitCloudConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, CloudError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, CloudError> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| CloudError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&s)
    }

    /// Candidate config file locations, highest priority first.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(p) = std::env::var("CLOUDLITE_CONFIG") {
            paths.push(PathBuf::from(p));
        }
        if let Some(dir) = dirs_next::config_dir() {
            paths.push(dir.join(CONFIG_FILE_NAME));
        }
        if let Ok(cur) = std::env::current_dir() {
            paths.push(cur.join(CONFIG_FILE_NAME));
        }
        paths
    }

    /// Load the first existing config file, or defaults if none exists.
    /// Environment overrides are applied either way.
    pub fn discover() -> Result<Self, CloudError> {
        let mut cfg = match Self::search_paths().into_iter().find(|p| p.exists()) {
            Some(p) => {
                log::debug!("loading cloud config from {}", p.display());
                Self::load(&p)?
            }
            None => Self::default(),
        };
        cfg.apply_env();
        Ok(cfg)
    }

    /// Override with `CLOUDLITE_ENV` and `CLOUDLITE_TRACE_USER` when set.
    pub fn apply_env(&mut self) {
        if let Ok(env) = std::env::var("CLOUDLITE_ENV")
            && !env.is_empty()
        {
            self.env = Some(EnvConfig::Single(env));
        }
        if let Ok(s) = std::env::var("CLOUDLITE_TRACE_USER") {
            self.trace_user = Some(matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));
        }
    }

    /// Resolve the env for `service`: the per-call env wins over the init env.
    pub fn resolve_env(&self, service: Service, call: Option<&CloudConfig>) -> Option<String> {
        call.and_then(|c| c.env.clone())
            .or_else(|| self.env.as_ref().and_then(|e| e.for_service(service)).map(str::to_string))
    }

    pub fn resolve_trace_user(&self, call: Option<&CloudConfig>) -> bool {
        call.and_then(|c| c.trace_user).or(self.trace_user).unwrap_or(false)
    }

    /// Flatten into the per-call config used by one service.
    pub fn for_service(&self, service: Service) -> CloudConfig {
        CloudConfig { env: self.resolve_env(service, None), trace_user: self.trace_user }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_env_applies_to_every_service() {
        let cfg = InitCloudConfig::from_toml_str("env = \"prod\"\ntrace_user = true").unwrap();
        assert_eq!(cfg.resolve_env(Service::Storage, None).as_deref(), Some("prod"));
        assert!(cfg.resolve_trace_user(None));
    }

    #[test]
    fn per_service_env() {
        let text = "[env]\ndatabase = \"db-1\"\nfunctions = \"fn-1\"";
        let cfg = InitCloudConfig::from_toml_str(text).unwrap();
        assert_eq!(cfg.resolve_env(Service::Database, None).as_deref(), Some("db-1"));
        assert_eq!(cfg.resolve_env(Service::Functions, None).as_deref(), Some("fn-1"));
        assert_eq!(cfg.resolve_env(Service::Storage, None), None);
    }

    #[test]
    fn call_config_wins() {
        let cfg = InitCloudConfig::from_toml_str("env = \"prod\"").unwrap();
        let call = CloudConfig { env: Some("staging".into()), trace_user: Some(true) };
        assert_eq!(cfg.resolve_env(Service::Database, Some(&call)).as_deref(), Some("staging"));
        assert!(cfg.resolve_trace_user(Some(&call)));
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(matches!(InitCloudConfig::from_toml_str("env = ["), Err(CloudError::Toml(_))));
    }
}
