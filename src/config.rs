//! CMS connection settings.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::StrapiError;

pub const HOST_ENV_KEY: &str = "STRAPI_HOST";
pub const TOKEN_ENV_KEY: &str = "STRAPI_TOKEN";

/// Source of the `STRAPI_*` settings read by [`Credentials::from_env`].
pub trait EnvProvider {
    /// Value of `key`, or `None` when unset.
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads settings from the process environment.
pub struct ProcessEnvProvider;

impl EnvProvider for ProcessEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Fixed settings, for embedding hosts that don't use process variables.
#[derive(Debug, Clone, Default)]
pub struct MapEnvProvider {
    values: HashMap<String, String>,
}

impl MapEnvProvider {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Provider holding just a host and an optional token.
    pub fn for_host(host: &str, token: Option<&str>) -> Self {
        let mut values = HashMap::from([(HOST_ENV_KEY.to_string(), host.to_string())]);
        if let Some(token) = token {
            values.insert(TOKEN_ENV_KEY.to_string(), token.to_string());
        }
        Self::new(values)
    }
}

impl EnvProvider for MapEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Host and optional API token of a CMS instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credentials {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Credentials {
    /// Drops one trailing `/` from the host and treats a blank token as absent.
    pub fn new(host: impl Into<String>, token: Option<String>) -> Self {
        let mut host = host.into().trim().to_string();
        if host.ends_with('/') {
            host.pop();
        }
        let token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Self { host, token }
    }

    /// Reads `STRAPI_HOST` (required) and `STRAPI_TOKEN` (optional).
    pub fn from_env(env: &dyn EnvProvider) -> Result<Self, StrapiError> {
        let host = env
            .get(HOST_ENV_KEY)
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| {
                StrapiError::EnvError(format!(
                    "missing required environment variable '{HOST_ENV_KEY}'"
                ))
            })?;
        Ok(Self::new(host, env.get(TOKEN_ENV_KEY)))
    }
}
