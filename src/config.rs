//! Configuration for doc-suggest
//!
//! Values come from a TOML file, then environment variables, then
//! command-line flags (applied by the binary).

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::edit::BatchPolicy;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::template::{TemplateConfig, TemplateRegistry};

pub const CONFIG_ENV: &str = "DOC_SUGGEST_CONFIG";
pub const API_URL_ENV: &str = "DOC_SUGGEST_API_URL";
pub const AUTH_URL_ENV: &str = "DOC_SUGGEST_AUTH_URL";
pub const API_KEY_ENV: &str = "DOC_SUGGEST_API_KEY";
pub const TOKEN_ENV: &str = "DOC_SUGGEST_TOKEN";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the document store API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Base URL of the identity provider's auth API
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// Public API key sent to the identity provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Access token of the current session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Batch policy for `apply`
    #[serde(default)]
    pub policy: BatchPolicy,

    /// Project templates, keyed by id
    #[serde(default)]
    pub templates: BTreeMap<String, TemplateConfig>,
}

fn default_api_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_auth_url() -> String {
    "http://localhost:54321/auth/v1".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            auth_url: default_auth_url(),
            api_key: None,
            access_token: None,
            policy: BatchPolicy::default(),
            templates: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Default config file path (~/.doc-suggest/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".doc-suggest").join("config.toml"))
    }

    /// Load the config file, apply environment overrides
    ///
    /// The file is `explicit`, else `$DOC_SUGGEST_CONFIG`, else the
    /// default path. A missing file yields the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(Self::default_path);

        let mut config = match path {
            Some(path) if path.exists() => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::from_toml(&fs::read_to_string(&path)?)?
            }
            _ => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Override fields from a variable lookup (the environment, in practice)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_URL_ENV) {
            self.api_url = url;
        }
        if let Some(url) = lookup(AUTH_URL_ENV) {
            self.auth_url = url;
        }
        if let Some(key) = lookup(API_KEY_ENV) {
            self.api_key = Some(key);
        }
        if let Some(token) = lookup(TOKEN_ENV) {
            self.access_token = Some(token);
        }
    }

    /// Session for authenticated store calls
    pub fn session(&self) -> Result<Session> {
        self.access_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .map(Session::from_token)
            .ok_or(Error::MissingSession)
    }

    pub fn template_registry(&self) -> TemplateRegistry {
        TemplateRegistry::new(self.templates.clone())
    }
}
