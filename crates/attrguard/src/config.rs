//! Field-name bindings for the filter.
//!
//! [`FilterConfig`] says which user and record fields hold the values the
//! filter compares. It can be built in code, parsed from TOML, or assembled by
//! [`ConfigLoader`] from several sources (lowest to highest precedence):
//!
//! 1. Built-in defaults (`id`, `id`, `access`)
//! 2. A TOML file
//! 3. Environment variables (`ATTRGUARD_*` by default)
//!
//! ```toml
//! user_id_attribute = "user_id"
//! object_id_attribute = "owner_id"
//! access_attribute = "role"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to parse TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Names of the fields the filter reads from users and records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Field on the user holding its identity. Compared against
    /// `object_id_attribute` to decide ownership.
    pub user_id_attribute: String,

    /// Field on the record holding the identity of its owner.
    pub object_id_attribute: String,

    /// Field on the user holding its access level.
    pub access_attribute: String,

    /// Deny ownership when either id is missing or `null`.
    ///
    /// Off by default: a user and a record that both lack an id are treated
    /// as the same principal, matching loose id equality.
    pub require_identity: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            user_id_attribute: "id".to_string(),
            object_id_attribute: "id".to_string(),
            access_attribute: "access".to_string(),
            require_identity: false,
        }
    }
}

impl FilterConfig {
    /// Sets the user identity field.
    pub fn with_user_id_attribute(mut self, name: impl Into<String>) -> Self {
        self.user_id_attribute = name.into();
        self
    }

    /// Sets the record owner field.
    pub fn with_object_id_attribute(mut self, name: impl Into<String>) -> Self {
        self.object_id_attribute = name.into();
        self
    }

    /// Sets the user access-level field.
    pub fn with_access_attribute(mut self, name: impl Into<String>) -> Self {
        self.access_attribute = name.into();
        self
    }

    /// Requires both ids to be present before granting ownership.
    pub fn with_require_identity(mut self, require: bool) -> Self {
        self.require_identity = require;
        self
    }

    /// Parses and validates a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: FilterConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects empty field names.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("user_id_attribute", &self.user_id_attribute),
            ("object_id_attribute", &self.object_id_attribute),
            ("access_attribute", &self.access_attribute),
        ];

        for (key, value) in fields {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{key} must not be empty")));
            }
        }

        Ok(())
    }
}

/// Loads a [`FilterConfig`] from defaults, an optional file and the environment.
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env_prefix: String,
    environment: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    /// Creates a loader reading only defaults and `ATTRGUARD_*` variables.
    pub fn new() -> Self {
        Self {
            file: None,
            env_prefix: "ATTRGUARD".to_string(),
            environment: None,
        }
    }

    /// Adds a TOML file. A missing file is skipped.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the environment variable prefix (default: "ATTRGUARD").
    ///
    /// Variables are matched as `<PREFIX>_<FIELD>`, e.g.
    /// `ATTRGUARD_ACCESS_ATTRIBUTE=role`.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Reads variables from the given map instead of the process environment.
    pub fn with_environment(mut self, vars: HashMap<String, String>) -> Self {
        self.environment = Some(vars);
        self
    }

    /// Merges all sources and validates the result.
    pub fn load(self) -> Result<FilterConfig> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&FilterConfig::default())?);

        if let Some(path) = &self.file {
            builder = builder.add_source(
                config::File::from(path.as_path())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Field names contain underscores, so nesting uses a double underscore.
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .source(self.environment),
        );

        let config: FilterConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        tracing::debug!(
            user_id_attribute = %config.user_id_attribute,
            object_id_attribute = %config.object_id_attribute,
            access_attribute = %config.access_attribute,
            require_identity = config.require_identity,
            "Filter configuration loaded"
        );

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
