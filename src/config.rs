//! `erschema.toml` settings.
//!
//! ```toml
//! [naming]
//! column_template = "{table}_id"
//!
//! [ddl]
//! schema = "sales"
//! include_descriptions = false
//!
//! [migration]
//! allow_table_drop = true
//! database = "Shop"
//! ```

use crate::ddl::DdlOptions;
use crate::model::ForeignKeyNaming;
use crate::planner::MigrationOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "erschema.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Foreign-key column convention shared by validation, diffing and DDL.
    pub naming: ForeignKeyNaming,
    pub ddl: DdlOptions,
    pub migration: MigrationOptions,
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Look for `erschema.toml` in `start` and its ancestors. Defaults apply
    /// when none is found.
    pub fn discover(start: &Path) -> Result<Self, ConfigError> {
        let mut dir = Some(start);
        while let Some(current) = dir {
            let candidate = current.join(CONFIG_FILE);
            if candidate.is_file() {
                return Self::load(candidate);
            }
            dir = current.parent();
        }
        Ok(Self::default())
    }

    /// DDL options with the shared naming convention applied.
    pub fn ddl_options(&self) -> DdlOptions {
        DdlOptions {
            naming: self.naming.clone(),
            ..self.ddl.clone()
        }
    }
}
