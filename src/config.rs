use std::{env, path::PathBuf};

/// Environment variable overriding the schema cache directory, an empty value
/// keeps the cache in memory only.
pub const SCHEMA_CACHE_DIR_ENV: &str = "ROWBIND_SCHEMA_CACHE_DIR";

/// Where the [`SchemaCache`](crate::SchemaCache) persists table metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaCacheConfig {
    /// Directory of the cache files, `None` keeps the metadata in memory only.
    pub directory: Option<PathBuf>,
}

impl Default for SchemaCacheConfig {
    fn default() -> Self {
        Self {
            directory: Some(env::temp_dir().join("rowbind-schema-cache")),
        }
    }
}

impl SchemaCacheConfig {
    pub fn in_memory() -> Self {
        Self { directory: None }
    }

    pub fn with_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: Some(directory.into()),
        }
    }

    /// Default configuration, overridden by `ROWBIND_SCHEMA_CACHE_DIR` when set.
    pub fn from_env() -> Self {
        match env::var_os(SCHEMA_CACHE_DIR_ENV) {
            Some(v) if v.is_empty() => Self::in_memory(),
            Some(v) => Self::with_directory(v),
            None => Self::default(),
        }
    }
}
