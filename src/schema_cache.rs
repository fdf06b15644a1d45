use crate::{Connection, Context, RecordError, Result, SchemaCacheConfig, TableSchema};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::fs;

/// Format version of the cache files, files with another version are ignored.
pub const SCHEMA_CACHE_VERSION: u32 = 1;

/// (database id, table name)
type Key = (String, String);

#[derive(Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    database: String,
    schema: TableSchema,
}

/// Process wide store of table metadata, keyed by database identity and table name.
///
/// A schema is asked to the database the first time its table is resolved,
/// then served from memory (and from the cache directory across restarts)
/// until it is explicitly invalidated. Concurrent first resolutions of the same
/// table wait for a single population.
#[derive(Debug)]
pub struct SchemaCache {
    config: SchemaCacheConfig,
    entries: RwLock<HashMap<Key, Arc<TableSchema>>>,
    loading: Mutex<HashMap<Key, Arc<tokio::sync::Mutex<()>>>>,
    writes: AtomicU64,
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new(SchemaCacheConfig::default())
    }
}

impl SchemaCache {
    pub fn new(config: SchemaCacheConfig) -> Self {
        Self {
            config,
            entries: Default::default(),
            loading: Default::default(),
            writes: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SchemaCacheConfig {
        &self.config
    }

    /// Schema already in memory, never touches the database nor the disk.
    pub fn get(&self, database: &str, table: &str) -> Option<Arc<TableSchema>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(database.to_string(), table.to_string()))
            .cloned()
    }

    /// Schema of `table` in the database of `connection`.
    ///
    /// Fails with [`RecordError::SchemaLoad`] when the table does not exist or
    /// its metadata cannot be read.
    pub async fn resolve<C: Connection>(
        &self,
        connection: &mut C,
        table: &str,
    ) -> Result<Arc<TableSchema>> {
        let key: Key = (connection.database_id().to_string(), table.to_string());
        if let Some(schema) = self.get(&key.0, &key.1) {
            log::trace!("Schema of `{}` served from memory", table);
            return Ok(schema);
        }
        let lock = self.loading_lock(&key);
        let result = {
            let _guard = lock.lock().await;
            match self.get(&key.0, &key.1) {
                // Populated by a concurrent caller while waiting
                Some(schema) => Ok(schema),
                None => self.populate(connection, &key).await,
            }
        };
        {
            let mut loading = self.loading.lock().unwrap_or_else(PoisonError::into_inner);
            if loading.get(&key).is_some_and(|v| Arc::ptr_eq(v, &lock)) {
                loading.remove(&key);
            }
        }
        result
    }

    async fn populate<C: Connection>(
        &self,
        connection: &mut C,
        key: &Key,
    ) -> Result<Arc<TableSchema>> {
        let table = key.1.as_str();
        let persisted = if connection.is_ephemeral() {
            None
        } else {
            self.read_file(key).await
        };
        let schema = match persisted {
            Some(schema) => {
                log::debug!("Schema of `{}` loaded from the cache directory", table);
                schema
            }
            None => {
                let schema = connection
                    .describe_table(table)
                    .await
                    .inspect_err(|e| log::error!("{:#}", e))
                    .with_context(|| RecordError::SchemaLoad {
                        table: table.to_string(),
                    })?;
                log::debug!("Schema of `{}` loaded from {}", table, key.0);
                if !connection.is_ephemeral() {
                    self.write_file(key, &schema).await;
                }
                schema
            }
        };
        let schema = Arc::new(schema);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), schema.clone());
        Ok(schema)
    }

    /// Whether a first resolution of `table` is running or waited for.
    pub fn is_loading(&self, database: &str, table: &str) -> bool {
        self.loading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&(database.to_string(), table.to_string()))
    }

    /// Forget the cached schema of `table` and load it again from the database.
    pub async fn refresh<C: Connection>(
        &self,
        connection: &mut C,
        table: &str,
    ) -> Result<Arc<TableSchema>> {
        self.invalidate(connection.database_id(), table).await;
        self.resolve(connection, table).await
    }

    /// Remove the schema of `table` from memory and from the cache directory.
    ///
    /// Records already holding the previous schema keep using it.
    pub async fn invalidate(&self, database: &str, table: &str) {
        let key: Key = (database.to_string(), table.to_string());
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        if let Some(path) = self.file_path(&key) {
            match fs::remove_file(&path).await {
                Ok(()) => log::debug!("Removed the cache file {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => log::warn!("Cannot remove the cache file {}: {}", path.display(), e),
            }
        }
    }

    /// Drop every schema, in memory and on disk.
    pub async fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        let Some(directory) = &self.config.directory else {
            return;
        };
        let mut entries = match fs::read_dir(directory).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => return,
            Err(e) => {
                log::warn!("Cannot list the cache directory {}: {}", directory.display(), e);
                return;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_some_and(|v| v == "json") {
                if let Err(e) = fs::remove_file(&path).await {
                    log::warn!("Cannot remove the cache file {}: {}", path.display(), e);
                }
            }
        }
    }

    fn loading_lock(&self, key: &Key) -> Arc<tokio::sync::Mutex<()>> {
        self.loading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone()
    }

    fn file_path(&self, key: &Key) -> Option<PathBuf> {
        self.config.directory.as_ref().map(|directory| {
            directory.join(format!(
                "{}-{}.json",
                hex::encode(&key.0),
                hex::encode(&key.1)
            ))
        })
    }

    async fn read_file(&self, key: &Key) -> Option<TableSchema> {
        let path = self.file_path(key)?;
        let content = match fs::read(&path).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("Cannot read the cache file {}: {}", path.display(), e);
                return None;
            }
        };
        let file = match serde_json::from_slice::<CacheFile>(&content) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Ignoring the cache file {}: {}", path.display(), e);
                return None;
            }
        };
        if file.version != SCHEMA_CACHE_VERSION {
            log::warn!(
                "Ignoring the cache file {}: version {} instead of {}",
                path.display(),
                file.version,
                SCHEMA_CACHE_VERSION
            );
            return None;
        }
        if file.database != key.0 || !file.schema.name().eq_ignore_ascii_case(&key.1) {
            log::warn!(
                "Ignoring the cache file {}: it describes `{}` of {}",
                path.display(),
                file.schema.name(),
                file.database
            );
            return None;
        }
        Some(file.schema)
    }

    /// Persist the schema, failures only lose the cache entry.
    async fn write_file(&self, key: &Key, schema: &TableSchema) {
        let Some(path) = self.file_path(key) else {
            return;
        };
        let file = CacheFile {
            version: SCHEMA_CACHE_VERSION,
            database: key.0.clone(),
            schema: schema.clone(),
        };
        match self.write_file_atomically(&path, &file).await {
            Ok(()) => log::trace!("Schema of `{}` written to {}", key.1, path.display()),
            Err(e) => log::warn!("Cannot write the cache file {}: {:#}", path.display(), e),
        }
    }

    async fn write_file_atomically(&self, path: &Path, file: &CacheFile) -> Result<()> {
        let content = serde_json::to_vec_pretty(file)?;
        if let Some(directory) = path.parent() {
            fs::create_dir_all(directory).await?;
        }
        let temporary = path.with_extension(format!(
            "{}-{}.tmp",
            std::process::id(),
            self.writes.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&temporary, content).await?;
        if let Err(e) = fs::rename(&temporary, path).await {
            let _ = fs::remove_file(&temporary).await;
            return Err(e.into());
        }
        Ok(())
    }
}
