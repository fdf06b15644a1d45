use crate::{record_error, silent_logs};
use rowbind::{
    ColumnType, Connection, Executor, QueryResult, RecordError, Result, SchemaCache,
    SchemaCacheConfig, TableBinding, TableSchema, Transaction, stream::Stream,
};
use std::{
    env, fs,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use uuid::Uuid;

fn cache_files(directory: &Path) -> Vec<std::path::PathBuf> {
    match fs::read_dir(directory) {
        Ok(entries) => entries
            .filter_map(|v| v.ok().map(|v| v.path()))
            .filter(|v| v.extension().is_some_and(|v| v == "json"))
            .collect(),
        Err(..) => Vec::new(),
    }
}

pub async fn schema_cache<C: Connection>(connection: &mut C) {
    // Setup
    connection
        .execute(
            r#"
            DROP TABLE IF EXISTS "cached_city";
            DROP TABLE IF EXISTS "keyless_city";
            CREATE TABLE "cached_city" ("id" INTEGER PRIMARY KEY, "name" TEXT NOT NULL);
            CREATE TABLE "keyless_city" ("name" TEXT, "population" INTEGER);
            "#
            .into(),
        )
        .await
        .expect("Failed to create the city tables");

    // Memory
    let cache = SchemaCache::new(SchemaCacheConfig::in_memory());
    let database = connection.database_id().to_string();
    assert!(cache.get(&database, "cached_city").is_none());
    let first = cache
        .resolve(connection, "cached_city")
        .await
        .expect("Failed to resolve cached_city");
    let second = cache
        .resolve(connection, "cached_city")
        .await
        .expect("Failed to resolve cached_city again");
    assert!(Arc::ptr_eq(&first, &second));
    assert!(
        cache
            .get(&database, "cached_city")
            .is_some_and(|v| Arc::ptr_eq(&v, &first))
    );
    assert!(cache.get("some://other/database", "cached_city").is_none());

    // Failures
    silent_logs! {
        let error = cache
            .resolve(connection, "missing_city")
            .await
            .expect_err("The table does not exist");
        assert!(matches!(
            record_error(&error),
            Some(RecordError::SchemaLoad { table }) if table == "missing_city"
        ));
        let error = TableBinding::bind(connection, &cache, "keyless_city")
            .await
            .expect_err("The table has no primary key");
        assert!(matches!(
            record_error(&error),
            Some(RecordError::SchemaLoad { table }) if table == "keyless_city"
        ));
    }
    assert!(cache.get(&database, "missing_city").is_none());
    assert!(!cache.is_loading(&database, "missing_city"));
    assert!(!cache.is_loading(&database, "keyless_city"));
    assert!(!cache.is_loading(&database, "cached_city"));

    // Persistence
    let directory = env::temp_dir().join(format!("rowbind-tests-{}", Uuid::new_v4()));
    let cache = SchemaCache::new(SchemaCacheConfig::with_directory(&directory));
    let stored = cache
        .resolve(connection, "cached_city")
        .await
        .expect("Failed to resolve cached_city");
    let files = cache_files(&directory);
    assert_eq!(files.len(), 1, "One file per resolved table");
    let file = files[0].clone();
    connection
        .execute(r#"ALTER TABLE "cached_city" ADD COLUMN "country" VARCHAR(2);"#.into())
        .await
        .expect("Failed to alter cached_city");
    let restarted = SchemaCache::new(SchemaCacheConfig::with_directory(&directory));
    let loaded = restarted
        .resolve(connection, "cached_city")
        .await
        .expect("Failed to resolve cached_city from disk");
    assert_eq!(*loaded, *stored, "The schema comes from the cache file");
    assert!(loaded.column("country").is_none());
    let refreshed = restarted
        .refresh(connection, "cached_city")
        .await
        .expect("Failed to refresh cached_city");
    assert_eq!(
        refreshed
            .column("country")
            .expect("The refreshed schema has the new column")
            .column_type,
        ColumnType::Varchar(Some(2))
    );
    assert_eq!(loaded.columns().len(), 2, "Holders of the old schema keep it");

    // Incompatible file
    let content = fs::read_to_string(&file).expect("Failed to read the cache file");
    assert!(content.contains(r#""version": 1"#));
    assert!(content.contains("country"));
    fs::write(
        &file,
        content
            .replace(r#""version": 1"#, r#""version": 999"#)
            .replace("country", "region"),
    )
    .expect("Failed to write the cache file");
    let upgraded = SchemaCache::new(SchemaCacheConfig::with_directory(&directory));
    silent_logs! {
        let schema = upgraded
            .resolve(connection, "cached_city")
            .await
            .expect("Failed to resolve cached_city");
        assert!(schema.column("country").is_some());
        assert!(schema.column("region").is_none());
    }
    let content = fs::read_to_string(&file).expect("Failed to read the cache file");
    assert!(content.contains(r#""version": 1"#), "The file was rewritten");

    // Corrupted file
    fs::write(&file, "{ not json").expect("Failed to write the cache file");
    let corrupted = SchemaCache::new(SchemaCacheConfig::with_directory(&directory));
    silent_logs! {
        corrupted
            .resolve(connection, "cached_city")
            .await
            .expect("A corrupted file is ignored");
    }

    // Invalidation
    upgraded.invalidate(&database, "cached_city").await;
    assert!(upgraded.get(&database, "cached_city").is_none());
    assert!(!file.exists());
    upgraded
        .resolve(connection, "cached_city")
        .await
        .expect("Failed to resolve cached_city");
    assert!(file.exists());
    upgraded.clear().await;
    assert!(upgraded.get(&database, "cached_city").is_none());
    assert!(cache_files(&directory).is_empty());
    let _ = fs::remove_dir_all(&directory);

    // Memory only
    let cache = SchemaCache::new(SchemaCacheConfig::in_memory());
    assert!(cache.config().directory.is_none());
    cache
        .resolve(connection, "cached_city")
        .await
        .expect("Failed to resolve cached_city");
    cache.clear().await;
    assert!(cache.get(&database, "cached_city").is_none());
}

/// Connection whose catalog reads are slow and counted.
struct SlowCatalog<C> {
    inner: C,
    describes: Arc<AtomicUsize>,
}

impl<C: Connection> Executor for SlowCatalog<C> {
    type Driver = C::Driver;

    fn driver(&self) -> &Self::Driver {
        self.inner.driver()
    }

    fn database_id(&self) -> &str {
        self.inner.database_id()
    }

    fn run<'s>(&'s mut self, sql: String) -> impl Stream<Item = Result<QueryResult>> + Send + 's {
        self.inner.run(sql)
    }
}

impl<C: Connection> Connection for SlowCatalog<C> {
    async fn connect(url: &str) -> Result<Self> {
        Ok(Self {
            inner: C::connect(url).await?,
            describes: Default::default(),
        })
    }

    fn is_ephemeral(&self) -> bool {
        self.inner.is_ephemeral()
    }

    fn describe_table(&mut self, table: &str) -> impl Future<Output = Result<TableSchema>> + Send {
        self.describes.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.inner.describe_table(table).await
        }
    }

    fn begin(&mut self) -> impl Future<Output = Result<impl Transaction<'_>>> + Send {
        self.inner.begin()
    }
}

pub async fn schema_cache_concurrency<C: Connection + 'static>(url: &str) {
    const TASKS: usize = 4;
    let describes = Arc::new(AtomicUsize::new(0));
    let mut connections = Vec::with_capacity(TASKS);
    for _ in 0..TASKS {
        let mut connection = SlowCatalog::<C>::connect(url)
            .await
            .expect("Could not open the connection");
        connection.describes = describes.clone();
        connections.push(connection);
    }
    assert!(
        connections
            .iter()
            .all(|v| v.database_id() == connections[0].database_id())
    );
    connections[0]
        .execute(
            r#"
            DROP TABLE IF EXISTS "contended_city";
            CREATE TABLE "contended_city" ("id" INTEGER PRIMARY KEY, "name" TEXT);
            "#
            .into(),
        )
        .await
        .expect("Failed to create contended_city");
    let directory = env::temp_dir().join(format!("rowbind-tests-{}", Uuid::new_v4()));
    let cache = Arc::new(SchemaCache::new(SchemaCacheConfig::with_directory(
        &directory,
    )));
    let tasks = connections
        .into_iter()
        .map(|mut connection| {
            let cache = cache.clone();
            tokio::spawn(async move {
                let schema = cache
                    .resolve(&mut connection, "contended_city")
                    .await
                    .expect("Failed to resolve contended_city");
                (schema, connection)
            })
        })
        .collect::<Vec<_>>();
    let mut schemas = Vec::with_capacity(TASKS);
    let mut connections = Vec::with_capacity(TASKS);
    for task in tasks {
        let (schema, connection) = task.await.expect("The resolving task panicked");
        schemas.push(schema);
        connections.push(connection);
    }
    assert_eq!(
        describes.load(Ordering::SeqCst),
        1,
        "The table is described once"
    );
    assert!(
        schemas.iter().all(|v| Arc::ptr_eq(v, &schemas[0])),
        "A single schema instance is shared"
    );
    assert_eq!(cache_files(&directory).len(), 1);
    let database = connections[0].database_id().to_string();
    assert!(!cache.is_loading(&database, "contended_city"));
    let binding = TableBinding::bind(&mut connections[1], &cache, "contended_city")
        .await
        .expect("Failed to bind contended_city");
    assert!(Arc::ptr_eq(binding.schema(), &schemas[0]));
    assert_eq!(describes.load(Ordering::SeqCst), 1);

    // A restarted cache reads the file instead of the catalog
    let restarted = SchemaCache::new(SchemaCacheConfig::with_directory(&directory));
    restarted
        .resolve(&mut connections[2], "contended_city")
        .await
        .expect("Failed to resolve contended_city from disk");
    assert_eq!(describes.load(Ordering::SeqCst), 1);
    let _ = fs::remove_dir_all(&directory);
}
