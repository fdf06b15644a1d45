use crate::{
    CompiledQuery, Connection, Driver, Executor, Filter, Materialize, Materialized, Record,
    RecordError, RecordIterator, Result, SchemaCache, SqlWriter, TableSchema, Value, execute,
    materialize_count, materialize_iterator, materialize_multiple, materialize_single,
};
use std::sync::Arc;

/// Entry point to the records of one table of one database.
///
/// The schema is resolved once when binding, every lookup compiles its filter
/// against it. The binding can be used with any executor targeting the same
/// database (the connection it was bound with, another connection, a transaction).
///
/// ```rust,ignore
/// let cache = SchemaCache::default();
/// let greeting = TableBinding::bind(&mut connection, &cache, "greeting").await?;
/// let mut record = greeting.new_record();
/// record.set_many([("data", "hello"), ("lang", "en")])?;
/// let id = record.commit(&mut connection).await?;
/// let found = greeting.find_one(&mut connection, [("data", "hello")]).await?;
/// ```
#[derive(Debug, Clone)]
pub struct TableBinding {
    database: String,
    schema: Arc<TableSchema>,
}

impl TableBinding {
    /// Resolve the schema of `table` through `cache`.
    ///
    /// Fails with [`RecordError::SchemaLoad`] when the table does not exist.
    pub async fn bind<C: Connection>(
        connection: &mut C,
        cache: &SchemaCache,
        table: &str,
    ) -> Result<Self> {
        let schema = cache.resolve(connection, table).await?;
        Ok(Self {
            database: connection.database_id().to_string(),
            schema,
        })
    }

    /// Binding over an already known schema.
    pub fn with_schema(database: impl Into<String>, schema: Arc<TableSchema>) -> Self {
        Self {
            database: database.into(),
            schema,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn table(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    /// New empty record, stored on its first commit.
    pub fn new_record(&self) -> Record {
        Record::new(self.database.clone(), self.schema.clone())
    }

    fn compile<E: Executor>(
        &self,
        executor: &E,
        filter: &Filter,
        mode: Materialize,
    ) -> Result<CompiledQuery> {
        if executor.database_id() != self.database {
            return Err(RecordError::DatabaseMismatch {
                table: self.schema.name().to_string(),
                bound: self.database.clone(),
                actual: executor.database_id().to_string(),
            }
            .into());
        }
        let query = executor
            .driver()
            .sql_writer()
            .compile(&self.schema, filter, mode)?;
        log::trace!("{}", query);
        Ok(query)
    }

    /// The record matching `filter`, `None` when no row or more than one row matches.
    pub async fn find_one<E: Executor>(
        &self,
        executor: &mut E,
        filter: impl Into<Filter>,
    ) -> Result<Option<Record>> {
        let sql = self.compile(executor, &filter.into(), Materialize::Single)?.sql;
        materialize_single(executor, &self.schema, sql).await
    }

    /// The record whose primary key is `value`.
    pub async fn find_by_pk<E: Executor>(
        &self,
        executor: &mut E,
        value: impl Into<Value>,
    ) -> Result<Option<Record>> {
        let filter = Filter::new().eq(self.schema.primary_key().name.clone(), value);
        self.find_one(executor, filter).await
    }

    /// Every record matching `filter`.
    pub async fn find_all<E: Executor>(
        &self,
        executor: &mut E,
        filter: impl Into<Filter>,
    ) -> Result<Vec<Record>> {
        let sql = self.compile(executor, &filter.into(), Materialize::Multiple)?.sql;
        materialize_multiple(executor, &self.schema, sql).await
    }

    /// Records matching `filter`, read one at a time.
    pub fn find_iter<'e, E: Executor + 'e>(
        &self,
        executor: &'e mut E,
        filter: impl Into<Filter>,
    ) -> Result<RecordIterator<'e>> {
        let sql = self.compile(executor, &filter.into(), Materialize::Iterator)?.sql;
        Ok(materialize_iterator(executor, self.schema.clone(), sql))
    }

    /// Number of rows matching `filter`, no record is built.
    pub async fn count<E: Executor>(
        &self,
        executor: &mut E,
        filter: impl Into<Filter>,
    ) -> Result<u64> {
        let sql = self.compile(executor, &filter.into(), Materialize::Count)?.sql;
        materialize_count(executor, &self.schema, sql).await
    }

    /// Query in the given mode, the result has the matching [`Materialized`] variant.
    pub async fn query<'e, E: Executor + 'e>(
        &self,
        executor: &'e mut E,
        filter: impl Into<Filter>,
        mode: Materialize,
    ) -> Result<Materialized<'e>> {
        let query = self.compile(executor, &filter.into(), mode)?;
        execute(executor, self.schema.clone(), query).await
    }
}
