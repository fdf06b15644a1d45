use crate::{
    AsValue, CompiledQuery, Context, Error, Executor, Materialize, Record, RecordError,
    RecordIterator, Result, TableSchema,
    stream::{StreamExt, TryStreamExt},
};
use std::sync::Arc;

/// Outcome of a query, shaped by the mode it was compiled for.
#[derive(Debug)]
pub enum Materialized<'e> {
    Single(Option<Record>),
    Multiple(Vec<Record>),
    Iterator(RecordIterator<'e>),
    Count(u64),
}

/// Run `query` and build the result its mode asks for.
///
/// Storage failures carry [`RecordError::QueryExecution`].
pub async fn execute<'e, E: Executor + 'e>(
    executor: &'e mut E,
    schema: Arc<TableSchema>,
    query: CompiledQuery,
) -> Result<Materialized<'e>> {
    Ok(match query.mode {
        Materialize::Single => {
            Materialized::Single(materialize_single(executor, &schema, query.sql).await?)
        }
        Materialize::Multiple => {
            Materialized::Multiple(materialize_multiple(executor, &schema, query.sql).await?)
        }
        Materialize::Iterator => {
            Materialized::Iterator(materialize_iterator(executor, schema, query.sql))
        }
        Materialize::Count => {
            Materialized::Count(materialize_count(executor, &schema, query.sql).await?)
        }
    })
}

/// The only record produced by `sql`, `None` when there are zero or several.
///
/// Reads at most two rows.
pub async fn materialize_single<E: Executor>(
    executor: &mut E,
    schema: &Arc<TableSchema>,
    sql: String,
) -> Result<Option<Record>> {
    let context = || RecordError::QueryExecution {
        table: schema.name().to_string(),
    };
    let database = executor.database_id().to_string();
    let mut rows = executor
        .fetch(sql)
        .take(2)
        .try_collect::<Vec<_>>()
        .await
        .with_context(context)?;
    if rows.len() > 1 {
        log::debug!(
            "More than one row of `{}` matches, no record returned",
            schema.name()
        );
        return Ok(None);
    }
    rows.pop()
        .map(|row| Record::from_row(database, schema.clone(), row).with_context(context))
        .transpose()
}

/// Every record produced by `sql`, in the order storage returns them.
pub async fn materialize_multiple<E: Executor>(
    executor: &mut E,
    schema: &Arc<TableSchema>,
    sql: String,
) -> Result<Vec<Record>> {
    let context = || RecordError::QueryExecution {
        table: schema.name().to_string(),
    };
    let database = executor.database_id().to_string();
    executor
        .fetch(sql)
        .map(|row| row.and_then(|row| Record::from_row(database.as_str(), schema.clone(), row)))
        .try_collect::<Vec<_>>()
        .await
        .with_context(context)
}

/// Records produced lazily, the executor stays borrowed until the iterator is gone.
pub fn materialize_iterator<'e, E: Executor + 'e>(
    executor: &'e mut E,
    schema: Arc<TableSchema>,
    sql: String,
) -> RecordIterator<'e> {
    let database = executor.database_id().to_string();
    RecordIterator::new(executor.fetch(sql), database, schema)
}

/// First column of the first row of a count query.
pub async fn materialize_count<E: Executor>(
    executor: &mut E,
    schema: &Arc<TableSchema>,
    sql: String,
) -> Result<u64> {
    let context = || RecordError::QueryExecution {
        table: schema.name().to_string(),
    };
    let row = executor
        .fetch(sql)
        .take(1)
        .try_collect::<Vec<_>>()
        .await
        .with_context(context)?
        .pop()
        .ok_or_else(|| Error::msg("The count query returned no row").context(context()))?;
    let value = row
        .values
        .into_vec()
        .into_iter()
        .next()
        .unwrap_or_default();
    u64::try_from_value(value).with_context(context)
}
