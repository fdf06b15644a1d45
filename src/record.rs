use crate::{
    AsValue, Context, DefaultValue, Driver, Error, Executor, Filter, Materialize, RecordError,
    Result, RowLabeled, SqlWriter, TableSchema, Value, materialize_single,
};
use std::{collections::BTreeMap, fmt::Write, sync::Arc};

/// Lifecycle stage of a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Never stored, it has no identity yet.
    New,
    /// Stored and without pending changes.
    Clean,
    /// Stored, with pending values or a pending delete.
    Dirty,
    /// Its delete was committed, only inspection and drop remain possible.
    Deleted,
}

/// One row of a table: the values last known in storage plus the changes not
/// committed yet.
///
/// Values are addressed by column name and checked against the shared
/// [`TableSchema`] of the table. Changes stay local until [`Record::commit`],
/// which only accepts executors targeting the database the record belongs to.
///
/// Dropping a record with uncommitted changes logs a warning.
#[derive(Debug)]
pub struct Record {
    database: String,
    schema: Arc<TableSchema>,
    stored: Box<[Value]>,
    pending: BTreeMap<usize, Value>,
    pending_delete: bool,
    persisted: bool,
    deleted: bool,
}

impl Record {
    /// Empty record of `database`, every column is `NULL` until set.
    pub fn new(database: impl Into<String>, schema: Arc<TableSchema>) -> Self {
        let stored = vec![Value::Null; schema.columns().len()].into_boxed_slice();
        Self {
            database: database.into(),
            schema,
            stored,
            pending: Default::default(),
            pending_delete: false,
            persisted: false,
            deleted: false,
        }
    }

    /// Stored record built from a fetched row, labels are matched by column name.
    pub fn from_row(
        database: impl Into<String>,
        schema: Arc<TableSchema>,
        row: RowLabeled,
    ) -> Result<Self> {
        let mut stored = vec![Value::Null; schema.columns().len()].into_boxed_slice();
        let RowLabeled { labels, values } = row;
        for (label, value) in labels.iter().zip(values.into_vec()) {
            let Some(i) = schema.position(label) else {
                log::trace!("Ignoring column `{}` not in table `{}`", label, schema.name());
                continue;
            };
            let column = &schema.columns()[i];
            // Keep what storage returned when it does not fit the declared type
            stored[i] = match column.column_type.coerce(value.clone()) {
                Ok(v) => v,
                Err(..) => value,
            };
        }
        if stored[schema.primary_key_index()].is_null() {
            return Err(Error::msg(format!(
                "The row has no value for the primary key `{}`",
                schema.primary_key().name
            )));
        }
        Ok(Self {
            database: database.into(),
            schema,
            stored,
            pending: Default::default(),
            pending_delete: false,
            persisted: true,
            deleted: false,
        })
    }

    /// Identity of the database the record is stored in (or will be).
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    pub fn column_names(&self) -> impl ExactSizeIterator<Item = &str> + Clone {
        self.schema.column_names()
    }

    pub fn state(&self) -> RecordState {
        if self.deleted {
            RecordState::Deleted
        } else if !self.persisted {
            RecordState::New
        } else if self.is_dirty() {
            RecordState::Dirty
        } else {
            RecordState::Clean
        }
    }

    /// Has pending values or a pending delete.
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty() || self.pending_delete
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Primary key value, `None` before the first commit.
    pub fn identity(&self) -> Option<&Value> {
        self.persisted
            .then(|| &self.stored[self.schema.primary_key_index()])
    }

    fn ensure_live(&self) -> Result<()> {
        if self.deleted {
            return Err(RecordError::Deleted {
                table: self.schema.name().to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn ensure_database<E: Executor>(&self, executor: &E) -> Result<()> {
        if executor.database_id() != self.database {
            return Err(RecordError::DatabaseMismatch {
                table: self.table(),
                bound: self.database.clone(),
                actual: executor.database_id().to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn table(&self) -> String {
        self.schema.name().to_string()
    }

    /// Set the pending value of `field`, coerced to the column type.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        self.ensure_live()?;
        let i = self.schema.require(field)?;
        let value = self.schema.columns()[i].coerce(self.schema.name(), value.into())?;
        self.pending.insert(i, value);
        Ok(())
    }

    /// Set several fields, nothing changes when any of them is rejected.
    pub fn set_many<K, V>(&mut self, values: impl IntoIterator<Item = (K, V)>) -> Result<()>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.ensure_live()?;
        let values = values
            .into_iter()
            .map(|(k, v)| {
                let i = self.schema.require(k.as_ref())?;
                let v = self.schema.columns()[i].coerce(self.schema.name(), v.into())?;
                Ok((i, v))
            })
            .collect::<Result<Vec<_>>>()?;
        self.pending.extend(values);
        Ok(())
    }

    /// Set the only data column of the table.
    ///
    /// Fails with [`RecordError::AmbiguousField`] when the table has more than one.
    pub fn set_value(&mut self, value: impl Into<Value>) -> Result<()> {
        self.ensure_live()?;
        let i = self.schema.natural_column()?;
        let value = self.schema.columns()[i].coerce(self.schema.name(), value.into())?;
        self.pending.insert(i, value);
        Ok(())
    }

    /// Pending value of `field` if any, otherwise the stored one.
    pub fn get(&self, field: &str) -> Result<&Value> {
        self.ensure_live()?;
        let i = self.schema.require(field)?;
        Ok(self.current(i))
    }

    /// Value of the only data column of the table.
    pub fn value(&self) -> Result<&Value> {
        self.ensure_live()?;
        let i = self.schema.natural_column()?;
        Ok(self.current(i))
    }

    /// Value of `field` converted into `T`.
    ///
    /// ```rust,ignore
    /// let lang: String = record.get_as("lang")?;
    /// let data: Option<String> = record.get_as("data")?;
    /// ```
    pub fn get_as<T: AsValue>(&self, field: &str) -> Result<T> {
        let value = self.get(field)?.clone();
        T::try_from_value(value).with_context(|| {
            format!("While reading `{}`.`{}`", self.schema.name(), field)
        })
    }

    fn current(&self, i: usize) -> &Value {
        self.pending.get(&i).unwrap_or(&self.stored[i])
    }

    /// Mark the record to be deleted on the next commit.
    pub fn delete(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.pending_delete = true;
        Ok(())
    }

    /// Forget pending values and the pending delete, storage is not touched.
    pub fn discard(&mut self) {
        self.pending.clear();
        self.pending_delete = false;
    }

    /// Write the pending changes, returns the identity of the record.
    ///
    /// On failure the error carries [`RecordError::Commit`] and the record is
    /// left exactly as it was.
    pub async fn commit<E: Executor>(&mut self, executor: &mut E) -> Result<Value> {
        self.ensure_live()?;
        self.ensure_database(executor)?;
        if self.pending_delete {
            return self.commit_delete(executor).await;
        }
        if !self.persisted {
            return self.commit_insert(executor).await;
        }
        self.commit_update(executor).await
    }

    async fn commit_delete<E: Executor>(&mut self, executor: &mut E) -> Result<Value> {
        let identity = self.stored[self.schema.primary_key_index()].clone();
        if self.persisted {
            let mut sql = String::new();
            executor
                .driver()
                .sql_writer()
                .write_delete(&mut sql, &self.schema, &identity);
            let affected = executor
                .execute(sql)
                .await
                .with_context(|| RecordError::Commit { table: self.table() })?;
            if affected.rows_affected == 0 {
                log::debug!(
                    "Row {} of `{}` was already gone",
                    identity,
                    self.schema.name()
                );
            }
        }
        self.pending.clear();
        self.pending_delete = false;
        self.deleted = true;
        Ok(identity)
    }

    async fn commit_insert<E: Executor>(&mut self, executor: &mut E) -> Result<Value> {
        let context = || RecordError::Commit { table: self.table() };
        let key = self.schema.primary_key_index();
        let mut snapshot = self
            .schema
            .columns()
            .iter()
            .map(|c| {
                c.default
                    .as_ref()
                    .and_then(DefaultValue::value)
                    .cloned()
                    .unwrap_or_default()
            })
            .collect::<Box<[Value]>>();
        for (i, v) in &self.pending {
            snapshot[*i] = v.clone();
        }
        // Explicit values and literal defaults, the database fills the rest
        let row = self
            .schema
            .columns()
            .iter()
            .enumerate()
            .filter(|(i, c)| {
                self.pending.contains_key(i)
                    || matches!(c.default, Some(DefaultValue::Value(ref v)) if !v.is_null())
            })
            .map(|(i, _)| (i, &snapshot[i]))
            .collect::<Vec<_>>();
        let primary_key = self.schema.primary_key();
        if snapshot[key].is_null() && !primary_key.auto_increment {
            return Err(Error::msg(format!(
                "The primary key `{}` has no value and is not generated by the database",
                primary_key.name
            ))
            .context(context()));
        }
        let mut sql = String::new();
        executor
            .driver()
            .sql_writer()
            .write_insert(&mut sql, &self.schema, &row);
        drop(row);
        let affected = executor
            .execute(sql)
            .await
            .with_context(context)?;
        if affected.rows_affected == 0 {
            return Err(Error::msg("The insert did not store any row").context(context()));
        }
        if snapshot[key].is_null() {
            let Some(id) = affected.last_affected_id else {
                return Err(
                    Error::msg("The database did not report the generated row id")
                        .context(context()),
                );
            };
            snapshot[key] = Value::Int64(id);
        }
        let identity = snapshot[key].clone();
        self.stored = match self.fetch_stored(executor, &identity).await {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                log::warn!(
                    "Row {} of `{}` not found after the insert, keeping the local values",
                    identity,
                    self.schema.name()
                );
                snapshot
            }
            Err(e) => {
                log::warn!(
                    "Could not reload row {} of `{}` after the insert, keeping the local values: {:#}",
                    identity,
                    self.schema.name(),
                    e
                );
                snapshot
            }
        };
        self.pending.clear();
        self.persisted = true;
        Ok(identity)
    }

    async fn commit_update<E: Executor>(&mut self, executor: &mut E) -> Result<Value> {
        let identity = self.stored[self.schema.primary_key_index()].clone();
        let mut sql = String::new();
        {
            let changes = self
                .pending
                .iter()
                .filter(|(i, v)| self.stored[**i] != **v)
                .map(|(i, v)| (*i, v))
                .collect::<Vec<_>>();
            if !changes.is_empty() {
                executor.driver().sql_writer().write_update(
                    &mut sql,
                    &self.schema,
                    &identity,
                    &changes,
                );
            }
        }
        if !sql.is_empty() {
            let affected = executor
                .execute(sql)
                .await
                .with_context(|| RecordError::Commit { table: self.table() })?;
            if affected.rows_affected == 0 {
                return Err(Error::msg(format!(
                    "No row with identity {} to update",
                    identity
                ))
                .context(RecordError::Commit { table: self.table() }));
            }
        }
        for (i, v) in std::mem::take(&mut self.pending) {
            self.stored[i] = v;
        }
        Ok(self.stored[self.schema.primary_key_index()].clone())
    }

    /// Read the stored values again from storage, pending changes are kept.
    pub async fn reload<E: Executor>(&mut self, executor: &mut E) -> Result<()> {
        self.ensure_live()?;
        self.ensure_database(executor)?;
        let context = || RecordError::QueryExecution { table: self.table() };
        let Some(identity) = self.identity().cloned() else {
            return Err(Error::msg("The record was never stored").context(context()));
        };
        match self.fetch_stored(executor, &identity).await? {
            Some(stored) => {
                self.stored = stored;
                Ok(())
            }
            None => Err(
                Error::msg(format!("No row with identity {}", identity)).context(context()),
            ),
        }
    }

    async fn fetch_stored<E: Executor>(
        &self,
        executor: &mut E,
        identity: &Value,
    ) -> Result<Option<Box<[Value]>>> {
        let filter = Filter::new().eq(self.schema.primary_key().name.clone(), identity.clone());
        let query = executor
            .driver()
            .sql_writer()
            .compile(&self.schema, &filter, Materialize::Single)?;
        let record = materialize_single(executor, &self.schema, query.sql).await?;
        Ok(record.map(|mut v| std::mem::take(&mut v.stored)))
    }
}

impl Drop for Record {
    fn drop(&mut self) {
        if self.deleted || !self.is_dirty() {
            return;
        }
        let mut message = String::new();
        if self.pending_delete {
            message.push_str("a pending delete");
        } else {
            let _ = write!(message, "pending values for ");
            crate::separated_by(
                &mut message,
                self.pending.keys(),
                |out, i| {
                    let _ = write!(out, "`{}`", self.schema.columns()[*i].name);
                },
                ", ",
            );
        }
        match self.identity() {
            Some(identity) => log::warn!(
                "Record {} of `{}` dropped with {}, the changes are lost",
                identity,
                self.schema.name(),
                message
            ),
            None => log::warn!(
                "New record of `{}` dropped with {}, the changes are lost",
                self.schema.name(),
                message
            ),
        }
    }
}
