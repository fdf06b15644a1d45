use crate::{
    Context, Record, RecordError, Result, RowLabeled, TableSchema,
    stream::{Stream, StreamExt},
};
use std::{fmt, pin::Pin, sync::Arc};

type RowStream<'e> = Pin<Box<dyn Stream<Item = Result<RowLabeled>> + Send + 'e>>;

/// Forward only cursor producing records one at a time from an open result.
///
/// The rows are read on demand, the stream is released on exhaustion, on
/// [`RecordIterator::close`] or when the iterator is dropped.
pub struct RecordIterator<'e> {
    stream: Option<RowStream<'e>>,
    database: String,
    schema: Arc<TableSchema>,
    peeked: Option<Record>,
}

impl<'e> RecordIterator<'e> {
    pub fn new(
        stream: impl Stream<Item = Result<RowLabeled>> + Send + 'e,
        database: impl Into<String>,
        schema: Arc<TableSchema>,
    ) -> Self {
        Self {
            stream: Some(Box::pin(stream)),
            database: database.into(),
            schema,
            peeked: None,
        }
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    /// Whether another record is available, reads one row ahead when needed.
    pub async fn has_next(&mut self) -> Result<bool> {
        if self.peeked.is_none() {
            self.peeked = self.advance().await?;
        }
        Ok(self.peeked.is_some())
    }

    /// Next record, `None` once the result is exhausted (and on every later call).
    pub async fn next(&mut self) -> Result<Option<Record>> {
        if let Some(record) = self.peeked.take() {
            return Ok(Some(record));
        }
        self.advance().await
    }

    /// Release the result before reaching its end.
    pub fn close(&mut self) {
        self.stream = None;
        self.peeked = None;
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none() && self.peeked.is_none()
    }

    async fn advance(&mut self) -> Result<Option<Record>> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        let item = stream.next().await;
        match item {
            Some(Ok(row)) => {
                Record::from_row(self.database.clone(), self.schema.clone(), row)
                    .map(Some)
                    .with_context(|| RecordError::QueryExecution {
                        table: self.schema.name().to_string(),
                    })
            }
            Some(Err(e)) => {
                self.stream = None;
                Err(e.context(RecordError::QueryExecution {
                    table: self.schema.name().to_string(),
                }))
            }
            None => {
                log::trace!("Iteration over `{}` completed", self.schema.name());
                self.stream = None;
                Ok(None)
            }
        }
    }
}

impl fmt::Debug for RecordIterator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordIterator")
            .field("table", &self.schema.name())
            .field("open", &self.stream.is_some())
            .field("peeked", &self.peeked)
            .finish()
    }
}

impl Drop for RecordIterator<'_> {
    fn drop(&mut self) {
        if self.stream.is_some() {
            log::debug!(
                "Iterator over `{}` dropped before its end, releasing the result",
                self.schema.name()
            );
        }
    }
}
