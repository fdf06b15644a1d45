use crate::{Credentials, Executor, Result, TableSchema, Transaction};
use std::future::Future;

/// A live handle to a database, produced from a URL or from [`Credentials`].
pub trait Connection: Executor {
    /// Open a connection to the given URL (`<driver>://...`).
    fn connect(url: &str) -> impl Future<Output = Result<Self>> + Send;

    fn connect_with(credentials: &Credentials) -> impl Future<Output = Result<Self>> + Send {
        let url = credentials.to_url();
        async move { Self::connect(&url).await }
    }

    /// The database disappears together with the connection (in-memory databases),
    /// its metadata is never persisted.
    fn is_ephemeral(&self) -> bool {
        false
    }

    /// Read the structural metadata of `table` from the database catalog.
    ///
    /// Must fail when the table does not exist.
    fn describe_table(&mut self, table: &str) -> impl Future<Output = Result<TableSchema>> + Send;

    /// Start a transaction, it rolls back unless committed.
    fn begin(&mut self) -> impl Future<Output = Result<impl Transaction<'_>>> + Send;
}
