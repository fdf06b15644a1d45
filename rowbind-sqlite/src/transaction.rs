use crate::{SqliteConnection, SqliteDriver, error_message_from_ptr};
use libsqlite3_sys::{SQLITE_OK, sqlite3_exec, sqlite3_free, sqlite3_get_autocommit};
use rowbind_core::{
    Driver, Executor, QueryResult, Result, SqlWriter, Transaction, stream::Stream,
};
use std::{future::Future, ptr};

/// Transaction on a [`SqliteConnection`], rolled back when dropped without commit.
pub struct SqliteTransaction<'c> {
    connection: &'c mut SqliteConnection,
    finished: bool,
}

impl<'c> SqliteTransaction<'c> {
    pub async fn new(connection: &'c mut SqliteConnection) -> Result<Self> {
        let mut sql = String::new();
        connection
            .driver()
            .sql_writer()
            .write_transaction_begin(&mut sql);
        connection.execute(sql).await?;
        Ok(Self {
            connection,
            finished: false,
        })
    }

    async fn finish(mut self, commit: bool) -> Result<()> {
        let mut sql = String::new();
        let writer = self.connection.driver().sql_writer();
        if commit {
            writer.write_transaction_commit(&mut sql);
        } else {
            writer.write_transaction_rollback(&mut sql);
        }
        self.connection.execute(sql).await?;
        self.finished = true;
        Ok(())
    }
}

impl<'c> Executor for SqliteTransaction<'c> {
    type Driver = SqliteDriver;

    fn driver(&self) -> &SqliteDriver {
        self.connection.driver()
    }

    fn database_id(&self) -> &str {
        self.connection.database_id()
    }

    fn run<'s>(&'s mut self, sql: String) -> impl Stream<Item = Result<QueryResult>> + Send + 's {
        self.connection.run(sql)
    }
}

impl<'c> Transaction<'c> for SqliteTransaction<'c> {
    fn commit(self) -> impl Future<Output = Result<()>> + Send {
        self.finish(true)
    }

    fn rollback(self) -> impl Future<Output = Result<()>> + Send {
        self.finish(false)
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        unsafe {
            let connection = *self.connection.connection;
            if sqlite3_get_autocommit(connection) != 0 {
                // The transaction was already ended by the statements it ran
                return;
            }
            log::warn!(
                "Transaction on {} dropped without commit, rolling back",
                self.connection.database_id()
            );
            let mut error = ptr::null_mut();
            let rc = sqlite3_exec(
                connection,
                c"ROLLBACK;".as_ptr(),
                None,
                ptr::null_mut(),
                &mut error,
            );
            if rc != SQLITE_OK {
                log::error!(
                    "Could not roll back the transaction: {}",
                    error_message_from_ptr(error)
                );
            }
            if !error.is_null() {
                sqlite3_free(error as *mut _);
            }
        }
    }
}
