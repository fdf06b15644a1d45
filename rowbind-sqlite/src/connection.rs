use crate::{
    CBox, SqliteDriver, SqliteTransaction, describe::describe_table, error_message_from_ptr,
    extract::{extract_name, extract_row},
};
use async_stream::try_stream;
use libsqlite3_sys::{
    SQLITE_DONE, SQLITE_OK, SQLITE_OPEN_CREATE, SQLITE_OPEN_READWRITE, SQLITE_OPEN_URI,
    SQLITE_ROW, sqlite3, sqlite3_busy_timeout, sqlite3_column_count,
    sqlite3_db_filename, sqlite3_errmsg, sqlite3_finalize, sqlite3_last_insert_rowid,
    sqlite3_open_v2, sqlite3_prepare_v2, sqlite3_step, sqlite3_stmt, sqlite3_total_changes64,
};
// `libsqlite3-sys` omits `sqlite3_close_v2` from its generated bindings; the symbol
// itself is provided by the linked SQLite library.
unsafe extern "C" {
    fn sqlite3_close_v2(db: *mut sqlite3) -> c_int;
}
use rowbind_core::{
    Connection, Context, Driver, Error, Executor, QueryResult, Result, RowLabeled, RowNames,
    RowsAffected, TableSchema, stream::Stream, truncate_long,
};
use std::{
    ffi::{CStr, CString, c_int},
    future::Future,
    process, ptr,
    sync::atomic::{AtomicU64, Ordering},
};
use tokio::task::spawn_blocking;

/// Milliseconds a statement waits on a locked database before failing.
const BUSY_TIMEOUT: c_int = 5_000;

/// Distinguishes in-memory databases opened by this process.
static IN_MEMORY: AtomicU64 = AtomicU64::new(0);

pub struct SqliteConnection {
    pub(crate) connection: CBox<*mut sqlite3>,
    database_id: String,
    in_memory: bool,
}

impl SqliteConnection {
    /// Turn the part after `sqlite://` into the URI filename SQLite expects.
    fn uri_filename(location: &str) -> String {
        if location.starts_with("file:") {
            return location.to_string();
        }
        let (path, query) = location.split_once('?').unwrap_or((location, ""));
        let mut result = String::with_capacity(location.len() + 8);
        result.push_str("file:");
        for c in path.chars() {
            match c {
                '%' => result.push_str("%25"),
                '#' => result.push_str("%23"),
                c => result.push(c),
            }
        }
        if !query.is_empty() {
            result.push('?');
            result.push_str(query);
        }
        result
    }

    /// Identity of the main database and whether it lives in memory.
    fn database_id_of(connection: &CBox<*mut sqlite3>) -> (String, bool) {
        unsafe {
            let filename = sqlite3_db_filename(**connection, c"main".as_ptr());
            let filename = if filename.is_null() {
                ""
            } else {
                CStr::from_ptr(filename).to_str().unwrap_or_default()
            };
            if filename.is_empty() {
                // Every in-memory database is private to its handle
                let id = format!(
                    "sqlite::memory:{}-{}",
                    process::id(),
                    IN_MEMORY.fetch_add(1, Ordering::Relaxed)
                );
                (id, true)
            } else {
                (format!("sqlite://{}", filename), false)
            }
        }
    }
}

/// Compile the statement starting at `offset` of `sql`, return it together with
/// the offset of the following one. The statement is null when only whitespace
/// or comments are left.
fn prepare(
    connection: &CBox<*mut sqlite3>,
    sql: &CStr,
    offset: usize,
) -> Result<(CBox<*mut sqlite3_stmt>, usize)> {
    unsafe {
        let mut statement = CBox::new(ptr::null_mut(), |p| {
            sqlite3_finalize(p);
        });
        let head = sql.as_ptr().add(offset);
        let mut tail = ptr::null();
        let rc = sqlite3_prepare_v2(**connection, head, -1, &mut *statement, &mut tail);
        if rc != SQLITE_OK {
            return Err(Error::msg(
                error_message_from_ptr(sqlite3_errmsg(**connection)).to_string(),
            ));
        }
        let next = if tail.is_null() {
            sql.to_bytes().len()
        } else {
            tail.offset_from(sql.as_ptr()) as usize
        };
        Ok((statement, next))
    }
}

/// Advance the statement, `true` when a row is available.
fn step(connection: &CBox<*mut sqlite3>, statement: &CBox<*mut sqlite3_stmt>) -> Result<bool> {
    unsafe {
        match sqlite3_step(**statement) {
            SQLITE_ROW => Ok(true),
            SQLITE_DONE => Ok(false),
            _ => Err(Error::msg(
                error_message_from_ptr(sqlite3_errmsg(**connection)).to_string(),
            )),
        }
    }
}

fn changes(connection: &CBox<*mut sqlite3>) -> (i64, i64) {
    unsafe {
        (
            sqlite3_total_changes64(**connection),
            sqlite3_last_insert_rowid(**connection),
        )
    }
}

impl Executor for SqliteConnection {
    type Driver = SqliteDriver;

    fn driver(&self) -> &Self::Driver {
        &SqliteDriver {}
    }

    fn database_id(&self) -> &str {
        &self.database_id
    }

    fn run<'s>(&'s mut self, sql: String) -> impl Stream<Item = Result<QueryResult>> + Send + 's {
        let connection = &self.connection;
        try_stream! {
            let context = format!("While executing the query:\n{}", truncate_long!(sql));
            let sql = CString::new(sql).with_context(|| context.clone())?;
            let length = sql.as_bytes().len();
            let mut offset = 0;
            while offset < length {
                let (statement, next) = prepare(connection, &sql, offset)
                    .inspect_err(|e| log::error!("{:#}", e))
                    .with_context(|| context.clone())?;
                offset = next;
                if statement.is_null() {
                    continue;
                }
                let count = unsafe { sqlite3_column_count(*statement) };
                if count == 0 {
                    let (total, _) = changes(connection);
                    while step(connection, &statement)
                        .inspect_err(|e| log::error!("{:#}", e))
                        .with_context(|| context.clone())?
                    {}
                    let (after, rowid) = changes(connection);
                    let rows_affected = (after - total).max(0) as u64;
                    yield QueryResult::Affected(RowsAffected {
                        rows_affected,
                        last_affected_id: (rows_affected > 0).then_some(rowid),
                    });
                    continue;
                }
                let labels = (0..count)
                    .map(|i| extract_name(*statement, i))
                    .collect::<Result<RowNames>>()?;
                while step(connection, &statement)
                    .inspect_err(|e| log::error!("{:#}", e))
                    .with_context(|| context.clone())?
                {
                    let values = extract_row(&statement, count)?;
                    yield QueryResult::Row(RowLabeled::new(labels.clone(), values));
                }
            }
        }
    }
}

impl Connection for SqliteConnection {
    /// Open `sqlite://<path>[?<options>]`, the path is created when missing
    /// unless `mode=ro`. `sqlite://:memory:` opens a private in-memory database.
    async fn connect(url: &str) -> Result<SqliteConnection> {
        let prefix = format!("{}://", <Self::Driver as Driver>::NAME);
        let Some(location) = url.strip_prefix(&prefix) else {
            let error = Error::msg(format!(
                "Expected sqlite connection url to start with `{}`",
                &prefix
            ));
            log::error!("{:#}", error);
            return Err(error);
        };
        let context = format!("While opening the database `{}`", url);
        let filename = CString::new(Self::uri_filename(location)).with_context(|| context.clone())?;
        let connection = spawn_blocking(move || unsafe {
            let mut connection = CBox::new(ptr::null_mut(), |p| {
                sqlite3_close_v2(p);
            });
            let rc = sqlite3_open_v2(
                filename.as_ptr(),
                &mut *connection,
                SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE | SQLITE_OPEN_URI,
                ptr::null(),
            );
            if rc != SQLITE_OK {
                let message = if connection.is_null() {
                    "Out of memory while allocating the connection".to_string()
                } else {
                    error_message_from_ptr(sqlite3_errmsg(*connection)).to_string()
                };
                return Err(Error::msg(message));
            }
            sqlite3_busy_timeout(*connection, BUSY_TIMEOUT);
            Ok(connection)
        })
        .await
        .map_err(Error::new)
        .and_then(|v| v)
        .inspect_err(|e| log::error!("{:#}", e))
        .context(context)?;
        let (database_id, in_memory) = Self::database_id_of(&connection);
        log::debug!("Connected to {}", database_id);
        Ok(Self {
            connection,
            database_id,
            in_memory,
        })
    }

    fn is_ephemeral(&self) -> bool {
        self.in_memory
    }

    fn describe_table(&mut self, table: &str) -> impl Future<Output = Result<TableSchema>> + Send {
        describe_table(self, table)
    }

    #[allow(refining_impl_trait)]
    fn begin(&mut self) -> impl Future<Output = Result<SqliteTransaction<'_>>> + Send {
        SqliteTransaction::new(self)
    }
}

#[cfg(test)]
mod tests {
    use crate::SqliteConnection;

    #[test]
    fn uri_filename() {
        assert_eq!(
            SqliteConnection::uri_filename("../target/db.sqlite?mode=rwc"),
            "file:../target/db.sqlite?mode=rwc"
        );
        assert_eq!(SqliteConnection::uri_filename(":memory:"), "file::memory:");
        assert_eq!(SqliteConnection::uri_filename("a#b%c"), "file:a%23b%25c");
        assert_eq!(
            SqliteConnection::uri_filename("file:data.db?cache=shared"),
            "file:data.db?cache=shared"
        );
    }
}
