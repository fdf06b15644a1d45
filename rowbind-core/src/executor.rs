use crate::{
    Driver, QueryResult, Result, RowLabeled, RowsAffected,
    stream::{Stream, StreamExt, TryStreamExt},
};
use std::future::Future;

pub trait Executor: Send + Sized {
    type Driver: Driver;

    fn driver(&self) -> &Self::Driver;

    /// Identity of the database this executor talks to.
    ///
    /// It never contains credentials, two executors with the same identity see
    /// the same tables.
    fn database_id(&self) -> &str;

    /// General method to send any query and return any result type (either row or count)
    fn run<'s>(&'s mut self, sql: String) -> impl Stream<Item = Result<QueryResult>> + Send + 's;

    /// Execute the query and returns the rows.
    fn fetch<'s>(&'s mut self, sql: String) -> impl Stream<Item = Result<RowLabeled>> + Send + 's {
        self.run(sql).filter_map(|v| async move {
            match v {
                Ok(QueryResult::Row(v)) => Some(Ok(v)),
                Err(e) => Some(Err(e)),
                _ => None,
            }
        })
    }

    /// Execute the query and return the total number of rows affected.
    fn execute(&mut self, sql: String) -> impl Future<Output = Result<RowsAffected>> + Send {
        self.run(sql)
            .filter_map(|v| async move {
                match v {
                    Ok(QueryResult::Affected(v)) => Some(Ok(v)),
                    Err(e) => Some(Err(e)),
                    _ => None,
                }
            })
            .try_collect()
    }
}
