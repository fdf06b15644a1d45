use crate::{Executor, Result};

/// Executor whose statements become visible together on `commit`.
///
/// Records commit through a transaction like through any other executor.
pub trait Transaction<'c>: Executor {
    fn commit(self) -> impl Future<Output = Result<()>> + Send;
    fn rollback(self) -> impl Future<Output = Result<()>> + Send;
}
