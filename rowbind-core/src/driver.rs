use crate::{Connection, SqlWriter};

pub trait Driver {
    type Connection: Connection;
    type SqlWriter: SqlWriter;

    /// Scheme of the connection URLs handled by this driver (`sqlite` for `sqlite://...`).
    const NAME: &'static str;

    fn sql_writer(&self) -> Self::SqlWriter;
}
