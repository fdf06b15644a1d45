mod as_value;
mod column;
mod connection;
mod credentials;
mod driver;
mod error;
mod executor;
mod filter;
mod query;
mod sql_writer;
mod table_schema;
mod transaction;
mod util;
mod value;

pub use ::anyhow::Context;
pub use as_value::*;
pub use column::*;
pub use connection::*;
pub use credentials::*;
pub use driver::*;
pub use error::*;
pub use executor::*;
pub use filter::*;
pub use query::*;
pub use sql_writer::*;
pub use table_schema::*;
pub use transaction::*;
pub use util::*;
pub use value::*;
pub mod stream {
    pub use ::futures::stream::*;
}
pub use ::futures::future;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
