mod binding;
mod config;
mod iterator;
mod materialize;
mod record;
mod schema_cache;

pub use ::rowbind_core::*;
pub use binding::*;
pub use config::*;
pub use iterator::*;
pub use materialize::*;
pub use record::*;
pub use schema_cache::*;
