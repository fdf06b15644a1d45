mod greeting;
mod lifecycle;
mod lookup;
mod schema;

use crate::{
    greeting::greeting,
    lifecycle::{foreign_database, lifecycle, typed_values},
    lookup::lookup,
    schema::{schema_cache, schema_cache_concurrency},
};
use log::LevelFilter;
use rowbind::{Connection, RecordError};
use std::env;

#[cfg(not(feature = "disable-transactions"))]
use crate::lifecycle::transactions;

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Run every scenario against the database at `url`.
///
/// Some scenarios open more connections, the url must point to a database
/// shared between connections (not an in-memory one). `other_url` must point
/// to a different database.
pub async fn execute_tests<C: Connection + 'static>(url: &str, other_url: &str) {
    let mut connection = C::connect(url)
        .await
        .expect("Could not open the database");
    let mut other = C::connect(other_url)
        .await
        .expect("Could not open the other database");
    greeting(&mut connection).await;
    lookup(&mut connection).await;
    lifecycle(&mut connection).await;
    foreign_database(&mut connection, &mut other).await;
    typed_values(&mut connection).await;
    #[cfg(not(feature = "disable-transactions"))]
    transactions(&mut connection).await;
    schema_cache(&mut connection).await;
    schema_cache_concurrency::<C>(url).await;
}

/// The [`RecordError`] carried by `error`, either as error or as context.
pub fn record_error(error: &rowbind::Error) -> Option<&RecordError> {
    error.downcast_ref::<RecordError>()
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
