//! Embedded schema for the SQL-backed adapters.
//!
//! Both dialects create the same five tables with text ids and floating
//! point money columns, so the adapter binds values identically on either.

use sqlx::migrate::Migrator;

pub static SQLITE_MIGRATOR: Migrator = sqlx_macros::migrate!("migrations/sqlite");
pub static POSTGRES_MIGRATOR: Migrator = sqlx_macros::migrate!("migrations/postgres");

pub fn sqlite_migrator() -> &'static Migrator {
    &SQLITE_MIGRATOR
}

pub fn postgres_migrator() -> &'static Migrator {
    &POSTGRES_MIGRATOR
}
