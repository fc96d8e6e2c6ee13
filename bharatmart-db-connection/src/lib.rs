//! Connection pools for the SQL-backed persistence adapters.
//!
//! The backend is picked at runtime from the URL scheme (`sqlite:` or
//! `postgres:`/`postgresql:`), so a single binary can serve either.

pub mod config;
pub mod error;
pub mod pool;
#[cfg(test)]
mod test;
pub mod utils;

pub use config::DbConnectionConfig;
pub use error::DbConnectionError;
pub use pool::{create_pool, DbPool};
