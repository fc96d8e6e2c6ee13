//! Persistence layer: one [`DatabaseAdapter`] contract with SQLite, Postgres,
//! Supabase and Oracle Autonomous (ORDS) implementations, plus typed
//! repositories for users, products, orders and payments.
//!
//! ```no_run
//! use bharatmart_db::{connect, DatabaseKind, DatabaseSettings, SelectOptions};
//!
//! # async fn demo() -> Result<(), bharatmart_db::DbError> {
//! let settings = DatabaseSettings {
//!     kind: DatabaseKind::from_config("sqlite"),
//!     ..DatabaseSettings::sqlite("./bharatmart.db")
//! };
//! let db = connect(&settings).await?;
//! let cheapest = db
//!     .select(
//!         "products",
//!         &SelectOptions::new()
//!             .filter("category", "electronics")
//!             .order_by("price", true)
//!             .limit(10),
//!     )
//!     .await?;
//! # let _ = cheapest;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod backends;
pub mod error;
pub mod factory;
pub mod models;
pub mod repo;
pub mod sql;
pub mod types;

pub use adapter::{DatabaseAdapter, UnitOfWork};
pub use error::{DbError, DbResult};
pub use factory::{build_adapter, connect, DatabaseSettings};
pub use types::{AdapterHealth, DatabaseKind, OrderBy, Record, SelectOptions};

pub use bharatmart_db_connection::{DbConnectionConfig, DbConnectionError};

/// Timestamp format written to every `created_at` / `updated_at` column.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
