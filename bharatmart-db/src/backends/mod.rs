mod oci;
mod postgres;
mod sqlite;
mod supabase;

pub use oci::{OciAutonomousAdapter, OrdsSettings};
pub use postgres::{PostgresAdapter, PostgresUnitOfWork};
pub use sqlite::{SqliteAdapter, SqliteUnitOfWork};
pub use supabase::SupabaseAdapter;
