//! HTTP surface for BharatMart: axum routes over the persistence adapter,
//! the cache and the job queues.

pub mod app;
pub mod error;
pub mod handlers;
pub mod state;
pub mod validation;

pub use app::{build_router, cors_layer};
