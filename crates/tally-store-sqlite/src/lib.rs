//! SQLite backend for the Tally ledger store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! pool without blocking the async runtime. The two linking commits run as
//! single transactions with the payment update guarded on its current
//! allocation status, so concurrent linkers get a conflict instead of a
//! silent double-link.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
