//! JSON REST API for Tally.
//!
//! Exposes an axum [`Router`] backed by a
//! [`LinkingEngine`](tally_core::engine::LinkingEngine) over any
//! [`tally_core::store::LedgerStore`]. Auth, TLS, and transport concerns are
//! the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", tally_api::api_router(engine.clone()))
//! ```

pub mod contracts;
pub mod customers;
pub mod error;
pub mod imports;
pub mod linking;
pub mod payments;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use tally_core::{engine::LinkingEngine, store::LedgerStore};

pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(engine: Arc<LinkingEngine<S>>) -> Router<()>
where
  S: LedgerStore + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    // Payments
    .route(
      "/payments",
      get(payments::list::<S>).post(payments::create::<S>),
    )
    .route("/payments/{id}", get(payments::get_one::<S>))
    // Linking operations
    .route("/payments/{id}/candidates", get(linking::candidates::<S>))
    .route("/payments/{id}/link", post(linking::link_manual::<S>))
    .route("/payments/{id}/auto-link", post(linking::link_auto::<S>))
    .route("/payments/{id}/unlink", post(linking::unlink::<S>))
    .route("/payments/{id}/attempts", get(linking::attempts::<S>))
    .route("/auto-link", post(linking::auto_link_all::<S>))
    // Contracts
    .route(
      "/contracts",
      get(contracts::list::<S>).post(contracts::create::<S>),
    )
    .route("/contracts/{id}", get(contracts::get_one::<S>))
    // Customers
    .route("/customers", post(customers::create::<S>))
    .route("/customers/{id}", get(customers::get_one::<S>))
    // CSV ingestion
    .route("/imports/payments", post(imports::payments::<S>))
    .with_state(engine)
}
