//! Core types and trait definitions for the Tally reconciliation engine.
//!
//! Tally links incoming payments to the contracts they settle. This crate
//! holds the domain model, the pure confidence scorer, the acceptance
//! policy, and the [`engine::LinkingEngine`] that commits linking decisions
//! through a storage port. It is deliberately free of HTTP and database
//! dependencies; backends implement [`store::LedgerStore`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod audit;
pub mod contract;
pub mod customer;
pub mod engine;
pub mod error;
pub mod payment;
pub mod policy;
pub mod score;
pub mod store;

pub use error::{Error, Result};
