//! Error types for `tally-core`.
//!
//! Business-level "no good match" outcomes are not errors; they are
//! represented as [`crate::engine::LinkOutcome::NeedsReview`]. The variants
//! here cover bad input, missing records, and storage failures.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("payment not found: {0}")]
  PaymentNotFound(Uuid),

  #[error("contract not found: {0}")]
  ContractNotFound(Uuid),

  #[error("customer not found: {0}")]
  CustomerNotFound(Uuid),

  #[error("payment {payment} and contract {contract} belong to different tenants")]
  TenantMismatch { payment: Uuid, contract: Uuid },

  #[error("payment {0} is already linked to a contract")]
  AlreadyLinked(Uuid),

  #[error("payment {0} is not linked to any contract")]
  NotLinked(Uuid),

  #[error("contract {id} cannot accept a link: {reason}")]
  ContractNotLinkable { id: Uuid, reason: String },

  /// The payment's allocation status changed underneath us between the read
  /// and the conditional write. The caller must re-fetch and retry.
  #[error("concurrent update on payment {0}")]
  Conflict(Uuid),

  #[error("invalid amount: {0}")]
  InvalidAmount(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Wrap a backend error at the storage-port boundary.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
