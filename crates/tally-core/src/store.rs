//! The `LedgerStore` trait and supporting query/commit types.
//!
//! The trait is implemented by storage backends (e.g. `tally-store-sqlite`).
//! Higher layers (`tally-api`, the engine itself) depend on this
//! abstraction, not on any concrete backend, so the scorer and allocator are
//! testable against in-memory fakes.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  audit::{CandidateSnapshot, LinkingAttempt, LinkingMethod},
  contract::{Contract, NewContract},
  customer::{Customer, NewCustomer},
  payment::{AllocationStatus, NewPayment, Payment, ProcessingStatus},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`LedgerStore::list_payments`]. All filters are ANDed;
/// `pending_review` expands to the unresolved-payment condition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentQuery {
  pub tenant:            Option<Uuid>,
  pub processing_status: Option<ProcessingStatus>,
  pub allocation_status: Option<AllocationStatus>,
  /// Only payments whose linking confidence is below this value.
  pub max_confidence:    Option<f64>,
  /// The review-queue filter: pending, or unallocated, or linked with
  /// confidence below 0.5.
  #[serde(default)]
  pub pending_review:    bool,
  pub limit:             Option<usize>,
  pub offset:            Option<usize>,
}

// ─── Commit types ────────────────────────────────────────────────────────────

/// A fully-validated link decision, ready to be written atomically.
///
/// The store must apply the payment update, the audit insert, and the
/// contract bookkeeping in one transaction, and must condition the payment
/// update on `expected_allocation` (compare-and-swap). Either everything
/// lands or the payment is observably untouched.
#[derive(Debug, Clone)]
pub struct LinkCommit {
  pub payment_id:          Uuid,
  /// CAS guard: the allocation status the engine read before deciding.
  pub expected_allocation: AllocationStatus,
  pub contract_id:         Uuid,
  pub customer_id:         Uuid,
  pub processing_status:   ProcessingStatus,
  pub allocation_status:   AllocationStatus,
  pub confidence:          f64,
  pub notes:               String,
  pub method:              LinkingMethod,
  /// Every candidate the decision considered, for the audit row.
  pub candidates:          Vec<CandidateSnapshot>,
  pub weights_version:     String,
}

/// A validated unlink decision; same atomicity and CAS rules as
/// [`LinkCommit`].
#[derive(Debug, Clone)]
pub struct UnlinkCommit {
  pub payment_id:          Uuid,
  pub expected_allocation: AllocationStatus,
  pub reason:              Option<String>,
  pub weights_version:     String,
}

/// Result of a conditional commit.
#[derive(Debug, Clone)]
pub enum CommitOutcome<T> {
  Committed(T),
  /// The CAS guard did not match: someone else changed the payment between
  /// the engine's read and this write. Nothing was written.
  Conflict { current: AllocationStatus },
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Tally storage backend.
///
/// Payments and audit rows are never deleted; linking state changes go
/// through the two conditional commit operations so the invariants cannot be
/// bypassed by callers writing fields directly.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait LedgerStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Payments ──────────────────────────────────────────────────────────

  /// Persist a new payment in the unresolved state (`Pending`,
  /// `Unallocated`, no confidence). Id and `created_at` are set by the
  /// store.
  fn create_payment(
    &self,
    input: NewPayment,
  ) -> impl Future<Output = Result<Payment, Self::Error>> + Send + '_;

  /// Retrieve a payment by id. Returns `None` if not found.
  fn get_payment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Payment>, Self::Error>> + Send + '_;

  /// List payments matching `query`, newest payment date first.
  fn list_payments<'a>(
    &'a self,
    query: &'a PaymentQuery,
  ) -> impl Future<Output = Result<Vec<Payment>, Self::Error>> + Send + 'a;

  // ── Contracts ─────────────────────────────────────────────────────────

  fn create_contract(
    &self,
    input: NewContract,
  ) -> impl Future<Output = Result<Contract, Self::Error>> + Send + '_;

  fn get_contract(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Contract>, Self::Error>> + Send + '_;

  /// List every contract for a tenant regardless of status.
  fn list_contracts(
    &self,
    tenant: Uuid,
  ) -> impl Future<Output = Result<Vec<Contract>, Self::Error>> + Send + '_;

  /// Candidate retrieval: active contracts with outstanding balance for
  /// `tenant`, ordered by contract id. An empty store yields an empty set,
  /// not an error. Read-only.
  fn candidate_contracts(
    &self,
    tenant: Uuid,
  ) -> impl Future<Output = Result<Vec<Contract>, Self::Error>> + Send + '_;

  // ── Customers ─────────────────────────────────────────────────────────

  fn create_customer(
    &self,
    input: NewCustomer,
  ) -> impl Future<Output = Result<Customer, Self::Error>> + Send + '_;

  fn get_customer(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Customer>, Self::Error>> + Send + '_;

  // ── Linking commits ───────────────────────────────────────────────────

  /// Atomically apply a link: update the payment (guarded on
  /// `expected_allocation`), insert the audit attempt, and touch the
  /// contract's `last_payment_date`. Returns the attempt on success.
  fn commit_link(
    &self,
    commit: LinkCommit,
  ) -> impl Future<Output = Result<CommitOutcome<LinkingAttempt>, Self::Error>> + Send + '_;

  /// Atomically clear a payment's linkage (guarded on
  /// `expected_allocation`) and record an audit attempt with no contract.
  /// Returns the updated payment and the attempt.
  fn commit_unlink(
    &self,
    commit: UnlinkCommit,
  ) -> impl Future<Output = Result<CommitOutcome<(Payment, LinkingAttempt)>, Self::Error>>
  + Send
  + '_;

  /// Audit trail for one payment, oldest first.
  fn list_attempts(
    &self,
    payment_id: Uuid,
  ) -> impl Future<Output = Result<Vec<LinkingAttempt>, Self::Error>> + Send + '_;
}
