//! Payment — the record being reconciled.
//!
//! A payment enters the store unresolved (no contract association) and is
//! mutated only by the allocator: linked, or unlinked back to pending. It is
//! never deleted.
//!
//! Monetary amounts are integer minor units (cents). Exact-match comparisons
//! in the scorer are integer comparisons; only the relative-deviation test
//! goes through floating point.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Status enums ────────────────────────────────────────────────────────────

/// Where a payment is in its processing lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
  Pending,
  Processing,
  Completed,
  Failed,
}

/// How much of the payment has been accounted against a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
  Unallocated,
  PartiallyAllocated,
  FullyAllocated,
}

// ─── Payment ─────────────────────────────────────────────────────────────────

/// A single incoming payment, scoped to one tenant.
///
/// `contract_id`/`customer_id` form the current linkage; at most one is
/// active at a time, though the audit trail may record many attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
  pub payment_id:         Uuid,
  pub tenant_id:          Uuid,
  /// Human-facing receipt number, e.g. `"PAY-2024-0042"`.
  pub payment_number:     String,
  pub amount_cents:       i64,
  /// ISO 4217 code, e.g. `"KWD"`.
  pub currency:           String,
  pub payment_date:       NaiveDate,
  /// Identifier the payer quoted for the agreement being settled, if any.
  pub agreement_number:   Option<String>,
  /// Bank or gateway reference; its mere presence makes a payment traceable.
  pub reference_number:   Option<String>,
  pub contract_id:        Option<Uuid>,
  pub customer_id:        Option<Uuid>,
  pub processing_status:  ProcessingStatus,
  pub allocation_status:  AllocationStatus,
  /// Confidence of the current linkage, in `[0, 1]`. `None` until linked.
  pub linking_confidence: Option<f64>,
  pub processing_notes:   Option<String>,
  /// Server-assigned; never changes after creation.
  pub created_at:         DateTime<Utc>,
}

impl Payment {
  /// Whether this payment currently has a contract association.
  pub fn is_linked(&self) -> bool { self.contract_id.is_some() }
}

// ─── NewPayment ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::LedgerStore::create_payment`].
/// `payment_id` and `created_at` are always assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
  pub tenant_id:        Uuid,
  pub payment_number:   String,
  pub amount_cents:     i64,
  pub currency:         String,
  pub payment_date:     NaiveDate,
  pub agreement_number: Option<String>,
  pub reference_number: Option<String>,
  /// Pre-existing association carried in from the source system, if any.
  pub customer_id:      Option<Uuid>,
  pub contract_id:      Option<Uuid>,
  pub notes:            Option<String>,
}

impl NewPayment {
  /// Convenience constructor with all optional fields unset.
  pub fn new(
    tenant_id: Uuid,
    payment_number: impl Into<String>,
    amount_cents: i64,
    currency: impl Into<String>,
    payment_date: NaiveDate,
  ) -> Self {
    Self {
      tenant_id,
      payment_number: payment_number.into(),
      amount_cents,
      currency: currency.into(),
      payment_date,
      agreement_number: None,
      reference_number: None,
      customer_id: None,
      contract_id: None,
      notes: None,
    }
  }
}
