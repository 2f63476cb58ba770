//! Contract — the linking target.
//!
//! Contracts are owned by the surrounding application. The engine reads
//! amount, balance, and status, and writes only the `last_payment_date`
//! bookkeeping field on allocation. Balance recomputation lives at the
//! invoice level, outside this crate.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Contract lifecycle status. Only `Active` contracts are linking candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
  Active,
  Pending,
  UnderLegalProcedure,
  Suspended,
  Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
  pub contract_id:           Uuid,
  pub tenant_id:             Uuid,
  /// Human-facing agreement identifier, e.g. `"AGR-100-2024"`.
  pub contract_number:       String,
  pub customer_id:           Uuid,
  /// The recurring instalment amount the customer is expected to pay.
  pub periodic_amount_cents: i64,
  pub currency:              String,
  pub balance_due_cents:     i64,
  pub status:                ContractStatus,
  /// Bookkeeping only; updated by the allocator on every committed link.
  pub last_payment_date:     Option<NaiveDate>,
  pub created_at:            DateTime<Utc>,
}

impl Contract {
  /// Whether this contract can accept a payment link right now.
  /// Mirrors the candidate-retrieval filter: active with outstanding balance.
  pub fn is_linkable(&self) -> bool {
    self.status == ContractStatus::Active && self.balance_due_cents > 0
  }
}

/// Input to [`crate::store::LedgerStore::create_contract`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContract {
  pub tenant_id:             Uuid,
  pub contract_number:       String,
  pub customer_id:           Uuid,
  pub periodic_amount_cents: i64,
  pub currency:              String,
  pub balance_due_cents:     i64,
  pub status:                ContractStatus,
}
