//! Customer — display context for match review.
//!
//! Customers never participate in the scoring decision; operators see them
//! next to candidate contracts when reviewing a match.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An individual or corporate customer name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CustomerName {
  Individual { first: String, last: String },
  Corporate { company: String },
}

impl CustomerName {
  /// Single display string, e.g. `"Alice Liddell"` or `"Acme Motors"`.
  pub fn display(&self) -> String {
    match self {
      Self::Individual { first, last } => format!("{first} {last}"),
      Self::Corporate { company } => company.clone(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
  pub customer_id: Uuid,
  pub tenant_id:   Uuid,
  pub name:        CustomerName,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::LedgerStore::create_customer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCustomer {
  pub tenant_id: Uuid,
  pub name:      CustomerName,
}
