//! Linking-attempt audit records.
//!
//! Every committed linking decision (manual, automatic, or unlink) writes
//! exactly one attempt row capturing the chosen contract, the computed
//! confidence, and the full candidate set that was considered, so a later
//! reviewer can see why a link happened and what the alternatives were.
//! Attempts are append-only; no row is ever updated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who drove the linking decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkingMethod {
  /// An operator picked the contract from the ranked suggestions.
  Manual,
  /// The acceptance policy committed the top-ranked candidate.
  Automatic,
}

/// The identifying attributes of one candidate contract at decision time.
///
/// A snapshot, not a reference: contract numbers and amounts can change
/// later, and the audit trail must show what the scorer actually saw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSnapshot {
  pub contract_id:           Uuid,
  pub contract_number:       String,
  pub periodic_amount_cents: i64,
  pub confidence:            f64,
}

/// One committed linking decision. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkingAttempt {
  pub attempt_id:      Uuid,
  pub payment_id:      Uuid,
  /// `None` for unlink decisions.
  pub contract_id:     Option<Uuid>,
  pub confidence:      f64,
  pub method:          LinkingMethod,
  /// Every candidate considered, ranked as the decision saw them.
  pub candidates:      Vec<CandidateSnapshot>,
  /// Which scorer weight configuration produced `confidence`.
  pub weights_version: String,
  pub notes:           Option<String>,
  /// Server-assigned; never changes after creation.
  pub recorded_at:     DateTime<Utc>,
}
