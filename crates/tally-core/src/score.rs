//! Confidence scorer — pure weighted-evidence accumulation.
//!
//! Given a payment and a candidate contract, compute a confidence in
//! `[0, 1]` from the evidence that fires: amount equality or closeness,
//! agreement-number substring match, and reference-number presence. No I/O,
//! no randomness; identical inputs always produce identical scores.

use serde::{Deserialize, Serialize};

use crate::{contract::Contract, payment::Payment};

// ─── Weights ─────────────────────────────────────────────────────────────────

/// Named, versioned weight configuration for the scorer.
///
/// The version string is recorded into every
/// [`LinkingAttempt`](crate::audit::LinkingAttempt) so audit rows state
/// which configuration produced their confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeights {
  pub version:           String,
  /// Floor for any same-tenant active contract with balance; a candidate is
  /// never scored at exactly zero.
  pub base:              f64,
  /// Bonus for an exact amount match (same currency, same cents).
  pub amount_exact:      f64,
  /// Bonus for an amount within `amount_tolerance` of the periodic amount.
  /// Mutually exclusive with `amount_exact`; exact wins.
  pub amount_close:      f64,
  /// Maximum relative deviation for the close-amount bonus.
  pub amount_tolerance:  f64,
  /// Bonus when the payment's agreement number appears as a substring of
  /// the contract number.
  pub agreement_match:   f64,
  /// Bonus for carrying any reference number at all; rewards traceability
  /// regardless of match quality.
  pub reference_present: f64,
}

impl Default for ScoreWeights {
  fn default() -> Self {
    Self {
      version:           "v1".into(),
      base:              0.3,
      amount_exact:      0.4,
      amount_close:      0.2,
      amount_tolerance:  0.10,
      agreement_match:   0.3,
      reference_present: 0.1,
    }
  }
}

// ─── Evidence ────────────────────────────────────────────────────────────────

/// Which signals fired for one (payment, contract) pair.
///
/// Constructed only by [`evidence`], which enforces the amount-bonus
/// exclusivity: `amount_exact` and `amount_close` are never both set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEvidence {
  pub amount_exact:      bool,
  pub amount_close:      bool,
  pub agreement_match:   bool,
  pub reference_present: bool,
}

impl MatchEvidence {
  /// The confidence this evidence set is worth under `weights`, clamped to
  /// 1.0. The raw sum can exceed 1.0 when everything fires.
  pub fn confidence(&self, weights: &ScoreWeights) -> f64 {
    let mut c = weights.base;
    if self.amount_exact {
      c += weights.amount_exact;
    } else if self.amount_close {
      c += weights.amount_close;
    }
    if self.agreement_match {
      c += weights.agreement_match;
    }
    if self.reference_present {
      c += weights.reference_present;
    }
    c.min(1.0)
  }

  /// Human-readable summary of the evidence, used in processing notes and
  /// the review queue.
  pub fn reason(&self) -> String {
    let mut parts = Vec::new();
    if self.amount_exact {
      parts.push("exact amount match");
    } else if self.amount_close {
      parts.push("amount within tolerance");
    }
    if self.agreement_match {
      parts.push("agreement number match");
    }
    if self.reference_present {
      parts.push("reference number present");
    }
    if parts.is_empty() {
      "general match".into()
    } else {
      parts.join(" + ")
    }
  }
}

/// Evaluate which signals fire for `payment` against `contract`.
/// Only `weights.amount_tolerance` is read here; the bonuses apply in
/// [`MatchEvidence::confidence`].
pub fn evidence(
  payment: &Payment,
  contract: &Contract,
  weights: &ScoreWeights,
) -> MatchEvidence {
  let mut ev = MatchEvidence::default();

  // Amount evidence requires matching currencies; cross-currency amounts
  // are not comparable without conversion, which this engine does not do.
  if payment.currency == contract.currency {
    if payment.amount_cents == contract.periodic_amount_cents {
      ev.amount_exact = true;
    } else if contract.periodic_amount_cents != 0 {
      let deviation = (payment.amount_cents - contract.periodic_amount_cents)
        .unsigned_abs() as f64
        / contract.periodic_amount_cents.abs() as f64;
      if deviation <= weights.amount_tolerance {
        ev.amount_close = true;
      }
    }
  }

  if let Some(agreement) = payment.agreement_number.as_deref() {
    if !agreement.is_empty() && contract.contract_number.contains(agreement) {
      ev.agreement_match = true;
    }
  }

  if payment
    .reference_number
    .as_deref()
    .is_some_and(|r| !r.is_empty())
  {
    ev.reference_present = true;
  }

  ev
}

/// `score(payment, contract) -> [0, 1]`. Pure and deterministic.
pub fn score(payment: &Payment, contract: &Contract, weights: &ScoreWeights) -> f64 {
  evidence(payment, contract, weights).confidence(weights)
}

// ─── Ranking ─────────────────────────────────────────────────────────────────

/// One candidate contract with its computed confidence and evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
  pub contract:   Contract,
  pub confidence: f64,
  pub evidence:   MatchEvidence,
}

impl ScoredCandidate {
  /// Snapshot of this candidate for the audit trail.
  pub fn snapshot(&self) -> crate::audit::CandidateSnapshot {
    crate::audit::CandidateSnapshot {
      contract_id:           self.contract.contract_id,
      contract_number:       self.contract.contract_number.clone(),
      periodic_amount_cents: self.contract.periodic_amount_cents,
      confidence:            self.confidence,
    }
  }
}

/// Score every candidate and sort descending by confidence.
///
/// Ties break by ascending contract id so repeated runs over the same input
/// always produce the same order. Filtering is the policy's job, not the
/// scorer's; every candidate passed in comes back out.
pub fn rank_candidates(
  payment: &Payment,
  contracts: Vec<Contract>,
  weights: &ScoreWeights,
) -> Vec<ScoredCandidate> {
  let mut scored: Vec<ScoredCandidate> = contracts
    .into_iter()
    .map(|contract| {
      let ev = evidence(payment, &contract, weights);
      ScoredCandidate {
        confidence: ev.confidence(weights),
        evidence: ev,
        contract,
      }
    })
    .collect();

  scored.sort_by(|a, b| {
    b.confidence
      .total_cmp(&a.confidence)
      .then_with(|| a.contract.contract_id.cmp(&b.contract.contract_id))
  });

  scored
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::{NaiveDate, Utc};
  use uuid::Uuid;

  use super::*;
  use crate::{
    contract::ContractStatus,
    payment::{AllocationStatus, ProcessingStatus},
  };

  fn payment(
    amount_cents: i64,
    agreement: Option<&str>,
    reference: Option<&str>,
  ) -> Payment {
    Payment {
      payment_id:         Uuid::new_v4(),
      tenant_id:          Uuid::new_v4(),
      payment_number:     "PAY-1".into(),
      amount_cents,
      currency:           "KWD".into(),
      payment_date:       NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
      agreement_number:   agreement.map(str::to_owned),
      reference_number:   reference.map(str::to_owned),
      contract_id:        None,
      customer_id:        None,
      processing_status:  ProcessingStatus::Pending,
      allocation_status:  AllocationStatus::Unallocated,
      linking_confidence: None,
      processing_notes:   None,
      created_at:         Utc::now(),
    }
  }

  fn contract(number: &str, periodic_cents: i64) -> Contract {
    Contract {
      contract_id:           Uuid::new_v4(),
      tenant_id:             Uuid::new_v4(),
      contract_number:       number.into(),
      customer_id:           Uuid::new_v4(),
      periodic_amount_cents: periodic_cents,
      currency:              "KWD".into(),
      balance_due_cents:     periodic_cents,
      status:                ContractStatus::Active,
      last_payment_date:     None,
      created_at:            Utc::now(),
    }
  }

  #[test]
  fn all_evidence_stacks_and_clamps_to_one() {
    // Scenario A: exact amount + agreement substring + reference present.
    // Raw sum is 0.3 + 0.4 + 0.3 + 0.1 = 1.1 and must clamp to 1.0.
    let p = payment(50_000, Some("AGR-100"), Some("REF-9"));
    let c = contract("AGR-100-2024", 50_000);
    let w = ScoreWeights::default();
    assert_eq!(score(&p, &c, &w), 1.0);
  }

  #[test]
  fn close_amount_only_scores_half() {
    // Scenario B: 480 vs 500 is a 4% deviation, within the 10% tolerance.
    let p = payment(48_000, None, None);
    let c = contract("C-77", 50_000);
    let w = ScoreWeights::default();
    let s = score(&p, &c, &w);
    assert!((s - 0.5).abs() < 1e-9, "expected 0.5, got {s}");
  }

  #[test]
  fn exact_and_close_are_mutually_exclusive() {
    let p = payment(50_000, None, None);
    let c = contract("C-77", 50_000);
    let w = ScoreWeights::default();
    let ev = evidence(&p, &c, &w);
    assert!(ev.amount_exact);
    assert!(!ev.amount_close);

    // 0.3 base + 0.4 exact, never + 0.2 close on top.
    let s = ev.confidence(&w);
    assert!((s - 0.7).abs() < 1e-9, "expected 0.7, got {s}");
  }

  #[test]
  fn deviation_above_tolerance_earns_no_amount_bonus() {
    // 440 vs 500 is 12%, outside the tolerance: base only.
    let p = payment(44_000, None, None);
    let c = contract("C-77", 50_000);
    let w = ScoreWeights::default();
    let s = score(&p, &c, &w);
    assert!((s - 0.3).abs() < 1e-9, "expected 0.3, got {s}");
  }

  #[test]
  fn empty_agreement_number_does_not_match() {
    let p = payment(10_000, Some(""), None);
    let c = contract("AGR-1", 99_999);
    let w = ScoreWeights::default();
    assert!(!evidence(&p, &c, &w).agreement_match);
  }

  #[test]
  fn reference_presence_counts_without_any_match() {
    let p = payment(10_000, None, Some("TXN-123"));
    let c = contract("AGR-1", 99_999_00);
    let w = ScoreWeights::default();
    let ev = evidence(&p, &c, &w);
    assert!(ev.reference_present);
    let s = ev.confidence(&w);
    assert!((s - 0.4).abs() < 1e-9, "expected 0.4, got {s}");
  }

  #[test]
  fn cross_currency_amounts_earn_no_bonus() {
    let mut p = payment(50_000, None, None);
    p.currency = "USD".into();
    let c = contract("C-1", 50_000);
    let ev = evidence(&p, &c, &ScoreWeights::default());
    assert!(!ev.amount_exact);
    assert!(!ev.amount_close);
  }

  #[test]
  fn zero_periodic_amount_never_divides() {
    let p = payment(1, None, None);
    let c = contract("C-1", 0);
    let ev = evidence(&p, &c, &ScoreWeights::default());
    assert!(!ev.amount_exact);
    assert!(!ev.amount_close);
  }

  #[test]
  fn scorer_is_deterministic() {
    let p = payment(48_000, Some("AGR-5"), Some("R"));
    let c = contract("AGR-5-B", 50_000);
    let w = ScoreWeights::default();
    assert_eq!(score(&p, &c, &w), score(&p, &c, &w));
  }

  #[test]
  fn ranking_is_stable_for_tied_scores() {
    // Scenario D: two contracts with identical evidence must come back in
    // the same order on every run, decided by contract id.
    let p = payment(48_000, None, None);
    let a = contract("C-A", 50_000);
    let b = contract("C-B", 50_000);
    let w = ScoreWeights::default();

    let first = rank_candidates(&p, vec![a.clone(), b.clone()], &w);
    let second = rank_candidates(&p, vec![b.clone(), a.clone()], &w);

    assert_eq!(first[0].confidence, first[1].confidence);
    assert_eq!(first[0].contract.contract_id, second[0].contract.contract_id);
    assert_eq!(
      first[0].contract.contract_id,
      a.contract_id.min(b.contract_id)
    );
  }

  #[test]
  fn ranking_orders_by_descending_confidence() {
    let p = payment(50_000, Some("AGR-9"), None);
    let strong = contract("AGR-9-2024", 50_000);
    let weak = contract("C-0", 1_234_500);
    let w = ScoreWeights::default();

    let ranked = rank_candidates(&p, vec![weak.clone(), strong.clone()], &w);
    assert_eq!(ranked[0].contract.contract_id, strong.contract_id);
    assert!(ranked[0].confidence > ranked[1].confidence);
  }

  #[test]
  fn reason_names_the_evidence_that_fired() {
    let p = payment(50_000, Some("AGR-1"), None);
    let c = contract("AGR-1", 50_000);
    let reason = evidence(&p, &c, &ScoreWeights::default()).reason();
    assert!(reason.contains("exact amount match"));
    assert!(reason.contains("agreement number match"));
    assert!(!reason.contains("reference"));
  }

  #[test]
  fn no_evidence_reads_as_general_match() {
    let p = payment(1, None, None);
    let c = contract("C-1", 1_000_000);
    assert_eq!(
      evidence(&p, &c, &ScoreWeights::default()).reason(),
      "general match"
    );
  }
}
