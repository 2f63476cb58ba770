//! Acceptance policy — automatic link vs manual review.
//!
//! The policy decides what happens with a ranked candidate list. It never
//! commits anything; the engine carries out whichever decision comes back.
//! Low confidence is a routing outcome here, not an error.

use serde::{Deserialize, Serialize};

use crate::score::ScoredCandidate;

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Thresholds governing the automatic-vs-manual decision.
///
/// Call sites differ: a single-payment "smart link" can run looser than an
/// unattended bulk pass, so the threshold is a parameter rather than a
/// constant. Defaults follow the stricter unattended configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptancePolicy {
  /// Minimum top-candidate confidence for an automatic link.
  pub auto_link_threshold:   f64,
  /// Candidates below this are not worth showing an operator.
  pub min_suggest_threshold: f64,
  /// Cap on suggestions surfaced for manual review.
  pub max_suggestions:       usize,
}

impl Default for AcceptancePolicy {
  fn default() -> Self {
    Self {
      auto_link_threshold:   0.8,
      min_suggest_threshold: 0.4,
      max_suggestions:       5,
    }
  }
}

// ─── Decision ────────────────────────────────────────────────────────────────

/// What the policy wants done with one payment's ranked candidates.
#[derive(Debug, Clone)]
pub enum Decision {
  /// The top candidate clears the threshold; commit it.
  AutoLink { candidate: ScoredCandidate },
  /// Nothing clears the threshold (or there were no candidates); surface
  /// these suggestions to an operator and commit nothing.
  ManualReview { suggestions: Vec<ScoredCandidate> },
}

impl AcceptancePolicy {
  /// A copy of this policy with a different auto-link threshold, for call
  /// sites that run stricter or looser than the configured default.
  pub fn with_auto_threshold(&self, threshold: f64) -> Self {
    Self {
      auto_link_threshold: threshold,
      ..self.clone()
    }
  }

  /// Decide on a ranked candidate list (highest confidence first).
  pub fn decide(&self, mut ranked: Vec<ScoredCandidate>) -> Decision {
    let accepted = ranked
      .first()
      .is_some_and(|top| top.confidence >= self.auto_link_threshold);

    if accepted {
      Decision::AutoLink {
        candidate: ranked.remove(0),
      }
    } else {
      Decision::ManualReview {
        suggestions: self.suggestions(ranked),
      }
    }
  }

  /// Trim a ranked list down to what an operator should see.
  pub fn suggestions(&self, ranked: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
    ranked
      .into_iter()
      .filter(|c| c.confidence >= self.min_suggest_threshold)
      .take(self.max_suggestions)
      .collect()
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use uuid::Uuid;

  use super::*;
  use crate::{
    contract::{Contract, ContractStatus},
    score::MatchEvidence,
  };

  fn candidate(confidence: f64) -> ScoredCandidate {
    ScoredCandidate {
      contract: Contract {
        contract_id:           Uuid::new_v4(),
        tenant_id:             Uuid::new_v4(),
        contract_number:       "C-1".into(),
        customer_id:           Uuid::new_v4(),
        periodic_amount_cents: 50_000,
        currency:              "KWD".into(),
        balance_due_cents:     50_000,
        status:                ContractStatus::Active,
        last_payment_date:     None,
        created_at:            Utc::now(),
      },
      confidence,
      evidence: MatchEvidence::default(),
    }
  }

  #[test]
  fn top_candidate_at_threshold_auto_links() {
    let policy = AcceptancePolicy::default();
    let decision = policy.decide(vec![candidate(0.8), candidate(0.5)]);
    assert!(matches!(decision, Decision::AutoLink { candidate } if candidate.confidence == 0.8));
  }

  #[test]
  fn below_threshold_routes_to_manual_review() {
    // Scenario B: best candidate at 0.5 against a 0.6 threshold.
    let policy = AcceptancePolicy::default().with_auto_threshold(0.6);
    let decision = policy.decide(vec![candidate(0.5)]);
    match decision {
      Decision::ManualReview { suggestions } => {
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].confidence, 0.5);
      }
      Decision::AutoLink { .. } => panic!("expected manual review"),
    }
  }

  #[test]
  fn empty_candidate_set_is_review_not_error() {
    // Scenario C: no candidates at all.
    let policy = AcceptancePolicy::default();
    match policy.decide(Vec::new()) {
      Decision::ManualReview { suggestions } => assert!(suggestions.is_empty()),
      Decision::AutoLink { .. } => panic!("expected manual review"),
    }
  }

  #[test]
  fn suggestions_drop_noise_and_respect_cap() {
    let policy = AcceptancePolicy {
      auto_link_threshold:   0.9,
      min_suggest_threshold: 0.4,
      max_suggestions:       2,
    };
    let decision = policy.decide(vec![
      candidate(0.7),
      candidate(0.6),
      candidate(0.5),
      candidate(0.3),
    ]);
    match decision {
      Decision::ManualReview { suggestions } => {
        assert_eq!(suggestions.len(), 2);
        assert!(suggestions.iter().all(|c| c.confidence >= 0.4));
      }
      Decision::AutoLink { .. } => panic!("expected manual review"),
    }
  }
}
