//! The linking engine — validation, allocation, and the batch driver.
//!
//! Both the manual and the automatic flow converge on the same commit
//! routine, so the invariants (one audit row per link, allocation status
//! consistent with the association, CAS-guarded writes) cannot be violated
//! by path taken. The engine itself never retries; an
//! [`Error::Conflict`] is surfaced to the caller, who re-fetches and
//! decides.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  audit::{LinkingAttempt, LinkingMethod},
  contract::Contract,
  error::{Error, Result},
  payment::{AllocationStatus, Payment, ProcessingStatus},
  policy::{AcceptancePolicy, Decision},
  score::{ScoreWeights, ScoredCandidate, evidence, rank_candidates},
  store::{CommitOutcome, LedgerStore, LinkCommit, PaymentQuery, UnlinkCommit},
};

/// A link is fully allocated only above this confidence; everything else
/// commits as partially allocated pending invoice-level allocation.
const FULL_ALLOCATION_THRESHOLD: f64 = 0.8;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Engine-wide tuning: scorer weights, acceptance policy, batch pacing.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
  pub weights:        ScoreWeights,
  pub policy:         AcceptancePolicy,
  /// Fixed pause between payments in a batch run. Purely to respect
  /// external rate limits, never needed for correctness.
  pub batch_throttle: Option<Duration>,
}

// ─── Outcome types ───────────────────────────────────────────────────────────

/// Result of one automatic-linking attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LinkOutcome {
  /// The policy accepted the top candidate and the link is committed.
  Linked { attempt: LinkingAttempt },
  /// Nothing cleared the threshold; the payment stays unresolved with
  /// these suggestions attached for the review queue.
  NeedsReview { suggestions: Vec<ScoredCandidate> },
}

/// One payment's failure inside a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
  pub payment_id: Uuid,
  pub message:    String,
}

/// Summary of a bulk auto-link pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
  pub total_processed: usize,
  pub linked:          usize,
  pub needs_review:    usize,
  pub errors:          Vec<BatchError>,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// The reconciliation engine over a storage port.
///
/// The store is injected at construction; nothing here reaches for ambient
/// globals, which keeps every operation testable against an in-memory fake.
pub struct LinkingEngine<S> {
  store:  S,
  config: EngineConfig,
}

impl<S: LedgerStore> LinkingEngine<S> {
  pub fn new(store: S) -> Self {
    Self::with_config(store, EngineConfig::default())
  }

  pub fn with_config(store: S, config: EngineConfig) -> Self {
    Self { store, config }
  }

  /// Direct access to the storage port, for plain CRUD callers that sit
  /// next to the linking operations (API handlers, import).
  pub fn store(&self) -> &S { &self.store }

  pub fn config(&self) -> &EngineConfig { &self.config }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Candidate retrieval plus ranking; read-only.
  pub async fn score_candidates(&self, payment_id: Uuid) -> Result<Vec<ScoredCandidate>> {
    let payment = self.require_payment(payment_id).await?;
    self.ranked_candidates(&payment).await
  }

  // ── Linking operations ────────────────────────────────────────────────

  /// Commit an operator's choice of contract for a payment.
  ///
  /// The confidence is recomputed here, not taken from the caller, so a
  /// manual link carries the same deterministic score an automatic one
  /// would have.
  pub async fn link_manually(
    &self,
    payment_id: Uuid,
    contract_id: Uuid,
    notes: Option<String>,
  ) -> Result<LinkingAttempt> {
    let payment = self.require_payment(payment_id).await?;
    if payment.is_linked() {
      return Err(Error::AlreadyLinked(payment_id));
    }

    let contract = self
      .store
      .get_contract(contract_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ContractNotFound(contract_id))?;
    self.validate_target(&payment, &contract)?;

    let ranked = self.ranked_candidates(&payment).await?;
    let ev = evidence(&payment, &contract, &self.config.weights);
    let confidence = ev.confidence(&self.config.weights);
    let notes = notes.unwrap_or_else(|| {
      format!(
        "manual link, confidence {}%: {}",
        percent(confidence),
        ev.reason()
      )
    });

    self
      .commit(
        &payment,
        &contract,
        confidence,
        notes,
        LinkingMethod::Manual,
        &ranked,
      )
      .await
  }

  /// Score, rank, and apply the acceptance policy to one payment.
  pub async fn link_automatically(&self, payment_id: Uuid) -> Result<LinkOutcome> {
    let payment = self.require_payment(payment_id).await?;
    if payment.is_linked() {
      return Err(Error::AlreadyLinked(payment_id));
    }
    self.decide_and_commit(&payment, &self.config.policy).await
  }

  /// Bulk auto-link over every unresolved payment for `tenant`.
  ///
  /// Each payment is linked (or not) in isolation: one failure is recorded
  /// and the batch moves on. The batch is not transactional across
  /// payments.
  pub async fn auto_link_all(
    &self,
    tenant: Uuid,
    min_confidence: Option<f64>,
  ) -> Result<BatchSummary> {
    let policy = match min_confidence {
      Some(t) => self.config.policy.with_auto_threshold(t),
      None => self.config.policy.clone(),
    };

    let query = PaymentQuery {
      tenant: Some(tenant),
      pending_review: true,
      ..Default::default()
    };
    let payments = self.store.list_payments(&query).await.map_err(Error::store)?;

    let mut summary = BatchSummary::default();
    for (i, payment) in payments.iter().enumerate() {
      // The review queue also surfaces already-linked payments with low
      // confidence; relinking those is an operator decision, not ours.
      if payment.is_linked() {
        continue;
      }

      summary.total_processed += 1;
      match self.decide_and_commit(payment, &policy).await {
        Ok(LinkOutcome::Linked { .. }) => summary.linked += 1,
        Ok(LinkOutcome::NeedsReview { .. }) => summary.needs_review += 1,
        Err(e) => summary.errors.push(BatchError {
          payment_id: payment.payment_id,
          message:    e.to_string(),
        }),
      }

      if let Some(delay) = self.config.batch_throttle {
        if i + 1 < payments.len() {
          tokio::time::sleep(delay).await;
        }
      }
    }

    Ok(summary)
  }

  /// Clear a payment's linkage, returning it to the unresolved state.
  /// The audit trail keeps the full history; only the current association
  /// is removed.
  pub async fn unlink(&self, payment_id: Uuid, reason: Option<String>) -> Result<Payment> {
    let payment = self.require_payment(payment_id).await?;
    if !payment.is_linked() {
      return Err(Error::NotLinked(payment_id));
    }

    let commit = UnlinkCommit {
      payment_id,
      expected_allocation: payment.allocation_status,
      reason,
      weights_version: self.config.weights.version.clone(),
    };

    match self.store.commit_unlink(commit).await.map_err(Error::store)? {
      CommitOutcome::Committed((payment, _attempt)) => Ok(payment),
      CommitOutcome::Conflict { .. } => Err(Error::Conflict(payment_id)),
    }
  }

  // ── Internals ─────────────────────────────────────────────────────────

  async fn require_payment(&self, id: Uuid) -> Result<Payment> {
    self
      .store
      .get_payment(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::PaymentNotFound(id))
  }

  async fn ranked_candidates(&self, payment: &Payment) -> Result<Vec<ScoredCandidate>> {
    let contracts = self
      .store
      .candidate_contracts(payment.tenant_id)
      .await
      .map_err(Error::store)?;
    Ok(rank_candidates(payment, contracts, &self.config.weights))
  }

  fn validate_target(&self, payment: &Payment, contract: &Contract) -> Result<()> {
    if contract.tenant_id != payment.tenant_id {
      return Err(Error::TenantMismatch {
        payment:  payment.payment_id,
        contract: contract.contract_id,
      });
    }
    if !contract.is_linkable() {
      let reason = if contract.balance_due_cents <= 0 {
        "no outstanding balance".to_string()
      } else {
        format!("status is {:?}", contract.status)
      };
      return Err(Error::ContractNotLinkable {
        id: contract.contract_id,
        reason,
      });
    }
    Ok(())
  }

  async fn decide_and_commit(
    &self,
    payment: &Payment,
    policy: &AcceptancePolicy,
  ) -> Result<LinkOutcome> {
    let ranked = self.ranked_candidates(payment).await?;

    match policy.decide(ranked.clone()) {
      Decision::AutoLink { candidate } => {
        let notes = format!(
          "automatic link, confidence {}%: {}",
          percent(candidate.confidence),
          candidate.evidence.reason()
        );
        let attempt = self
          .commit(
            payment,
            &candidate.contract,
            candidate.confidence,
            notes,
            LinkingMethod::Automatic,
            &ranked,
          )
          .await?;
        Ok(LinkOutcome::Linked { attempt })
      }
      Decision::ManualReview { suggestions } => Ok(LinkOutcome::NeedsReview { suggestions }),
    }
  }

  /// The single commit routine both flows converge on.
  async fn commit(
    &self,
    payment: &Payment,
    contract: &Contract,
    confidence: f64,
    notes: String,
    method: LinkingMethod,
    ranked: &[ScoredCandidate],
  ) -> Result<LinkingAttempt> {
    let allocation = if confidence > FULL_ALLOCATION_THRESHOLD {
      AllocationStatus::FullyAllocated
    } else {
      AllocationStatus::PartiallyAllocated
    };

    let commit = LinkCommit {
      payment_id:          payment.payment_id,
      expected_allocation: payment.allocation_status,
      contract_id:         contract.contract_id,
      customer_id:         contract.customer_id,
      processing_status:   ProcessingStatus::Completed,
      allocation_status:   allocation,
      confidence,
      notes,
      method,
      candidates:          ranked.iter().map(ScoredCandidate::snapshot).collect(),
      weights_version:     self.config.weights.version.clone(),
    };

    match self.store.commit_link(commit).await.map_err(Error::store)? {
      CommitOutcome::Committed(attempt) => Ok(attempt),
      CommitOutcome::Conflict { .. } => Err(Error::Conflict(payment.payment_id)),
    }
  }
}

fn percent(confidence: f64) -> i64 { (confidence * 100.0).round() as i64 }

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
  };

  use chrono::{NaiveDate, Utc};
  use thiserror::Error;
  use uuid::Uuid;

  use super::*;
  use crate::{
    audit::LinkingAttempt,
    contract::{Contract, ContractStatus, NewContract},
    customer::{Customer, NewCustomer},
    payment::{NewPayment, Payment},
    store::{CommitOutcome, LedgerStore, LinkCommit, PaymentQuery, UnlinkCommit},
  };

  #[derive(Debug, Error)]
  enum MemError {
    #[error("injected store failure")]
    Injected,
  }

  #[derive(Default)]
  struct Inner {
    payments:  HashMap<Uuid, Payment>,
    contracts: HashMap<Uuid, Contract>,
    customers: HashMap<Uuid, Customer>,
    attempts:  Vec<LinkingAttempt>,
  }

  /// In-memory [`LedgerStore`] with injectable commit failures.
  #[derive(Clone, Default)]
  struct MemStore {
    inner:       Arc<Mutex<Inner>>,
    /// Payments whose commits fail with a store error.
    fail_on:     Arc<Mutex<Option<Uuid>>>,
    /// Payments whose commits report a CAS conflict.
    conflict_on: Arc<Mutex<Option<Uuid>>>,
  }

  impl LedgerStore for MemStore {
    type Error = MemError;

    async fn create_payment(&self, input: NewPayment) -> Result<Payment, MemError> {
      let payment = Payment {
        payment_id:         Uuid::new_v4(),
        tenant_id:          input.tenant_id,
        payment_number:     input.payment_number,
        amount_cents:       input.amount_cents,
        currency:           input.currency,
        payment_date:       input.payment_date,
        agreement_number:   input.agreement_number,
        reference_number:   input.reference_number,
        contract_id:        input.contract_id,
        customer_id:        input.customer_id,
        processing_status:  ProcessingStatus::Pending,
        allocation_status:  AllocationStatus::Unallocated,
        linking_confidence: None,
        processing_notes:   input.notes,
        created_at:         Utc::now(),
      };
      self
        .inner
        .lock()
        .unwrap()
        .payments
        .insert(payment.payment_id, payment.clone());
      Ok(payment)
    }

    async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>, MemError> {
      Ok(self.inner.lock().unwrap().payments.get(&id).cloned())
    }

    async fn list_payments(&self, query: &PaymentQuery) -> Result<Vec<Payment>, MemError> {
      let inner = self.inner.lock().unwrap();
      let mut out: Vec<Payment> = inner
        .payments
        .values()
        .filter(|p| query.tenant.is_none_or(|t| p.tenant_id == t))
        .filter(|p| {
          !query.pending_review
            || p.processing_status == ProcessingStatus::Pending
            || p.allocation_status == AllocationStatus::Unallocated
            || p.linking_confidence.is_some_and(|c| c < 0.5)
        })
        .cloned()
        .collect();
      // Deterministic order for the batch tests.
      out.sort_by(|a, b| a.payment_number.cmp(&b.payment_number));
      Ok(out)
    }

    async fn create_contract(&self, input: NewContract) -> Result<Contract, MemError> {
      let contract = Contract {
        contract_id:           Uuid::new_v4(),
        tenant_id:             input.tenant_id,
        contract_number:       input.contract_number,
        customer_id:           input.customer_id,
        periodic_amount_cents: input.periodic_amount_cents,
        currency:              input.currency,
        balance_due_cents:     input.balance_due_cents,
        status:                input.status,
        last_payment_date:     None,
        created_at:            Utc::now(),
      };
      self
        .inner
        .lock()
        .unwrap()
        .contracts
        .insert(contract.contract_id, contract.clone());
      Ok(contract)
    }

    async fn get_contract(&self, id: Uuid) -> Result<Option<Contract>, MemError> {
      Ok(self.inner.lock().unwrap().contracts.get(&id).cloned())
    }

    async fn list_contracts(&self, tenant: Uuid) -> Result<Vec<Contract>, MemError> {
      Ok(
        self
          .inner
          .lock()
          .unwrap()
          .contracts
          .values()
          .filter(|c| c.tenant_id == tenant)
          .cloned()
          .collect(),
      )
    }

    async fn candidate_contracts(&self, tenant: Uuid) -> Result<Vec<Contract>, MemError> {
      let mut out: Vec<Contract> = self
        .inner
        .lock()
        .unwrap()
        .contracts
        .values()
        .filter(|c| c.tenant_id == tenant && c.is_linkable())
        .cloned()
        .collect();
      out.sort_by_key(|c| c.contract_id);
      Ok(out)
    }

    async fn create_customer(&self, input: NewCustomer) -> Result<Customer, MemError> {
      let customer = Customer {
        customer_id: Uuid::new_v4(),
        tenant_id:   input.tenant_id,
        name:        input.name,
        created_at:  Utc::now(),
      };
      self
        .inner
        .lock()
        .unwrap()
        .customers
        .insert(customer.customer_id, customer.clone());
      Ok(customer)
    }

    async fn get_customer(&self, id: Uuid) -> Result<Option<Customer>, MemError> {
      Ok(self.inner.lock().unwrap().customers.get(&id).cloned())
    }

    async fn commit_link(
      &self,
      commit: LinkCommit,
    ) -> Result<CommitOutcome<LinkingAttempt>, MemError> {
      if *self.fail_on.lock().unwrap() == Some(commit.payment_id) {
        return Err(MemError::Injected);
      }
      if *self.conflict_on.lock().unwrap() == Some(commit.payment_id) {
        return Ok(CommitOutcome::Conflict {
          current: AllocationStatus::PartiallyAllocated,
        });
      }

      let mut inner = self.inner.lock().unwrap();
      let payment_date = {
        let payment = inner.payments.get_mut(&commit.payment_id).unwrap();
        if payment.allocation_status != commit.expected_allocation {
          return Ok(CommitOutcome::Conflict {
            current: payment.allocation_status,
          });
        }
        payment.contract_id = Some(commit.contract_id);
        payment.customer_id = Some(commit.customer_id);
        payment.processing_status = commit.processing_status;
        payment.allocation_status = commit.allocation_status;
        payment.linking_confidence = Some(commit.confidence);
        payment.processing_notes = Some(commit.notes.clone());
        payment.payment_date
      };

      if let Some(contract) = inner.contracts.get_mut(&commit.contract_id) {
        contract.last_payment_date = Some(payment_date);
      }

      let attempt = LinkingAttempt {
        attempt_id:      Uuid::new_v4(),
        payment_id:      commit.payment_id,
        contract_id:     Some(commit.contract_id),
        confidence:      commit.confidence,
        method:          commit.method,
        candidates:      commit.candidates,
        weights_version: commit.weights_version,
        notes:           Some(commit.notes),
        recorded_at:     Utc::now(),
      };
      inner.attempts.push(attempt.clone());
      Ok(CommitOutcome::Committed(attempt))
    }

    async fn commit_unlink(
      &self,
      commit: UnlinkCommit,
    ) -> Result<CommitOutcome<(Payment, LinkingAttempt)>, MemError> {
      let mut inner = self.inner.lock().unwrap();
      let payment = inner.payments.get_mut(&commit.payment_id).unwrap();
      if payment.allocation_status != commit.expected_allocation {
        return Ok(CommitOutcome::Conflict {
          current: payment.allocation_status,
        });
      }
      payment.contract_id = None;
      payment.customer_id = None;
      payment.processing_status = ProcessingStatus::Pending;
      payment.allocation_status = AllocationStatus::Unallocated;
      payment.linking_confidence = None;
      payment.processing_notes = commit.reason.clone();
      let updated = payment.clone();

      let attempt = LinkingAttempt {
        attempt_id:      Uuid::new_v4(),
        payment_id:      commit.payment_id,
        contract_id:     None,
        confidence:      0.0,
        method:          LinkingMethod::Manual,
        candidates:      Vec::new(),
        weights_version: commit.weights_version,
        notes:           commit.reason,
        recorded_at:     Utc::now(),
      };
      inner.attempts.push(attempt.clone());
      Ok(CommitOutcome::Committed((updated, attempt)))
    }

    async fn list_attempts(&self, payment_id: Uuid) -> Result<Vec<LinkingAttempt>, MemError> {
      Ok(
        self
          .inner
          .lock()
          .unwrap()
          .attempts
          .iter()
          .filter(|a| a.payment_id == payment_id)
          .cloned()
          .collect(),
      )
    }
  }

  // ── Fixtures ──────────────────────────────────────────────────────────

  fn date() -> NaiveDate { NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() }

  async fn seed_contract(
    store: &MemStore,
    tenant: Uuid,
    number: &str,
    periodic_cents: i64,
  ) -> Contract {
    let customer = store
      .create_customer(NewCustomer {
        tenant_id: tenant,
        name:      crate::customer::CustomerName::Corporate {
          company: "Acme Motors".into(),
        },
      })
      .await
      .unwrap();
    store
      .create_contract(NewContract {
        tenant_id:             tenant,
        contract_number:       number.into(),
        customer_id:           customer.customer_id,
        periodic_amount_cents: periodic_cents,
        currency:              "KWD".into(),
        balance_due_cents:     periodic_cents * 3,
        status:                ContractStatus::Active,
      })
      .await
      .unwrap()
  }

  async fn seed_payment(store: &MemStore, tenant: Uuid, input: NewPayment) -> Payment {
    let mut input = input;
    input.tenant_id = tenant;
    store.create_payment(input).await.unwrap()
  }

  fn strong_payment(tenant: Uuid, number: &str) -> NewPayment {
    // Scenario A shape: exact amount + agreement substring + reference.
    let mut p = NewPayment::new(tenant, number, 50_000, "KWD", date());
    p.agreement_number = Some("AGR-100".into());
    p.reference_number = Some("REF-9".into());
    p
  }

  // ── Manual linking ────────────────────────────────────────────────────

  #[tokio::test]
  async fn manual_link_updates_payment_and_writes_audit() {
    let store = MemStore::default();
    let tenant = Uuid::new_v4();
    let contract = seed_contract(&store, tenant, "AGR-100-2024", 50_000).await;
    let payment = seed_payment(&store, tenant, strong_payment(tenant, "PAY-1")).await;

    let engine = LinkingEngine::new(store.clone());
    let attempt = engine
      .link_manually(payment.payment_id, contract.contract_id, None)
      .await
      .unwrap();

    assert_eq!(attempt.payment_id, payment.payment_id);
    assert_eq!(attempt.contract_id, Some(contract.contract_id));
    assert_eq!(attempt.confidence, 1.0);
    assert!(matches!(attempt.method, LinkingMethod::Manual));
    assert!(!attempt.candidates.is_empty());

    let updated = store.get_payment(payment.payment_id).await.unwrap().unwrap();
    assert_eq!(updated.contract_id, Some(contract.contract_id));
    assert_eq!(updated.customer_id, Some(contract.customer_id));
    assert_eq!(updated.processing_status, ProcessingStatus::Completed);
    assert_eq!(updated.allocation_status, AllocationStatus::FullyAllocated);
    assert_eq!(updated.linking_confidence, Some(1.0));

    // Exactly one audit row per committed link.
    let attempts = store.list_attempts(payment.payment_id).await.unwrap();
    assert_eq!(attempts.len(), 1);

    // Contract bookkeeping was touched.
    let c = store.get_contract(contract.contract_id).await.unwrap().unwrap();
    assert_eq!(c.last_payment_date, Some(payment.payment_date));
  }

  #[tokio::test]
  async fn fully_allocated_always_has_an_association() {
    let store = MemStore::default();
    let tenant = Uuid::new_v4();
    let contract = seed_contract(&store, tenant, "AGR-100-2024", 50_000).await;
    let payment = seed_payment(&store, tenant, strong_payment(tenant, "PAY-1")).await;

    let engine = LinkingEngine::new(store.clone());
    engine
      .link_manually(payment.payment_id, contract.contract_id, None)
      .await
      .unwrap();

    let updated = store.get_payment(payment.payment_id).await.unwrap().unwrap();
    if updated.allocation_status == AllocationStatus::FullyAllocated {
      assert!(updated.contract_id.is_some());
    }
  }

  #[tokio::test]
  async fn mid_confidence_link_is_partially_allocated() {
    let store = MemStore::default();
    let tenant = Uuid::new_v4();
    // Close amount only: 0.3 + 0.2 = 0.5, below the 0.8 allocation cut.
    let contract = seed_contract(&store, tenant, "C-7", 50_000).await;
    let payment = seed_payment(
      &store,
      tenant,
      NewPayment::new(tenant, "PAY-2", 48_000, "KWD", date()),
    )
    .await;

    let engine = LinkingEngine::new(store.clone());
    let attempt = engine
      .link_manually(payment.payment_id, contract.contract_id, None)
      .await
      .unwrap();
    assert!((attempt.confidence - 0.5).abs() < 1e-9);

    let updated = store.get_payment(payment.payment_id).await.unwrap().unwrap();
    assert_eq!(
      updated.allocation_status,
      AllocationStatus::PartiallyAllocated
    );
  }

  #[tokio::test]
  async fn manual_link_rejects_cross_tenant_contract() {
    let store = MemStore::default();
    let tenant = Uuid::new_v4();
    let other = Uuid::new_v4();
    let contract = seed_contract(&store, other, "AGR-1", 50_000).await;
    let payment = seed_payment(&store, tenant, strong_payment(tenant, "PAY-1")).await;

    let engine = LinkingEngine::new(store);
    let err = engine
      .link_manually(payment.payment_id, contract.contract_id, None)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::TenantMismatch { .. }));
  }

  #[tokio::test]
  async fn manual_link_rejects_already_linked_payment() {
    let store = MemStore::default();
    let tenant = Uuid::new_v4();
    let contract = seed_contract(&store, tenant, "AGR-100-2024", 50_000).await;
    let payment = seed_payment(&store, tenant, strong_payment(tenant, "PAY-1")).await;

    let engine = LinkingEngine::new(store);
    engine
      .link_manually(payment.payment_id, contract.contract_id, None)
      .await
      .unwrap();
    let err = engine
      .link_manually(payment.payment_id, contract.contract_id, None)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::AlreadyLinked(_)));
  }

  #[tokio::test]
  async fn manual_link_rejects_exhausted_contract() {
    let store = MemStore::default();
    let tenant = Uuid::new_v4();
    let customer = store
      .create_customer(NewCustomer {
        tenant_id: tenant,
        name:      crate::customer::CustomerName::Individual {
          first: "Alice".into(),
          last:  "Liddell".into(),
        },
      })
      .await
      .unwrap();
    let contract = store
      .create_contract(NewContract {
        tenant_id:             tenant,
        contract_number:       "C-0".into(),
        customer_id:           customer.customer_id,
        periodic_amount_cents: 50_000,
        currency:              "KWD".into(),
        balance_due_cents:     0,
        status:                ContractStatus::Active,
      })
      .await
      .unwrap();
    let payment = seed_payment(&store, tenant, strong_payment(tenant, "PAY-1")).await;

    let engine = LinkingEngine::new(store);
    let err = engine
      .link_manually(payment.payment_id, contract.contract_id, None)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::ContractNotLinkable { .. }));
  }

  #[tokio::test]
  async fn missing_payment_is_not_found() {
    let engine = LinkingEngine::new(MemStore::default());
    let err = engine.score_candidates(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, Error::PaymentNotFound(_)));
  }

  // ── Automatic linking ─────────────────────────────────────────────────

  #[tokio::test]
  async fn auto_link_commits_top_candidate() {
    let store = MemStore::default();
    let tenant = Uuid::new_v4();
    let strong = seed_contract(&store, tenant, "AGR-100-2024", 50_000).await;
    seed_contract(&store, tenant, "C-OTHER", 999_999).await;
    let payment = seed_payment(&store, tenant, strong_payment(tenant, "PAY-1")).await;

    let engine = LinkingEngine::new(store.clone());
    let outcome = engine.link_automatically(payment.payment_id).await.unwrap();

    match outcome {
      LinkOutcome::Linked { attempt } => {
        assert_eq!(attempt.contract_id, Some(strong.contract_id));
        assert!(matches!(attempt.method, LinkingMethod::Automatic));
        // The audit row records every candidate considered.
        assert_eq!(attempt.candidates.len(), 2);
      }
      LinkOutcome::NeedsReview { .. } => panic!("expected auto link"),
    }
  }

  #[tokio::test]
  async fn low_confidence_routes_to_review_and_commits_nothing() {
    let store = MemStore::default();
    let tenant = Uuid::new_v4();
    // Scenario B: close amount only scores 0.5, below the 0.8 default.
    seed_contract(&store, tenant, "C-7", 50_000).await;
    let payment = seed_payment(
      &store,
      tenant,
      NewPayment::new(tenant, "PAY-1", 48_000, "KWD", date()),
    )
    .await;

    let engine = LinkingEngine::new(store.clone());
    let outcome = engine.link_automatically(payment.payment_id).await.unwrap();

    match outcome {
      LinkOutcome::NeedsReview { suggestions } => {
        assert_eq!(suggestions.len(), 1);
        assert!((suggestions[0].confidence - 0.5).abs() < 1e-9);
      }
      LinkOutcome::Linked { .. } => panic!("expected review"),
    }

    let untouched = store.get_payment(payment.payment_id).await.unwrap().unwrap();
    assert!(untouched.contract_id.is_none());
    assert_eq!(untouched.allocation_status, AllocationStatus::Unallocated);
    assert!(store.list_attempts(payment.payment_id).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn empty_candidate_set_is_review_with_no_suggestions() {
    let store = MemStore::default();
    let tenant = Uuid::new_v4();
    let payment = seed_payment(&store, tenant, strong_payment(tenant, "PAY-1")).await;

    let engine = LinkingEngine::new(store);
    let outcome = engine.link_automatically(payment.payment_id).await.unwrap();
    match outcome {
      LinkOutcome::NeedsReview { suggestions } => assert!(suggestions.is_empty()),
      LinkOutcome::Linked { .. } => panic!("expected review"),
    }
  }

  #[tokio::test]
  async fn conflict_surfaces_as_error() {
    let store = MemStore::default();
    let tenant = Uuid::new_v4();
    let contract = seed_contract(&store, tenant, "AGR-100-2024", 50_000).await;
    let payment = seed_payment(&store, tenant, strong_payment(tenant, "PAY-1")).await;
    *store.conflict_on.lock().unwrap() = Some(payment.payment_id);

    let engine = LinkingEngine::new(store);
    let err = engine
      .link_manually(payment.payment_id, contract.contract_id, None)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
  }

  // ── Batch driver ──────────────────────────────────────────────────────

  #[tokio::test]
  async fn batch_isolates_a_failing_payment() {
    let store = MemStore::default();
    let tenant = Uuid::new_v4();
    seed_contract(&store, tenant, "AGR-100-2024", 50_000).await;

    let p1 = seed_payment(&store, tenant, strong_payment(tenant, "PAY-1")).await;
    let p2 = seed_payment(&store, tenant, strong_payment(tenant, "PAY-2")).await;
    let p3 = seed_payment(&store, tenant, strong_payment(tenant, "PAY-3")).await;
    // Poison the middle payment's commit.
    *store.fail_on.lock().unwrap() = Some(p2.payment_id);

    let engine = LinkingEngine::new(store.clone());
    let summary = engine.auto_link_all(tenant, None).await.unwrap();

    assert_eq!(summary.total_processed, 3);
    assert_eq!(summary.linked, 2);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].payment_id, p2.payment_id);

    // The other two really were linked.
    for id in [p1.payment_id, p3.payment_id] {
      let p = store.get_payment(id).await.unwrap().unwrap();
      assert!(p.is_linked());
    }
    let poisoned = store.get_payment(p2.payment_id).await.unwrap().unwrap();
    assert!(!poisoned.is_linked());
  }

  #[tokio::test]
  async fn batch_respects_min_confidence_override() {
    let store = MemStore::default();
    let tenant = Uuid::new_v4();
    // Close-amount-only candidates score 0.5.
    seed_contract(&store, tenant, "C-7", 50_000).await;
    seed_payment(
      &store,
      tenant,
      NewPayment::new(tenant, "PAY-1", 48_000, "KWD", date()),
    )
    .await;

    let engine = LinkingEngine::new(store.clone());

    // Strict run: nothing links.
    let strict = engine.auto_link_all(tenant, Some(0.6)).await.unwrap();
    assert_eq!(strict.linked, 0);
    assert_eq!(strict.needs_review, 1);

    // Loose run: the 0.5 candidate clears a 0.5 threshold.
    let loose = engine.auto_link_all(tenant, Some(0.5)).await.unwrap();
    assert_eq!(loose.linked, 1);
  }

  #[tokio::test]
  async fn batch_skips_already_linked_payments() {
    let store = MemStore::default();
    let tenant = Uuid::new_v4();
    let contract = seed_contract(&store, tenant, "AGR-100-2024", 50_000).await;
    let linked = seed_payment(&store, tenant, strong_payment(tenant, "PAY-1")).await;
    seed_payment(&store, tenant, strong_payment(tenant, "PAY-2")).await;

    let engine = LinkingEngine::new(store.clone());
    engine
      .link_manually(linked.payment_id, contract.contract_id, None)
      .await
      .unwrap();

    let summary = engine.auto_link_all(tenant, None).await.unwrap();
    assert_eq!(summary.total_processed, 1);
    assert_eq!(summary.linked, 1);
  }

  // ── Unlink ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn unlink_returns_payment_to_unresolved() {
    let store = MemStore::default();
    let tenant = Uuid::new_v4();
    let contract = seed_contract(&store, tenant, "AGR-100-2024", 50_000).await;
    let payment = seed_payment(&store, tenant, strong_payment(tenant, "PAY-1")).await;

    let engine = LinkingEngine::new(store.clone());
    engine
      .link_manually(payment.payment_id, contract.contract_id, None)
      .await
      .unwrap();

    let unlinked = engine
      .unlink(payment.payment_id, Some("operator correction".into()))
      .await
      .unwrap();
    assert!(unlinked.contract_id.is_none());
    assert_eq!(unlinked.processing_status, ProcessingStatus::Pending);
    assert_eq!(unlinked.allocation_status, AllocationStatus::Unallocated);
    assert_eq!(unlinked.linking_confidence, None);

    // History keeps both decisions.
    let attempts = store.list_attempts(payment.payment_id).await.unwrap();
    assert_eq!(attempts.len(), 2);
    assert!(attempts.last().unwrap().contract_id.is_none());
  }

  #[tokio::test]
  async fn unlink_requires_a_linked_payment() {
    let store = MemStore::default();
    let tenant = Uuid::new_v4();
    let payment = seed_payment(&store, tenant, strong_payment(tenant, "PAY-1")).await;

    let engine = LinkingEngine::new(store);
    let err = engine.unlink(payment.payment_id, None).await.unwrap_err();
    assert!(matches!(err, Error::NotLinked(_)));
  }
}
