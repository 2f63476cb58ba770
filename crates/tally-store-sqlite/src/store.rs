//! [`SqliteStore`] — the SQLite implementation of [`LedgerStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use tally_core::{
  audit::LinkingAttempt,
  contract::{Contract, NewContract},
  customer::{Customer, NewCustomer},
  payment::{AllocationStatus, NewPayment, Payment, ProcessingStatus},
  store::{CommitOutcome, LedgerStore, LinkCommit, PaymentQuery, UnlinkCommit},
};

use crate::{
  Error, Result,
  encode::{
    RawAttempt, RawContract, RawCustomer, RawPayment, decode_allocation_status,
    encode_allocation_status, encode_candidates, encode_contract_status,
    encode_customer_name, encode_date, encode_dt, encode_method,
    encode_processing_status, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Raw commit results ──────────────────────────────────────────────────────

/// What happened inside the link transaction, before decoding.
enum RawLinkResult {
  Committed,
  /// The CAS guard missed; holds the payment's current allocation status.
  Conflict(String),
  Missing,
}

enum RawUnlinkResult {
  Committed(RawPayment),
  Conflict(String),
  Missing,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tally ledger store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── LedgerStore impl ────────────────────────────────────────────────────────

impl LedgerStore for SqliteStore {
  type Error = Error;

  // ── Payments ──────────────────────────────────────────────────────────────

  async fn create_payment(&self, input: NewPayment) -> Result<Payment> {
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

    let id_str          = encode_uuid(payment.payment_id);
    let tenant_str      = encode_uuid(payment.tenant_id);
    let number          = payment.payment_number.clone();
    let amount          = payment.amount_cents;
    let currency        = payment.currency.clone();
    let date_str        = encode_date(payment.payment_date);
    let agreement       = payment.agreement_number.clone();
    let reference       = payment.reference_number.clone();
    let contract_str    = payment.contract_id.map(encode_uuid);
    let customer_str    = payment.customer_id.map(encode_uuid);
    let processing_str  = encode_processing_status(payment.processing_status).to_owned();
    let allocation_str  = encode_allocation_status(payment.allocation_status).to_owned();
    let notes           = payment.processing_notes.clone();
    let created_at_str  = encode_dt(payment.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO payments (
             payment_id, tenant_id, payment_number, amount_cents, currency,
             payment_date, agreement_number, reference_number, contract_id,
             customer_id, processing_status, allocation_status,
             linking_confidence, processing_notes, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, NULL, ?13, ?14)",
          rusqlite::params![
            id_str,
            tenant_str,
            number,
            amount,
            currency,
            date_str,
            agreement,
            reference,
            contract_str,
            customer_str,
            processing_str,
            allocation_str,
            notes,
            created_at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(payment)
  }

  async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>> {
    let id_str = encode_uuid(id);
    let sql = format!(
      "SELECT {} FROM payments WHERE payment_id = ?1",
      RawPayment::COLUMNS
    );

    let raw: Option<RawPayment> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawPayment::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPayment::into_payment).transpose()
  }

  async fn list_payments(&self, query: &PaymentQuery) -> Result<Vec<Payment>> {
    let tenant_str     = query.tenant.map(encode_uuid);
    let processing_str = query
      .processing_status
      .map(|s| encode_processing_status(s).to_owned());
    let allocation_str = query
      .allocation_status
      .map(|s| encode_allocation_status(s).to_owned());
    let max_confidence = query.max_confidence;
    let pending_review = query.pending_review;
    // Negative LIMIT means unbounded in SQLite; no pagination is imposed
    // beyond what the caller asks for.
    let limit_val      = query.limit.map(|l| l as i64).unwrap_or(-1);
    let offset_val     = query.offset.unwrap_or(0) as i64;

    let raws: Vec<RawPayment> = self
      .conn
      .call(move |conn| {
        let mut conds: Vec<&'static str> = vec![];
        if tenant_str.is_some() {
          conds.push("tenant_id = ?1");
        }
        if processing_str.is_some() {
          conds.push("processing_status = ?2");
        }
        if allocation_str.is_some() {
          conds.push("allocation_status = ?3");
        }
        if max_confidence.is_some() {
          conds.push("linking_confidence < ?4");
        }
        if pending_review {
          conds.push(
            "(processing_status = 'pending' \
              OR allocation_status = 'unallocated' \
              OR linking_confidence < 0.5)",
          );
        }

        let where_clause = if conds.is_empty() {
          String::new()
        } else {
          format!("WHERE {}", conds.join(" AND "))
        };

        let sql = format!(
          "SELECT {} FROM payments
           {where_clause}
           ORDER BY payment_date DESC, payment_number
           LIMIT ?5 OFFSET ?6",
          RawPayment::COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![
              tenant_str.as_deref(),
              processing_str.as_deref(),
              allocation_str.as_deref(),
              max_confidence,
              limit_val,
              offset_val,
            ],
            RawPayment::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPayment::into_payment).collect()
  }

  // ── Contracts ─────────────────────────────────────────────────────────────

  async fn create_contract(&self, input: NewContract) -> Result<Contract> {
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

    let id_str         = encode_uuid(contract.contract_id);
    let tenant_str     = encode_uuid(contract.tenant_id);
    let number         = contract.contract_number.clone();
    let customer_str   = encode_uuid(contract.customer_id);
    let periodic       = contract.periodic_amount_cents;
    let currency       = contract.currency.clone();
    let balance        = contract.balance_due_cents;
    let status_str     = encode_contract_status(contract.status).to_owned();
    let created_at_str = encode_dt(contract.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO contracts (
             contract_id, tenant_id, contract_number, customer_id,
             periodic_amount_cents, currency, balance_due_cents, status,
             last_payment_date, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9)",
          rusqlite::params![
            id_str,
            tenant_str,
            number,
            customer_str,
            periodic,
            currency,
            balance,
            status_str,
            created_at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(contract)
  }

  async fn get_contract(&self, id: Uuid) -> Result<Option<Contract>> {
    let id_str = encode_uuid(id);
    let sql = format!(
      "SELECT {} FROM contracts WHERE contract_id = ?1",
      RawContract::COLUMNS
    );

    let raw: Option<RawContract> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawContract::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawContract::into_contract).transpose()
  }

  async fn list_contracts(&self, tenant: Uuid) -> Result<Vec<Contract>> {
    let tenant_str = encode_uuid(tenant);
    let sql = format!(
      "SELECT {} FROM contracts WHERE tenant_id = ?1 ORDER BY contract_id",
      RawContract::COLUMNS
    );

    let raws: Vec<RawContract> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![tenant_str], RawContract::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawContract::into_contract).collect()
  }

  async fn candidate_contracts(&self, tenant: Uuid) -> Result<Vec<Contract>> {
    let tenant_str = encode_uuid(tenant);
    // The candidate filter: active, with outstanding balance, same tenant.
    // Ordered by contract id so repeated runs rank ties identically.
    let sql = format!(
      "SELECT {} FROM contracts
       WHERE tenant_id = ?1 AND status = 'active' AND balance_due_cents > 0
       ORDER BY contract_id",
      RawContract::COLUMNS
    );

    let raws: Vec<RawContract> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![tenant_str], RawContract::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawContract::into_contract).collect()
  }

  // ── Customers ─────────────────────────────────────────────────────────────

  async fn create_customer(&self, input: NewCustomer) -> Result<Customer> {
    let customer = Customer {
      customer_id: Uuid::new_v4(),
      tenant_id:   input.tenant_id,
      name:        input.name,
      created_at:  Utc::now(),
    };

    let id_str         = encode_uuid(customer.customer_id);
    let tenant_str     = encode_uuid(customer.tenant_id);
    let name_json      = encode_customer_name(&customer.name)?;
    let created_at_str = encode_dt(customer.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO customers (customer_id, tenant_id, name_json, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, tenant_str, name_json, created_at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(customer)
  }

  async fn get_customer(&self, id: Uuid) -> Result<Option<Customer>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawCustomer> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT customer_id, tenant_id, name_json, created_at
               FROM customers WHERE customer_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawCustomer {
                  customer_id: row.get(0)?,
                  tenant_id:   row.get(1)?,
                  name_json:   row.get(2)?,
                  created_at:  row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCustomer::into_customer).transpose()
  }

  // ── Linking commits ───────────────────────────────────────────────────────

  async fn commit_link(&self, commit: LinkCommit) -> Result<CommitOutcome<LinkingAttempt>> {
    // The attempt is fully built up front; the transaction either persists
    // exactly this record or nothing at all.
    let attempt = LinkingAttempt {
      attempt_id:      Uuid::new_v4(),
      payment_id:      commit.payment_id,
      contract_id:     Some(commit.contract_id),
      confidence:      commit.confidence,
      method:          commit.method,
      candidates:      commit.candidates.clone(),
      weights_version: commit.weights_version.clone(),
      notes:           Some(commit.notes.clone()),
      recorded_at:     Utc::now(),
    };

    let payment_id_str  = encode_uuid(commit.payment_id);
    let contract_id_str = encode_uuid(commit.contract_id);
    let customer_id_str = encode_uuid(commit.customer_id);
    let processing_str  = encode_processing_status(commit.processing_status).to_owned();
    let allocation_str  = encode_allocation_status(commit.allocation_status).to_owned();
    let expected_str    = encode_allocation_status(commit.expected_allocation).to_owned();
    let confidence      = commit.confidence;
    let notes           = commit.notes;
    let attempt_id_str  = encode_uuid(attempt.attempt_id);
    let method_str      = encode_method(commit.method).to_owned();
    let candidates_json = encode_candidates(&commit.candidates)?;
    let weights_version = commit.weights_version;
    let recorded_at_str = encode_dt(attempt.recorded_at);

    let raw: RawLinkResult = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // CAS guard: the write only lands if the allocation status is still
        // what the engine read. Zero rows means missing or concurrently
        // modified; distinguish below. Dropping the transaction on the
        // early-return path rolls everything back.
        let n = tx.execute(
          "UPDATE payments SET
             contract_id = ?1, customer_id = ?2, processing_status = ?3,
             allocation_status = ?4, linking_confidence = ?5,
             processing_notes = ?6
           WHERE payment_id = ?7 AND allocation_status = ?8",
          rusqlite::params![
            contract_id_str,
            customer_id_str,
            processing_str,
            allocation_str,
            confidence,
            notes,
            payment_id_str,
            expected_str,
          ],
        )?;

        if n == 0 {
          let current: Option<String> = tx
            .query_row(
              "SELECT allocation_status FROM payments WHERE payment_id = ?1",
              rusqlite::params![payment_id_str],
              |r| r.get(0),
            )
            .optional()?;
          return Ok(match current {
            Some(status) => RawLinkResult::Conflict(status),
            None => RawLinkResult::Missing,
          });
        }

        let payment_date: String = tx.query_row(
          "SELECT payment_date FROM payments WHERE payment_id = ?1",
          rusqlite::params![payment_id_str],
          |r| r.get(0),
        )?;
        tx.execute(
          "UPDATE contracts SET last_payment_date = ?1 WHERE contract_id = ?2",
          rusqlite::params![payment_date, contract_id_str],
        )?;

        tx.execute(
          "INSERT INTO linking_attempts (
             attempt_id, payment_id, contract_id, confidence, method,
             candidates, weights_version, notes, recorded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            attempt_id_str,
            payment_id_str,
            contract_id_str,
            confidence,
            method_str,
            candidates_json,
            weights_version,
            notes,
            recorded_at_str,
          ],
        )?;

        tx.commit()?;
        Ok(RawLinkResult::Committed)
      })
      .await?;

    match raw {
      RawLinkResult::Committed => Ok(CommitOutcome::Committed(attempt)),
      RawLinkResult::Conflict(status) => Ok(CommitOutcome::Conflict {
        current: decode_allocation_status(&status)?,
      }),
      RawLinkResult::Missing => Err(Error::PaymentNotFound(commit.payment_id)),
    }
  }

  async fn commit_unlink(
    &self,
    commit: UnlinkCommit,
  ) -> Result<CommitOutcome<(Payment, LinkingAttempt)>> {
    let attempt_id = Uuid::new_v4();
    let recorded_at = Utc::now();

    let payment_id_str  = encode_uuid(commit.payment_id);
    let expected_str    = encode_allocation_status(commit.expected_allocation).to_owned();
    let reason          = commit.reason.clone();
    let attempt_id_str  = encode_uuid(attempt_id);
    let weights_version = commit.weights_version.clone();
    let recorded_at_str = encode_dt(recorded_at);
    let select_sql = format!(
      "SELECT {} FROM payments WHERE payment_id = ?1",
      RawPayment::COLUMNS
    );

    let raw: RawUnlinkResult = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let n = tx.execute(
          "UPDATE payments SET
             contract_id = NULL, customer_id = NULL,
             processing_status = 'pending', allocation_status = 'unallocated',
             linking_confidence = NULL, processing_notes = ?1
           WHERE payment_id = ?2 AND allocation_status = ?3",
          rusqlite::params![reason, payment_id_str, expected_str],
        )?;

        if n == 0 {
          let current: Option<String> = tx
            .query_row(
              "SELECT allocation_status FROM payments WHERE payment_id = ?1",
              rusqlite::params![payment_id_str],
              |r| r.get(0),
            )
            .optional()?;
          return Ok(match current {
            Some(status) => RawUnlinkResult::Conflict(status),
            None => RawUnlinkResult::Missing,
          });
        }

        let updated = tx.query_row(
          &select_sql,
          rusqlite::params![payment_id_str],
          RawPayment::from_row,
        )?;

        tx.execute(
          "INSERT INTO linking_attempts (
             attempt_id, payment_id, contract_id, confidence, method,
             candidates, weights_version, notes, recorded_at
           ) VALUES (?1, ?2, NULL, 0.0, 'manual', '[]', ?3, ?4, ?5)",
          rusqlite::params![
            attempt_id_str,
            payment_id_str,
            weights_version,
            reason,
            recorded_at_str,
          ],
        )?;

        tx.commit()?;
        Ok(RawUnlinkResult::Committed(updated))
      })
      .await?;

    match raw {
      RawUnlinkResult::Committed(raw_payment) => {
        let payment = raw_payment.into_payment()?;
        let attempt = LinkingAttempt {
          attempt_id,
          payment_id: commit.payment_id,
          contract_id: None,
          confidence: 0.0,
          method: tally_core::audit::LinkingMethod::Manual,
          candidates: Vec::new(),
          weights_version: commit.weights_version,
          notes: commit.reason,
          recorded_at,
        };
        Ok(CommitOutcome::Committed((payment, attempt)))
      }
      RawUnlinkResult::Conflict(status) => Ok(CommitOutcome::Conflict {
        current: decode_allocation_status(&status)?,
      }),
      RawUnlinkResult::Missing => Err(Error::PaymentNotFound(commit.payment_id)),
    }
  }

  async fn list_attempts(&self, payment_id: Uuid) -> Result<Vec<LinkingAttempt>> {
    let id_str = encode_uuid(payment_id);
    let sql = format!(
      "SELECT {} FROM linking_attempts
       WHERE payment_id = ?1
       ORDER BY recorded_at, attempt_id",
      RawAttempt::COLUMNS
    );

    let raws: Vec<RawAttempt> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawAttempt::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAttempt::into_attempt).collect()
  }
}
