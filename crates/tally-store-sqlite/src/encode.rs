//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings, dates as `YYYY-MM-DD`.
//! Status enums are stored as their serde snake_case strings. Candidate
//! snapshots and customer names are stored as compact JSON. UUIDs are stored
//! as hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, Utc};
use tally_core::{
  audit::{CandidateSnapshot, LinkingAttempt, LinkingMethod},
  contract::{Contract, ContractStatus},
  customer::{Customer, CustomerName},
  payment::{AllocationStatus, Payment, ProcessingStatus},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> / NaiveDate ───────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Status enums ────────────────────────────────────────────────────────────

pub fn encode_processing_status(s: ProcessingStatus) -> &'static str {
  match s {
    ProcessingStatus::Pending => "pending",
    ProcessingStatus::Processing => "processing",
    ProcessingStatus::Completed => "completed",
    ProcessingStatus::Failed => "failed",
  }
}

pub fn decode_processing_status(s: &str) -> Result<ProcessingStatus> {
  match s {
    "pending" => Ok(ProcessingStatus::Pending),
    "processing" => Ok(ProcessingStatus::Processing),
    "completed" => Ok(ProcessingStatus::Completed),
    "failed" => Ok(ProcessingStatus::Failed),
    other => Err(Error::Decode(format!("unknown processing status: {other:?}"))),
  }
}

pub fn encode_allocation_status(s: AllocationStatus) -> &'static str {
  match s {
    AllocationStatus::Unallocated => "unallocated",
    AllocationStatus::PartiallyAllocated => "partially_allocated",
    AllocationStatus::FullyAllocated => "fully_allocated",
  }
}

pub fn decode_allocation_status(s: &str) -> Result<AllocationStatus> {
  match s {
    "unallocated" => Ok(AllocationStatus::Unallocated),
    "partially_allocated" => Ok(AllocationStatus::PartiallyAllocated),
    "fully_allocated" => Ok(AllocationStatus::FullyAllocated),
    other => Err(Error::Decode(format!("unknown allocation status: {other:?}"))),
  }
}

pub fn encode_contract_status(s: ContractStatus) -> &'static str {
  match s {
    ContractStatus::Active => "active",
    ContractStatus::Pending => "pending",
    ContractStatus::UnderLegalProcedure => "under_legal_procedure",
    ContractStatus::Suspended => "suspended",
    ContractStatus::Closed => "closed",
  }
}

pub fn decode_contract_status(s: &str) -> Result<ContractStatus> {
  match s {
    "active" => Ok(ContractStatus::Active),
    "pending" => Ok(ContractStatus::Pending),
    "under_legal_procedure" => Ok(ContractStatus::UnderLegalProcedure),
    "suspended" => Ok(ContractStatus::Suspended),
    "closed" => Ok(ContractStatus::Closed),
    other => Err(Error::Decode(format!("unknown contract status: {other:?}"))),
  }
}

pub fn encode_method(m: LinkingMethod) -> &'static str {
  match m {
    LinkingMethod::Manual => "manual",
    LinkingMethod::Automatic => "automatic",
  }
}

pub fn decode_method(s: &str) -> Result<LinkingMethod> {
  match s {
    "manual" => Ok(LinkingMethod::Manual),
    "automatic" => Ok(LinkingMethod::Automatic),
    other => Err(Error::Decode(format!("unknown linking method: {other:?}"))),
  }
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_customer_name(name: &CustomerName) -> Result<String> {
  Ok(serde_json::to_string(name)?)
}

pub fn decode_customer_name(s: &str) -> Result<CustomerName> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_candidates(candidates: &[CandidateSnapshot]) -> Result<String> {
  Ok(serde_json::to_string(candidates)?)
}

pub fn decode_candidates(s: &str) -> Result<Vec<CandidateSnapshot>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `payments` row.
pub struct RawPayment {
  pub payment_id:         String,
  pub tenant_id:          String,
  pub payment_number:     String,
  pub amount_cents:       i64,
  pub currency:           String,
  pub payment_date:       String,
  pub agreement_number:   Option<String>,
  pub reference_number:   Option<String>,
  pub contract_id:        Option<String>,
  pub customer_id:        Option<String>,
  pub processing_status:  String,
  pub allocation_status:  String,
  pub linking_confidence: Option<f64>,
  pub processing_notes:   Option<String>,
  pub created_at:         String,
}

impl RawPayment {
  /// Column list matching the field order expected by [`Self::from_row`].
  pub const COLUMNS: &'static str = "payment_id, tenant_id, payment_number, \
     amount_cents, currency, payment_date, agreement_number, reference_number, \
     contract_id, customer_id, processing_status, allocation_status, \
     linking_confidence, processing_notes, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      payment_id:         row.get(0)?,
      tenant_id:          row.get(1)?,
      payment_number:     row.get(2)?,
      amount_cents:       row.get(3)?,
      currency:           row.get(4)?,
      payment_date:       row.get(5)?,
      agreement_number:   row.get(6)?,
      reference_number:   row.get(7)?,
      contract_id:        row.get(8)?,
      customer_id:        row.get(9)?,
      processing_status:  row.get(10)?,
      allocation_status:  row.get(11)?,
      linking_confidence: row.get(12)?,
      processing_notes:   row.get(13)?,
      created_at:         row.get(14)?,
    })
  }

  pub fn into_payment(self) -> Result<Payment> {
    Ok(Payment {
      payment_id:         decode_uuid(&self.payment_id)?,
      tenant_id:          decode_uuid(&self.tenant_id)?,
      payment_number:     self.payment_number,
      amount_cents:       self.amount_cents,
      currency:           self.currency,
      payment_date:       decode_date(&self.payment_date)?,
      agreement_number:   self.agreement_number,
      reference_number:   self.reference_number,
      contract_id:        self.contract_id.as_deref().map(decode_uuid).transpose()?,
      customer_id:        self.customer_id.as_deref().map(decode_uuid).transpose()?,
      processing_status:  decode_processing_status(&self.processing_status)?,
      allocation_status:  decode_allocation_status(&self.allocation_status)?,
      linking_confidence: self.linking_confidence,
      processing_notes:   self.processing_notes,
      created_at:         decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `contracts` row.
pub struct RawContract {
  pub contract_id:           String,
  pub tenant_id:             String,
  pub contract_number:       String,
  pub customer_id:           String,
  pub periodic_amount_cents: i64,
  pub currency:              String,
  pub balance_due_cents:     i64,
  pub status:                String,
  pub last_payment_date:     Option<String>,
  pub created_at:            String,
}

impl RawContract {
  pub const COLUMNS: &'static str = "contract_id, tenant_id, contract_number, \
     customer_id, periodic_amount_cents, currency, balance_due_cents, status, \
     last_payment_date, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      contract_id:           row.get(0)?,
      tenant_id:             row.get(1)?,
      contract_number:       row.get(2)?,
      customer_id:           row.get(3)?,
      periodic_amount_cents: row.get(4)?,
      currency:              row.get(5)?,
      balance_due_cents:     row.get(6)?,
      status:                row.get(7)?,
      last_payment_date:     row.get(8)?,
      created_at:            row.get(9)?,
    })
  }

  pub fn into_contract(self) -> Result<Contract> {
    Ok(Contract {
      contract_id:           decode_uuid(&self.contract_id)?,
      tenant_id:             decode_uuid(&self.tenant_id)?,
      contract_number:       self.contract_number,
      customer_id:           decode_uuid(&self.customer_id)?,
      periodic_amount_cents: self.periodic_amount_cents,
      currency:              self.currency,
      balance_due_cents:     self.balance_due_cents,
      status:                decode_contract_status(&self.status)?,
      last_payment_date:     self
        .last_payment_date
        .as_deref()
        .map(decode_date)
        .transpose()?,
      created_at:            decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `customers` row.
pub struct RawCustomer {
  pub customer_id: String,
  pub tenant_id:   String,
  pub name_json:   String,
  pub created_at:  String,
}

impl RawCustomer {
  pub fn into_customer(self) -> Result<Customer> {
    Ok(Customer {
      customer_id: decode_uuid(&self.customer_id)?,
      tenant_id:   decode_uuid(&self.tenant_id)?,
      name:        decode_customer_name(&self.name_json)?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `linking_attempts` row.
pub struct RawAttempt {
  pub attempt_id:      String,
  pub payment_id:      String,
  pub contract_id:     Option<String>,
  pub confidence:      f64,
  pub method:          String,
  pub candidates:      String,
  pub weights_version: String,
  pub notes:           Option<String>,
  pub recorded_at:     String,
}

impl RawAttempt {
  pub const COLUMNS: &'static str = "attempt_id, payment_id, contract_id, \
     confidence, method, candidates, weights_version, notes, recorded_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      attempt_id:      row.get(0)?,
      payment_id:      row.get(1)?,
      contract_id:     row.get(2)?,
      confidence:      row.get(3)?,
      method:          row.get(4)?,
      candidates:      row.get(5)?,
      weights_version: row.get(6)?,
      notes:           row.get(7)?,
      recorded_at:     row.get(8)?,
    })
  }

  pub fn into_attempt(self) -> Result<LinkingAttempt> {
    Ok(LinkingAttempt {
      attempt_id:      decode_uuid(&self.attempt_id)?,
      payment_id:      decode_uuid(&self.payment_id)?,
      contract_id:     self.contract_id.as_deref().map(decode_uuid).transpose()?,
      confidence:      self.confidence,
      method:          decode_method(&self.method)?,
      candidates:      decode_candidates(&self.candidates)?,
      weights_version: self.weights_version,
      notes:           self.notes,
      recorded_at:     decode_dt(&self.recorded_at)?,
    })
  }
}
