//! CSV payment-ingestion codec for Tally.
//!
//! Parses bank/gateway CSV exports into validated [`NewPayment`] records.
//! Pure synchronous; no HTTP or database dependencies. A malformed row is
//! collected as a typed error with its line number and never aborts the rest
//! of the file — batch ingestion mirrors the batch linker's isolation rules.
//!
//! # Quick start
//!
//! ```no_run
//! use uuid::Uuid;
//!
//! let data = "payment_number,amount,payment_date\nPAY-1,500.00,2024-03-01\n";
//! let report = tally_import::parse_csv(data.as_bytes(), Uuid::new_v4(), "KWD").unwrap();
//! println!("{} parsed, {} failed", report.rows.len(), report.errors.len());
//! ```

pub mod error;
mod parse;

pub use error::{Error, Result};
use tally_core::payment::NewPayment;
use uuid::Uuid;

// ─── Public types ────────────────────────────────────────────────────────────

/// One successfully parsed row.
#[derive(Debug, Clone)]
pub struct ImportedRow {
  /// 1-based line number in the source file (header is line 1).
  pub line:    usize,
  pub payment: NewPayment,
}

/// One rejected row; the error carries the line number.
#[derive(Debug)]
pub struct RowError {
  pub line:  usize,
  pub error: Error,
}

/// The outcome of parsing one file: accepted rows plus collected failures.
#[derive(Debug, Default)]
pub struct ImportReport {
  pub rows:   Vec<ImportedRow>,
  pub errors: Vec<RowError>,
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Parse a payments CSV from `reader`.
///
/// Every produced payment is scoped to `tenant_id`. Rows without a currency
/// column fall back to `default_currency` (sources are usually
/// single-currency exports).
///
/// Returns `Err` only for file-level problems (unreadable header, missing
/// required columns); row-level problems land in
/// [`ImportReport::errors`].
pub fn parse_csv<R: std::io::Read>(
  reader: R,
  tenant_id: Uuid,
  default_currency: &str,
) -> Result<ImportReport> {
  parse::parse(reader, tenant_id, default_currency)
}
