//! CSV parsing internals: header alias resolution, decimal-amount and date
//! decoding, per-row error collection.

use chrono::NaiveDate;
use tally_core::payment::NewPayment;
use uuid::Uuid;

use crate::{Error, ImportReport, ImportedRow, Result, RowError};

// ─── Header mapping ──────────────────────────────────────────────────────────

/// Accepted header spellings per logical column. Exports from different
/// gateways disagree on naming; matching is case-insensitive.
const PAYMENT_NUMBER_ALIASES: &[&str] = &["payment_number", "receipt_number", "payment_no"];
const AMOUNT_ALIASES: &[&str] = &["amount", "amount_paid", "paid_amount"];
const DATE_ALIASES: &[&str] = &["payment_date", "date", "transaction_date"];
const CURRENCY_ALIASES: &[&str] = &["currency"];
const AGREEMENT_ALIASES: &[&str] = &["agreement_number", "contract_number"];
const REFERENCE_ALIASES: &[&str] = &["reference_number", "reference", "transaction_reference"];

fn find_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
  headers
    .iter()
    .position(|h| aliases.iter().any(|a| h.eq_ignore_ascii_case(a)))
}

/// Resolved column indices for one file.
struct Columns {
  payment_number: usize,
  amount:         usize,
  date:           usize,
  currency:       Option<usize>,
  agreement:      Option<usize>,
  reference:      Option<usize>,
}

impl Columns {
  fn resolve(headers: &[String]) -> Result<Self> {
    Ok(Self {
      payment_number: find_column(headers, PAYMENT_NUMBER_ALIASES)
        .ok_or(Error::MissingColumn("payment_number"))?,
      amount:         find_column(headers, AMOUNT_ALIASES)
        .ok_or(Error::MissingColumn("amount"))?,
      date:           find_column(headers, DATE_ALIASES)
        .ok_or(Error::MissingColumn("payment_date"))?,
      currency:       find_column(headers, CURRENCY_ALIASES),
      agreement:      find_column(headers, AGREEMENT_ALIASES),
      reference:      find_column(headers, REFERENCE_ALIASES),
    })
  }
}

// ─── Field decoding ──────────────────────────────────────────────────────────

/// Parse a decimal amount string into integer cents, exactly.
///
/// Accepts thousands separators (`"1,234.56"`) and at most two fraction
/// digits; anything else is rejected rather than rounded, since a silently
/// altered amount would corrupt every downstream score.
pub(crate) fn parse_amount_cents(raw: &str) -> Option<i64> {
  let cleaned: String = raw
    .trim()
    .chars()
    .filter(|c| *c != ',' && *c != ' ')
    .collect();
  if cleaned.is_empty() {
    return None;
  }

  let (whole, fraction) = match cleaned.split_once('.') {
    Some((w, f)) => (w, f),
    None => (cleaned.as_str(), ""),
  };
  if fraction.len() > 2 || !fraction.chars().all(|c| c.is_ascii_digit()) {
    return None;
  }
  if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
    return None;
  }

  let whole: i64 = whole.parse().ok()?;
  let fraction_cents: i64 = match fraction.len() {
    0 => 0,
    1 => fraction.parse::<i64>().ok()? * 10,
    _ => fraction.parse().ok()?,
  };

  whole.checked_mul(100)?.checked_add(fraction_cents)
}

/// Parse a date in ISO (`2024-03-01`) or day-first (`01/03/2024`) form.
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
  let raw = raw.trim();
  NaiveDate::parse_from_str(raw, "%Y-%m-%d")
    .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
    .ok()
}

fn optional_field(record: &csv::StringRecord, idx: Option<usize>) -> Option<String> {
  idx
    .and_then(|i| record.get(i))
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_owned)
}

// ─── Row parsing ─────────────────────────────────────────────────────────────

fn parse_row(
  record: &csv::StringRecord,
  line: usize,
  columns: &Columns,
  tenant_id: Uuid,
  default_currency: &str,
) -> Result<NewPayment> {
  let payment_number = record
    .get(columns.payment_number)
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .ok_or(Error::EmptyField {
      line,
      column: "payment_number",
    })?;

  let amount_raw = record.get(columns.amount).unwrap_or("").trim();
  let amount_cents = parse_amount_cents(amount_raw).ok_or_else(|| Error::InvalidAmount {
    line,
    value: amount_raw.to_owned(),
  })?;

  let date_raw = record.get(columns.date).unwrap_or("").trim();
  let payment_date = parse_date(date_raw).ok_or_else(|| Error::InvalidDate {
    line,
    value: date_raw.to_owned(),
  })?;

  let currency = optional_field(record, columns.currency)
    .unwrap_or_else(|| default_currency.to_owned());

  let mut payment =
    NewPayment::new(tenant_id, payment_number, amount_cents, currency, payment_date);
  payment.agreement_number = optional_field(record, columns.agreement);
  payment.reference_number = optional_field(record, columns.reference);
  Ok(payment)
}

// ─── File parsing ────────────────────────────────────────────────────────────

pub(crate) fn parse<R: std::io::Read>(
  reader: R,
  tenant_id: Uuid,
  default_currency: &str,
) -> Result<ImportReport> {
  let mut csv_reader = csv::ReaderBuilder::new()
    .has_headers(true)
    .flexible(true)
    .from_reader(reader);

  let headers: Vec<String> = csv_reader
    .headers()?
    .iter()
    .map(|h| h.trim().to_string())
    .collect();
  let columns = Columns::resolve(&headers)?;

  let mut report = ImportReport::default();

  // Header occupies line 1; data starts at line 2.
  for (i, record) in csv_reader.records().enumerate() {
    let line = i + 2;
    let record = match record {
      Ok(r) => r,
      Err(e) => {
        report.errors.push(RowError {
          line,
          error: Error::Csv(e),
        });
        continue;
      }
    };

    match parse_row(&record, line, &columns, tenant_id, default_currency) {
      Ok(payment) => report.rows.push(ImportedRow { line, payment }),
      Err(error) => report.errors.push(RowError { line, error }),
    }
  }

  Ok(report)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  const TENANT: Uuid = Uuid::nil();

  #[test]
  fn parses_a_complete_file() {
    let data = "\
payment_number,amount,currency,payment_date,agreement_number,reference_number
PAY-1,500.00,KWD,2024-03-01,AGR-100,REF-9
PAY-2,480.00,KWD,2024-03-02,,
";
    let report = parse(data.as_bytes(), TENANT, "KWD").unwrap();
    assert_eq!(report.rows.len(), 2);
    assert!(report.errors.is_empty());

    let first = &report.rows[0].payment;
    assert_eq!(first.payment_number, "PAY-1");
    assert_eq!(first.amount_cents, 50_000);
    assert_eq!(first.agreement_number.as_deref(), Some("AGR-100"));
    assert_eq!(first.reference_number.as_deref(), Some("REF-9"));

    let second = &report.rows[1].payment;
    assert_eq!(second.amount_cents, 48_000);
    assert_eq!(second.agreement_number, None);
    assert_eq!(second.reference_number, None);
  }

  #[test]
  fn bad_rows_are_collected_not_fatal() {
    let data = "\
payment_number,amount,payment_date
PAY-1,500.00,2024-03-01
PAY-2,not-a-number,2024-03-02
PAY-3,125.50,2024-03-03
,9.99,2024-03-04
";
    let report = parse(data.as_bytes(), TENANT, "KWD").unwrap();
    assert_eq!(report.rows.len(), 2);
    assert_eq!(report.errors.len(), 2);
    assert_eq!(report.errors[0].line, 3);
    assert!(matches!(report.errors[0].error, Error::InvalidAmount { .. }));
    assert_eq!(report.errors[1].line, 5);
    assert!(matches!(report.errors[1].error, Error::EmptyField { .. }));
  }

  #[test]
  fn missing_required_column_is_a_file_error() {
    let data = "payment_number,payment_date\nPAY-1,2024-03-01\n";
    let err = parse(data.as_bytes(), TENANT, "KWD").unwrap_err();
    assert!(matches!(err, Error::MissingColumn("amount")));
  }

  #[test]
  fn header_aliases_resolve_case_insensitively() {
    let data = "\
Receipt_Number,Paid_Amount,Date,Contract_Number,Reference
PAY-1,1250,2024-03-01,AGR-7,TXN-1
";
    let report = parse(data.as_bytes(), TENANT, "KWD").unwrap();
    assert_eq!(report.rows.len(), 1);
    let p = &report.rows[0].payment;
    assert_eq!(p.payment_number, "PAY-1");
    assert_eq!(p.amount_cents, 125_000);
    assert_eq!(p.agreement_number.as_deref(), Some("AGR-7"));
    assert_eq!(p.reference_number.as_deref(), Some("TXN-1"));
  }

  #[test]
  fn currency_column_overrides_the_default() {
    let data = "\
payment_number,amount,currency,payment_date
PAY-1,10.00,QAR,2024-03-01
PAY-2,10.00,,2024-03-01
";
    let report = parse(data.as_bytes(), TENANT, "KWD").unwrap();
    assert_eq!(report.rows[0].payment.currency, "QAR");
    assert_eq!(report.rows[1].payment.currency, "KWD");
  }

  #[test]
  fn day_first_dates_are_accepted() {
    let data = "payment_number,amount,payment_date\nPAY-1,5,01/03/2024\n";
    let report = parse(data.as_bytes(), TENANT, "KWD").unwrap();
    assert_eq!(
      report.rows[0].payment.payment_date,
      NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    );
  }

  #[test]
  fn amount_forms() {
    assert_eq!(parse_amount_cents("500"), Some(50_000));
    assert_eq!(parse_amount_cents("500.5"), Some(50_050));
    assert_eq!(parse_amount_cents("500.55"), Some(50_055));
    assert_eq!(parse_amount_cents("1,234.56"), Some(123_456));
    assert_eq!(parse_amount_cents(" 12.00 "), Some(1_200));
    assert_eq!(parse_amount_cents("500.555"), None);
    assert_eq!(parse_amount_cents("-1"), None);
    assert_eq!(parse_amount_cents(""), None);
    assert_eq!(parse_amount_cents("12.ab"), None);
  }
}
