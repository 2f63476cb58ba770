//! Handler for `POST /imports/payments` — CSV ingestion.
//!
//! The request body is the raw CSV text. Parsing and persistence follow the
//! batch isolation rules: a bad row (or a row whose insert fails) becomes an
//! entry in the response, never a failed request. Only file-level problems
//! (missing columns, unreadable header) return 400.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tally_core::{engine::LinkingEngine, store::LedgerStore};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ImportParams {
  pub tenant_id: Uuid,
  /// Fallback currency for files without a currency column.
  #[serde(default = "default_currency")]
  pub currency:  String,
}

fn default_currency() -> String { "KWD".into() }

#[derive(Debug, Serialize)]
pub struct ImportRowError {
  pub line:    usize,
  pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
  pub imported: usize,
  pub errors:   Vec<ImportRowError>,
}

/// `POST /imports/payments?tenant_id=<id>[&currency=KWD]` — body: CSV text.
pub async fn payments<S>(
  State(engine): State<Arc<LinkingEngine<S>>>,
  Query(params): Query<ImportParams>,
  body: String,
) -> Result<Json<ImportResponse>, ApiError>
where
  S: LedgerStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let report = tally_import::parse_csv(body.as_bytes(), params.tenant_id, &params.currency)
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

  let mut errors: Vec<ImportRowError> = report
    .errors
    .into_iter()
    .map(|e| ImportRowError {
      line:    e.line,
      message: e.error.to_string(),
    })
    .collect();

  let mut imported = 0;
  for row in report.rows {
    match engine.store().create_payment(row.payment).await {
      Ok(_) => imported += 1,
      Err(e) => errors.push(ImportRowError {
        line:    row.line,
        message: e.to_string(),
      }),
    }
  }

  errors.sort_by_key(|e| e.line);
  Ok(Json(ImportResponse { imported, errors }))
}
