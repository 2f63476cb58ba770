//! Handlers for `/payments` CRUD endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/payments` | Optional filters; `?pending_review=true` is the review queue |
//! | `POST` | `/payments` | Body: [`NewPayment`]; returns 201 + stored payment |
//! | `GET`  | `/payments/:id` | 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use tally_core::{
  engine::LinkingEngine,
  payment::{AllocationStatus, NewPayment, Payment, ProcessingStatus},
  store::{LedgerStore, PaymentQuery},
};
use uuid::Uuid;

use crate::error::ApiError;

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  pub tenant_id:         Option<Uuid>,
  pub processing_status: Option<ProcessingStatus>,
  pub allocation_status: Option<AllocationStatus>,
  pub max_confidence:    Option<f64>,
  #[serde(default)]
  pub pending_review:    bool,
  pub limit:             Option<usize>,
  pub offset:            Option<usize>,
}

/// `GET /payments[?tenant_id=...][&pending_review=true][&limit=...]`
pub async fn list<S>(
  State(engine): State<Arc<LinkingEngine<S>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Payment>>, ApiError>
where
  S: LedgerStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let query = PaymentQuery {
    tenant:            params.tenant_id,
    processing_status: params.processing_status,
    allocation_status: params.allocation_status,
    max_confidence:    params.max_confidence,
    pending_review:    params.pending_review,
    limit:             params.limit,
    offset:            params.offset,
  };

  let payments = engine
    .store()
    .list_payments(&query)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(payments))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /payments` — body: [`NewPayment`]; returns 201 + the stored payment.
pub async fn create<S>(
  State(engine): State<Arc<LinkingEngine<S>>>,
  Json(body): Json<NewPayment>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LedgerStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let payment = engine
    .store()
    .create_payment(body)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok((StatusCode::CREATED, Json(payment)))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /payments/:id`
pub async fn get_one<S>(
  State(engine): State<Arc<LinkingEngine<S>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Payment>, ApiError>
where
  S: LedgerStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let payment = engine
    .store()
    .get_payment(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("payment {id} not found")))?;
  Ok(Json(payment))
}
