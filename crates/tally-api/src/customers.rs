//! Handlers for `/customers` endpoints.
//!
//! Customers exist for display context in the review queue; the API exposes
//! only creation and lookup.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use tally_core::{
  customer::{Customer, NewCustomer},
  engine::LinkingEngine,
  store::LedgerStore,
};
use uuid::Uuid;

use crate::error::ApiError;

/// `POST /customers` — body: [`NewCustomer`]; returns 201.
pub async fn create<S>(
  State(engine): State<Arc<LinkingEngine<S>>>,
  Json(body): Json<NewCustomer>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LedgerStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let customer = engine
    .store()
    .create_customer(body)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok((StatusCode::CREATED, Json(customer)))
}

/// `GET /customers/:id`
pub async fn get_one<S>(
  State(engine): State<Arc<LinkingEngine<S>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Customer>, ApiError>
where
  S: LedgerStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let customer = engine
    .store()
    .get_customer(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("customer {id} not found")))?;
  Ok(Json(customer))
}
