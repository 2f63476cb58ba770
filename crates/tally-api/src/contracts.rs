//! Handlers for `/contracts` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/contracts?tenant_id=<id>` | All contracts for a tenant |
//! | `POST` | `/contracts` | Body: [`NewContract`] |
//! | `GET`  | `/contracts/:id` | 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use tally_core::{
  contract::{Contract, NewContract},
  engine::LinkingEngine,
  store::LedgerStore,
};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub tenant_id: Uuid,
}

/// `GET /contracts?tenant_id=<id>`
pub async fn list<S>(
  State(engine): State<Arc<LinkingEngine<S>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Contract>>, ApiError>
where
  S: LedgerStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let contracts = engine
    .store()
    .list_contracts(params.tenant_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(contracts))
}

/// `POST /contracts` — body: [`NewContract`]; returns 201.
pub async fn create<S>(
  State(engine): State<Arc<LinkingEngine<S>>>,
  Json(body): Json<NewContract>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LedgerStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let contract = engine
    .store()
    .create_contract(body)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok((StatusCode::CREATED, Json(contract)))
}

/// `GET /contracts/:id`
pub async fn get_one<S>(
  State(engine): State<Arc<LinkingEngine<S>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Contract>, ApiError>
where
  S: LedgerStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let contract = engine
    .store()
    .get_contract(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("contract {id} not found")))?;
  Ok(Json(contract))
}
