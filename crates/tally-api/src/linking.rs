//! Handlers for the linking operations — the engine's caller-facing surface.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/payments/:id/candidates` | Ranked suggestions, read-only |
//! | `POST` | `/payments/:id/link` | Manual link; body: [`LinkBody`] |
//! | `POST` | `/payments/:id/auto-link` | Policy decision for one payment |
//! | `POST` | `/payments/:id/unlink` | Body: `{"reason":"..."}` (optional) |
//! | `GET`  | `/payments/:id/attempts` | Audit trail, oldest first |
//! | `POST` | `/auto-link` | Bulk pass; body: [`AutoLinkAllBody`] |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use serde::Deserialize;
use tally_core::{
  audit::LinkingAttempt,
  engine::{BatchSummary, LinkOutcome, LinkingEngine},
  payment::Payment,
  score::ScoredCandidate,
  store::LedgerStore,
};
use uuid::Uuid;

use crate::error::ApiError;

// ─── Candidates ──────────────────────────────────────────────────────────────

/// `GET /payments/:id/candidates`
pub async fn candidates<S>(
  State(engine): State<Arc<LinkingEngine<S>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<ScoredCandidate>>, ApiError>
where
  S: LedgerStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Ok(Json(engine.score_candidates(id).await?))
}

// ─── Manual link ─────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /payments/:id/link`.
#[derive(Debug, Deserialize)]
pub struct LinkBody {
  pub contract_id: Uuid,
  pub notes:       Option<String>,
}

/// `POST /payments/:id/link`
pub async fn link_manual<S>(
  State(engine): State<Arc<LinkingEngine<S>>>,
  Path(id): Path<Uuid>,
  Json(body): Json<LinkBody>,
) -> Result<Json<LinkingAttempt>, ApiError>
where
  S: LedgerStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let attempt = engine
    .link_manually(id, body.contract_id, body.notes)
    .await?;
  Ok(Json(attempt))
}

// ─── Automatic link ──────────────────────────────────────────────────────────

/// `POST /payments/:id/auto-link`
///
/// Returns 200 with either outcome; a below-threshold candidate set is a
/// routing result, not an error.
pub async fn link_auto<S>(
  State(engine): State<Arc<LinkingEngine<S>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<LinkOutcome>, ApiError>
where
  S: LedgerStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Ok(Json(engine.link_automatically(id).await?))
}

// ─── Bulk auto-link ──────────────────────────────────────────────────────────

/// JSON body accepted by `POST /auto-link`.
#[derive(Debug, Deserialize)]
pub struct AutoLinkAllBody {
  pub tenant_id:      Uuid,
  /// Override for the acceptance threshold; unattended runs usually pass a
  /// stricter value than the interactive default.
  pub min_confidence: Option<f64>,
}

/// `POST /auto-link`
pub async fn auto_link_all<S>(
  State(engine): State<Arc<LinkingEngine<S>>>,
  Json(body): Json<AutoLinkAllBody>,
) -> Result<Json<BatchSummary>, ApiError>
where
  S: LedgerStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let summary = engine
    .auto_link_all(body.tenant_id, body.min_confidence)
    .await?;
  Ok(Json(summary))
}

// ─── Unlink ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct UnlinkBody {
  pub reason: Option<String>,
}

/// `POST /payments/:id/unlink` — body: `{"reason":"..."}` (optional).
pub async fn unlink<S>(
  State(engine): State<Arc<LinkingEngine<S>>>,
  Path(id): Path<Uuid>,
  Json(body): Json<UnlinkBody>,
) -> Result<Json<Payment>, ApiError>
where
  S: LedgerStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Ok(Json(engine.unlink(id, body.reason).await?))
}

// ─── Attempts ────────────────────────────────────────────────────────────────

/// `GET /payments/:id/attempts`
pub async fn attempts<S>(
  State(engine): State<Arc<LinkingEngine<S>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<LinkingAttempt>>, ApiError>
where
  S: LedgerStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let attempts = engine
    .store()
    .list_attempts(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(attempts))
}
