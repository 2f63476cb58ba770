//! Async HTTP client wrapping the tally JSON API.

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use std::time::Duration;
use tally_core::{
  audit::LinkingAttempt,
  customer::Customer,
  engine::LinkOutcome,
  payment::Payment,
  score::ScoredCandidate,
};
use uuid::Uuid;

/// Connection settings for the tally API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  /// The tenant every request is scoped to.
  pub tenant:   Uuid,
}

/// Async HTTP client for the tally JSON REST API.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  pub fn tenant(&self) -> Uuid { self.config.tenant }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  // ── Payments ──────────────────────────────────────────────────────────────

  /// `GET /api/payments?tenant_id=<t>&pending_review=true`
  pub async fn list_pending_payments(&self) -> Result<Vec<Payment>> {
    let resp = self
      .client
      .get(self.url("/payments"))
      .query(&[
        ("tenant_id", self.config.tenant.to_string()),
        ("pending_review", "true".to_string()),
      ])
      .send()
      .await
      .context("GET /payments failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET /payments → {}", resp.status()));
    }
    resp.json().await.context("deserialising payments")
  }

  // ── Linking ───────────────────────────────────────────────────────────────

  /// `GET /api/payments/{id}/candidates`
  pub async fn candidates(&self, payment_id: Uuid) -> Result<Vec<ScoredCandidate>> {
    let resp = self
      .client
      .get(self.url(&format!("/payments/{payment_id}/candidates")))
      .send()
      .await
      .context("GET /candidates failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET /candidates → {}", resp.status()));
    }
    resp.json().await.context("deserialising candidates")
  }

  /// `POST /api/payments/{id}/link`
  pub async fn link(
    &self,
    payment_id: Uuid,
    contract_id: Uuid,
    notes: Option<String>,
  ) -> Result<LinkingAttempt> {
    let resp = self
      .client
      .post(self.url(&format!("/payments/{payment_id}/link")))
      .json(&serde_json::json!({ "contract_id": contract_id, "notes": notes }))
      .send()
      .await
      .context("POST /link failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("POST /link → {}", resp.status()));
    }
    resp.json().await.context("deserialising linking attempt")
  }

  /// `POST /api/payments/{id}/auto-link`
  pub async fn auto_link(&self, payment_id: Uuid) -> Result<LinkOutcome> {
    let resp = self
      .client
      .post(self.url(&format!("/payments/{payment_id}/auto-link")))
      .send()
      .await
      .context("POST /auto-link failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("POST /auto-link → {}", resp.status()));
    }
    resp.json().await.context("deserialising link outcome")
  }

  /// `POST /api/payments/{id}/unlink`
  pub async fn unlink(&self, payment_id: Uuid, reason: Option<String>) -> Result<Payment> {
    let resp = self
      .client
      .post(self.url(&format!("/payments/{payment_id}/unlink")))
      .json(&serde_json::json!({ "reason": reason }))
      .send()
      .await
      .context("POST /unlink failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("POST /unlink → {}", resp.status()));
    }
    resp.json().await.context("deserialising payment")
  }

  // ── Customers ─────────────────────────────────────────────────────────────

  /// `GET /api/customers/{id}`
  pub async fn customer(&self, id: Uuid) -> Result<Customer> {
    let resp = self
      .client
      .get(self.url(&format!("/customers/{id}")))
      .send()
      .await
      .context("GET /customers failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET /customers/{id} → {}", resp.status()));
    }
    resp.json().await.context("deserialising customer")
  }
}
