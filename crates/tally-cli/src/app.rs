//! Application state machine and event dispatcher.

use std::{collections::HashMap, sync::Arc};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};
use tally_core::{engine::LinkOutcome, payment::Payment, score::ScoredCandidate};
use uuid::Uuid;

use crate::client::ApiClient;

// ─── Screen ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
  /// Focus on the pending-payment queue; right pane shows a hint.
  PaymentQueue,
  /// Focus on the ranked candidates for the selected payment.
  CandidateReview,
}

// ─── App ─────────────────────────────────────────────────────────────────────

/// Top-level application state.
pub struct App {
  /// Current screen / keyboard focus.
  pub screen: Screen,

  /// Pending-review payments returned by the API.
  pub payments: Vec<Payment>,

  /// Cached customer display names, keyed by customer id. Populated lazily
  /// when candidates are shown.
  pub customer_names: HashMap<Uuid, String>,

  /// Current fuzzy-filter string (only active when `filter_active`).
  pub filter: String,

  /// Whether the user is typing a filter query.
  pub filter_active: bool,

  /// Cursor position within the *filtered* payment list.
  pub list_cursor: usize,

  /// Cursor position within the candidate list.
  pub candidate_cursor: usize,

  /// The payment whose candidates are being reviewed.
  pub selected_payment_id: Option<Uuid>,

  /// Ranked candidates for the selected payment.
  pub candidates: Vec<ScoredCandidate>,

  /// One-line status message shown in the status bar.
  pub status_msg: String,

  /// Shared HTTP client.
  pub client: Arc<ApiClient>,
}

impl App {
  /// Create an [`App`] with an empty queue.
  pub fn new(client: ApiClient) -> Self {
    Self {
      screen: Screen::PaymentQueue,
      payments: Vec::new(),
      customer_names: HashMap::new(),
      filter: String::new(),
      filter_active: false,
      list_cursor: 0,
      candidate_cursor: 0,
      selected_payment_id: None,
      candidates: Vec::new(),
      status_msg: String::new(),
      client: Arc::new(client),
    }
  }

  // ── Data loading ──────────────────────────────────────────────────────────

  /// Fetch the pending-review queue from the API.
  pub async fn load_payments(&mut self) -> anyhow::Result<()> {
    self.status_msg = "Loading payments…".into();
    match self.client.list_pending_payments().await {
      Ok(payments) => {
        self.payments = payments;
        if self.list_cursor >= self.payments.len() {
          self.list_cursor = self.payments.len().saturating_sub(1);
        }
        self.status_msg = String::new();
        Ok(())
      }
      Err(e) => {
        self.status_msg = format!("Error: {e}");
        Err(e)
      }
    }
  }

  /// Load candidates for `payment_id` into `self.candidates`, caching the
  /// customer names the detail pane displays.
  async fn load_candidates(&mut self, payment_id: Uuid) -> anyhow::Result<()> {
    self.status_msg = "Scoring candidates…".into();
    match self.client.candidates(payment_id).await {
      Ok(candidates) => {
        for candidate in &candidates {
          self.ensure_customer_name(candidate.contract.customer_id).await;
        }
        self.candidates = candidates;
        self.candidate_cursor = 0;
        self.status_msg = String::new();
        Ok(())
      }
      Err(e) => {
        self.status_msg = format!("Error: {e}");
        Err(e)
      }
    }
  }

  /// Load the display name for `customer_id` if not already cached.
  pub async fn ensure_customer_name(&mut self, customer_id: Uuid) {
    if self.customer_names.contains_key(&customer_id) {
      return;
    }
    if let Ok(customer) = self.client.customer(customer_id).await {
      self
        .customer_names
        .insert(customer_id, customer.name.display());
    }
  }

  // ── Filtered list ─────────────────────────────────────────────────────────

  /// Returns payments that match the current filter query.
  pub fn filtered_payments(&self) -> Vec<&Payment> {
    if self.filter.is_empty() {
      return self.payments.iter().collect();
    }
    let matcher = SkimMatcherV2::default();
    self
      .payments
      .iter()
      .filter(|p| {
        matcher.fuzzy_match(&p.payment_number, &self.filter).is_some()
          || p
            .reference_number
            .as_deref()
            .is_some_and(|r| matcher.fuzzy_match(r, &self.filter).is_some())
          || p
            .agreement_number
            .as_deref()
            .is_some_and(|a| matcher.fuzzy_match(a, &self.filter).is_some())
      })
      .collect()
  }

  /// The payment under the list cursor in the filtered view, if any.
  pub fn cursor_payment(&self) -> Option<&Payment> {
    let list = self.filtered_payments();
    list.get(self.list_cursor).copied()
  }

  /// The payment currently under review, if any.
  pub fn selected_payment(&self) -> Option<&Payment> {
    let id = self.selected_payment_id?;
    self.payments.iter().find(|p| p.payment_id == id)
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub async fn handle_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    // Global: Ctrl-C quits from anywhere.
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      return Ok(false);
    }

    // Filter input mode: all printable keys go into the filter string.
    if self.filter_active {
      return self.handle_filter_key(key).await;
    }

    match self.screen {
      Screen::PaymentQueue => self.handle_queue_key(key).await,
      Screen::CandidateReview => self.handle_review_key(key).await,
    }
  }

  async fn handle_filter_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      KeyCode::Esc => {
        self.filter_active = false;
        self.filter.clear();
        self.list_cursor = 0;
      }
      KeyCode::Enter => {
        self.filter_active = false;
        self.list_cursor = 0;
        // Immediately open review if there's exactly one match.
        let list = self.filtered_payments();
        if list.len() == 1 {
          let id = list[0].payment_id;
          drop(list);
          self.open_review(id).await?;
        }
      }
      KeyCode::Backspace => {
        self.filter.pop();
        self.list_cursor = 0;
      }
      KeyCode::Char(c) => {
        self.filter.push(c);
        self.list_cursor = 0;
      }
      _ => {}
    }
    Ok(true)
  }

  async fn handle_queue_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      // Quit
      KeyCode::Char('q') => return Ok(false),

      // Navigation
      KeyCode::Down | KeyCode::Char('j') => {
        let len = self.filtered_payments().len();
        if len > 0 && self.list_cursor + 1 < len {
          self.list_cursor += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => {
        if self.list_cursor > 0 {
          self.list_cursor -= 1;
        }
      }

      // Open candidate review
      KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => {
        if let Some(id) = self.cursor_payment().map(|p| p.payment_id) {
          self.open_review(id).await?;
        }
      }

      // Auto-link the payment under the cursor
      KeyCode::Char('a') => {
        if let Some(id) = self.cursor_payment().map(|p| p.payment_id) {
          self.auto_link(id).await;
        }
      }

      // Unlink the payment under the cursor
      KeyCode::Char('u') => {
        if let Some(id) = self.cursor_payment().map(|p| p.payment_id) {
          self.unlink(id).await;
        }
      }

      // Refresh
      KeyCode::Char('r') => {
        self.load_payments().await.ok();
      }

      // Filter
      KeyCode::Char('/') => {
        self.filter_active = true;
        self.filter.clear();
        self.list_cursor = 0;
      }

      _ => {}
    }
    Ok(true)
  }

  async fn handle_review_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      // Quit
      KeyCode::Char('q') => return Ok(false),

      // Back to queue
      KeyCode::Esc | KeyCode::Left | KeyCode::Char('h') => {
        self.screen = Screen::PaymentQueue;
        self.selected_payment_id = None;
        self.candidates.clear();
      }

      // Candidate navigation
      KeyCode::Down | KeyCode::Char('j') => {
        if self.candidate_cursor + 1 < self.candidates.len() {
          self.candidate_cursor += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => {
        if self.candidate_cursor > 0 {
          self.candidate_cursor -= 1;
        }
      }

      // Link the selected candidate
      KeyCode::Enter | KeyCode::Char('l') => {
        self.link_selected().await;
      }

      // Auto-link the payment under review
      KeyCode::Char('a') => {
        if let Some(id) = self.selected_payment_id {
          self.auto_link(id).await;
          self.screen = Screen::PaymentQueue;
          self.selected_payment_id = None;
          self.candidates.clear();
        }
      }

      _ => {}
    }
    Ok(true)
  }

  // ── Actions ───────────────────────────────────────────────────────────────

  /// Transition to `CandidateReview` for `payment_id`, loading candidates.
  async fn open_review(&mut self, payment_id: Uuid) -> anyhow::Result<()> {
    self.load_candidates(payment_id).await?;
    self.selected_payment_id = Some(payment_id);
    self.screen = Screen::CandidateReview;
    Ok(())
  }

  /// Commit the candidate under the cursor as a manual link.
  async fn link_selected(&mut self) {
    let Some(payment_id) = self.selected_payment_id else {
      return;
    };
    let (contract_id, contract_number) = match self.candidates.get(self.candidate_cursor) {
      Some(c) => (c.contract.contract_id, c.contract.contract_number.clone()),
      None => {
        self.status_msg = "No candidate selected.".into();
        return;
      }
    };

    match self.client.link(payment_id, contract_id, None).await {
      Ok(attempt) => {
        self.status_msg = format!(
          "Linked to {} at {}%",
          contract_number,
          (attempt.confidence * 100.0).round()
        );
        self.screen = Screen::PaymentQueue;
        self.selected_payment_id = None;
        self.candidates.clear();
        self.load_payments().await.ok();
      }
      Err(e) => {
        self.status_msg = format!("Link failed: {e}");
      }
    }
  }

  async fn auto_link(&mut self, payment_id: Uuid) {
    match self.client.auto_link(payment_id).await {
      Ok(LinkOutcome::Linked { attempt }) => {
        self.status_msg = format!(
          "Auto-linked at {}%",
          (attempt.confidence * 100.0).round()
        );
        self.load_payments().await.ok();
      }
      Ok(LinkOutcome::NeedsReview { suggestions }) => {
        self.status_msg = format!(
          "Below threshold; {} suggestion(s) available for manual review",
          suggestions.len()
        );
      }
      Err(e) => {
        self.status_msg = format!("Auto-link failed: {e}");
      }
    }
  }

  async fn unlink(&mut self, payment_id: Uuid) {
    match self.client.unlink(payment_id, None).await {
      Ok(_) => {
        self.status_msg = "Unlinked.".into();
        self.load_payments().await.ok();
      }
      Err(e) => {
        self.status_msg = format!("Unlink failed: {e}");
      }
    }
  }
}
