//! Candidate review pane — right panel.
//!
//! Shows the payment under review and its ranked candidates with the
//! evidence that fired for each, so the operator always has actionable next
//! steps instead of a bare "no match".

use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph},
};

use crate::app::App;
use crate::ui::{confidence_color, format_amount};

/// Render the review pane into `area`.
pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let title = app
    .selected_payment()
    .map(|p| format!(" {} ", p.payment_number))
    .unwrap_or_else(|| " Candidates ".into());

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let inner = block.inner(area);
  f.render_widget(block, area);

  let mut lines: Vec<Line> = Vec::new();

  // Payment summary.
  if let Some(payment) = app.selected_payment() {
    let mut summary = vec![
      Span::styled(
        format_amount(payment.amount_cents, &payment.currency),
        Style::default().add_modifier(Modifier::BOLD),
      ),
      Span::raw(format!("  {}", payment.payment_date.format("%Y-%m-%d"))),
    ];
    if let Some(agreement) = &payment.agreement_number {
      summary.push(Span::styled(
        format!("  agr: {agreement}"),
        Style::default().fg(Color::DarkGray),
      ));
    }
    if let Some(reference) = &payment.reference_number {
      summary.push(Span::styled(
        format!("  ref: {reference}"),
        Style::default().fg(Color::DarkGray),
      ));
    }
    lines.push(Line::from(summary));
    lines.push(Line::from(""));
  }

  if app.candidates.is_empty() {
    lines.push(Line::from(vec![Span::styled(
      "No eligible contracts. The payment stays in the queue.",
      Style::default().fg(Color::DarkGray),
    )]));
  }

  // Ranked candidates.
  for (i, candidate) in app.candidates.iter().enumerate() {
    let is_cursor = i == app.candidate_cursor;
    let marker = if is_cursor { "▸ " } else { "  " };
    let row_style = if is_cursor {
      Style::default().add_modifier(Modifier::BOLD)
    } else {
      Style::default()
    };

    let customer = app
      .customer_names
      .get(&candidate.contract.customer_id)
      .map(String::as_str)
      .unwrap_or("—");

    lines.push(Line::from(vec![
      Span::styled(marker.to_string(), row_style),
      Span::styled(
        format!("{:<18}", candidate.contract.contract_number),
        row_style.fg(Color::Cyan),
      ),
      Span::styled(format!("{:<24}", customer), row_style),
      Span::styled(
        format!(
          "{:>12}",
          format_amount(
            candidate.contract.periodic_amount_cents,
            &candidate.contract.currency
          )
        ),
        row_style,
      ),
      Span::styled(
        format!("  {:>3}%", (candidate.confidence * 100.0).round()),
        Style::default()
          .fg(confidence_color(candidate.confidence))
          .add_modifier(Modifier::BOLD),
      ),
    ]));

    lines.push(Line::from(vec![
      Span::raw("    "),
      Span::styled(
        candidate.evidence.reason(),
        Style::default().fg(Color::DarkGray),
      ),
    ]));
  }

  f.render_widget(Paragraph::new(lines), inner);
}
