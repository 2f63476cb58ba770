//! Pending-payment queue pane — left panel.

use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, List, ListItem, ListState},
};

use crate::app::App;
use crate::ui::{confidence_color, format_amount};

/// Render the payment queue into `area`.
pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let filtered = app.filtered_payments();
  let total = app.payments.len();

  // Title with count.
  let title = if app.filter_active || !app.filter.is_empty() {
    format!(" Pending payments ({}/{}) ", filtered.len(), total)
  } else {
    format!(" Pending payments ({}) ", total)
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  // Build list items.
  let items: Vec<ListItem> = filtered
    .iter()
    .enumerate()
    .map(|(i, payment)| {
      let is_cursor = i == app.list_cursor;
      let style = if is_cursor {
        Style::default()
          .bg(Color::Blue)
          .fg(Color::White)
          .add_modifier(Modifier::BOLD)
      } else {
        Style::default()
      };

      let mut spans = vec![
        Span::styled(format!("{:<14}", payment.payment_number), style),
        Span::styled(
          format!(
            "{:>12}  {}",
            format_amount(payment.amount_cents, &payment.currency),
            payment.payment_date.format("%Y-%m-%d")
          ),
          style,
        ),
      ];

      // Confidence badge for payments linked with low certainty; fresh
      // payments show a dash instead.
      match payment.linking_confidence {
        Some(confidence) => {
          spans.push(Span::styled(
            format!("  {:>3}%", (confidence * 100.0).round()),
            if is_cursor {
              style
            } else {
              Style::default().fg(confidence_color(confidence))
            },
          ));
        }
        None => {
          spans.push(Span::styled("    —", style));
        }
      }

      if payment.is_linked() {
        spans.push(Span::styled(
          "  linked",
          if is_cursor {
            style
          } else {
            Style::default().fg(Color::DarkGray)
          },
        ));
      }

      ListItem::new(Line::from(spans))
    })
    .collect();

  let mut inner_area = block.inner(area);
  f.render_widget(block, area);

  // If filter is active or set, show a filter bar at the bottom of the inner area.
  if (app.filter_active || !app.filter.is_empty()) && inner_area.height > 2 {
    let filter_area = Rect {
      x:      inner_area.x,
      y:      inner_area.y + inner_area.height - 1,
      width:  inner_area.width,
      height: 1,
    };
    inner_area.height = inner_area.height.saturating_sub(1);

    let filter_text = if app.filter_active {
      format!("/{}_", app.filter)
    } else {
      format!("/{}", app.filter)
    };
    let filter_style = Style::default().fg(Color::Yellow);
    f.render_widget(
      ratatui::widgets::Paragraph::new(filter_text).style(filter_style),
      filter_area,
    );
  }

  // Scrollable list with cursor tracking.
  let mut state = ListState::default();
  state.select(if filtered.is_empty() {
    None
  } else {
    Some(app.list_cursor)
  });

  f.render_stateful_widget(
    List::new(items)
      .highlight_style(
        Style::default()
          .bg(Color::Blue)
          .fg(Color::White)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol(""),
    inner_area,
    &mut state,
  );
}
