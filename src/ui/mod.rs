pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use ratatui::prelude::*;
use ratatui::widgets::ListState;

use view::View;

/// Draw the header, the top view and the breadcrumb footer
pub fn draw(frame: &mut Frame, host: &str, stack: &mut [Box<dyn View>]) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  let breadcrumb: Vec<String> = stack.iter().map(|v| v.breadcrumb_label()).collect();
  let Some(current) = stack.last_mut() else {
    return;
  };

  renderfns::draw_header(frame, chunks[0], host, &current.shortcuts());
  current.render(frame, chunks[1]);
  let status = current.status_message();
  renderfns::draw_footer(frame, chunks[2], &breadcrumb, status.as_deref());
}

/// Keep a list selection inside `0..len`, selecting the first row when unset
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  if len == 0 {
    state.select(None);
    return;
  }
  match state.selected() {
    Some(idx) if idx >= len => state.select(Some(len - 1)),
    None => state.select(Some(0)),
    _ => {}
  }
}
