use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl Shortcut {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// No action needed
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back)
  Pop,
}

/// Trait for view behavior
///
/// Views handle their own input modes (form editing, delete confirmation)
/// and return actions for the App to execute. This creates a clean
/// delegation chain: App → View → Components
///
/// Views that load data asynchronously should use Query<T> internally and
/// poll it in the tick() method. Writes use Mutation<T> the same way.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// Transient message shown in the footer
  fn status_message(&self) -> Option<String> {
    None
  }

  /// Called on each tick to allow views to poll async queries.
  ///
  /// Every view on the stack is ticked; only the action returned by the
  /// top view is applied.
  fn tick(&mut self) -> ViewAction {
    ViewAction::None
  }

  /// Get keyboard shortcuts to display in the header
  /// Override this to provide view-specific shortcuts
  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![Shortcut::new("q", "back").with_priority(90)]
  }
}
