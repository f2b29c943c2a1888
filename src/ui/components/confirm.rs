use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use super::KeyResult;
use crate::ui::view::Shortcut;

/// Yes/no prompt guarding a destructive action on `T`.
///
/// While a question is open every key goes to the prompt. `y` confirms and
/// hands the target back; `n` or Esc dismisses it.
#[derive(Debug, Clone)]
pub struct ConfirmPrompt<T> {
  pending: Option<(T, String)>,
}

impl<T: Clone> ConfirmPrompt<T> {
  pub fn new() -> Self {
    Self { pending: None }
  }

  pub fn ask(&mut self, target: T, question: impl Into<String>) {
    self.pending = Some((target, question.into()));
  }

  pub fn is_active(&self) -> bool {
    self.pending.is_some()
  }

  /// Header hints while a question is open
  pub fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("y", "confirm").with_priority(10),
      Shortcut::new("n", "cancel").with_priority(20),
    ]
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<T> {
    if self.pending.is_none() {
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Char('y') | KeyCode::Char('Y') => match self.pending.take() {
        Some((target, _)) => KeyResult::Event(target),
        None => KeyResult::Handled,
      },
      KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
        self.pending = None;
        KeyResult::Handled
      }
      _ => KeyResult::Handled,
    }
  }

  /// Draw the question centered near the bottom of `area`
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let Some((_, question)) = &self.pending else {
      return;
    };

    let text = format!("{} (y/n)", question);
    let width = (text.chars().count() as u16 + 4).min(area.width);
    let height = 3.min(area.height);
    let popup = Rect {
      x: area.x + (area.width.saturating_sub(width)) / 2,
      y: area.y + area.height.saturating_sub(height + 1),
      width,
      height,
    };

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Red));
    let paragraph = Paragraph::new(text)
      .block(block)
      .style(Style::default().fg(Color::White));

    frame.render_widget(Clear, popup);
    frame.render_widget(paragraph, popup);
  }
}

impl<T: Clone> Default for ConfirmPrompt<T> {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
  }

  #[test]
  fn test_inactive_prompt_passes_keys_through() {
    let mut prompt: ConfirmPrompt<i64> = ConfirmPrompt::new();
    assert_eq!(prompt.handle_key(key('y')), KeyResult::NotHandled);
  }

  #[test]
  fn test_confirm_returns_target() {
    let mut prompt = ConfirmPrompt::new();
    prompt.ask(7_i64, "Delete \"Lamp\"?");
    assert!(prompt.is_active());

    // Unrelated keys are swallowed while the question is open
    assert_eq!(prompt.handle_key(key('j')), KeyResult::Handled);
    assert!(prompt.is_active());

    assert_eq!(prompt.handle_key(key('y')), KeyResult::Event(7));
    assert!(!prompt.is_active());
  }

  #[test]
  fn test_decline_dismisses() {
    let mut prompt = ConfirmPrompt::new();
    prompt.ask(7_i64, "Delete?");
    assert_eq!(prompt.handle_key(key('n')), KeyResult::Handled);
    assert!(!prompt.is_active());
  }
}
