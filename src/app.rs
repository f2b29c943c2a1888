use crate::catalog::{self, Catalog};
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::ui;
use crate::ui::view::{View, ViewAction};
use crate::ui::views::ProductListView;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::{stdout, Stdout};
use std::time::Duration;
use tracing::{debug, info};

const TICK_RATE: Duration = Duration::from_millis(100);

/// Terminal application state
pub struct App {
  /// API host shown in the header
  host: String,

  /// Navigation stack - the product list is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  /// Must be called inside the runtime: the root view starts loading immediately.
  pub fn new(config: &Config) -> Result<Self> {
    let catalog: Catalog = catalog::connect(config)?;
    let host = catalog.store().host();
    info!(host = %host, "starting terminal UI");

    Ok(Self {
      host,
      view_stack: vec![Box::new(ProductListView::new(catalog))],
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal).await;

    // Restore the terminal even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
  }

  async fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);

    while !self.should_quit {
      let host = self.host.as_str();
      let stack = &mut self.view_stack;
      terminal.draw(|frame| ui::draw(frame, host, stack))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }

    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => self.tick(),
      Event::Resize => {} // Next draw picks up the new size
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    if let Some(view) = self.view_stack.last_mut() {
      let action = view.handle_key(key);
      self.apply(action);
    }
  }

  /// Poll every view so background views stay current; apply the top view's action
  fn tick(&mut self) {
    let mut top_action = ViewAction::None;
    let top = self.view_stack.len().saturating_sub(1);
    for (idx, view) in self.view_stack.iter_mut().enumerate() {
      let action = view.tick();
      if idx == top {
        top_action = action;
      }
    }
    self.apply(top_action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => {
        debug!(view = %view.breadcrumb_label(), "push view");
        self.view_stack.push(view);
      }
      ViewAction::Pop => {
        self.view_stack.pop();
        if self.view_stack.is_empty() {
          self.should_quit = true;
        }
      }
    }
  }
}
