use crate::catalog::{CachedProductClient, Product, ProductKey, ProductStore};
use crate::query::{Mutation, Query, QueryState};
use crate::ui::components::{ConfirmPrompt, KeyResult};
use crate::ui::renderfns::{format_price, stock_color, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::ProductFormView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// View for displaying a single product
pub struct ProductDetailView<S: ProductStore> {
  id: i64,
  catalog: CachedProductClient<S>,
  query: Query<Product>,
  confirm: ConfirmPrompt<i64>,
  delete: Mutation<()>,
  notice: Option<String>,
}

impl<S: ProductStore> ProductDetailView<S> {
  pub fn new(id: i64, catalog: CachedProductClient<S>) -> Self {
    let catalog_for_query = catalog.clone();
    let mut query = Query::new(move || {
      let catalog = catalog_for_query.clone();
      async move { catalog.get_product(id).await }
    })
    .watching(catalog.cache(), &ProductKey(id));

    // Start fetching immediately
    query.fetch();

    Self {
      id,
      catalog,
      query,
      confirm: ConfirmPrompt::new(),
      delete: Mutation::new(),
      notice: None,
    }
  }

  fn render_detail(&self, frame: &mut Frame, area: Rect) {
    let title = match self.query.state() {
      QueryState::Loading(_) => format!(" Product #{} (loading...) ", self.id),
      QueryState::Error(e) => format!(" Product #{} (error: {}) ", self.id, e),
      _ => format!(" Product #{} ", self.id),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if let Some(error) = self.query.error() {
      let paragraph = Paragraph::new(format!("Error: {}\n\nPress 'r' to retry.", error))
        .style(Style::default().fg(Color::Red));
      frame.render_widget(paragraph, inner);
      return;
    }

    let product = match self.query.data() {
      Some(product) => product,
      None => {
        let paragraph =
          Paragraph::new("Loading product...").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, inner);
        return;
      }
    };

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(4), // Name, price, stock, ids
        Constraint::Length(1), // Separator
        Constraint::Min(1),    // Description
      ])
      .split(inner);

    let label = Style::default().fg(Color::DarkGray);
    let header = vec![
      Line::from(vec![
        Span::styled("Name: ", label),
        Span::styled(&product.name, Style::default().bold()),
      ]),
      Line::from(vec![
        Span::styled("Price: ", label),
        Span::raw(format_price(product.price)),
        Span::raw("  "),
        Span::styled("Stock: ", label),
        Span::styled(
          product.stock.to_string(),
          Style::default().fg(stock_color(product.stock)),
        ),
      ]),
      Line::from(vec![
        Span::styled("Seller: ", label),
        Span::raw(product.seller_id.to_string()),
        Span::raw("  "),
        Span::styled("Category: ", label),
        Span::raw(product.category_id.to_string()),
      ]),
    ];
    frame.render_widget(Paragraph::new(header), chunks[0]);

    let sep = Paragraph::new("─".repeat(chunks[1].width as usize))
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(sep, chunks[1]);

    let desc = if product.description.is_empty() {
      "No description"
    } else {
      product.description.as_str()
    };
    let desc_para = Paragraph::new(desc).wrap(Wrap { trim: true });
    frame.render_widget(desc_para, chunks[2]);
  }
}

impl<S: ProductStore> View for ProductDetailView<S> {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.confirm.handle_key(key) {
      KeyResult::Event(id) => {
        let catalog = self.catalog.clone();
        self.notice = Some("Deleting...".to_string());
        self
          .delete
          .mutate(async move { catalog.delete_product(id).await });
        return ViewAction::None;
      }
      KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('r') => {
        self.query.refetch();
        ViewAction::None
      }
      KeyCode::Char('e') => match self.query.data() {
        Some(product) => ViewAction::Push(Box::new(ProductFormView::edit(
          self.catalog.clone(),
          product.clone(),
        ))),
        None => ViewAction::None,
      },
      KeyCode::Char('d') => {
        if !self.delete.is_pending() {
          let name = self
            .query
            .data()
            .map(|p| truncate(&p.name, 40))
            .unwrap_or_else(|| format!("#{}", self.id));
          self.confirm.ask(self.id, format!("Delete \"{}\"?", name));
        }
        ViewAction::None
      }
      KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_detail(frame, area);
    self.confirm.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    match self.query.data() {
      Some(product) => format!("#{} {}", self.id, truncate(&product.name, 24)),
      None => format!("#{}", self.id),
    }
  }

  fn status_message(&self) -> Option<String> {
    self.notice.clone()
  }

  fn tick(&mut self) -> ViewAction {
    if self.delete.poll() {
      match self.delete.take_outcome() {
        Some(Ok(())) => return ViewAction::Pop,
        Some(Err(e)) => self.notice = Some(format!("Delete failed: {}", e)),
        None => {}
      }
    }

    // The entry is removed by our own delete; don't refetch it meanwhile
    if !self.delete.is_pending() {
      self.query.poll();
    }
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    if self.confirm.is_active() {
      return self.confirm.shortcuts();
    }
    vec![
      Shortcut::new("e", "edit").with_priority(10),
      Shortcut::new("d", "delete").with_priority(20),
      Shortcut::new("r", "refresh").with_priority(30),
      Shortcut::new("q", "back").with_priority(90),
    ]
  }
}
