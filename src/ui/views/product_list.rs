use crate::catalog::{CachedProductClient, Product, ProductStore, ProductsKey};
use crate::query::{Mutation, Query, QueryState};
use crate::ui::components::{ConfirmPrompt, KeyResult};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{format_price, stock_color, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::{ProductDetailView, ProductFormView};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Root view listing every product in the catalog
pub struct ProductListView<S: ProductStore> {
  catalog: CachedProductClient<S>,
  query: Query<Vec<Product>>,
  list_state: ListState,
  confirm: ConfirmPrompt<i64>,
  delete: Mutation<()>,
  notice: Option<String>,
}

impl<S: ProductStore> ProductListView<S> {
  pub fn new(catalog: CachedProductClient<S>) -> Self {
    let catalog_for_query = catalog.clone();
    let mut query = Query::new(move || {
      let catalog = catalog_for_query.clone();
      async move { catalog.list_products().await }
    })
    .watching(catalog.cache(), &ProductsKey);

    // Start fetching immediately
    query.fetch();

    Self {
      catalog,
      query,
      list_state: ListState::default(),
      confirm: ConfirmPrompt::new(),
      delete: Mutation::new(),
      notice: None,
    }
  }

  fn products(&self) -> &[Product] {
    self.query.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn selected(&self) -> Option<&Product> {
    self
      .list_state
      .selected()
      .and_then(|idx| self.products().get(idx))
  }

  fn start_delete(&mut self, id: i64) {
    let catalog = self.catalog.clone();
    self.notice = Some(format!("Deleting #{}...", id));
    self
      .delete
      .mutate(async move { catalog.delete_product(id).await });
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.products().len();
    ensure_valid_selection(&mut self.list_state, len);

    let title = match self.query.state() {
      QueryState::Loading(None) => " Products (loading...) ".to_string(),
      QueryState::Loading(Some(_)) => format!(" Products ({}) (refreshing...) ", len),
      QueryState::Error(e) => format!(" Products (error: {}) ", e),
      _ => format!(" Products ({}) ", len),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if self.products().is_empty() && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load products. Press 'r' to retry."
      } else {
        "No products yet. Press 'n' to create one."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = self
      .products()
      .iter()
      .map(|product| {
        let id = product
          .id
          .map(|id| format!("#{}", id))
          .unwrap_or_default();
        let line = Line::from(vec![
          Span::styled(format!("{:<7}", id), Style::default().fg(Color::Cyan)),
          Span::raw(format!("{:<32}", truncate(&product.name, 30))),
          Span::styled(
            format!("{:>10}", format_price(product.price)),
            Style::default().fg(Color::White),
          ),
          Span::raw("  "),
          Span::styled(
            format!("{:>5} in stock", product.stock),
            Style::default().fg(stock_color(product.stock)),
          ),
        ]);
        ListItem::new(line)
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl<S: ProductStore> View for ProductListView<S> {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    // An open delete question takes every key
    match self.confirm.handle_key(key) {
      KeyResult::Event(id) => {
        self.start_delete(id);
        return ViewAction::None;
      }
      KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.list_state.select_next();
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.list_state.select_previous();
      }
      KeyCode::Char('r') => {
        self.notice = None;
        self.query.refetch();
      }
      KeyCode::Char('n') => {
        return ViewAction::Push(Box::new(ProductFormView::create(self.catalog.clone())));
      }
      KeyCode::Enter => {
        if let Some(id) = self.selected().and_then(|p| p.id) {
          return ViewAction::Push(Box::new(ProductDetailView::new(id, self.catalog.clone())));
        }
      }
      KeyCode::Char('e') => {
        if let Some(product) = self.selected().filter(|p| p.id.is_some()) {
          return ViewAction::Push(Box::new(ProductFormView::edit(
            self.catalog.clone(),
            product.clone(),
          )));
        }
      }
      KeyCode::Char('d') => {
        if self.delete.is_pending() {
          return ViewAction::None;
        }
        if let Some(product) = self.selected() {
          if let Some(id) = product.id {
            let question = format!("Delete \"{}\"?", truncate(&product.name, 40));
            self.confirm.ask(id, question);
          }
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
    self.confirm.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Products".to_string()
  }

  fn status_message(&self) -> Option<String> {
    self.notice.clone()
  }

  fn tick(&mut self) -> ViewAction {
    self.query.poll();
    if self.delete.poll() {
      self.notice = match self.delete.take_outcome() {
        Some(Ok(())) => Some("Product deleted".to_string()),
        Some(Err(e)) => Some(format!("Delete failed: {}", e)),
        None => None,
      };
    }
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    if self.confirm.is_active() {
      return self.confirm.shortcuts();
    }
    vec![
      Shortcut::new("enter", "open").with_priority(10),
      Shortcut::new("n", "new").with_priority(20),
      Shortcut::new("e", "edit").with_priority(30),
      Shortcut::new("d", "delete").with_priority(40),
      Shortcut::new("r", "refresh").with_priority(50),
      Shortcut::new("q", "quit").with_priority(90),
    ]
  }
}
