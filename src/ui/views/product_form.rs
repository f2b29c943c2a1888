use crate::catalog::{CachedProductClient, Product, ProductStore};
use crate::query::Mutation;
use crate::ui::components::{InputResult, TextInput};
use crate::ui::view::{Shortcut, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Form fields, in tab order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
  Name,
  Description,
  Price,
  Stock,
  SellerId,
  CategoryId,
}

impl Field {
  const ALL: [Field; 6] = [
    Field::Name,
    Field::Description,
    Field::Price,
    Field::Stock,
    Field::SellerId,
    Field::CategoryId,
  ];

  fn label(self) -> &'static str {
    match self {
      Field::Name => "Name",
      Field::Description => "Description",
      Field::Price => "Price",
      Field::Stock => "Stock",
      Field::SellerId => "Seller ID",
      Field::CategoryId => "Category ID",
    }
  }
}

/// What the form writes on submit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
  Create,
  Update(i64),
}

/// Form for creating a product or editing an existing one
pub struct ProductFormView<S: ProductStore> {
  catalog: CachedProductClient<S>,
  target: Target,
  inputs: [TextInput; 6],
  focus: usize,
  errors: Vec<String>,
  submit: Mutation<Product>,
}

impl<S: ProductStore> ProductFormView<S> {
  /// Empty form that creates a new product
  pub fn create(catalog: CachedProductClient<S>) -> Self {
    Self {
      catalog,
      target: Target::Create,
      inputs: Default::default(),
      focus: 0,
      errors: Vec::new(),
      submit: Mutation::new(),
    }
  }

  /// Form prefilled with `product`, updating it on submit.
  ///
  /// A product without an id opens as a create form.
  pub fn edit(catalog: CachedProductClient<S>, product: Product) -> Self {
    let target = match product.id {
      Some(id) => Target::Update(id),
      None => Target::Create,
    };
    Self {
      catalog,
      target,
      inputs: [
        TextInput::with_value(product.name),
        TextInput::with_value(product.description),
        // Every stored digit, not the rounded display form
        TextInput::with_value(product.price.normalize().to_string()),
        TextInput::with_value(product.stock.to_string()),
        TextInput::with_value(product.seller_id.to_string()),
        TextInput::with_value(product.category_id.to_string()),
      ],
      focus: 0,
      errors: Vec::new(),
      submit: Mutation::new(),
    }
  }

  fn value(&self, field: Field) -> &str {
    self.inputs[field as usize].value()
  }

  /// Parse every field, collecting one message per invalid field
  fn parse(&self) -> Result<Product, Vec<String>> {
    let mut errors = Vec::new();

    let name = self.value(Field::Name).trim().to_string();
    if name.is_empty() {
      errors.push("Name is required".to_string());
    }

    let price = match Decimal::from_str(self.value(Field::Price).trim()) {
      Ok(price) if price < Decimal::ZERO => {
        errors.push("Price must not be negative".to_string());
        None
      }
      Ok(price) => Some(price),
      Err(_) => {
        errors.push("Price must be a number, e.g. 19.99".to_string());
        None
      }
    };

    let stock = parse_whole::<u32>(self.value(Field::Stock), Field::Stock, &mut errors);
    let seller_id = parse_whole::<i64>(self.value(Field::SellerId), Field::SellerId, &mut errors);
    let category_id =
      parse_whole::<i64>(self.value(Field::CategoryId), Field::CategoryId, &mut errors);

    match (price, stock, seller_id, category_id) {
      (Some(price), Some(stock), Some(seller_id), Some(category_id)) if errors.is_empty() => {
        Ok(Product::draft(
          name,
          self.value(Field::Description).trim(),
          price,
          stock,
          seller_id,
          category_id,
        ))
      }
      _ => Err(errors),
    }
  }

  fn save(&mut self) {
    if self.submit.is_pending() {
      return;
    }

    let product = match self.parse() {
      Ok(product) => product,
      Err(errors) => {
        self.errors = errors;
        return;
      }
    };
    self.errors.clear();

    let catalog = self.catalog.clone();
    match self.target {
      Target::Create => self
        .submit
        .mutate(async move { catalog.create_product(product).await }),
      Target::Update(id) => self
        .submit
        .mutate(async move { catalog.update_product(id, product.with_id(id)).await }),
    }
  }

  fn title(&self) -> String {
    match self.target {
      Target::Create => " New product ".to_string(),
      Target::Update(id) => format!(" Edit product #{} ", id),
    }
  }

  fn render_form(&self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(self.title())
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    const LABEL_WIDTH: u16 = 14;
    let mut lines: Vec<Line> = Vec::new();
    for (idx, field) in Field::ALL.iter().enumerate() {
      let focused = idx == self.focus;
      let label_style = if focused {
        Style::default().fg(Color::Cyan).bold()
      } else {
        Style::default().fg(Color::DarkGray)
      };
      lines.push(Line::from(vec![
        Span::styled(
          format!("{:<width$}", field.label(), width = LABEL_WIDTH as usize),
          label_style,
        ),
        Span::raw(self.inputs[idx].value().to_string()),
      ]));
    }

    lines.push(Line::raw(""));
    if self.submit.is_pending() {
      lines.push(Line::styled(
        "Saving...",
        Style::default().fg(Color::Yellow),
      ));
    }
    for error in &self.errors {
      lines.push(Line::styled(
        error.clone(),
        Style::default().fg(Color::Red),
      ));
    }

    frame.render_widget(Paragraph::new(lines), inner);

    // Place the terminal cursor inside the focused input
    if self.focus < inner.height as usize {
      let cursor = self.inputs[self.focus].cursor_position() as u16;
      let x = (inner.x + LABEL_WIDTH + cursor).min(inner.right().saturating_sub(1));
      frame.set_cursor_position(Position::new(x, inner.y + self.focus as u16));
    }
  }
}

fn parse_whole<T>(raw: &str, field: Field, errors: &mut Vec<String>) -> Option<T>
where
  T: FromStr + PartialOrd + Default,
{
  match raw.trim().parse::<T>() {
    Ok(value) if value >= T::default() => Some(value),
    _ => {
      errors.push(format!("{} must be a non-negative whole number", field.label()));
      None
    }
  }
}

impl<S: ProductStore> View for ProductFormView<S> {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Esc => return ViewAction::Pop,
      KeyCode::Enter => {
        self.save();
        return ViewAction::None;
      }
      KeyCode::Tab | KeyCode::Down => {
        self.focus = (self.focus + 1) % Field::ALL.len();
        return ViewAction::None;
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.focus = (self.focus + Field::ALL.len() - 1) % Field::ALL.len();
        return ViewAction::None;
      }
      _ => {}
    }

    if !self.submit.is_pending() {
      if let InputResult::Consumed = self.inputs[self.focus].handle_key(key) {
        self.errors.clear();
      }
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_form(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    match self.target {
      Target::Create => "New".to_string(),
      Target::Update(id) => format!("Edit #{}", id),
    }
  }

  fn tick(&mut self) -> ViewAction {
    if self.submit.poll() {
      match self.submit.take_outcome() {
        Some(Ok(_)) => return ViewAction::Pop,
        Some(Err(e)) => self.errors = vec![e.to_string()],
        None => {}
      }
    }
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("tab", "next field").with_priority(10),
      Shortcut::new("enter", "save").with_priority(20),
      Shortcut::new("esc", "cancel").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::testing::InMemoryStore;
  use crate::catalog::{ProductCache, ProductKey};
  use crossterm::event::KeyModifiers;
  use std::time::Duration;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn catalog(store: InMemoryStore) -> CachedProductClient<InMemoryStore> {
    CachedProductClient::new(store, ProductCache::new())
  }

  fn type_text(view: &mut ProductFormView<InMemoryStore>, text: &str) {
    for c in text.chars() {
      view.handle_key(key(KeyCode::Char(c)));
    }
  }

  fn fill(view: &mut ProductFormView<InMemoryStore>, values: [&str; 6]) {
    for value in values {
      type_text(view, value);
      view.handle_key(key(KeyCode::Tab));
    }
  }

  async fn tick_until_pop(view: &mut ProductFormView<InMemoryStore>) -> bool {
    for _ in 0..10 {
      tokio::time::sleep(Duration::from_millis(10)).await;
      if matches!(view.tick(), ViewAction::Pop) {
        return true;
      }
    }
    false
  }

  #[tokio::test]
  async fn test_create_submits_and_pops() {
    let store = InMemoryStore::new();
    let catalog = catalog(store.clone());
    let mut view = ProductFormView::create(catalog.clone());

    fill(&mut view, ["Desk", "Oak, 120cm", "249.00", "3", "7", "2"]);
    view.handle_key(key(KeyCode::Enter));
    assert!(tick_until_pop(&mut view).await);

    let listed = catalog.list_products().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Desk");
    assert_eq!(listed[0].price, Decimal::new(24900, 2));
    assert_eq!(listed[0].seller_id, 7);
  }

  #[tokio::test]
  async fn test_parse_errors_stay_inline() {
    let store = InMemoryStore::new();
    let mut view = ProductFormView::create(catalog(store.clone()));

    fill(&mut view, ["", "", "cheap", "-1", "7", "x"]);
    view.handle_key(key(KeyCode::Enter));

    assert_eq!(
      view.errors,
      vec![
        "Name is required".to_string(),
        "Price must be a number, e.g. 19.99".to_string(),
        "Stock must be a non-negative whole number".to_string(),
        "Category ID must be a non-negative whole number".to_string(),
      ]
    );
    assert!(!tick_until_pop(&mut view).await);
    assert_eq!(store.calls("create"), 0);
  }

  #[tokio::test]
  async fn test_edit_prefills_and_updates() {
    let existing = Product::draft("Chair", "", Decimal::new(3000, 2), 5, 1, 1);
    let store = InMemoryStore::with_products([existing.clone()]);
    let catalog = catalog(store.clone());
    let mut view = ProductFormView::edit(catalog.clone(), existing.with_id(1));

    assert_eq!(view.value(Field::Price), "30");
    assert_eq!(view.breadcrumb_label(), "Edit #1");

    // Replace the name
    view.handle_key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
    type_text(&mut view, "Armchair");
    view.handle_key(key(KeyCode::Enter));
    assert!(tick_until_pop(&mut view).await);

    assert_eq!(store.calls("update"), 1);
    assert_eq!(catalog.get_product(1).await.unwrap().name, "Armchair");
    assert!(catalog.cache().snapshot(&ProductKey(1)).is_some());
  }

  #[tokio::test]
  async fn test_edit_keeps_precise_price() {
    let existing = Product::draft("Lamp", "", Decimal::new(19999, 3), 1, 1, 1);
    let store = InMemoryStore::with_products([existing.clone()]);
    let catalog = catalog(store);
    let mut view = ProductFormView::edit(catalog.clone(), existing.with_id(1));

    assert_eq!(view.value(Field::Price), "19.999");
    type_text(&mut view, "x");
    view.handle_key(key(KeyCode::Enter));
    assert!(tick_until_pop(&mut view).await);

    let saved = catalog.get_product(1).await.unwrap();
    assert_eq!(saved.name, "Lampx");
    assert_eq!(saved.price, Decimal::new(19999, 3));
  }

  #[tokio::test]
  async fn test_negative_ids_rejected() {
    let store = InMemoryStore::new();
    let mut view = ProductFormView::create(catalog(store.clone()));

    fill(&mut view, ["Desk", "", "10", "1", "-7", "-2"]);
    view.handle_key(key(KeyCode::Enter));

    assert_eq!(
      view.errors,
      vec![
        "Seller ID must be a non-negative whole number".to_string(),
        "Category ID must be a non-negative whole number".to_string(),
      ]
    );
    assert_eq!(store.calls("create"), 0);
  }

  #[tokio::test]
  async fn test_store_error_is_shown() {
    let store = InMemoryStore::new();
    store.set_unreachable(true);
    let mut view = ProductFormView::create(catalog(store));

    fill(&mut view, ["Desk", "", "10", "1", "1", "1"]);
    view.handle_key(key(KeyCode::Enter));

    assert!(!tick_until_pop(&mut view).await);
    assert_eq!(view.errors.len(), 1);
  }

  #[test]
  fn test_focus_wraps() {
    // Building the view does not touch the runtime
    let mut view = ProductFormView::create(catalog(InMemoryStore::new()));
    view.handle_key(key(KeyCode::BackTab));
    assert_eq!(view.focus, Field::ALL.len() - 1);
    view.handle_key(key(KeyCode::Tab));
    assert_eq!(view.focus, 0);
    assert!(matches!(view.handle_key(key(KeyCode::Esc)), ViewAction::Pop));
  }
}
