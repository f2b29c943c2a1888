use ratatui::prelude::Color;
use rust_decimal::Decimal;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Format a price with two decimal places
pub fn format_price(price: Decimal) -> String {
  format!("{:.2}", price.round_dp(2))
}

/// Get the display color for a stock level
pub fn stock_color(stock: u32) -> Color {
  match stock {
    0 => Color::Red,
    1..=5 => Color::Yellow,
    _ => Color::Green,
  }
}
