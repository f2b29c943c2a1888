use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::ApiError;

/// A catalog product.
///
/// A product without an `id` is a draft that has not been persisted yet.
/// Once the store assigns an `id` it never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<i64>,
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(with = "rust_decimal::serde::float")]
  pub price: Decimal,
  pub stock: u32,
  pub seller_id: i64,
  pub category_id: i64,
}

impl Product {
  /// Create a new draft product.
  pub fn draft(
    name: impl Into<String>,
    description: impl Into<String>,
    price: Decimal,
    stock: u32,
    seller_id: i64,
    category_id: i64,
  ) -> Self {
    Self {
      id: None,
      name: name.into(),
      description: description.into(),
      price,
      stock,
      seller_id,
      category_id,
    }
  }

  pub fn is_draft(&self) -> bool {
    self.id.is_none()
  }

  /// Copy of this product with the given id, as the store returns it after a write.
  pub fn with_id(mut self, id: i64) -> Self {
    self.id = Some(id);
    self
  }

  /// Check the field constraints the store would otherwise reject.
  pub fn validate(&self) -> Result<(), ApiError> {
    if self.name.trim().is_empty() {
      return Err(ApiError::Validation("name must not be empty".to_string()));
    }
    if self.price < Decimal::ZERO {
      return Err(ApiError::Validation(format!(
        "price must not be negative (got {})",
        self.price
      )));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::str::FromStr;

  fn widget() -> Product {
    Product::draft(
      "Widget",
      "A small widget",
      Decimal::from_str("19.99").unwrap(),
      5,
      1,
      2,
    )
  }

  #[test]
  fn test_draft_has_no_id() {
    let product = widget();
    assert!(product.is_draft());
    assert!(!product.with_id(7).is_draft());
  }

  #[test]
  fn test_draft_serializes_without_id() {
    let json = serde_json::to_value(widget()).unwrap();
    assert!(json.get("id").is_none());
    assert_eq!(json["sellerId"], 1);
    assert_eq!(json["categoryId"], 2);
    assert_eq!(json["price"], 19.99);
  }

  #[test]
  fn test_deserialize_store_response() {
    let body = r#"{
      "id": 12,
      "name": "Lamp",
      "description": "Desk lamp",
      "price": 24.5,
      "stock": 3,
      "sellerId": 4,
      "categoryId": 9
    }"#;
    let product: Product = serde_json::from_str(body).unwrap();
    assert_eq!(product.id, Some(12));
    assert_eq!(product.name, "Lamp");
    assert_eq!(product.price, Decimal::from_str("24.5").unwrap());
    assert_eq!(product.seller_id, 4);
    assert_eq!(product.category_id, 9);
  }

  #[test]
  fn test_negative_stock_is_rejected_on_decode() {
    let body = r#"{"id":1,"name":"x","description":"","price":1,"stock":-1,"sellerId":1,"categoryId":1}"#;
    assert!(serde_json::from_str::<Product>(body).is_err());
  }

  #[test]
  fn test_validate_empty_name() {
    let mut product = widget();
    product.name = "   ".to_string();
    assert!(matches!(product.validate(), Err(ApiError::Validation(_))));
  }

  #[test]
  fn test_validate_negative_price() {
    let mut product = widget();
    product.price = Decimal::from_str("-0.01").unwrap();
    assert!(matches!(product.validate(), Err(ApiError::Validation(_))));

    product.price = Decimal::ZERO;
    assert!(product.validate().is_ok());
  }
}
