//! One-shot commands that print JSON to stdout.

use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::catalog::{self, Product};
use crate::config::Config;

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
  /// Browse the catalog in the terminal UI (default)
  Browse,
  /// List all products
  List,
  /// Show one product
  Get { id: i64 },
  /// Create a product
  Create(ProductArgs),
  /// Replace every field of a product
  Update {
    id: i64,
    #[command(flatten)]
    product: ProductArgs,
  },
  /// Delete a product
  Delete { id: i64 },
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct ProductArgs {
  #[arg(long)]
  pub name: String,
  #[arg(long, default_value = "")]
  pub description: String,
  /// Unit price, e.g. 19.99
  #[arg(long)]
  pub price: Decimal,
  #[arg(long, default_value_t = 0)]
  pub stock: u32,
  #[arg(long)]
  pub seller_id: i64,
  #[arg(long)]
  pub category_id: i64,
}

impl ProductArgs {
  fn into_draft(self) -> Product {
    Product::draft(
      self.name,
      self.description,
      self.price,
      self.stock,
      self.seller_id,
      self.category_id,
    )
  }
}

/// Run a non-interactive command against the configured store
pub async fn run(command: Command, config: &Config) -> Result<()> {
  let catalog = catalog::connect(config)?;

  match command {
    Command::Browse => return Err(eyre!("browse is handled by the terminal UI")),
    Command::List => print_json(&catalog.list_products().await?),
    Command::Get { id } => print_json(&catalog.get_product(id).await?),
    Command::Create(args) => print_json(&catalog.create_product(args.into_draft()).await?),
    Command::Update { id, product } => {
      print_json(&catalog.update_product(id, product.into_draft()).await?)
    }
    Command::Delete { id } => {
      catalog.delete_product(id).await?;
      print_json(&serde_json::json!({ "deleted": id }))
    }
  }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  let json =
    serde_json::to_string_pretty(value).map_err(|e| eyre!("Failed to encode output: {}", e))?;
  println!("{}", json);
  Ok(())
}
