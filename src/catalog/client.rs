use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;

use super::error::{ApiError, Operation};
use super::store::ProductStore;
use super::types::Product;

/// HTTP client for the remote product store.
#[derive(Clone)]
pub struct ProductClient {
  http: reqwest::Client,
  base_url: Url,
}

impl ProductClient {
  pub fn new(config: &Config) -> Result<Self> {
    let base_url = config.api.base_url()?;
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.api.timeout_secs))
      .user_agent(concat!("ronin/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base_url })
  }

  /// Host (and port) of the store, for display.
  pub fn host(&self) -> String {
    display_host(&self.base_url)
  }

  fn collection_url(&self) -> Url {
    self.base_url.clone()
  }

  fn item_url(&self, id: i64) -> Url {
    item_url(&self.base_url, id)
  }

  async fn send(
    &self,
    op: Operation,
    method: Method,
    url: Url,
    body: Option<&Product>,
  ) -> Result<Response, ApiError> {
    debug!(?op, %method, %url, "sending product store request");

    let mut request = self.http.request(method, url);
    if let Some(product) = body {
      request = request.json(product);
    }

    let response = request.send().await.map_err(|e| {
      warn!(?op, error = %e, "product store unreachable");
      ApiError::from(e)
    })?;

    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    // Body is only used for the error message
    let body = response.text().await.unwrap_or_default();
    let err = ApiError::from_status(op, status, &body);
    warn!(?op, %status, error = %err, "product store returned an error");
    Err(err)
  }

  async fn send_json<T: DeserializeOwned>(
    &self,
    op: Operation,
    method: Method,
    url: Url,
    body: Option<&Product>,
  ) -> Result<T, ApiError> {
    let response = self.send(op, method, url, body).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
  }
}

impl ProductStore for ProductClient {
  async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
    self
      .send_json(Operation::List, Method::GET, self.collection_url(), None)
      .await
  }

  async fn get_product(&self, id: i64) -> Result<Product, ApiError> {
    self
      .send_json(Operation::Get(id), Method::GET, self.item_url(id), None)
      .await
  }

  async fn create_product(&self, draft: &Product) -> Result<Product, ApiError> {
    let created: Product = self
      .send_json(
        Operation::Create,
        Method::POST,
        self.collection_url(),
        Some(draft),
      )
      .await?;

    if created.id.is_none() {
      return Err(ApiError::Decode(
        "created product is missing its id".to_string(),
      ));
    }
    Ok(created)
  }

  async fn update_product(&self, id: i64, product: &Product) -> Result<Product, ApiError> {
    self
      .send_json(
        Operation::Update(id),
        Method::PUT,
        self.item_url(id),
        Some(product),
      )
      .await
  }

  async fn delete_product(&self, id: i64) -> Result<(), ApiError> {
    self
      .send(Operation::Delete(id), Method::DELETE, self.item_url(id), None)
      .await?;
    Ok(())
  }
}

fn display_host(url: &Url) -> String {
  match (url.host_str(), url.port()) {
    (Some(host), Some(port)) => format!("{}:{}", host, port),
    (Some(host), None) => host.to_string(),
    _ => url.to_string(),
  }
}

/// URL of a single product below the collection URL.
fn item_url(base: &Url, id: i64) -> Url {
  let mut url = base.clone();
  if let Ok(mut segments) = url.path_segments_mut() {
    segments.pop_if_empty().push(&id.to_string());
  }
  url
}
