//! Error kinds surfaced by the product data access layer.

use reqwest::StatusCode;
use thiserror::Error;

/// Which store operation a response belongs to.
///
/// The same status code means different things depending on the operation:
/// a 400 on create is a validation failure, a 404 on get means the product
/// does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  List,
  Get(i64),
  Create,
  Update(i64),
  Delete(i64),
}

/// Failure of a product store call.
///
/// Cloneable so that every caller coalesced onto one in-flight fetch
/// receives the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
  #[error("transport error: {0}")]
  Transport(String),
  #[error("product {id} not found")]
  NotFound { id: i64 },
  #[error("invalid product: {0}")]
  Validation(String),
  #[error("server error ({status}): {message}")]
  Server { status: u16, message: String },
  #[error("request rejected ({status}): {message}")]
  Rejected { status: u16, message: String },
  #[error("unexpected response body: {0}")]
  Decode(String),
  #[error("request did not complete: {0}")]
  Aborted(String),
}

impl ApiError {
  /// Classify a non-success status for the given operation.
  pub fn from_status(op: Operation, status: StatusCode, body: &str) -> Self {
    let message = if body.trim().is_empty() {
      status
        .canonical_reason()
        .unwrap_or("no response body")
        .to_string()
    } else {
      body.trim().to_string()
    };

    if status.is_server_error() {
      return Self::Server {
        status: status.as_u16(),
        message,
      };
    }

    match (op, status) {
      (Operation::Get(id) | Operation::Update(id) | Operation::Delete(id), StatusCode::NOT_FOUND) => {
        Self::NotFound { id }
      }
      (Operation::Create | Operation::Update(_), s) if s.is_client_error() => {
        Self::Validation(message)
      }
      (_, s) => Self::Rejected {
        status: s.as_u16(),
        message,
      },
    }
  }

  /// Whether a configured retry policy may repeat the request.
  ///
  /// Only failures that a second attempt could plausibly fix are retried.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::Transport(_) | Self::Server { .. })
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_decode() {
      Self::Decode(e.to_string())
    } else {
      Self::Transport(e.to_string())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_not_found_on_item_operations() {
    for op in [Operation::Get(42), Operation::Update(42), Operation::Delete(42)] {
      assert_eq!(
        ApiError::from_status(op, StatusCode::NOT_FOUND, ""),
        ApiError::NotFound { id: 42 }
      );
    }
  }

  #[test]
  fn test_bad_request_on_writes_is_validation() {
    let err = ApiError::from_status(Operation::Create, StatusCode::BAD_REQUEST, "name is required");
    assert_eq!(err, ApiError::Validation("name is required".to_string()));

    let err = ApiError::from_status(Operation::Update(1), StatusCode::UNPROCESSABLE_ENTITY, "");
    assert!(matches!(err, ApiError::Validation(_)));
  }

  #[test]
  fn test_server_errors() {
    let err = ApiError::from_status(Operation::List, StatusCode::BAD_GATEWAY, "");
    assert_eq!(
      err,
      ApiError::Server {
        status: 502,
        message: "Bad Gateway".to_string()
      }
    );
    assert!(err.is_retryable());
  }

  #[test]
  fn test_other_client_errors_are_rejected() {
    let err = ApiError::from_status(Operation::List, StatusCode::FORBIDDEN, "nope");
    assert_eq!(
      err,
      ApiError::Rejected {
        status: 403,
        message: "nope".to_string()
      }
    );
    assert!(!err.is_retryable());

    // A 404 on the collection itself is not a missing product.
    let err = ApiError::from_status(Operation::List, StatusCode::NOT_FOUND, "");
    assert!(matches!(err, ApiError::Rejected { status: 404, .. }));
  }

  #[test]
  fn test_retryable_kinds() {
    assert!(ApiError::Transport("connection refused".to_string()).is_retryable());
    assert!(!ApiError::NotFound { id: 1 }.is_retryable());
    assert!(!ApiError::Validation("bad".to_string()).is_retryable());
  }
}
