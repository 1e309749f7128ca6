//! HTTP error type.
//!
//! Every failure path in the daemon ends in an [`ApiError`], which renders
//! as an [`Envelope`] with empty data.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cart_auth::AuthError;
use cart_core::{CartOp, Denial, GuardError, StoreError};

use crate::api_types::{Envelope, Payload};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal service error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        Envelope::new(self.status, self.message, Payload::Empty).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if err.is_client_error() {
            ApiError::unauthorized("Unauthorized")
        } else {
            ApiError::internal()
        }
    }
}

impl From<StoreError> for ApiError {
    /// Connectivity failures and failed inserts are 500; a failed lookup,
    /// update or bulk statement reads as "not found".
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(_) => ApiError::internal(),
            StoreError::Statement { op, .. } => match op {
                CartOp::Insert => ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Cart could not be made",
                ),
                CartOp::Fetch | CartOp::Update => ApiError::not_found("Cart not found"),
                CartOp::List => ApiError::not_found("Error loading cart"),
                CartOp::BulkTransition => ApiError::not_found("Error updating cart"),
                CartOp::Ping => ApiError::internal(),
            },
        }
    }
}

impl From<GuardError> for ApiError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::NotFound => ApiError::not_found("Cart not found"),
            GuardError::Denied(Denial::AlreadyDeleted) => {
                ApiError::unauthorized("Error cart already deleted")
            }
            GuardError::Denied(_) => ApiError::unauthorized("Unauthorized"),
            GuardError::Store(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cart_core::CartStatus;

    #[test]
    fn denials_are_401() {
        for d in [
            Denial::NotOwner,
            Denial::NotActive(CartStatus::Purchased),
            Denial::AlreadyDeleted,
        ] {
            assert_eq!(
                ApiError::from(GuardError::Denied(d)).status,
                StatusCode::UNAUTHORIZED
            );
        }
    }

    #[test]
    fn store_failures_follow_operation() {
        let unavailable = ApiError::from(StoreError::Unavailable("x".into()));
        assert_eq!(unavailable.status, StatusCode::INTERNAL_SERVER_ERROR);

        let insert = ApiError::from(StoreError::statement(CartOp::Insert, "x"));
        assert_eq!(insert.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(insert.message, "Cart could not be made");

        let fetch = ApiError::from(StoreError::statement(CartOp::Fetch, "x"));
        assert_eq!(fetch.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn auth_internal_failure_is_500() {
        assert_eq!(
            ApiError::from(AuthError::Internal("x".into())).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(AuthError::Expired).status,
            StatusCode::UNAUTHORIZED
        );
    }
}
