//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;

/// Body shared by every "forbidden" and "not found" answer.
const NOT_FOUND_MESSAGE: &str = "Not found";

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found, or not visible to the caller.
    NotFound,
    /// Bad request from the client.
    BadRequest(String),
    /// Missing or malformed caller identity.
    Unauthorized(String),
    /// Checkout, payment or fulfillment error.
    Checkout(CheckoutError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE.to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Checkout(err) => checkout_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    if err.is_conflict() {
        return (StatusCode::CONFLICT, CheckoutError::Conflict.to_string());
    }
    match &err {
        CheckoutError::Forbidden | CheckoutError::NotFound(_) => {
            (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE.to_string())
        }
        CheckoutError::Validation(_)
        | CheckoutError::MissingAddress
        | CheckoutError::InvalidSignature => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::OutOfStock(_)
        | CheckoutError::IllegalPaymentState(_)
        | CheckoutError::InvalidTransition(_)
        | CheckoutError::GatewayAvailable
        | CheckoutError::Conflict => (StatusCode::CONFLICT, err.to_string()),
        CheckoutError::GatewayUnavailable => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        CheckoutError::Gateway(gateway) if gateway.is_unavailable() => {
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
        CheckoutError::Gateway(_) => {
            tracing::error!(error = %err, "payment gateway error");
            (StatusCode::BAD_GATEWAY, err.to_string())
        }
        CheckoutError::EventStore(_) | CheckoutError::Domain(_) => {
            tracing::error!(error = %err, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn forbidden_and_not_found_look_the_same() {
        let forbidden = checkout_error_to_response(CheckoutError::Forbidden);
        let missing = checkout_error_to_response(CheckoutError::NotFound("Order".to_string()));
        assert_eq!(forbidden, missing);
        assert_eq!(forbidden.0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn client_errors_are_bad_requests() {
        for err in [
            CheckoutError::Validation("Cart is empty".to_string()),
            CheckoutError::MissingAddress,
            CheckoutError::InvalidSignature,
        ] {
            assert_eq!(status_of(err.into()), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn state_errors_are_conflicts() {
        for err in [
            CheckoutError::OutOfStock("Print is out of stock".to_string()),
            CheckoutError::IllegalPaymentState("not accepted".to_string()),
            CheckoutError::InvalidTransition("shipped -> pending".to_string()),
            CheckoutError::GatewayAvailable,
            CheckoutError::Conflict,
        ] {
            assert_eq!(status_of(err.into()), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn signature_failure_message_is_generic() {
        let (_, message) = checkout_error_to_response(CheckoutError::InvalidSignature);
        assert_eq!(message, "payment verification failed");
    }
}
