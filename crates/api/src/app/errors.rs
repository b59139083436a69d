use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use kardex_core::DomainError;
use kardex_infra::ServiceError;
use kardex_infra::store::StoreError;

pub type ApiResult<T> = Result<T, ApiError>;

/// A service failure on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError(ServiceError::Domain(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            ServiceError::Domain(err) => domain_error_to_response(err),
            ServiceError::Store(err) => store_error_to_response(err),
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> Response {
    let message = err.to_string();
    let code = err.code();
    let (status, details) = match err {
        DomainError::NotFound { entity, key } => {
            (StatusCode::NOT_FOUND, json!({ "entity": entity, "key": key }))
        }
        DomainError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, Value::Null),
        DomainError::InsufficientStock {
            sku,
            available,
            required,
        } => (
            StatusCode::CONFLICT,
            json!({ "sku": sku, "available": available, "required": required }),
        ),
        DomainError::Duplicate {
            entity,
            field,
            value,
        } => (
            StatusCode::CONFLICT,
            json!({ "entity": entity, "field": field, "value": value }),
        ),
        DomainError::Conflict(_) => (StatusCode::CONFLICT, Value::Null),
    };
    json_error(status, code, message, details)
}

fn store_error_to_response(err: StoreError) -> Response {
    tracing::error!(error = %err, "store failure");
    match err {
        StoreError::Unavailable(_) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "STORE_UNAVAILABLE",
            "document store is unavailable",
            Value::Null,
        ),
        _ => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "internal store error",
            Value::Null,
        ),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    details: Value,
) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.into(),
            "details": details,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_failures_map_to_client_statuses() {
        let cases = [
            (DomainError::not_found("products", "X"), StatusCode::NOT_FOUND),
            (DomainError::validation("bad"), StatusCode::UNPROCESSABLE_ENTITY),
            (DomainError::insufficient_stock("A", 1, 2), StatusCode::CONFLICT),
            (DomainError::duplicate("products", "sku", "A"), StatusCode::CONFLICT),
            (DomainError::conflict("stale"), StatusCode::CONFLICT),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn outages_are_server_errors() {
        let unavailable = ApiError(ServiceError::Store(StoreError::Unavailable("down".into())));
        assert_eq!(unavailable.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let broken = ApiError(ServiceError::Store(StoreError::Backend("boom".into())));
        assert_eq!(broken.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
