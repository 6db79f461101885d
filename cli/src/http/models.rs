//! HTTP response bodies and the error type handlers return.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use incidentops_core::api::DispatchError;
use serde::{Deserialize, Serialize};

pub use incidentops_core::api::StartAck as StartResponse;

// ============= Health =============

#[derive(Debug, Serialize, Deserialize)]
pub struct DispatchHealth {
    pub status: String,
    pub service: String,
    pub ts: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RelayHealth {
    pub ok: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WorkerHealth {
    pub status: String,
    pub service: String,
}

// ============= Error Handling =============

#[derive(Debug)]
pub enum HttpServerError {
    InvalidRequest(String),
    BusUnavailable(String),
    Internal(String),
}

impl HttpServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::BusUnavailable(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DispatchError> for HttpServerError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::InvalidArgument(msg) => Self::InvalidRequest(msg),
            e @ DispatchError::BusUnavailable(_) => Self::BusUnavailable(e.to_string()),
        }
    }
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_code, detail) = match self {
            Self::InvalidRequest(msg) => ("INVALID_REQUEST", msg),
            Self::BusUnavailable(msg) => ("BUS_UNAVAILABLE", msg),
            Self::Internal(msg) => ("INTERNAL_ERROR", msg),
        };

        let body = serde_json::json!({
            "detail": detail,
            "error_code": error_code,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use incidentops_core::api::BusError;

    #[test]
    fn test_dispatch_error_mapping() {
        let err: HttpServerError =
            DispatchError::InvalidArgument("Scenario name is required".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: HttpServerError = DispatchError::BusUnavailable(BusError::Disconnected).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        match err {
            HttpServerError::BusUnavailable(msg) => {
                assert!(msg.contains("Failed to dispatch scenario"));
                assert!(msg.contains("connection lost"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_relay_health_shape() {
        let json = serde_json::to_string(&RelayHealth { ok: true }).unwrap();
        assert_eq!(json, r#"{"ok":true}"#);
    }
}
