//! HTTP mapping for engine failures.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::engine::dispatcher::ActionError;
use crate::error::{DispatchError, ErrorKind};

/// `{ "ok": false, "error": { "kind": ..., "message": ... } }`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: ActionError,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Dispatch(DispatchError::InvalidRequest(rejection.body_text()))
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFoundError => StatusCode::NOT_FOUND,
        ErrorKind::InvalidTransitionError
        | ErrorKind::AlertBusyError
        | ErrorKind::DuplicateIdError => StatusCode::CONFLICT,
        ErrorKind::ConcurrencyTimeoutError => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::InvalidRequestError => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Dispatch(err) = self;
        let body = ErrorBody {
            ok: false,
            error: (&err).into(),
        };
        (status_for(err.kind()), Json(body)).into_response()
    }
}
