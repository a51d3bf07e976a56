use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::{reconcile::FieldErrors, types::ModelKind};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Client left out required fields or sent values that aren't numbers.
    #[error("{0}")]
    MissingField(#[from] FieldErrors),
    /// Model or scaler unavailable, or the runtime failed.
    #[error("{0}")]
    InferenceFailure(String),
    #[error("{0}")]
    MalformedRequest(String),
    /// The model produced a class its label table doesn't have.
    #[error("{model} model returned class {index} but has only {len} labels")]
    ClassOutOfRange {
        model: ModelKind,
        index: usize,
        len: usize,
    },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingField(_) => StatusCode::BAD_REQUEST,
            ApiError::InferenceFailure(_)
            | ApiError::MalformedRequest(_)
            | ApiError::ClassOutOfRange { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedRequest(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    missing_fields: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    invalid_fields: Option<&'a [String]>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::MissingField(_) => tracing::warn!("rejected request: {}", self),
            ApiError::MalformedRequest(_) => tracing::warn!("malformed request: {}", self),
            ApiError::InferenceFailure(_) => tracing::error!("inference failed: {}", self),
            ApiError::ClassOutOfRange { .. } => {
                tracing::error!("internal consistency error: {}", self)
            }
        }

        let fields = match &self {
            ApiError::MissingField(e) => Some(e),
            _ => None,
        };
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
            missing_fields: fields.map(|e| e.missing.as_slice()),
            invalid_fields: fields.map(|e| e.invalid.as_slice()),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_map_to_bad_request() {
        let err = ApiError::from(FieldErrors {
            missing: vec!["rainfall".into()],
            invalid: vec![],
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Missing required fields: [rainfall]");
    }

    #[test]
    fn runtime_failures_map_to_server_error() {
        let err = ApiError::InferenceFailure("soil model not loaded".into());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let err = ApiError::ClassOutOfRange {
            model: ModelKind::Soil,
            index: 3,
            len: 3,
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "soil model returned class 3 but has only 3 labels");
    }
}
