//! HTTP error envelope and JSON body extraction

use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use staking_core::StakeError;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub kind: &'static str,
}

/// A ledger error on its way out as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub StakeError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            StakeError::Validation(_) | StakeError::InvalidState(_) => StatusCode::BAD_REQUEST,
            StakeError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            StakeError::Forbidden(_) => StatusCode::FORBIDDEN,
            StakeError::NotFound(_) => StatusCode::NOT_FOUND,
            StakeError::Conflict(_) => StatusCode::CONFLICT,
            StakeError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StakeError> for ApiError {
    fn from(err: StakeError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            success: false,
            message: self.0.message().to_string(),
            kind: self.0.kind(),
        };
        (status, Json(body)).into_response()
    }
}

/// `Json<T>` whose rejection is reported through the error envelope
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(ApiError(StakeError::validation(rejection.body_text()))),
        }
    }
}
