use axum::{
    Json,
    response::{IntoResponse, Response},
};
use fileforge_common::error::ForgeError;
use http::StatusCode;
use serde::Serialize;

pub struct ApiError(pub ForgeError);

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            ForgeError::InvalidArgument(_) | ForgeError::InvalidConfig(_) => {
                StatusCode::BAD_REQUEST
            }
            ForgeError::JobNotFound(_) | ForgeError::ArchiveNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            ForgeError::JobConflict(_) => StatusCode::CONFLICT,
            ForgeError::WorkFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ForgeError::Archive(_) | ForgeError::InternalError(_) | ForgeError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = ErrorBody {
            code: self.0.error_code(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ForgeError> for ApiError {
    fn from(err: ForgeError) -> Self {
        ApiError(err)
    }
}
