use rocket::{
    http::Status,
    response::{status::Custom, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;

use crate::error::{ErrorKind, GatewayError};

/// A [`GatewayError`] rendered as a JSON response
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError(err)
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    pub error: &'static str,
    pub trace: Vec<String>,
}

/// Unknown models answer 400 like any other bad request; only a missing
/// directory is a real 404.
pub fn status_for(err: &GatewayError) -> Status {
    match err.kind() {
        ErrorKind::Validation | ErrorKind::Conflict => Status::BadRequest,
        ErrorKind::NotFound => match err {
            GatewayError::DirectoryNotFound(_) => Status::NotFound,
            _ => Status::BadRequest,
        },
        ErrorKind::Engine | ErrorKind::Internal => Status::InternalServerError,
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> rocket::response::Result<'static> {
        let err = self.0;
        let status = status_for(&err);

        if status.code >= 500 {
            tracing::error!(code = err.code(), error = %err, "Request failed");
        } else {
            tracing::debug!(code = err.code(), error = %err, "Request rejected");
        }

        let body = ErrorBody {
            success: false,
            message: err.to_string(),
            error: err.code(),
            trace: err.diagnostic_trace(),
        };
        Custom(status, Json(body)).respond_to(request)
    }
}
