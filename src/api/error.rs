use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use super::error_response;
use crate::core::{ConfigError, SimulationError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid parameter: {field} - {message}")]
    InvalidField { field: &'static str, message: String },

    #[error("Invalid JSON payload: {0}")]
    InvalidJson(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingField(_)
            | ApiError::InvalidField { .. }
            | ApiError::InvalidJson(_)
            | ApiError::Config(_)
            | ApiError::Simulation(_) => StatusCode::BAD_REQUEST,
            ApiError::Serialization(_) | ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
            return error_response(status, "Internal server error");
        }
        error_response(status, &self.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
