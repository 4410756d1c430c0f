use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Everything that can go wrong while answering a `/predict` request.
#[derive(Error, Debug)]
pub enum PredictError {
    #[error("No file uploaded")]
    MissingFile,

    #[error("invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("inference worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl From<tensorflow::Status> for PredictError {
    fn from(status: tensorflow::Status) -> Self {
        PredictError::Inference(status.to_string())
    }
}

impl PredictError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            // The form never reached the pipeline.
            PredictError::MissingFile => StatusCode::UNPROCESSABLE_ENTITY,
            // 413 past the body limit, 400 for a malformed form.
            PredictError::Multipart(err) => err.status(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Error during prediction: {self}");
        } else {
            tracing::warn!("Rejected prediction request: {self}");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
