use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod inference;
mod labels;
mod model;
mod preprocess;
mod species_db;
mod utils;

use config::Config;
use error::PredictError;
use inference::{PredictionResponse, Predictor};
use model::TfClassifier;
use species_db::SpeciesDb;
use utils::ensure_file_exists;

#[derive(Clone)]
struct AppState {
    predictor: Arc<Predictor>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::parse();

    tracing::info!("Checking model...");
    ensure_file_exists(&config.model_path, config.model_url.as_deref())
        .await
        .context("failed to fetch model")?;
    if let Err(err) =
        ensure_file_exists(&config.species_db, config.species_db_url.as_deref()).await
    {
        tracing::warn!("Could not fetch species db: {err}");
    }

    let classifier = TfClassifier::load(&config.model()).context("failed to load model")?;
    let species_db = SpeciesDb::load_or_empty(&config.species_db);
    let predictor = Predictor::new(Arc::new(classifier), species_db, config.response_shape);
    tracing::info!("Serving {:?} predictions", predictor.shape());

    let state = AppState {
        predictor: Arc::new(predictor),
    };
    let app = app(state, config.body_limit_bytes());

    let addr = config.bind_addr().context("invalid bind address")?;
    tracing::info!("Listening on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

fn app(state: AppState, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/predict", post(predict_handler))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn home() -> Json<serde_json::Value> {
    Json(json!({ "message": "Python Eye API is running" }))
}

async fn predict_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PredictionResponse>, PredictError> {
    let mut image_data = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            image_data = Some(field.bytes().await?);
            break;
        }
    }

    let image_data = image_data.ok_or(PredictError::MissingFile)?;

    // The forward pass is CPU bound; keep it off the async workers.
    let predictor = Arc::clone(&state.predictor);
    let response = tokio::task::spawn_blocking(move || predictor.predict(&image_data)).await??;

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::tests::{cobra_db, peaked_scores, sample_png, FixedScores};
    use crate::inference::ResponseShape;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "snake-eye-boundary";
    const COBRA: usize = 13;

    fn limited_app(db: SpeciesDb, shape: ResponseShape, body_limit_bytes: usize) -> Router {
        let predictor = Predictor::new(Arc::new(FixedScores(peaked_scores(COBRA))), db, shape);
        app(
            AppState {
                predictor: Arc::new(predictor),
            },
            body_limit_bytes,
        )
    }

    fn test_app(db: SpeciesDb, shape: ResponseShape) -> Router {
        limited_app(db, shape, 5 * 1024 * 1024)
    }

    fn multipart_body(field: &str, bytes: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"snake.png\"\r\n\
             Content-Type: image/png\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload(field: &str, bytes: &[u8]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(field, bytes)))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn home_reports_liveness() {
        let response = test_app(SpeciesDb::empty(), ResponseShape::Top5)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "message": "Python Eye API is running" })
        );
    }

    #[tokio::test]
    async fn predicts_cobra_with_enrichment() {
        let response = test_app(cobra_db(), ResponseShape::Top5)
            .oneshot(upload("file", &sample_png()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["main"]["species"], "Cobra");
        assert_eq!(body["main"]["venom_status"], "Venomous");
        assert_eq!(body["main"]["scientific_name"], "Naja naja");
        assert_eq!(body["others"].as_array().unwrap().len(), 4);
        assert!(body["main"]["confidence"].as_str().unwrap().ends_with('%'));
    }

    #[tokio::test]
    async fn single_shape_is_flat() {
        let response = test_app(cobra_db(), ResponseShape::Top1)
            .oneshot(upload("file", &sample_png()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let keys: Vec<&str> = body.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(body["species"], "Cobra");
        assert_eq!(body["venom_status"], "Venomous");
    }

    #[tokio::test]
    async fn missing_species_db_still_serves_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let db = SpeciesDb::load_or_empty(dir.path().join("snake_db.json"));

        let response = test_app(db, ResponseShape::Top5)
            .oneshot(upload("file", &sample_png()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["main"]["species"], "Cobra");
        assert_eq!(body["main"]["venom_status"], "Unknown");
        assert!(body["main"]["description"].is_null());
    }

    #[tokio::test]
    async fn malformed_upload_is_a_server_error() {
        let response = test_app(cobra_db(), ResponseShape::Top5)
            .oneshot(upload("file", b"this is not an image"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert!(!body["detail"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_upload_is_payload_too_large() {
        let response = limited_app(cobra_db(), ResponseShape::Top5, 1024)
            .oneshot(upload("file", &[0u8; 4096]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = json_body(response).await;
        assert!(!body["detail"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_file_field_is_rejected() {
        let response = test_app(cobra_db(), ResponseShape::Top5)
            .oneshot(upload("picture", &sample_png()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(response).await["detail"], "No file uploaded");
    }

    #[tokio::test]
    async fn cors_allows_any_origin() {
        let response = test_app(SpeciesDb::empty(), ResponseShape::Top5)
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }
}
