use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::HeaderValue,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::{
    error::AppError,
    models::AnalysisResult,
    services::{data_processor, insights},
    AppState,
};

/// Browser origins allowed to call the upload endpoint.
const ALLOWED_ORIGINS: [&str; 2] = [
    "http://localhost:3000",
    "https://data-insights-generator-frontend.vercel.app",
];

pub fn routes(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            ALLOWED_ORIGINS.map(HeaderValue::from_static),
        ))
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/api/v1/data/upload", post(upload_dataset))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
}

struct UploadRequest {
    file_name: String,
    file_data: Bytes,
    selected_columns: Option<Vec<String>>,
}

/// Pull the uploaded file (and the optional comma-separated `columns` field)
/// out of the multipart body. Missing file or filename is a client error
/// before any processing starts.
async fn parse_upload(mut multipart: Multipart) -> Result<UploadRequest, AppError> {
    let mut file_name: Option<String> = None;
    let mut file_data: Option<Bytes> = None;
    let mut selected_columns: Option<Vec<String>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Could not read upload: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                file_data = Some(field.bytes().await.map_err(|e| {
                    AppError::InvalidInput(format!("Could not read file content: {}", e))
                })?);
            }
            "columns" => {
                let text = field.text().await.map_err(|e| {
                    AppError::InvalidInput(format!("Could not read column selection: {}", e))
                })?;
                let cols: Vec<String> = text
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if !cols.is_empty() {
                    selected_columns = Some(cols);
                }
            }
            _ => {}
        }
    }

    let file_data =
        file_data.ok_or_else(|| AppError::InvalidInput("No file uploaded.".to_string()))?;
    let file_name =
        file_name.ok_or_else(|| AppError::InvalidInput("No file uploaded.".to_string()))?;

    Ok(UploadRequest {
        file_name,
        file_data,
        selected_columns,
    })
}

#[axum::debug_handler]
async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<AnalysisResult>, AppError> {
    let start = std::time::Instant::now();

    let upload = parse_upload(multipart).await?;
    tracing::info!(
        "Received upload '{}' ({} bytes)",
        upload.file_name,
        upload.file_data.len()
    );

    // 1. Statistics and chart rendering
    let processed = data_processor::process_dataset(
        &upload.file_data,
        &upload.file_name,
        upload.selected_columns.as_deref(),
    )?;
    tracing::info!(
        "Processed {} numeric columns in {:?}",
        processed.full_stats.len(),
        start.elapsed()
    );

    // 2. Summary generation; failures degrade to a fallback string inside.
    let summary_report =
        insights::generate_insights(state.generator.as_ref(), &processed.facts_for_ai).await;
    tracing::info!("Analysis completed in {:?}", start.elapsed());

    // 3. Return results
    Ok(Json(AnalysisResult {
        summary_report,
        statistical_metrics: processed.full_stats,
        visualizations: processed.visualizations,
    }))
}
