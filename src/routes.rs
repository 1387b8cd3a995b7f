use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::services::ServeDir;
use tracing::error;

use crate::error::ExportError;
use crate::language::Language;
use crate::state::AppState;
use crate::translate::{TranslateRequest, TranslateResponse};

pub fn create_routes(state: AppState) -> Router<AppState> {
    let downloads_dir = state.config.system_config.downloads_path();

    Router::new()
        // WebSocket
        .route("/client-ws", get(crate::websocket::websocket_handler))
        // Health check
        .route("/api/health", get(health_check))
        // REST API routes
        .route("/api/languages", get(get_languages))
        .route("/api/translate", post(translate_once))
        .route("/api/export/pdf", post(export_pdf))
        // Saved exports
        .nest_service("/downloads", ServeDir::new(downloads_dir))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "provider": state.translator.name(),
        "clients": state.widgets.len(),
    }))
}

async fn get_languages(State(state): State<AppState>) -> Json<Value> {
    let translator_config = &state.config.translator_config;
    let languages: Vec<Value> = Language::ALL
        .iter()
        .map(|lang| json!({"code": lang.code(), "name": lang.name()}))
        .collect();
    Json(json!({
        "languages": languages,
        "default_source": translator_config.default_source_language,
        "default_target": translator_config.default_target_language,
    }))
}

#[derive(Debug, Deserialize)]
struct TranslateBody {
    text: String,
    source_language: Option<Language>,
    target_language: Option<Language>,
}

/// Translate without debouncing. Failures come back as the same fixed
/// message the widget shows, with `success: false`.
async fn translate_once(
    State(state): State<AppState>,
    Json(body): Json<TranslateBody>,
) -> Result<Json<TranslateResponse>, (StatusCode, Json<Value>)> {
    if body.text.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "text is required"})),
        ));
    }

    let translator_config = &state.config.translator_config;
    let request = TranslateRequest::new(
        body.text,
        body.source_language
            .unwrap_or(translator_config.default_source_language),
        body.target_language
            .unwrap_or(translator_config.default_target_language),
    );

    match state.translator.translate(&request).await {
        Ok(translated_text) => Ok(Json(TranslateResponse {
            translated_text,
            success: true,
        })),
        Err(e) => {
            error!("Translation error: {}", e);
            Ok(Json(TranslateResponse {
                translated_text: translator_config.error_message.clone(),
                success: false,
            }))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExportBody {
    text: String,
}

async fn export_pdf(
    State(state): State<AppState>,
    Json(body): Json<ExportBody>,
) -> Result<Response, (StatusCode, Json<Value>)> {
    let filename = &state.config.translator_config.export_filename;
    match state.exporter.export(&body.text, filename) {
        Ok(document) => Ok((
            [
                (header::CONTENT_TYPE, document.mime_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", document.filename),
                ),
            ],
            document.bytes,
        )
            .into_response()),
        Err(ExportError::EmptyDocument) => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "text is required"})),
        )),
        Err(e) => {
            error!("PDF export failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "export failed"})),
            ))
        }
    }
}
