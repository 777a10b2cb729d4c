use crate::{
    clients::execution_client::{version_index, SUPPORTED_LANGUAGES},
    models::{CompileRequest, CompileResponse, ErrorResponse, LanguagesResponse},
    AppState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

const REQUIRED: &str = "Code and language are required";
const UNSUPPORTED: &str = "Unsupported language";
const FAILED: &str = "Failed to compile code";

/// Run a buffer snapshot on the execution provider
pub async fn compile(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CompileRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CompileResponse>), (StatusCode, Json<ErrorResponse>)> {

    // Reject bodies that are not a JSON object
    let Json(request) = payload.map_err(|e| {
        debug!("Rejected compile body: {}", e);
        ErrorResponse::reply(StatusCode::BAD_REQUEST, REQUIRED)
    })?;

    // Validate the language before touching the code; it is forwarded as sent
    let language = match request.language.as_deref() {
        Some(language) if !language.is_empty() => language,
        _ => return Err(ErrorResponse::reply(StatusCode::BAD_REQUEST, REQUIRED)),
    };
    let Some(version) = version_index(language) else {
        debug!("Unsupported language requested: {}", language);
        return Err(ErrorResponse::reply(StatusCode::BAD_REQUEST, UNSUPPORTED));
    };
    let code = match request.code.as_deref() {
        Some(code) if !code.is_empty() => code,
        _ => return Err(ErrorResponse::reply(StatusCode::BAD_REQUEST, REQUIRED)),
    };

    // Forward to the provider, bounded by the client timeout
    let result = state
        .executor
        .execute(code, language, version)
        .await
        .map_err(|e| {
            error!("Execution provider error for {}: {}", language, e);
            ErrorResponse::reply(StatusCode::INTERNAL_SERVER_ERROR, FAILED)
        })?;

    info!("Compiled {} bytes of {}", code.len(), language);
    Ok((
        StatusCode::OK,
        Json(CompileResponse {
            output: result.output.unwrap_or_default(),
            memory: value_text(result.memory),
            cpu_time: value_text(result.cpu_time),
        }),
    ))
}

/// List the languages the compile gateway accepts
pub async fn languages() -> Json<LanguagesResponse> {
    Json(LanguagesResponse {
        languages: SUPPORTED_LANGUAGES.iter().map(|(name, _)| name.to_string()).collect(),
    })
}

fn value_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
