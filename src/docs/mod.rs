use utoipa::OpenApi;
use crate::models::*;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Readiness check endpoint
#[utoipa::path(
    get,
    path = "/api/ready",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn ready_check_doc() {}

/// Relay occupancy and process resources
#[utoipa::path(
    get,
    path = "/api/v1/diagnostics",
    responses(
        (status = 200, description = "Current diagnostics", body = DiagnosticsResponse)
    )
)]
#[allow(dead_code)]
pub async fn diagnostics_doc() {}

/// Languages accepted by the compile gateway
#[utoipa::path(
    get,
    path = "/api/v1/languages",
    responses(
        (status = 200, description = "Supported language identifiers", body = LanguagesResponse)
    )
)]
#[allow(dead_code)]
pub async fn languages_doc() {}

/// Run a buffer snapshot on the execution provider
#[utoipa::path(
    post,
    path = "/compile",
    request_body = CompileRequest,
    responses(
        (status = 200, description = "Program output", body = CompileResponse),
        (status = 400, description = "Missing field or unsupported language", body = ErrorResponse),
        (status = 500, description = "Execution provider failed or timed out", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn compile_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check_doc,
        ready_check_doc,
        diagnostics_doc,
        languages_doc,
        compile_doc,
    ),
    components(
        schemas(
            HealthResponse,
            DiagnosticsResponse,
            LanguagesResponse,
            CompileRequest,
            CompileResponse,
            ErrorResponse
        )
    ),
    tags(
        (name = "api", description = "API endpoints")
    )
)]
pub struct ApiDoc;
