use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request to run a buffer snapshot
#[derive(Serialize, Deserialize, ToSchema, Debug, Default)]
pub struct CompileRequest {
    pub code: Option<String>,
    pub language: Option<String>,
}

/// Output of a successful run
#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CompileResponse {
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_time: Option<String>,
}

/// Supported language identifiers
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct LanguagesResponse {
    pub languages: Vec<String>,
}
