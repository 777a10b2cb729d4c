use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Languages accepted by the execution provider and the version index sent
/// along with each of them.
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("python3", "3"),
    ("java", "3"),
    ("cpp", "4"),
    ("nodejs", "3"),
    ("c", "4"),
    ("ruby", "3"),
    ("go", "3"),
    ("scala", "3"),
    ("bash", "3"),
    ("sql", "3"),
    ("pascal", "2"),
    ("csharp", "3"),
    ("php", "3"),
    ("swift", "3"),
    ("rust", "3"),
    ("r", "3"),
];

/// Version index for a language identifier, matched case-insensitively.
pub fn version_index(language: &str) -> Option<&'static str> {
    let language = language.to_lowercase();
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(name, _)| *name == language)
        .map(|(_, index)| *index)
}

/// Client for a JDoodle-compatible execution API.
#[derive(Debug)]
pub struct ExecutionClient {
    client: Client,
    url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteRequest<'a> {
    script: &'a str,
    language: &'a str,
    version_index: &'a str,
    client_id: Option<&'a str>,
    client_secret: Option<&'a str>,
}

/// What the provider reports back for one run.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub output: Option<String>,
    pub memory: Option<Value>,
    pub cpu_time: Option<Value>,
}

#[derive(Debug)]
pub enum ExecutionError {
    Timeout,
    Status(reqwest::StatusCode),
    Transport(reqwest::Error),
}

impl std::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionError::Timeout => write!(f, "execution provider timed out"),
            ExecutionError::Status(status) => write!(f, "execution provider answered {}", status),
            ExecutionError::Transport(e) => write!(f, "execution provider request failed: {}", e),
        }
    }
}

impl std::error::Error for ExecutionError {}

impl From<reqwest::Error> for ExecutionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ExecutionError::Timeout
        } else {
            ExecutionError::Transport(e)
        }
    }
}

impl ExecutionClient {
    pub fn new(
        url: String,
        client_id: Option<String>,
        client_secret: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            client_id,
            client_secret,
        })
    }

    /// Run a script on the provider.
    pub async fn execute(
        &self,
        code: &str,
        language: &str,
        version_index: &str,
    ) -> Result<ExecutionResult, ExecutionError> {
        let body = ExecuteRequest {
            script: code,
            language,
            version_index,
            client_id: self.client_id.as_deref(),
            client_secret: self.client_secret.as_deref(),
        };
        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExecutionError::Status(status));
        }
        Ok(response.json().await?)
    }
}
