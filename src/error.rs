//! Error types for the translator UI suite

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Driver unavailable: {0}. Install Node and run: npx playwright install chromium")]
    DriverUnavailable(String),

    #[error("Driver failed: {0}")]
    Driver(String),

    #[error("Driver protocol error: {0}")]
    Protocol(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Command {command} exceeded its {ms} ms budget")]
    CommandTimeout { command: String, ms: u64 },

    #[error("Site unreachable: {url} after {attempts} attempts")]
    SiteUnreachable { url: String, attempts: usize },

    #[error("Translation mismatch in {case_id}:\n  expected: {expected:?}\n  actual:   {actual:?}")]
    TranslationMismatch {
        case_id: String,
        expected: String,
        actual: String,
    },

    #[error("Missing output: {case_id} expected substrings {missing:?} in {actual:?}")]
    MissingOutput {
        case_id: String,
        missing: Vec<String>,
        actual: String,
    },

    #[error("Fixture error: {0}")]
    Fixture(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
