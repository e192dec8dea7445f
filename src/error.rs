use thiserror::Error;

/// Fatal pre-batch configuration problems. These abort the run before any
/// grading starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "GEMINI_API_KEY environment variable not set. \
         Please set it using: export GEMINI_API_KEY='your-api-key'"
    )]
    MissingApiKey,

    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse TOML config {path}: {source}")]
    ParseFile {
        path: String,
        source: toml::de::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error(
        "the grading rubric does not cover question(s): {0}. \
         Configured questions must stay within the rubric's question set"
    )]
    UnsupportedQuestions(String),
}

/// Failure to read the submissions file.
#[derive(Debug, Error)]
#[error("could not read submissions from {path}: {source}")]
pub struct LoadError {
    pub path: String,
    pub source: csv::Error,
}

/// Failure while writing or reloading the results file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("results file error: {0}")]
    Csv(#[from] csv::Error),

    #[error("results file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("results file is missing expected column '{0}'")]
    MissingColumn(String),
}

/// No structured grading object could be recovered from the model output.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no JSON object found in model output")]
    NoJsonObject,

    #[error("model output is not valid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
}
