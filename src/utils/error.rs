use crate::domain::model::Stage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Cannot read input file {path}: {source}")]
    InputError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Input file {path} is malformed: {message}")]
    MalformedInput { path: String, message: String },

    #[error("Failed to write output file {path}: {message}")]
    OutputError { path: String, message: String },

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

impl BatchError {
    /// Every fatal error ends the process with 1; row failures never get here.
    pub fn exit_code(&self) -> i32 {
        1
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            BatchError::InputError { path, .. } => format!("The file {} does not exist or cannot be read", path),
            BatchError::MalformedInput { path, message } => {
                format!("The file {} is not a usable keyword CSV: {}", path, message)
            }
            BatchError::OutputError { path, .. } => format!("Could not save results to {}", path),
            BatchError::MissingConfigError { field } => format!("{} is not set", field),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            BatchError::InputError { .. } => "Check the --file path and its permissions",
            BatchError::MalformedInput { .. } | BatchError::CsvError(_) => {
                "The input must be a UTF-8 CSV with KEYWORD and URL columns"
            }
            BatchError::OutputError { .. } | BatchError::IoError(_) => {
                "Check free disk space and write permissions next to the input file"
            }
            BatchError::MissingConfigError { .. } => "Export YTG_API or add it to a .env file",
            BatchError::TomlError(_) | BatchError::InvalidConfigValueError { .. } => {
                "Check the command line arguments and the --config settings file"
            }
            BatchError::HttpError(_) => "Retry the run later",
        }
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;

/// Failure of one row at one stage. Recorded on the row, never fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("invalid keyword: {reason}")]
    InvalidKeyword { reason: String },

    #[error("{stage} request rejected with HTTP {status}: {body}")]
    Rejected { stage: Stage, status: u16, body: String },

    #[error("{stage} request failed: {message}")]
    Transport { stage: Stage, message: String },

    #[error("{stage} response unusable: {message}")]
    Payload { stage: Stage, message: String },

    #[error("{stage} gave up after {attempts} attempts: {last}")]
    Exhausted { stage: Stage, attempts: u32, last: String },
}
