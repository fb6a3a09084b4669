use thiserror::Error;

#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("Input parse error: {message}")]
    Parse { message: String },

    #[error("Student {0} is not on this roster")]
    UnknownStudent(String),

    #[error("Transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Server responded with status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Unauthorized: credential missing or expired")]
    Unauthorized,

    #[error("Submission for roster {ticket} no longer matches active roster")]
    StaleSubmission { ticket: u64 },

    #[error("No roster is open")]
    NoActiveRoster,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Caller,
    Network,
    Auth,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AttendanceError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Parse { .. } | Self::CsvError(_) => ErrorCategory::Input,
            Self::UnknownStudent(_) | Self::StaleSubmission { .. } | Self::NoActiveRoster => {
                ErrorCategory::Caller
            }
            Self::Transport(_) | Self::HttpStatus { .. } | Self::SerializationError(_) => {
                ErrorCategory::Network
            }
            Self::Unauthorized => ErrorCategory::Auth,
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 過期回應直接丟棄即可
            Self::StaleSubmission { .. } => ErrorSeverity::Low,
            Self::Transport(_) | Self::HttpStatus { .. } | Self::Unauthorized => {
                ErrorSeverity::Medium
            }
            Self::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// 網路層失敗可整批重送，本地狀態不受影響
    pub fn is_retryable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Network)
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Input => "Check that the file is UTF-8, tab-separated, with a header row",
            ErrorCategory::Caller => "Reload the roster for the selected course and date",
            ErrorCategory::Network => "Check server status and retry the whole submission",
            ErrorCategory::Auth => "Log in again to obtain a fresh bearer token",
            ErrorCategory::Configuration => "Review the configuration file and CLI flags",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Unauthorized => "Your session has expired. Please log in again.".to_string(),
            Self::Transport(_) | Self::HttpStatus { .. } => {
                format!("Could not reach the attendance server ({})", self)
            }
            Self::Parse { message } => format!("The enrollment file could not be read: {}", message),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AttendanceError>;
