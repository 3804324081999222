
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Process error: {0}")]
    ProcessError(String),

    #[error("Timed out waiting for server to start: {0}")]
    StartupTimeout(String),

    #[error("Server exited unexpectedly{}", describe_exit_code(.code))]
    ServerExited { code: Option<i32> },

    #[error("Invalid state transition: {0}")]
    TransitionError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),
}

impl From<toml::de::Error> for BridgeError {
    fn from(error: toml::de::Error) -> Self {
        BridgeError::ConfigError(error.to_string())
    }
}

fn describe_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with code {code}"),
        None => " (terminated by signal)".to_string(),
    }
}

impl BridgeError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, BridgeError::IoError(_) | BridgeError::HttpError(_))
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            BridgeError::ConfigError(_) => "CONFIG_ERROR",
            BridgeError::ProcessError(_) => "PROCESS_ERROR",
            BridgeError::StartupTimeout(_) => "STARTUP_TIMEOUT",
            BridgeError::ServerExited { .. } => "SERVER_EXITED",
            BridgeError::TransitionError(_) => "TRANSITION_ERROR",
            BridgeError::ParseError(_) => "PARSE_ERROR",
            BridgeError::IoError(_) => "IO_ERROR",
            BridgeError::YamlError(_) => "YAML_ERROR",
            BridgeError::HttpError(_) => "HTTP_ERROR",
            BridgeError::UrlError(_) => "URL_ERROR",
        }
    }

    /// Process exit status for a fatal error.
    ///
    /// A server that disappears while the bridge is not shutting down always
    /// counts as a failure, so a reported code of 0 is escalated to 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            BridgeError::ServerExited { code } => code.filter(|c| *c != 0).unwrap_or(1),
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
