use thiserror::Error;

/// Main error type for SpinTune
#[derive(Error, Debug)]
pub enum TuneError {
    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Parameter registry errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Invalid range for {name}: min {min} must be below max {max}")]
    InvalidRange { name: String, min: i64, max: i64 },

    #[error("Invalid step for {name}: {step}")]
    InvalidStep { name: String, step: f64 },

    #[error("Duplicate parameter name: {name}")]
    DuplicateName { name: String },

    #[error("Unknown parameter: {name}")]
    UnknownParameter { name: String },

    #[error("None of the requested parameters were found: {requested:?}")]
    EmptySelection { requested: Vec<String> },

    #[error("No tunable parameters found")]
    NoParameters,
}

/// Errors raised while querying an engine for its options
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Failed to launch engine {path}: {message}")]
    Launch { path: String, message: String },

    #[error("Engine IO failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Engine did not answer within {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },
}

/// Errors raised by a match evaluator. The optimizer never propagates these;
/// they turn into a neutral observation for the iteration.
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Failed to launch match runner {path}: {message}")]
    Launch { path: String, message: String },

    #[error("Match runner IO failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Match timed out after {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },

    #[error("Match runner output had no score line")]
    MissingScore,

    #[error("Match runner exited with {status}: {message}")]
    RunnerFailed { status: String, message: String },
}

/// Result type alias for SpinTune operations
pub type TuneResult<T> = Result<T, TuneError>;

/// Result type alias for evaluator calls
pub type EvalResult<T> = Result<T, EvaluationError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::TuneError::Validation(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::TuneError::Config(format!($($arg)*))
    };
}
