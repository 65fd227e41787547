use thiserror::Error;

/// Main error type for the simulator
#[derive(Error, Debug)]
pub enum QtraderError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    // Replay memory errors
    //
    // Raised when a batch is requested from a buffer holding fewer
    // experiences. The episode loop only replays once the buffer holds a
    // full batch, so this surfacing means a scheduling bug.
    #[error("Insufficient replay memory: requested {requested}, available {available}")]
    InsufficientMemory { requested: usize, available: usize },

    // Data errors
    #[error("Data error: {0}")]
    Data(String),

    #[error("Missing column in data file: {0}")]
    MissingColumn(String),

    #[error("Feature mismatch: scaler expects {expected:?}, source provides {provided:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        provided: Vec<String>,
    },

    // Model errors
    #[error("Model error: {0}")]
    Model(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for QtraderError
pub type Result<T> = std::result::Result<T, QtraderError>;
