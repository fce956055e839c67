use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to import tool implementation: {0}")]
    ImportFailure(String),

    #[error("Tool generation failed: {0}")]
    GenerationFailure(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Short machine-readable label, used as the `reason` of load events.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::ImportFailure(_) => "import_error",
            AppError::GenerationFailure(_) => "generation_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Io(_) => "io_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
