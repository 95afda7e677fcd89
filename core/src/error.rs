use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("Invalid value '{value}' for column '{column}' at row {row}")]
    InvalidField {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Unknown parameter '{name}'")]
    UnknownParameter { name: String },

    #[error("Parameter '{name}' out of range: {value}")]
    ParameterOutOfRange { name: String, value: f64 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ScorerResult<T> = Result<T, RiskError>;
