use thiserror::Error;

#[derive(Error, Debug)]
pub enum CeapError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing column in dataset header: {0}")]
    MissingColumn(String),

    #[error("Malformed row at line {line}: expected {expected} fields, found {found}")]
    RowStructure { line: u64, expected: u64, found: u64 },

    #[error("Record has no document_id")]
    MissingKey,

    #[error("Dataset not found: {0}")]
    MissingDataset(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, CeapError>;
