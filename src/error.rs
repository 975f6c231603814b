use std::path::PathBuf;

use thiserror::Error;

/// Failure on the ad-hoc SQL path. Everything except `Database` is raised
/// before the text reaches SQLite.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query is empty")]
    Empty,
    #[error("only a single statement may be executed")]
    MultipleStatements,
    #[error("statement is not read-only: {keyword} is not allowed")]
    NotReadOnly { keyword: String },
    #[error("unsupported statement starting with {keyword}; use SELECT, WITH or VALUES")]
    UnsupportedStatement { keyword: String },
    #[error("query failed: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("model artifact {} is unusable: {message}", .path.display())]
    Artifact { path: PathBuf, message: String },
    #[error("prediction failed: {0}")]
    Inference(String),
}

/// Raised by a classifier during a single inference call.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ClassifierError(pub String);
