use thiserror::Error;

use crate::postgres::PostgresPoolError;

/// Errors that abort service startup
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] PostgresPoolError),
}

pub type Result<T> = std::result::Result<T, AppError>;
