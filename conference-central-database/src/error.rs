use diesel_async::pooled_connection::deadpool;
use thiserror::Error;

#[allow(clippy::module_name_repetitions)]
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to create database pool {0}")]
    PoolBuild(#[from] deadpool::BuildError),
    #[error("Database pool failed {0}")]
    Pool(#[from] deadpool::PoolError),
    #[error("Database query failed {0}")]
    Database(#[from] diesel::result::Error),
    #[error("In-memory store lock poisoned")]
    Poisoned,
    #[error("No {kind} found with key: {key}")]
    NotFound { kind: &'static str, key: String },
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
}

impl DatabaseError {
    #[must_use]
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }
}

#[allow(clippy::module_name_repetitions)]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueryError {
    #[error("Filter contains invalid field or operator.")]
    InvalidFieldOrOperator,
    #[error("Inequality filter is allowed on only one field.")]
    MultipleInequalityFields,
    #[error("Filter value {value:?} is not valid for field {field}.")]
    InvalidValue { field: &'static str, value: String },
}
