//! Error types shared by every layer of the engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DbError {
    /// The statement or expression does not match any accepted grammar.
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Table not found: {0}")]
    UnknownTable(String),

    #[error("Column not found: {0}")]
    UnknownColumn(String),

    /// A bare word in a predicate that is neither a column nor a literal.
    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// A NOT NULL column was left out of an INSERT (or set to NULL).
    #[error("NOT NULL column missing: {0}")]
    MissingNotNull(String),

    #[error("Table already exists: {0}")]
    DuplicateTable(String),
}

impl DbError {
    pub(crate) fn syntax(msg: impl Into<String>) -> Self {
        Self::Syntax(msg.into())
    }

    pub(crate) fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::TypeMismatch(msg.into())
    }
}
