//! Error taxonomy for extraction, sessions and instruction mapping.
//!
//! Zero detected fields is not an error anywhere in this crate, and a
//! partially-failed commit is data (`CommitOutcome.errors`), not an `Err`.

use thiserror::Error;

use crate::engine::EngineError;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Document engine error: {0}")]
    Engine(#[from] EngineError),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No document loaded")]
    NoDocument,

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("No output destination configured")]
    NoDestination,

    #[error("Document engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum MapperError {
    /// The mapper cannot run at all (e.g. missing credential). Distinct
    /// from a mapper that ran and proposed nothing.
    #[error("Instruction mapper unavailable: {0}")]
    Unavailable(String),

    #[error("Instruction mapping failed: {0}")]
    Failed(String),
}
