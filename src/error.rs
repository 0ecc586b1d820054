//! Module error taxonomy.
//!
//! Every module holds at most one pending `ModuleError`. The variant tells the
//! controlling layer what kind of recovery is needed:
//!
//! - `Configuration`: a bad property value or a required input left unset.
//! - `Resource`: a buffer or capture device could not be obtained.
//! - `Runtime`: data of the wrong shape or format reached a module.
//! - `InvalidState`: a lifecycle call made in the wrong state (e.g. double start).

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ModuleError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("resource error: {0}")]
    Resource(String),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl ModuleError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Short kind label, used in status snapshots.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Resource(_) => "resource",
            Self::Runtime(_) => "runtime",
            Self::InvalidState(_) => "invalid_state",
        }
    }
}

pub type ModuleResult<T> = std::result::Result<T, ModuleError>;
