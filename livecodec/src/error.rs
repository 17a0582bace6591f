//! Error types shared by the loader, the codec and the agent.

use thiserror::Error;

/// Errors raised while resolving symbols, setting up a worker codec or
/// (de)serializing values.
///
/// Registration routines and bridge callables report their own failures
/// through this type as well; the bridge hands them back untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LiveError {
    #[error("invalid qualified symbol '{0}': expected '<namespace>/<name>'")]
    InvalidSymbol(String),

    #[error("namespace '{0}' could not be loaded: no source provided")]
    NamespaceNotFound(String),

    #[error("symbol '{name}' not found in namespace '{namespace}'")]
    SymbolNotFound { namespace: String, name: String },

    #[error("'{symbol}' is bound to a {found}, expected a {expected}")]
    NotCallable {
        symbol: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("circular namespace dependency: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("this component must be loaded by the system loader, not by '{0}'")]
    WrongLoader(String),

    #[error("an instrumentation handle is already attached to this process")]
    AlreadyAttached,

    #[error("buffer underflow: needed {needed} more byte(s) at offset {offset}")]
    BufferUnderflow { offset: usize, needed: usize },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("no serializer registered for type '{0}'")]
    UnregisteredType(String),

    #[error("no type registered under id {0}")]
    UnknownTypeId(u32),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("{0}")]
    Callback(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl LiveError {
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        LiveError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// True for errors that mean the worker was configured with something
    /// that cannot be resolved.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(
            self,
            LiveError::InvalidSymbol(_)
                | LiveError::NamespaceNotFound(_)
                | LiveError::SymbolNotFound { .. }
                | LiveError::NotCallable { .. }
                | LiveError::CircularDependency(_)
                | LiveError::Config(_)
        )
    }
}

impl From<toml::de::Error> for LiveError {
    fn from(e: toml::de::Error) -> Self {
        LiveError::Config(e.to_string())
    }
}

impl From<std::io::Error> for LiveError {
    fn from(e: std::io::Error) -> Self {
        LiveError::Config(e.to_string())
    }
}

pub type LiveResult<T> = Result<T, LiveError>;

pub(crate) fn poisoned<E: std::fmt::Display>(e: E) -> LiveError {
    LiveError::Internal(format!("lock poisoned: {}", e))
}
