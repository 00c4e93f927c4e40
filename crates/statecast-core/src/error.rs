#![forbid(unsafe_code)]

//! Error taxonomy shared by every statecast crate.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | [`Error::NoReducer`] | `dispatch` on a store built without a reducer | Fails every call, state untouched |
//! | [`Error::Reducer`] | Fallible reducer returned `Err` | Propagated unmodified, state untouched |
//! | [`Error::Disposed`] | `subscribe` or `dispatch` after `dispose()` | Fails, nothing registered or reduced |
//! | [`Error::InvalidOperator`] | Operator built with an unusable parameter | Fails at construction, never at first push |
//! | [`Error::Scheduler`] | Timer thread could not be started | Fails at connect time |
//!
//! A panicking reducer is not mapped into this enum: the panic unwinds out of
//! `dispatch` as-is.

use std::fmt;

/// Boxed source error carried by [`Error::Reducer`].
pub type ReducerError = Box<dyn std::error::Error + 'static>;

/// Errors from container, store, operator, and scheduler operations.
#[derive(Debug)]
pub enum Error {
    /// `dispatch` was called on a store that has no reducer configured.
    NoReducer,
    /// A fallible reducer rejected the event.
    Reducer(ReducerError),
    /// The container (or store) was used after `dispose()`.
    Disposed,
    /// An operator was constructed with an invalid parameter.
    InvalidOperator {
        operator: &'static str,
        reason: String,
    },
    /// A scheduler could not arrange periodic callbacks.
    Scheduler(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidOperator`].
    #[must_use]
    pub fn invalid_operator(operator: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidOperator {
            operator,
            reason: reason.into(),
        }
    }

    /// Whether this is a programmer configuration error (as opposed to a
    /// runtime failure raised by the reducer or the scheduler).
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::NoReducer | Self::InvalidOperator { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoReducer => write!(f, "dispatch requires a reducer, but none is configured"),
            Self::Reducer(source) => write!(f, "reducer failed: {source}"),
            Self::Disposed => write!(f, "state container used after disposal"),
            Self::InvalidOperator { operator, reason } => {
                write!(f, "invalid {operator} operator: {reason}")
            }
            Self::Scheduler(reason) => write!(f, "scheduler error: {reason}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Reducer(source) => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result alias used throughout statecast.
pub type Result<T> = std::result::Result<T, Error>;
