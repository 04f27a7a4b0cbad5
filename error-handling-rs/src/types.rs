//! # Standardized Error Types
//!
//! Error taxonomy shared by the usage statistics pipeline and the command line
//! host. Telemetry failures are modelled here so they can be classified, but
//! they are never surfaced to the host process.

use std::error::Error as StdError;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A type alias for Result with the error type defaulting to our Error
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Categorizes different kinds of errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Invalid or unreadable configuration
    Configuration,
    /// A component could not be started
    Initialization,
    /// Input/output error
    IO,
    /// Encoding or decoding failure
    Serialization,
    /// Collector unreachable, DNS failure or timeout
    Transport,
    /// Collector refused a record as malformed
    Rejected,
    /// Interrupt signal received; a control signal rather than a failure
    Interrupted,
    /// Unexpected or unhandled error
    Unexpected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "Configuration Error"),
            ErrorKind::Initialization => write!(f, "Initialization Error"),
            ErrorKind::IO => write!(f, "I/O Error"),
            ErrorKind::Serialization => write!(f, "Serialization Error"),
            ErrorKind::Transport => write!(f, "Transport Error"),
            ErrorKind::Rejected => write!(f, "Rejected Record"),
            ErrorKind::Interrupted => write!(f, "KeyboardInterrupt"),
            ErrorKind::Unexpected => write!(f, "Unexpected Error"),
        }
    }
}

/// Core error type for the host process
///
/// `Clone` drops the underlying `cause`, which is only meaningful at the
/// creation site.
#[derive(Debug, Serialize, Deserialize)]
pub struct Error {
    /// A unique identifier for this error instance
    pub id: Uuid,
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Detailed error message
    pub message: String,
    /// The time when the error occurred
    pub timestamp: DateTime<Utc>,
    /// Flag indicating if this is a transient error that might succeed on retry
    pub transient: bool,
    /// Chain of causes (not serialized)
    #[serde(skip)]
    pub cause: Option<Box<dyn StdError + Send + Sync>>,
}

impl Clone for Error {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            kind: self.kind,
            message: self.message.clone(),
            timestamp: self.timestamp,
            transient: self.transient,
            cause: None,
        }
    }
}

impl Error {
    /// Creates a new error with the specified kind and message
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            timestamp: Utc::now(),
            transient: false,
            cause: None,
        }
    }

    /// The interrupt control signal raised when SIGINT aborts foreground work
    pub fn interrupted() -> Self {
        Self::new(ErrorKind::Interrupted, "interrupted by SIGINT")
    }

    /// Chains this error with its cause
    pub fn cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Marks this error as transient (can be retried)
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    /// Returns true if this error is transient and might succeed on retry
    pub fn is_transient(&self) -> bool {
        self.transient
    }

    /// Returns true for the interrupt signal, which is not a genuine failure
    pub fn is_interrupt(&self) -> bool {
        self.kind == ErrorKind::Interrupted
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_ref().map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::IO, err.to_string()).cause(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::Serialization, format!("JSON error: {}", err)).cause(err)
    }
}
