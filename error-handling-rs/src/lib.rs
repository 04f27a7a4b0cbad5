//! # Error Handling Framework
//!
//! Shared plumbing for the usage statistics pipeline and its host process:
//!
//! - Standardized error types with an explicit interrupt signal
//! - Structured logging on stderr
//! - Retry policy for transient failures
//! - Shutdown coordination with a bounded drain phase

pub mod logging;
pub mod retry;
pub mod supervisor;
pub mod types;

// Re-export commonly used types
pub use logging::{init_logging, LoggingConfig};
pub use retry::{RetryPolicy, RetryableError};
pub use supervisor::{ShutdownCoordinator, ShutdownState, DEFAULT_GRACE_PERIOD};
pub use types::{Error, ErrorKind, Result};
