//! Result and error types for Manejar.

use thiserror::Error;

/// Result type for Manejar operations
pub type ManejarResult<T> = Result<T, ManejarError>;

/// Errors that can occur in Manejar
#[derive(Debug, Error)]
pub enum ManejarError {
    /// Browser kind not recognized at session creation. Fatal, never retried.
    #[error("Unsupported browser: {browser}")]
    UnsupportedBrowser {
        /// The offending browser string
        browser: String,
    },

    /// Driver process/connection could not be established
    #[error("Failed to start driver: {message}")]
    DriverStartup {
        /// Error message
        message: String,
    },

    /// Wait for visibility/clickability exceeded the configured timeout
    #[error("Element '{element}' not {wait} after {elapsed_ms}ms")]
    ElementNotReady {
        /// What was waited for ("visible" or "clickable")
        wait: String,
        /// Element descriptor
        element: String,
        /// Time spent waiting, in milliseconds
        elapsed_ms: u64,
    },

    /// Element detached from the document and the single retry also failed
    #[error("Element '{element}' went stale during {action} and the retry failed")]
    StaleElement {
        /// Action that was being performed
        action: String,
        /// Element descriptor
        element: String,
    },

    /// Any other failure during the primitive action
    #[error("{action} failed on element '{element}': {message}")]
    Interaction {
        /// Action that was being performed
        action: String,
        /// Element descriptor
        element: String,
        /// Underlying failure, as a message
        message: String,
    },

    /// Configuration missing or malformed
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// REST call failed
    #[error("API request failed: {message}")]
    Api {
        /// Error message
        message: String,
    },

    /// Screenshot capture failed
    #[error("Screenshot failed: {message}")]
    Screenshot {
        /// Error message
        message: String,
    },

    /// Report rendering or flushing failed
    #[error("Report error: {message}")]
    Report {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
