use std::time::Duration;

use thiserror::Error;

/// Error types for a smoke check run.
#[derive(Error, Debug)]
pub enum SmokeError {
    /// The browser (or WebDriver session) could not be started.
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// The page never reached network idle within the navigation timeout.
    #[error("Navigation to {url} timed out after {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },

    /// Navigation failed outright (DNS, TLS, refused connection, ...).
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// The located element did not become visible within the visibility timeout.
    #[error("Element {locator} not visible after {timeout:?}")]
    ElementTimeout { locator: String, timeout: Duration },

    /// Any other command sent to the browser failed.
    #[error("Driver error: {0}")]
    Driver(String),

    /// Capturing or saving a screenshot failed.
    #[error("Screenshot error: {0}")]
    Screenshot(String),

    /// Invalid run configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SmokeError {
    /// Returns true if the failure happened after a page was open, so a
    /// failure screenshot is still meaningful.
    pub fn has_page(&self) -> bool {
        matches!(
            self,
            SmokeError::NavigationTimeout { .. }
                | SmokeError::Navigation(_)
                | SmokeError::ElementTimeout { .. }
                | SmokeError::Driver(_)
        )
    }
}
