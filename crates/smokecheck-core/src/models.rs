use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// An expression identifying one element in the rendered page.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "expr", rename_all = "lowercase")]
pub enum Locator {
    XPath(String),
    Css(String),
}

impl Locator {
    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }

    pub fn css(expr: impl Into<String>) -> Self {
        Locator::Css(expr.into())
    }

    /// The raw selector expression.
    pub fn expr(&self) -> &str {
        match self {
            Locator::XPath(e) | Locator::Css(e) => e,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.expr().trim().is_empty()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::XPath(e) => write!(f, "xpath={e}"),
            Locator::Css(e) => write!(f, "css={e}"),
        }
    }
}

/// How long and how strictly navigation waits for the network to settle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationWait {
    /// Upper bound on the whole navigation, including the idle wait.
    pub timeout: Duration,
    /// The resource count must stay unchanged this long to count as idle.
    pub quiet_window: Duration,
    /// Delay between network samples.
    pub poll_interval: Duration,
}

impl Default for NavigationWait {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            quiet_window: Duration::from_millis(500),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Result of comparing normalized actual text against the expected text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
}

impl Outcome {
    /// Exact, case-sensitive, byte-for-byte comparison.
    pub fn compare(actual: &str, expected: &str) -> Self {
        if actual == expected {
            Outcome::Passed
        } else {
            Outcome::Failed
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }
}

/// A completed smoke check.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckReport {
    pub run_id: Uuid,
    pub url: String,
    pub locator: Locator,
    pub expected: String,
    /// Normalized text read from the element (empty if it had none).
    pub actual: String,
    pub outcome: Outcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Set only when the browser could not be released cleanly.
    pub release_error: Option<String>,
}
