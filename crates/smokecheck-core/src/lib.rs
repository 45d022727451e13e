pub mod check;
pub mod config;
pub mod error;
pub mod models;
pub mod pause;
pub mod report;
pub mod text;
pub mod traits;
pub mod wait;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use check::SmokeCheck;
pub use config::{BrowserOptions, CheckConfig};
pub use error::SmokeError;
pub use models::{CheckReport, Locator, NavigationWait, Outcome};
pub use report::{CheckEvent, CheckReporter, ConsoleReporter, TracingReporter};
pub use text::normalize_whitespace;
pub use traits::{BrowserDriver, BrowserSession, PauseGate};
