use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use crate::error::SmokeError;
use crate::models::Locator;

/// Events emitted by the smoke check as it progresses.
#[derive(Debug, Clone)]
pub enum CheckEvent<'a> {
    Launching,
    Navigating { url: &'a str },
    Navigated { url: &'a str },
    Located { locator: &'a Locator },
    TextRead { actual: &'a str },
    Verified { actual: &'a str },
    Mismatch { expected: &'a str, actual: &'a str },
    Aborted { error: &'a SmokeError },
    ScreenshotSaved { path: &'a Path },
    ScreenshotFailed { error: &'a SmokeError },
    Paused,
    Released,
    ReleaseFailed { error: &'a SmokeError },
}

impl CheckEvent<'_> {
    /// Stable short name, handy for assertions and structured logs.
    pub fn name(&self) -> &'static str {
        match self {
            CheckEvent::Launching => "launching",
            CheckEvent::Navigating { .. } => "navigating",
            CheckEvent::Navigated { .. } => "navigated",
            CheckEvent::Located { .. } => "located",
            CheckEvent::TextRead { .. } => "text_read",
            CheckEvent::Verified { .. } => "verified",
            CheckEvent::Mismatch { .. } => "mismatch",
            CheckEvent::Aborted { .. } => "aborted",
            CheckEvent::ScreenshotSaved { .. } => "screenshot_saved",
            CheckEvent::ScreenshotFailed { .. } => "screenshot_failed",
            CheckEvent::Paused => "paused",
            CheckEvent::Released => "released",
            CheckEvent::ReleaseFailed { .. } => "release_failed",
        }
    }
}

/// Trait for receiving check events (decoupled output).
pub trait CheckReporter: Send + Sync {
    fn report(&self, event: CheckEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl CheckReporter for TracingReporter {
    fn report(&self, event: CheckEvent<'_>) {
        match event {
            CheckEvent::Launching => {
                tracing::info!("Launching browser");
            }
            CheckEvent::Navigating { url } => {
                tracing::info!(%url, "Navigating");
            }
            CheckEvent::Navigated { url } => {
                tracing::info!(%url, "Network idle");
            }
            CheckEvent::Located { locator } => {
                tracing::info!(%locator, "Element visible");
            }
            CheckEvent::TextRead { actual } => {
                tracing::debug!(%actual, "Read element text");
            }
            CheckEvent::Verified { actual } => {
                tracing::info!(%actual, "Text verified");
            }
            CheckEvent::Mismatch { expected, actual } => {
                tracing::warn!(%expected, %actual, "Text mismatch");
            }
            CheckEvent::Aborted { error } => {
                tracing::error!(%error, "Check aborted");
            }
            CheckEvent::ScreenshotSaved { path } => {
                tracing::info!(path = %path.display(), "Failure screenshot saved");
            }
            CheckEvent::ScreenshotFailed { error } => {
                tracing::warn!(%error, "Could not capture failure screenshot");
            }
            CheckEvent::Paused => {
                tracing::debug!("Waiting for manual continue");
            }
            CheckEvent::Released => {
                tracing::info!("Browser closed");
            }
            CheckEvent::ReleaseFailed { error } => {
                tracing::warn!(%error, "Error closing browser");
            }
        }
    }
}

/// Prints the human-facing console lines and forwards every event to tracing.
///
/// stdout: `actualWelcome: <text>`, `Welcome text verified: <text>`, pause prompt.
/// stderr: `Failed.`, `Error closing browser: <message>`.
pub struct ConsoleReporter<O, E> {
    out: Mutex<O>,
    err: Mutex<E>,
}

impl ConsoleReporter<std::io::Stdout, std::io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdout(), std::io::stderr())
    }
}

impl<O: Write + Send, E: Write + Send> ConsoleReporter<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self {
            out: Mutex::new(out),
            err: Mutex::new(err),
        }
    }

    fn line_out(&self, line: std::fmt::Arguments<'_>) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{line}");
            let _ = out.flush();
        }
    }

    fn line_err(&self, line: std::fmt::Arguments<'_>) {
        if let Ok(mut err) = self.err.lock() {
            let _ = writeln!(err, "{line}");
            let _ = err.flush();
        }
    }
}

impl<O: Write + Send, E: Write + Send> CheckReporter for ConsoleReporter<O, E> {
    fn report(&self, event: CheckEvent<'_>) {
        match &event {
            CheckEvent::TextRead { actual } => self.line_out(format_args!("actualWelcome: {actual}")),
            CheckEvent::Verified { actual } => {
                self.line_out(format_args!("Welcome text verified: {actual}"))
            }
            CheckEvent::Mismatch { .. } => self.line_err(format_args!("Failed.")),
            CheckEvent::Paused => self.line_out(format_args!("Press Enter to close browser...")),
            CheckEvent::ReleaseFailed { error } => {
                self.line_err(format_args!("Error closing browser: {error}"))
            }
            _ => {}
        }
        TracingReporter.report(event);
    }
}
