//! Test utilities: mock implementations of the driver, pause, and reporter traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::SmokeError;
use crate::models::{Locator, NavigationWait};
use crate::report::{CheckEvent, CheckReporter};
use crate::traits::{BrowserDriver, BrowserSession, PauseGate};

/// Bytes returned by [`MockSession::screenshot`].
pub const MOCK_PNG: &[u8] = b"\x89PNG\r\n\x1a\nmock";

// ---------------------------------------------------------------------------
// MockDriver / MockSession
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Script {
    calls: Mutex<Vec<&'static str>>,
    text: Mutex<Option<String>>,
    launch_error: Mutex<Option<SmokeError>>,
    navigate_error: Mutex<Option<SmokeError>>,
    visible_error: Mutex<Option<SmokeError>>,
    read_error: Mutex<Option<SmokeError>>,
    screenshot_error: Mutex<Option<SmokeError>>,
    close_error: Mutex<Option<SmokeError>>,
    navigated_to: Mutex<Vec<String>>,
    located: Mutex<Vec<Locator>>,
}

impl Script {
    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn take(slot: &Mutex<Option<SmokeError>>) -> Result<(), SmokeError> {
        match slot.lock().unwrap().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Mock driver whose sessions follow a configurable script.
///
/// Every session shares the driver's call log, so a test can assert on the
/// exact sequence `launch → navigate → wait_visible → read_text → close`.
#[derive(Clone)]
pub struct MockDriver {
    script: Arc<Script>,
}

impl MockDriver {
    /// Sessions find a visible element with the given raw text.
    pub fn with_text(text: &str) -> Self {
        let script = Script::default();
        *script.text.lock().unwrap() = Some(text.to_string());
        Self {
            script: Arc::new(script),
        }
    }

    /// Sessions find a visible element that has no text content.
    pub fn without_text() -> Self {
        Self {
            script: Arc::new(Script::default()),
        }
    }

    pub fn fail_launch(self, error: SmokeError) -> Self {
        *self.script.launch_error.lock().unwrap() = Some(error);
        self
    }

    pub fn fail_navigate(self, error: SmokeError) -> Self {
        *self.script.navigate_error.lock().unwrap() = Some(error);
        self
    }

    pub fn fail_visible(self, error: SmokeError) -> Self {
        *self.script.visible_error.lock().unwrap() = Some(error);
        self
    }

    pub fn fail_read(self, error: SmokeError) -> Self {
        *self.script.read_error.lock().unwrap() = Some(error);
        self
    }

    pub fn fail_screenshot(self, error: SmokeError) -> Self {
        *self.script.screenshot_error.lock().unwrap() = Some(error);
        self
    }

    pub fn fail_close(self, error: SmokeError) -> Self {
        *self.script.close_error.lock().unwrap() = Some(error);
        self
    }

    /// Recorded calls in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.script.calls.lock().unwrap().clone()
    }

    /// How many times a given call was made.
    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    pub fn navigated_to(&self) -> Vec<String> {
        self.script.navigated_to.lock().unwrap().clone()
    }

    pub fn located(&self) -> Vec<Locator> {
        self.script.located.lock().unwrap().clone()
    }
}

impl BrowserDriver for MockDriver {
    type Session = MockSession;

    async fn launch(&self) -> Result<MockSession, SmokeError> {
        self.script.record("launch");
        Script::take(&self.script.launch_error)?;
        Ok(MockSession {
            script: self.script.clone(),
        })
    }
}

/// Session handed out by [`MockDriver`].
pub struct MockSession {
    script: Arc<Script>,
}

impl BrowserSession for MockSession {
    type Element = ();

    async fn navigate(&mut self, url: &str, _wait: &NavigationWait) -> Result<(), SmokeError> {
        self.script.record("navigate");
        self.script.navigated_to.lock().unwrap().push(url.to_string());
        Script::take(&self.script.navigate_error)
    }

    async fn wait_visible(
        &mut self,
        locator: &Locator,
        _timeout: Duration,
        _poll_interval: Duration,
    ) -> Result<(), SmokeError> {
        self.script.record("wait_visible");
        self.script.located.lock().unwrap().push(locator.clone());
        Script::take(&self.script.visible_error)
    }

    async fn read_text(&mut self, _element: &()) -> Result<Option<String>, SmokeError> {
        self.script.record("read_text");
        Script::take(&self.script.read_error)?;
        Ok(self.script.text.lock().unwrap().clone())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, SmokeError> {
        self.script.record("screenshot");
        Script::take(&self.script.screenshot_error)?;
        Ok(MOCK_PNG.to_vec())
    }

    async fn close(self) -> Result<(), SmokeError> {
        self.script.record("close");
        Script::take(&self.script.close_error)
    }
}

// ---------------------------------------------------------------------------
// MockPause
// ---------------------------------------------------------------------------

/// Pause gate that returns immediately and counts invocations.
#[derive(Clone, Default)]
pub struct MockPause {
    waits: Arc<AtomicUsize>,
}

impl MockPause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }
}

impl PauseGate for MockPause {
    async fn wait(&self) {
        self.waits.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that records the name of every event it receives.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }
}

impl CheckReporter for RecordingReporter {
    fn report(&self, event: CheckEvent<'_>) {
        self.events.lock().unwrap().push(event.name());
    }
}

// ---------------------------------------------------------------------------
// SharedBuffer
// ---------------------------------------------------------------------------

/// Cloneable in-memory writer, for capturing console output.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.bytes.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
