use std::future::Future;
use std::time::Duration;

use crate::error::SmokeError;
use crate::models::{Locator, NavigationWait};

/// Starts a browser and hands out an exclusively owned session.
///
/// Implemented once per automation backend (CDP, WebDriver, test mocks), so
/// the check procedure is written only once.
pub trait BrowserDriver: Send + Sync {
    type Session: BrowserSession;

    /// Launch the browser and open a fresh, isolated context with one page.
    fn launch(&self) -> impl Future<Output = Result<Self::Session, SmokeError>> + Send;
}

/// One isolated browsing context with a single page.
pub trait BrowserSession: Send {
    /// Handle to a located element, valid until the session is closed.
    type Element: Send + Sync;

    /// Navigate and block until the network is idle or `wait.timeout` elapses.
    fn navigate(
        &mut self,
        url: &str,
        wait: &NavigationWait,
    ) -> impl Future<Output = Result<(), SmokeError>> + Send;

    /// Resolve the locator and block until the element is visible or `timeout` elapses.
    fn wait_visible(
        &mut self,
        locator: &Locator,
        timeout: Duration,
        poll_interval: Duration,
    ) -> impl Future<Output = Result<Self::Element, SmokeError>> + Send;

    /// Text content of the element. `None` when the element has none.
    fn read_text(
        &mut self,
        element: &Self::Element,
    ) -> impl Future<Output = Result<Option<String>, SmokeError>> + Send;

    /// PNG of the current page: the full page where the backend can, else the viewport.
    fn screenshot(&mut self) -> impl Future<Output = Result<Vec<u8>, SmokeError>> + Send;

    /// Release the browser resources. Consumes the session.
    fn close(self) -> impl Future<Output = Result<(), SmokeError>> + Send;
}

/// Gate that lets a human inspect the browser before teardown.
pub trait PauseGate: Send + Sync {
    fn wait(&self) -> impl Future<Output = ()> + Send;
}
