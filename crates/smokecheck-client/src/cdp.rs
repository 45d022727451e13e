use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::browser_protocol::target::{CreateBrowserContextParams, CreateTargetParams};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use smokecheck_core::wait::{InflightRequests, NetworkSample, poll_until, settle_navigation};
use smokecheck_core::{BrowserDriver, BrowserOptions, BrowserSession, Locator, NavigationWait, SmokeError};
use tokio::task::JoinHandle;

use crate::discovery::find_chrome_binary;
use crate::scripts;

/// Browser driver speaking the Chrome DevTools Protocol via `chromiumoxide`.
///
/// Each [`launch`](BrowserDriver::launch) starts its own Chromium process and
/// opens one page inside a fresh browser context, so runs never share
/// cookies or storage. Network events on that page feed the in-flight
/// request count used by the network-idle wait.
///
/// # Example
///
/// ```rust,no_run
/// use smokecheck_client::CdpDriver;
/// use smokecheck_core::{BrowserDriver, BrowserOptions, BrowserSession, NavigationWait};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let driver = CdpDriver::new(BrowserOptions { headless: true, ..Default::default() });
/// let mut session = driver.launch().await?;
/// session.navigate("https://example.com", &NavigationWait::default()).await?;
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CdpDriver {
    options: BrowserOptions,
    request_timeout: Duration,
}

impl CdpDriver {
    /// Driver with a **30 s** per-command CDP timeout.
    pub fn new(options: BrowserOptions) -> Self {
        Self {
            options,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn browser_config(&self) -> Result<BrowserConfig, SmokeError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .disable_default_args()
            .request_timeout(self.request_timeout)
            .window_size(self.options.window_width, self.options.window_height);

        builder = if self.options.headless {
            builder.new_headless_mode()
        } else {
            builder.with_head()
        };

        let binary = self.options.browser_binary.clone().or_else(find_chrome_binary);
        if let Some(bin) = binary {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        builder
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-translate")
            .arg("--no-first-run")
            .build()
            .map_err(|e| SmokeError::Launch(format!("Browser config error: {e}")))
    }
}

impl BrowserDriver for CdpDriver {
    type Session = CdpSession;

    async fn launch(&self) -> Result<CdpSession, SmokeError> {
        let config = self.browser_config()?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SmokeError::Launch(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        let opened = match open_isolated_page(&mut browser).await {
            Ok(page) => {
                let inflight = Arc::new(InflightRequests::new());
                track_requests(&page, inflight.clone())
                    .await
                    .map(|network_task| (page, inflight, network_task))
            }
            Err(e) => Err(e),
        };

        match opened {
            Ok((page, inflight, network_task)) => Ok(CdpSession {
                browser,
                page,
                inflight,
                handler_task,
                network_task,
            }),
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                Err(e)
            }
        }
    }
}

async fn open_isolated_page(browser: &mut Browser) -> Result<Page, SmokeError> {
    let context_id = browser
        .create_browser_context(CreateBrowserContextParams::default())
        .await
        .map_err(|e| SmokeError::Launch(format!("Failed to create browser context: {e}")))?;

    let target = CreateTargetParams::builder()
        .url("about:blank")
        .browser_context_id(context_id)
        .build()
        .map_err(|e| SmokeError::Launch(format!("Invalid target params: {e}")))?;

    browser
        .new_page(target)
        .await
        .map_err(|e| SmokeError::Launch(format!("Failed to open page: {e}")))
}

/// Subscribe to the page's network events before any navigation happens.
async fn track_requests(
    page: &Page,
    inflight: Arc<InflightRequests>,
) -> Result<JoinHandle<()>, SmokeError> {
    let listen_err = |e: CdpError| SmokeError::Launch(format!("Failed to subscribe to network events: {e}"));
    let mut sent = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(listen_err)?;
    let mut finished = page
        .event_listener::<EventLoadingFinished>()
        .await
        .map_err(listen_err)?;
    let mut failed = page
        .event_listener::<EventLoadingFailed>()
        .await
        .map_err(listen_err)?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(event) = sent.next() => inflight.started(event.request_id.inner().clone()),
                Some(event) = finished.next() => inflight.finished(event.request_id.inner()),
                Some(event) = failed.next() => inflight.finished(event.request_id.inner()),
                else => break,
            }
        }
    }))
}

/// A launched Chromium with one page in its own browser context.
pub struct CdpSession {
    browser: Browser,
    page: Page,
    inflight: Arc<InflightRequests>,
    handler_task: JoinHandle<()>,
    network_task: JoinHandle<()>,
}

impl BrowserSession for CdpSession {
    type Element = Locator;

    async fn navigate(&mut self, url: &str, wait: &NavigationWait) -> Result<(), SmokeError> {
        let page = &self.page;
        let inflight = &self.inflight;
        let goto = async move {
            page.goto(url)
                .await
                .map(|_| ())
                .map_err(|e| SmokeError::Navigation(format!("Failed to navigate to {url}: {e}")))
        };

        settle_navigation(url, wait, goto, move || async move {
            let mut sample = evaluate::<NetworkSample>(page, scripts::NETWORK_SAMPLE).await?;
            sample.pending = inflight.count();
            Ok(sample)
        })
        .await
    }

    async fn wait_visible(
        &mut self,
        locator: &Locator,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Locator, SmokeError> {
        let page = &self.page;
        let script = scripts::visibility_check(locator);
        let script = script.as_str();

        let visible = poll_until(timeout, poll_interval, move || async move {
            let visible = evaluate::<bool>(page, script).await?;
            Ok(visible.then_some(()))
        })
        .await?;

        match visible {
            Some(()) => Ok(locator.clone()),
            None => Err(SmokeError::ElementTimeout {
                locator: locator.to_string(),
                timeout,
            }),
        }
    }

    /// The node is looked up again by locator; if the page re-rendered it
    /// away since the visibility wait, the text is absent rather than an error.
    async fn read_text(&mut self, element: &Locator) -> Result<Option<String>, SmokeError> {
        evaluate::<Option<String>>(&self.page, &scripts::text_content(element)).await
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, SmokeError> {
        self.page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(true)
                    .build(),
            )
            .await
            .map_err(|e| SmokeError::Screenshot(format!("CDP capture failed: {e}")))
    }

    async fn close(mut self) -> Result<(), SmokeError> {
        let result = self
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| SmokeError::Driver(format!("Failed to close browser: {e}")));

        if let Err(e) = self.browser.wait().await {
            tracing::debug!(error = %e, "Browser process did not exit cleanly");
        }
        self.network_task.abort();
        self.handler_task.abort();

        result
    }
}

/// Evaluate a JS expression in the page and deserialize its return value.
async fn evaluate<T: DeserializeOwned>(page: &Page, expression: &str) -> Result<T, SmokeError> {
    let params = EvaluateParams::builder()
        .expression(expression)
        .return_by_value(true)
        .build()
        .map_err(|e| SmokeError::Driver(format!("Invalid evaluate params: {e}")))?;

    let result = page
        .evaluate_expression(params)
        .await
        .map_err(|e| SmokeError::Driver(format!("JavaScript evaluation failed: {e}")))?;

    decode_value(result.object().value.clone())
}

/// CDP omits `value` for a JS `null`, so a missing value decodes as null.
fn decode_value<T: DeserializeOwned>(value: Option<Value>) -> Result<T, SmokeError> {
    Ok(serde_json::from_value(value.unwrap_or(Value::Null))?)
}
