use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use smokecheck_core::wait::{NetworkSample, poll_until, settle_navigation};
use smokecheck_core::{BrowserDriver, BrowserOptions, BrowserSession, Locator, NavigationWait, SmokeError};
use tokio::process::{Child, Command};
use url::Url;

use crate::{DEFAULT_WEBDRIVER_URL, scripts};

const DRIVER_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Browser driver speaking the W3C WebDriver protocol via `fantoccini`.
///
/// Connects to a running WebDriver server, or spawns a local `chromedriver`
/// binary on the port of the configured URL.
#[derive(Debug, Clone)]
pub struct WebDriverDriver {
    options: BrowserOptions,
    webdriver_url: String,
    chromedriver: Option<PathBuf>,
}

impl WebDriverDriver {
    pub fn new(options: BrowserOptions) -> Self {
        Self {
            options,
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            chromedriver: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.webdriver_url = url.into();
        self
    }

    /// Spawn this chromedriver binary for every session instead of
    /// expecting one to be running already.
    pub fn spawn_chromedriver(mut self, binary: PathBuf) -> Self {
        self.chromedriver = Some(binary);
        self
    }

    /// Session capabilities: chromeOptions args for window size and headless mode.
    fn capabilities(&self) -> serde_json::Map<String, Value> {
        let mut args = vec![format!(
            "--window-size={},{}",
            self.options.window_width, self.options.window_height
        )];
        if self.options.headless {
            args.push("--headless=new".to_string());
        }

        let mut chrome_options = json!({ "args": args });
        if let Some(bin) = &self.options.browser_binary {
            chrome_options["binary"] = json!(bin.display().to_string());
        }

        let mut caps = serde_json::Map::new();
        caps.insert("browserName".into(), json!("chrome"));
        caps.insert("pageLoadStrategy".into(), json!("normal"));
        caps.insert("goog:chromeOptions".into(), chrome_options);
        caps
    }

    fn endpoint(&self) -> Result<(String, u16), SmokeError> {
        let parsed = Url::parse(&self.webdriver_url).map_err(|e| {
            SmokeError::Config(format!("Invalid WebDriver URL '{}': {e}", self.webdriver_url))
        })?;
        let host = parsed
            .host_str()
            .ok_or_else(|| SmokeError::Config("WebDriver URL has no host".into()))?
            .to_string();
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| SmokeError::Config("WebDriver URL has no port".into()))?;
        Ok((host, port))
    }

    async fn start_chromedriver(&self, binary: &Path) -> Result<Child, SmokeError> {
        let (host, port) = self.endpoint()?;
        tracing::info!(binary = %binary.display(), port, "Starting chromedriver");

        let mut child = Command::new(binary)
            .arg(format!("--port={port}"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SmokeError::Launch(format!("Failed to start {}: {e}", binary.display()))
            })?;

        let addr = (host.as_str(), port);
        let ready = poll_until(DRIVER_STARTUP_TIMEOUT, Duration::from_millis(100), move || async move {
            Ok(tokio::net::TcpStream::connect(addr).await.ok().map(|_| ()))
        })
        .await?;

        if ready.is_none() {
            let _ = child.kill().await;
            return Err(SmokeError::Launch(format!(
                "chromedriver did not listen on port {port} within {} seconds",
                DRIVER_STARTUP_TIMEOUT.as_secs()
            )));
        }

        Ok(child)
    }
}

impl BrowserDriver for WebDriverDriver {
    type Session = WebDriverSession;

    async fn launch(&self) -> Result<WebDriverSession, SmokeError> {
        let mut chromedriver = match &self.chromedriver {
            Some(binary) => Some(self.start_chromedriver(binary).await?),
            None => None,
        };

        let mut builder = ClientBuilder::native();
        builder.capabilities(self.capabilities());

        match builder.connect(&self.webdriver_url).await {
            Ok(client) => {
                tracing::info!(url = %self.webdriver_url, "WebDriver session created");
                Ok(WebDriverSession {
                    client,
                    chromedriver,
                })
            }
            Err(e) => {
                if let Some(child) = chromedriver.as_mut() {
                    let _ = child.kill().await;
                }
                Err(SmokeError::Launch(format!(
                    "Failed to start WebDriver session at {}: {e}",
                    self.webdriver_url
                )))
            }
        }
    }
}

/// One WebDriver session (one browser window), plus the chromedriver
/// process when this driver spawned it.
pub struct WebDriverSession {
    client: Client,
    chromedriver: Option<Child>,
}

impl BrowserSession for WebDriverSession {
    type Element = Element;

    async fn navigate(&mut self, url: &str, wait: &NavigationWait) -> Result<(), SmokeError> {
        let client = &self.client;
        let goto = async move {
            client
                .goto(url)
                .await
                .map_err(|e| SmokeError::Navigation(format!("Failed to navigate to {url}: {e}")))
        };

        settle_navigation(url, wait, goto, move || async move {
            execute::<NetworkSample>(client, scripts::NETWORK_SAMPLE).await
        })
        .await
    }

    /// Visibility is decided by the same page-side script as the CDP backend
    /// (non-empty box, not `visibility: hidden`), not by WebDriver's
    /// `is_displayed`. The element handle is fetched once the script reports it visible.
    async fn wait_visible(
        &mut self,
        locator: &Locator,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Element, SmokeError> {
        let client = &self.client;
        let script = scripts::visibility_check(locator);
        let script = script.as_str();

        let element = poll_until(timeout, poll_interval, move || async move {
            if !execute::<bool>(client, script).await? {
                return Ok(None);
            }

            match client.find(to_wd_locator(locator)).await {
                Ok(element) => Ok(Some(element)),
                // Re-rendered between the check and the lookup; check again.
                Err(e) if e.is_no_such_element() => Ok(None),
                Err(e) => Err(SmokeError::Driver(format!("Locating {locator} failed: {e}"))),
            }
        })
        .await?;

        element.ok_or_else(|| SmokeError::ElementTimeout {
            locator: locator.to_string(),
            timeout,
        })
    }

    async fn read_text(&mut self, element: &Element) -> Result<Option<String>, SmokeError> {
        element
            .prop("textContent")
            .await
            .map_err(|e| SmokeError::Driver(format!("Failed to read text: {e}")))
    }

    /// WebDriver only captures the viewport, not the full page.
    async fn screenshot(&mut self) -> Result<Vec<u8>, SmokeError> {
        self.client
            .screenshot()
            .await
            .map_err(|e| SmokeError::Screenshot(format!("WebDriver capture failed: {e}")))
    }

    async fn close(mut self) -> Result<(), SmokeError> {
        let result = self
            .client
            .close()
            .await
            .map_err(|e| SmokeError::Driver(format!("Failed to end WebDriver session: {e}")));

        if let Some(mut child) = self.chromedriver.take() {
            if let Err(e) = child.kill().await {
                tracing::debug!(error = %e, "chromedriver already exited");
            }
        }

        result
    }
}

fn to_wd_locator(locator: &Locator) -> fantoccini::Locator<'_> {
    match locator {
        Locator::XPath(expr) => fantoccini::Locator::XPath(expr),
        Locator::Css(expr) => fantoccini::Locator::Css(expr),
    }
}

/// Run a JS expression through WebDriver `execute` and deserialize the result.
async fn execute<T: DeserializeOwned>(client: &Client, expression: &str) -> Result<T, SmokeError> {
    let value = client
        .execute(&scripts::as_function_body(expression), vec![])
        .await
        .map_err(|e: CmdError| SmokeError::Driver(format!("Script execution failed: {e}")))?;
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_headless() {
        let driver = WebDriverDriver::new(BrowserOptions {
            headless: true,
            window_width: 1024,
            window_height: 768,
            browser_binary: Some(PathBuf::from("/usr/bin/chromium")),
        });
        let caps = driver.capabilities();

        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.contains(&json!("--headless=new")));
        assert!(args.contains(&json!("--window-size=1024,768")));
        assert_eq!(caps["goog:chromeOptions"]["binary"], json!("/usr/bin/chromium"));
        assert_eq!(caps["pageLoadStrategy"], json!("normal"));
    }

    #[test]
    fn capabilities_headed_has_no_headless_flag() {
        let caps = WebDriverDriver::new(BrowserOptions::default()).capabilities();
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(!args.iter().any(|a| a.as_str().unwrap_or("").starts_with("--headless")));
        assert!(caps["goog:chromeOptions"].get("binary").is_none());
    }

    #[test]
    fn endpoint_parses_host_and_port() {
        let driver = WebDriverDriver::new(BrowserOptions::default()).with_url("http://127.0.0.1:4444");
        assert_eq!(driver.endpoint().unwrap(), ("127.0.0.1".to_string(), 4444));

        let default = WebDriverDriver::new(BrowserOptions::default());
        assert_eq!(default.endpoint().unwrap(), ("localhost".to_string(), 9515));
    }

    #[test]
    fn endpoint_rejects_garbage() {
        let driver = WebDriverDriver::new(BrowserOptions::default()).with_url("not a url");
        assert!(matches!(driver.endpoint(), Err(SmokeError::Config(_))));
    }

    #[test]
    fn maps_locators() {
        let xpath = Locator::xpath("//h1");
        assert!(matches!(to_wd_locator(&xpath), fantoccini::Locator::XPath("//h1")));
        let css = Locator::css("h1");
        assert!(matches!(to_wd_locator(&css), fantoccini::Locator::Css("h1")));
    }

    #[test]
    fn visibility_uses_shared_page_script() {
        let locator = Locator::xpath("//h1");
        let body = scripts::as_function_body(&scripts::visibility_check(&locator));
        assert!(body.starts_with("return (() => {"));
        assert!(body.contains("getBoundingClientRect"));
    }

    #[tokio::test]
    async fn missing_chromedriver_binary_fails_launch() {
        let driver = WebDriverDriver::new(BrowserOptions::default())
            .spawn_chromedriver(PathBuf::from("/nonexistent/chromedriver"));
        let err = driver.launch().await.err().unwrap();
        assert!(matches!(err, SmokeError::Launch(_)));
    }
}
