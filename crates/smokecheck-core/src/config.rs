use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::SmokeError;
use crate::models::{Locator, NavigationWait};

pub const DEFAULT_URL: &str = "https://automationintesting.online/";
pub const DEFAULT_XPATH: &str = r#"//*[@id="root-container"]/div/section[1]/div/div/div/h1"#;
pub const DEFAULT_EXPECTED: &str = "Welcome to Shady Meadows B&B";

/// Parameters of a single smoke check run.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub url: String,
    pub locator: Locator,
    pub expected_text: String,
    pub navigation: NavigationWait,
    /// How long the located element may take to become visible.
    pub visibility_timeout: Duration,
    /// Delay between visibility checks.
    pub poll_interval: Duration,
    /// Block on stdin before releasing the browser.
    pub interactive_pause: bool,
    /// Whether a text mismatch should fail the process.
    pub fail_on_mismatch: bool,
    /// Where to write `<run_id>-failed.png` when a wait fails.
    pub screenshot_dir: Option<PathBuf>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            locator: Locator::xpath(DEFAULT_XPATH),
            expected_text: DEFAULT_EXPECTED.to_string(),
            navigation: NavigationWait::default(),
            visibility_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
            interactive_pause: false,
            fail_on_mismatch: true,
            screenshot_dir: None,
        }
    }
}

impl CheckConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_locator(mut self, locator: Locator) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_expected_text(mut self, expected: impl Into<String>) -> Self {
        self.expected_text = expected.into();
        self
    }

    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation.timeout = timeout;
        self
    }

    pub fn with_quiet_window(mut self, window: Duration) -> Self {
        self.navigation.quiet_window = window;
        self
    }

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self.navigation.poll_interval = interval;
        self
    }

    pub fn with_interactive_pause(mut self, pause: bool) -> Self {
        self.interactive_pause = pause;
        self
    }

    pub fn with_fail_on_mismatch(mut self, fail: bool) -> Self {
        self.fail_on_mismatch = fail;
        self
    }

    pub fn with_screenshot_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.screenshot_dir = dir;
        self
    }

    /// Read overrides from `SMOKE_*` environment variables on top of the defaults.
    ///
    /// - `SMOKE_URL`, `SMOKE_XPATH`, `SMOKE_EXPECTED`
    /// - `SMOKE_NAV_TIMEOUT_SECS`, `SMOKE_VISIBLE_TIMEOUT_SECS`, `SMOKE_IDLE_MS`
    /// - `SMOKE_POLL_MS`, `SMOKE_PAUSE`, `SMOKE_SCREENSHOT_DIR`
    ///
    /// Only malformed values are rejected here. The result is not validated,
    /// so later overrides (CLI flags) can still replace a bad value;
    /// [`SmokeCheck::run`](crate::SmokeCheck::run) validates the final config.
    pub fn from_env() -> Result<Self, SmokeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SmokeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("SMOKE_URL") {
            config.url = url;
        }
        if let Some(xpath) = lookup("SMOKE_XPATH") {
            config.locator = Locator::xpath(xpath);
        }
        if let Some(expected) = lookup("SMOKE_EXPECTED") {
            config.expected_text = expected;
        }
        if let Some(raw) = lookup("SMOKE_NAV_TIMEOUT_SECS") {
            config.navigation.timeout = Duration::from_secs(parse_u64("SMOKE_NAV_TIMEOUT_SECS", &raw)?);
        }
        if let Some(raw) = lookup("SMOKE_VISIBLE_TIMEOUT_SECS") {
            config.visibility_timeout =
                Duration::from_secs(parse_u64("SMOKE_VISIBLE_TIMEOUT_SECS", &raw)?);
        }
        if let Some(raw) = lookup("SMOKE_IDLE_MS") {
            config.navigation.quiet_window = Duration::from_millis(parse_u64("SMOKE_IDLE_MS", &raw)?);
        }
        if let Some(raw) = lookup("SMOKE_POLL_MS") {
            config = config.with_poll_interval(Duration::from_millis(parse_u64("SMOKE_POLL_MS", &raw)?));
        }
        if let Some(raw) = lookup("SMOKE_PAUSE") {
            config.interactive_pause = parse_bool("SMOKE_PAUSE", &raw)?;
        }
        if let Some(dir) = lookup("SMOKE_SCREENSHOT_DIR") {
            if !dir.trim().is_empty() {
                config.screenshot_dir = Some(PathBuf::from(dir));
            }
        }

        Ok(config)
    }

    /// Reject configurations the procedure cannot run with.
    pub fn validate(&self) -> Result<(), SmokeError> {
        let parsed = Url::parse(&self.url)
            .map_err(|e| SmokeError::Config(format!("Invalid target URL '{}': {e}", self.url)))?;
        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(SmokeError::Config(format!(
                    "URL scheme '{scheme}' is not allowed (only http/https)"
                )));
            }
        }

        if self.locator.is_empty() {
            return Err(SmokeError::Config("Locator expression must not be empty".into()));
        }
        if self.expected_text.trim().is_empty() {
            return Err(SmokeError::Config("Expected text must not be empty".into()));
        }
        if self.navigation.timeout.is_zero() {
            return Err(SmokeError::Config("Navigation timeout must be greater than zero".into()));
        }
        if self.visibility_timeout.is_zero() {
            return Err(SmokeError::Config("Visibility timeout must be greater than zero".into()));
        }
        if self.poll_interval.is_zero() || self.navigation.poll_interval.is_zero() {
            return Err(SmokeError::Config("Poll interval must be greater than zero".into()));
        }

        Ok(())
    }
}

/// Launch options shared by every browser driver.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Run without a visible window (default: false, so the page can be inspected).
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Explicit browser executable; `None` lets the driver search.
    pub browser_binary: Option<PathBuf>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: false,
            window_width: 1280,
            window_height: 800,
            browser_binary: None,
        }
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, SmokeError> {
    raw.trim()
        .parse()
        .map_err(|_| SmokeError::Config(format!("Invalid {key} '{raw}': must be a non-negative integer")))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, SmokeError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(SmokeError::Config(format!(
            "Invalid {key} '{raw}': expected true/false"
        ))),
    }
}
