pub mod discovery;
pub mod scripts;

#[cfg(feature = "cdp")]
pub mod cdp;
#[cfg(feature = "webdriver")]
pub mod webdriver;

#[cfg(feature = "cdp")]
pub use cdp::CdpDriver;
pub use discovery::{find_chrome_binary, find_local_chromedriver};
#[cfg(feature = "webdriver")]
pub use webdriver::WebDriverDriver;

/// Default chromedriver endpoint.
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
