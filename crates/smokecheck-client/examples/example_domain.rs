/// Drives `CdpDriver` by hand against <https://example.com>.
///
/// Launches a headless Chromium, waits for network idle, checks that the
/// `<h1>` is visible and reads its text.
///
/// Run with:
///   cargo run -p smokecheck-client --example example_domain
use std::time::Duration;

use smokecheck_client::CdpDriver;
use smokecheck_core::{
    BrowserDriver, BrowserOptions, BrowserSession, Locator, NavigationWait, normalize_whitespace,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let driver = CdpDriver::new(BrowserOptions {
        headless: true,
        ..Default::default()
    });

    println!("Launching headless browser…");
    let mut session = driver.launch().await?;

    let url = "https://example.com";
    println!("Navigating to {url} …");
    session.navigate(url, &NavigationWait::default()).await?;

    let locator = Locator::xpath("//h1");
    let element = session
        .wait_visible(&locator, Duration::from_secs(10), Duration::from_millis(100))
        .await?;
    let text = session.read_text(&element).await?.unwrap_or_default();
    session.close().await?;

    let text = normalize_whitespace(&text);
    assert_eq!(text, "Example Domain", "unexpected <h1> text");
    println!("OK, <h1> reads {text:?}");
    Ok(())
}
