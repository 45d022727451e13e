use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use smokecheck_client::{DEFAULT_WEBDRIVER_URL, find_local_chromedriver};
use smokecheck_core::pause::StdinPause;
use smokecheck_core::traits::BrowserDriver;
use smokecheck_core::{
    BrowserOptions, CheckConfig, CheckReport, ConsoleReporter, Locator, Outcome, SmokeCheck,
    SmokeError,
};

const EXIT_MISMATCH: u8 = 1;
const EXIT_FATAL: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "smokecheck",
    version,
    about = "Browser smoke check: load a page and verify a heading's text"
)]
struct Cli {
    /// Page to open (overrides SMOKE_URL)
    #[arg(short, long)]
    url: Option<String>,

    /// XPath of the element to verify (overrides SMOKE_XPATH)
    #[arg(short, long, conflicts_with = "css")]
    xpath: Option<String>,

    /// CSS selector of the element to verify, instead of an XPath
    #[arg(long)]
    css: Option<String>,

    /// Text the element must show after whitespace normalization (overrides SMOKE_EXPECTED)
    #[arg(short, long)]
    expected: Option<String>,

    /// Browser automation backend
    #[arg(short, long, value_enum, env = "SMOKE_DRIVER", default_value_t = DriverKind::Cdp)]
    driver: DriverKind,

    /// WebDriver server endpoint (webdriver backend only)
    #[arg(long, env = "SMOKE_WEBDRIVER_URL", default_value = DEFAULT_WEBDRIVER_URL)]
    webdriver_url: String,

    /// chromedriver binary to spawn (webdriver backend only)
    #[arg(long, env = "CHROMEDRIVER")]
    chromedriver: Option<PathBuf>,

    /// Spawn ./chromedriver from the working directory when --chromedriver is not given
    #[arg(long, default_value_t = false)]
    spawn_chromedriver: bool,

    /// Chrome/Chromium executable (defaults to CHROME_BIN or a well-known path)
    #[arg(long)]
    browser_binary: Option<PathBuf>,

    /// Run the browser without a window
    #[arg(long, env = "SMOKE_HEADLESS", default_value_t = false)]
    headless: bool,

    #[arg(long, default_value_t = 1280)]
    window_width: u32,

    #[arg(long, default_value_t = 800)]
    window_height: u32,

    /// Navigation + network-idle deadline (overrides SMOKE_NAV_TIMEOUT_SECS)
    #[arg(long)]
    nav_timeout_secs: Option<u64>,

    /// Element visibility deadline (overrides SMOKE_VISIBLE_TIMEOUT_SECS)
    #[arg(long)]
    visible_timeout_secs: Option<u64>,

    /// Quiet window for the network-idle wait (overrides SMOKE_IDLE_MS)
    #[arg(long)]
    idle_ms: Option<u64>,

    /// Interval between page checks in both waits (overrides SMOKE_POLL_MS)
    #[arg(long)]
    poll_ms: Option<u64>,

    /// Wait for Enter before closing the browser (or set SMOKE_PAUSE=true)
    #[arg(long, default_value_t = false)]
    pause: bool,

    /// Save a full-page PNG here when the check cannot finish (overrides SMOKE_SCREENSHOT_DIR)
    #[arg(long)]
    screenshot_dir: Option<PathBuf>,

    /// Exit 0 even when the text does not match
    #[arg(long, default_value_t = false)]
    no_fail_on_mismatch: bool,

    /// Print the run report as JSON on stdout
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DriverKind {
    /// Chrome DevTools Protocol (chromiumoxide)
    Cdp,
    /// W3C WebDriver (fantoccini + chromedriver)
    Webdriver,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    let _ = dotenvy::dotenv();

    if let Err(e) = init_tracing() {
        eprintln!("Error: {e:#}");
        return ExitCode::from(EXIT_FATAL);
    }

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("smokecheck=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn run(cli: Cli) -> Result<u8> {
    let base = CheckConfig::from_env().context("Invalid SMOKE_* environment")?;
    let config = apply_overrides(&cli, base);
    let options = browser_options(&cli);

    match cli.driver {
        DriverKind::Cdp => {
            #[cfg(feature = "cdp")]
            {
                execute(smokecheck_client::CdpDriver::new(options), config, cli.json).await
            }
            #[cfg(not(feature = "cdp"))]
            {
                let _ = (options, config);
                anyhow::bail!("smokecheck was built without the `cdp` feature")
            }
        }
        DriverKind::Webdriver => {
            #[cfg(feature = "webdriver")]
            {
                let cwd = std::env::current_dir().context("Cannot read working directory")?;
                let mut driver =
                    smokecheck_client::WebDriverDriver::new(options).with_url(&cli.webdriver_url);
                if let Some(binary) = chromedriver_binary(&cli, &cwd)? {
                    driver = driver.spawn_chromedriver(binary);
                }
                execute(driver, config, cli.json).await
            }
            #[cfg(not(feature = "webdriver"))]
            {
                let _ = (options, config);
                anyhow::bail!("smokecheck was built without the `webdriver` feature")
            }
        }
    }
}

async fn execute<D: BrowserDriver>(driver: D, config: CheckConfig, json: bool) -> Result<u8> {
    let check = SmokeCheck::new(driver, StdinPause, ConsoleReporter::stdio(), config);
    let result = check.run().await;

    match &result {
        Ok(report) if json => println!("{}", serde_json::to_string_pretty(report)?),
        Ok(_) => {}
        Err(e) => eprintln!("Error: Smoke check did not complete: {e}"),
    }

    Ok(exit_code(&result, check.config().fail_on_mismatch))
}

/// Layer command-line flags over the environment-derived config.
fn apply_overrides(cli: &Cli, mut config: CheckConfig) -> CheckConfig {
    if let Some(url) = &cli.url {
        config = config.with_url(url);
    }
    if let Some(xpath) = &cli.xpath {
        config = config.with_locator(Locator::xpath(xpath));
    }
    if let Some(css) = &cli.css {
        config = config.with_locator(Locator::css(css));
    }
    if let Some(expected) = &cli.expected {
        config = config.with_expected_text(expected);
    }
    if let Some(secs) = cli.nav_timeout_secs {
        config = config.with_navigation_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = cli.visible_timeout_secs {
        config = config.with_visibility_timeout(Duration::from_secs(secs));
    }
    if let Some(ms) = cli.idle_ms {
        config = config.with_quiet_window(Duration::from_millis(ms));
    }
    if let Some(ms) = cli.poll_ms {
        config = config.with_poll_interval(Duration::from_millis(ms));
    }
    if cli.pause {
        config = config.with_interactive_pause(true);
    }
    if cli.screenshot_dir.is_some() {
        config = config.with_screenshot_dir(cli.screenshot_dir.clone());
    }
    if cli.no_fail_on_mismatch {
        config = config.with_fail_on_mismatch(false);
    }
    config
}

fn browser_options(cli: &Cli) -> BrowserOptions {
    BrowserOptions {
        headless: cli.headless,
        window_width: cli.window_width,
        window_height: cli.window_height,
        browser_binary: cli.browser_binary.clone(),
    }
}

/// Which chromedriver to spawn, if any. An explicit path wins; otherwise
/// `--spawn-chromedriver` looks in `cwd`.
fn chromedriver_binary(cli: &Cli, cwd: &Path) -> Result<Option<PathBuf>> {
    if let Some(path) = &cli.chromedriver {
        return Ok(Some(path.clone()));
    }
    if !cli.spawn_chromedriver {
        return Ok(None);
    }
    find_local_chromedriver(cwd)
        .map(Some)
        .with_context(|| format!("No chromedriver binary found in {}", cwd.display()))
}

/// 0 verified, 1 mismatch (unless disabled), 2 the check could not finish.
fn exit_code(result: &Result<CheckReport, SmokeError>, fail_on_mismatch: bool) -> u8 {
    match result {
        Ok(report) => match report.outcome {
            Outcome::Passed => 0,
            Outcome::Failed if fail_on_mismatch => EXIT_MISMATCH,
            Outcome::Failed => 0,
        },
        Err(_) => EXIT_FATAL,
    }
}

#[cfg(test)]
mod tests {
    use smokecheck_core::testutil::MockDriver;

    use super::*;

    const EXPECTED: &str = "Welcome to Shady Meadows B&B";

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["smokecheck"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn no_flags_keep_defaults() {
        let config = apply_overrides(&parse(&[]), CheckConfig::default());
        let defaults = CheckConfig::default();

        assert_eq!(config.url, defaults.url);
        assert_eq!(config.locator, defaults.locator);
        assert_eq!(config.expected_text, defaults.expected_text);
        assert!(!config.interactive_pause);
        assert!(config.fail_on_mismatch);
    }

    #[test]
    fn flags_override_config() {
        let cli = parse(&[
            "--url",
            "https://example.com",
            "--css",
            "h1",
            "--expected",
            "Example Domain",
            "--nav-timeout-secs",
            "5",
            "--visible-timeout-secs",
            "3",
            "--idle-ms",
            "250",
            "--pause",
            "--screenshot-dir",
            "shots",
            "--no-fail-on-mismatch",
        ]);
        let config = apply_overrides(&cli, CheckConfig::default());

        assert_eq!(config.url, "https://example.com");
        assert_eq!(config.locator, Locator::css("h1"));
        assert_eq!(config.expected_text, "Example Domain");
        assert_eq!(config.navigation.timeout, Duration::from_secs(5));
        assert_eq!(config.visibility_timeout, Duration::from_secs(3));
        assert_eq!(config.navigation.quiet_window, Duration::from_millis(250));
        assert!(config.interactive_pause);
        assert_eq!(config.screenshot_dir, Some(PathBuf::from("shots")));
        assert!(!config.fail_on_mismatch);
    }

    #[test]
    fn pause_flag_does_not_clear_env_pause() {
        let base = CheckConfig::default().with_interactive_pause(true);
        let config = apply_overrides(&parse(&[]), base);
        assert!(config.interactive_pause);
    }

    #[test]
    fn xpath_and_css_conflict() {
        let result = Cli::try_parse_from(["smokecheck", "--xpath", "//h1", "--css", "h1"]);
        assert!(result.is_err());
    }

    #[test]
    fn driver_values() {
        assert_eq!(parse(&["--driver", "webdriver"]).driver, DriverKind::Webdriver);
        assert_eq!(parse(&["-d", "cdp"]).driver, DriverKind::Cdp);
        assert!(Cli::try_parse_from(["smokecheck", "--driver", "firefox"]).is_err());
    }

    #[test]
    fn browser_options_from_flags() {
        let options = browser_options(&parse(&[
            "--headless",
            "--window-width",
            "800",
            "--window-height",
            "600",
            "--browser-binary",
            "/usr/bin/chromium",
        ]));
        assert!(options.headless);
        assert_eq!((options.window_width, options.window_height), (800, 600));
        assert_eq!(options.browser_binary, Some(PathBuf::from("/usr/bin/chromium")));
    }

    #[test]
    fn chromedriver_explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let cli = parse(&["--chromedriver", "/opt/chromedriver", "--spawn-chromedriver"]);
        assert_eq!(
            chromedriver_binary(&cli, dir.path()).unwrap(),
            Some(PathBuf::from("/opt/chromedriver"))
        );
    }

    #[test]
    fn chromedriver_found_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cli = parse(&["--spawn-chromedriver"]);
        assert!(chromedriver_binary(&cli, dir.path()).is_err());

        let bin = dir.path().join("chromedriver");
        std::fs::write(&bin, b"").unwrap();
        assert_eq!(chromedriver_binary(&cli, dir.path()).unwrap(), Some(bin));
    }

    #[test]
    fn chromedriver_not_spawned_by_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(chromedriver_binary(&parse(&[]), dir.path()).unwrap(), None);
    }

    #[test]
    fn poll_flag_sets_both_intervals() {
        let config = apply_overrides(&parse(&["--poll-ms", "50"]), CheckConfig::default());
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.navigation.poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn flags_repair_invalid_env_values() {
        let base = CheckConfig::from_lookup(|key| match key {
            "SMOKE_VISIBLE_TIMEOUT_SECS" => Some("0".to_string()),
            _ => None,
        })
        .unwrap();
        let config = apply_overrides(&parse(&["--visible-timeout-secs", "5"]), base);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_webdriver_url() {
        assert_eq!(parse(&[]).webdriver_url, DEFAULT_WEBDRIVER_URL);
    }

    #[tokio::test]
    async fn verified_text_exits_zero() {
        let code = execute(MockDriver::with_text(EXPECTED), CheckConfig::default(), false)
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn mismatch_exits_one_unless_disabled() {
        let driver = MockDriver::with_text("Welcome to Shady Meadows A&B");
        let code = execute(driver, CheckConfig::default(), false).await.unwrap();
        assert_eq!(code, EXIT_MISMATCH);

        let driver = MockDriver::with_text("Welcome to Shady Meadows A&B");
        let config = CheckConfig::default().with_fail_on_mismatch(false);
        assert_eq!(execute(driver, config, true).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn launch_failure_exits_fatal() {
        let driver = MockDriver::with_text(EXPECTED).fail_launch(SmokeError::Launch("no chrome".into()));
        let code = execute(driver.clone(), CheckConfig::default(), false).await.unwrap();

        assert_eq!(code, EXIT_FATAL);
        assert_eq!(driver.calls(), vec!["launch"]);
    }

    #[tokio::test]
    async fn element_timeout_exits_fatal_after_release() {
        let driver = MockDriver::with_text(EXPECTED).fail_visible(SmokeError::ElementTimeout {
            locator: "xpath=//h1".into(),
            timeout: Duration::from_secs(10),
        });
        let code = execute(driver.clone(), CheckConfig::default(), false).await.unwrap();

        assert_eq!(code, EXIT_FATAL);
        assert_eq!(driver.count("close"), 1);
    }

    #[tokio::test]
    async fn invalid_final_config_exits_fatal() {
        let driver = MockDriver::with_text(EXPECTED);
        let config = CheckConfig::default().with_url("ftp://example.com/");
        let code = execute(driver.clone(), config, false).await.unwrap();

        assert_eq!(code, EXIT_FATAL);
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn release_failure_keeps_verified_exit_code() {
        let driver = MockDriver::with_text(EXPECTED)
            .fail_close(SmokeError::Driver("browser already gone".into()));
        let code = execute(driver, CheckConfig::default(), false).await.unwrap();
        assert_eq!(code, 0);
    }

    #[cfg(not(feature = "cdp"))]
    #[tokio::test]
    async fn cdp_driver_requires_feature() {
        let err = run(parse(&["--driver", "cdp"])).await.unwrap_err();
        assert!(err.to_string().contains("`cdp` feature"));
    }

    #[cfg(not(feature = "webdriver"))]
    #[tokio::test]
    async fn webdriver_requires_feature() {
        let err = run(parse(&["--driver", "webdriver"])).await.unwrap_err();
        assert!(err.to_string().contains("`webdriver` feature"));
    }
}
