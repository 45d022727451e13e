use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::config::CheckConfig;
use crate::error::SmokeError;
use crate::models::{CheckReport, Outcome};
use crate::report::{CheckEvent, CheckReporter};
use crate::text::normalize_text;
use crate::traits::{BrowserDriver, BrowserSession, PauseGate};

const SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the smoke check: launch → navigate → wait visible → read → normalize →
/// compare → report → pause → release.
///
/// Generic over the browser backend, the pause gate and the reporter, so
/// the same procedure drives CDP, WebDriver, or a mock in tests.
pub struct SmokeCheck<D, P, R>
where
    D: BrowserDriver,
    P: PauseGate,
    R: CheckReporter,
{
    driver: D,
    pause: P,
    reporter: R,
    config: CheckConfig,
}

impl<D, P, R> SmokeCheck<D, P, R>
where
    D: BrowserDriver,
    P: PauseGate,
    R: CheckReporter,
{
    pub fn new(driver: D, pause: P, reporter: R, config: CheckConfig) -> Self {
        Self {
            driver,
            pause,
            reporter,
            config,
        }
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Run the check once.
    ///
    /// Once a session is launched it is closed exactly once on every path.
    /// A failed close is reported but never replaces an earlier error and
    /// never turns a finished check into an error.
    pub async fn run(&self) -> Result<CheckReport, SmokeError> {
        self.config.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        self.reporter.report(CheckEvent::Launching);
        let mut session = self.driver.launch().await.inspect_err(|error| {
            self.reporter.report(CheckEvent::Aborted { error });
        })?;

        let checked = match self.verify(&mut session).await {
            Ok(checked) => {
                if self.config.interactive_pause {
                    self.reporter.report(CheckEvent::Paused);
                    self.pause.wait().await;
                }
                Ok(checked)
            }
            Err(error) => {
                self.reporter.report(CheckEvent::Aborted { error: &error });
                self.capture_failure(&mut session, run_id, &error).await;
                Err(error)
            }
        };

        let release_error = match session.close().await {
            Ok(()) => {
                self.reporter.report(CheckEvent::Released);
                None
            }
            Err(error) => {
                self.reporter.report(CheckEvent::ReleaseFailed { error: &error });
                Some(error.to_string())
            }
        };

        let (actual, outcome) = checked?;

        Ok(CheckReport {
            run_id,
            url: self.config.url.clone(),
            locator: self.config.locator.clone(),
            expected: self.config.expected_text.clone(),
            actual,
            outcome,
            started_at,
            finished_at: Utc::now(),
            release_error,
        })
    }

    async fn verify(&self, session: &mut D::Session) -> Result<(String, Outcome), SmokeError> {
        let config = &self.config;

        self.reporter.report(CheckEvent::Navigating { url: &config.url });
        session.navigate(&config.url, &config.navigation).await?;
        self.reporter.report(CheckEvent::Navigated { url: &config.url });

        let element = session
            .wait_visible(&config.locator, config.visibility_timeout, config.poll_interval)
            .await?;
        self.reporter.report(CheckEvent::Located {
            locator: &config.locator,
        });

        let raw = session.read_text(&element).await?;
        let actual = normalize_text(raw.as_deref());
        self.reporter.report(CheckEvent::TextRead { actual: &actual });

        let outcome = Outcome::compare(&actual, &config.expected_text);
        if outcome.passed() {
            self.reporter.report(CheckEvent::Verified { actual: &actual });
        } else {
            self.reporter.report(CheckEvent::Mismatch {
                expected: &config.expected_text,
                actual: &actual,
            });
        }

        Ok((actual, outcome))
    }

    /// Save `<dir>/<run_id>-failed.png` if a screenshot directory is configured.
    async fn capture_failure(
        &self,
        session: &mut D::Session,
        run_id: Uuid,
        error: &SmokeError,
    ) -> Option<PathBuf> {
        let dir = self.config.screenshot_dir.as_deref()?;
        if !error.has_page() {
            return None;
        }

        let saved = match tokio::time::timeout(
            SCREENSHOT_TIMEOUT,
            save_screenshot(session, dir, run_id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SmokeError::Screenshot(format!(
                "timed out after {} seconds",
                SCREENSHOT_TIMEOUT.as_secs()
            ))),
        };

        match saved {
            Ok(path) => {
                self.reporter.report(CheckEvent::ScreenshotSaved { path: &path });
                Some(path)
            }
            Err(error) => {
                self.reporter.report(CheckEvent::ScreenshotFailed { error: &error });
                None
            }
        }
    }
}

async fn save_screenshot<S: BrowserSession>(
    session: &mut S,
    dir: &Path,
    run_id: Uuid,
) -> Result<PathBuf, SmokeError> {
    let png = session.screenshot().await?;
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{run_id}-failed.png"));
    tokio::fs::write(&path, png).await?;
    Ok(path)
}
