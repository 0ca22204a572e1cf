//! Harness for the translator page
//!
//! Thin wrapper over the driver that knows the page's two textareas and the
//! clear -> type -> settle -> read sequence every scenario follows. Each
//! [`TranslatorPage::open`] gets a fresh browser context, so nothing leaks
//! between cases.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::convergence::{wait_for_settled, ConvergencePolicy, SettleOutcome};
use crate::driver::PlaywrightDriver;
use crate::error::E2eResult;

/// Singlish input textarea, matched by its placeholder text.
pub const INPUT_SELECTOR: &str = r#"textarea[placeholder*="Singlish"]"#;
/// Sinhala output textarea, matched by its placeholder text.
pub const OUTPUT_SELECTOR: &str = r#"textarea[placeholder*="Sinhala"]"#;

/// Live translator page.
pub const DEFAULT_BASE_URL: &str = "https://www.swifttranslator.com/";

/// Inter-key delay when typing character by character.
pub const KEYSTROKE_DELAY_MS: u64 = 50;

/// Where failure screenshots land.
pub const SCREENSHOT_DIR: &str = "test-results/screenshots";

const NAV_TIMEOUT: Duration = Duration::from_secs(30);
const INPUT_VISIBLE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TranslatorPage<'a> {
    driver: &'a PlaywrightDriver,
}

impl<'a> TranslatorPage<'a> {
    /// Navigate to the translator in a fresh browser context, wait for the
    /// input field, and clear any stale content. Replaces the driver's
    /// previous page.
    pub async fn open(driver: &'a PlaywrightDriver, base_url: &str) -> E2eResult<Self> {
        driver
            .open_page(base_url, INPUT_SELECTOR, NAV_TIMEOUT, INPUT_VISIBLE_TIMEOUT)
            .await?;
        driver.clear(INPUT_SELECTOR).await?;
        Ok(Self { driver })
    }

    /// Wrap the driver's current page without navigating. For diagnostics
    /// on a page some earlier step already opened.
    pub fn attach(driver: &'a PlaywrightDriver) -> Self {
        Self { driver }
    }

    /// Replace the input wholesale and wait for the rendered translation to
    /// settle. A lapsed settle deadline is tolerated here; the caller's
    /// string comparison is the real check.
    pub async fn clear_and_type(&self, text: &str) -> E2eResult<SettleOutcome> {
        self.driver.clear(INPUT_SELECTOR).await?;
        self.driver.fill(INPUT_SELECTOR, text).await?;
        self.settle_for(text).await
    }

    /// Type the input key by key like a live typist, then wait for the
    /// translation to settle.
    pub async fn type_char_by_char(&self, text: &str) -> E2eResult<SettleOutcome> {
        self.driver
            .press_sequentially(
                INPUT_SELECTOR,
                text,
                Duration::from_millis(KEYSTROKE_DELAY_MS),
            )
            .await?;
        self.settle_for(text).await
    }

    async fn settle_for(&self, input: &str) -> E2eResult<SettleOutcome> {
        let policy = ConvergencePolicy::for_input(input);
        wait_for_settled(&policy, |min_chars, timeout| {
            self.driver.wait_settled(OUTPUT_SELECTOR, min_chars, timeout)
        })
        .await
    }

    /// Current translation, trimmed.
    pub async fn read_output(&self) -> E2eResult<String> {
        let value = self.driver.input_value(OUTPUT_SELECTOR).await?;
        Ok(value.trim().to_string())
    }

    /// Check the translation for each expected fragment, returning the ones
    /// not found.
    pub async fn missing_fragments(&self, fragments: &[String]) -> E2eResult<Vec<String>> {
        let output = self.read_output().await?;
        Ok(fragments
            .iter()
            .filter(|fragment| !output.contains(fragment.as_str()))
            .cloned()
            .collect())
    }

    /// Whether both translator fields are still visible. Errors count as
    /// unresponsive.
    pub async fn is_responsive(&self) -> bool {
        let input = self
            .driver
            .is_visible(INPUT_SELECTOR)
            .await
            .unwrap_or(false);
        let output = self
            .driver
            .is_visible(OUTPUT_SELECTOR)
            .await
            .unwrap_or(false);
        input && output
    }

    /// Best-effort full-page screenshot for a failed case. Returns the
    /// written path, or None when capture itself fails.
    pub async fn capture_failure(&self, case_id: &str) -> Option<PathBuf> {
        let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ");
        let filename = format!("error-{}-{}.png", case_id, timestamp);

        let dir = PathBuf::from(SCREENSHOT_DIR);
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            warn!("could not create {}: {}", dir.display(), e);
            return None;
        }

        let path = dir.join(filename);
        match self.driver.screenshot(&path, true).await {
            Ok(()) => {
                info!("screenshot saved: {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("failed to capture screenshot: {}", e);
                None
            }
        }
    }
}
