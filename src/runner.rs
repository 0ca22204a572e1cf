//! Suite runner that orchestrates the driver, page harness, and fixtures

use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::cases::{CaseSet, Expectation, TranslationCase};
use crate::driver::{DriverConfig, PlaywrightDriver};
use crate::error::{E2eError, E2eResult};
use crate::page::{TranslatorPage, DEFAULT_BASE_URL};
use crate::retry::{retry, RetryPolicy};
use crate::site;

/// How a set's input is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypingMode {
    /// Clear then set the whole input at once
    #[default]
    Fill,
    /// Press keys one at a time
    CharByChar,
}

/// Result of running a single case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub id: String,
    pub passed: bool,
    /// Whether the output settled before the deadline. A case can pass
    /// after the fallback delay, and a mismatch can follow a clean settle;
    /// the two together say whether a failure is a wrong translation or a
    /// slow one.
    pub converged: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub screenshot: Option<String>,
}

/// Result of running all case sets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub started_at: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub outcomes: Vec<CaseOutcome>,
}

impl SuiteReport {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Configuration for the suite runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub driver: DriverConfig,
    pub base_url: String,
    pub cases_dir: PathBuf,
    pub output_dir: PathBuf,
    pub retry: RetryPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            driver: DriverConfig::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            cases_dir: PathBuf::from("cases"),
            output_dir: PathBuf::from("test-results"),
            retry: RetryPolicy::default(),
        }
    }
}

/// Runs case sets against the live site, one fresh page per case.
pub struct SuiteRunner {
    config: RunnerConfig,
}

impl SuiteRunner {
    /// Create a runner with default configuration
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    /// Create a runner with custom configuration
    pub fn with_config(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Run every case set in the cases directory
    pub async fn run_all(&self) -> E2eResult<SuiteReport> {
        let sets = CaseSet::load_all(&self.config.cases_dir)?;
        self.run_sets(&sets).await
    }

    /// Run case sets matching a tag
    pub async fn run_tagged(&self, tag: &str) -> E2eResult<SuiteReport> {
        let sets = CaseSet::load_all(&self.config.cases_dir)?;
        let filtered: Vec<CaseSet> = sets
            .into_iter()
            .filter(|s| s.tags.contains(&tag.to_string()))
            .collect();
        self.run_sets(&filtered).await
    }

    /// Run a list of case sets
    pub async fn run_sets(&self, sets: &[CaseSet]) -> E2eResult<SuiteReport> {
        let started_at = chrono::Utc::now().to_rfc3339();
        let start = Instant::now();

        site::check_reachable(&self.config.base_url, &self.config.retry).await?;
        let driver = PlaywrightDriver::launch(self.config.driver.clone()).await?;

        let total: usize = sets.iter().map(|s| s.cases.len()).sum();
        info!("Running {} case(s) against {}", total, self.config.base_url);

        let mut outcomes = Vec::new();
        let mut passed = 0;
        let mut failed = 0;

        for set in sets {
            info!("Set: {} ({} case(s))", set.name, set.cases.len());
            let mode = typing_mode(set);

            for case in &set.cases {
                let outcome = self.run_case(&driver, case, mode).await;
                if outcome.passed {
                    passed += 1;
                    info!("✓ {} ({} ms)", outcome.id, outcome.duration_ms);
                } else {
                    failed += 1;
                    error!(
                        "✗ {} - {}",
                        outcome.id,
                        outcome.error.as_deref().unwrap_or("unknown error")
                    );
                }
                outcomes.push(outcome);
            }
        }

        driver.close().await?;

        let duration_ms = start.elapsed().as_millis() as u64;
        info!("");
        info!(
            "Case results: {} passed, {} failed ({} ms)",
            passed, failed, duration_ms
        );

        Ok(SuiteReport {
            started_at,
            total,
            passed,
            failed,
            duration_ms,
            outcomes,
        })
    }

    /// Run one case on a fresh page. Harness errors fail the case, never
    /// the whole run.
    pub async fn run_case(
        &self,
        driver: &PlaywrightDriver,
        case: &TranslationCase,
        mode: TypingMode,
    ) -> CaseOutcome {
        let start = Instant::now();
        debug!("Running case: {}", case.id);

        let mut converged = false;
        let result = self.execute_case(driver, case, mode, &mut converged).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => CaseOutcome {
                id: case.id.clone(),
                passed: true,
                converged,
                duration_ms,
                error: None,
                screenshot: None,
            },
            Err(e) => {
                let screenshot = TranslatorPage::attach(driver)
                    .capture_failure(&case.id)
                    .await
                    .map(|p| p.to_string_lossy().to_string());

                CaseOutcome {
                    id: case.id.clone(),
                    passed: false,
                    converged,
                    duration_ms,
                    error: Some(e.to_string()),
                    screenshot,
                }
            }
        }
    }

    async fn execute_case(
        &self,
        driver: &PlaywrightDriver,
        case: &TranslationCase,
        mode: TypingMode,
        converged: &mut bool,
    ) -> E2eResult<()> {
        let page = retry(&self.config.retry, || {
            TranslatorPage::open(driver, &self.config.base_url)
        })
        .await?;

        let settle = match mode {
            TypingMode::Fill => page.clear_and_type(&case.input).await?,
            TypingMode::CharByChar => page.type_char_by_char(&case.input).await?,
        };
        *converged = settle.converged();

        match case.expectation() {
            Expectation::Exact(expected) => {
                let actual = page.read_output().await?;
                if actual != expected {
                    return Err(E2eError::TranslationMismatch {
                        case_id: case.id.clone(),
                        expected: expected.to_string(),
                        actual,
                    });
                }
            }
            Expectation::Contains(fragments) => {
                let missing = page.missing_fragments(fragments).await?;
                if !missing.is_empty() {
                    let actual = page.read_output().await?;
                    return Err(E2eError::MissingOutput {
                        case_id: case.id.clone(),
                        missing,
                        actual,
                    });
                }
            }
        }

        Ok(())
    }

    /// Write the report to JSON under the output directory
    pub fn write_report(&self, report: &SuiteReport) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("report.json");
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, json)?;

        info!("Report written to: {}", path.display());
        Ok(path)
    }
}

impl Default for SuiteRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Sets tagged `realtime` are typed key by key; everything else is filled
/// in one shot.
fn typing_mode(set: &CaseSet) -> TypingMode {
    if set.tags.iter().any(|t| t == "realtime") {
        TypingMode::CharByChar
    } else {
        TypingMode::Fill
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_with_tags(tags: &[&str]) -> CaseSet {
        CaseSet {
            name: "sample".to_string(),
            description: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            cases: vec![],
        }
    }

    #[test]
    fn realtime_tag_selects_char_by_char() {
        assert_eq!(
            typing_mode(&set_with_tags(&["realtime"])),
            TypingMode::CharByChar
        );
        assert_eq!(
            typing_mode(&set_with_tags(&["positive", "conversion"])),
            TypingMode::Fill
        );
        assert_eq!(typing_mode(&set_with_tags(&[])), TypingMode::Fill);
    }

    #[test]
    fn report_round_trips_through_json() {
        let report = SuiteReport {
            started_at: "2026-08-25T00:00:00Z".to_string(),
            total: 2,
            passed: 1,
            failed: 1,
            duration_ms: 1234,
            outcomes: vec![CaseOutcome {
                id: "Pos_Fun_0001".to_string(),
                passed: true,
                converged: true,
                duration_ms: 600,
                error: None,
                screenshot: None,
            }],
        };

        let json = serde_json::to_string(&report).unwrap();
        let back: SuiteReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total, 2);
        assert!(!back.all_passed());
        assert_eq!(back.outcomes[0].id, "Pos_Fun_0001");
    }
}
