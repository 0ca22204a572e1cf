//! Swift Translator E2E Suite
//!
//! Black-box UI tests for the live Singlish-to-Sinhala translator page.
//! The crate drives the page through Playwright from Rust:
//! - Runs a persistent Node driver speaking a JSON line protocol
//! - Loads declarative YAML translation fixtures
//! - Waits for asynchronously rendered output with a settle-or-fallback policy
//! - Compares rendered Sinhala against expected strings, capturing a
//!   screenshot when a case fails
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     SuiteRunner (Rust)                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  run_case(case)                                              │
//! │    ├── TranslatorPage::open()      fresh browser context     │
//! │    ├── clear_and_type(input)  or  type_char_by_char(input)   │
//! │    ├── wait_for_settled()     settle deadline, then fallback │
//! │    └── read_output() vs expected   the real check            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  PlaywrightDriver: JSON line protocol over stdio             │
//! │    node driver.js (chromium / firefox / webkit)              │
//! ├──────────────────────────────────────────────────────────────┤
//! │  CaseSet (YAML): id, input, expected | contains              │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod runner;
pub mod cases;
pub mod convergence;
pub mod retry;
pub mod page;
pub mod driver;
pub mod site;
pub mod error;

pub use cases::{CaseSet, TranslationCase};
pub use convergence::{ConvergencePolicy, SettleOutcome};
pub use driver::{DriverConfig, PlaywrightDriver};
pub use error::{E2eError, E2eResult};
pub use page::TranslatorPage;
pub use retry::RetryPolicy;
pub use runner::{RunnerConfig, SuiteReport, SuiteRunner};
