use std::path::PathBuf;

use singlish_e2e::cases::CaseSet;
use singlish_e2e::convergence::contains_sinhala;
use singlish_e2e::driver::{DriverConfig, PlaywrightDriver};
use singlish_e2e::page::{TranslatorPage, DEFAULT_BASE_URL};

/// Launch a driver for a live scenario, or explain why the test is being
/// skipped. These tests drive the real site, so they are additionally
/// marked ignored; run with SWIFT_E2E=1 cargo test -- --ignored
async fn live_driver() -> Option<PlaywrightDriver> {
    if std::env::var("SWIFT_E2E").as_deref() != Ok("1") {
        eprintln!("Skipping: live scenarios disabled (set SWIFT_E2E=1 to run)");
        return None;
    }

    let config = DriverConfig::default();
    if !PlaywrightDriver::available(&config) {
        eprintln!("Skipping: Playwright driver unavailable (need node and the playwright package)");
        return None;
    }

    Some(
        PlaywrightDriver::launch(config)
            .await
            .expect("launch playwright driver"),
    )
}

/// Repeat Input Idempotence Test
///
/// Types the same sentence twice on one page and asserts both settled
/// outputs are identical: no state leaks between invocations on a single
/// page instance.
#[tokio::test]
#[ignore]
async fn repeated_input_produces_identical_output() {
    let driver = match live_driver().await {
        Some(d) => d,
        None => return,
    };

    let page = TranslatorPage::open(&driver, DEFAULT_BASE_URL)
        .await
        .expect("open translator page");

    let input = "mama gedhara yanavaa.";

    page.clear_and_type(input).await.expect("first type");
    let first = page.read_output().await.expect("read first output");

    page.clear_and_type(input).await.expect("second type");
    let second = page.read_output().await.expect("read second output");

    assert_eq!(
        first, second,
        "same input twice must settle to the same output"
    );
    assert_eq!(first, "මම ගෙදර යනවා.");

    driver.close().await.expect("close driver");
}

/// Real-time Conversion Test
///
/// Types key by key like a live user and asserts the settled output
/// contains each converted word.
#[tokio::test]
#[ignore]
async fn typed_input_converts_as_the_user_types() {
    let driver = match live_driver().await {
        Some(d) => d,
        None => return,
    };

    let page = TranslatorPage::open(&driver, DEFAULT_BASE_URL)
        .await
        .expect("open translator page");

    page.type_char_by_char("mama gedhara yanavaa")
        .await
        .expect("type input");

    let output = page.read_output().await.expect("read output");
    for word in ["මම", "ගෙදර", "යනවා"] {
        assert!(output.contains(word), "output {:?} missing {:?}", output, word);
    }

    driver.close().await.expect("close driver");
}

/// Long Input Responsiveness Test
///
/// Feeds the longest fixture paragraph and asserts both fields are still
/// visible and the output settled to Sinhala text afterwards.
#[tokio::test]
#[ignore]
async fn page_stays_responsive_after_long_input() {
    let driver = match live_driver().await {
        Some(d) => d,
        None => return,
    };

    let fixtures = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("cases")
        .join("positive.yaml");
    let set = CaseSet::from_file(&fixtures).expect("load positive fixtures");
    let case = set
        .cases
        .iter()
        .max_by_key(|c| c.input.chars().count())
        .expect("positive fixtures are not empty");

    let page = TranslatorPage::open(&driver, DEFAULT_BASE_URL)
        .await
        .expect("open translator page");

    page.clear_and_type(&case.input).await.expect("type input");

    assert!(page.is_responsive().await, "fields vanished after long input");

    let output = page.read_output().await.expect("read output");
    assert!(
        contains_sinhala(&output),
        "long input produced no Sinhala output: {:?}",
        output
    );

    driver.close().await.expect("close driver");
}
