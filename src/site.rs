//! Preflight reachability check for the live site

use std::time::Duration;

use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};
use crate::retry::{retry, RetryPolicy};

/// Budget for a single probe request.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Verify the site answers with a success status before spending browser
/// time on it. Probes are retried on the bounded-retry policy; exhaustion
/// maps to [`E2eError::SiteUnreachable`].
pub async fn check_reachable(url: &str, policy: &RetryPolicy) -> E2eResult<()> {
    let client = reqwest::Client::builder().timeout(PROBE_TIMEOUT).build()?;

    let probe = retry(policy, || async {
        client
            .get(url)
            .send()
            .await?
            .error_for_status()
            .map_err(E2eError::from)?;
        Ok::<(), E2eError>(())
    })
    .await;

    match probe {
        Ok(()) => {
            info!("site reachable: {}", url);
            Ok(())
        }
        Err(e) => {
            warn!("site probe exhausted retries: {}", e);
            Err(E2eError::SiteUnreachable {
                url: url.to_string(),
                attempts: policy.max_attempts,
            })
        }
    }
}
