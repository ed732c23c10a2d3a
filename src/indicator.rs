//! # Failure Indicator
//!
//! Terminal failure signaling for hardware bring-up errors.
//!
//! When the link, camera, or storage fails to initialize there is nothing
//! useful left to do: the process stays alive and pulses a failure signal,
//! the software equivalent of the payload's blinking status LED. Recoverable
//! protocol failures never end up here.

use std::time::Duration;
use tracing::error;

/// Interval between failure pulses
const SIGNAL_INTERVAL: Duration = Duration::from_millis(300);

/// Enter the permanent failure-signaling state. Never returns.
pub async fn signal_failure(reason: &str) -> ! {
    error!("Hardware bring-up failed: {}", reason);

    let mut pulse = tokio::time::interval(SIGNAL_INTERVAL);
    loop {
        pulse.tick().await;
        error!("FAILURE: {}", reason);
    }
}
