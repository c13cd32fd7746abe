//! Wait-for-state polling for the PNAP driver.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::info;

use crate::driver::MachineState;
use crate::pnap::error::PnapDriverError;
use crate::pnap::PnapDriver;

/// Interval between status polls.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_secs(10);

impl PnapDriver {
    /// Polls the provider until the machine reaches `target`.
    ///
    /// Each attempt fetches the canonical state (which also invalidates stale
    /// credentials); a fetch failure aborts immediately. With no configured
    /// deadline the loop is unbounded, mirroring the submit-then-converge
    /// contract of the remote API.
    pub(crate) async fn wait_for(&mut self, target: MachineState) -> Result<(), PnapDriverError> {
        let deadline = self.wait_deadline.map(|limit| Instant::now() + limit);

        loop {
            if let Some(limit) = deadline
                && Instant::now() > limit
            {
                return Err(PnapDriverError::Timeout { target });
            }

            match self.fetch_state().await {
                Ok(current) if current == target => {
                    info!("machine reached the {target} state");
                    return Ok(());
                }
                Ok(_) => info!("waiting for machine to reach the {target} state"),
                Err(source) => {
                    return Err(PnapDriverError::PollFetch {
                        source: Box::new(source),
                    });
                }
            }

            sleep(self.poll_interval).await;
        }
    }
}
