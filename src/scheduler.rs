use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Drives a job on a fixed cadence: once immediately, then at
/// `start + k * period`. Runs never overlap; slots that came due while the
/// job was still running are skipped.
pub struct Scheduler {
    period: Duration,
}

impl Scheduler {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    /// Runs `job` until `shutdown` resolves and returns how many runs
    /// happened. Shutdown is only observed between runs.
    pub async fn run<F, Fut, S>(&self, mut job: F, shutdown: S) -> u64
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let start = Instant::now();
        let period_nanos = self.period.as_nanos().max(1);
        let mut slot: u128 = 0;
        let mut runs = 0;

        loop {
            job().await;
            runs += 1;

            let elapsed = Instant::now().duration_since(start).as_nanos();
            let next_slot = elapsed / period_nanos + 1;
            let skipped = next_slot - slot - 1;
            if skipped > 0 {
                tracing::warn!(
                    skipped = skipped as u64,
                    "Run overran its period, skipping missed slots"
                );
            }
            slot = next_slot;

            let deadline = start + Duration::from_nanos((period_nanos * next_slot) as u64);
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Scheduler stopping after {} runs", runs);
                    break;
                }
                _ = sleep_until(deadline) => {}
            }
        }

        runs
    }
}
