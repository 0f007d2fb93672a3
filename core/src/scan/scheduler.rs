/// Scan scheduler
///
/// Runs one scan cycle: clear the discovered peripherals, fire `iterations`
/// bursts each preceded by an interval wait, then apply the omoiyari
/// cooldown. The scanning flag in the state store is the only guard against
/// overlapping cycles; every continuation re-checks the cycle generation so a
/// cycle torn down by the façade never touches the transport again.

use crate::error::BlueveryError;
use crate::options::ScanOptions;
use crate::scan::omoiyari::Omoiyari;
use crate::state::BlueveryState;
use crate::transport::BlueveryCore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Releases the scanning flag of one cycle when dropped, whatever the exit
/// path (including the caller dropping the cycle future).
struct CycleGuard {
    state: BlueveryState,
    generation: u64,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.state.finish_cycle(self.generation);
    }
}

/// Drives scan cycles against a transport
#[derive(Clone)]
pub struct ScanScheduler {
    core: Arc<dyn BlueveryCore>,
    omoiyari: Arc<dyn Omoiyari>,
    state: BlueveryState,
    consideration: Duration,
}

impl ScanScheduler {
    pub fn new(
        core: Arc<dyn BlueveryCore>,
        omoiyari: Arc<dyn Omoiyari>,
        state: BlueveryState,
        consideration: Duration,
    ) -> Self {
        Self {
            core,
            omoiyari,
            state,
            consideration,
        }
    }

    pub fn consideration(&self) -> Duration {
        self.consideration
    }

    /// Run a full cycle: clear, `iterations` bursts, cooldown.
    ///
    /// Fails fast with [`BlueveryError::AlreadyScanning`] when another cycle
    /// holds the scanning flag; the running cycle is left untouched.
    pub async fn run_scan_cycle(&self, options: &ScanOptions) -> Result<(), BlueveryError> {
        options.validate()?;

        let generation = match self.state.begin_cycle() {
            Some(generation) => generation,
            None => {
                warn!("Scan requested while a cycle is in progress");
                return Err(BlueveryError::AlreadyScanning);
            }
        };
        let _guard = CycleGuard {
            state: self.state.clone(),
            generation,
        };

        info!(
            "Scan cycle {} started: {} burst(s) every {}ms",
            generation, options.iterations, options.interval_length
        );

        self.core.clear_scanned_peripherals();
        self.state.clear_discovered_peripherals();

        let mut completed_bursts = 0u32;
        let mut burst_failure = None;

        for iteration in 1..=options.iterations {
            wait_interval(options.interval()).await;
            if !self.state.is_current_cycle(generation) {
                debug!("Scan cycle {} aborted before burst {}", generation, iteration);
                return Err(BlueveryError::ScanAborted { completed_bursts });
            }

            debug!("Burst {}/{}", iteration, options.iterations);
            if let Err(e) = self.core.scan(&options.scanning_settings).await {
                warn!("Burst {}/{} failed: {}", iteration, options.iterations, e);
                burst_failure = Some(e);
                break;
            }
            completed_bursts += 1;

            if !self.state.is_current_cycle(generation) {
                debug!("Scan cycle {} aborted after burst {}", generation, iteration);
                return Err(BlueveryError::ScanAborted { completed_bursts });
            }
        }

        // A failed burst skips the post-burst check above
        if !self.state.is_current_cycle(generation) {
            debug!("Scan cycle {} aborted before cooldown", generation);
            return Err(BlueveryError::ScanAborted { completed_bursts });
        }

        // Cooldown runs after a failed burst too
        let cooldown = self.omoiyari.apply(self.consideration).await;
        if !self.state.is_current_cycle(generation) {
            debug!("Scan cycle {} aborted during cooldown", generation);
            return Err(BlueveryError::ScanAborted { completed_bursts });
        }

        let result = match (cooldown, burst_failure) {
            (Err(source), burst_failure) => {
                if let Some(e) = burst_failure {
                    warn!("Burst failure superseded by cooldown failure: {}", e);
                }
                warn!("Cooldown failed: {}", source);
                Err(BlueveryError::CooldownFailed {
                    completed_bursts,
                    source,
                })
            }
            (Ok(()), Some(source)) => Err(BlueveryError::ScanBurstFailed {
                completed_bursts,
                source,
            }),
            (Ok(()), None) => Ok(()),
        };

        info!(
            "Scan cycle {} finished after {} burst(s)",
            generation, completed_bursts
        );
        result
    }
}

/// A zero interval still suspends once so the first burst never runs inside
/// the caller's poll.
async fn wait_interval(interval: Duration) {
    if interval.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(interval).await;
    }
}
