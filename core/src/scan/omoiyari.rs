/// Omoiyari: the post-scan consideration period
///
/// After a burst the radio stack needs time to settle before further radio
/// activity is safe. [`Cooldown`] models that as a two-stage deferral: a timed
/// wait (`Pending`), then one extra cooperative turn (`Settling`) before it
/// resolves. The extra turn separates "scan stopped" from "safe to start
/// again", so the cooldown always costs two scheduler turns.

use crate::error::CooldownError;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tokio::time::{sleep, Sleep};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

/// Stage of a [`Cooldown`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownStage {
    /// Waiting for the consideration timer
    Pending,
    /// Timer fired; one more turn before resolving
    Settling,
    Resolved,
}

/// Future resolving once the consideration period and the settle turn have
/// both passed. Each instance is independent and cannot be cancelled other
/// than by dropping it.
#[derive(Debug)]
pub struct Cooldown {
    stage: CooldownStage,
    timer: Pin<Box<Sleep>>,
}

impl Cooldown {
    /// Must be called from within a tokio runtime.
    pub fn new(duration: Duration) -> Self {
        Self {
            stage: CooldownStage::Pending,
            timer: Box::pin(sleep(duration)),
        }
    }

    pub fn stage(&self) -> CooldownStage {
        self.stage
    }
}

impl Future for Cooldown {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        match this.stage {
            CooldownStage::Pending => {
                ready!(this.timer.as_mut().poll(cx));
                this.stage = CooldownStage::Settling;
                debug!("Omoiyari timer elapsed, settling");
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            CooldownStage::Settling => {
                this.stage = CooldownStage::Resolved;
                debug!("Omoiyari resolved");
                Poll::Ready(())
            }
            CooldownStage::Resolved => Poll::Ready(()),
        }
    }
}

/// Wait out a consideration period of `duration`
pub async fn apply_omoiyari(duration: Duration) {
    Cooldown::new(duration).await
}

/// Cooldown step applied by the scan scheduler after the last burst
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Omoiyari: Send + Sync {
    async fn apply(&self, duration: Duration) -> Result<(), CooldownError>;
}

/// Timer-backed cooldown used by default
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerOmoiyari;

#[async_trait]
impl Omoiyari for TimerOmoiyari {
    async fn apply(&self, duration: Duration) -> Result<(), CooldownError> {
        apply_omoiyari(duration).await;
        Ok(())
    }
}
