//! Cancellable, epoch-tagged timer primitive.
//!
//! A timer is armed under a specific epoch value. When it fires it re-checks
//! the epoch before running its callback; if the epoch has moved on, the
//! callback never runs. `cancel` additionally aborts the underlying task.
//! Both mechanisms exist independently: `cancel`'s effect is only guaranteed
//! by the time it *returns*, not instantaneously relative to a callback that
//! already passed its epoch check, so the epoch check remains the sole thing
//! the contract depends on for correctness.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Shared turn epoch counter. Timers compare their armed-under value against
/// the live value at fire-time.
pub type Epoch = Arc<AtomicU64>;

/// A handle to an armed timer. Dropping it leaves the timer running; call
/// `cancel` to abort it explicitly.
pub struct TimerHandle {
    join: JoinHandle<()>,
}

impl TimerHandle {
    /// Aborts the underlying task. Idempotent: cancelling an already-fired or
    /// already-cancelled timer is a no-op.
    pub fn cancel(&self) {
        self.join.abort();
    }

    /// Wraps an already-spawned task so its lifetime can be tracked alongside
    /// timers created through `arm`/`arm_polling`. Used for watchers whose
    /// deadline is computed dynamically (e.g. awaiting an event before
    /// sleeping a remaining duration) rather than fixed at arm-time.
    pub(crate) fn from_join(join: JoinHandle<()>) -> Self {
        Self { join }
    }
}

/// Schedules `callback` to run after `duration`, gated on `epoch` still
/// equalling `armed_under` at fire-time.
pub fn arm<F, Fut>(epoch: Epoch, armed_under: u64, duration: Duration, callback: F) -> TimerHandle
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let join = tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        if epoch.load(Ordering::SeqCst) != armed_under {
            return;
        }
        callback().await;
    });
    TimerHandle { join }
}

/// Polls `poll` every `period`, gated on the epoch at each iteration, until
/// `poll` returns `true` or the epoch advances. Used by the end-of-speech
/// watcher, which checks elapsed-since-last-speech rather than a single fixed
/// deadline.
pub fn arm_polling<F, Fut>(
    epoch: Epoch,
    armed_under: u64,
    period: Duration,
    mut poll: F,
) -> TimerHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    let join = tokio::spawn(async move {
        loop {
            tokio::time::sleep(period).await;
            if epoch.load(Ordering::SeqCst) != armed_under {
                return;
            }
            if poll().await {
                return;
            }
        }
    });
    TimerHandle { join }
}
