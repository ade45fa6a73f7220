//! Retry timers.

use std::{fmt, time::Duration};

use tokio::{sync::mpsc, task::JoinHandle};

use crate::controller::ControlEvent;

/// Identifier of one scheduled retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub(crate) u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Schedules [`ControlEvent::TimerFired`] deliveries.
pub trait RetryScheduler: Send + 'static {
    type Timer: RetryTimer;

    /// Deliver `TimerFired { id }` after `delay`.
    fn schedule(&mut self, id: TimerId, delay: Duration) -> Self::Timer;
}

/// A pending retry timer.
pub trait RetryTimer: Send + 'static {
    /// Cancel the timer. Idempotent; cancelling a fired timer is a no-op.
    fn cancel(&mut self);
}

/// Scheduler backed by `tokio::time::sleep`.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<ControlEvent>,
}

impl TokioScheduler {
    pub fn new(tx: mpsc::UnboundedSender<ControlEvent>) -> Self {
        Self { tx }
    }
}

impl RetryScheduler for TokioScheduler {
    type Timer = TokioTimer;

    fn schedule(&mut self, id: TimerId, delay: Duration) -> TokioTimer {
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(ControlEvent::TimerFired { id });
        });
        TokioTimer { task: Some(task) }
    }
}

/// Handle to a sleep task; aborted on cancel or drop.
#[derive(Debug)]
pub struct TokioTimer {
    task: Option<JoinHandle<()>>,
}

impl RetryTimer for TokioTimer {
    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = TokioScheduler::new(tx);
        let _timer = scheduler.schedule(TimerId(1), Duration::from_secs(2));

        tokio::time::advance(Duration::from_millis(1999)).await;
        assert!(rx.try_recv().is_err());

        let event = rx.recv().await.expect("timer event");
        assert!(matches!(event, ControlEvent::TimerFired { id: TimerId(1) }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = TokioScheduler::new(tx);
        let mut timer = scheduler.schedule(TimerId(7), Duration::from_millis(10));
        timer.cancel();
        timer.cancel();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }
}
