//! In-process wake timers on the tokio runtime.
//!
//! Each request becomes a spawned task that sleeps until the wake instant and
//! then hands the payload back over a channel. Whoever owns the receiver feeds
//! it into [`AlertScheduler::on_timer`](super::AlertScheduler::on_timer).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Local;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{AlertPayload, TimerId, WakeTimer};
use crate::error::TimerError;

pub struct TokioTimers {
    handle: Handle,
    tx: mpsc::UnboundedSender<AlertPayload>,
    pending: Mutex<HashMap<TimerId, JoinHandle<()>>>,
    exact_allowed: bool,
}

impl TokioTimers {
    /// Timers bound to the current runtime, plus the receiving end of their
    /// deliveries.
    ///
    /// # Errors
    /// Returns [`TimerError::Unavailable`] outside a tokio runtime.
    pub fn channel() -> Result<(Self, mpsc::UnboundedReceiver<AlertPayload>), TimerError> {
        let handle = Handle::try_current().map_err(|e| TimerError::Unavailable(e.to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        Ok((
            Self {
                handle,
                tx,
                pending: Mutex::new(HashMap::new()),
                exact_allowed: true,
            },
            rx,
        ))
    }

    /// Refuse exact requests, as a host without the exact-alarm grant would.
    pub fn deny_exact(mut self) -> Self {
        self.exact_allowed = false;
        self
    }

    /// Number of timers that have not yet been delivered or cancelled.
    pub fn pending(&self) -> usize {
        let mut pending = self.lock();
        pending.retain(|_, task| !task.is_finished());
        pending.len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TimerId, JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn spawn(&self, payload: &AlertPayload) {
        let delay = (payload.wake_at - Local::now().naive_local())
            .to_std()
            .unwrap_or_default();
        let tx = self.tx.clone();
        let delivered = payload.clone();
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(delivered).is_err() {
                tracing::debug!("timer receiver dropped before delivery");
            }
        });

        let mut pending = self.lock();
        pending.retain(|_, task| !task.is_finished());
        if let Some(previous) = pending.insert(payload.timer_id, task) {
            previous.abort();
        }
        tracing::debug!(timer_id = %payload.timer_id, ?delay, "timer task spawned");
    }
}

impl WakeTimer for TokioTimers {
    fn schedule_exact(&self, payload: &AlertPayload) -> Result<(), TimerError> {
        if !self.exact_allowed {
            return Err(TimerError::ExactDenied);
        }
        self.spawn(payload);
        Ok(())
    }

    fn schedule_inexact(&self, payload: &AlertPayload) -> Result<(), TimerError> {
        self.spawn(payload);
        Ok(())
    }

    fn cancel(&self, id: TimerId) {
        if let Some(task) = self.lock().remove(&id) {
            task.abort();
        }
    }

    fn is_pending(&self, id: TimerId) -> bool {
        self.lock().get(&id).is_some_and(|task| !task.is_finished())
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        for (_, task) in self.lock().drain() {
            task.abort();
        }
    }
}
