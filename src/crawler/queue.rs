//! Cursor work queue shared by the workers of one query
//!
//! A worker claims a cursor with [`WorkQueue::next`] and must hand it back
//! with [`WorkQueue::complete`]. The queue is drained once nothing is pending
//! and nothing is claimed, at which point every waiting worker is released.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Option<String>>,
    in_flight: usize,
}

#[derive(Debug, Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl WorkQueue {
    /// Creates a queue holding the first-page cursor (`None`)
    pub fn seeded() -> Self {
        let queue = Self::default();
        queue.lock().pending.push_back(None);
        queue
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims the next cursor
    ///
    /// # Returns
    ///
    /// * `Some(cursor)` - Work to do; `None` inside means the first page
    /// * `None` - Queue drained or `cancel` fired
    pub async fn next(&self, cancel: &CancellationToken) -> Option<Option<String>> {
        loop {
            // Registered before the state check so a concurrent complete()
            // cannot slip between the check and the wait.
            let notified = self.notify.notified();

            {
                let mut state = self.lock();
                if cancel.is_cancelled() {
                    return None;
                }
                if let Some(cursor) = state.pending.pop_front() {
                    state.in_flight += 1;
                    return Some(cursor);
                }
                if state.in_flight == 0 {
                    return None;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = notified => {}
            }
        }
    }

    /// Returns a claimed cursor, queueing its successor if there is one
    pub fn complete(&self, next: Option<String>) {
        {
            let mut state = self.lock();
            if let Some(cursor) = next {
                state.pending.push_back(Some(cursor));
            }
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Cursors waiting to be claimed
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }
}
