use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::debug;

/// One-shot delayed task with at most one pending instance.
///
/// Arming replaces (and aborts) whatever was pending. Once the delay elapses
/// the job is spawned as its own task, so cancelling or re-arming afterwards
/// never interrupts a job that already started.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<AbortHandle>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Schedule `job` to run after the delay, cancelling any pending job.
    pub fn arm<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(job);
        });

        if let Some(previous) = self.pending.lock().replace(timer.abort_handle()) {
            if !previous.is_finished() {
                debug!("Debounce timer re-armed, previous pending job dropped");
            }
            previous.abort();
        }
    }

    /// Cancel the pending job. Returns true if one was still waiting.
    pub fn cancel(&self) -> bool {
        match self.pending.lock().take() {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.get_mut().take() {
            handle.abort();
        }
    }
}
