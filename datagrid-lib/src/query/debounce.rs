//! Trailing-edge debounce timer.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Runs the most recently scheduled future once `delay` has elapsed without
/// another call to [`Debouncer::schedule`].
///
/// Each schedule gets a ticket. The fired future should call
/// [`Debouncer::fire`] with its ticket before acting; a ticket that no
/// longer matches means a newer schedule or a flush took over.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use datagrid_lib::query::Debouncer;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut debouncer = Debouncer::new(Duration::from_millis(300));
/// debouncer.schedule(|_ticket| async {});
/// assert!(debouncer.is_pending());
/// debouncer.cancel();
/// assert!(!debouncer.is_pending());
/// # }
/// ```
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    ticket: u64,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    /// Creates an idle debouncer.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ticket: 0,
            pending: None,
        }
    }

    /// The quiet period.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Restarts the timer; `task` runs after the quiet period unless
    /// rescheduled or cancelled first. Must be called inside a tokio runtime.
    pub fn schedule<F, Fut>(&mut self, task: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.ticket += 1;
        let ticket = self.ticket;
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task(ticket).await;
        }));
        ticket
    }

    /// Claims the pending slot for a fired timer. Returns `false` if `ticket`
    /// is no longer current.
    pub fn fire(&mut self, ticket: u64) -> bool {
        if ticket != self.ticket || self.pending.is_none() {
            return false;
        }
        // The handle belongs to the running task; dropping it detaches.
        self.pending = None;
        true
    }

    /// Stops the pending timer. Returns `true` if one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Whether a timer is waiting to fire.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
