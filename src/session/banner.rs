use parking_lot::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::warn;

/// Single pending dismissal for the error banner
///
/// Restarting aborts the previous timer, so at most one is ever pending.
pub struct DismissTimer {
    window: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl DismissTimer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Mutex::new(None),
        }
    }

    /// Run `on_expire` once the window elapses from now, replacing any pending timer
    pub fn restart<F>(&self, on_expire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime available, error will not auto-dismiss");
            return;
        };

        let deadline = Instant::now() + self.window;
        *pending = Some(runtime.spawn(async move {
            sleep_until(deadline).await;
            on_expire();
        }));
    }

    pub fn cancel(&self) {
        if let Some(previous) = self.pending.lock().take() {
            previous.abort();
        }
    }
}

impl Drop for DismissTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_window() {
        let fired = Arc::new(AtomicUsize::new(0));
        let timer = DismissTimer::new(Duration::from_secs(7));

        let counter = fired.clone();
        timer.restart(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(6_900)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_pending_timer() {
        let fired = Arc::new(AtomicUsize::new(0));
        let timer = DismissTimer::new(Duration::from_secs(7));

        let first = fired.clone();
        timer.restart(move || {
            first.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_secs(5)).await;

        let second = fired.clone();
        timer.restart(move || {
            second.fetch_add(10, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let fired = Arc::new(AtomicUsize::new(0));
        let timer = DismissTimer::new(Duration::from_secs(1));

        let counter = fired.clone();
        timer.restart(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        timer.cancel();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
