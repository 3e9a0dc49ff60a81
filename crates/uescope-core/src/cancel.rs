use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// A cancellation token that supports interruptible waits.
///
/// Parsers check this between remote reads at chunk boundaries; the remote
/// reads themselves are short and never interrupted. Unlike `thread::sleep()`,
/// waits on this token wake immediately when cancellation is triggered.
pub struct CancelToken {
    cancelled: AtomicBool,
    condvar: Condvar,
    mutex: Mutex<()>,
}

impl CancelToken {
    /// Create a new token in the non-cancelled state.
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            condvar: Condvar::new(),
            mutex: Mutex::new(()),
        }
    }

    /// Trigger cancellation, waking all waiting threads.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.condvar.notify_all();
    }

    /// Check if cancellation has been triggered.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Reset the token so a new attach can reuse it.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Wait for the specified duration or until cancellation is triggered.
    ///
    /// Returns `true` if cancellation was triggered, `false` if the wait
    /// completed normally.
    pub fn wait(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }

        let guard = self.mutex.lock().unwrap();
        let result = self
            .condvar
            .wait_timeout_while(guard, duration, |_| !self.is_cancelled());

        match result {
            Ok((_, timeout_result)) => !timeout_result.timed_out(),
            Err(_) => true,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
