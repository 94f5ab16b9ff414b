// Debouncer
//
// Cancel-and-reschedule timer: every call pushes the deadline out by the
// quiet window, and the action runs once when the window elapses with no
// further calls.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::trace;

pub struct Debouncer {
    notify: Arc<Notify>,
    task: JoinHandle<()>,
}

impl Debouncer {
    /// Start the timer task. Must be called inside a tokio runtime.
    pub fn spawn<F>(window: Duration, mut action: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let notify = Arc::new(Notify::new());
        let signal = Arc::clone(&notify);

        let task = tokio::spawn(async move {
            loop {
                signal.notified().await;

                let deadline = sleep(window);
                tokio::pin!(deadline);
                loop {
                    tokio::select! {
                        _ = &mut deadline => {
                            trace!(target: "debounce", "Quiet window elapsed");
                            action();
                            break;
                        }
                        _ = signal.notified() => {
                            deadline.as_mut().reset(Instant::now() + window);
                        }
                    }
                }
            }
        });

        Self { notify, task }
    }

    /// Schedule the action, resetting any pending deadline
    pub fn call(&self) {
        self.notify.notify_one();
    }

    /// Drop any pending call and stop the timer task
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
