//! Trailing-edge debounce for search input.

use std::time::Duration;

use tokio::sync::mpsc;

/// Quiet period before a search term is sent to the API.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Sending half, handed to whatever produces keystrokes.
#[derive(Debug, Clone)]
pub struct DebounceInput<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> DebounceInput<T> {
    /// Returns `false` once the [`Debouncer`] has been dropped.
    pub fn push(&self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }
}

#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    rx: mpsc::UnboundedReceiver<T>,
}

pub fn debounce<T>(delay: Duration) -> (DebounceInput<T>, Debouncer<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (DebounceInput { tx }, Debouncer { delay, rx })
}

impl<T> Debouncer<T> {
    /// Wait for the next burst of input and return its last value once no
    /// new value has arrived for the configured delay. Returns `None` when
    /// every input handle is gone and nothing is pending.
    pub async fn settled(&mut self) -> Option<T> {
        let mut latest = self.rx.recv().await?;
        loop {
            match tokio::time::timeout(self.delay, self.rx.recv()).await {
                Ok(Some(value)) => latest = value,
                Ok(None) | Err(_) => return Some(latest),
            }
        }
    }
}
