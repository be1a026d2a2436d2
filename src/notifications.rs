//! One-shot user-visible messages ("toasts").

use std::fmt;

use tokio::sync::broadcast;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            Level::Success => write!(f, "✔ {}", self.message),
            Level::Error => write!(f, "✖ {}", self.message),
        }
    }
}

/// Fan-out sender for notifications. Messages sent while nobody listens are
/// dropped.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(Level::Error, message.into());
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(Level::Success, message.into());
    }

    fn notify(&self, level: Level, message: String) {
        if self.sender.send(Notification { level, message }).is_err() {
            trace!("Notification dropped, no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_notifications() {
        let notifier = Notifier::new(4);
        notifier.error("nobody hears this");

        let mut rx = notifier.subscribe();
        notifier.error("Error updating user!");
        let notification = rx.recv().await.unwrap();
        assert_eq!(notification.level, Level::Error);
        assert_eq!(notification.to_string(), "✖ Error updating user!");
    }
}
