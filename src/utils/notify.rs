use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use strum_macros::{Display, EnumString};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: u64,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: Instant,
}

/// Transient, dismissible notifications for the results of user actions.
/// Entries disappear when dismissed or once older than the display duration.
#[derive(Debug)]
pub struct NotificationCenter {
    next_id: AtomicU64,
    entries: Mutex<Vec<Notification>>,
    display_for: Duration,
}

impl NotificationCenter {
    pub fn new(display_for: Duration) -> Self {
        Self { next_id: AtomicU64::new(1), entries: Mutex::new(Vec::new()), display_for }
    }

    pub fn push(&self, kind: NotificationKind, message: impl Into<String>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.lock();
        let display_for = self.display_for;
        entries.retain(|n| n.created_at.elapsed() < display_for);
        entries.push(Notification { id, kind, message: message.into(), created_at: Instant::now() });
        id
    }

    /// Returns false if the notification was already gone.
    pub fn dismiss(&self, id: u64) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|n| n.id != id);
        entries.len() != before
    }

    /// Currently visible notifications, oldest first. Expired entries are pruned.
    pub fn active(&self) -> Vec<Notification> {
        let mut entries = self.entries.lock();
        let display_for = self.display_for;
        entries.retain(|n| n.created_at.elapsed() < display_for);
        entries.clone()
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

/// Run a user-triggered action. A failure is logged and surfaced as an error
/// notification instead of being propagated.
pub async fn run_user_action<T, E, F>(center: &NotificationCenter, label: &str, action: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match action.await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{} failed: {}", label, e);
            center.push(NotificationKind::Error, format!("{}: {}", label, e));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_dismiss() {
        let center = NotificationCenter::default();
        let first = center.push(NotificationKind::Info, "hello");
        let second = center.push(NotificationKind::Error, "boom");
        assert_eq!(center.active().len(), 2);

        assert!(center.dismiss(first));
        assert!(!center.dismiss(first));
        let active = center.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second);
        assert_eq!(active[0].kind.to_string(), "error");
    }

    #[test]
    fn test_expired_notifications_are_pruned() {
        let center = NotificationCenter::new(Duration::ZERO);
        center.push(NotificationKind::Success, "done");
        assert!(center.active().is_empty());
    }

    #[test]
    fn test_push_prunes_expired_entries() {
        let center = NotificationCenter::new(Duration::from_millis(20));
        for _ in 0..3 {
            center.push(NotificationKind::Info, "stale");
        }
        std::thread::sleep(Duration::from_millis(40));
        let id = center.push(NotificationKind::Info, "fresh");
        let entries = center.entries.lock();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, id);
    }

    #[tokio::test]
    async fn test_failed_action_becomes_notification() {
        let center = NotificationCenter::default();
        let out: Option<u8> = run_user_action(&center, "Swap", async { Err::<u8, _>("insufficient balance") }).await;
        assert!(out.is_none());
        let active = center.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].kind, NotificationKind::Error);
        assert_eq!(active[0].message, "Swap: insufficient balance");

        let ok = run_user_action(&center, "Swap", async { Ok::<_, String>(7u8) }).await;
        assert_eq!(ok, Some(7));
        assert_eq!(center.active().len(), 1);
    }
}
