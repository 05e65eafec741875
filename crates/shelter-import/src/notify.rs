//! Notification boundary for user-facing summaries.

use log::info;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Summary pushed to a user after a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub recipient: i64,
    pub title: String,
    pub message: String,
    pub success_count: u32,
    pub failed_count: u32,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            "Notify user {}: {} - {}",
            notification.recipient, notification.title, notification.message
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_notifier_accepts() {
        let notification = Notification {
            recipient: 4,
            title: "Batch publish completed".to_string(),
            message: "2 animals updated, 0 failed".to_string(),
            success_count: 2,
            failed_count: 0,
        };
        assert!(LogNotifier.notify(&notification).is_ok());
        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["recipient"], 4);
        assert_eq!(json["success_count"], 2);
    }
}
