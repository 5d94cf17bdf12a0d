//! External collaborators: notifications and comptabilization submission
//!
//! Both are best-effort side effects of a committed transition. The workflow
//! service never rolls a transition back because one of them failed.

use async_trait::async_trait;
use dossier_types::{DossierId, UserId};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

/// Errors raised by a collaborator call
#[derive(Debug, Clone, thiserror::Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator error: {0}")]
    Failed(String),
}

// ── Notifications ────────────────────────────────────────────────────

/// A message addressed to one user
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub metadata: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(user_id: UserId, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id,
            title: title.into(),
            message: message.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }
}

/// Delivers user notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), CollaboratorError>;
}

/// Sink that drops every notification
#[derive(Debug, Default)]
pub struct NoopNotificationSink;

#[async_trait]
impl NotificationSink for NoopNotificationSink {
    async fn notify(&self, _notification: Notification) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// In-memory sink that keeps what it was sent
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every delivery fails
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Notifications delivered so far
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn notify(&self, notification: Notification) -> Result<(), CollaboratorError> {
        if self.fail {
            return Err(CollaboratorError::Unavailable(
                "notification service offline".into(),
            ));
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notification);
        Ok(())
    }
}

// ── Comptabilization submission ──────────────────────────────────────

/// Answer of the accounting system
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcResponse {
    Accepted,
    Rejected { reason: String },
}

/// Pushes an ordered dossier to the accounting system
#[async_trait]
pub trait AcSubmitter: Send + Sync {
    async fn submit(
        &self,
        dossier_id: &DossierId,
        comment: Option<&str>,
    ) -> Result<AcResponse, CollaboratorError>;
}

/// A call received by [`RecordingAcSubmitter`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcSubmission {
    pub dossier_id: DossierId,
    pub comment: Option<String>,
}

#[derive(Clone, Debug)]
enum Behavior {
    Respond(AcResponse),
    Fail(String),
}

/// Configurable in-process submitter, for tests and dry runs
#[derive(Debug)]
pub struct RecordingAcSubmitter {
    behavior: Mutex<Behavior>,
    delay: Option<Duration>,
    calls: Mutex<Vec<AcSubmission>>,
}

impl RecordingAcSubmitter {
    /// Accepts every submission
    pub fn accepting() -> Self {
        Self::with_behavior(Behavior::Respond(AcResponse::Accepted))
    }

    /// Rejects every submission with `reason`
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::Respond(AcResponse::Rejected {
            reason: reason.into(),
        }))
    }

    /// Fails every call with a transport error
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::Fail(message.into()))
    }

    /// Wait before answering, to exercise timeouts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Switch to accepting, e.g. once the remote side has recovered
    pub fn recover(&self) {
        *self
            .behavior
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) =
            Behavior::Respond(AcResponse::Accepted);
    }

    pub fn calls(&self) -> Vec<AcSubmission> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AcSubmitter for RecordingAcSubmitter {
    async fn submit(
        &self,
        dossier_id: &DossierId,
        comment: Option<&str>,
    ) -> Result<AcResponse, CollaboratorError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(AcSubmission {
                dossier_id: dossier_id.clone(),
                comment: comment.map(str::to_string),
            });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let behavior = self
            .behavior
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        match behavior {
            Behavior::Respond(response) => Ok(response),
            Behavior::Fail(message) => Err(CollaboratorError::Unavailable(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_submitter_logs_calls() {
        let submitter = RecordingAcSubmitter::rejecting("compte inconnu");
        let id = DossierId::new("d-1");
        let response = submitter.submit(&id, Some("urgent")).await.unwrap();
        assert_eq!(
            response,
            AcResponse::Rejected {
                reason: "compte inconnu".into()
            }
        );

        submitter.recover();
        assert_eq!(submitter.submit(&id, None).await.unwrap(), AcResponse::Accepted);

        let calls = submitter.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].comment.as_deref(), Some("urgent"));
    }

    #[tokio::test]
    async fn test_failing_sink() {
        let sink = RecordingNotificationSink::failing();
        let result = sink
            .notify(Notification::new(UserId::new("sec-1"), "t", "m"))
            .await;
        assert!(result.is_err());
        assert!(sink.sent().is_empty());
    }
}
