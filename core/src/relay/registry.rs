use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

pub type SessionId = Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Connected viewers, each represented by the sending half of its outbound
/// queue. The socket writer task owns the receiving half.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, mpsc::Sender<String>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, buffer: usize) -> (SessionId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let id = Uuid::new_v4();
        self.sessions.write().await.insert(id, tx);
        tracing::debug!(session = %id, "viewer registered");
        (id, rx)
    }

    /// Remove a session. Unknown ids are ignored.
    pub async fn unregister(&self, id: &SessionId) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::debug!(session = %id, "viewer unregistered");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Forward `text` to every session present when the call starts.
    ///
    /// Sessions that are closed or whose queue is full are removed; the rest
    /// are unaffected. Registrations racing with the broadcast miss this
    /// message and receive the next one.
    pub async fn broadcast(&self, text: &str) -> BroadcastReport {
        let snapshot: Vec<(SessionId, mpsc::Sender<String>)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();
        for (id, tx) in snapshot {
            match tx.try_send(text.to_string()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::debug!(session = %id, error = %e, "dropping viewer");
                    failed.push(id);
                }
            }
        }

        if !failed.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in &failed {
                sessions.remove(id);
            }
            report.dropped = failed.len();
        }
        report
    }
}
