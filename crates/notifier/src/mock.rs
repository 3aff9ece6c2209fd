//! In-process channel with scripted outcomes, for tests and dry runs.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{AutomationChannel, ChannelConnector};

/// A message the scripted channel was asked to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub contact: String,
    pub text: String,
    pub delivered: bool,
}

#[derive(Default)]
struct Journal {
    sent: Mutex<Vec<SentMessage>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
}

/// Connector whose channels follow a fixed script.
///
/// Clones share the same journal, so a test can keep one clone and hand
/// another to the dispatcher.
#[derive(Clone)]
pub struct ScriptedConnector {
    session_ok: bool,
    connect_error: Option<String>,
    failing_contacts: HashSet<String>,
    gate: Option<Arc<Notify>>,
    journal: Arc<Journal>,
}

impl ScriptedConnector {
    /// Session opens and every send succeeds.
    pub fn new() -> Self {
        Self {
            session_ok: true,
            connect_error: None,
            failing_contacts: HashSet::new(),
            gate: None,
            journal: Arc::new(Journal::default()),
        }
    }

    pub fn with_session(mut self, ok: bool) -> Self {
        self.session_ok = ok;
        self
    }

    /// Make `connect` fail, as if the browser could not be started.
    pub fn with_connect_error(mut self, message: impl Into<String>) -> Self {
        self.connect_error = Some(message.into());
        self
    }

    /// Sends to this contact report failure.
    pub fn failing_for(mut self, contact: impl Into<String>) -> Self {
        self.failing_contacts.insert(contact.into());
        self
    }

    /// Block `connect` until the gate is notified.
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.journal
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn connect_count(&self) -> usize {
        self.journal.connects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.journal.closes.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelConnector for ScriptedConnector {
    async fn connect(&self) -> anyhow::Result<Box<dyn AutomationChannel>> {
        self.journal.connects.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(message) = &self.connect_error {
            anyhow::bail!("{}", message);
        }

        Ok(Box::new(ScriptedChannel {
            session_ok: self.session_ok,
            failing_contacts: self.failing_contacts.clone(),
            journal: Arc::clone(&self.journal),
        }))
    }
}

struct ScriptedChannel {
    session_ok: bool,
    failing_contacts: HashSet<String>,
    journal: Arc<Journal>,
}

#[async_trait]
impl AutomationChannel for ScriptedChannel {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn open_session(&mut self, _timeout: Duration) -> bool {
        self.session_ok
    }

    async fn send_one(&mut self, contact: &str, text: &str) -> bool {
        let delivered = !self.failing_contacts.contains(contact);
        self.journal
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentMessage {
                contact: contact.to_string(),
                text: text.to_string(),
                delivered,
            });
        delivered
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.journal.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_journal_is_shared_between_clones() {
        let connector = ScriptedConnector::new().failing_for("+2");
        let probe = connector.clone();

        let mut channel = connector.connect().await.unwrap();
        assert!(channel.open_session(Duration::from_secs(1)).await);
        assert!(channel.send_one("+1", "hello").await);
        assert!(!channel.send_one("+2", "hello").await);
        channel.close().await.unwrap();

        assert_eq!(probe.connect_count(), 1);
        assert_eq!(probe.close_count(), 1);
        let sent = probe.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].delivered);
        assert!(!sent[1].delivered);
    }

    #[tokio::test]
    async fn test_connect_error() {
        let connector = ScriptedConnector::new().with_connect_error("chromedriver not found");
        let err = connector.connect().await.err().unwrap();
        assert_eq!(err.to_string(), "chromedriver not found");
    }
}
