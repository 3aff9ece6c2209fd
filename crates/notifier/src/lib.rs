//! Automation channels used to deliver rendered messages.
//!
//! A [`ChannelConnector`] opens a fresh [`AutomationChannel`] per dispatch
//! run. Channels confirm only that a local send action fired, never that the
//! remote party received the message.

pub mod candidate;
pub mod mock;
pub mod webdriver;

use std::time::Duration;

use async_trait::async_trait;

pub use candidate::{ActionSurface, CandidatePolicy, Locator, run_candidates};
pub use mock::{ScriptedConnector, SentMessage};
pub use webdriver::{WebDriverConfig, WebDriverConnector};

/// A live connection to the messaging surface.
#[async_trait]
pub trait AutomationChannel: Send {
    /// Human-readable channel name for logging.
    fn name(&self) -> &'static str;

    /// Wait up to `timeout` for an active session. `false` when none is detected.
    async fn open_session(&mut self, timeout: Duration) -> bool;

    /// Attempt to send one message. `true` once a send action was triggered.
    async fn send_one(&mut self, contact: &str, text: &str) -> bool;

    /// Release the underlying session.
    async fn close(&mut self) -> anyhow::Result<()>;
}

/// Factory for channels, one per dispatch run.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(&self) -> anyhow::Result<Box<dyn AutomationChannel>>;
}
