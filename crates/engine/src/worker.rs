//! Dispatch worker: the background notification run.
//!
//! One run walks the state machine:
//! 1. Load the recipient CSV
//! 2. Filter to recipients due on `today + lookahead`
//! 3. Load templates and open a channel session
//! 4. Render and send to each due recipient in order, recording every outcome
//!
//! A failed send is recorded and the run moves on. Only a missing session (or
//! an unexpected error) ends the run early.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use herald_common::config::{AppConfig, DEFAULT_LOOKAHEAD_DAYS};
use herald_common::error::AppError;
use herald_common::store::TemplateStore;
use herald_common::types::{
    DispatchStatus, MessageOutcome, MessageResult, RecipientRecord, RunPhase, TemplateSet,
};
use herald_notifier::{AutomationChannel, ChannelConnector};

use crate::filter::{Clock, SystemClock, due, reference_date};
use crate::loader::load_recipients;
use crate::render::render_for;
use crate::status::{STEP_SESSION_FAILED, StatusTracker, StatusWriter};
use crate::throttle::SendThrottle;

/// Tunables for a dispatch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Days between today and the hearing date that is due.
    pub lookahead_days: i64,
    /// How long to wait for the channel session.
    pub session_timeout: Duration,
}

impl DispatchSettings {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            lookahead_days: config.lookahead_days,
            session_timeout: Duration::from_secs(config.session_timeout_secs),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
            session_timeout: Duration::from_secs(30),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { sent: usize, failed: usize },
    SessionFailed,
    Failed(String),
}

/// Executes dispatch runs. Holds no per-run state.
pub struct DispatchWorker {
    templates: TemplateStore,
    connector: Arc<dyn ChannelConnector>,
    settings: DispatchSettings,
    throttle: SendThrottle,
    clock: Arc<dyn Clock>,
}

impl DispatchWorker {
    pub fn new(
        templates: TemplateStore,
        connector: Arc<dyn ChannelConnector>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            templates,
            connector,
            settings,
            throttle: SendThrottle::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_throttle(mut self, throttle: SendThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run the whole pipeline against `source`, reporting through `writer`.
    ///
    /// Never returns an error: every failure ends up in the status.
    pub async fn run(&self, source: PathBuf, writer: StatusWriter) -> RunOutcome {
        tracing::info!(source = %source.display(), "Dispatch run started");

        let result = self.execute(&source, &writer).await;
        match result {
            Ok(outcome) => {
                if let RunOutcome::Completed { sent, failed } = &outcome {
                    tracing::info!(sent, failed, "Dispatch run completed");
                }
                writer.complete();
                outcome
            }
            Err(e) if matches!(e.downcast_ref::<AppError>(), Some(AppError::Session(_))) => {
                tracing::warn!(error = %e, "Dispatch aborted");
                writer.fail(STEP_SESSION_FAILED);
                RunOutcome::SessionFailed
            }
            Err(e) => {
                let message = format!("{:#}", e);
                tracing::error!(error = %message, "Dispatch run failed");
                writer.fail(format!("Error: {}", message));
                RunOutcome::Failed(message)
            }
        }
    }

    async fn execute(
        &self,
        source: &std::path::Path,
        writer: &StatusWriter,
    ) -> anyhow::Result<RunOutcome> {
        writer.enter(RunPhase::LoadingData, "Loading CSV data...");
        let records = load_recipients(source).await?;

        writer.enter(RunPhase::Filtering, "Filtering clients...");
        let today = self.clock.today();
        let reference = reference_date(today, self.settings.lookahead_days).ok_or_else(|| {
            anyhow::anyhow!(
                "look-ahead of {} days from {} is out of range",
                self.settings.lookahead_days,
                today
            )
        })?;
        let recipients = due(&records, reference);
        writer.set_total(recipients.len());
        tracing::info!(
            rows = records.len(),
            due = recipients.len(),
            reference_date = %reference,
            "Recipients filtered"
        );

        let templates = self.templates.load_for_dispatch().await?;

        writer.enter(RunPhase::OpeningSession, "Initializing browser...");
        let mut channel = self.connector.connect().await?;
        let outcome = self
            .dispatch(channel.as_mut(), &recipients, &templates, writer)
            .await;

        if let Err(e) = channel.close().await {
            tracing::warn!(channel = channel.name(), error = %e, "Failed to close channel");
        }

        Ok(outcome?)
    }

    async fn dispatch(
        &self,
        channel: &mut dyn AutomationChannel,
        due: &[&RecipientRecord],
        templates: &TemplateSet,
        writer: &StatusWriter,
    ) -> Result<RunOutcome, AppError> {
        if !channel.open_session(self.settings.session_timeout).await {
            return Err(AppError::Session(format!(
                "no active messaging session within {}s",
                self.settings.session_timeout.as_secs()
            )));
        }

        writer.enter(RunPhase::Sending, "Sending messages...");

        let mut failed = 0;
        for (index, record) in due.iter().enumerate() {
            let message = render_for(templates, record);
            let delivered = channel.send_one(&record.contact, &message).await;

            let status = if delivered {
                MessageOutcome::Success
            } else {
                failed += 1;
                MessageOutcome::Failed
            };
            writer.record(
                index,
                MessageResult {
                    client: record.client.clone(),
                    contact: record.contact.clone(),
                    status,
                },
            );

            tracing::info!(
                client = %record.client,
                contact = %record.contact,
                status = %status,
                progress = index + 1,
                total = due.len(),
                "Message dispatched"
            );

            self.throttle.pause().await;
        }

        Ok(RunOutcome::Completed {
            sent: due.len() - failed,
            failed,
        })
    }
}

/// Single-flight front door to the worker.
///
/// `start` spawns at most one run at a time; the status stays readable
/// throughout through [`Dispatcher::status`].
pub struct Dispatcher {
    worker: Arc<DispatchWorker>,
    tracker: StatusTracker,
    current: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    pub fn new(worker: DispatchWorker) -> Self {
        Self {
            worker: Arc::new(worker),
            tracker: StatusTracker::new(),
            current: Mutex::new(None),
        }
    }

    pub fn status(&self) -> DispatchStatus {
        self.tracker.snapshot()
    }

    pub fn tracker(&self) -> &StatusTracker {
        &self.tracker
    }

    /// Start a run against `source` in the background.
    ///
    /// Fails with `Conflict` while another run is active. The caller is not
    /// told how the run ends; poll [`status`](Self::status) for that.
    pub fn start(&self, source: PathBuf) -> Result<(), AppError> {
        let writer = self
            .tracker
            .try_begin()
            .ok_or_else(|| AppError::Conflict("Messaging is already in progress".to_string()))?;

        let worker = Arc::clone(&self.worker);
        let run = tokio::spawn(async move { worker.run(source, writer).await });

        // Supervisor: surfaces panics that would otherwise vanish with the task
        let supervisor = tokio::spawn(async move {
            match run.await {
                Ok(outcome) => tracing::debug!(?outcome, "Dispatch task finished"),
                Err(e) if e.is_panic() => tracing::error!(error = %e, "Dispatch task panicked"),
                Err(e) => tracing::warn!(error = %e, "Dispatch task cancelled"),
            }
        });

        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(supervisor);
        drop(previous);

        Ok(())
    }

    /// Wait for the most recently started run (if any) to finish.
    pub async fn wait_idle(&self) {
        let handle = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
