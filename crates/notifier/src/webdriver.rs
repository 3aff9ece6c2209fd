//! Browser automation over the W3C WebDriver HTTP protocol.
//!
//! Talks to a driver process such as `chromedriver`. The browser keeps its
//! profile on disk so a messaging-web login survives between runs.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::time::Instant;

use herald_common::config::AppConfig;

use crate::candidate::{ActionSurface, CandidatePolicy, Locator, run_candidates};
use crate::{AutomationChannel, ChannelConnector};

/// Key under which W3C drivers return element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a5c6-4a5a5b5a5b5a";

/// Errors from the WebDriver endpoint.
#[derive(Debug, Error)]
pub enum WebDriverError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebDriver {error}: {message}")]
    Command { error: String, message: String },

    #[error("Malformed WebDriver response: {0}")]
    Protocol(String),
}

impl WebDriverError {
    fn is_no_such_element(&self) -> bool {
        matches!(self, WebDriverError::Command { error, .. } if error == "no such element")
    }
}

/// Everything needed to start and drive a browser session.
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    pub webdriver_url: String,
    pub base_url: String,
    pub profile_dir: PathBuf,
    /// Element whose presence means the messaging session is logged in.
    pub session_probe: Locator,
    pub probe_interval: Duration,
    /// Equivalent send controls, tried in order.
    pub send_candidates: Vec<Locator>,
    pub policy: CandidatePolicy,
}

impl WebDriverConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            webdriver_url: config.webdriver_url.clone(),
            base_url: config.messaging_base_url.clone(),
            profile_dir: config.browser_profile_dir.clone(),
            session_probe: Locator::css("#pane-side"),
            probe_interval: Duration::from_millis(500),
            send_candidates: default_send_candidates(),
            policy: CandidatePolicy {
                per_candidate_timeout: Duration::from_secs(config.candidate_timeout_secs),
                poll_interval: Duration::from_millis(500),
                settle_delay: Duration::from_millis(config.candidate_settle_ms),
            },
        }
    }
}

/// Send-button locators for the messaging web surface, most specific first.
pub fn default_send_candidates() -> Vec<Locator> {
    vec![
        Locator::xpath(r#"//*[@id="main"]/footer/div[1]/div/span/div/div[2]/div/div[4]/button"#),
        Locator::xpath(r#"//span[@data-testid="send"]"#),
    ]
}

/// Build the deep link that opens a chat with `text` pre-filled.
pub fn send_url(base_url: &str, contact: &str, text: &str) -> Result<Url, WebDriverError> {
    let endpoint = format!("{}/send", base_url.trim_end_matches('/'));
    Url::parse_with_params(&endpoint, &[("phone", contact), ("text", text)])
        .map_err(|e| WebDriverError::Protocol(format!("invalid send URL: {}", e)))
}

/// Pull the element reference out of a find-element response value.
fn element_id(value: &Value) -> Result<String, WebDriverError> {
    value
        .get(ELEMENT_KEY)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| WebDriverError::Protocol(format!("no element reference in {}", value)))
}

// ============================================================
// Protocol client
// ============================================================

/// Minimal W3C WebDriver client bound to one session.
#[derive(Debug, Clone)]
struct WebDriverClient {
    http: reqwest::Client,
    endpoint: String,
    session_id: String,
}

impl WebDriverClient {
    async fn new_session(
        http: reqwest::Client,
        endpoint: &str,
        profile_dir: &std::path::Path,
    ) -> Result<Self, WebDriverError> {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": [
                            "--disable-extensions",
                            "--no-sandbox",
                            "--disable-dev-shm-usage",
                            format!("--user-data-dir={}", profile_dir.display()),
                        ]
                    }
                }
            }
        });

        let value = send_command(
            &http,
            Method::POST,
            &format!("{}/session", endpoint),
            Some(capabilities),
        )
        .await?;
        let session_id = value
            .get("sessionId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| WebDriverError::Protocol("new session returned no sessionId".into()))?
            .to_string();

        Ok(Self {
            http,
            endpoint,
            session_id,
        })
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, WebDriverError> {
        let url = format!("{}/session/{}{}", self.endpoint, self.session_id, path);
        send_command(&self.http, method, &url, body).await
    }

    async fn navigate(&self, url: &str) -> Result<(), WebDriverError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    /// Find an element; `Ok(None)` when the driver reports it does not exist.
    async fn find(&self, locator: &Locator) -> Result<Option<String>, WebDriverError> {
        let body = json!({ "using": locator.strategy(), "value": locator.value() });
        match self.command(Method::POST, "/element", Some(body)).await {
            Ok(value) => element_id(&value).map(Some),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn element_flag(&self, element: &str, flag: &str) -> Result<bool, WebDriverError> {
        let value = self
            .command(Method::GET, &format!("/element/{}/{}", element, flag), None)
            .await?;
        value
            .as_bool()
            .ok_or_else(|| WebDriverError::Protocol(format!("{} returned {}", flag, value)))
    }

    async fn click(&self, element: &str) -> Result<(), WebDriverError> {
        self.command(
            Method::POST,
            &format!("/element/{}/click", element),
            Some(json!({})),
        )
        .await
        .map(|_| ())
    }

    async fn delete_session(&self) -> Result<(), WebDriverError> {
        self.command(Method::DELETE, "", None).await.map(|_| ())
    }
}

async fn send_command(
    http: &reqwest::Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> Result<Value, WebDriverError> {
    let mut request = http.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await?;
    let status = response.status();
    let mut payload: Value = response.json().await?;
    let value = payload
        .get_mut("value")
        .map(Value::take)
        .ok_or_else(|| WebDriverError::Protocol(format!("missing value (HTTP {})", status)))?;

    if status.is_success() {
        return Ok(value);
    }

    let error = value
        .get("error")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown error")
        .to_string();
    let message = value
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    Err(WebDriverError::Command { error, message })
}

// ============================================================
// Channel
// ============================================================

/// Opens a browser session per dispatch run.
pub struct WebDriverConnector {
    config: WebDriverConfig,
    http: reqwest::Client,
}

impl WebDriverConnector {
    pub fn new(config: WebDriverConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ChannelConnector for WebDriverConnector {
    async fn connect(&self) -> anyhow::Result<Box<dyn AutomationChannel>> {
        tokio::fs::create_dir_all(&self.config.profile_dir).await?;

        let client = WebDriverClient::new_session(
            self.http.clone(),
            &self.config.webdriver_url,
            &self.config.profile_dir,
        )
        .await?;
        if let Err(e) = client.navigate(&self.config.base_url).await {
            // Release the browser so the profile directory is not left locked
            if let Err(close_err) = client.delete_session().await {
                tracing::warn!(
                    session_id = %client.session_id,
                    error = %close_err,
                    "Failed to delete WebDriver session"
                );
            }
            return Err(e.into());
        }

        tracing::info!(
            session_id = %client.session_id,
            base_url = %self.config.base_url,
            "WebDriver session started"
        );

        Ok(Box::new(WebDriverChannel {
            client,
            config: self.config.clone(),
        }))
    }
}

/// One browser session on the messaging web surface.
pub struct WebDriverChannel {
    client: WebDriverClient,
    config: WebDriverConfig,
}

#[async_trait]
impl ActionSurface for WebDriverChannel {
    type Target = String;

    async fn locate_actionable(&mut self, locator: &Locator) -> anyhow::Result<Option<String>> {
        let Some(element) = self.client.find(locator).await? else {
            return Ok(None);
        };
        let actionable = self.client.element_flag(&element, "displayed").await?
            && self.client.element_flag(&element, "enabled").await?;
        Ok(actionable.then_some(element))
    }

    async fn trigger(&mut self, target: String) -> anyhow::Result<()> {
        self.client.click(&target).await?;
        Ok(())
    }
}

#[async_trait]
impl AutomationChannel for WebDriverChannel {
    fn name(&self) -> &'static str {
        "webdriver"
    }

    async fn open_session(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.client.find(&self.config.session_probe).await {
                Ok(Some(_)) => return true,
                Ok(None) => {}
                Err(e) => tracing::debug!(error = %e, "Session probe failed"),
            }
            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(timeout_secs = timeout.as_secs(), "No active messaging session");
                return false;
            }
            tokio::time::sleep(self.config.probe_interval.min(deadline - now)).await;
        }
    }

    async fn send_one(&mut self, contact: &str, text: &str) -> bool {
        let url = match send_url(&self.config.base_url, contact, text) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(contact, error = %e, "Could not build send URL");
                return false;
            }
        };
        if let Err(e) = self.client.navigate(url.as_str()).await {
            tracing::warn!(contact, error = %e, "Failed to open chat");
            return false;
        }

        let candidates = self.config.send_candidates.clone();
        let policy = self.config.policy;
        run_candidates(self, &candidates, &policy).await.is_some()
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.client.delete_session().await?;
        tracing::info!(session_id = %self.client.session_id, "WebDriver session closed");
        Ok(())
    }
}
