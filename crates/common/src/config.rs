use std::path::PathBuf;
use std::str::FromStr;

/// Default look-ahead between "today" and the hearing date a reminder is sent for.
pub const DEFAULT_LOOKAHEAD_DAYS: i64 = 6;

/// Largest accepted look-ahead.
pub const MAX_LOOKAHEAD_DAYS: i64 = 3650;

/// Default pause after every send attempt.
pub const DEFAULT_SEND_INTERVAL_SECS: u64 = 5;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP control surface binds to
    pub bind_addr: String,

    /// Directory uploaded recipient files are stored in
    pub upload_dir: PathBuf,

    /// Directory holding the three message templates
    pub template_dir: PathBuf,

    /// JSON file holding operator settings
    pub settings_path: PathBuf,

    /// W3C WebDriver endpoint (e.g. a local chromedriver)
    pub webdriver_url: String,

    /// Base URL of the messaging web surface
    pub messaging_base_url: String,

    /// Directory the log file is written to
    pub log_dir: PathBuf,

    /// Browser profile directory, reused across runs to keep the login session
    pub browser_profile_dir: PathBuf,

    /// Days added to today's date to pick the hearing date that is due (default: 6)
    pub lookahead_days: i64,

    /// Pause after every send attempt in seconds (default: 5)
    pub send_interval_secs: u64,

    /// How long to wait for an active messaging session in seconds (default: 30)
    pub session_timeout_secs: u64,

    /// How long each send-control candidate may take to become actionable (default: 10)
    pub candidate_timeout_secs: u64,

    /// Pause between a candidate becoming actionable and triggering it (default: 2000)
    pub candidate_settle_ms: u64,

    /// Largest accepted upload body in bytes (default: 10 MiB)
    pub max_upload_bytes: usize,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let data_dir = PathBuf::from(var("DATA_DIR").unwrap_or_else(|| ".".to_string()));
        let path_or = |key: &str, default: &str| {
            var(key)
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join(default))
        };

        let lookahead_days = parse_var(&var, "LOOKAHEAD_DAYS", DEFAULT_LOOKAHEAD_DAYS)?;
        if !(0..=MAX_LOOKAHEAD_DAYS).contains(&lookahead_days) {
            anyhow::bail!(
                "LOOKAHEAD_DAYS must be between 0 and {}, got {}",
                MAX_LOOKAHEAD_DAYS,
                lookahead_days
            );
        }

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            upload_dir: path_or("UPLOAD_DIR", "uploads"),
            template_dir: path_or("TEMPLATE_DIR", "templates"),
            settings_path: path_or("SETTINGS_PATH", "config.json"),
            webdriver_url: var("WEBDRIVER_URL")
                .unwrap_or_else(|| "http://localhost:9515".to_string()),
            messaging_base_url: var("MESSAGING_BASE_URL")
                .unwrap_or_else(|| "https://web.whatsapp.com".to_string()),
            log_dir: path_or("LOG_DIR", "logs"),
            browser_profile_dir: path_or("BROWSER_PROFILE_DIR", "chrome_profile"),
            lookahead_days,
            send_interval_secs: parse_var(&var, "SEND_INTERVAL_SECS", DEFAULT_SEND_INTERVAL_SECS)?,
            session_timeout_secs: parse_var(&var, "SESSION_TIMEOUT_SECS", 30)?,
            candidate_timeout_secs: parse_var(&var, "CANDIDATE_TIMEOUT_SECS", 10)?,
            candidate_settle_ms: parse_var(&var, "CANDIDATE_SETTLE_MS", 2000)?,
            max_upload_bytes: parse_var(&var, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
        })
    }
}

fn parse_var<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> anyhow::Result<T> {
    match var(key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            anyhow::anyhow!(
                "{} must be a valid {}",
                key,
                std::any::type_name::<T>()
            )
        }),
        None => Ok(default),
    }
}
