//! File-backed stores for templates, operator settings and uploaded recipient files.
//!
//! The dispatch pipeline only reads from these; the HTTP surface writes them.

use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::types::{Settings, TemplateSet};

pub const ACTIVE_TEMPLATE_FILE: &str = "active_message.txt";
pub const INACTIVE_TEMPLATE_FILE: &str = "inactive_message.txt";
pub const NO_INSTRUCTION_TEMPLATE_FILE: &str = "no_instruction_message.txt";

const DEFAULT_ACTIVE_TEMPLATE: &str = "Dear {Client}, your hearing for {Parties} is on {NextHearingDate}. Please be prepared. Best regards, Legal Team.";
const DEFAULT_INACTIVE_TEMPLATE: &str =
    "Dear {Client}, please contact us regarding your case {Parties}. Best regards, Legal Team.";
const DEFAULT_NO_INSTRUCTION_TEMPLATE: &str = "Dear {Client}, we need your instructions for {Parties} before {NextHearingDate}. Please contact us urgently. Best regards, Legal Team.";

/// Extensions accepted for recipient uploads.
const ALLOWED_UPLOAD_EXTENSIONS: &[&str] = &["csv", "txt"];

// ============================================================
// Templates
// ============================================================

/// Directory holding one text file per category template.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory and write fallback templates for any missing file.
    pub async fn ensure_defaults(&self) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        for (file, default) in [
            (ACTIVE_TEMPLATE_FILE, DEFAULT_ACTIVE_TEMPLATE),
            (INACTIVE_TEMPLATE_FILE, DEFAULT_INACTIVE_TEMPLATE),
            (NO_INSTRUCTION_TEMPLATE_FILE, DEFAULT_NO_INSTRUCTION_TEMPLATE),
        ] {
            let path = self.dir.join(file);
            if !tokio::fs::try_exists(&path).await? {
                tokio::fs::write(&path, default).await?;
                tracing::info!(template = file, "Created fallback template");
            }
        }

        Ok(())
    }

    /// Load every template for display. Missing files read as empty.
    pub async fn load_all(&self) -> Result<TemplateSet, AppError> {
        Ok(TemplateSet {
            active: self.read_optional(ACTIVE_TEMPLATE_FILE).await?,
            inactive: self.read_optional(INACTIVE_TEMPLATE_FILE).await?,
            no_instruction: self.read_optional(NO_INSTRUCTION_TEMPLATE_FILE).await?,
        })
    }

    /// Load the templates a dispatch run needs.
    ///
    /// The active and no-instruction templates must be readable; the inactive
    /// template is not used by dispatch and is left empty.
    pub async fn load_for_dispatch(&self) -> Result<TemplateSet, AppError> {
        Ok(TemplateSet {
            active: self.read_required(ACTIVE_TEMPLATE_FILE).await?,
            inactive: String::new(),
            no_instruction: self.read_required(NO_INSTRUCTION_TEMPLATE_FILE).await?,
        })
    }

    /// Overwrite all three templates.
    pub async fn save(&self, templates: &TemplateSet) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(ACTIVE_TEMPLATE_FILE), &templates.active).await?;
        tokio::fs::write(self.dir.join(INACTIVE_TEMPLATE_FILE), &templates.inactive).await?;
        tokio::fs::write(
            self.dir.join(NO_INSTRUCTION_TEMPLATE_FILE),
            &templates.no_instruction,
        )
        .await?;
        Ok(())
    }

    async fn read_required(&self, file: &str) -> Result<String, AppError> {
        let path = self.dir.join(file);
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            AppError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })
    }

    async fn read_optional(&self, file: &str) -> Result<String, AppError> {
        match tokio::fs::read_to_string(self.dir.join(file)).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================
// Settings
// ============================================================

/// Pretty-printed JSON settings file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Write default settings if the file does not exist yet.
    pub async fn ensure_defaults(&self) -> Result<(), AppError> {
        if !tokio::fs::try_exists(&self.path).await? {
            self.save(&Settings::default()).await?;
            tracing::info!(path = %self.path.display(), "Created default settings");
        }
        Ok(())
    }

    /// Load settings; a missing file yields defaults.
    pub async fn load(&self) -> Result<Settings, AppError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| AppError::Config(format!("Invalid settings file: {}", e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, settings: &Settings) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_string_pretty(settings)
            .map_err(|e| AppError::Internal(format!("Failed to encode settings: {}", e)))?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }
}

// ============================================================
// Uploads
// ============================================================

/// Directory of uploaded recipient files.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn ensure_dir(&self) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Whether a client-supplied file name has an accepted extension.
    pub fn is_allowed(filename: &str) -> bool {
        filename
            .rsplit_once('.')
            .map(|(_, ext)| ALLOWED_UPLOAD_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Reduce a client-supplied name to a safe single path component.
    ///
    /// Directory parts are dropped and anything outside `[A-Za-z0-9._-]`
    /// becomes `_`. Leading dots are stripped so the result is never hidden.
    pub fn sanitize_filename(filename: &str) -> String {
        let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
        let cleaned: String = base
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        cleaned.trim_start_matches('.').to_string()
    }

    /// Store an upload and return the path it was written to.
    pub async fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, AppError> {
        if !Self::is_allowed(filename) {
            return Err(AppError::Validation("Invalid file format".to_string()));
        }
        let safe = Self::sanitize_filename(filename);
        if safe.is_empty() {
            return Err(AppError::Validation("No file selected".to_string()));
        }
        // Sanitizing can strip the extension (`..csv` becomes `csv`)
        if !Self::is_allowed(&safe) {
            return Err(AppError::Validation("Invalid file format".to_string()));
        }

        self.ensure_dir().await?;
        let path = self.dir.join(safe);
        tokio::fs::write(&path, bytes).await?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "Stored recipient upload");
        Ok(path)
    }

    /// The most recently modified `.csv` file, if any.
    pub async fn latest_csv(&self) -> Result<Option<PathBuf>, AppError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut latest: Option<(std::time::SystemTime, PathBuf)> = None;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_csv = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
            if !is_csv {
                continue;
            }
            let modified = entry.metadata().await?.modified()?;
            if latest.as_ref().is_none_or(|(t, _)| modified >= *t) {
                latest = Some((modified, path));
            }
        }

        Ok(latest.map(|(_, path)| path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_defaults_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::new(dir.path().join("templates"));
        tokio::fs::create_dir_all(store.dir()).await.unwrap();
        tokio::fs::write(store.dir().join(ACTIVE_TEMPLATE_FILE), "custom")
            .await
            .unwrap();

        store.ensure_defaults().await.unwrap();

        let templates = store.load_all().await.unwrap();
        assert_eq!(templates.active, "custom");
        assert!(templates.inactive.contains("{Client}"));
        assert!(templates.no_instruction.contains("{NextHearingDate}"));
    }

    #[tokio::test]
    async fn test_load_for_dispatch_requires_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::new(dir.path());
        tokio::fs::write(dir.path().join(ACTIVE_TEMPLATE_FILE), "hi {Client}")
            .await
            .unwrap();

        let err = store.load_for_dispatch().await.unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
        assert!(err.to_string().contains(NO_INSTRUCTION_TEMPLATE_FILE));
    }

    #[tokio::test]
    async fn test_save_and_load_templates() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::new(dir.path());
        let templates = TemplateSet {
            active: "a".to_string(),
            inactive: "i".to_string(),
            no_instruction: "n".to_string(),
        };
        store.save(&templates).await.unwrap();

        assert_eq!(store.load_all().await.unwrap(), templates);
        let dispatch = store.load_for_dispatch().await.unwrap();
        assert_eq!(dispatch.active, "a");
        assert_eq!(dispatch.no_instruction, "n");
        assert!(dispatch.inactive.is_empty());
    }

    #[tokio::test]
    async fn test_settings_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("config.json"));
        assert_eq!(store.load().await.unwrap(), Settings::default());

        let settings = Settings {
            notification_contact1: "+919876543210".to_string(),
            notification_contact2: String::new(),
            user_data_type: "hc".to_string(),
        };
        store.save(&settings).await.unwrap();
        assert_eq!(store.load().await.unwrap(), settings);
    }

    #[test]
    fn test_allowed_extensions() {
        assert!(UploadStore::is_allowed("clients.csv"));
        assert!(UploadStore::is_allowed("CLIENTS.CSV"));
        assert!(UploadStore::is_allowed("list.txt"));
        assert!(!UploadStore::is_allowed("clients.xlsx"));
        assert!(!UploadStore::is_allowed("clients"));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(UploadStore::sanitize_filename("../../etc/passwd.csv"), "passwd.csv");
        assert_eq!(UploadStore::sanitize_filename("C:\\data\\my list.csv"), "my_list.csv");
        assert_eq!(UploadStore::sanitize_filename(".hidden.csv"), "hidden.csv");
    }

    #[tokio::test]
    async fn test_latest_csv_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        assert_eq!(store.latest_csv().await.unwrap(), None);

        store.save("notes.txt", b"x").await.unwrap();
        assert_eq!(store.latest_csv().await.unwrap(), None);

        let first = store.save("first.csv", b"a").await.unwrap();
        assert_eq!(store.latest_csv().await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_save_rejects_name_that_loses_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());

        let err = store.save("..csv", b"a").await.unwrap_err();

        assert!(matches!(err, AppError::Validation(msg) if msg == "Invalid file format"));
        assert!(!dir.path().join("csv").exists());
    }

    #[tokio::test]
    async fn test_latest_csv_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("nope"));
        assert_eq!(store.latest_csv().await.unwrap(), None);
    }
}
