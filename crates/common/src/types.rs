use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Recipient classification. Controls which template is rendered and whether
/// the recipient can be due at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Active,
    Inactive,
    NoClientsInstruction,
    /// Any other value found in the source, kept verbatim. Never due.
    Unknown(String),
}

impl Category {
    /// Categories that are eligible for dispatch.
    pub const DISPATCHABLE: [Category; 2] = [Category::Active, Category::NoClientsInstruction];

    /// Parse a raw source value. Surrounding whitespace is ignored, case is not.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Active" => Category::Active,
            "Inactive" => Category::Inactive,
            "NoClientsInstruction" => Category::NoClientsInstruction,
            other => Category::Unknown(other.to_string()),
        }
    }

    pub fn is_dispatchable(&self) -> bool {
        Self::DISPATCHABLE.contains(self)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Active => write!(f, "Active"),
            Category::Inactive => write!(f, "Inactive"),
            Category::NoClientsInstruction => write!(f, "NoClientsInstruction"),
            Category::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

/// One row of the recipient source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientRecord {
    pub client: String,
    /// Phone number with all whitespace removed.
    pub contact: String,
    /// `None` when the source value could not be parsed as a date.
    pub next_hearing_date: Option<NaiveDate>,
    pub category: Category,
    pub typ_rn_ry: String,
    pub parties: String,
}

impl RecipientRecord {
    /// Source column names, in canonical order.
    pub const COLUMNS: [&'static str; 6] = [
        "Client",
        "Contact",
        "NextHearingDate",
        "Category",
        "TypRnRy",
        "Parties",
    ];

    /// String value of a field by its source column name, as rendered into
    /// templates. Returns `None` for names that are not record fields.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "Client" => Some(self.client.clone()),
            "Contact" => Some(self.contact.clone()),
            "NextHearingDate" => Some(
                self.next_hearing_date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
            ),
            "Category" => Some(self.category.to_string()),
            "TypRnRy" => Some(self.typ_rn_ry.clone()),
            "Parties" => Some(self.parties.clone()),
            _ => None,
        }
    }
}

/// Raw message templates, one per category.
///
/// Only `active` and `no_instruction` are used when dispatching; `inactive`
/// is edited and persisted alongside them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSet {
    pub active: String,
    pub inactive: String,
    pub no_instruction: String,
}

impl TemplateSet {
    /// Template for a category. Unknown categories have no template.
    pub fn for_category(&self, category: &Category) -> Option<&str> {
        match category {
            Category::Active => Some(&self.active),
            Category::Inactive => Some(&self.inactive),
            Category::NoClientsInstruction => Some(&self.no_instruction),
            Category::Unknown(_) => None,
        }
    }
}

/// Outcome of one dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageOutcome {
    Success,
    Failed,
}

impl std::fmt::Display for MessageOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageOutcome::Success => write!(f, "Success"),
            MessageOutcome::Failed => write!(f, "Failed"),
        }
    }
}

/// Per-recipient entry in the run log. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResult {
    pub client: String,
    pub contact: String,
    pub status: MessageOutcome,
}

/// Dispatch worker state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Initializing,
    LoadingData,
    Filtering,
    OpeningSession,
    Sending,
    Completed,
    Failed,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::Idle => write!(f, "idle"),
            RunPhase::Initializing => write!(f, "initializing"),
            RunPhase::LoadingData => write!(f, "loading_data"),
            RunPhase::Filtering => write!(f, "filtering"),
            RunPhase::OpeningSession => write!(f, "opening_session"),
            RunPhase::Sending => write!(f, "sending"),
            RunPhase::Completed => write!(f, "completed"),
            RunPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Live state of the current (or most recent) dispatch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStatus {
    pub is_running: bool,
    pub current_step: String,
    pub progress: usize,
    pub total: usize,
    pub messages: Vec<MessageResult>,
    pub phase: RunPhase,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for DispatchStatus {
    fn default() -> Self {
        Self {
            is_running: false,
            current_step: String::new(),
            progress: 0,
            total: 0,
            messages: Vec::new(),
            phase: RunPhase::Idle,
            started_at: None,
            finished_at: None,
        }
    }
}

/// Operator settings persisted next to the templates.
///
/// These are stored and served back to the operator but the dispatch
/// pipeline does not read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub notification_contact1: String,
    #[serde(default)]
    pub notification_contact2: String,
    #[serde(default = "default_user_data_type")]
    pub user_data_type: String,
}

fn default_user_data_type() -> String {
    "shs".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notification_contact1: String::new(),
            notification_contact2: String::new(),
            user_data_type: default_user_data_type(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RecipientRecord {
        RecipientRecord {
            client: "Asha".to_string(),
            contact: "+919876543210".to_string(),
            next_hearing_date: NaiveDate::from_ymd_opt(2026, 10, 23),
            category: Category::NoClientsInstruction,
            typ_rn_ry: "RA 12/2024".to_string(),
            parties: "Asha v. State".to_string(),
        }
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(Category::parse("Active"), Category::Active);
        assert_eq!(Category::parse(" Inactive "), Category::Inactive);
        assert_eq!(
            Category::parse("NoClientsInstruction"),
            Category::NoClientsInstruction
        );
        assert_eq!(
            Category::parse("active"),
            Category::Unknown("active".to_string())
        );
    }

    #[test]
    fn test_dispatchable_categories() {
        assert!(Category::Active.is_dispatchable());
        assert!(Category::NoClientsInstruction.is_dispatchable());
        assert!(!Category::Inactive.is_dispatchable());
        assert!(!Category::Unknown("Closed".to_string()).is_dispatchable());
    }

    #[test]
    fn test_field_lookup() {
        let r = record();
        assert_eq!(r.field("Client").as_deref(), Some("Asha"));
        assert_eq!(r.field("NextHearingDate").as_deref(), Some("2026-10-23"));
        assert_eq!(r.field("Category").as_deref(), Some("NoClientsInstruction"));
        assert_eq!(r.field("Court"), None);
    }

    #[test]
    fn test_null_date_renders_empty() {
        let mut r = record();
        r.next_hearing_date = None;
        assert_eq!(r.field("NextHearingDate").as_deref(), Some(""));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_value(DispatchStatus::default()).unwrap();
        assert_eq!(json["is_running"], false);
        assert_eq!(json["current_step"], "");
        assert_eq!(json["phase"], "idle");
        assert!(json["messages"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_settings_defaults_when_fields_missing() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.user_data_type, "shs");
        assert!(settings.notification_contact1.is_empty());
    }
}
