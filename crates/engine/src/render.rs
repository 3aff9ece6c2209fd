//! Template renderer.
//!
//! Replaces `{FieldName}` placeholders with record values. Placeholders that
//! name no record field stay in the output untouched.

use herald_common::types::{RecipientRecord, TemplateSet};

/// Substitute every known `{FieldName}` in `template` with the record's value.
pub fn render(template: &str, record: &RecipientRecord) -> String {
    let mut message = template.to_string();
    for column in RecipientRecord::COLUMNS {
        let placeholder = format!("{{{}}}", column);
        if !message.contains(&placeholder) {
            continue;
        }
        if let Some(value) = record.field(column) {
            message = message.replace(&placeholder, &value);
        }
    }
    message
}

/// Render the template for the record's category. Categories without a
/// template render as an empty message.
pub fn render_for(templates: &TemplateSet, record: &RecipientRecord) -> String {
    let template = templates.for_category(&record.category).unwrap_or_default();
    render(template, record)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use herald_common::types::Category;

    use super::*;

    fn record() -> RecipientRecord {
        RecipientRecord {
            client: "Asha".to_string(),
            contact: "+919876543210".to_string(),
            next_hearing_date: NaiveDate::from_ymd_opt(2026, 10, 23),
            category: Category::Active,
            typ_rn_ry: "RA 12/2024".to_string(),
            parties: "Asha v. State".to_string(),
        }
    }

    #[test]
    fn test_render_all_fields() {
        let template = "{Client}|{Contact}|{NextHearingDate}|{Category}|{TypRnRy}|{Parties}";
        assert_eq!(
            render(template, &record()),
            "Asha|+919876543210|2026-10-23|Active|RA 12/2024|Asha v. State"
        );
    }

    #[test]
    fn test_render_repeated_placeholder() {
        assert_eq!(render("{Client}, {Client}!", &record()), "Asha, Asha!");
    }

    #[test]
    fn test_unknown_placeholders_left_verbatim() {
        let out = render("Dear {Client}, see {Court} at {time}. {client}", &record());
        assert_eq!(out, "Dear Asha, see {Court} at {time}. {client}");
    }

    #[test]
    fn test_no_placeholders() {
        assert_eq!(render("Plain text {", &record()), "Plain text {");
        assert_eq!(render("", &record()), "");
    }

    #[test]
    fn test_render_for_uses_category_template() {
        let templates = TemplateSet {
            active: "A {Client}".to_string(),
            inactive: "I {Client}".to_string(),
            no_instruction: "N {Client}".to_string(),
        };
        let mut r = record();
        assert_eq!(render_for(&templates, &r), "A Asha");
        r.category = Category::NoClientsInstruction;
        assert_eq!(render_for(&templates, &r), "N Asha");
        r.category = Category::Unknown("Closed".to_string());
        assert_eq!(render_for(&templates, &r), "");
    }
}
