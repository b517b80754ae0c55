//! Purpose: Define a stable, structured schema for non-fatal stderr notices.
//! Exports: `Notice`, `notice_json`, `empty_registration_notice`.
//! Role: Shared contract helper for CLI diagnostics (non-error events).
//! Invariants: Notices are non-fatal and never change the run's exit code.
//! Invariants: JSON schema is stable once published; fields are additive-only.
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::project::Registration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: String,
    pub time: String,
    pub stage: String,
    pub library: String,
    pub message: String,
    pub details: Map<String, Value>,
}

pub fn notice_json(notice: &Notice) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(notice.kind));
    inner.insert("time".to_string(), json!(notice.time));
    inner.insert("stage".to_string(), json!(notice.stage));
    inner.insert("library".to_string(), json!(notice.library));
    inner.insert("message".to_string(), json!(notice.message));
    inner.insert("details".to_string(), Value::Object(notice.details.clone()));

    let mut outer = Map::new();
    outer.insert("notice".to_string(), Value::Object(inner));
    Value::Object(outer)
}

pub fn notice_time_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// Notice for a source pattern that registered nothing.
pub fn empty_registration_notice(library: &str, registration: &Registration) -> Notice {
    let mut details = Map::new();
    details.insert("pattern".to_string(), json!(registration.reference));
    details.insert("matched_count".to_string(), json!(0));
    Notice {
        kind: "empty_sources".to_string(),
        time: notice_time_now(),
        stage: "add_sources".to_string(),
        library: library.to_string(),
        message: format!("source pattern `{}` matched no files", registration.reference),
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::{Notice, empty_registration_notice, notice_json};
    use crate::core::project::Registration;
    use serde_json::{Map, Value};

    #[test]
    fn notice_json_has_required_fields() {
        let mut details = Map::new();
        details.insert("matched_count".to_string(), Value::from(0));

        let notice = Notice {
            kind: "empty_sources".to_string(),
            time: "2026-02-01T00:00:00Z".to_string(),
            stage: "add_sources".to_string(),
            library: "blog_lib".to_string(),
            message: "source pattern `*.vhdl` matched no files".to_string(),
            details,
        };

        let value = notice_json(&notice);
        let obj = value
            .get("notice")
            .and_then(|v| v.as_object())
            .expect("notice object");

        assert_eq!(obj.get("kind").and_then(|v| v.as_str()), Some("empty_sources"));
        assert_eq!(
            obj.get("time").and_then(|v| v.as_str()),
            Some("2026-02-01T00:00:00Z")
        );
        assert_eq!(obj.get("stage").and_then(|v| v.as_str()), Some("add_sources"));
        assert_eq!(obj.get("library").and_then(|v| v.as_str()), Some("blog_lib"));
        assert!(obj.get("details").and_then(|v| v.as_object()).is_some());
    }

    #[test]
    fn empty_registration_notice_names_the_pattern() {
        let registration = Registration {
            reference: "*.sv".to_string(),
            matched: Vec::new(),
            added: Vec::new(),
        };
        let notice = empty_registration_notice("blog_lib", &registration);
        assert_eq!(notice.details["pattern"], "*.sv");
        assert!(time::OffsetDateTime::parse(
            &notice.time,
            &time::format_description::well_known::Rfc3339
        )
        .is_ok());
    }
}
