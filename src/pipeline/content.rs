//! Content resolver: a section's stored payload → one markup string.
//!
//! Payloads arrive in several shapes depending on which editor saved them:
//!
//! ```text
//! "<p>x</p>"                              raw markup
//! {"htmlCode": "<p>x</p>"}                structured record
//! "{\"htmlCode\": \"<p>x</p>\"}"          structured record, encoded as text
//! {"data": "{\"content\": \"<p>x</p>\"}"} record wrapping an encoded record
//! ```
//!
//! [`MarkupSource::decode`] turns any of them into a tagged union with at
//! most one decode step; [`MarkupSource::into_markup`] probes the alias keys.
//! Nothing here fails: an undecodable payload is treated as raw markup and
//! a record without markup contributes an empty string.

use crate::error::PageError;
use crate::model::Section;
use serde_json::{Map, Value};
use tracing::warn;

/// Keys that may hold the markup, in priority order.
pub const MARKUP_KEYS: [&str; 3] = ["htmlCode", "content", "html"];

/// Key under which some editors nest a text-encoded record.
const WRAPPER_KEY: &str = "data";

#[derive(Debug, Clone, PartialEq)]
pub enum MarkupSource {
    Raw(String),
    Structured(Map<String, Value>),
}

/// Why a payload that looked encoded was used raw.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeWarning {
    pub detail: String,
}

impl MarkupSource {
    /// Classify a payload, performing at most one decode step.
    pub fn decode(payload: &Value) -> (MarkupSource, Option<DecodeWarning>) {
        match payload {
            Value::String(s) if looks_encoded(s) => match serde_json::from_str::<Value>(s) {
                Ok(Value::Object(map)) => (MarkupSource::Structured(map), None),
                Ok(_) => (MarkupSource::Raw(s.clone()), None),
                Err(e) => (
                    MarkupSource::Raw(s.clone()),
                    Some(DecodeWarning {
                        detail: e.to_string(),
                    }),
                ),
            },
            Value::String(s) => (MarkupSource::Raw(s.clone()), None),
            Value::Object(map) => decode_record(map),
            _ => (MarkupSource::Raw(String::new()), None),
        }
    }

    /// The markup this source carries; `""` when there is none.
    pub fn into_markup(self) -> String {
        match self {
            MarkupSource::Raw(s) => s,
            MarkupSource::Structured(map) => probe_markup(&map).unwrap_or_default(),
        }
    }
}

fn decode_record(map: &Map<String, Value>) -> (MarkupSource, Option<DecodeWarning>) {
    if probe_markup(map).is_some() {
        return (MarkupSource::Structured(map.clone()), None);
    }
    let wrapped = map
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(WRAPPER_KEY))
        .and_then(|(_, v)| v.as_str())
        .filter(|s| looks_encoded(s));
    match wrapped {
        Some(encoded) => match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Object(inner)) => (MarkupSource::Structured(inner), None),
            // Not a record after all: keep the outer one as the target shape.
            Ok(_) => (MarkupSource::Structured(map.clone()), None),
            Err(e) => (
                MarkupSource::Structured(map.clone()),
                Some(DecodeWarning {
                    detail: e.to_string(),
                }),
            ),
        },
        None => (MarkupSource::Structured(map.clone()), None),
    }
}

fn looks_encoded(s: &str) -> bool {
    s.trim_start().starts_with('{')
}

/// First non-empty string under an alias key, matched case-insensitively.
fn probe_markup(map: &Map<String, Value>) -> Option<String> {
    MARKUP_KEYS.iter().find_map(|alias| {
        map.iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(alias))
            .find_map(|(_, v)| v.as_str().filter(|s| !s.trim().is_empty()))
            .map(str::to_string)
    })
}

/// Resolve a section to markup. Never fails.
pub fn resolve_section_markup(section: &Section) -> String {
    MarkupSource::decode(&section.data).0.into_markup()
}

/// Like [`resolve_section_markup`] but also reports a decode fallback as a
/// [`PageError::DecodeFailure`] scoped to `page`.
pub fn resolve_section_markup_with_warning(section: &Section, page: &str) -> (String, Option<PageError>) {
    let (source, warning) = MarkupSource::decode(&section.data);
    let warning = warning.map(|w| {
        warn!(
            "{}: section {} payload did not decode, using raw payload: {}",
            page, section.id, w.detail
        );
        PageError::DecodeFailure {
            page: page.to_string(),
            section: section.id.clone(),
            detail: w.detail,
        }
    });
    (source.into_markup(), warning)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn section(data: Value) -> Section {
        Section {
            id: "s1".into(),
            order: 0,
            data,
        }
    }

    #[test]
    fn raw_string_is_returned_unchanged() {
        assert_eq!(resolve_section_markup(&section(json!("<p>Hello</p>"))), "<p>Hello</p>");
    }

    #[test]
    fn encoded_record_is_decoded_once() {
        let payload = json!(r#"{"htmlCode": "<p>x</p>"}"#);
        assert_eq!(resolve_section_markup(&section(payload)), "<p>x</p>");
    }

    #[test]
    fn alias_priority_is_htmlcode_content_html() {
        let s = section(json!({"html": "<i>3</i>", "content": "<i>2</i>", "htmlCode": "<i>1</i>"}));
        assert_eq!(resolve_section_markup(&s), "<i>1</i>");
        let s = section(json!({"html": "<i>3</i>", "content": "<i>2</i>"}));
        assert_eq!(resolve_section_markup(&s), "<i>2</i>");
        let s = section(json!({"html": "<i>3</i>", "content": ""}));
        assert_eq!(resolve_section_markup(&s), "<i>3</i>");
    }

    #[test]
    fn alias_keys_match_case_insensitively() {
        let s = section(json!({"HTMLCODE": "<b>x</b>"}));
        assert_eq!(resolve_section_markup(&s), "<b>x</b>");
    }

    #[test]
    fn wrapped_encoded_record_is_unwrapped() {
        let s = section(json!({"data": r#"{"content": "<p>inner</p>"}"#}));
        assert_eq!(resolve_section_markup(&s), "<p>inner</p>");
    }

    #[test]
    fn malformed_encoding_falls_back_to_raw_payload() {
        let raw = r#"{"htmlCode": "<p>broken"#;
        let (markup, warning) = resolve_section_markup_with_warning(&section(json!(raw)), "page 1");
        assert_eq!(markup, raw);
        assert!(matches!(warning, Some(PageError::DecodeFailure { section, .. }) if section == "s1"));
    }

    #[test]
    fn empty_encoded_record_yields_no_markup() {
        let (source, warning) = MarkupSource::decode(&json!("{}"));
        assert_eq!(source, MarkupSource::Structured(Map::new()));
        assert!(warning.is_none());
        assert_eq!(source.into_markup(), "");
    }

    #[test]
    fn records_without_markup_resolve_to_empty() {
        assert_eq!(resolve_section_markup(&section(json!({"title": "x"}))), "");
        assert_eq!(resolve_section_markup(&section(json!({"htmlCode": 5}))), "");
        assert_eq!(resolve_section_markup(&section(Value::Null)), "");
        assert_eq!(resolve_section_markup(&section(json!([1, 2]))), "");
    }

    #[test]
    fn clean_payloads_produce_no_warning() {
        let (_, warning) = resolve_section_markup_with_warning(&section(json!({"html": "<p/>"})), "page 1");
        assert!(warning.is_none());
    }
}
