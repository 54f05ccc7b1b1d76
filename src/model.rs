//! Plain records supplied by the persistence layer.
//!
//! The export core only reads these for the duration of one export. Field
//! names follow the storage shape (`has_header`, `background_image`);
//! camelCase aliases are accepted because the same records also travel
//! through the preview front-end. Identifiers, ordinals and flags are
//! decoded tolerantly: database drivers hand them over as numbers, strings
//! or `0`/`1`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A company-profile document: optional cover/header/footer fragments and
/// an ordered collection of pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Cover markup; rendered as the first logical page when non-empty.
    #[serde(default)]
    pub cover: Option<String>,
    /// Header markup placed at the top of pages with `has_header`.
    #[serde(default)]
    pub header: Option<String>,
    /// Footer markup placed at the bottom of pages with `has_footer`.
    #[serde(default)]
    pub footer: Option<String>,
    #[serde(default, alias = "backgroundImage")]
    pub background_image: Option<String>,
    /// `#rrggbb`; overrides the configured background colour.
    #[serde(default, alias = "backgroundColor")]
    pub background_color: Option<String>,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Page {
    #[serde(default, deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "hasHeader", deserialize_with = "de_flag")]
    pub has_header: bool,
    #[serde(default, alias = "hasFooter", deserialize_with = "de_flag")]
    pub has_footer: bool,
    #[serde(default, deserialize_with = "de_order")]
    pub order: i64,
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// One content block; `data` is either markup or a record carrying markup.
/// See [`crate::pipeline::content`] for the decoding rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de_order")]
    pub order: i64,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de_order")]
    pub order: i64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

impl Document {
    /// Parse a document record from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Cover markup if present and not blank.
    pub fn cover_markup(&self) -> Option<&str> {
        self.cover.as_deref().filter(|c| !c.trim().is_empty())
    }

    /// Pages in ascending `order`; ties keep input (creation) order.
    pub fn ordered_pages(&self) -> Vec<&Page> {
        let mut pages: Vec<&Page> = self.pages.iter().collect();
        pages.sort_by_key(|p| p.order);
        pages
    }

    /// Attachments in ascending `order`; ties keep input order.
    pub fn ordered_attachments(&self) -> Vec<&Attachment> {
        let mut items: Vec<&Attachment> = self.attachments.iter().collect();
        items.sort_by_key(|a| a.order);
        items
    }

    /// Number of logical pages: the cover (if any) plus every page.
    pub fn logical_page_count(&self) -> usize {
        usize::from(self.cover_markup().is_some()) + self.pages.len()
    }
}

impl Page {
    /// Sections in ascending `order`; ties keep input order.
    pub fn ordered_sections(&self) -> Vec<&Section> {
        let mut sections: Vec<&Section> = self.sections.iter().collect();
        sections.sort_by_key(|s| s.order);
        sections
    }
}

// ── Tolerant field decoders ──────────────────────────────────────────────

fn de_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

fn de_order<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn de_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_storage_shaped_record() {
        let doc = Document::from_json(
            r#"{
                "id": 7,
                "name": "Acme profile",
                "header": "<div>page title</div>",
                "background_image": "backgrounds/a.png",
                "pages": [
                    {"id": 2, "title": "B", "has_header": 1, "has_footer": "0", "order": "2",
                     "sections": [{"id": 9, "order": 1, "data": "<p>x</p>"}]},
                    {"id": 1, "title": "A", "hasHeader": true, "hasFooter": true, "order": 1}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(doc.id, "7");
        assert_eq!(doc.background_image.as_deref(), Some("backgrounds/a.png"));
        let pages = doc.ordered_pages();
        assert_eq!(pages[0].title, "A");
        assert!(pages[0].has_header && pages[0].has_footer);
        assert_eq!(pages[1].order, 2);
        assert!(pages[1].has_header);
        assert!(!pages[1].has_footer);
        assert_eq!(pages[1].sections[0].data, Value::String("<p>x</p>".into()));
    }

    #[test]
    fn order_ties_keep_creation_order() {
        let doc = Document {
            pages: vec![
                Page { id: "first".into(), order: 1, ..Default::default() },
                Page { id: "zero".into(), order: 0, ..Default::default() },
                Page { id: "second".into(), order: 1, ..Default::default() },
            ],
            ..Default::default()
        };
        let ids: Vec<&str> = doc.ordered_pages().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["zero", "first", "second"]);
    }

    #[test]
    fn blank_cover_is_not_a_logical_page() {
        let mut doc = Document {
            cover: Some("   ".into()),
            pages: vec![Page::default()],
            ..Default::default()
        };
        assert_eq!(doc.logical_page_count(), 1);
        doc.cover = Some("<h1>Acme</h1>".into());
        assert_eq!(doc.logical_page_count(), 2);
    }
}
