//! Template registry: the fixed catalogue of page layouts.
//!
//! Each [`TemplateKind`] declares a default data object and the typed,
//! editable fields of its layout. The registry is built once per process and
//! never mutated; [`merge::resolve_template_data`] combines it with persisted
//! page data, and [`preview::render_preview`] turns the merged data into
//! markup for the interactive preview.

pub mod merge;
pub mod preview;

use crate::error::ExportError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

pub use merge::{resolve_template, resolve_template_data, PageData};
pub use preview::render_preview;

/// One of the hand-built page layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Cover,
    TableOfContents,
    About,
    Staff,
    Content,
    Projects,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 6] = [
        TemplateKind::Cover,
        TemplateKind::TableOfContents,
        TemplateKind::About,
        TemplateKind::Staff,
        TemplateKind::Content,
        TemplateKind::Projects,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TemplateKind::Cover => "cover",
            TemplateKind::TableOfContents => "toc",
            TemplateKind::About => "about",
            TemplateKind::Staff => "staff",
            TemplateKind::Content => "content",
            TemplateKind::Projects => "projects",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateKind {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalised.as_str() {
            "cover" => Ok(TemplateKind::Cover),
            "toc" | "tableofcontents" => Ok(TemplateKind::TableOfContents),
            "about" => Ok(TemplateKind::About),
            "staff" => Ok(TemplateKind::Staff),
            "content" => Ok(TemplateKind::Content),
            "projects" => Ok(TemplateKind::Projects),
            _ => Err(ExportError::UnknownTemplateKind {
                kind: s.to_string(),
            }),
        }
    }
}

/// The editing widget / merge rule of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    Text,
    LongText,
    Image,
    List,
    Object,
    RepeatedObject,
}

impl FieldType {
    pub fn is_scalar(self) -> bool {
        matches!(self, FieldType::Text | FieldType::LongText | FieldType::Image)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub key: &'static str,
    pub label: &'static str,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Nested fields of `Object` / `RepeatedObject` fields.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_fields: Vec<FieldDescriptor>,
}

impl FieldDescriptor {
    const fn new(key: &'static str, label: &'static str, field_type: FieldType) -> Self {
        Self {
            key,
            label,
            field_type,
            sub_fields: Vec::new(),
        }
    }

    fn with_sub_fields(mut self, sub_fields: Vec<FieldDescriptor>) -> Self {
        self.sub_fields = sub_fields;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateDefinition {
    pub kind: TemplateKind,
    pub defaults: Value,
    pub fields: Vec<FieldDescriptor>,
}

/// The process-wide catalogue, one definition per kind.
#[derive(Debug)]
pub struct TemplateRegistry {
    definitions: Vec<TemplateDefinition>,
}

impl TemplateRegistry {
    pub fn get(&self, kind: TemplateKind) -> &TemplateDefinition {
        // Built from TemplateKind::ALL in declaration order.
        &self.definitions[kind as usize]
    }

    /// Look a definition up by its kind name.
    pub fn lookup(&self, kind: &str) -> Result<&TemplateDefinition, ExportError> {
        Ok(self.get(kind.parse()?))
    }

    pub fn definitions(&self) -> &[TemplateDefinition] {
        &self.definitions
    }
}

static REGISTRY: Lazy<TemplateRegistry> = Lazy::new(|| TemplateRegistry {
    definitions: TemplateKind::ALL.iter().map(|&k| definition(k)).collect(),
});

/// The template registry.
pub fn registry() -> &'static TemplateRegistry {
    &REGISTRY
}

// ── Built-in definitions ─────────────────────────────────────────────────

use FieldType::{Image, List, LongText, Object, RepeatedObject, Text};

fn person_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::new("name", "Name", Text),
        FieldDescriptor::new("role", "Role", Text),
        FieldDescriptor::new("photo", "Photo", Image),
    ]
}

fn definition(kind: TemplateKind) -> TemplateDefinition {
    let (defaults, fields) = match kind {
        TemplateKind::Cover => (
            json!({
                "title": "Company Profile",
                "subtitle": "Engineering & Contracting",
                "logo": "",
                "background": "",
                "date": "",
            }),
            vec![
                FieldDescriptor::new("title", "Title", Text),
                FieldDescriptor::new("subtitle", "Subtitle", Text),
                FieldDescriptor::new("logo", "Logo", Image),
                FieldDescriptor::new("background", "Background image", Image),
                FieldDescriptor::new("date", "Date", Text),
            ],
        ),
        TemplateKind::TableOfContents => (
            json!({
                "heading": "Table of Contents",
                "entries": [
                    {"title": "About Us", "page": "3"},
                    {"title": "Our Team", "page": "4"},
                    {"title": "Our Projects", "page": "5"},
                ],
            }),
            vec![
                FieldDescriptor::new("heading", "Heading", Text),
                FieldDescriptor::new("entries", "Entries", RepeatedObject).with_sub_fields(vec![
                    FieldDescriptor::new("title", "Title", Text),
                    FieldDescriptor::new("page", "Page", Text),
                ]),
            ],
        ),
        TemplateKind::About => (
            json!({
                "heading": "About Us",
                "body": "We deliver engineering and contracting services across the region.",
                "image": "",
                "highlights": ["Founded in 2005", "ISO 9001 certified", "200+ completed projects"],
                "vision": {
                    "title": "Our Vision",
                    "text": "To be the partner of choice for complex projects.",
                },
            }),
            vec![
                FieldDescriptor::new("heading", "Heading", Text),
                FieldDescriptor::new("body", "Body", LongText),
                FieldDescriptor::new("image", "Image", Image),
                FieldDescriptor::new("highlights", "Highlights", List),
                FieldDescriptor::new("vision", "Vision", Object).with_sub_fields(vec![
                    FieldDescriptor::new("title", "Title", Text),
                    FieldDescriptor::new("text", "Text", LongText),
                ]),
            ],
        ),
        TemplateKind::Staff => (
            json!({
                "heading": "Our Team",
                "intro": "The people behind our work.",
                "leader": {"name": "General Manager", "role": "Management", "photo": ""},
                "members": [
                    {"name": "Project Manager", "role": "Projects", "photo": ""},
                    {"name": "Site Engineer", "role": "Engineering", "photo": ""},
                ],
            }),
            vec![
                FieldDescriptor::new("heading", "Heading", Text),
                FieldDescriptor::new("intro", "Introduction", LongText),
                FieldDescriptor::new("leader", "Leader", Object).with_sub_fields(person_fields()),
                FieldDescriptor::new("members", "Members", RepeatedObject)
                    .with_sub_fields(person_fields()),
            ],
        ),
        TemplateKind::Content => (
            json!({
                "heading": "Section Title",
                "body": "Write the content of this page here.",
                "image": "",
            }),
            vec![
                FieldDescriptor::new("heading", "Heading", Text),
                FieldDescriptor::new("body", "Body", LongText),
                FieldDescriptor::new("image", "Image", Image),
            ],
        ),
        TemplateKind::Projects => (
            json!({
                "heading": "Our Projects",
                "intro": "A selection of recently delivered projects.",
                "projects": [
                    {
                        "name": "Project name",
                        "location": "City",
                        "year": "2024",
                        "description": "Short description of the scope.",
                        "images": [],
                    },
                ],
            }),
            vec![
                FieldDescriptor::new("heading", "Heading", Text),
                FieldDescriptor::new("intro", "Introduction", LongText),
                FieldDescriptor::new("projects", "Projects", RepeatedObject).with_sub_fields(vec![
                    FieldDescriptor::new("name", "Name", Text),
                    FieldDescriptor::new("location", "Location", Text),
                    FieldDescriptor::new("year", "Year", Text),
                    FieldDescriptor::new("description", "Description", LongText),
                    FieldDescriptor::new("images", "Images", List),
                ]),
            ],
        ),
    };
    TemplateDefinition {
        kind,
        defaults,
        fields,
    }
}
