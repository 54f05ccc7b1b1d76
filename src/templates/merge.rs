//! Data merge engine: persisted page data ⊕ template defaults.
//!
//! Rules per field type:
//!
//! | Type | Persisted value wins when … |
//! |------|-----------------------------|
//! | text / longText / image | non-null and not an empty string |
//! | list / repeatedObject | a non-empty array (all or nothing) |
//! | object | never as a whole: each sub-field is merged by these rules |
//!
//! The result carries exactly the declared fields of the kind, nothing more.
//! It is recomputed on every render and never persisted.

use super::{registry, FieldDescriptor, FieldType, TemplateKind};
use crate::error::ExportError;
use serde::Serialize;
use serde_json::{Map, Value};

/// The merged, fully populated data object consumed by a template renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageData {
    pub kind: TemplateKind,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl PageData {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// A scalar field as text; non-string scalars are rendered with JSON
    /// formatting, missing fields as `""`.
    pub fn text(&self, key: &str) -> String {
        value_text(self.fields.get(key))
    }

    pub fn list(&self, key: &str) -> &[Value] {
        self.fields
            .get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.fields.get(key).and_then(Value::as_object)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Text of a scalar JSON value; `""` for null, missing and composite values.
pub(crate) fn value_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Merge `persisted` onto `defaults` for the fields `kind` declares.
///
/// `persisted` that is not an object (absent data, `null`, a stray string)
/// is treated as empty, so every field resolves from its default.
pub fn resolve_template_data(
    kind: TemplateKind,
    persisted: &Value,
    defaults: &Value,
) -> Result<PageData, ExportError> {
    let definition = registry().get(kind);
    let empty = Map::new();
    let persisted = persisted.as_object().unwrap_or(&empty);
    let defaults = defaults.as_object().unwrap_or(&empty);

    Ok(PageData {
        kind,
        fields: merge_fields(&definition.fields, persisted, defaults),
    })
}

/// Parse `kind`, take the registry defaults and merge.
pub fn resolve_template(kind: &str, persisted: &Value) -> Result<PageData, ExportError> {
    let definition = registry().lookup(kind)?;
    resolve_template_data(definition.kind, persisted, &definition.defaults)
}

fn merge_fields(
    fields: &[FieldDescriptor],
    persisted: &Map<String, Value>,
    defaults: &Map<String, Value>,
) -> Map<String, Value> {
    let mut merged = Map::with_capacity(fields.len());
    for field in fields {
        let value = merge_field(field, persisted.get(field.key), defaults.get(field.key));
        merged.insert(field.key.to_string(), value);
    }
    merged
}

fn merge_field(field: &FieldDescriptor, persisted: Option<&Value>, default: Option<&Value>) -> Value {
    match field.field_type {
        FieldType::Text | FieldType::LongText | FieldType::Image => match persisted {
            Some(v) if !is_blank_scalar(v) => v.clone(),
            _ => default.cloned().unwrap_or_else(|| Value::String(String::new())),
        },
        FieldType::List | FieldType::RepeatedObject => match persisted {
            Some(Value::Array(items)) if !items.is_empty() => Value::Array(items.clone()),
            _ => default
                .filter(|d| d.is_array())
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new())),
        },
        FieldType::Object => {
            let empty = Map::new();
            let persisted = persisted.and_then(Value::as_object).unwrap_or(&empty);
            let default = default.and_then(Value::as_object).unwrap_or(&empty);
            Value::Object(merge_fields(&field.sub_fields, persisted, default))
        }
    }
}

fn is_blank_scalar(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
