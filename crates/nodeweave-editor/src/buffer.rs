use chrono::{DateTime, Utc};
use nodeweave_core::{
    DataSource, Node, NodeDataPatch, NodeMetadata, Priority, Status, parse_timestamp,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

use crate::{BufferDefaults, EditError, FieldPath, FieldValue, MetadataField};

/// Working copy of one node's editable fields.
///
/// Every field has a concrete value once seeded, so form controls never
/// need to deal with absent data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub struct EditBuffer {
    pub label: String,
    pub content: String,
    pub selected_sources: Vec<String>,
    pub metadata: MetadataDraft,
}

/// Metadata with defaults filled in. Fields without a default are carried
/// through from the canonical node untouched so a commit never drops them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub struct MetadataDraft {
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub author: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub version: u32,
    pub dependencies: Option<Vec<String>>,
    pub notes: Option<String>,
    pub custom_fields: Option<HashMap<String, Value>>,
    pub template: String,
    pub inputs: Vec<String>,
    pub context: String,
    pub token_limit: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub model: String,
    pub additional_input: Option<String>,
    pub data_source: Option<DataSource>,
}

impl MetadataDraft {
    fn seed(meta: NodeMetadata, defaults: &BufferDefaults, now: DateTime<Utc>) -> Self {
        Self {
            created: meta.created.unwrap_or(now),
            last_modified: meta.last_modified.unwrap_or(now),
            author: meta.author,
            tags: meta.tags,
            priority: meta.priority,
            status: meta.status,
            version: meta.version.unwrap_or(defaults.version),
            dependencies: meta.dependencies,
            notes: meta.notes,
            custom_fields: meta.custom_fields,
            template: meta.template.unwrap_or_default(),
            inputs: meta.inputs.unwrap_or_default(),
            context: meta.context.unwrap_or_default(),
            token_limit: meta.token_limit.unwrap_or(defaults.token_limit),
            temperature: meta.temperature.unwrap_or(defaults.temperature),
            top_p: meta.top_p.unwrap_or(defaults.top_p),
            frequency_penalty: meta.frequency_penalty.unwrap_or(defaults.frequency_penalty),
            presence_penalty: meta.presence_penalty.unwrap_or(defaults.presence_penalty),
            model: meta.model.unwrap_or_else(|| defaults.model.clone()),
            additional_input: meta.additional_input,
            data_source: meta.data_source,
        }
    }

    pub fn to_metadata(&self) -> NodeMetadata {
        NodeMetadata {
            created: Some(self.created),
            last_modified: Some(self.last_modified),
            author: self.author.clone(),
            tags: self.tags.clone(),
            priority: self.priority,
            status: self.status,
            version: Some(self.version),
            dependencies: self.dependencies.clone(),
            notes: self.notes.clone(),
            custom_fields: self.custom_fields.clone(),
            template: Some(self.template.clone()),
            inputs: Some(self.inputs.clone()),
            context: Some(self.context.clone()),
            token_limit: Some(self.token_limit),
            temperature: Some(self.temperature),
            top_p: Some(self.top_p),
            frequency_penalty: Some(self.frequency_penalty),
            presence_penalty: Some(self.presence_penalty),
            model: Some(self.model.clone()),
            additional_input: self.additional_input.clone(),
            data_source: self.data_source.clone(),
        }
    }

    fn set(&mut self, field: MetadataField, value: FieldValue) -> Result<(), EditError> {
        let path = FieldPath::Metadata(field);
        match field {
            MetadataField::Created => self.created = timestamp(path, &text(path, value)?)?,
            MetadataField::LastModified => {
                self.last_modified = timestamp(path, &text(path, value)?)?
            }
            MetadataField::Author => self.author = Some(text(path, value)?),
            MetadataField::Tags => self.tags = Some(list(path, value)?.into_iter().collect()),
            MetadataField::Priority => self.priority = parse_optional(path, &text(path, value)?)?,
            MetadataField::Status => self.status = parse_optional(path, &text(path, value)?)?,
            MetadataField::Version => self.version = parse_count(field, &text(path, value)?)?,
            MetadataField::Dependencies => self.dependencies = Some(list(path, value)?),
            MetadataField::Notes => self.notes = Some(text(path, value)?),
            MetadataField::Template => self.template = text(path, value)?,
            MetadataField::Inputs => self.inputs = list(path, value)?,
            MetadataField::Context => self.context = text(path, value)?,
            MetadataField::TokenLimit => {
                self.token_limit = parse_count(field, &text(path, value)?)?
            }
            MetadataField::Temperature => {
                self.temperature = parse_float(field, &text(path, value)?)?
            }
            MetadataField::TopP => self.top_p = parse_float(field, &text(path, value)?)?,
            MetadataField::FrequencyPenalty => {
                self.frequency_penalty = parse_float(field, &text(path, value)?)?
            }
            MetadataField::PresencePenalty => {
                self.presence_penalty = parse_float(field, &text(path, value)?)?
            }
            MetadataField::Model => self.model = text(path, value)?,
            MetadataField::AdditionalInput => self.additional_input = Some(text(path, value)?),
        }
        Ok(())
    }
}

impl EditBuffer {
    /// Seed a buffer from `node`, substituting defaults for absent fields.
    /// With no node every field takes its default.
    pub fn seed(node: Option<&Node>, defaults: &BufferDefaults, now: DateTime<Utc>) -> Self {
        let data = node.map(|n| n.data.clone()).unwrap_or_default();
        Self {
            label: data.label,
            content: data.content.unwrap_or_default(),
            selected_sources: data.selected_sources.unwrap_or_default(),
            metadata: MetadataDraft::seed(data.metadata.unwrap_or_default(), defaults, now),
        }
    }

    /// Apply a single field edit. On error the buffer is left unchanged.
    pub fn set(&mut self, path: FieldPath, value: FieldValue) -> Result<(), EditError> {
        match path {
            FieldPath::Label => self.label = text(path, value)?,
            FieldPath::Content => self.content = text(path, value)?,
            FieldPath::SelectedSources => self.selected_sources = list(path, value)?,
            FieldPath::Metadata(field) => self.metadata.set(field, value)?,
        }
        Ok(())
    }

    /// Insert or replace one entry of `metadata.customFields`.
    pub fn set_custom_field(&mut self, key: impl Into<String>, value: Value) {
        self.metadata
            .custom_fields
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
    }

    pub fn remove_custom_field(&mut self, key: &str) -> Option<Value> {
        self.metadata.custom_fields.as_mut()?.remove(key)
    }

    /// Patch carrying every buffer field, with `lastModified` set to `stamp`.
    pub fn to_patch(&self, stamp: DateTime<Utc>) -> NodeDataPatch {
        let mut metadata = self.metadata.to_metadata();
        metadata.last_modified = Some(stamp);
        NodeDataPatch {
            label: Some(self.label.clone()),
            content: Some(self.content.clone()),
            selected_sources: Some(self.selected_sources.clone()),
            metadata: Some(metadata),
        }
    }
}

// ---------------------------------------------------------------------------
// Value conversion
// ---------------------------------------------------------------------------

fn text(field: FieldPath, value: FieldValue) -> Result<String, EditError> {
    match value {
        FieldValue::Text(s) => Ok(s),
        FieldValue::List(_) => Err(EditError::TypeMismatch {
            field,
            expected: "text",
        }),
    }
}

fn list(field: FieldPath, value: FieldValue) -> Result<Vec<String>, EditError> {
    match value {
        FieldValue::List(items) => Ok(items),
        FieldValue::Text(_) => Err(EditError::TypeMismatch {
            field,
            expected: "a list",
        }),
    }
}

fn timestamp(field: FieldPath, input: &str) -> Result<DateTime<Utc>, EditError> {
    parse_timestamp(input).map_err(|_| EditError::InvalidValue {
            field,
            input: input.to_string(),
        })
}

/// Empty input clears the field.
fn parse_optional<T: std::str::FromStr>(
    field: FieldPath,
    input: &str,
) -> Result<Option<T>, EditError> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    input
        .parse()
        .map(Some)
        .map_err(|_| EditError::InvalidValue {
            field,
            input: input.to_string(),
        })
}

fn parse_count(field: MetadataField, input: &str) -> Result<u32, EditError> {
    input
        .trim()
        .parse()
        .map_err(|_| EditError::InvalidNumber {
            field,
            input: input.to_string(),
        })
}

/// NaN and infinities are rejected along with non-numeric text.
fn parse_float(field: MetadataField, input: &str) -> Result<f64, EditError> {
    input
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| EditError::InvalidNumber {
            field,
            input: input.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use nodeweave_core::{NodeData, Position};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn node_with(metadata: Option<NodeMetadata>) -> Node {
        Node {
            id: "n1".to_string(),
            node_type: "llm".to_string(),
            position: Position::default(),
            data: NodeData {
                label: "Summarize".to_string(),
                metadata,
                ..Default::default()
            },
        }
    }

    #[test]
    fn seed_without_node_uses_every_default() {
        let buffer = EditBuffer::seed(None, &BufferDefaults::default(), now());
        assert_eq!(buffer.label, "");
        assert_eq!(buffer.content, "");
        assert!(buffer.selected_sources.is_empty());
        assert_eq!(buffer.metadata.created, now());
        assert_eq!(buffer.metadata.last_modified, now());
        assert_eq!(buffer.metadata.model, "gpt-4");
    }

    #[test]
    fn empty_metadata_takes_defaults() {
        let node = node_with(Some(NodeMetadata::default()));
        let meta = EditBuffer::seed(Some(&node), &BufferDefaults::default(), now()).metadata;

        assert_eq!(meta.created, now());
        assert_eq!(meta.last_modified, now());
        assert_eq!(meta.template, "");
        assert!(meta.inputs.is_empty());
        assert_eq!(meta.context, "");
        assert_eq!(meta.token_limit, 2000);
        assert_eq!(meta.temperature, 0.7);
        assert_eq!(meta.top_p, 1.0);
        assert_eq!(meta.frequency_penalty, 0.0);
        assert_eq!(meta.presence_penalty, 0.0);
        assert_eq!(meta.model, "gpt-4");
        assert_eq!(meta.version, 1);
    }

    #[test]
    fn present_zero_values_are_kept() {
        let node = node_with(Some(NodeMetadata {
            temperature: Some(0.0),
            token_limit: Some(0),
            model: Some(String::new()),
            ..Default::default()
        }));
        let meta = EditBuffer::seed(Some(&node), &BufferDefaults::default(), now()).metadata;
        assert_eq!(meta.temperature, 0.0);
        assert_eq!(meta.token_limit, 0);
        assert_eq!(meta.model, "");
    }

    #[test]
    fn seeding_is_idempotent() {
        let node = node_with(Some(NodeMetadata {
            notes: Some("x".to_string()),
            top_p: Some(0.5),
            ..Default::default()
        }));
        let first = EditBuffer::seed(Some(&node), &BufferDefaults::default(), now());

        let mut reseeded_node = node.clone();
        reseeded_node.data.metadata = Some(first.metadata.to_metadata());
        let later = now() + chrono::Duration::hours(1);
        let second = EditBuffer::seed(Some(&reseeded_node), &BufferDefaults::default(), later);

        assert_eq!(first, second);
    }

    #[test]
    fn to_patch_overwrites_last_modified_only() {
        let mut buffer = EditBuffer::seed(None, &BufferDefaults::default(), now());
        buffer.metadata.notes = Some("kept".to_string());
        let stamp = now() + chrono::Duration::minutes(5);

        let patch = buffer.to_patch(stamp);
        let meta = patch.metadata.unwrap();
        assert_eq!(meta.last_modified, Some(stamp));
        assert_eq!(meta.created, Some(now()));
        assert_eq!(meta.notes.as_deref(), Some("kept"));
        assert_eq!(meta.version, Some(1));
    }

    #[test]
    fn set_parses_typed_fields() {
        let mut buffer = EditBuffer::seed(None, &BufferDefaults::default(), now());
        buffer
            .set(FieldPath::Metadata(MetadataField::Temperature), " 0.25 ".into())
            .unwrap();
        buffer
            .set(FieldPath::Metadata(MetadataField::TokenLimit), "4096".into())
            .unwrap();
        buffer
            .set(FieldPath::Metadata(MetadataField::Status), "completed".into())
            .unwrap();
        buffer
            .set(
                FieldPath::Metadata(MetadataField::Tags),
                vec!["b".to_string(), "a".to_string(), "b".to_string()].into(),
            )
            .unwrap();

        assert_eq!(buffer.metadata.temperature, 0.25);
        assert_eq!(buffer.metadata.token_limit, 4096);
        assert_eq!(buffer.metadata.status, Some(Status::Completed));
        let tags: Vec<&str> = buffer
            .metadata
            .tags
            .as_ref()
            .unwrap()
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(tags, vec!["a", "b"]);

        buffer
            .set(FieldPath::Metadata(MetadataField::Status), "".into())
            .unwrap();
        assert_eq!(buffer.metadata.status, None);
    }

    #[test]
    fn custom_fields_are_edited_by_key() {
        let node = node_with(Some(NodeMetadata {
            custom_fields: Some(HashMap::from([("owner".to_string(), json!("ops"))])),
            ..Default::default()
        }));
        let mut buffer = EditBuffer::seed(Some(&node), &BufferDefaults::default(), now());

        buffer.set_custom_field("retries", json!(3));
        assert_eq!(buffer.remove_custom_field("owner"), Some(json!("ops")));
        assert_eq!(buffer.remove_custom_field("owner"), None);

        let fields = buffer.to_patch(now()).metadata.unwrap().custom_fields.unwrap();
        assert_eq!(fields, HashMap::from([("retries".to_string(), json!(3))]));
    }

    #[test]
    fn date_only_timestamp_is_accepted() {
        let mut buffer = EditBuffer::seed(None, &BufferDefaults::default(), now());
        buffer
            .set(FieldPath::Metadata(MetadataField::Created), "2024-01-02".into())
            .unwrap();
        assert_eq!(
            buffer.metadata.created,
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn invalid_input_leaves_field_unchanged() {
        let mut buffer = EditBuffer::seed(None, &BufferDefaults::default(), now());

        for bad in ["abc", "NaN", "inf", ""] {
            let err = buffer
                .set(FieldPath::Metadata(MetadataField::TopP), bad.into())
                .unwrap_err();
            assert!(matches!(err, EditError::InvalidNumber { field: MetadataField::TopP, .. }));
        }
        assert_eq!(buffer.metadata.top_p, 1.0);

        let err = buffer
            .set(FieldPath::Metadata(MetadataField::TokenLimit), "-5".into())
            .unwrap_err();
        assert!(matches!(err, EditError::InvalidNumber { .. }));

        let err = buffer
            .set(FieldPath::Metadata(MetadataField::Created), "yesterday".into())
            .unwrap_err();
        assert!(matches!(err, EditError::InvalidValue { .. }));

        let err = buffer
            .set(FieldPath::Label, vec!["x".to_string()].into())
            .unwrap_err();
        assert!(matches!(err, EditError::TypeMismatch { expected: "text", .. }));
    }
}
