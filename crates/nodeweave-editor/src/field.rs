use std::fmt;
use std::str::FromStr;

use crate::EditError;

/// Addressable metadata fields of the edit buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetadataField {
    Created,
    LastModified,
    Author,
    Tags,
    Priority,
    Status,
    Version,
    Dependencies,
    Notes,
    Template,
    Inputs,
    Context,
    TokenLimit,
    Temperature,
    TopP,
    FrequencyPenalty,
    PresencePenalty,
    Model,
    AdditionalInput,
}

impl MetadataField {
    pub const ALL: [MetadataField; 19] = [
        MetadataField::Created,
        MetadataField::LastModified,
        MetadataField::Author,
        MetadataField::Tags,
        MetadataField::Priority,
        MetadataField::Status,
        MetadataField::Version,
        MetadataField::Dependencies,
        MetadataField::Notes,
        MetadataField::Template,
        MetadataField::Inputs,
        MetadataField::Context,
        MetadataField::TokenLimit,
        MetadataField::Temperature,
        MetadataField::TopP,
        MetadataField::FrequencyPenalty,
        MetadataField::PresencePenalty,
        MetadataField::Model,
        MetadataField::AdditionalInput,
    ];

    /// Wire name, as it appears after `metadata.` in a field path.
    pub fn key(&self) -> &'static str {
        match self {
            MetadataField::Created => "created",
            MetadataField::LastModified => "lastModified",
            MetadataField::Author => "author",
            MetadataField::Tags => "tags",
            MetadataField::Priority => "priority",
            MetadataField::Status => "status",
            MetadataField::Version => "version",
            MetadataField::Dependencies => "dependencies",
            MetadataField::Notes => "notes",
            MetadataField::Template => "template",
            MetadataField::Inputs => "inputs",
            MetadataField::Context => "context",
            MetadataField::TokenLimit => "tokenLimit",
            MetadataField::Temperature => "temperature",
            MetadataField::TopP => "topP",
            MetadataField::FrequencyPenalty => "frequencyPenalty",
            MetadataField::PresencePenalty => "presencePenalty",
            MetadataField::Model => "model",
            MetadataField::AdditionalInput => "additionalInput",
        }
    }

    /// Fields whose text input is parsed as a number.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            MetadataField::Version
                | MetadataField::TokenLimit
                | MetadataField::Temperature
                | MetadataField::TopP
                | MetadataField::FrequencyPenalty
                | MetadataField::PresencePenalty
        )
    }

    /// Fields that hold a list of strings rather than text.
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            MetadataField::Tags | MetadataField::Dependencies | MetadataField::Inputs
        )
    }
}

/// Path to a single editable buffer field, e.g. `label` or `metadata.topP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldPath {
    Label,
    Content,
    SelectedSources,
    Metadata(MetadataField),
}

impl FieldPath {
    pub fn is_list(&self) -> bool {
        match self {
            FieldPath::SelectedSources => true,
            FieldPath::Metadata(field) => field.is_list(),
            FieldPath::Label | FieldPath::Content => false,
        }
    }
}

impl FromStr for FieldPath {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "label" => Ok(FieldPath::Label),
            "content" => Ok(FieldPath::Content),
            "selectedSources" => Ok(FieldPath::SelectedSources),
            _ => s
                .strip_prefix("metadata.")
                .and_then(|key| MetadataField::ALL.into_iter().find(|f| f.key() == key))
                .map(FieldPath::Metadata)
                .ok_or_else(|| EditError::UnknownField(s.to_string())),
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "metadata.{}", self.key())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPath::Label => f.write_str("label"),
            FieldPath::Content => f.write_str("content"),
            FieldPath::SelectedSources => f.write_str("selectedSources"),
            FieldPath::Metadata(field) => write!(f, "{field}"),
        }
    }
}

/// A value coming from a form control: raw text or a multi-select list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

impl From<&[&str]> for FieldValue {
    fn from(value: &[&str]) -> Self {
        FieldValue::List(value.iter().map(|s| s.to_string()).collect())
    }
}
