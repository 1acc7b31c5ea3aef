use chrono::{DateTime, Utc};
use nodeweave_core::Position;
use serde::{Deserialize, Serialize};

/// Models offered by the model selector as `(id, display name)`.
/// Any other model string is still accepted.
pub const KNOWN_MODELS: &[(&str, &str)] = &[
    ("gpt-4", "GPT-4"),
    ("gpt-3.5-turbo", "GPT-3.5 Turbo"),
    ("claude-2", "Claude 2"),
    ("claude-3", "Claude 3"),
];

/// Values substituted for model-configuration fields the node leaves unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BufferDefaults {
    pub token_limit: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub model: String,
    pub version: u32,
}

impl Default for BufferDefaults {
    fn default() -> Self {
        Self {
            token_limit: 2000,
            temperature: 0.7,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            model: "gpt-4".to_string(),
            version: 1,
        }
    }
}

/// What happens when a numeric field receives text that is not a number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericInputPolicy {
    /// Refuse the edit; the field keeps its previous value.
    #[default]
    Reject,
    /// Keep the raw text as pending and refuse to commit until it is fixed.
    Defer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorSettings {
    pub defaults: BufferDefaults,
    pub numeric_input: NumericInputPolicy,
    pub duplicate_offset: Position,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            defaults: BufferDefaults::default(),
            numeric_input: NumericInputPolicy::default(),
            duplicate_offset: Position { x: 40.0, y: 40.0 },
        }
    }
}

impl EditorSettings {
    /// Parse settings from JSON. Missing keys fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Source of commit and seed timestamps.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let settings =
            EditorSettings::from_json(r#"{ "numericInput": "defer", "defaults": { "model": "claude-3" } }"#)
                .unwrap();
        assert_eq!(settings.numeric_input, NumericInputPolicy::Defer);
        assert_eq!(settings.defaults.model, "claude-3");
        assert_eq!(settings.defaults.token_limit, 2000);
        assert_eq!(settings.duplicate_offset, Position { x: 40.0, y: 40.0 });
    }

    #[test]
    fn empty_json_is_default() {
        assert_eq!(EditorSettings::from_json("{}").unwrap(), EditorSettings::default());
    }

    #[test]
    fn default_model_is_known() {
        let model = BufferDefaults::default().model;
        assert!(KNOWN_MODELS.iter().any(|(id, _)| *id == model));
    }
}
