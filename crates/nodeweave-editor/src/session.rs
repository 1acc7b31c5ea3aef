use chrono::{DateTime, Utc};
use nodeweave_core::{DataSource, Node, NodeDataPatch};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::{
    BufferDefaults, EditBuffer, EditError, FieldPath, FieldValue, MetadataField,
    NumericInputPolicy, SourceNode,
};

/// How the editor dialog lays out its controls. Presentation only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub enum ViewMode {
    #[default]
    Standard,
    /// Distraction-free view showing only input, sources and output.
    Focused,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Standard => ViewMode::Focused,
            ViewMode::Focused => ViewMode::Standard,
        }
    }
}

/// Panel selected in the data-source section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub enum DataSourceTab {
    #[default]
    Web,
    File,
    Api,
    Database,
}

impl DataSourceTab {
    pub const ALL: [DataSourceTab; 4] = [
        DataSourceTab::Web,
        DataSourceTab::File,
        DataSourceTab::Api,
        DataSourceTab::Database,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            DataSourceTab::Web => "Web",
            DataSourceTab::File => "File",
            DataSourceTab::Api => "API",
            DataSourceTab::Database => "Database",
        }
    }

    /// Panel that edits `source`, if it has one.
    pub fn for_source(source: &DataSource) -> Option<Self> {
        match source {
            DataSource::Url { .. } => Some(DataSourceTab::Web),
            DataSource::File { .. } => Some(DataSourceTab::File),
            DataSource::Api { .. } => Some(DataSourceTab::Api),
            DataSource::Database { .. } => Some(DataSourceTab::Database),
            DataSource::Manual { .. } | DataSource::None => None,
        }
    }
}

/// Read-only provenance summary for the settings menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub struct SystemInfo {
    pub created: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub version: u32,
}

impl SystemInfo {
    pub fn created_display(&self) -> String {
        format_stamp(self.created)
    }

    pub fn last_modified_display(&self) -> String {
        format_stamp(self.last_modified)
    }
}

fn format_stamp(stamp: Option<DateTime<Utc>>) -> String {
    match stamp {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "Not set".to_string(),
    }
}

/// One editing session over a single node (or none).
///
/// The target is fixed at seed time; editing a different node means seeding a
/// new session.
#[derive(Debug, Clone)]
pub struct EditSession {
    target: Option<Node>,
    buffer: EditBuffer,
    /// Raw text of numeric fields that failed to parse under the defer policy.
    pending: BTreeMap<MetadataField, String>,
    view_mode: ViewMode,
    data_source_tab: DataSourceTab,
}

impl EditSession {
    pub fn seed(target: Option<&Node>, defaults: &BufferDefaults, now: DateTime<Utc>) -> Self {
        let buffer = EditBuffer::seed(target, defaults, now);
        let data_source_tab = buffer
            .metadata
            .data_source
            .as_ref()
            .and_then(DataSourceTab::for_source)
            .unwrap_or_default();
        debug!(node_id = ?target.map(|n| n.id.as_str()), "Seeded edit buffer");
        Self {
            target: target.cloned(),
            buffer,
            pending: BTreeMap::new(),
            view_mode: ViewMode::default(),
            data_source_tab,
        }
    }

    pub fn target(&self) -> Option<&Node> {
        self.target.as_ref()
    }

    pub fn target_id(&self) -> Option<&str> {
        self.target.as_ref().map(|n| n.id.as_str())
    }

    pub fn buffer(&self) -> &EditBuffer {
        &self.buffer
    }

    /// Apply a field edit to the buffer.
    ///
    /// Non-numeric text for a numeric field is rejected under
    /// [`NumericInputPolicy::Reject`]. Under [`NumericInputPolicy::Defer`] the
    /// raw text is held as pending and the stored value is left alone; a later
    /// valid value clears it.
    pub fn set_field(
        &mut self,
        path: FieldPath,
        value: FieldValue,
        policy: NumericInputPolicy,
    ) -> Result<(), EditError> {
        match self.buffer.set(path, value) {
            Ok(()) => {
                if let FieldPath::Metadata(field) = path {
                    self.pending.remove(&field);
                }
                debug!(field = %path, "Edited buffer field");
                Ok(())
            }
            Err(EditError::InvalidNumber { field, input })
                if policy == NumericInputPolicy::Defer =>
            {
                warn!(field = %field, input = %input, "Deferring non-numeric input");
                self.pending.insert(field, input);
                Ok(())
            }
            Err(err) => {
                warn!(field = %path, "Rejected edit: {}", err);
                Err(err)
            }
        }
    }

    pub fn pending_input(&self, field: MetadataField) -> Option<&str> {
        self.pending.get(&field).map(String::as_str)
    }

    pub fn has_pending_input(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn is_source_selected(&self, id: &str) -> bool {
        self.buffer.selected_sources.iter().any(|s| s == id)
    }

    /// Adds or removes `id` from the selected sources. Returns whether it is
    /// selected afterwards.
    pub fn toggle_source(&mut self, id: &str) -> bool {
        if self.is_source_selected(id) {
            self.buffer.selected_sources.retain(|s| s != id);
            false
        } else {
            self.buffer.selected_sources.push(id.to_string());
            true
        }
    }

    /// Selected sources with display labels. Ids missing from `resolved`
    /// are shown by their raw id.
    pub fn selected_source_labels(&self, resolved: &[SourceNode]) -> Vec<SourceNode> {
        self.buffer
            .selected_sources
            .iter()
            .map(|id| SourceNode {
                id: id.clone(),
                label: resolved
                    .iter()
                    .find(|s| &s.id == id)
                    .map(|s| s.label.clone())
                    .unwrap_or_else(|| id.clone()),
            })
            .collect()
    }

    pub fn set_custom_field(&mut self, key: &str, value: Value) {
        debug!(key, "Set custom field");
        self.buffer.set_custom_field(key, value);
    }

    pub fn remove_custom_field(&mut self, key: &str) -> Option<Value> {
        self.buffer.remove_custom_field(key)
    }

    pub fn set_data_source(&mut self, source: DataSource) {
        if let Some(tab) = DataSourceTab::for_source(&source) {
            self.data_source_tab = tab;
        }
        debug!(kind = source.display_name(), "Set data source");
        self.buffer.metadata.data_source = Some(source);
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    pub fn toggle_view_mode(&mut self) -> ViewMode {
        self.view_mode = self.view_mode.toggled();
        self.view_mode
    }

    pub fn data_source_tab(&self) -> DataSourceTab {
        self.data_source_tab
    }

    pub fn select_data_source_tab(&mut self, tab: DataSourceTab) {
        self.data_source_tab = tab;
    }

    /// Stamps as stored on the canonical node, version as currently edited.
    pub fn system_info(&self) -> SystemInfo {
        let meta = self.target.as_ref().and_then(|n| n.data.metadata.as_ref());
        SystemInfo {
            created: meta.and_then(|m| m.created),
            last_modified: meta.and_then(|m| m.last_modified),
            version: self.buffer.metadata.version,
        }
    }

    /// Build the write for a commit at `now`: the target id and the patch to
    /// send.
    ///
    /// Returns `Ok(None)` when there is no target. The commit stamp never
    /// precedes the target's stored `lastModified`.
    pub(crate) fn prepare_commit(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<(String, NodeDataPatch)>, EditError> {
        let Some(target) = &self.target else {
            return Ok(None);
        };

        if let Some((field, input)) = self.pending.iter().next() {
            return Err(EditError::InvalidNumber {
                field: *field,
                input: input.clone(),
            });
        }

        let previous = target.data.metadata.as_ref().and_then(|m| m.last_modified);
        let stamp = previous.map_or(now, |p| p.max(now));
        Ok(Some((target.id.clone(), self.buffer.to_patch(stamp))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use nodeweave_core::{NodeData, NodeMetadata, Position};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn target() -> Node {
        Node {
            id: "n1".to_string(),
            node_type: "llm".to_string(),
            position: Position::default(),
            data: NodeData {
                label: "Summarize".to_string(),
                selected_sources: Some(vec!["a".to_string()]),
                metadata: Some(NodeMetadata {
                    data_source: Some(DataSource::Database {
                        engine: Default::default(),
                        conn_string: "postgres://localhost/db".to_string(),
                        query: "select 1".to_string(),
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
        }
    }

    fn session() -> EditSession {
        EditSession::seed(Some(&target()), &BufferDefaults::default(), now())
    }

    #[test]
    fn tab_follows_seeded_data_source() {
        assert_eq!(session().data_source_tab(), DataSourceTab::Database);
        let empty = EditSession::seed(None, &BufferDefaults::default(), now());
        assert_eq!(empty.data_source_tab(), DataSourceTab::Web);
    }

    #[test]
    fn presentation_state_does_not_touch_buffer() {
        let mut session = session();
        session
            .set_field(FieldPath::Label, "Edited".into(), NumericInputPolicy::Reject)
            .unwrap();
        let before = session.buffer().clone();

        assert_eq!(session.toggle_view_mode(), ViewMode::Focused);
        session.select_data_source_tab(DataSourceTab::Api);
        assert_eq!(session.toggle_view_mode(), ViewMode::Standard);
        session.set_view_mode(ViewMode::Focused);
        assert_eq!(session.view_mode(), ViewMode::Focused);

        assert_eq!(session.buffer(), &before);
        assert_eq!(session.data_source_tab(), DataSourceTab::Api);
    }

    #[test]
    fn toggle_source_uses_membership() {
        let mut session = session();
        assert!(session.is_source_selected("a"));
        assert!(!session.toggle_source("a"));
        assert!(!session.is_source_selected("a"));
        assert!(session.toggle_source("b"));
        assert_eq!(session.buffer().selected_sources, vec!["b".to_string()]);
    }

    #[test]
    fn selected_labels_fall_back_to_raw_id() {
        let mut session = session();
        session.toggle_source("stale");
        let resolved = vec![SourceNode {
            id: "a".to_string(),
            label: "Alpha".to_string(),
        }];

        let labels: Vec<(String, String)> = session
            .selected_source_labels(&resolved)
            .into_iter()
            .map(|s| (s.id, s.label))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("a".to_string(), "Alpha".to_string()),
                ("stale".to_string(), "stale".to_string()),
            ]
        );
    }

    #[test]
    fn set_data_source_moves_tab() {
        let mut session = session();
        session.set_data_source(DataSource::Url {
            url: "https://example.com".to_string(),
            selector: "#main".to_string(),
            format: Default::default(),
        });
        assert_eq!(session.data_source_tab(), DataSourceTab::Web);

        session.set_data_source(DataSource::Manual {
            input: "typed".to_string(),
        });
        assert_eq!(session.data_source_tab(), DataSourceTab::Web);
        assert!(matches!(
            session.buffer().metadata.data_source,
            Some(DataSource::Manual { .. })
        ));
    }

    #[test]
    fn deferred_number_blocks_commit_until_fixed() {
        let mut session = session();
        let temperature = FieldPath::Metadata(MetadataField::Temperature);

        session
            .set_field(temperature, "0.x".into(), NumericInputPolicy::Defer)
            .unwrap();
        assert_eq!(session.pending_input(MetadataField::Temperature), Some("0.x"));
        assert_eq!(session.buffer().metadata.temperature, 0.7);

        let err = session.prepare_commit(now()).unwrap_err();
        assert!(matches!(
            err,
            EditError::InvalidNumber { field: MetadataField::Temperature, ref input } if input == "0.x"
        ));

        session
            .set_field(temperature, "0.3".into(), NumericInputPolicy::Defer)
            .unwrap();
        assert!(!session.has_pending_input());
        assert!(session.prepare_commit(now()).unwrap().is_some());
    }

    #[test]
    fn rejected_number_is_reported_immediately() {
        let mut session = session();
        let err = session
            .set_field(
                FieldPath::Metadata(MetadataField::TokenLimit),
                "lots".into(),
                NumericInputPolicy::Reject,
            )
            .unwrap_err();
        assert!(matches!(err, EditError::InvalidNumber { .. }));
        assert!(!session.has_pending_input());
        assert_eq!(session.buffer().metadata.token_limit, 2000);
    }

    #[test]
    fn system_info_reports_unset_stamps() {
        let info = session().system_info();
        assert_eq!(info.created_display(), "Not set");
        assert_eq!(info.version, 1);

        let mut node = target();
        node.data.metadata = Some(NodeMetadata {
            created: Some(now()),
            ..Default::default()
        });
        let info = EditSession::seed(Some(&node), &BufferDefaults::default(), now()).system_info();
        assert_eq!(info.created_display(), "2025-03-01 12:00:00 UTC");
        assert_eq!(info.last_modified_display(), "Not set");
    }

    #[test]
    fn every_tab_has_a_display_name() {
        let names: Vec<&str> = DataSourceTab::ALL
            .iter()
            .map(DataSourceTab::display_name)
            .collect();
        assert_eq!(names, vec!["Web", "File", "API", "Database"]);
    }

    #[test]
    fn prepare_commit_stamps_patch_with_clamped_time() {
        let mut node = target();
        let stored = now() + chrono::Duration::hours(1);
        node.data.metadata.as_mut().unwrap().last_modified = Some(stored);
        let session = EditSession::seed(Some(&node), &BufferDefaults::default(), now());

        let (id, patch) = session.prepare_commit(now()).unwrap().unwrap();
        assert_eq!(id, "n1");
        assert_eq!(patch.metadata.unwrap().last_modified, Some(stored));
    }

    #[test]
    fn prepare_commit_without_target_is_none() {
        let session = EditSession::seed(None, &BufferDefaults::default(), now());
        assert!(session.prepare_commit(now()).unwrap().is_none());
    }
}
