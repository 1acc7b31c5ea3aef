use nodeweave_core::{Node, NodeActions, NodeRepository};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    Clock, DataSourceTab, EditBuffer, EditError, EditSession, EditorSettings, FieldPath,
    FieldValue, SourceNode, SystemClock, ViewMode, resolve_sources,
};

/// Actions offered from the editor's settings menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAction {
    Export,
    Duplicate,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// Pretty-printed JSON of the edited node.
    Exported(String),
    /// Id of the new copy.
    Duplicated(String),
    Deleted(Node),
}

/// Owns at most one [`EditSession`] and mediates between it and the
/// repository.
///
/// The repository is read when a session is opened and written only by
/// [`NodeEditor::commit`].
pub struct NodeEditor<C = SystemClock> {
    settings: EditorSettings,
    clock: C,
    session: Option<EditSession>,
}

impl NodeEditor<SystemClock> {
    pub fn new(settings: EditorSettings) -> Self {
        Self::with_clock(settings, SystemClock)
    }
}

impl<C: Clock> NodeEditor<C> {
    pub fn with_clock(settings: EditorSettings, clock: C) -> Self {
        Self {
            settings,
            clock,
            session: None,
        }
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    /// Begin editing `node`, or re-seed if the target changed.
    ///
    /// Opening the node that is already being edited keeps the buffer.
    /// Opening any other node (or none) discards uncommitted edits.
    pub fn open(&mut self, node: Option<&Node>) {
        let incoming = node.map(|n| n.id.as_str());
        if let Some(session) = &self.session {
            if session.target_id() == incoming {
                return;
            }
            debug!(
                from = ?session.target_id(),
                to = ?incoming,
                "Retargeting editor, discarding uncommitted edits"
            );
        }
        self.session = Some(EditSession::seed(
            node,
            &self.settings.defaults,
            self.clock.now(),
        ));
    }

    /// Look up `id` in the repository and open it. Returns whether the node
    /// was found; an unknown id opens an empty session.
    pub fn open_from(&mut self, repo: &impl NodeRepository, id: &str) -> bool {
        let node = repo.get_node(id);
        if node.is_none() {
            warn!("Node {} not found, opening empty session", id);
        }
        self.open(node.as_ref());
        node.is_some()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut EditSession> {
        self.session.as_mut()
    }

    pub fn buffer(&self) -> Option<&EditBuffer> {
        self.session.as_ref().map(EditSession::buffer)
    }

    pub fn set_field(
        &mut self,
        path: FieldPath,
        value: impl Into<FieldValue>,
    ) -> Result<(), EditError> {
        let policy = self.settings.numeric_input;
        self.session
            .as_mut()
            .ok_or(EditError::NotEditing)?
            .set_field(path, value.into(), policy)
    }

    /// Like [`NodeEditor::set_field`] with a textual path such as
    /// `"metadata.temperature"`.
    pub fn set_field_at(
        &mut self,
        path: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), EditError> {
        let path: FieldPath = path.parse()?;
        self.set_field(path, value)
    }

    /// Insert or replace one entry of `metadata.customFields`.
    pub fn set_custom_field(&mut self, key: &str, value: Value) -> Result<(), EditError> {
        self.session
            .as_mut()
            .ok_or(EditError::NotEditing)?
            .set_custom_field(key, value);
        Ok(())
    }

    pub fn remove_custom_field(&mut self, key: &str) -> Result<Option<Value>, EditError> {
        Ok(self
            .session
            .as_mut()
            .ok_or(EditError::NotEditing)?
            .remove_custom_field(key))
    }

    pub fn toggle_view_mode(&mut self) -> Result<ViewMode, EditError> {
        Ok(self
            .session
            .as_mut()
            .ok_or(EditError::NotEditing)?
            .toggle_view_mode())
    }

    pub fn select_data_source_tab(&mut self, tab: DataSourceTab) -> Result<(), EditError> {
        self.session
            .as_mut()
            .ok_or(EditError::NotEditing)?
            .select_data_source_tab(tab);
        Ok(())
    }

    /// Merge the buffer into the target node and write it to `repo`.
    ///
    /// Returns the node as read back from `repo` after the write, or `None`
    /// when nothing was written because no session was open or the session
    /// had no target. The session is
    /// closed on success; on error it stays open with edits intact.
    pub fn commit(&mut self, repo: &mut impl NodeRepository) -> Result<Option<Node>, EditError> {
        let Some(session) = self.session.take() else {
            return Ok(None);
        };

        let prepared = match session.prepare_commit(self.clock.now()) {
            Ok(prepared) => prepared,
            Err(err) => {
                warn!("Commit refused: {}", err);
                self.session = Some(session);
                return Err(err);
            }
        };

        let Some((id, patch)) = prepared else {
            debug!("Commit without a target node, closing");
            return Ok(None);
        };

        if let Err(err) = repo.update_node(&id, patch) {
            warn!("Failed to commit node {}: {}", id, err);
            self.session = Some(session);
            return Err(err.into());
        }

        info!(node_id = %id, "Committed node edits");
        Ok(repo.get_node(&id))
    }

    /// Discard the session without touching the repository.
    pub fn cancel(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(node_id = ?session.target_id(), "Discarded edit session");
        }
    }

    pub fn close(&mut self) {
        self.cancel();
    }

    /// Upstream connections of the node being edited.
    pub fn resolved_sources(&self, repo: &impl NodeRepository) -> Vec<SourceNode> {
        let target = self.session.as_ref().and_then(EditSession::target_id);
        resolve_sources(&repo.list_edges(), &repo.list_nodes(), target)
    }

    /// Selected sources with labels for display.
    pub fn selected_sources(&self, repo: &impl NodeRepository) -> Vec<SourceNode> {
        match &self.session {
            Some(session) => session.selected_source_labels(&self.resolved_sources(repo)),
            None => Vec::new(),
        }
    }

    /// Run a settings-menu action against the edited node. Deleting the node
    /// closes the session.
    pub fn run_action(
        &mut self,
        action: NodeAction,
        repo: &mut impl NodeActions,
    ) -> Result<ActionOutcome, EditError> {
        let id = self
            .session
            .as_ref()
            .and_then(EditSession::target_id)
            .ok_or(EditError::NotEditing)?
            .to_string();

        let outcome = match action {
            NodeAction::Export => ActionOutcome::Exported(repo.export_node(&id)?),
            NodeAction::Duplicate => {
                let offset = self.settings.duplicate_offset;
                ActionOutcome::Duplicated(repo.duplicate_node(&id, offset)?)
            }
            NodeAction::Delete => {
                let node = repo.delete_node(&id)?;
                self.session = None;
                ActionOutcome::Deleted(node)
            }
        };
        info!(node_id = %id, ?action, "Ran node action");
        Ok(outcome)
    }
}
