//! Edit-session model for a single workflow node.
//!
//! A [`NodeEditor`] seeds an [`EditBuffer`] from the canonical node, applies
//! local field edits, and on commit merges the buffer back into the
//! repository. [`resolve_sources`] derives the node's upstream connections.

mod buffer;
mod editor;
mod error;
mod field;
mod resolver;
mod session;
mod settings;

pub use buffer::{EditBuffer, MetadataDraft};
pub use editor::{ActionOutcome, NodeAction, NodeEditor};
pub use error::EditError;
pub use field::{FieldPath, FieldValue, MetadataField};
pub use resolver::{SourceNode, fallback_label, resolve_sources};
pub use session::{DataSourceTab, EditSession, SystemInfo, ViewMode};
pub use settings::{
    BufferDefaults, Clock, EditorSettings, KNOWN_MODELS, NumericInputPolicy, SystemClock,
};
