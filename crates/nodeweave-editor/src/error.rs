use nodeweave_core::StoreError;
use thiserror::Error;

use crate::{FieldPath, MetadataField};

#[derive(Debug, Error)]
pub enum EditError {
    #[error("No node is open for editing")]
    NotEditing,

    #[error("Unknown field path: {0}")]
    UnknownField(String),

    #[error("Field {field} expects {expected}")]
    TypeMismatch {
        field: FieldPath,
        expected: &'static str,
    },

    #[error("Field {field} expects a number, got {input:?}")]
    InvalidNumber { field: MetadataField, input: String },

    #[error("Invalid value for {field}: {input:?}")]
    InvalidValue { field: FieldPath, input: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
