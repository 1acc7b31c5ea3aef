mod metadata;
pub mod store;
mod workflow;

pub use metadata::*;
pub use store::{NodeActions, NodeDataPatch, NodeRepository, StoreError};
pub use workflow::*;
