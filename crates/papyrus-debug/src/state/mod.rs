//! Runtime state tree module map.
//! - ids: handle allocation
//! - path: stable node names
//! - nodes: node snapshots + protocol views
//! - sources: project source overrides + source descriptors
//! - tree: path/handle resolution against the live VM

#![allow(missing_docs)]

mod ids;
mod nodes;
mod path;
mod sources;
mod tree;

pub use ids::IdProvider;
pub use nodes::{
    render_value, value_type, ScopeView, StackFrameView, StateNode, ThreadView, VariableView,
};
pub use path::{Member, NodeKind, NodePath, ScopeKind};
pub use sources::{source_script_name, SourceCatalog};
pub use tree::{NodeList, RuntimeState};
