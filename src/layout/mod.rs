//! The retained layout tree and its two-pass sizing protocol.

pub mod node;
pub mod passes;
pub mod text;
pub mod tree;

pub use node::{
  ChildChange, FlowDirection, FlowState, ImageState, LayoutNode, NodeId, NodeKind, NodeStyle,
  ScrollState, TextState,
};
pub use text::{CollaboratorEvent, NullShaper, ShapedLine, ShapedText, TextConfig, TextShaper};
pub use tree::LayoutTree;
