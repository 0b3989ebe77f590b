//! reflow: an incremental, mark-based layout engine with class-driven
//! cascading styles.
//!
//! The engine retains a tree of layout nodes and recomputes only what a
//! mutation invalidated. Mutations set mark bits on nodes; a per-level
//! scheduler sweeps the marked nodes each frame in two passes (forward for
//! sizing, reverse for typesetting) until the tree reaches a fixed point.
//! Styles are plain class selectors with optional descendant steps and one
//! interaction pseudo per step, matched through a bounded query-group
//! algorithm instead of a rule-tree walk.
//!
//! Text shaping and image decoding are external collaborators behind
//! traits; the engine owns geometry and nothing else.
//!
//! ```
//! use reflow::{Dimension, Engine, NodeKind, NullShaper, PropertyId, PropertyValue, Size};
//!
//! let engine = Engine::new(Size::new(800.0, 600.0));
//! let root = engine.create_node(NodeKind::Boxed);
//! engine.set_property(root, PropertyId::Width, PropertyValue::Dimension(Dimension::Percent(1.0)));
//! engine.set_property(root, PropertyId::Height, PropertyValue::Dimension(Dimension::Fixed(100.0)));
//! engine.set_root(root);
//!
//! let frame = engine.solve_frame(0, &mut NullShaper).unwrap();
//! assert_eq!(frame.nodes[0].size, Size::new(800.0, 100.0));
//! ```

pub mod engine;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod scheduler;
pub mod style;
pub mod value;

pub use engine::{Engine, EngineState, FrameSnapshot, LayoutInfo, PaintNode};
pub use error::{Error, Result, SelectorError, ShapeError};
pub use geometry::{EdgeOffsets, Point, Rect, Size, Transform};
pub use layout::{
  CollaboratorEvent, FlowDirection, LayoutTree, NodeId, NodeKind, NullShaper, ShapedLine,
  ShapedText, TextConfig, TextShaper,
};
pub use scheduler::{Scheduler, TaskId};
pub use style::{ClassKey, PropertyId, PseudoState, RuleId, RuleTree};
pub use value::{Align, Color, Dimension, PropertyValue};
