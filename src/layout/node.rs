//! Layout nodes: mark bits, kind payloads, per-node layout state.

use smallvec::SmallVec;

use crate::geometry::{EdgeOffsets, Point, Size, Transform};
use crate::layout::text::ShapedText;
use crate::style::rule::{PseudoState, RuleId};
use crate::value::{Align, Color, Dimension};

/// Stable handle to a node inside its owning [`LayoutTree`](crate::layout::tree::LayoutTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
  pub(crate) fn index(self) -> usize {
    self.0 as usize
  }
}

/// Mark bits recording what work a node still needs.
///
/// The two recursive bits are inherited by descendants at traversal time via
/// bitwise OR; they are never re-marked onto each descendant individually.
pub mod mark {
  /// The node's width may have changed
  pub const SIZE_WIDTH: u32 = 1 << 0;
  /// The node's height may have changed
  pub const SIZE_HEIGHT: u32 = 1 << 1;
  /// Children must be re-typeset / repositioned
  pub const TYPESETTING: u32 = 1 << 2;
  /// Scroll offset changed
  pub const SCROLL: u32 = 1 << 3;

  /// Final transform must be recomputed (recursive)
  pub const R_TRANSFORM: u32 = 1 << 30;
  /// Visible-region test must be redone (recursive)
  pub const R_VISIBLE_REGION: u32 = 1 << 31;

  /// All recursive bits
  pub const RECURSIVE: u32 = R_TRANSFORM | R_VISIBLE_REGION;
  /// Bits that keep a node on the layout schedule
  pub const LAYOUT: u32 = SIZE_WIDTH | SIZE_HEIGHT | TYPESETTING | SCROLL;
  /// Both size bits
  pub const SIZE: u32 = SIZE_WIDTH | SIZE_HEIGHT;
}

/// Kinds a parent is told about when a child's layout-relevant state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildChange {
  Size,
  Visible,
  Align,
  Text,
}

/// Direction of a flow container's main axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowDirection {
  #[default]
  Column,
  Row,
}

/// Kind-specific state for flow containers.
#[derive(Debug, Clone, Default)]
pub struct FlowState {
  pub direction: FlowDirection,
  /// Gap between consecutive children along the main axis
  pub gap: f32,
}

/// Kind-specific state for text nodes.
#[derive(Debug, Clone, Default)]
pub struct TextState {
  pub text: String,
  pub font_size: f32,
  /// Result of the last successful shaping call
  pub shaped: Option<ShapedText>,
  /// Width the text was last shaped against
  pub shaped_for_width: Option<f32>,
}

/// Kind-specific state for image nodes.
#[derive(Debug, Clone, Default)]
pub struct ImageState {
  /// Natural (decoded) size reported by the image collaborator
  pub natural: Size,
}

/// Kind-specific state for scroll containers.
#[derive(Debug, Clone, Default)]
pub struct ScrollState {
  /// Current scroll offset, clamped to the content extent during reverse
  pub offset: Point,
  /// Aggregated extent of the scrolled content
  pub content_extent: Size,
}

/// Closed set of node kinds, each carrying its own state.
///
/// Dispatch over kinds happens at exactly three points: the forward pass,
/// the reverse pass, and the text-layout hook.
#[derive(Debug, Clone)]
pub enum NodeKind {
  /// Plain container positioning children by their alignment
  Boxed,
  /// Stacking container (column or row)
  Flow(FlowState),
  /// Text run shaped by the external collaborator
  Text(TextState),
  /// Image with natural-size based sizing
  Image(ImageState),
  /// Scrollable viewport over its content
  Scroll(ScrollState),
}

/// Authored style inputs consumed by the layout passes.
#[derive(Debug, Clone, Default)]
pub struct NodeStyle {
  pub width: Dimension,
  pub height: Dimension,
  pub margin: EdgeOffsets,
  pub padding: EdgeOffsets,
  pub align: Align,
  pub background: Color,
}

/// One element of the retained layout tree.
#[derive(Debug)]
pub struct LayoutNode {
  pub kind: NodeKind,
  pub style: NodeStyle,

  /// Pending mark bits; see [`mark`]
  pub mark: u32,
  /// Depth from the root of the active tree, 0 when detached or invisible
  pub level: u32,
  /// Slot in the scheduler's level bucket, -1 when unscheduled
  pub dirty_index: i32,

  pub parent: Option<NodeId>,
  pub prev: Option<NodeId>,
  pub next: Option<NodeId>,
  pub first: Option<NodeId>,
  pub last: Option<NodeId>,

  pub opacity: f32,
  pub visible: bool,
  pub receives_input: bool,

  /// Class tokens in declaration order, deduped
  pub classes: Vec<String>,
  /// Current interaction state for pseudo matching
  pub pseudo_state: PseudoState,
  /// Hash of the last matched rule set; styles re-apply only when it changes
  pub matched_hash: u64,
  /// Matched rules with descendant steps, the scopes this node contributes
  /// to its children's matching
  pub scope_rules: SmallVec<[RuleId; 2]>,
  /// True until the first style application; first application never animates
  pub first_style_apply: bool,

  /// Final outer size: margin + padding + content
  pub layout_size: Size,
  /// Final content box size
  pub content_size: Size,
  /// Whether each axis is content-determined
  pub wrap_x: bool,
  pub wrap_y: bool,
  /// Margin-box origin inside the parent's content box
  pub offset: Point,
  /// Final transform mapping the border-box origin to root coordinates
  pub transform: Transform,
  /// Whether the node intersects the viewport
  pub visible_region: bool,
}

impl LayoutNode {
  pub(crate) fn new(kind: NodeKind) -> Self {
    Self {
      kind,
      style: NodeStyle::default(),
      mark: 0,
      level: 0,
      dirty_index: -1,
      parent: None,
      prev: None,
      next: None,
      first: None,
      last: None,
      opacity: 1.0,
      visible: true,
      receives_input: false,
      classes: Vec::new(),
      pseudo_state: PseudoState::Normal,
      matched_hash: 0,
      scope_rules: SmallVec::new(),
      first_style_apply: true,
      layout_size: Size::ZERO,
      content_size: Size::ZERO,
      wrap_x: false,
      wrap_y: false,
      offset: Point::ZERO,
      transform: Transform::IDENTITY,
      visible_region: false,
    }
  }

  /// Whether the node currently occupies a scheduler slot
  pub fn is_scheduled(&self) -> bool {
    self.dirty_index >= 0
  }

  /// Border-box size: outer size minus margins
  pub fn border_size(&self) -> Size {
    Size::new(
      (self.layout_size.width - self.style.margin.horizontal()).max(0.0),
      (self.layout_size.height - self.style.margin.vertical()).max(0.0),
    )
  }

  /// Offset of children's coordinate space inside this node's border box.
  ///
  /// Scroll containers shift their content by the negated scroll offset.
  pub fn offset_inside(&self) -> Point {
    let base = Point::new(self.style.padding.left, self.style.padding.top);
    match &self.kind {
      NodeKind::Scroll(scroll) => Point::new(base.x - scroll.offset.x, base.y - scroll.offset.y),
      _ => base,
    }
  }
}
