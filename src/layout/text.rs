//! The text shaping seam.
//!
//! The engine has no notion of glyphs or fonts. A text-bearing node invokes
//! the [`TextShaper`] collaborator during its own reverse pass, and only
//! calls back into the engine to report its final (possibly wrapped) size.
//! A shaper failure is surfaced as an event and the node keeps its previous
//! size, so the fixed-point loop still converges.

use crate::error::ShapeError;
use crate::geometry::Size;
use crate::layout::node::NodeId;

/// Configuration for one shaping call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextConfig {
  /// Width the text may occupy; `None` for a single unconstrained line
  pub max_width: Option<f32>,
  pub font_size: f32,
}

/// One shaped line: byte range into the source text plus its size.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedLine {
  pub start: usize,
  pub end: usize,
  pub size: Size,
}

/// The result of shaping a text run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShapedText {
  pub lines: Vec<ShapedLine>,
  /// Tight bounding size over all lines
  pub size: Size,
}

/// External text shaping collaborator.
pub trait TextShaper {
  fn shape(&mut self, text: &str, config: &TextConfig) -> Result<ShapedText, ShapeError>;
}

/// A shaper that refuses everything; useful when a tree contains no text.
pub struct NullShaper;

impl TextShaper for NullShaper {
  fn shape(&mut self, _text: &str, _config: &TextConfig) -> Result<ShapedText, ShapeError> {
    Err(ShapeError::NoFont)
  }
}

/// Collaborator failures reported asynchronously to the engine owner.
///
/// These never abort the scheduler; the affected node degrades (keeps its
/// previous size, skips painting) and layout continues.
#[derive(Debug, Clone, PartialEq)]
pub enum CollaboratorEvent {
  ShapeFailed { node: NodeId, error: ShapeError },
}
