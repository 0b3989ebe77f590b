//! Error types for the layout and style engines.
//!
//! Three families of failure exist and they are handled very differently:
//!
//! - Selector syntax errors are non-fatal diagnostics. The offending
//!   alternative contributes no rule and matches nothing; other alternatives
//!   in the same expression still register.
//! - Tree-invariant violations (a scheduled node missing from its bucket, a
//!   child-change notification from a detached node) indicate corruption that
//!   cannot be continued from. These fail fast via assertions and never
//!   appear as `Err` values.
//! - Collaborator failures (text shaping) are surfaced as events on the
//!   engine and degrade gracefully; they must never abort the scheduler's
//!   fixed-point loop.
//!
//! All errors use the `thiserror` crate for minimal boilerplate.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
  /// Selector expression parsing or registration error
  #[error("Selector error: {0}")]
  Selector(#[from] SelectorError),

  /// Text shaping collaborator error
  #[error("Shape error: {0}")]
  Shape(#[from] ShapeError),
}

/// Errors produced while parsing or registering a selector expression.
///
/// These are recoverable: the alternative that failed is skipped and the
/// rule tree is left exactly as it was before the alternative was seen.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
  /// A step did not start with `.`
  #[error("selector step {step:?} must start with '.'")]
  MissingDot { step: String },

  /// A step contained an empty class token (e.g. `..a`)
  #[error("selector step {step:?} contains an empty class token")]
  EmptyToken { step: String },

  /// The pseudo name after `:` was not `normal`, `hover` or `active`
  #[error("unknown pseudo name {name:?}")]
  UnknownPseudo { name: String },

  /// A pseudo state was requested under a rule that is itself a pseudo rule.
  ///
  /// Pseudo rules cannot own pseudo children, so `.a:hover .b` is fine but
  /// the pseudo slot of a pseudo rule is not expressible and the request is
  /// rejected without creating anything.
  #[error("pseudo state requested under pseudo rule {parent:?}")]
  NestedPseudo { parent: String },

  /// The expression contained no valid alternative at all
  #[error("selector expression {expr:?} is empty")]
  EmptyExpression { expr: String },
}

/// Errors reported by the text shaping collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
  /// No font was available for the requested configuration
  #[error("no font available for text shaping")]
  NoFont,

  /// The shaper rejected the input text
  #[error("text could not be shaped: {message}")]
  Unshapable { message: String },
}
