//! Style rule nodes.
//!
//! Rules form a prefix tree keyed by class-key hash. A selector expression
//! like `.a.b .c:hover` becomes a chain: the root rule owns a child keyed by
//! `.a.b`, which owns a child keyed by `.c`, which owns a hover pseudo slot.
//! Rules are stored in an arena owned by [`RuleTree`](super::RuleTree) and
//! addressed by [`RuleId`]; the map values in `children` are arena indices,
//! never owning pointers.

use rustc_hash::FxHashMap;

use crate::style::apply::PropertyId;
use crate::style::class_key::ClassKey;
use crate::value::PropertyValue;

/// Interaction state selecting an alternate rule sub-tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PseudoState {
  #[default]
  None,
  Normal,
  Hover,
  Active,
}

impl PseudoState {
  /// Index into a rule's pseudo slots, `None` for the base state.
  pub fn slot(self) -> Option<usize> {
    match self {
      PseudoState::None => None,
      PseudoState::Normal => Some(0),
      PseudoState::Hover => Some(1),
      PseudoState::Active => Some(2),
    }
  }
}

/// Stable handle to a rule inside its owning [`RuleTree`](super::RuleTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(pub(crate) u32);

impl RuleId {
  /// The root rule of every tree.
  pub const ROOT: RuleId = RuleId(0);

  pub(crate) fn index(self) -> usize {
    self.0 as usize
  }
}

/// One node of the style rule prefix tree.
#[derive(Debug)]
pub struct StyleRule {
  pub(crate) key: ClassKey,
  /// Pseudo context of this rule. Inherited from the parent at creation, so
  /// every descendant of a `:hover` rule is itself a hover rule; this is
  /// what makes nested pseudo requests rejectable with a local check.
  pub(crate) pseudo: PseudoState,
  /// Non-pseudo continuations (descendant steps), keyed by class-key hash
  pub(crate) children: FxHashMap<u32, RuleId>,
  /// Pseudo slots: normal / hover / active
  pub(crate) pseudo_children: [Option<RuleId>; 3],
  /// True once any pseudo slot exists; matching only descends when set
  pub(crate) has_pseudo: bool,
  /// Declared properties in first-set order
  pub(crate) properties: Vec<(PropertyId, PropertyValue)>,
  /// Transition duration applied when this rule's match state changes
  pub(crate) transition_ms: u32,
}

impl StyleRule {
  pub(crate) fn new(key: ClassKey, pseudo: PseudoState) -> Self {
    Self {
      key,
      pseudo,
      children: FxHashMap::default(),
      pseudo_children: [None; 3],
      has_pseudo: false,
      properties: Vec::new(),
      transition_ms: 0,
    }
  }

  /// Canonical key text, e.g. `.a.b`
  pub fn key_text(&self) -> &str {
    self.key.text()
  }

  /// The pseudo context of this rule
  pub fn pseudo(&self) -> PseudoState {
    self.pseudo
  }

  /// Whether any descendant steps hang off this rule
  pub fn has_children(&self) -> bool {
    !self.children.is_empty()
  }

  /// Number of declared properties
  pub fn property_count(&self) -> usize {
    self.properties.len()
  }

  /// Sets a property, replacing an earlier declaration in place so the
  /// first-set order is preserved.
  pub fn set_property(&mut self, id: PropertyId, value: PropertyValue) {
    if let Some(entry) = self.properties.iter_mut().find(|(k, _)| *k == id) {
      entry.1 = value;
    } else {
      self.properties.push((id, value));
    }
  }

  /// Returns the declared value for `id`, if any
  pub fn property(&self, id: PropertyId) -> Option<&PropertyValue> {
    self
      .properties
      .iter()
      .find(|(k, _)| *k == id)
      .map(|(_, v)| v)
  }

  /// Transition duration in milliseconds; 0 applies immediately
  pub fn transition_ms(&self) -> u32 {
    self.transition_ms
  }

  /// Sets the transition duration for this rule's properties
  pub fn set_transition_ms(&mut self, ms: u32) {
    self.transition_ms = ms;
  }
}
