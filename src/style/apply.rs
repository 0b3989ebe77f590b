//! Cascade application: the property accessor table and transitions.
//!
//! The rule tree never touches a layout node directly. Every settable visual
//! property is exposed through one indirection table mapping a property
//! identifier to a getter/setter pair, so matched rules are applied by
//! identifier with no knowledge of the node's concrete kind. Setters do
//! their own dirty marking: geometry setters schedule layout work, paint
//! setters request a repaint only.

use crate::layout::node::{mark, LayoutNode, NodeId};
use crate::layout::tree::LayoutTree;
use crate::scheduler::Scheduler;
use crate::style::rule::RuleId;
use crate::style::sheet::RuleTree;
use crate::value::PropertyValue;

/// Identifier of a settable visual property.
///
/// The discriminant doubles as the index into [`ACCESSORS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum PropertyId {
  Width = 0,
  Height,
  MarginTop,
  MarginRight,
  MarginBottom,
  MarginLeft,
  PaddingTop,
  PaddingRight,
  PaddingBottom,
  PaddingLeft,
  Align,
  Opacity,
  Visible,
  ReceivesInput,
  BackgroundColor,
}

/// Mutable engine state a setter is allowed to touch.
pub struct ApplyCtx<'a> {
  pub tree: &'a mut LayoutTree,
  pub scheduler: &'a mut Scheduler,
}

/// One getter/setter pair of the indirection table.
pub struct PropertyAccessor {
  pub id: PropertyId,
  pub get: fn(&LayoutNode) -> PropertyValue,
  pub set: fn(&mut ApplyCtx<'_>, NodeId, PropertyValue),
}

macro_rules! dimension_accessor {
  ($id:ident, $field:ident, $bits:expr) => {
    PropertyAccessor {
      id: PropertyId::$id,
      get: |node| PropertyValue::Dimension(node.style.$field),
      set: |ctx, id, value| {
        if let PropertyValue::Dimension(dim) = value {
          let node = ctx.tree.node_mut(id);
          if node.style.$field != dim {
            node.style.$field = dim;
            ctx.tree.mark_layout(ctx.scheduler, id, $bits);
          }
        }
      },
    }
  };
}

macro_rules! edge_accessor {
  ($id:ident, $group:ident, $edge:ident) => {
    PropertyAccessor {
      id: PropertyId::$id,
      get: |node| PropertyValue::Float(node.style.$group.$edge),
      set: |ctx, id, value| {
        if let PropertyValue::Float(v) = value {
          let node = ctx.tree.node_mut(id);
          if node.style.$group.$edge != v {
            node.style.$group.$edge = v;
            ctx
              .tree
              .mark_layout(ctx.scheduler, id, mark::SIZE_WIDTH | mark::SIZE_HEIGHT);
          }
        }
      },
    }
  };
}

/// The accessor table, indexed by `PropertyId` discriminant.
pub static ACCESSORS: &[PropertyAccessor] = &[
  dimension_accessor!(Width, width, mark::SIZE_WIDTH),
  dimension_accessor!(Height, height, mark::SIZE_HEIGHT),
  edge_accessor!(MarginTop, margin, top),
  edge_accessor!(MarginRight, margin, right),
  edge_accessor!(MarginBottom, margin, bottom),
  edge_accessor!(MarginLeft, margin, left),
  edge_accessor!(PaddingTop, padding, top),
  edge_accessor!(PaddingRight, padding, right),
  edge_accessor!(PaddingBottom, padding, bottom),
  edge_accessor!(PaddingLeft, padding, left),
  PropertyAccessor {
    id: PropertyId::Align,
    get: |node| PropertyValue::Align(node.style.align),
    set: |ctx, id, value| {
      if let PropertyValue::Align(align) = value {
        let node = ctx.tree.node_mut(id);
        if node.style.align != align {
          node.style.align = align;
          ctx.tree.notify_parent_child_align(ctx.scheduler, id);
        }
      }
    },
  },
  PropertyAccessor {
    id: PropertyId::Opacity,
    get: |node| PropertyValue::Float(node.opacity),
    set: |ctx, id, value| {
      if let PropertyValue::Float(v) = value {
        let node = ctx.tree.node_mut(id);
        let v = v.clamp(0.0, 1.0);
        if node.opacity != v {
          node.opacity = v;
          ctx.scheduler.request_repaint_only();
        }
      }
    },
  },
  PropertyAccessor {
    id: PropertyId::Visible,
    get: |node| PropertyValue::Bool(node.visible),
    set: |ctx, id, value| {
      if let PropertyValue::Bool(v) = value {
        ctx.tree.set_visible(ctx.scheduler, id, v);
      }
    },
  },
  PropertyAccessor {
    id: PropertyId::ReceivesInput,
    get: |node| PropertyValue::Bool(node.receives_input),
    set: |ctx, id, value| {
      if let PropertyValue::Bool(v) = value {
        ctx.tree.node_mut(id).receives_input = v;
      }
    },
  },
  PropertyAccessor {
    id: PropertyId::BackgroundColor,
    get: |node| PropertyValue::Color(node.style.background),
    set: |ctx, id, value| {
      if let PropertyValue::Color(c) = value {
        let node = ctx.tree.node_mut(id);
        if node.style.background != c {
          node.style.background = c;
          ctx.scheduler.request_repaint_only();
        }
      }
    },
  },
];

/// Looks up the accessor for a property id.
pub fn accessor(id: PropertyId) -> &'static PropertyAccessor {
  let acc = &ACCESSORS[id as usize];
  debug_assert!(acc.id == id, "accessor table out of order");
  acc
}

/// A running interpolation between two property values.
#[derive(Debug, Clone, Copy)]
pub struct Transition {
  pub node: NodeId,
  pub property: PropertyId,
  pub from: PropertyValue,
  pub to: PropertyValue,
  pub start_ms: u64,
  pub duration_ms: u32,
}

impl Transition {
  /// Progress in [0, 1] at `now`.
  fn progress(&self, now: u64) -> f32 {
    if self.duration_ms == 0 {
      return 1.0;
    }
    let elapsed = now.saturating_sub(self.start_ms) as f32;
    (elapsed / self.duration_ms as f32).clamp(0.0, 1.0)
  }
}

/// Applies a matched rule list to a node in cascade order.
///
/// Later matches override earlier ones for the same identifier. A rule with
/// a transition duration starts an interpolation from the node's current
/// value instead of writing the target immediately; first-time application
/// never animates.
pub fn apply_rules(
  ctx: &mut ApplyCtx<'_>,
  styles: &RuleTree,
  node: NodeId,
  matched: &[RuleId],
  first_apply: bool,
  now: u64,
  transitions: &mut Vec<Transition>,
) {
  for &rule_id in matched {
    let rule = styles.rule(rule_id);
    let animate = rule.transition_ms() > 0 && !first_apply;
    for &(property, target) in &rule.properties {
      let acc = accessor(property);
      if animate {
        let from = (acc.get)(ctx.tree.node(node));
        if from == target {
          continue;
        }
        // An in-flight transition for the same property is superseded.
        transitions.retain(|t| !(t.node == node && t.property == property));
        transitions.push(Transition {
          node,
          property,
          from,
          to: target,
          start_ms: now,
          duration_ms: rule.transition_ms(),
        });
      } else {
        (acc.set)(ctx, node, target);
      }
    }
  }
}

/// Steps every running transition, writing the interpolated value through
/// the accessor table. Finished transitions are retired after landing
/// exactly on their target.
pub fn step_transitions(ctx: &mut ApplyCtx<'_>, transitions: &mut Vec<Transition>, now: u64) {
  let mut i = 0;
  while i < transitions.len() {
    let t = transitions[i];
    if !ctx.tree.is_alive(t.node) {
      transitions.swap_remove(i);
      continue;
    }
    let progress = t.progress(now);
    let value = PropertyValue::interpolate(t.from, t.to, progress);
    let acc = accessor(t.property);
    (acc.set)(ctx, t.node, value);
    if progress >= 1.0 {
      transitions.swap_remove(i);
    } else {
      i += 1;
    }
  }
}
