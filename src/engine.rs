//! The engine façade.
//!
//! All mutable state (tree, rule tree, scheduler, transitions) lives behind
//! one mutex so any thread can hold an [`Engine`] handle. Structural and
//! style mutations fall into two groups: those applied synchronously under
//! the lock, and those posted to a call queue that the next frame drains
//! before running the layout sweep. Interaction-driven changes (pseudo
//! state, scroll) are posted so a burst of input events coalesces into a
//! single restyle per frame.

use std::hash::Hasher;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHasher;
use smallvec::SmallVec;

use crate::error::SelectorError;
use crate::geometry::{Point, Size, Transform};
use crate::layout::node::{mark, NodeId, NodeKind};
use crate::layout::text::{CollaboratorEvent, ShapedText, TextShaper};
use crate::layout::tree::LayoutTree;
use crate::scheduler::{Scheduler, TaskId};
use crate::style::apply::{self, ApplyCtx, PropertyId, Transition};
use crate::style::rule::{PseudoState, RuleId};
use crate::style::sheet::RuleTree;
use crate::value::PropertyValue;

type PostedCall = Box<dyn FnOnce(&mut EngineState) + Send>;

/// Everything one engine instance owns.
pub struct EngineState {
  pub tree: LayoutTree,
  pub styles: RuleTree,
  pub scheduler: Scheduler,
  pending: Vec<PostedCall>,
  transitions: Vec<Transition>,
  events: Vec<CollaboratorEvent>,
  now_ms: u64,
}

/// Cloneable, thread-safe handle to one engine instance.
#[derive(Clone)]
pub struct Engine {
  state: Arc<Mutex<EngineState>>,
}

/// Read-only layout results for one node, for callers outside a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutInfo {
  /// Outer size: margin + padding + content
  pub layout_size: Size,
  pub content_size: Size,
  /// Margin-box origin inside the parent's content box
  pub offset: Point,
  pub transform: Transform,
  pub in_viewport: bool,
}

/// One paintable node of a frame, in pre-order.
#[derive(Debug, Clone)]
pub struct PaintNode {
  pub node: NodeId,
  /// Maps the border-box origin to root coordinates
  pub transform: Transform,
  /// Border-box size
  pub size: Size,
  pub content_size: Size,
  pub opacity: f32,
  /// Whether the node intersects the viewport; invisible-region nodes are
  /// still listed so hit testing stays complete
  pub in_viewport: bool,
  pub background: crate::value::Color,
  pub text: Option<ShapedText>,
}

/// Snapshot of everything to draw for one converged frame.
#[derive(Debug, Clone, Default)]
pub struct FrameSnapshot {
  pub nodes: Vec<PaintNode>,
}

impl Engine {
  pub fn new(viewport: Size) -> Self {
    Self {
      state: Arc::new(Mutex::new(EngineState {
        tree: LayoutTree::new(viewport),
        styles: RuleTree::new(),
        scheduler: Scheduler::new(),
        pending: Vec::new(),
        transitions: Vec::new(),
        events: Vec::new(),
        now_ms: 0,
      })),
    }
  }

  /// Runs a closure with exclusive access to the engine state.
  pub fn with_state<R>(&self, f: impl FnOnce(&mut EngineState) -> R) -> R {
    f(&mut self.state.lock())
  }

  /// Queues a closure to run at the start of the next frame, before layout.
  pub fn post(&self, f: impl FnOnce(&mut EngineState) + Send + 'static) {
    self.state.lock().pending.push(Box::new(f));
  }

  // ---- structure ----

  pub fn create_node(&self, kind: NodeKind) -> NodeId {
    self.state.lock().tree.create(kind)
  }

  pub fn set_root(&self, id: NodeId) {
    let mut s = self.state.lock();
    let EngineState { tree, scheduler, .. } = &mut *s;
    tree.set_root(scheduler, id);
  }

  pub fn set_viewport(&self, viewport: Size) {
    let mut s = self.state.lock();
    let EngineState { tree, scheduler, .. } = &mut *s;
    tree.set_viewport(scheduler, viewport);
  }

  pub fn append(&self, parent: NodeId, child: NodeId) {
    let mut s = self.state.lock();
    let EngineState { tree, scheduler, .. } = &mut *s;
    tree.append(scheduler, parent, child);
  }

  pub fn prepend(&self, parent: NodeId, child: NodeId) {
    let mut s = self.state.lock();
    let EngineState { tree, scheduler, .. } = &mut *s;
    tree.prepend(scheduler, parent, child);
  }

  pub fn insert_before(&self, sibling: NodeId, child: NodeId) {
    let mut s = self.state.lock();
    let EngineState { tree, scheduler, .. } = &mut *s;
    tree.insert_before(scheduler, sibling, child);
  }

  pub fn insert_after(&self, sibling: NodeId, child: NodeId) {
    let mut s = self.state.lock();
    let EngineState { tree, scheduler, .. } = &mut *s;
    tree.insert_after(scheduler, sibling, child);
  }

  /// Unlinks a node from its parent; the subtree stays alive.
  pub fn remove_node(&self, id: NodeId) {
    let mut s = self.state.lock();
    let EngineState { tree, scheduler, .. } = &mut *s;
    tree.remove(scheduler, id);
  }

  /// Removes and frees a subtree.
  pub fn destroy_node(&self, id: NodeId) {
    let mut s = self.state.lock();
    let EngineState {
      tree,
      scheduler,
      transitions,
      ..
    } = &mut *s;
    tree.remove(scheduler, id);
    tree.destroy(scheduler, id);
    transitions.retain(|t| tree.is_alive(t.node));
  }

  // ---- direct node state ----

  /// Sets one visual property through the accessor table, bypassing the
  /// cascade. The setter does its own dirty marking.
  pub fn set_property(&self, id: NodeId, property: PropertyId, value: PropertyValue) {
    let mut s = self.state.lock();
    let EngineState { tree, scheduler, .. } = &mut *s;
    let mut ctx = ApplyCtx { tree, scheduler };
    (apply::accessor(property).set)(&mut ctx, id, value);
  }

  /// Replaces a text node's content. Only the node itself is re-marked; the
  /// parent hears about it when (and if) the shaped size actually changes.
  pub fn set_text(&self, id: NodeId, text: impl Into<String>) {
    let text = text.into();
    let mut s = self.state.lock();
    let EngineState { tree, scheduler, .. } = &mut *s;
    let changed = match &mut tree.node_mut(id).kind {
      NodeKind::Text(state) if state.text != text => {
        state.text = text;
        state.shaped_for_width = None;
        true
      }
      _ => false,
    };
    if changed {
      tree.mark_layout(scheduler, id, mark::TYPESETTING);
    }
  }

  pub fn set_font_size(&self, id: NodeId, font_size: f32) {
    let mut s = self.state.lock();
    let EngineState { tree, scheduler, .. } = &mut *s;
    let changed = match &mut tree.node_mut(id).kind {
      NodeKind::Text(state) if state.font_size != font_size => {
        state.font_size = font_size;
        state.shaped_for_width = None;
        true
      }
      _ => false,
    };
    if changed {
      tree.mark_layout(scheduler, id, mark::TYPESETTING);
    }
  }

  pub fn set_flow(&self, id: NodeId, direction: crate::layout::node::FlowDirection, gap: f32) {
    let mut s = self.state.lock();
    let EngineState { tree, scheduler, .. } = &mut *s;
    let changed = match &mut tree.node_mut(id).kind {
      NodeKind::Flow(state) if state.direction != direction || state.gap != gap => {
        state.direction = direction;
        state.gap = gap;
        true
      }
      _ => false,
    };
    if changed {
      tree.mark_layout(scheduler, id, mark::TYPESETTING);
    }
  }

  /// Reports a decoded image's natural size.
  pub fn set_image_natural_size(&self, id: NodeId, natural: Size) {
    let mut s = self.state.lock();
    let EngineState { tree, scheduler, .. } = &mut *s;
    let changed = match &mut tree.node_mut(id).kind {
      NodeKind::Image(state) if state.natural != natural => {
        state.natural = natural;
        true
      }
      _ => false,
    };
    if changed {
      tree.mark_layout(scheduler, id, mark::SIZE);
    }
  }

  // ---- styling ----

  /// Registers a selector expression and returns the terminal rule of each
  /// valid alternative. Rejected alternatives are logged and skipped; the
  /// valid ones still take effect. The whole tree is restyled next frame.
  pub fn add_rules(&self, expr: &str) -> (Vec<RuleId>, Vec<SelectorError>) {
    let mut s = self.state.lock();
    let (ids, errors) = s.styles.register(expr);
    for err in &errors {
      log::warn!("selector rejected in {expr:?}: {err}");
    }
    if !ids.is_empty() {
      s.pending.push(Box::new(|state| {
        if let Some(root) = state.tree.root() {
          restyle_subtree(state, root, true);
        }
      }));
    }
    (ids, errors)
  }

  pub fn set_rule_property(&self, rule: RuleId, property: PropertyId, value: PropertyValue) {
    let mut s = self.state.lock();
    s.styles.rule_mut(rule).set_property(property, value);
    s.pending.push(Box::new(|state| {
      if let Some(root) = state.tree.root() {
        restyle_subtree(state, root, true);
      }
    }));
  }

  pub fn set_rule_transition(&self, rule: RuleId, duration_ms: u32) {
    self.state.lock().styles.rule_mut(rule).set_transition_ms(duration_ms);
  }

  /// Replaces a node's class list. The new list is visible immediately; the
  /// restyle runs next frame.
  pub fn set_classes<S: Into<String>>(&self, id: NodeId, classes: impl IntoIterator<Item = S>) {
    let mut list: Vec<String> = Vec::new();
    for class in classes {
      let class = class.into();
      if !list.contains(&class) {
        list.push(class);
      }
    }
    let mut s = self.state.lock();
    s.tree.node_mut(id).classes = list;
    s.pending.push(Box::new(move |state| {
      if state.tree.is_alive(id) {
        restyle_subtree(state, id, false);
      }
    }));
  }

  /// Changes a node's interaction pseudo state (posted; bursts of pointer
  /// events coalesce into one restyle).
  pub fn set_pseudo_state(&self, id: NodeId, state: PseudoState) {
    self.post(move |s| {
      if !s.tree.is_alive(id) || s.tree.node(id).pseudo_state == state {
        return;
      }
      s.tree.node_mut(id).pseudo_state = state;
      restyle_subtree(s, id, false);
    });
  }

  /// Scrolls a scroll container (posted; clamped to the content extent
  /// during the next reverse pass).
  pub fn set_scroll_offset(&self, id: NodeId, offset: Point) {
    self.post(move |s| {
      if !s.tree.is_alive(id) {
        return;
      }
      let changed = match &mut s.tree.node_mut(id).kind {
        NodeKind::Scroll(scroll) if scroll.offset != offset => {
          scroll.offset = offset;
          true
        }
        _ => false,
      };
      if changed {
        let EngineState { tree, scheduler, .. } = s;
        tree.mark_layout(scheduler, id, mark::SCROLL);
      }
    });
  }

  // ---- timing ----

  pub fn add_timed_task(
    &self,
    owner: NodeId,
    deadline_ms: u64,
    interval_ms: Option<u64>,
  ) -> TaskId {
    self.state.lock().scheduler.add_task(owner, deadline_ms, interval_ms)
  }

  pub fn remove_timed_task(&self, id: TaskId) {
    self.state.lock().scheduler.remove_task(id);
  }

  // ---- frame ----

  /// Collaborator failures accumulated since the last call.
  pub fn take_events(&self) -> Vec<CollaboratorEvent> {
    std::mem::take(&mut self.state.lock().events)
  }

  /// Layout results of one node, as of the last converged frame.
  pub fn layout_of(&self, id: NodeId) -> LayoutInfo {
    let s = self.state.lock();
    let node = s.tree.node(id);
    LayoutInfo {
      layout_size: node.layout_size,
      content_size: node.content_size,
      offset: node.offset,
      transform: node.transform,
      in_viewport: node.visible_region,
    }
  }

  /// Runs one frame at monotonic time `now_ms`: drains posted calls, steps
  /// transitions, runs the layout sweep, and snapshots the paint list when
  /// anything changed. Returns `None` for an idle frame.
  pub fn solve_frame(&self, now_ms: u64, shaper: &mut dyn TextShaper) -> Option<FrameSnapshot> {
    let mut s = self.state.lock();
    s.now_ms = now_ms;

    // Calls posted by these calls run next frame, like any other post.
    let batch = std::mem::take(&mut s.pending);
    for call in batch {
      call(&mut *s);
    }

    {
      let EngineState {
        tree,
        scheduler,
        transitions,
        ..
      } = &mut *s;
      let mut ctx = ApplyCtx { tree, scheduler };
      apply::step_transitions(&mut ctx, transitions, now_ms);
    }

    let render = {
      let EngineState {
        tree,
        scheduler,
        events,
        ..
      } = &mut *s;
      scheduler.solve(tree, shaper, events, now_ms)
    };
    if !render {
      return None;
    }
    Some(snapshot(&s.tree))
  }
}

/// Builds the pre-order paint list over the visible tree.
fn snapshot(tree: &LayoutTree) -> FrameSnapshot {
  let mut out = FrameSnapshot::default();
  let Some(root) = tree.root() else {
    return out;
  };
  if !tree.node(root).visible {
    return out;
  }
  let mut stack = vec![root];
  while let Some(id) = stack.pop() {
    let node = tree.node(id);
    out.nodes.push(PaintNode {
      node: id,
      transform: node.transform,
      size: node.border_size(),
      content_size: node.content_size,
      opacity: node.opacity,
      in_viewport: node.visible_region,
      background: node.style.background,
      text: match &node.kind {
        NodeKind::Text(state) => state.shaped.clone(),
        _ => None,
      },
    });
    let children = tree.child_ids(id);
    for &child in children.iter().rev() {
      if tree.node(child).visible {
        stack.push(child);
      }
    }
  }
  out
}

/// Re-matches and re-applies styles for a subtree.
///
/// The ancestor scope stack (every matched rule with descendant steps, from
/// the root down) is rebuilt by walking up, then the subtree is walked down.
/// A node whose matched rule set hashes identically to last time is skipped
/// unless `force` is set; its children are still visited because an
/// ancestor's scope change can affect them without changing the ancestor.
pub fn restyle_subtree(state: &mut EngineState, start: NodeId, force: bool) {
  let mut scopes: Vec<RuleId> = Vec::new();
  let mut cursor = state.tree.node(start).parent;
  while let Some(id) = cursor {
    for &rule in state.tree.node(id).scope_rules.iter().rev() {
      scopes.push(rule);
    }
    cursor = state.tree.node(id).parent;
  }
  scopes.reverse();
  restyle_walk(state, &mut scopes, start, force);
}

fn restyle_walk(state: &mut EngineState, scopes: &mut Vec<RuleId>, id: NodeId, force: bool) {
  let matched = {
    let node = state.tree.node(id);
    if node.classes.is_empty() {
      crate::style::sheet::MatchList::new()
    } else {
      state
        .styles
        .match_element(scopes, &state.tree.node(id).classes, state.tree.node(id).pseudo_state)
    }
  };

  let mut hasher = FxHasher::default();
  hasher.write_usize(matched.len());
  for rule in &matched {
    hasher.write_u32(rule.0);
  }
  let hash = hasher.finish();

  if force || hash != state.tree.node(id).matched_hash {
    let first = state.tree.node(id).first_style_apply;
    {
      let EngineState {
        tree,
        styles,
        scheduler,
        transitions,
        now_ms,
        ..
      } = state;
      let mut ctx = ApplyCtx { tree, scheduler };
      apply::apply_rules(&mut ctx, styles, id, &matched, first, *now_ms, transitions);
    }
    let scope_rules: SmallVec<[RuleId; 2]> = matched
      .iter()
      .copied()
      .filter(|&rule| state.styles.rule(rule).has_children())
      .collect();
    let node = state.tree.node_mut(id);
    node.matched_hash = hash;
    node.first_style_apply = false;
    node.scope_rules = scope_rules;
  }

  let depth = scopes.len();
  scopes.extend(state.tree.node(id).scope_rules.iter().copied());
  for child in state.tree.child_ids(id) {
    restyle_walk(state, scopes, child, force);
  }
  scopes.truncate(depth);
}
