//! The retained layout tree.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]; the arena
//! owns every node, so there is no per-node lifetime bookkeeping. Intrusive
//! parent/sibling/child links are stored as ids.
//!
//! A node's `level` is its depth from the root of the active tree; 0 means
//! the node is not part of a visible chain rooted at the active root. Level
//! changes (attach, detach, visibility flips) move any pending marks to the
//! right scheduler bucket without touching the marks themselves.

use smallvec::SmallVec;

use crate::geometry::Size;
use crate::layout::node::{mark, ChildChange, LayoutNode, NodeId, NodeKind};
use crate::scheduler::Scheduler;

/// Owns every layout node of one engine instance.
pub struct LayoutTree {
  slots: Vec<Option<LayoutNode>>,
  free: Vec<u32>,
  root: Option<NodeId>,
  viewport: Size,
}

impl LayoutTree {
  pub fn new(viewport: Size) -> Self {
    Self {
      slots: Vec::new(),
      free: Vec::new(),
      root: None,
      viewport,
    }
  }

  /// The viewport the root node is laid out against.
  pub fn viewport(&self) -> Size {
    self.viewport
  }

  /// Changes the viewport and schedules a full root resize.
  pub fn set_viewport(&mut self, sched: &mut Scheduler, viewport: Size) {
    if self.viewport == viewport {
      return;
    }
    self.viewport = viewport;
    if let Some(root) = self.root {
      self.mark_layout(sched, root, mark::SIZE | mark::TYPESETTING | mark::RECURSIVE);
    }
  }

  /// Creates a detached node of the given kind.
  pub fn create(&mut self, kind: NodeKind) -> NodeId {
    let node = LayoutNode::new(kind);
    match self.free.pop() {
      Some(index) => {
        self.slots[index as usize] = Some(node);
        NodeId(index)
      }
      None => {
        self.slots.push(Some(node));
        NodeId((self.slots.len() - 1) as u32)
      }
    }
  }

  /// Whether the id refers to a live node.
  pub fn is_alive(&self, id: NodeId) -> bool {
    self
      .slots
      .get(id.index())
      .map_or(false, |slot| slot.is_some())
  }

  /// Borrows a node. Panics on a dead id: using a destroyed node is tree
  /// corruption, not a recoverable state.
  pub fn node(&self, id: NodeId) -> &LayoutNode {
    self.slots[id.index()]
      .as_ref()
      .unwrap_or_else(|| panic!("dead layout node {id:?}"))
  }

  /// Mutably borrows a node. Panics on a dead id.
  pub fn node_mut(&mut self, id: NodeId) -> &mut LayoutNode {
    self.slots[id.index()]
      .as_mut()
      .unwrap_or_else(|| panic!("dead layout node {id:?}"))
  }

  /// The active root, if one has been installed.
  pub fn root(&self) -> Option<NodeId> {
    self.root
  }

  /// Installs a detached node as the active root at level 1.
  ///
  /// A previously active root leaves the visible chain: its whole subtree
  /// drops to level 0 and is unscheduled, keeping its marks for a later
  /// reinstall.
  pub fn set_root(&mut self, sched: &mut Scheduler, id: NodeId) {
    assert!(
      self.node(id).parent.is_none(),
      "root node must be detached from any parent"
    );
    if let Some(old) = self.root {
      if old != id {
        self.clear_level_recursive(sched, old);
        sched.request_repaint_only();
      }
    }
    self.root = Some(id);
    if self.node(id).visible {
      self.set_level_recursive(sched, id, 1);
      self.mark_layout(sched, id, mark::SIZE | mark::TYPESETTING | mark::RECURSIVE);
    }
  }

  /// Collects the ids of a node's children in sibling order.
  pub fn child_ids(&self, id: NodeId) -> SmallVec<[NodeId; 8]> {
    let mut out = SmallVec::new();
    let mut cursor = self.node(id).first;
    while let Some(child) = cursor {
      out.push(child);
      cursor = self.node(child).next;
    }
    out
  }

  /// Appends `child` as the last child of `parent`.
  ///
  /// The child must be detached. If the parent sits in the active tree the
  /// child (and its visible descendants) joins at the parent's level + 1 and
  /// is scheduled for a full initial layout.
  pub fn append(&mut self, sched: &mut Scheduler, parent: NodeId, child: NodeId) {
    assert!(
      self.node(child).parent.is_none(),
      "append of a node that already has a parent"
    );
    assert!(parent != child, "node cannot be its own parent");

    let old_last = self.node(parent).last;
    {
      let node = self.node_mut(child);
      node.parent = Some(parent);
      node.prev = old_last;
      node.next = None;
    }
    match old_last {
      Some(last) => self.node_mut(last).next = Some(child),
      None => self.node_mut(parent).first = Some(child),
    }
    self.node_mut(parent).last = Some(child);

    self.activate_inserted(sched, parent, child);
  }

  /// Prepends `child` as the first child of `parent`.
  pub fn prepend(&mut self, sched: &mut Scheduler, parent: NodeId, child: NodeId) {
    assert!(
      self.node(child).parent.is_none(),
      "prepend of a node that already has a parent"
    );
    let old_first = self.node(parent).first;
    {
      let node = self.node_mut(child);
      node.parent = Some(parent);
      node.next = old_first;
      node.prev = None;
    }
    match old_first {
      Some(first) => self.node_mut(first).prev = Some(child),
      None => self.node_mut(parent).last = Some(child),
    }
    self.node_mut(parent).first = Some(child);

    self.activate_inserted(sched, parent, child);
  }

  /// Inserts `child` immediately before `sibling` under the same parent.
  pub fn insert_before(&mut self, sched: &mut Scheduler, sibling: NodeId, child: NodeId) {
    assert!(
      self.node(child).parent.is_none(),
      "insert of a node that already has a parent"
    );
    let parent = self
      .node(sibling)
      .parent
      .unwrap_or_else(|| panic!("insert_before a detached sibling {sibling:?}"));
    let prev = self.node(sibling).prev;
    {
      let node = self.node_mut(child);
      node.parent = Some(parent);
      node.prev = prev;
      node.next = Some(sibling);
    }
    self.node_mut(sibling).prev = Some(child);
    match prev {
      Some(prev) => self.node_mut(prev).next = Some(child),
      None => self.node_mut(parent).first = Some(child),
    }
    self.activate_inserted(sched, parent, child);
  }

  /// Inserts `child` immediately after `sibling` under the same parent.
  pub fn insert_after(&mut self, sched: &mut Scheduler, sibling: NodeId, child: NodeId) {
    assert!(
      self.node(child).parent.is_none(),
      "insert of a node that already has a parent"
    );
    let parent = self
      .node(sibling)
      .parent
      .unwrap_or_else(|| panic!("insert_after a detached sibling {sibling:?}"));
    let next = self.node(sibling).next;
    {
      let node = self.node_mut(child);
      node.parent = Some(parent);
      node.prev = Some(sibling);
      node.next = next;
    }
    self.node_mut(sibling).next = Some(child);
    match next {
      Some(next) => self.node_mut(next).prev = Some(child),
      None => self.node_mut(parent).last = Some(child),
    }
    self.activate_inserted(sched, parent, child);
  }

  fn activate_inserted(&mut self, sched: &mut Scheduler, parent: NodeId, child: NodeId) {
    let parent_level = self.node(parent).level;
    if parent_level > 0 && self.node(child).visible {
      self.set_level_recursive(sched, child, parent_level + 1);
      self.mark_layout(sched, child, mark::SIZE | mark::TYPESETTING | mark::RECURSIVE);
    }
    self.on_child_layout_change(sched, parent, child, ChildChange::Visible);
  }

  /// Unlinks a node from its parent. The subtree stays alive and keeps its
  /// marks, but leaves the schedule and drops to level 0.
  pub fn remove(&mut self, sched: &mut Scheduler, id: NodeId) {
    let Some(parent) = self.node(id).parent else {
      return;
    };
    // Notify while the link still exists; afterwards the child would fail
    // the notification's parent check.
    self.on_child_layout_change(sched, parent, id, ChildChange::Visible);

    let (prev, next) = {
      let node = self.node(id);
      (node.prev, node.next)
    };
    match prev {
      Some(prev) => self.node_mut(prev).next = next,
      None => self.node_mut(parent).first = next,
    }
    match next {
      Some(next) => self.node_mut(next).prev = prev,
      None => self.node_mut(parent).last = prev,
    }
    {
      let node = self.node_mut(id);
      node.parent = None;
      node.prev = None;
      node.next = None;
    }
    self.clear_level_recursive(sched, id);
  }

  /// Frees a detached subtree. The node must already be removed from its
  /// parent; destroying an attached node is a programmer error.
  pub fn destroy(&mut self, sched: &mut Scheduler, id: NodeId) {
    assert!(
      self.node(id).parent.is_none(),
      "destroy of an attached node; remove it first"
    );
    self.clear_level_recursive(sched, id);
    self.destroy_subtree(id);
  }

  fn destroy_subtree(&mut self, id: NodeId) {
    for child in self.child_ids(id) {
      self.destroy_subtree(child);
    }
    if self.root == Some(id) {
      self.root = None;
    }
    self.slots[id.index()] = None;
    self.free.push(id.0);
  }

  /// Flips visibility. An invisible node occupies no layout space and its
  /// whole subtree leaves the active chain (level 0, unscheduled).
  pub fn set_visible(&mut self, sched: &mut Scheduler, id: NodeId, visible: bool) {
    if self.node(id).visible == visible {
      return;
    }
    self.node_mut(id).visible = visible;
    let parent = self.node(id).parent;
    if visible {
      let base_level = if self.root == Some(id) {
        Some(1)
      } else {
        parent
          .map(|p| self.node(p).level)
          .filter(|&l| l > 0)
          .map(|l| l + 1)
      };
      if let Some(level) = base_level {
        self.set_level_recursive(sched, id, level);
        self.mark_layout(sched, id, mark::SIZE | mark::TYPESETTING | mark::RECURSIVE);
      }
    } else {
      self.clear_level_recursive(sched, id);
      sched.request_repaint_only();
    }
    if let Some(parent) = parent {
      self.on_child_layout_change(sched, parent, id, ChildChange::Visible);
    }
  }

  /// Adds mark bits to a node and schedules it when it newly needs layout
  /// work. Marking an already-scheduled node only accumulates bits.
  pub fn mark_layout(&mut self, sched: &mut Scheduler, id: NodeId, bits: u32) {
    self.node_mut(id).mark |= bits;
    let (level, scheduled, layout_pending) = {
      let node = self.node(id);
      (node.level, node.is_scheduled(), node.mark & mark::LAYOUT)
    };
    if level == 0 {
      // Detached nodes accumulate marks; they are rescheduled on join.
      return;
    }
    if bits & mark::RECURSIVE != 0 {
      sched.note_recursive(id, level);
    }
    if layout_pending != 0 && !scheduled {
      sched.mark(self, id);
    }
  }

  /// The child-change notification: a child signals that the parent must
  /// re-typeset. The parent reacts by scheduling itself rather than
  /// recomputing inline.
  ///
  /// Panics when `child` is not actually a child of `parent`; that means the
  /// tree links are corrupt and nothing can be trusted.
  pub fn on_child_layout_change(
    &mut self,
    sched: &mut Scheduler,
    parent: NodeId,
    child: NodeId,
    _kind: ChildChange,
  ) {
    assert!(
      self.node(child).parent == Some(parent),
      "child-change notification from a node that is not a child of the target"
    );
    self.mark_layout(sched, parent, mark::TYPESETTING);
  }

  /// Convenience for setters: notifies the parent, if any, that a child's
  /// alignment changed.
  pub fn notify_parent_child_align(&mut self, sched: &mut Scheduler, child: NodeId) {
    if let Some(parent) = self.node(child).parent {
      self.on_child_layout_change(sched, parent, child, ChildChange::Align);
    }
  }

  fn set_level_recursive(&mut self, sched: &mut Scheduler, id: NodeId, level: u32) {
    if self.node(id).is_scheduled() {
      sched.unmark(self, id);
    }
    self.node_mut(id).level = level;
    if self.node(id).mark & mark::LAYOUT != 0 {
      sched.mark(self, id);
    }
    if self.node(id).mark & mark::RECURSIVE != 0 {
      sched.note_recursive(id, level);
    }
    let mut cursor = self.node(id).first;
    while let Some(child) = cursor {
      cursor = self.node(child).next;
      if self.node(child).visible {
        self.set_level_recursive(sched, child, level + 1);
      }
    }
  }

  fn clear_level_recursive(&mut self, sched: &mut Scheduler, id: NodeId) {
    if self.node(id).level == 0 {
      return;
    }
    if self.node(id).is_scheduled() {
      sched.unmark(self, id);
    }
    self.node_mut(id).level = 0;
    let mut cursor = self.node(id).first;
    while let Some(child) = cursor {
      cursor = self.node(child).next;
      self.clear_level_recursive(sched, child);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fixture() -> (LayoutTree, Scheduler, NodeId) {
    let mut tree = LayoutTree::new(Size::new(100.0, 100.0));
    let mut sched = Scheduler::new();
    let root = tree.create(NodeKind::Boxed);
    tree.set_root(&mut sched, root);
    (tree, sched, root)
  }

  #[test]
  fn re_marking_a_scheduled_node_only_accumulates_bits() {
    let (mut tree, mut sched, root) = fixture();
    let before = sched.dirty_count();
    tree.mark_layout(&mut sched, root, mark::SIZE_WIDTH);
    tree.mark_layout(&mut sched, root, mark::TYPESETTING);
    assert_eq!(sched.dirty_count(), before);
    assert_ne!(tree.node(root).mark & mark::SIZE_WIDTH, 0);
    assert_ne!(tree.node(root).mark & mark::TYPESETTING, 0);
  }

  #[test]
  fn unmark_swaps_and_fixes_the_moved_slot() {
    let (mut tree, mut sched, root) = fixture();
    let a = tree.create(NodeKind::Boxed);
    let b = tree.create(NodeKind::Boxed);
    let c = tree.create(NodeKind::Boxed);
    tree.append(&mut sched, root, a);
    tree.append(&mut sched, root, b);
    tree.append(&mut sched, root, c);
    // All three share one bucket; removing the first moves the last.
    let before = sched.dirty_count();
    sched.unmark(&mut tree, a);
    assert_eq!(sched.dirty_count(), before - 1);
    assert_eq!(tree.node(a).dirty_index, -1);
    assert_eq!(tree.node(c).dirty_index, 0);
    sched.unmark(&mut tree, c);
    sched.unmark(&mut tree, b);
    assert_eq!(sched.dirty_count(), before - 3);
  }

  #[test]
  fn insertion_keeps_sibling_order() {
    let (mut tree, mut sched, root) = fixture();
    let a = tree.create(NodeKind::Boxed);
    let b = tree.create(NodeKind::Boxed);
    let c = tree.create(NodeKind::Boxed);
    let d = tree.create(NodeKind::Boxed);
    tree.append(&mut sched, root, b);
    tree.prepend(&mut sched, root, a);
    tree.insert_after(&mut sched, b, d);
    tree.insert_before(&mut sched, d, c);
    let order: Vec<NodeId> = tree.child_ids(root).into_iter().collect();
    assert_eq!(order, vec![a, b, c, d]);
  }

  #[test]
  fn detach_zeroes_levels_and_unschedules() {
    let (mut tree, mut sched, root) = fixture();
    let child = tree.create(NodeKind::Boxed);
    let grandchild = tree.create(NodeKind::Boxed);
    tree.append(&mut sched, root, child);
    tree.append(&mut sched, child, grandchild);
    assert_eq!(tree.node(grandchild).level, 3);

    tree.remove(&mut sched, child);
    assert_eq!(tree.node(child).level, 0);
    assert_eq!(tree.node(grandchild).level, 0);
    assert!(!tree.node(child).is_scheduled());
    assert!(!tree.node(grandchild).is_scheduled());
    // Marks survive detachment for re-scheduling on reattach.
    assert_ne!(tree.node(child).mark & mark::LAYOUT, 0);
  }

  #[test]
  fn replacing_the_root_detaches_the_old_tree() {
    let (mut tree, mut sched, root) = fixture();
    let child = tree.create(NodeKind::Boxed);
    tree.append(&mut sched, root, child);
    assert_eq!(tree.node(child).level, 2);

    let replacement = tree.create(NodeKind::Boxed);
    tree.set_root(&mut sched, replacement);
    assert_eq!(tree.root(), Some(replacement));
    assert_eq!(tree.node(replacement).level, 1);
    // The old root's subtree left the visible chain entirely.
    assert_eq!(tree.node(root).level, 0);
    assert_eq!(tree.node(child).level, 0);
    assert!(!tree.node(root).is_scheduled());
    assert!(!tree.node(child).is_scheduled());
  }

  #[test]
  fn invisible_subtree_is_not_part_of_the_active_chain() {
    let (mut tree, mut sched, root) = fixture();
    let child = tree.create(NodeKind::Boxed);
    tree.append(&mut sched, root, child);
    tree.set_visible(&mut sched, child, false);
    assert_eq!(tree.node(child).level, 0);
    tree.set_visible(&mut sched, child, true);
    assert_eq!(tree.node(child).level, 2);
    assert!(tree.node(child).is_scheduled());
  }
}
