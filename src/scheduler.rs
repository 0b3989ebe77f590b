//! The mark scheduler.
//!
//! Dirty nodes are bucketed by tree level so a frame can visit them in
//! dependency order without walking the whole tree: ancestors first in the
//! forward (sizing) phase so size constraints flow down, descendants first
//! in the reverse (typesetting) phase so wrap sizes flow back up. A node may
//! be re-scheduled mid-sweep by a sibling's mutation, so the sweep repeats
//! until a full ascend+descend leaves nothing scheduled.
//!
//! Bucket membership is O(1) both ways: a node records its slot index, and
//! removal swaps the last entry into the vacated slot.

use crate::layout::node::{mark, NodeId};
use crate::layout::passes;
use crate::layout::text::{CollaboratorEvent, TextShaper};
use crate::layout::tree::LayoutTree;

/// Upper bound on full sweep iterations per frame.
///
/// The protocol converges in a handful of iterations on well-behaved trees
/// (bounded by depth). A node implementation that keeps re-marking its
/// counterpart could ping-pong forever; rather than hang the render thread
/// we bail out, log the stuck node count and drop the remaining marks.
const MAX_SWEEP_ITERATIONS: usize = 32;

/// Handle to a registered timed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

#[derive(Debug, Clone, Copy)]
struct TimedTask {
  id: TaskId,
  owner: NodeId,
  deadline_ms: u64,
  /// Re-arm interval; one-shot when absent
  interval_ms: Option<u64>,
}

/// Per-level dirty buckets plus frame bookkeeping.
pub struct Scheduler {
  buckets: Vec<Vec<NodeId>>,
  dirty: usize,
  needs_render: bool,
  /// Nodes carrying recursive bits, resolved after the sweep
  recursive: Vec<(u32, NodeId)>,
  tasks: Vec<TimedTask>,
  next_task: u64,
}

impl Default for Scheduler {
  fn default() -> Self {
    Self::new()
  }
}

impl Scheduler {
  pub fn new() -> Self {
    Self {
      buckets: Vec::new(),
      dirty: 0,
      needs_render: false,
      recursive: Vec::new(),
      tasks: Vec::new(),
      next_task: 1,
    }
  }

  /// Count of currently scheduled nodes.
  pub fn dirty_count(&self) -> usize {
    self.dirty
  }

  /// Schedules a node at its current level.
  ///
  /// The caller checks `dirty_index` first; marking an already-scheduled
  /// node must be a no-op at the call site, so reaching here twice for the
  /// same node is a corruption signal.
  pub fn mark(&mut self, tree: &mut LayoutTree, id: NodeId) {
    let level = tree.node(id).level as usize;
    assert!(level > 0, "mark of a node outside the active tree");
    assert!(
      !tree.node(id).is_scheduled(),
      "mark of an already-scheduled node"
    );
    if self.buckets.len() <= level {
      self.buckets.resize_with(level + 1, Vec::new);
    }
    let slot = self.buckets[level].len();
    self.buckets[level].push(id);
    tree.node_mut(id).dirty_index = slot as i32;
    self.dirty += 1;
  }

  /// Removes a node from its bucket in O(1) via swap-with-last.
  pub fn unmark(&mut self, tree: &mut LayoutTree, id: NodeId) {
    let (level, slot) = {
      let node = tree.node(id);
      (node.level as usize, node.dirty_index)
    };
    assert!(slot >= 0, "unmark of an unscheduled node");
    let slot = slot as usize;
    let bucket = &mut self.buckets[level];
    assert!(
      bucket.get(slot) == Some(&id),
      "scheduled node absent from its expected bucket"
    );
    bucket.swap_remove(slot);
    if slot < bucket.len() {
      let moved = bucket[slot];
      tree.node_mut(moved).dirty_index = slot as i32;
    }
    tree.node_mut(id).dirty_index = -1;
    self.dirty -= 1;
  }

  /// Records a node whose recursive bits need post-sweep resolution.
  pub fn note_recursive(&mut self, id: NodeId, level: u32) {
    self.recursive.push((level, id));
    self.needs_render = true;
  }

  /// Requests a repaint without scheduling any layout recomputation
  /// (pure paint-level change, e.g. opacity).
  pub fn request_repaint_only(&mut self) {
    self.needs_render = true;
  }

  /// Registers a timed task firing at an absolute monotonic deadline.
  ///
  /// A task whose owner has been destroyed is skipped, not cancelled; the
  /// owner must deregister before destruction to reclaim the slot early.
  pub fn add_task(&mut self, owner: NodeId, deadline_ms: u64, interval_ms: Option<u64>) -> TaskId {
    let id = TaskId(self.next_task);
    self.next_task += 1;
    self.tasks.push(TimedTask {
      id,
      owner,
      deadline_ms,
      interval_ms,
    });
    id
  }

  /// Deregisters a timed task. Unknown ids are ignored.
  pub fn remove_task(&mut self, id: TaskId) {
    self.tasks.retain(|task| task.id != id);
  }

  /// Runs the frame: the fixed-point sweep when anything is scheduled, then
  /// recursive mark resolution, and unconditionally any due timed tasks.
  /// Returns whether a frame must be redrawn.
  pub fn solve(
    &mut self,
    tree: &mut LayoutTree,
    shaper: &mut dyn TextShaper,
    events: &mut Vec<CollaboratorEvent>,
    now_ms: u64,
  ) -> bool {
    self.run_tasks(tree, now_ms);

    if self.dirty > 0 {
      self.sweep(tree, shaper, events);
      self.needs_render = true;
    }
    self.resolve_recursive(tree);

    std::mem::take(&mut self.needs_render)
  }

  fn sweep(
    &mut self,
    tree: &mut LayoutTree,
    shaper: &mut dyn TextShaper,
    events: &mut Vec<CollaboratorEvent>,
  ) {
    let mut iterations = 0;
    loop {
      iterations += 1;
      if iterations > MAX_SWEEP_ITERATIONS {
        log::error!(
          "layout failed to converge after {MAX_SWEEP_ITERATIONS} sweeps; \
           dropping {} scheduled nodes",
          self.dirty
        );
        self.force_clear(tree);
        return;
      }

      // Forward, ascending: ancestors hand down final size constraints
      // before a child computes its own size.
      for level in 1..self.buckets.len() {
        let mut i = 0;
        while i < self.buckets[level].len() {
          let id = self.buckets[level][i];
          if passes::forward(tree, self, id) {
            i += 1;
          } else {
            self.unmark(tree, id);
          }
        }
      }

      // Reverse, descending: children whose size settled only after their
      // own children did push wrap results back up.
      for level in (1..self.buckets.len()).rev() {
        let mut i = 0;
        while i < self.buckets[level].len() {
          let id = self.buckets[level][i];
          if passes::reverse(tree, self, shaper, events, id) {
            i += 1;
          } else {
            self.unmark(tree, id);
          }
        }
      }

      if self.dirty == 0 {
        return;
      }
    }
  }

  /// Drops every scheduled node. No marks carry over across frames.
  fn force_clear(&mut self, tree: &mut LayoutTree) {
    for bucket in &mut self.buckets {
      for &id in bucket.iter() {
        let node = tree.node_mut(id);
        node.dirty_index = -1;
        node.mark &= !mark::LAYOUT;
      }
      bucket.clear();
    }
    self.dirty = 0;
  }

  /// Resolves transform / visible-region bits, ancestors first so a child's
  /// transform composes onto a final parent transform.
  fn resolve_recursive(&mut self, tree: &mut LayoutTree) {
    if self.recursive.is_empty() {
      return;
    }
    let mut roots = std::mem::take(&mut self.recursive);
    roots.sort_unstable_by_key(|&(level, _)| level);
    for (_, id) in roots {
      if !tree.is_alive(id) || tree.node(id).level == 0 {
        // Left the tree since it was noted; bits re-surface on rejoin.
        continue;
      }
      if tree.node(id).mark & mark::RECURSIVE == 0 {
        // Already covered by an ancestor earlier in this pass.
        continue;
      }
      passes::resolve_marks(tree, id, 0);
    }
  }

  fn run_tasks(&mut self, tree: &mut LayoutTree, now_ms: u64) {
    let mut i = 0;
    while i < self.tasks.len() {
      if self.tasks[i].deadline_ms > now_ms {
        i += 1;
        continue;
      }
      let task = self.tasks[i];
      let owner_live = tree.is_alive(task.owner) && tree.node(task.owner).level > 0;
      if owner_live {
        self.needs_render = true;
      }
      match task.interval_ms {
        Some(interval) if tree.is_alive(task.owner) => {
          self.tasks[i].deadline_ms = now_ms + interval;
          i += 1;
        }
        _ => {
          self.tasks.swap_remove(i);
        }
      }
    }
  }
}
