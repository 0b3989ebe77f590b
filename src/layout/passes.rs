//! The two-pass layout protocol.
//!
//! The forward pass runs root-to-leaf: a node computes its own size from the
//! parent's already-finalized content box. Wrap axes (content-determined)
//! cannot be resolved here; the node stays scheduled and reports back in the
//! reverse pass, which runs leaf-to-root: children's sizes are final, the
//! node positions them, finalizes any wrap size from the aggregate and
//! notifies its parent when its own outer size changed.
//!
//! Transform and visible-region work is separate from sizing: the recursive
//! mark bits are resolved after the sweep by [`resolve_marks`], which ORs
//! inherited bits into each visited descendant instead of marking every
//! descendant individually.

use crate::geometry::{Point, Rect, Size};
use crate::layout::node::{mark, ChildChange, FlowDirection, NodeId, NodeKind};
use crate::layout::text::{CollaboratorEvent, TextConfig, TextShaper};
use crate::layout::tree::LayoutTree;
use crate::scheduler::Scheduler;
use crate::value::Align;

/// Forward pass entry point. Returns true when the node must stay scheduled
/// for the reverse pass.
pub fn forward(tree: &mut LayoutTree, sched: &mut Scheduler, id: NodeId) -> bool {
  if tree.node(id).mark & mark::SIZE != 0 {
    compute_size(tree, sched, id);
    tree.node_mut(id).mark &= !mark::SIZE;
  }
  tree.node(id).mark & (mark::TYPESETTING | mark::SCROLL) != 0
}

/// Resolves the parent's content box as a percentage basis. A wrap axis of
/// the parent yields `None`: a percentage against an undetermined dimension
/// is treated as auto rather than chasing a circular dependency.
fn parent_basis(tree: &LayoutTree, id: NodeId) -> (Option<f32>, Option<f32>) {
  match tree.node(id).parent {
    Some(parent) => {
      let p = tree.node(parent);
      let w = if p.wrap_x {
        None
      } else {
        Some(p.content_size.width)
      };
      let h = if p.wrap_y {
        None
      } else {
        Some(p.content_size.height)
      };
      (w, h)
    }
    None => {
      let viewport = tree.viewport();
      (Some(viewport.width), Some(viewport.height))
    }
  }
}

fn compute_size(tree: &mut LayoutTree, sched: &mut Scheduler, id: NodeId) {
  let (basis_w, basis_h) = parent_basis(tree, id);

  let (style_w, style_h, natural) = {
    let node = tree.node(id);
    let natural = match &node.kind {
      NodeKind::Image(image) => Some(image.natural),
      _ => None,
    };
    (node.style.width, node.style.height, natural)
  };

  let mut width = style_w.resolve(basis_w);
  let mut height = style_h.resolve(basis_h);

  // Images fall back to their natural size, preserving aspect when only one
  // axis is given.
  if let Some(natural) = natural {
    match (width, height) {
      (None, None) => {
        width = Some(natural.width);
        height = Some(natural.height);
      }
      (Some(w), None) if natural.width > 0.0 => {
        height = Some(w * natural.height / natural.width);
      }
      (None, Some(h)) if natural.height > 0.0 => {
        width = Some(h * natural.width / natural.height);
      }
      _ => {}
    }
  }

  let wrap_x = width.is_none();
  let wrap_y = height.is_none();

  let node = tree.node_mut(id);
  let old_content = node.content_size;
  let old_wrap = (node.wrap_x, node.wrap_y);
  let old_layout = node.layout_size;

  // Wrap axes keep their previous extent until the reverse pass finalizes
  // them from children; determined axes take the resolved value now.
  let content = Size::new(
    width.unwrap_or(old_content.width).max(0.0),
    height.unwrap_or(old_content.height).max(0.0),
  );
  node.content_size = content;
  node.wrap_x = wrap_x;
  node.wrap_y = wrap_y;
  node.layout_size = outer_size(content, node);

  let content_changed = old_content != content || old_wrap != (wrap_x, wrap_y);
  let layout_changed = old_layout != tree.node(id).layout_size;

  if content_changed || wrap_x || wrap_y {
    // The content box moved under the children: they must be re-typeset,
    // and any child sized relative to this box must re-resolve.
    tree.mark_layout(sched, id, mark::TYPESETTING);
    if content_changed {
      for child in tree.child_ids(id) {
        tree.mark_layout(sched, child, mark::SIZE);
      }
    }
  }
  if content_changed || layout_changed {
    tree.mark_layout(sched, id, mark::RECURSIVE);
  }
  if layout_changed {
    if let Some(parent) = tree.node(id).parent {
      tree.on_child_layout_change(sched, parent, id, ChildChange::Size);
    }
  }
}

/// Outer size: content plus padding plus margin.
fn outer_size(content: Size, node: &crate::layout::node::LayoutNode) -> Size {
  Size::new(
    content.width + node.style.padding.horizontal() + node.style.margin.horizontal(),
    content.height + node.style.padding.vertical() + node.style.margin.vertical(),
  )
}

/// Reverse pass entry point. Returns true when the node must stay scheduled,
/// which never happens today: every kind fully resolves in one reverse call.
pub fn reverse(
  tree: &mut LayoutTree,
  sched: &mut Scheduler,
  shaper: &mut dyn TextShaper,
  events: &mut Vec<CollaboratorEvent>,
  id: NodeId,
) -> bool {
  let bits = tree.node(id).mark;
  if bits & (mark::TYPESETTING | mark::SCROLL) == 0 {
    return false;
  }

  if matches!(tree.node(id).kind, NodeKind::Text(_)) {
    reverse_text(tree, sched, shaper, events, id);
  } else if matches!(tree.node(id).kind, NodeKind::Flow(_)) {
    reverse_flow(tree, sched, id);
  } else if matches!(tree.node(id).kind, NodeKind::Scroll(_)) {
    reverse_scroll(tree, sched, id);
  } else {
    reverse_box(tree, sched, id);
  }

  tree.node_mut(id).mark &= !(mark::TYPESETTING | mark::SCROLL);
  false
}

fn align_offset(align: Align, free: f32) -> f32 {
  match align {
    Align::Start => 0.0,
    Align::Center => (free / 2.0).max(0.0),
    Align::End => free.max(0.0),
  }
}

/// Writes a finalized wrap content size back and propagates the change.
fn finalize_content(tree: &mut LayoutTree, sched: &mut Scheduler, id: NodeId, content: Size) {
  let node = tree.node_mut(id);
  let old_layout = node.layout_size;
  if node.content_size == content {
    return;
  }
  node.content_size = content;
  node.layout_size = outer_size(content, node);
  let layout_changed = old_layout != tree.node(id).layout_size;
  tree.mark_layout(sched, id, mark::RECURSIVE);
  if layout_changed {
    if let Some(parent) = tree.node(id).parent {
      tree.on_child_layout_change(sched, parent, id, ChildChange::Size);
    }
  }
}

fn set_child_offset(tree: &mut LayoutTree, sched: &mut Scheduler, child: NodeId, offset: Point) {
  let node = tree.node_mut(child);
  if node.offset != offset {
    node.offset = offset;
    tree.mark_layout(sched, child, mark::RECURSIVE);
  }
}

fn reverse_flow(tree: &mut LayoutTree, sched: &mut Scheduler, id: NodeId) {
  let (direction, gap) = match &tree.node(id).kind {
    NodeKind::Flow(flow) => (flow.direction, flow.gap),
    _ => unreachable!("reverse_flow on a non-flow node"),
  };
  let children: Vec<NodeId> = tree
    .child_ids(id)
    .into_iter()
    .filter(|&c| tree.node(c).visible)
    .collect();

  // First aggregate, so wrap axes are final before cross alignment.
  let mut main_total = 0.0_f32;
  let mut cross_max = 0.0_f32;
  for &child in &children {
    let size = tree.node(child).layout_size;
    let (main, cross) = match direction {
      FlowDirection::Column => (size.height, size.width),
      FlowDirection::Row => (size.width, size.height),
    };
    main_total += main;
    cross_max = cross_max.max(cross);
  }
  if !children.is_empty() {
    main_total += gap * (children.len() - 1) as f32;
  }

  let node = tree.node(id);
  let content = {
    let (mut w, mut h) = (node.content_size.width, node.content_size.height);
    match direction {
      FlowDirection::Column => {
        if node.wrap_x {
          w = cross_max;
        }
        if node.wrap_y {
          h = main_total;
        }
      }
      FlowDirection::Row => {
        if node.wrap_x {
          w = main_total;
        }
        if node.wrap_y {
          h = cross_max;
        }
      }
    }
    Size::new(w, h)
  };
  finalize_content(tree, sched, id, content);

  let content = tree.node(id).content_size;
  let mut cursor = 0.0_f32;
  for &child in &children {
    let (size, align) = {
      let c = tree.node(child);
      (c.layout_size, c.style.align)
    };
    let offset = match direction {
      FlowDirection::Column => Point::new(align_offset(align, content.width - size.width), cursor),
      FlowDirection::Row => Point::new(cursor, align_offset(align, content.height - size.height)),
    };
    set_child_offset(tree, sched, child, offset);
    cursor += match direction {
      FlowDirection::Column => size.height + gap,
      FlowDirection::Row => size.width + gap,
    };
  }
}

fn reverse_box(tree: &mut LayoutTree, sched: &mut Scheduler, id: NodeId) {
  let children: Vec<NodeId> = tree
    .child_ids(id)
    .into_iter()
    .filter(|&c| tree.node(c).visible)
    .collect();

  let mut extent = Size::ZERO;
  for &child in &children {
    let size = tree.node(child).layout_size;
    extent.width = extent.width.max(size.width);
    extent.height = extent.height.max(size.height);
  }

  let node = tree.node(id);
  let content = Size::new(
    if node.wrap_x {
      extent.width
    } else {
      node.content_size.width
    },
    if node.wrap_y {
      extent.height
    } else {
      node.content_size.height
    },
  );
  finalize_content(tree, sched, id, content);

  let content = tree.node(id).content_size;
  for &child in &children {
    let (size, align) = {
      let c = tree.node(child);
      (c.layout_size, c.style.align)
    };
    let offset = Point::new(align_offset(align, content.width - size.width), 0.0);
    set_child_offset(tree, sched, child, offset);
  }
}

fn reverse_scroll(tree: &mut LayoutTree, sched: &mut Scheduler, id: NodeId) {
  reverse_box(tree, sched, id);

  // Content extent drives the scroll clamp; children keep natural offsets.
  let mut extent = Size::ZERO;
  for child in tree.child_ids(id) {
    let c = tree.node(child);
    if !c.visible {
      continue;
    }
    extent.width = extent.width.max(c.offset.x + c.layout_size.width);
    extent.height = extent.height.max(c.offset.y + c.layout_size.height);
  }

  let content = tree.node(id).content_size;
  let node = tree.node_mut(id);
  if let NodeKind::Scroll(scroll) = &mut node.kind {
    scroll.content_extent = extent;
    let max_x = (extent.width - content.width).max(0.0);
    let max_y = (extent.height - content.height).max(0.0);
    let clamped = Point::new(
      scroll.offset.x.clamp(0.0, max_x),
      scroll.offset.y.clamp(0.0, max_y),
    );
    if clamped != scroll.offset {
      scroll.offset = clamped;
    }
  }
  tree.mark_layout(sched, id, mark::R_TRANSFORM);
}

fn reverse_text(
  tree: &mut LayoutTree,
  sched: &mut Scheduler,
  shaper: &mut dyn TextShaper,
  events: &mut Vec<CollaboratorEvent>,
  id: NodeId,
) {
  let (result, config) = {
    let node = tree.node(id);
    let NodeKind::Text(state) = &node.kind else {
      unreachable!("reverse_text on a non-text node");
    };
    let max_width = if node.wrap_x {
      None
    } else {
      Some(node.content_size.width)
    };
    let config = TextConfig {
      max_width,
      font_size: state.font_size,
    };
    // A re-typeset at an unchanged constraint reuses the previous shaping.
    // Text and font mutations invalidate `shaped_for_width`, so a stale
    // result can never be reused.
    if max_width.is_some() && state.shaped_for_width == max_width {
      if let Some(shaped) = &state.shaped {
        (Ok(shaped.clone()), config)
      } else {
        (shaper.shape(&state.text, &config), config)
      }
    } else {
      (shaper.shape(&state.text, &config), config)
    }
  };

  match result {
    Ok(shaped) => {
      let size = shaped.size;
      let node = tree.node_mut(id);
      if let NodeKind::Text(state) = &mut node.kind {
        state.shaped = Some(shaped);
        state.shaped_for_width = config.max_width;
      }
      let content = Size::new(
        if tree.node(id).wrap_x {
          size.width
        } else {
          tree.node(id).content_size.width
        },
        if tree.node(id).wrap_y {
          size.height
        } else {
          tree.node(id).content_size.height
        },
      );
      finalize_content(tree, sched, id, content);
    }
    Err(error) => {
      // Degrade: keep the previous (or zero) size so layout converges, and
      // let the owner hear about it.
      events.push(CollaboratorEvent::ShapeFailed { node: id, error });
    }
  }
}

/// Resolves the recursive transform / visible-region marks for the subtree
/// rooted at `id`. `inherited` carries the OR of ancestor bits so a single
/// mark high in the tree flows down without per-descendant re-marking.
pub fn resolve_marks(tree: &mut LayoutTree, id: NodeId, inherited: u32) {
  let own = tree.node(id).mark & mark::RECURSIVE;
  let effective = own | inherited;
  if effective == 0 {
    return;
  }

  if effective & mark::R_TRANSFORM != 0 {
    let base = match tree.node(id).parent {
      Some(parent) => {
        let p = tree.node(parent);
        let inside = p.offset_inside();
        p.transform.then_translate(inside.x, inside.y)
      }
      None => crate::geometry::Transform::IDENTITY,
    };
    let node = tree.node_mut(id);
    node.transform = base.then_translate(
      node.offset.x + node.style.margin.left,
      node.offset.y + node.style.margin.top,
    );
  }

  if effective & mark::R_VISIBLE_REGION != 0 {
    let viewport = tree.viewport();
    let node = tree.node(id);
    let border = node.border_size();
    let bounds = node
      .transform
      .apply_rect(Rect::new(0.0, 0.0, border.width, border.height));
    let viewport_rect = Rect::new(0.0, 0.0, viewport.width, viewport.height);
    tree.node_mut(id).visible_region = bounds.intersects(viewport_rect);
  }

  tree.node_mut(id).mark &= !mark::RECURSIVE;

  for child in tree.child_ids(id) {
    if tree.node(child).visible {
      resolve_marks(tree, child, effective);
    }
  }
}
