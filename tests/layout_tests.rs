//! End-to-end layout tests driving the engine through whole frames.

use reflow::{
  Dimension, Engine, FlowDirection, NodeKind, NullShaper, Point, PropertyId, PropertyValue,
  ShapeError, ShapedLine, ShapedText, Size, TextConfig, TextShaper,
};

/// Deterministic monospace shaper: every glyph is 8x16, greedy wrap on
/// character boundaries. Tests use ASCII so byte offsets equal characters.
struct FixtureShaper;

const GLYPH_W: f32 = 8.0;
const LINE_H: f32 = 16.0;

impl TextShaper for FixtureShaper {
  fn shape(&mut self, text: &str, config: &TextConfig) -> Result<ShapedText, ShapeError> {
    if text.is_empty() {
      return Ok(ShapedText::default());
    }
    let per_line = match config.max_width {
      Some(w) => ((w / GLYPH_W).floor() as usize).max(1),
      None => text.len(),
    };
    let mut lines = Vec::new();
    let mut widest = 0usize;
    let mut start = 0;
    while start < text.len() {
      let end = (start + per_line).min(text.len());
      widest = widest.max(end - start);
      lines.push(ShapedLine {
        start,
        end,
        size: Size::new((end - start) as f32 * GLYPH_W, LINE_H),
      });
      start = end;
    }
    let size = Size::new(widest as f32 * GLYPH_W, lines.len() as f32 * LINE_H);
    Ok(ShapedText { lines, size })
  }
}

fn engine(width: f32, height: f32) -> Engine {
  let _ = env_logger::builder().is_test(true).try_init();
  Engine::new(Size::new(width, height))
}

fn fixed(v: f32) -> PropertyValue {
  PropertyValue::Dimension(Dimension::Fixed(v))
}

fn percent(v: f32) -> PropertyValue {
  PropertyValue::Dimension(Dimension::Percent(v))
}

#[test]
fn root_resolves_against_viewport() {
  let engine = engine(800.0, 600.0);
  let root = engine.create_node(NodeKind::Boxed);
  engine.set_property(root, PropertyId::Width, percent(1.0));
  engine.set_property(root, PropertyId::Height, percent(0.5));
  engine.set_root(root);

  let frame = engine.solve_frame(0, &mut NullShaper).unwrap();
  assert_eq!(frame.nodes[0].size, Size::new(800.0, 300.0));
}

#[test]
fn idle_frame_after_convergence_renders_nothing() {
  let engine = engine(800.0, 600.0);
  let root = engine.create_node(NodeKind::Boxed);
  engine.set_property(root, PropertyId::Width, fixed(100.0));
  engine.set_property(root, PropertyId::Height, fixed(100.0));
  engine.set_root(root);

  assert!(engine.solve_frame(0, &mut NullShaper).is_some());
  assert!(engine.solve_frame(16, &mut NullShaper).is_none());
  assert!(engine.solve_frame(32, &mut NullShaper).is_none());
}

#[test]
fn column_flow_stacks_children_with_gap() {
  let engine = engine(200.0, 200.0);
  let root = engine.create_node(NodeKind::Flow(Default::default()));
  engine.set_flow(root, FlowDirection::Column, 10.0);
  engine.set_property(root, PropertyId::Width, fixed(200.0));
  engine.set_property(root, PropertyId::Height, fixed(200.0));

  let a = engine.create_node(NodeKind::Boxed);
  engine.set_property(a, PropertyId::Width, fixed(50.0));
  engine.set_property(a, PropertyId::Height, fixed(30.0));
  let b = engine.create_node(NodeKind::Boxed);
  engine.set_property(b, PropertyId::Width, fixed(50.0));
  engine.set_property(b, PropertyId::Height, fixed(20.0));

  engine.set_root(root);
  engine.append(root, a);
  engine.append(root, b);

  engine.solve_frame(0, &mut NullShaper).unwrap();
  assert_eq!(engine.layout_of(a).offset, Point::new(0.0, 0.0));
  assert_eq!(engine.layout_of(b).offset, Point::new(0.0, 40.0));
  assert_eq!(
    engine.layout_of(b).transform.apply(Point::ZERO),
    Point::new(0.0, 40.0)
  );
}

#[test]
fn align_end_places_child_at_far_edge() {
  let engine = engine(200.0, 200.0);
  let root = engine.create_node(NodeKind::Flow(Default::default()));
  engine.set_property(root, PropertyId::Width, fixed(200.0));
  engine.set_property(root, PropertyId::Height, fixed(200.0));
  let child = engine.create_node(NodeKind::Boxed);
  engine.set_property(child, PropertyId::Width, fixed(50.0));
  engine.set_property(child, PropertyId::Height, fixed(50.0));
  engine.set_property(
    child,
    PropertyId::Align,
    PropertyValue::Align(reflow::Align::End),
  );
  engine.set_root(root);
  engine.append(root, child);

  engine.solve_frame(0, &mut NullShaper).unwrap();
  assert_eq!(engine.layout_of(child).offset, Point::new(150.0, 0.0));
}

#[test]
fn wrap_column_grows_to_content() {
  let engine = engine(400.0, 400.0);
  let root = engine.create_node(NodeKind::Flow(Default::default()));
  engine.set_property(root, PropertyId::Width, fixed(80.0));
  // height stays auto: the column wraps its children
  let child = engine.create_node(NodeKind::Boxed);
  engine.set_property(child, PropertyId::Width, fixed(40.0));
  engine.set_property(child, PropertyId::Height, fixed(25.0));
  engine.set_root(root);
  engine.append(root, child);

  engine.solve_frame(0, &mut NullShaper).unwrap();
  assert_eq!(engine.layout_of(root).layout_size, Size::new(80.0, 25.0));
}

#[test]
fn text_change_reflows_wrap_height_chain_in_one_frame() {
  let engine = engine(400.0, 400.0);
  let root = engine.create_node(NodeKind::Flow(Default::default()));
  engine.set_property(root, PropertyId::Width, fixed(80.0));

  let header = engine.create_node(NodeKind::Boxed);
  engine.set_property(header, PropertyId::Width, fixed(80.0));
  engine.set_property(header, PropertyId::Height, fixed(20.0));

  let text = engine.create_node(NodeKind::Text(Default::default()));
  engine.set_property(text, PropertyId::Width, fixed(40.0));
  engine.set_text(text, "helloworld"); // 10 chars, 5 per line: 2 lines

  let footer = engine.create_node(NodeKind::Boxed);
  engine.set_property(footer, PropertyId::Width, fixed(80.0));
  engine.set_property(footer, PropertyId::Height, fixed(20.0));

  engine.set_root(root);
  engine.append(root, header);
  engine.append(root, text);
  engine.append(root, footer);

  engine.solve_frame(0, &mut FixtureShaper).unwrap();
  assert_eq!(engine.layout_of(text).layout_size, Size::new(40.0, 32.0));
  assert_eq!(engine.layout_of(footer).offset, Point::new(0.0, 52.0));
  assert_eq!(engine.layout_of(root).layout_size, Size::new(80.0, 72.0));

  // Longer text: 15 chars, 3 lines. Only the text node is re-marked; the
  // parent must still re-typeset within the same frame, moving the footer
  // down and growing the wrap-height column.
  engine.set_text(text, "helloworldagain");
  engine.solve_frame(16, &mut FixtureShaper).unwrap();
  assert_eq!(engine.layout_of(text).layout_size, Size::new(40.0, 48.0));
  assert_eq!(engine.layout_of(header).offset, Point::new(0.0, 0.0));
  assert_eq!(engine.layout_of(text).offset, Point::new(0.0, 20.0));
  assert_eq!(engine.layout_of(footer).offset, Point::new(0.0, 68.0));
  assert_eq!(engine.layout_of(root).layout_size, Size::new(80.0, 88.0));
}

#[test]
fn unconstrained_text_shapes_one_line() {
  let engine = engine(400.0, 400.0);
  let root = engine.create_node(NodeKind::Flow(Default::default()));
  let text = engine.create_node(NodeKind::Text(Default::default()));
  engine.set_text(text, "abcdef");
  engine.set_root(root);
  engine.append(root, text);

  engine.solve_frame(0, &mut FixtureShaper).unwrap();
  assert_eq!(engine.layout_of(text).layout_size, Size::new(48.0, 16.0));
}

#[test]
fn shaper_failure_degrades_and_reports() {
  let engine = engine(400.0, 400.0);
  let root = engine.create_node(NodeKind::Flow(Default::default()));
  let text = engine.create_node(NodeKind::Text(Default::default()));
  engine.set_text(text, "unshapable");
  engine.set_root(root);
  engine.append(root, text);

  // The frame still converges and renders; the failure arrives as an event.
  assert!(engine.solve_frame(0, &mut NullShaper).is_some());
  let events = engine.take_events();
  assert_eq!(events.len(), 1);
  assert!(matches!(
    events[0],
    reflow::CollaboratorEvent::ShapeFailed { node, error: ShapeError::NoFont } if node == text
  ));
  assert_eq!(engine.layout_of(text).layout_size, Size::ZERO);
  assert!(engine.take_events().is_empty());
}

#[test]
fn image_preserves_aspect_from_one_axis() {
  let engine = engine(400.0, 400.0);
  let root = engine.create_node(NodeKind::Flow(Default::default()));
  let image = engine.create_node(NodeKind::Image(Default::default()));
  engine.set_image_natural_size(image, Size::new(200.0, 100.0));
  engine.set_property(image, PropertyId::Width, fixed(50.0));
  engine.set_root(root);
  engine.append(root, image);

  engine.solve_frame(0, &mut NullShaper).unwrap();
  assert_eq!(engine.layout_of(image).layout_size, Size::new(50.0, 25.0));
}

#[test]
fn scroll_offset_is_clamped_to_content_extent() {
  let engine = engine(400.0, 400.0);
  let scroll = engine.create_node(NodeKind::Scroll(Default::default()));
  engine.set_property(scroll, PropertyId::Width, fixed(100.0));
  engine.set_property(scroll, PropertyId::Height, fixed(100.0));
  let content = engine.create_node(NodeKind::Boxed);
  engine.set_property(content, PropertyId::Width, fixed(300.0));
  engine.set_property(content, PropertyId::Height, fixed(400.0));
  engine.set_root(scroll);
  engine.append(scroll, content);
  engine.solve_frame(0, &mut NullShaper).unwrap();

  engine.set_scroll_offset(scroll, Point::new(1000.0, 50.0));
  engine.solve_frame(16, &mut NullShaper).unwrap();

  let offset = engine.with_state(|s| match &s.tree.node(scroll).kind {
    NodeKind::Scroll(state) => state.offset,
    _ => unreachable!(),
  });
  assert_eq!(offset, Point::new(200.0, 50.0));
  // Content is shifted by the scroll offset.
  assert_eq!(
    engine.layout_of(content).transform.apply(Point::ZERO),
    Point::new(-200.0, -50.0)
  );
}

#[test]
fn hidden_subtree_leaves_layout_and_paint() {
  let engine = engine(200.0, 200.0);
  let root = engine.create_node(NodeKind::Flow(Default::default()));
  engine.set_property(root, PropertyId::Width, fixed(100.0));
  let a = engine.create_node(NodeKind::Boxed);
  engine.set_property(a, PropertyId::Width, fixed(50.0));
  engine.set_property(a, PropertyId::Height, fixed(30.0));
  let b = engine.create_node(NodeKind::Boxed);
  engine.set_property(b, PropertyId::Width, fixed(50.0));
  engine.set_property(b, PropertyId::Height, fixed(30.0));
  engine.set_root(root);
  engine.append(root, a);
  engine.append(root, b);
  engine.solve_frame(0, &mut NullShaper).unwrap();
  assert_eq!(engine.layout_of(b).offset.y, 30.0);

  engine.set_property(a, PropertyId::Visible, PropertyValue::Bool(false));
  let frame = engine.solve_frame(16, &mut NullShaper).unwrap();
  assert_eq!(engine.layout_of(b).offset.y, 0.0);
  assert!(frame.nodes.iter().all(|n| n.node != a));
}

#[test]
fn reattached_subtree_resumes_pending_marks() {
  let engine = engine(200.0, 200.0);
  let root = engine.create_node(NodeKind::Flow(Default::default()));
  engine.set_property(root, PropertyId::Width, fixed(100.0));
  let child = engine.create_node(NodeKind::Boxed);
  engine.set_property(child, PropertyId::Width, fixed(50.0));
  engine.set_property(child, PropertyId::Height, fixed(30.0));
  engine.set_root(root);
  engine.append(root, child);
  engine.solve_frame(0, &mut NullShaper).unwrap();

  engine.remove_node(child);
  engine.solve_frame(16, &mut NullShaper);
  // Mutating a detached node accumulates marks without scheduling.
  engine.set_property(child, PropertyId::Height, fixed(60.0));
  assert!(engine.solve_frame(32, &mut NullShaper).is_none());

  engine.append(root, child);
  engine.solve_frame(48, &mut NullShaper).unwrap();
  assert_eq!(engine.layout_of(child).layout_size, Size::new(50.0, 60.0));
  assert_eq!(engine.layout_of(root).layout_size.height, 60.0);
}

#[test]
fn viewport_change_rescales_percent_sizes() {
  let engine = engine(800.0, 600.0);
  let root = engine.create_node(NodeKind::Boxed);
  engine.set_property(root, PropertyId::Width, percent(1.0));
  engine.set_property(root, PropertyId::Height, percent(1.0));
  engine.set_root(root);
  engine.solve_frame(0, &mut NullShaper).unwrap();
  assert_eq!(engine.layout_of(root).layout_size, Size::new(800.0, 600.0));

  engine.set_viewport(Size::new(1024.0, 768.0));
  engine.solve_frame(16, &mut NullShaper).unwrap();
  assert_eq!(engine.layout_of(root).layout_size, Size::new(1024.0, 768.0));
}

#[test]
fn margins_offset_the_border_box() {
  let engine = engine(200.0, 200.0);
  let root = engine.create_node(NodeKind::Flow(Default::default()));
  engine.set_property(root, PropertyId::Width, fixed(100.0));
  let child = engine.create_node(NodeKind::Boxed);
  engine.set_property(child, PropertyId::Width, fixed(40.0));
  engine.set_property(child, PropertyId::Height, fixed(40.0));
  engine.set_property(child, PropertyId::MarginLeft, PropertyValue::Float(10.0));
  engine.set_property(child, PropertyId::MarginTop, PropertyValue::Float(5.0));
  engine.set_root(root);
  engine.append(root, child);

  engine.solve_frame(0, &mut NullShaper).unwrap();
  // Outer size includes margins; the transform points at the border box.
  assert_eq!(engine.layout_of(child).layout_size, Size::new(50.0, 45.0));
  assert_eq!(
    engine.layout_of(child).transform.apply(Point::ZERO),
    Point::new(10.0, 5.0)
  );
  assert_eq!(engine.layout_of(root).layout_size.height, 45.0);
}

#[test]
fn offscreen_node_is_out_of_viewport() {
  let engine = engine(100.0, 100.0);
  let root = engine.create_node(NodeKind::Flow(Default::default()));
  engine.set_property(root, PropertyId::Width, fixed(100.0));
  let near = engine.create_node(NodeKind::Boxed);
  engine.set_property(near, PropertyId::Width, fixed(50.0));
  engine.set_property(near, PropertyId::Height, fixed(50.0));
  let far = engine.create_node(NodeKind::Boxed);
  engine.set_property(far, PropertyId::Width, fixed(50.0));
  engine.set_property(far, PropertyId::Height, fixed(50.0));
  engine.set_property(far, PropertyId::MarginTop, PropertyValue::Float(500.0));
  engine.set_root(root);
  engine.append(root, near);
  engine.append(root, far);

  engine.solve_frame(0, &mut NullShaper).unwrap();
  assert!(engine.layout_of(near).in_viewport);
  assert!(!engine.layout_of(far).in_viewport);
}

#[test]
fn one_shot_task_fires_once_at_its_deadline() {
  let engine = engine(100.0, 100.0);
  let root = engine.create_node(NodeKind::Boxed);
  engine.set_property(root, PropertyId::Width, fixed(10.0));
  engine.set_property(root, PropertyId::Height, fixed(10.0));
  engine.set_root(root);
  engine.solve_frame(0, &mut NullShaper).unwrap();

  engine.add_timed_task(root, 100, None);
  assert!(engine.solve_frame(50, &mut NullShaper).is_none());
  assert!(engine.solve_frame(150, &mut NullShaper).is_some());
  assert!(engine.solve_frame(200, &mut NullShaper).is_none());
}

#[test]
fn interval_task_rearms_until_removed() {
  let engine = engine(100.0, 100.0);
  let root = engine.create_node(NodeKind::Boxed);
  engine.set_property(root, PropertyId::Width, fixed(10.0));
  engine.set_property(root, PropertyId::Height, fixed(10.0));
  engine.set_root(root);
  engine.solve_frame(0, &mut NullShaper).unwrap();

  let task = engine.add_timed_task(root, 100, Some(100));
  assert!(engine.solve_frame(100, &mut NullShaper).is_some());
  assert!(engine.solve_frame(150, &mut NullShaper).is_none());
  assert!(engine.solve_frame(250, &mut NullShaper).is_some());
  engine.remove_timed_task(task);
  assert!(engine.solve_frame(400, &mut NullShaper).is_none());
}
