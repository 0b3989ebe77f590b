//! Core geometry types for layout and the painter contract.
//!
//! All units are logical pixels. The coordinate system has its origin at the
//! top-left corner: positive X extends to the right, positive Y downward.

use std::fmt;
use std::ops::Mul;

/// A 2D point in logical pixel space.
///
/// # Examples
///
/// ```
/// use reflow::Point;
///
/// let p = Point::new(10.0, 20.0);
/// assert_eq!(p.x, 10.0);
/// assert_eq!(Point::ZERO, Point::new(0.0, 0.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
  pub x: f32,
  pub y: f32,
}

impl Point {
  /// The zero point at the origin (0, 0)
  pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

  /// Creates a new point at the given coordinates
  pub const fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }

  /// Translates this point by another point's coordinates
  pub fn translate(self, other: Point) -> Self {
    Self {
      x: self.x + other.x,
      y: self.y + other.y,
    }
  }
}

/// A 2D size (width and height).
///
/// # Examples
///
/// ```
/// use reflow::Size;
///
/// let s = Size::new(100.0, 50.0);
/// assert_eq!(s.area(), 5000.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
  pub width: f32,
  pub height: f32,
}

impl Size {
  /// A size with zero width and height
  pub const ZERO: Self = Self {
    width: 0.0,
    height: 0.0,
  };

  /// Creates a new size
  pub const fn new(width: f32, height: f32) -> Self {
    Self { width, height }
  }

  /// Returns width * height
  pub fn area(self) -> f32 {
    self.width * self.height
  }

  /// True when both dimensions are zero or negative
  pub fn is_empty(self) -> bool {
    self.width <= 0.0 || self.height <= 0.0
  }
}

/// An axis-aligned rectangle defined by origin and size.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
  pub origin: Point,
  pub size: Size,
}

impl Rect {
  /// An empty rectangle at the origin
  pub const ZERO: Self = Self {
    origin: Point::ZERO,
    size: Size::ZERO,
  };

  /// Creates a rectangle from origin coordinates and size
  pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
    Self {
      origin: Point::new(x, y),
      size: Size::new(width, height),
    }
  }

  pub fn min_x(self) -> f32 {
    self.origin.x
  }

  pub fn min_y(self) -> f32 {
    self.origin.y
  }

  pub fn max_x(self) -> f32 {
    self.origin.x + self.size.width
  }

  pub fn max_y(self) -> f32 {
    self.origin.y + self.size.height
  }

  /// Whether this rectangle overlaps `other` (shared edges do not count)
  pub fn intersects(self, other: Rect) -> bool {
    self.min_x() < other.max_x()
      && other.min_x() < self.max_x()
      && self.min_y() < other.max_y()
      && other.min_y() < self.max_y()
  }

  /// Whether the point lies inside this rectangle
  pub fn contains(self, p: Point) -> bool {
    p.x >= self.min_x() && p.x < self.max_x() && p.y >= self.min_y() && p.y < self.max_y()
  }
}

/// Per-edge offsets (margins, padding).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EdgeOffsets {
  pub top: f32,
  pub right: f32,
  pub bottom: f32,
  pub left: f32,
}

impl EdgeOffsets {
  pub const ZERO: Self = Self {
    top: 0.0,
    right: 0.0,
    bottom: 0.0,
    left: 0.0,
  };

  pub const fn new(top: f32, right: f32, bottom: f32, left: f32) -> Self {
    Self {
      top,
      right,
      bottom,
      left,
    }
  }

  /// Sum of left and right offsets
  pub fn horizontal(self) -> f32 {
    self.left + self.right
  }

  /// Sum of top and bottom offsets
  pub fn vertical(self) -> f32 {
    self.top + self.bottom
  }
}

/// A 2D affine transform.
///
/// Stored as the six coefficients of the matrix
///
/// ```text
/// | a c e |
/// | b d f |
/// | 0 0 1 |
/// ```
///
/// Nodes expose their final transform to the painter once the recursive
/// transform mark has been resolved; the painter never recomputes it.
///
/// # Examples
///
/// ```
/// use reflow::{Point, Transform};
///
/// let t = Transform::translation(10.0, 5.0);
/// assert_eq!(t.apply(Point::new(1.0, 2.0)), Point::new(11.0, 7.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
  pub a: f32,
  pub b: f32,
  pub c: f32,
  pub d: f32,
  pub e: f32,
  pub f: f32,
}

impl Transform {
  /// The identity transform
  pub const IDENTITY: Self = Self {
    a: 1.0,
    b: 0.0,
    c: 0.0,
    d: 1.0,
    e: 0.0,
    f: 0.0,
  };

  /// A pure translation
  pub const fn translation(x: f32, y: f32) -> Self {
    Self {
      a: 1.0,
      b: 0.0,
      c: 0.0,
      d: 1.0,
      e: x,
      f: y,
    }
  }

  /// Returns this transform followed by a translation
  pub fn then_translate(self, x: f32, y: f32) -> Self {
    self * Self::translation(x, y)
  }

  /// Applies the transform to a point
  pub fn apply(self, p: Point) -> Point {
    Point {
      x: self.a * p.x + self.c * p.y + self.e,
      y: self.b * p.x + self.d * p.y + self.f,
    }
  }

  /// Transforms an axis-aligned rectangle, returning its axis-aligned
  /// bounding box under this transform.
  pub fn apply_rect(self, r: Rect) -> Rect {
    let p0 = self.apply(r.origin);
    let p1 = self.apply(Point::new(r.max_x(), r.min_y()));
    let p2 = self.apply(Point::new(r.min_x(), r.max_y()));
    let p3 = self.apply(Point::new(r.max_x(), r.max_y()));
    let min_x = p0.x.min(p1.x).min(p2.x).min(p3.x);
    let min_y = p0.y.min(p1.y).min(p2.y).min(p3.y);
    let max_x = p0.x.max(p1.x).max(p2.x).max(p3.x);
    let max_y = p0.y.max(p1.y).max(p2.y).max(p3.y);
    Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
  }
}

impl Default for Transform {
  fn default() -> Self {
    Self::IDENTITY
  }
}

impl Mul for Transform {
  type Output = Transform;

  /// Composes two transforms: `self * rhs` applies `rhs` first.
  fn mul(self, rhs: Transform) -> Transform {
    Transform {
      a: self.a * rhs.a + self.c * rhs.b,
      b: self.b * rhs.a + self.d * rhs.b,
      c: self.a * rhs.c + self.c * rhs.d,
      d: self.b * rhs.c + self.d * rhs.d,
      e: self.a * rhs.e + self.c * rhs.f + self.e,
      f: self.b * rhs.e + self.d * rhs.f + self.f,
    }
  }
}

impl fmt::Display for Transform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "matrix({}, {}, {}, {}, {}, {})",
      self.a, self.b, self.c, self.d, self.e, self.f
    )
  }
}
