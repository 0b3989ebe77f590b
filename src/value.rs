//! Property value types shared by the style cascade and the layout protocol.

/// A box dimension as authored: content-defined, fixed, or relative to the
/// parent's content box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Dimension {
  /// Size is determined by content (wrap)
  #[default]
  Auto,
  /// Fixed size in logical pixels
  Fixed(f32),
  /// Fraction of the parent content box, 1.0 == 100%
  Percent(f32),
}

impl Dimension {
  /// Resolves the dimension against a parent basis.
  ///
  /// `basis` is `None` when the parent dimension is itself undetermined
  /// (a wrap container mid-layout). Percentages against an undetermined
  /// basis resolve to `None` rather than chasing a circular dependency;
  /// callers treat that as auto.
  ///
  /// # Examples
  ///
  /// ```
  /// use reflow::Dimension;
  ///
  /// assert_eq!(Dimension::Fixed(40.0).resolve(Some(100.0)), Some(40.0));
  /// assert_eq!(Dimension::Percent(0.5).resolve(Some(100.0)), Some(50.0));
  /// assert_eq!(Dimension::Percent(0.5).resolve(None), None);
  /// assert_eq!(Dimension::Auto.resolve(Some(100.0)), None);
  /// ```
  pub fn resolve(self, basis: Option<f32>) -> Option<f32> {
    match self {
      Dimension::Auto => None,
      Dimension::Fixed(v) => Some(v),
      Dimension::Percent(p) => basis.map(|b| b * p),
    }
  }

  /// True when the dimension depends on content rather than the parent
  pub fn is_auto(self) -> bool {
    matches!(self, Dimension::Auto)
  }
}

/// An RGBA color with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
  pub r: u8,
  pub g: u8,
  pub b: u8,
  pub a: u8,
}

impl Color {
  pub const TRANSPARENT: Self = Self {
    r: 0,
    g: 0,
    b: 0,
    a: 0,
  };

  pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
    Self { r, g, b, a }
  }

  /// Componentwise linear interpolation
  pub fn lerp(self, to: Color, t: f32) -> Color {
    Color {
      r: lerp_u8(self.r, to.r, t),
      g: lerp_u8(self.g, to.g, t),
      b: lerp_u8(self.b, to.b, t),
      a: lerp_u8(self.a, to.a, t),
    }
  }
}

fn lerp_u8(from: u8, to: u8, t: f32) -> u8 {
  (f32::from(from) + (f32::from(to) - f32::from(from)) * t).round() as u8
}

fn lerp_f32(from: f32, to: f32, t: f32) -> f32 {
  from + (to - from) * t
}

/// Alignment of a child inside its parent's content box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
  #[default]
  Start,
  Center,
  End,
}

/// A settable visual property value.
///
/// The cascade engine applies these through the property accessor table
/// without knowing a node's concrete kind; the closed set of variants is
/// the whole vocabulary the table speaks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyValue {
  Dimension(Dimension),
  Float(f32),
  Color(Color),
  Bool(bool),
  Align(Align),
}

impl PropertyValue {
  /// Interpolates between two values of the same variant.
  ///
  /// Mismatched or non-interpolable variants fall back to a discrete flip
  /// at the midpoint, so a transition always lands on `to` at t == 1.
  pub fn interpolate(from: PropertyValue, to: PropertyValue, t: f32) -> PropertyValue {
    match (from, to) {
      (PropertyValue::Float(a), PropertyValue::Float(b)) => PropertyValue::Float(lerp_f32(a, b, t)),
      (PropertyValue::Color(a), PropertyValue::Color(b)) => PropertyValue::Color(a.lerp(b, t)),
      (
        PropertyValue::Dimension(Dimension::Fixed(a)),
        PropertyValue::Dimension(Dimension::Fixed(b)),
      ) => PropertyValue::Dimension(Dimension::Fixed(lerp_f32(a, b, t))),
      (
        PropertyValue::Dimension(Dimension::Percent(a)),
        PropertyValue::Dimension(Dimension::Percent(b)),
      ) => PropertyValue::Dimension(Dimension::Percent(lerp_f32(a, b, t))),
      _ => {
        if t < 0.5 {
          from
        } else {
          to
        }
      }
    }
  }
}
