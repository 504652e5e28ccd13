use crate::error::{ChartError, ChartResult};

pub use kurbo::{Affine, BezPath, Point, Rect};

/// Discrete time-step driving every animated view (a calendar year here).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Year(pub i32);

impl Year {
    /// Next year, used by the animation tick.
    pub fn next(self) -> Year {
        Year(self.0 + 1)
    }
}

impl std::fmt::Display for Year {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive year range `[first, last]` bounding an animation loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct YearRange {
    pub first: Year,
    pub last: Year,
}

impl YearRange {
    /// Create a validated range with `first <= last`.
    pub fn new(first: Year, last: Year) -> ChartResult<Self> {
        if first.0 > last.0 {
            return Err(ChartError::validation("YearRange first must be <= last"));
        }
        Ok(Self { first, last })
    }

    /// Number of years contained in the range (at least 1).
    pub fn len_years(self) -> u32 {
        (self.last.0 - self.first.0) as u32 + 1
    }

    pub fn contains(self, y: Year) -> bool {
        self.first.0 <= y.0 && y.0 <= self.last.0
    }

    /// Clamp a year into this range.
    pub fn clamp(self, y: Year) -> Year {
        Year(y.0.clamp(self.first.0, self.last.0))
    }

    /// 1-based ordinal of `y` within the range, for "Year N of M" banners.
    pub fn ordinal(self, y: Year) -> u32 {
        (self.clamp(y).0 - self.first.0) as u32 + 1
    }
}

/// One-dimensional pixel extent. `start` may exceed `end` for inverted axes
/// (screen-space y grows downward).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Span {
    pub start: f64,
    pub end: f64,
}

impl Span {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn len(self) -> f64 {
        (self.end - self.start).abs()
    }
}

/// Pixel margins reserved for axes, labels, and legends.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

/// Straight-alpha RGBA8 color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Parse `#rrggbb` hex notation. Panics on malformed input, so only for
    /// compiled-in palette constants.
    pub(crate) fn from_hex(s: &str) -> Self {
        let hex = s.strip_prefix('#').unwrap_or(s);
        assert!(hex.len() == 6, "expected #rrggbb, got '{s}'");
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).expect("hex digit");
        Self::rgb(byte(0), byte(2), byte(4))
    }

    pub fn lerp(a: Self, b: Self, t: f64) -> Self {
        fn lerp_u8(a: u8, b: u8, t: f64) -> u8 {
            let a = f64::from(a);
            let b = f64::from(b);
            (a + (b - a) * t).round().clamp(0.0, 255.0) as u8
        }

        Self {
            r: lerp_u8(a.r, b.r, t),
            g: lerp_u8(a.g, b.g, t),
            b: lerp_u8(a.b, b.b, t),
            a: lerp_u8(a.a, b.a, t),
        }
    }

    /// CSS hex form, `#rrggbb` for opaque colors, `#rrggbbaa` otherwise.
    pub fn to_css(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!(
                "#{:02x}{:02x}{:02x}{:02x}",
                self.r, self.g, self.b, self.a
            )
        }
    }
}
