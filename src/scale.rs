use crate::{
    core::{Rgba8, Span},
    data::{Indices, Metric},
    projection::RankedPoint,
};

/// Headroom multiplier for ranking position domains so the longest bar never
/// touches the plot edge.
pub const RANKING_HEADROOM: f64 = 1.1;

/// Linear value-to-pixel mapping.
///
/// A degenerate domain (min == max) maps every value to the range start
/// instead of dividing by zero.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LinearScale {
    pub d0: f64,
    pub d1: f64,
    pub r0: f64,
    pub r1: f64,
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: Span) -> Self {
        Self {
            d0: domain.0,
            d1: domain.1,
            r0: range.start,
            r1: range.end,
        }
    }

    pub fn map(&self, v: f64) -> f64 {
        let width = self.d1 - self.d0;
        if width == 0.0 || !width.is_finite() {
            return self.r0;
        }
        let t = (v - self.d0) / width;
        self.r0 + t * (self.r1 - self.r0)
    }

    /// Round tick values covering the domain, aiming for `count` ticks.
    /// Step sizes are powers of ten scaled by 1, 2, or 5.
    pub fn ticks(&self, count: usize) -> Vec<f64> {
        let (lo, hi) = (self.d0.min(self.d1), self.d0.max(self.d1));
        if lo == hi || count == 0 {
            return vec![lo];
        }
        let step = tick_step(lo, hi, count);
        let start = (lo / step).ceil();
        let stop = (hi / step).floor();
        let mut out = Vec::new();
        let mut i = start;
        while i <= stop {
            out.push(i * step);
            i += 1.0;
        }
        out
    }

    /// Expand the domain outward to round tick boundaries.
    pub fn nice(mut self, count: usize) -> Self {
        let (lo, hi) = (self.d0.min(self.d1), self.d0.max(self.d1));
        if lo == hi || count == 0 {
            return self;
        }
        let step = tick_step(lo, hi, count);
        let nlo = (lo / step).floor() * step;
        let nhi = (hi / step).ceil() * step;
        if self.d0 <= self.d1 {
            self.d0 = nlo;
            self.d1 = nhi;
        } else {
            self.d0 = nhi;
            self.d1 = nlo;
        }
        self
    }
}

fn tick_step(lo: f64, hi: f64, count: usize) -> f64 {
    let raw = (hi - lo) / count as f64;
    let power = raw.log10().floor();
    let base = 10f64.powf(power);
    let err = raw / base;
    let factor = if err >= 50f64.sqrt() {
        10.0
    } else if err >= 10f64.sqrt() {
        5.0
    } else if err >= 2f64.sqrt() {
        2.0
    } else {
        1.0
    };
    base * factor
}

/// Ordinal band layout for bar rows: every key gets an equal-height band
/// with proportional inner/outer padding.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BandScale {
    domain: Vec<String>,
    range: Span,
    padding: f64,
}

impl BandScale {
    pub fn new<I, S>(keys: I, range: Span, padding: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            domain: keys.into_iter().map(Into::into).collect(),
            range,
            padding: padding.clamp(0.0, 1.0),
        }
    }

    fn step(&self) -> f64 {
        let n = self.domain.len().max(1) as f64;
        (self.range.end - self.range.start) / (n + self.padding)
    }

    /// Leading edge of the band for `key`, `None` for unknown keys.
    pub fn position(&self, key: &str) -> Option<f64> {
        let i = self.domain.iter().position(|k| k == key)?;
        let step = self.step();
        Some(self.range.start + step * self.padding + i as f64 * step)
    }

    pub fn bandwidth(&self) -> f64 {
        (self.step() * (1.0 - self.padding)).max(0.0)
    }

    pub fn len(&self) -> usize {
        self.domain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domain.is_empty()
    }
}

/// Sequential color mapping over a piecewise-linear ramp.
///
/// A degenerate domain resolves to the ramp midpoint so all-equal snapshots
/// still get a defined color.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SequentialScale {
    pub d0: f64,
    pub d1: f64,
    stops: Vec<Rgba8>,
}

impl SequentialScale {
    pub fn yl_or_rd(domain: (f64, f64)) -> Self {
        Self {
            d0: domain.0,
            d1: domain.1,
            stops: YL_OR_RD.iter().map(|s| Rgba8::from_hex(s)).collect(),
        }
    }

    pub fn color(&self, v: f64) -> Rgba8 {
        let width = self.d1 - self.d0;
        let t = if width == 0.0 || !width.is_finite() {
            0.5
        } else {
            ((v - self.d0) / width).clamp(0.0, 1.0)
        };
        self.ramp(t)
    }

    fn ramp(&self, t: f64) -> Rgba8 {
        let n = self.stops.len();
        debug_assert!(n >= 2);
        let scaled = t * (n - 1) as f64;
        let i = (scaled.floor() as usize).min(n - 2);
        Rgba8::lerp(self.stops[i], self.stops[i + 1], scaled - i as f64)
    }

    /// Evenly spaced gradient stops for a legend swatch, min to max.
    pub fn legend_stops(&self, count: usize) -> Vec<(f64, Rgba8)> {
        let count = count.max(2);
        (0..count)
            .map(|i| {
                let t = i as f64 / (count - 1) as f64;
                (t, self.ramp(t))
            })
            .collect()
    }
}

// ColorBrewer YlOrRd, 9 classes.
const YL_OR_RD: [&str; 9] = [
    "#ffffcc", "#ffeda0", "#fed976", "#feb24c", "#fd8d3c", "#fc4e2a", "#e31a1c", "#bd0026",
    "#800026",
];

// Category10 followed by Set2 and Set3; trend lines cycle through these so
// an entity's color is stable for the lifetime of the view.
const CATEGORICAL: [&str; 30] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf", "#66c2a5", "#fc8d62", "#8da0cb", "#e78ac3", "#a6d854", "#ffd92f",
    "#e5c494", "#b3b3b3", "#8dd3c7", "#ffffb3", "#bebada", "#fb8072", "#80b1d3", "#fdb462",
    "#b3de69", "#fccde5", "#d9d9d9", "#bc80bd", "#ccebc5", "#ffed6f",
];

/// Stable categorical color for the i-th series of a trend view.
pub fn series_color(index: usize) -> Rgba8 {
    Rgba8::from_hex(CATEGORICAL[index % CATEGORICAL.len()])
}

/// Position scale for ranking bars: domain `[0, max * 1.1]`.
pub fn ranking_position_scale(points: &[RankedPoint], range: Span) -> LinearScale {
    let max = points.iter().map(|p| p.value).fold(0.0f64, f64::max);
    LinearScale::new((0.0, max * RANKING_HEADROOM), range)
}

/// Color scale over the currently visible snapshot, so ranking color
/// reflects relative standing within the frame.
pub fn snapshot_color_scale(points: &[RankedPoint]) -> SequentialScale {
    let min = points
        .iter()
        .map(|p| p.value)
        .fold(f64::INFINITY, f64::min);
    let max = points
        .iter()
        .map(|p| p.value)
        .fold(f64::NEG_INFINITY, f64::max);
    if points.is_empty() {
        return SequentialScale::yl_or_rd((0.0, 0.0));
    }
    SequentialScale::yl_or_rd((min, max))
}

/// Color scale over every year combined, so scroll-driven map color stays
/// comparable across the whole animation.
pub fn whole_series_color_scale(indices: &Indices, metric: Metric) -> SequentialScale {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &year in indices.years() {
        for record in indices.year_records(year) {
            let v = metric.value(record);
            min = min.min(v);
            max = max.max(v);
        }
    }
    if !min.is_finite() {
        return SequentialScale::yl_or_rd((0.0, 0.0));
    }
    SequentialScale::yl_or_rd((min, max))
}
