use std::time::Duration;

use kurbo::{BezPath, Point};

use crate::{
    axis::{AxisTick, Banner},
    clock::{AnimationClock, PlayState, Player, SystemTimeSource, TimeSource},
    core::{Margins, Rect, Rgba8, Span, Year},
    data::{Indices, Metric, SummaryStat},
    error::ChartResult,
    projection::{EntityFilter, TrendSeries, trend_average, trend_until},
    scale::{LinearScale, series_color},
};

/// Layout and timing knobs for a line-race view.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrendConfig {
    pub width: f64,
    pub height: f64,
    pub margins: Margins,
    pub y_tick_count: usize,
    pub marker_radius: f64,
    pub interval: Duration,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            width: 900.0,
            height: 540.0,
            margins: Margins {
                top: 40.0,
                right: 80.0,
                bottom: 60.0,
                left: 80.0,
            },
            y_tick_count: 8,
            marker_radius: 4.0,
            interval: Duration::from_millis(800),
        }
    }
}

/// One positioned data point on a trend line, hoverable.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Marker {
    pub year: Year,
    pub value: f64,
    pub x: f64,
    pub y: f64,
}

/// One entity's polyline with its stable color and positioned markers.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct SeriesLine {
    pub entity: String,
    pub color: Rgba8,
    pub path: BezPath,
    pub markers: Vec<Marker>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct LegendEntry {
    pub entity: String,
    pub color: Rgba8,
}

/// A drawable trend chart for the current year.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct TrendChart {
    pub width: f64,
    pub height: f64,
    pub plot: Rect,
    pub series: Vec<SeriesLine>,
    pub x_ticks: Vec<AxisTick>,
    pub y_ticks: Vec<AxisTick>,
    pub x_label: String,
    pub y_label: String,
    pub legend: Vec<LegendEntry>,
    pub banner: Banner,
    pub summary: Option<String>,
}

/// Trend frames degrade to a prompt when nothing is selected; an empty
/// selection is a valid state, not an error.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub enum TrendFrame {
    Placeholder(String),
    Chart(TrendChart),
}

/// Line-graph race session. Unlike ranking views, the empty filter means "no
/// entities": the user opts lines in, because every entity at once is
/// unreadable.
#[derive(Debug)]
pub struct TrendView<T: TimeSource = SystemTimeSource> {
    config: TrendConfig,
    metric: Metric,
    filter: EntityFilter,
    averaged: bool,
    player: Player<T>,
}

impl<T: TimeSource> TrendView<T> {
    pub fn new(indices: &Indices, config: TrendConfig, time: T) -> ChartResult<Self> {
        let bounds = indices.year_range()?;
        let clock = AnimationClock::new(bounds, config.interval);
        Ok(Self {
            config,
            metric: Metric::Deaths,
            filter: EntityFilter::none(),
            averaged: false,
            player: Player::new(clock, time),
        })
    }

    pub fn poll(&mut self) -> Option<Year> {
        self.player.poll()
    }

    pub fn set_metric(&mut self, metric: Metric) {
        self.metric = metric;
    }

    pub fn set_filter(&mut self, filter: EntityFilter) {
        self.filter = filter;
    }

    pub fn filter_mut(&mut self) -> &mut EntityFilter {
        &mut self.filter
    }

    /// Collapse the chart to a single per-year mean line over the selection
    /// (or over everyone when nothing is selected). The empty-filter prompt
    /// does not apply in this mode.
    pub fn set_averaged(&mut self, on: bool) {
        self.averaged = on;
    }

    pub fn toggle_play(&mut self) -> PlayState {
        self.player.toggle_play()
    }

    pub fn set_speed(&mut self, interval: Duration) {
        self.player.set_speed(interval);
    }

    pub fn scrub(&mut self, year: Year) {
        self.player.scrub(year);
    }

    pub fn clock(&self) -> &AnimationClock {
        self.player.clock()
    }

    pub fn render(&self, indices: &Indices) -> TrendFrame {
        let year = self.player.clock().current();
        let bounds = self.player.clock().bounds();
        let series = if self.averaged {
            vec![trend_average(indices, year, self.metric, &self.filter)]
        } else {
            trend_until(indices, year, self.metric, &self.filter)
        };

        if series.is_empty() {
            return TrendFrame::Placeholder(
                "Select entities from the filter to see their trends".to_string(),
            );
        }

        let m = self.config.margins;
        let plot = Rect::new(
            m.left,
            m.top,
            self.config.width - m.right,
            self.config.height - m.bottom,
        );

        // Time axis spans the whole catalog so lines grow rightward as the
        // clock advances instead of rescaling every tick.
        let x = LinearScale::new(
            (f64::from(bounds.first.0), f64::from(bounds.last.0)),
            Span::new(plot.x0, plot.x1),
        );
        let y = value_scale(&series, plot).nice(self.config.y_tick_count);

        let lines: Vec<SeriesLine> = series
            .iter()
            .enumerate()
            .map(|(i, s)| build_line(s, i, &x, &y))
            .collect();

        let x_ticks = x
            .ticks(bounds.len_years().min(10) as usize)
            .into_iter()
            .filter(|v| v.fract() == 0.0)
            .map(|v| AxisTick {
                pos: x.map(v),
                label: format!("{}", v as i64),
            })
            .collect();
        let y_ticks = y
            .ticks(self.config.y_tick_count)
            .into_iter()
            .map(|v| AxisTick {
                pos: y.map(v),
                label: self.metric.format_tick(v),
            })
            .collect();

        let legend = lines
            .iter()
            .map(|l| LegendEntry {
                entity: l.entity.clone(),
                color: l.color,
            })
            .collect();

        let everyone = self.averaged && self.filter.is_empty();
        let current: Vec<_> = indices
            .year_records(year)
            .iter()
            .filter(|r| everyone || self.filter.contains(&r.entity))
            .cloned()
            .collect();
        let summary = SummaryStat::mean(&current, self.metric).map(|s| s.text(self.metric));

        TrendFrame::Chart(TrendChart {
            width: self.config.width,
            height: self.config.height,
            plot,
            series: lines,
            x_ticks,
            y_ticks,
            x_label: "Year".to_string(),
            y_label: self.metric.label().to_string(),
            legend,
            banner: Banner::new(year, bounds),
            summary,
        })
    }
}

/// Value axis over every visible point; screen-y is inverted.
fn value_scale(series: &[TrendSeries], plot: Rect) -> LinearScale {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for s in series {
        for p in &s.points {
            min = min.min(p.value);
            max = max.max(p.value);
        }
    }
    if !min.is_finite() {
        (min, max) = (0.0, 0.0);
    }
    LinearScale::new((min, max), Span::new(plot.y1, plot.y0))
}

fn build_line(series: &TrendSeries, index: usize, x: &LinearScale, y: &LinearScale) -> SeriesLine {
    let pts: Vec<Point> = series
        .points
        .iter()
        .map(|p| Point::new(x.map(f64::from(p.year.0)), y.map(p.value)))
        .collect();

    let markers = series
        .points
        .iter()
        .zip(&pts)
        .map(|(p, pt)| Marker {
            year: p.year,
            value: p.value,
            x: pt.x,
            y: pt.y,
        })
        .collect();

    SeriesLine {
        entity: series.entity.clone(),
        color: series_color(index),
        path: monotone_path(&pts),
        markers,
    }
}

/// Monotone-in-x cubic interpolation (Fritsch-Carlson tangents), so lines
/// never overshoot between data points the way a plain Catmull-Rom would.
pub fn monotone_path(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    match points {
        [] => return path,
        [only] => {
            path.move_to(*only);
            return path;
        }
        [a, b] => {
            path.move_to(*a);
            path.line_to(*b);
            return path;
        }
        _ => {}
    }

    let n = points.len();
    let mut slopes = Vec::with_capacity(n - 1);
    for w in points.windows(2) {
        let dx = w[1].x - w[0].x;
        slopes.push(if dx == 0.0 { 0.0 } else { (w[1].y - w[0].y) / dx });
    }

    // Tangent per point: endpoints use the one-sided three-point estimate,
    // interior points a weighted harmonic mean that flattens at extrema.
    let mut tangents = vec![0.0f64; n];
    tangents[0] = slopes[0];
    tangents[n - 1] = slopes[n - 2];
    for i in 1..n - 1 {
        let s0 = slopes[i - 1];
        let s1 = slopes[i];
        if s0 * s1 <= 0.0 {
            tangents[i] = 0.0;
        } else {
            let h0 = points[i].x - points[i - 1].x;
            let h1 = points[i + 1].x - points[i].x;
            let w = (s0 * h1 + s1 * h0) / (h0 + h1);
            tangents[i] = w.signum() * w.abs().min(3.0 * s0.abs().min(s1.abs()));
        }
    }

    path.move_to(points[0]);
    for i in 0..n - 1 {
        let (p0, p1) = (points[i], points[i + 1]);
        let dx = (p1.x - p0.x) / 3.0;
        path.curve_to(
            Point::new(p0.x + dx, p0.y + tangents[i] * dx),
            Point::new(p1.x - dx, p1.y - tangents[i + 1] * dx),
            p1,
        );
    }
    path
}
