use std::time::Duration;

use crate::{
    axis::{AxisTick, Banner},
    clock::{AnimationClock, PlayState, Player, SystemTimeSource, TimeSource},
    core::{Margins, Rect, Span, Year},
    data::{Indices, Metric, SummaryStat},
    error::ChartResult,
    projection::{EntityFilter, RankedPoint, rank_at},
    reconcile::{Attrs, TransitionPlan, TransitionTiming, VisualSet, reconcile},
    scale::{BandScale, ranking_position_scale, snapshot_color_scale},
};

/// Layout and timing knobs for a bar-race view.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RaceConfig {
    pub width: f64,
    /// Vertical pixels per ranked row; chart height follows the entity count.
    pub row_height: f64,
    /// Pixels reserved left of the bars for entity labels.
    pub label_area: f64,
    pub label_gap: f64,
    pub margin_top: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
    pub band_padding: f64,
    pub tick_count: usize,
    pub timing: TransitionTiming,
    pub interval: Duration,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            width: 960.0,
            row_height: 35.0,
            label_area: 200.0,
            label_gap: 20.0,
            margin_top: 40.0,
            margin_right: 200.0,
            margin_bottom: 40.0,
            band_padding: 0.3,
            tick_count: 4,
            timing: TransitionTiming::default(),
            interval: Duration::from_millis(800),
        }
    }
}

impl RaceConfig {
    fn margins(&self) -> Margins {
        Margins {
            top: self.margin_top,
            right: self.margin_right,
            bottom: self.margin_bottom,
            left: self.label_area + self.label_gap,
        }
    }
}

/// Static per-row text the embedder places from the sampled bar attrs.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct RowText {
    pub entity: String,
    pub rank: usize,
    pub value_text: String,
}

/// Hover payload for one bar.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct BarTooltip {
    pub title: String,
    pub rank: usize,
    pub deaths: String,
    pub rate: String,
}

/// Everything one bar-race frame needs to be drawn: the keyed transition
/// plan plus axis furniture. Contains no rendering-surface handles.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct RaceFrame {
    pub year: Year,
    pub width: f64,
    pub height: f64,
    /// Plot area; grid lines run top to bottom at each tick x.
    pub plot: Rect,
    /// Right-aligned anchor x for entity labels.
    pub label_anchor_x: f64,
    pub bars: TransitionPlan,
    pub rows: Vec<RowText>,
    pub ticks: Vec<AxisTick>,
    pub banner: Banner,
    pub summary: Option<String>,
}

/// Bar-chart race session: one independent clock, filter, metric, and
/// visual state per instance, all explicit so multiple races can coexist.
#[derive(Debug)]
pub struct RaceView<T: TimeSource = SystemTimeSource> {
    config: RaceConfig,
    metric: Metric,
    filter: EntityFilter,
    player: Player<T>,
    visual: VisualSet,
    last_rank: Vec<RankedPoint>,
}

impl<T: TimeSource> RaceView<T> {
    /// Fails when the dataset has no years to animate over.
    pub fn new(indices: &Indices, config: RaceConfig, time: T) -> ChartResult<Self> {
        let bounds = indices.year_range()?;
        let clock = AnimationClock::new(bounds, config.interval);
        Ok(Self {
            config,
            metric: Metric::Deaths,
            filter: EntityFilter::none(),
            player: Player::new(clock, time),
            visual: VisualSet::new(),
            last_rank: Vec::new(),
        })
    }

    /// Advance the animation if a tick is due. Returns the new year when it
    /// fired; the caller should then call [`RaceView::render`].
    pub fn poll(&mut self) -> Option<Year> {
        self.player.poll()
    }

    pub fn set_metric(&mut self, metric: Metric) {
        self.metric = metric;
    }

    pub fn set_filter(&mut self, filter: EntityFilter) {
        self.filter = filter;
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

    /// Install a mid-flight visual snapshot (from
    /// [`TransitionPlan::visual_at`]) before re-rendering, so a control
    /// change retargets the in-flight transition instead of fighting it.
    pub fn interrupt(&mut self, visual: VisualSet) {
        self.visual = visual;
    }

    /// Project, lay out, and reconcile the current year into a frame.
    ///
    /// A year with no records produces an empty frame (no bars, no summary)
    /// and leaves the visual state alone; the caller no-ops.
    pub fn render(&mut self, indices: &Indices) -> RaceFrame {
        let year = self.player.clock().current();
        let bounds = self.player.clock().bounds();
        let points = rank_at(indices, year, self.metric, &self.filter);

        let margins = self.config.margins();
        let height =
            points.len() as f64 * self.config.row_height + margins.top + margins.bottom + 20.0;
        let plot = Rect::new(
            margins.left,
            margins.top,
            self.config.width - margins.right,
            height - margins.bottom,
        );

        let banner = Banner::new(year, bounds);

        if points.is_empty() {
            self.last_rank.clear();
            return RaceFrame {
                year,
                width: self.config.width,
                height,
                plot,
                label_anchor_x: self.config.label_area - 10.0,
                bars: TransitionPlan::default(),
                rows: Vec::new(),
                ticks: Vec::new(),
                banner,
                summary: None,
            };
        }

        let x = ranking_position_scale(&points, Span::new(plot.x0, plot.x1));
        let bands = BandScale::new(
            points.iter().map(|p| p.entity.clone()),
            Span::new(plot.y0, plot.y1),
            self.config.band_padding,
        );
        let color = snapshot_color_scale(&points);

        let targets: Vec<(String, Attrs)> = points
            .iter()
            .map(|p| {
                let y = bands.position(&p.entity).unwrap_or(plot.y0);
                let attrs = Attrs {
                    x: plot.x0,
                    y,
                    width: x.map(p.value) - plot.x0,
                    height: bands.bandwidth(),
                    color: color.color(p.value),
                    opacity: 1.0,
                };
                (p.entity.clone(), attrs)
            })
            .collect();

        let bars = reconcile(&self.visual, &targets, &self.config.timing);
        self.visual = bars.settled();

        let rows = points
            .iter()
            .map(|p| RowText {
                entity: p.entity.clone(),
                rank: p.rank,
                value_text: self.metric.format_value(p.value),
            })
            .collect();

        let ticks = x
            .ticks(self.config.tick_count)
            .into_iter()
            .map(|v| AxisTick {
                pos: x.map(v),
                label: self.metric.format_tick(v),
            })
            .collect();

        let summary = SummaryStat::for_snapshot(indices.year_records(year), self.metric)
            .map(|s| s.text(self.metric));

        self.last_rank = points;

        RaceFrame {
            year,
            width: self.config.width,
            height,
            plot,
            label_anchor_x: self.config.label_area - 10.0,
            bars,
            rows,
            ticks,
            banner,
            summary,
        }
    }

    /// Hover payload for a bar in the most recently rendered frame.
    pub fn tooltip(&self, entity: &str) -> Option<BarTooltip> {
        let point = self.last_rank.iter().find(|p| p.entity == entity)?;
        Some(BarTooltip {
            title: format!("{} - {}", point.entity, self.player.clock().current()),
            rank: point.rank,
            deaths: Metric::Deaths.format_value(point.deaths as f64),
            rate: Metric::Rate.format_value(point.rate),
        })
    }
}
