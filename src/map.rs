use kurbo::{BezPath, Point};

use crate::{
    core::{Rgba8, Year, YearRange},
    data::{Indices, Metric, SummaryStat},
    error::ChartResult,
    geo::StateShapes,
    projection::{rank_at, EntityFilter, RankedPoint},
    scale::{snapshot_color_scale, whole_series_color_scale, SequentialScale},
};

/// Fill for regions with no record at the displayed year. Deliberately
/// outside the sequential ramp so "no data" never reads as "low value".
pub const MISSING_FILL: Rgba8 = Rgba8::rgb(224, 224, 224);

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MapConfig {
    pub width: f64,
    pub height: f64,
    pub padding: f64,
    /// Gradient resolution of the legend swatch.
    pub legend_stops: usize,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 975.0,
            height: 610.0,
            padding: 20.0,
            legend_stops: 11,
        }
    }
}

/// One filled region of the choropleth.
#[derive(Clone, Debug, serde::Serialize)]
pub struct Region {
    pub name: String,
    pub abbrev: String,
    pub path: BezPath,
    pub label_pos: Point,
    pub fill: Rgba8,
    /// Metric value at the displayed year; `None` means no record.
    pub value: Option<f64>,
    pub selected: bool,
}

/// Min-to-max gradient legend for the current color scale.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Legend {
    pub stops: Vec<(f64, Rgba8)>,
    pub min_label: String,
    pub max_label: String,
}

impl Legend {
    fn from_scale(scale: &SequentialScale, metric: Metric, count: usize) -> Self {
        Self {
            stops: scale.legend_stops(count),
            min_label: metric.format_tick(scale.d0.min(scale.d1)),
            max_label: metric.format_tick(scale.d0.max(scale.d1)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct MapTooltip {
    pub title: String,
    pub deaths_text: String,
    pub rate_text: String,
    pub url: Option<String>,
}

/// A rendered choropleth frame.
#[derive(Clone, Debug, serde::Serialize)]
pub struct MapChart {
    pub year: Year,
    pub regions: Vec<Region>,
    pub legend: Legend,
    pub summary: Option<String>,
}

/// Either a drawable choropleth or the message shown while geography is
/// missing. Losing the map never takes the other views down with it.
#[derive(Clone, Debug, serde::Serialize)]
pub enum MapFrame {
    Unavailable(String),
    Choropleth(MapChart),
}

/// Slider-driven choropleth session: one year at a time, colored over the
/// visible snapshot, with an optional comparison selection.
#[derive(Debug)]
pub struct MapView {
    config: MapConfig,
    metric: Metric,
    year: Year,
    bounds: YearRange,
    selection: EntityFilter,
    comparison: bool,
    shapes: Option<StateShapes>,
}

impl MapView {
    pub fn new(indices: &Indices, config: MapConfig) -> ChartResult<Self> {
        let bounds = indices.year_range()?;
        Ok(Self {
            config,
            metric: Metric::Deaths,
            year: bounds.first,
            bounds,
            selection: EntityFilter::none(),
            comparison: false,
            shapes: None,
        })
    }

    /// Install decoded geography, fitted once into the viewport.
    pub fn set_geography(&mut self, shapes: StateShapes) {
        self.shapes = Some(shapes.fit(
            self.config.width,
            self.config.height,
            self.config.padding,
        ));
    }

    pub fn set_year(&mut self, year: Year) {
        self.year = self.bounds.clamp(year);
    }

    pub fn set_metric(&mut self, metric: Metric) {
        self.metric = metric;
    }

    /// Turning comparison mode off drops the selection; stale highlights
    /// must not reappear when it is re-enabled later.
    pub fn set_comparison(&mut self, on: bool) {
        self.comparison = on;
        if !on {
            self.selection.clear();
        }
    }

    /// Region click. Only meaningful in comparison mode; returns whether the
    /// click changed anything.
    pub fn click(&mut self, name: &str) -> bool {
        if !self.comparison {
            return false;
        }
        self.selection.toggle(name);
        true
    }

    pub fn year(&self) -> Year {
        self.year
    }

    pub fn bounds(&self) -> YearRange {
        self.bounds
    }

    pub fn selection(&self) -> &EntityFilter {
        &self.selection
    }

    #[tracing::instrument(skip(self, indices))]
    pub fn render(&self, indices: &Indices) -> MapFrame {
        let Some(shapes) = &self.shapes else {
            return MapFrame::Unavailable("Map data could not be loaded".to_string());
        };

        // Color domain spans the states that have data this year; missing
        // states take the neutral fill and stay out of the domain.
        let snapshot = rank_at(indices, self.year, self.metric, &EntityFilter::none());
        let scale = snapshot_color_scale(&snapshot);

        let regions = build_regions(
            shapes,
            &snapshot,
            &scale,
            &self.selection,
            self.comparison,
        );
        let summary = SummaryStat::for_snapshot(indices.year_records(self.year), self.metric)
            .map(|s| s.text(self.metric));

        MapFrame::Choropleth(MapChart {
            year: self.year,
            regions,
            legend: Legend::from_scale(&scale, self.metric, self.config.legend_stops),
            summary,
        })
    }

    pub fn tooltip(&self, indices: &Indices, name: &str) -> Option<MapTooltip> {
        let record = indices
            .year_records(self.year)
            .iter()
            .find(|r| r.entity == name)?;
        Some(MapTooltip {
            title: format!("{} ({})", record.entity, self.year),
            deaths_text: format!("Deaths: {}", Metric::Deaths.format_value(record.deaths as f64)),
            rate_text: format!("Rate: {}", Metric::Rate.format_value(record.rate)),
            url: record.url.clone(),
        })
    }
}

/// Scroll-driven choropleth session: scroll progress selects the year, and
/// color is fixed over the whole series so frames stay comparable while the
/// reader scrolls.
#[derive(Debug)]
pub struct ScrollMapView {
    config: MapConfig,
    metric: Metric,
    year: Year,
    bounds: YearRange,
    shapes: Option<StateShapes>,
}

impl ScrollMapView {
    pub fn new(indices: &Indices, config: MapConfig) -> ChartResult<Self> {
        let bounds = indices.year_range()?;
        Ok(Self {
            config,
            metric: Metric::Deaths,
            year: bounds.first,
            bounds,
            shapes: None,
        })
    }

    pub fn set_geography(&mut self, shapes: StateShapes) {
        self.shapes = Some(shapes.fit(
            self.config.width,
            self.config.height,
            self.config.padding,
        ));
    }

    pub fn set_metric(&mut self, metric: Metric) {
        self.metric = metric;
    }

    /// Map scroll progress in `[0, 1]` onto the year catalog, rounding to
    /// the nearest year. Returns the new year only when it changed, so the
    /// embedder re-renders once per year boundary rather than per scroll
    /// event.
    pub fn on_scroll(&mut self, fraction: f64) -> Option<Year> {
        let fraction = fraction.clamp(0.0, 1.0);
        let steps = self.bounds.len_years().saturating_sub(1) as f64;
        let index = (fraction * steps).round() as i32;
        let year = Year(self.bounds.first.0 + index);
        if year == self.year {
            return None;
        }
        self.year = year;
        Some(year)
    }

    pub fn year(&self) -> Year {
        self.year
    }

    #[tracing::instrument(skip(self, indices))]
    pub fn render(&self, indices: &Indices) -> MapFrame {
        let Some(shapes) = &self.shapes else {
            return MapFrame::Unavailable("Map data could not be loaded".to_string());
        };

        let snapshot = rank_at(indices, self.year, self.metric, &EntityFilter::none());
        let scale = whole_series_color_scale(indices, self.metric);

        let regions = build_regions(shapes, &snapshot, &scale, &EntityFilter::none(), false);
        let summary = SummaryStat::for_snapshot(indices.year_records(self.year), self.metric)
            .map(|s| s.text(self.metric));

        MapFrame::Choropleth(MapChart {
            year: self.year,
            regions,
            legend: Legend::from_scale(&scale, self.metric, self.config.legend_stops),
            summary,
        })
    }
}

fn build_regions(
    shapes: &StateShapes,
    snapshot: &[RankedPoint],
    scale: &SequentialScale,
    selection: &EntityFilter,
    comparison: bool,
) -> Vec<Region> {
    shapes
        .iter()
        .map(|shape| {
            let value = snapshot
                .iter()
                .find(|p| p.entity == shape.name)
                .map(|p| p.value);
            Region {
                name: shape.name.clone(),
                abbrev: shape.abbrev.clone(),
                path: shape.path.clone(),
                label_pos: shape.centroid,
                fill: value.map(|v| scale.color(v)).unwrap_or(MISSING_FILL),
                value,
                selected: comparison && selection.contains(&shape.name),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use crate::geo::parse_topology;

    fn indices() -> Indices {
        let csv = "\
Year,State,Deaths,Age Adjusted Rate,URL
2020,Westland,10,1.0,https://example.org/w
2020,Texas,90,9.0,
2021,Westland,40,4.0,
2021,Texas,60,6.0,
";
        Indices::build(&Dataset::from_csv_str(csv).unwrap())
    }

    fn geography() -> StateShapes {
        let topo = serde_json::json!({
            "type": "Topology",
            "transform": { "scale": [1.0, 1.0], "translate": [0.0, 0.0] },
            "arcs": [
                [[1, 0], [0, 1]],
                [[1, 1], [-1, 0], [0, -1], [1, 0]],
                [[1, 0], [1, 0], [0, 1], [-1, 0]]
            ],
            "objects": {
                "states": {
                    "type": "GeometryCollection",
                    "geometries": [
                        { "type": "Polygon", "arcs": [[0, 1]],
                          "properties": { "name": "Westland" } },
                        { "type": "Polygon", "arcs": [[-1, 2]],
                          "properties": { "name": "Texas" } },
                        { "type": "Polygon", "arcs": [[]],
                          "properties": { "name": "Nowhere" } }
                    ]
                }
            }
        })
        .to_string();
        parse_topology(&topo, "states").unwrap()
    }

    fn chart(frame: MapFrame) -> MapChart {
        match frame {
            MapFrame::Choropleth(c) => c,
            MapFrame::Unavailable(msg) => panic!("unexpected placeholder: {msg}"),
        }
    }

    #[test]
    fn renders_placeholder_until_geography_arrives() {
        let idx = indices();
        let view = MapView::new(&idx, MapConfig::default()).unwrap();
        assert!(matches!(view.render(&idx), MapFrame::Unavailable(_)));
    }

    #[test]
    fn colors_span_the_visible_snapshot() {
        let idx = indices();
        let mut view = MapView::new(&idx, MapConfig::default()).unwrap();
        view.set_geography(geography());

        let frame = chart(view.render(&idx));
        assert_eq!(frame.year, Year(2020));
        let west = frame.regions.iter().find(|r| r.name == "Westland").unwrap();
        let texas = frame.regions.iter().find(|r| r.name == "Texas").unwrap();
        // Domain [10, 90]: Westland sits at the cool end, Texas at the hot end.
        assert_eq!(west.value, Some(10.0));
        assert_eq!(west.fill, Rgba8::from_hex("#ffffcc"));
        assert_eq!(texas.fill, Rgba8::from_hex("#800026"));
    }

    #[test]
    fn missing_data_takes_the_neutral_fill() {
        let idx = indices();
        let mut view = MapView::new(&idx, MapConfig::default()).unwrap();
        view.set_geography(geography());

        let frame = chart(view.render(&idx));
        let nowhere = frame.regions.iter().find(|r| r.name == "Nowhere").unwrap();
        assert_eq!(nowhere.value, None);
        assert_eq!(nowhere.fill, MISSING_FILL);
    }

    #[test]
    fn legend_labels_follow_the_metric() {
        let idx = indices();
        let mut view = MapView::new(&idx, MapConfig::default()).unwrap();
        view.set_geography(geography());

        let frame = chart(view.render(&idx));
        assert_eq!(frame.legend.stops.len(), 11);
        assert_eq!(frame.legend.min_label, "10");
        assert_eq!(frame.legend.max_label, "90");

        view.set_metric(Metric::Rate);
        let frame = chart(view.render(&idx));
        assert_eq!(frame.legend.min_label, "1.0");
        assert_eq!(frame.legend.max_label, "9.0");
    }

    #[test]
    fn comparison_clicks_toggle_selection() {
        let idx = indices();
        let mut view = MapView::new(&idx, MapConfig::default()).unwrap();
        view.set_geography(geography());

        assert!(!view.click("Texas"), "clicks are inert outside comparison");
        view.set_comparison(true);
        assert!(view.click("Texas"));

        let frame = chart(view.render(&idx));
        let texas = frame.regions.iter().find(|r| r.name == "Texas").unwrap();
        assert!(texas.selected);

        view.click("Texas");
        let frame = chart(view.render(&idx));
        assert!(!frame.regions.iter().any(|r| r.selected));

        view.click("Texas");
        view.set_comparison(false);
        assert!(view.selection().is_empty(), "leaving comparison clears it");
    }

    #[test]
    fn tooltip_reports_both_fields_and_the_url() {
        let idx = indices();
        let view = MapView::new(&idx, MapConfig::default()).unwrap();
        let tip = view.tooltip(&idx, "Westland").unwrap();
        assert_eq!(tip.title, "Westland (2020)");
        assert_eq!(tip.deaths_text, "Deaths: 10");
        assert_eq!(tip.rate_text, "Rate: 1.00");
        assert_eq!(tip.url.as_deref(), Some("https://example.org/w"));
        assert!(view.tooltip(&idx, "Nowhere").is_none());
    }

    #[test]
    fn scroll_fraction_maps_onto_the_year_catalog() {
        let idx = indices();
        let mut view = ScrollMapView::new(&idx, MapConfig::default()).unwrap();
        view.set_geography(geography());

        assert_eq!(view.on_scroll(0.0), None, "already at the first year");
        assert_eq!(view.on_scroll(1.0), Some(Year(2021)));
        assert_eq!(view.on_scroll(0.99), None, "rounds to the same year");
        assert_eq!(view.on_scroll(0.2), Some(Year(2020)));
        assert_eq!(view.on_scroll(-3.0), None, "clamped below");
        assert_eq!(view.on_scroll(7.0), Some(Year(2021)), "clamped above");
    }

    #[test]
    fn scroll_map_uses_the_whole_series_domain() {
        let idx = indices();
        let mut view = ScrollMapView::new(&idx, MapConfig::default()).unwrap();
        view.set_geography(geography());

        let frame = chart(view.render(&idx));
        // Whole-series domain is [10, 90] even though 2020 alone is [10, 90]
        // and 2021 alone is [40, 60]; scrub to 2021 and the legend holds.
        assert_eq!(frame.legend.min_label, "10");
        view.on_scroll(1.0);
        let frame = chart(view.render(&idx));
        assert_eq!(frame.year, Year(2021));
        assert_eq!(frame.legend.min_label, "10");
        assert_eq!(frame.legend.max_label, "90");
    }
}
