use std::collections::BTreeSet;

use crate::{
    core::Year,
    data::{Indices, Metric, Record},
};

/// Entity selection shared by filter dropdowns and comparison clicks.
///
/// The empty filter is mode-dependent by design: ranking views treat it as
/// "all entities", trend views as "none selected" (a 50-line trend chart is
/// unreadable, so the user must opt entities in).
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EntityFilter(BTreeSet<String>);

impl EntityFilter {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_entities<I, S>(entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(entities.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.0.contains(entity)
    }

    pub fn select(&mut self, entity: impl Into<String>) {
        self.0.insert(entity.into());
    }

    /// Toggle membership; used by comparison-mode clicks.
    pub fn toggle(&mut self, entity: &str) {
        if !self.0.remove(entity) {
            self.0.insert(entity.to_string());
        }
    }

    pub fn select_all(&mut self, catalog: &[String]) {
        self.0 = catalog.iter().cloned().collect();
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Selected entities in ascending name order.
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Projection flavor: a ranked snapshot at one year, or cumulative
/// per-entity history up to one year.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Mode {
    Ranking,
    Trend,
}

/// One ranked entity at the projected year.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct RankedPoint {
    pub entity: String,
    pub value: f64,
    /// 1-based position after sorting.
    pub rank: usize,
    pub deaths: u64,
    pub rate: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct TrendPoint {
    pub year: Year,
    pub value: f64,
}

/// All points for one entity with `year <= projected year`, ascending.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct TrendSeries {
    pub entity: String,
    pub points: Vec<TrendPoint>,
}

/// Unified projection result for callers that dispatch on [`Mode`].
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub enum Projection {
    Ranking(Vec<RankedPoint>),
    Trend(Vec<TrendSeries>),
}

/// Project the dataset for the current controls.
///
/// Missing years produce an empty projection, never an error; callers render
/// a placeholder and no-op.
pub fn project(
    indices: &Indices,
    year: Year,
    metric: Metric,
    filter: &EntityFilter,
    mode: Mode,
) -> Projection {
    match mode {
        Mode::Ranking => Projection::Ranking(rank_at(indices, year, metric, filter)),
        Mode::Trend => Projection::Trend(trend_until(indices, year, metric, filter)),
    }
}

/// Ranked snapshot: all records at `year`, restricted to the filter when it
/// is non-empty, sorted descending by metric value with entity-name
/// ascending as the deterministic tie-break.
pub fn rank_at(
    indices: &Indices,
    year: Year,
    metric: Metric,
    filter: &EntityFilter,
) -> Vec<RankedPoint> {
    let mut points: Vec<RankedPoint> = indices
        .year_records(year)
        .iter()
        .filter(|r| filter.is_empty() || filter.contains(&r.entity))
        .map(|r| RankedPoint {
            entity: r.entity.clone(),
            value: metric.value(r),
            rank: 0,
            deaths: r.deaths,
            rate: r.rate,
        })
        .collect();

    points.sort_by(|a, b| {
        b.value
            .total_cmp(&a.value)
            .then_with(|| a.entity.cmp(&b.entity))
    });
    for (i, p) in points.iter_mut().enumerate() {
        p.rank = i + 1;
    }
    points
}

/// Cumulative trend: for each selected entity, its records with
/// `year <= current`, ascending. An empty filter yields no series; the
/// caller must show the "select entities" prompt.
pub fn trend_until(
    indices: &Indices,
    year: Year,
    metric: Metric,
    filter: &EntityFilter,
) -> Vec<TrendSeries> {
    filter
        .entities()
        .map(|entity| TrendSeries {
            entity: entity.to_string(),
            points: records_until(indices.entity_records(entity), year)
                .map(|r| TrendPoint {
                    year: r.year,
                    value: metric.value(r),
                })
                .collect(),
        })
        .collect()
}

/// Single averaged series: the per-year mean of the metric over the selected
/// entities (or over every entity when the filter is empty), up to `year`.
/// Years with no matching records are skipped rather than plotted as zero.
pub fn trend_average(
    indices: &Indices,
    year: Year,
    metric: Metric,
    filter: &EntityFilter,
) -> TrendSeries {
    let points = indices
        .years()
        .iter()
        .copied()
        .take_while(|y| *y <= year)
        .filter_map(|y| {
            let values: Vec<f64> = indices
                .year_records(y)
                .iter()
                .filter(|r| filter.is_empty() || filter.contains(&r.entity))
                .map(|r| metric.value(r))
                .collect();
            if values.is_empty() {
                return None;
            }
            Some(TrendPoint {
                year: y,
                value: values.iter().sum::<f64>() / values.len() as f64,
            })
        })
        .collect();

    TrendSeries {
        entity: "Average".to_string(),
        points,
    }
}

fn records_until(records: &[Record], year: Year) -> impl Iterator<Item = &Record> {
    // entity_records are already ascending by year
    records.iter().take_while(move |r| r.year <= year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;

    fn fixture() -> Indices {
        let csv = "\
Year,State,Deaths,Age Adjusted Rate,URL
2020,Alpha,50,5.0,
2020,Bravo,80,8.0,
2020,Delta,80,3.0,
2020,Charlie,20,2.0,
2021,Alpha,60,6.0,
2021,Bravo,70,7.0,
";
        Indices::build(&Dataset::from_csv_str(csv).unwrap())
    }

    #[test]
    fn ranking_sorts_descending_with_name_tiebreak() {
        let idx = fixture();
        let points = rank_at(&idx, Year(2020), Metric::Deaths, &EntityFilter::none());
        let order: Vec<&str> = points.iter().map(|p| p.entity.as_str()).collect();
        // Bravo and Delta tie at 80; Bravo wins on name.
        assert_eq!(order, ["Bravo", "Delta", "Alpha", "Charlie"]);
        assert_eq!(points[0].rank, 1);
        assert_eq!(points[3].rank, 4);
    }

    #[test]
    fn ranking_empty_filter_means_all_entities() {
        let idx = fixture();
        assert_eq!(
            rank_at(&idx, Year(2020), Metric::Deaths, &EntityFilter::none()).len(),
            4
        );
    }

    #[test]
    fn ranking_respects_non_empty_filter() {
        let idx = fixture();
        let filter = EntityFilter::from_entities(["Alpha", "Charlie"]);
        let points = rank_at(&idx, Year(2020), Metric::Deaths, &filter);
        let order: Vec<&str> = points.iter().map(|p| p.entity.as_str()).collect();
        assert_eq!(order, ["Alpha", "Charlie"]);
    }

    #[test]
    fn missing_year_projects_empty_without_error() {
        let idx = fixture();
        assert!(rank_at(&idx, Year(1900), Metric::Deaths, &EntityFilter::none()).is_empty());
        let filter = EntityFilter::from_entities(["Alpha"]);
        let series = trend_until(&idx, Year(1900), Metric::Deaths, &filter);
        assert_eq!(series.len(), 1);
        assert!(series[0].points.is_empty());
    }

    #[test]
    fn trend_empty_filter_means_no_entities() {
        let idx = fixture();
        assert!(trend_until(&idx, Year(2021), Metric::Deaths, &EntityFilter::none()).is_empty());
    }

    #[test]
    fn trend_accumulates_ascending_up_to_current_year() {
        let idx = fixture();
        let filter = EntityFilter::from_entities(["Bravo", "Alpha"]);
        let series = trend_until(&idx, Year(2021), Metric::Deaths, &filter);
        // Series come back in name order.
        assert_eq!(series[0].entity, "Alpha");
        assert_eq!(
            series[0].points,
            vec![
                TrendPoint {
                    year: Year(2020),
                    value: 50.0
                },
                TrendPoint {
                    year: Year(2021),
                    value: 60.0
                },
            ]
        );

        let capped = trend_until(&idx, Year(2020), Metric::Deaths, &filter);
        assert_eq!(capped[0].points.len(), 1);
    }

    #[test]
    fn average_series_takes_the_per_year_mean() {
        let idx = fixture();
        let all = trend_average(&idx, Year(2021), Metric::Deaths, &EntityFilter::none());
        assert_eq!(all.entity, "Average");
        assert_eq!(
            all.points,
            vec![
                TrendPoint {
                    year: Year(2020),
                    value: 57.5
                },
                TrendPoint {
                    year: Year(2021),
                    value: 65.0
                },
            ]
        );

        let filter = EntityFilter::from_entities(["Alpha", "Bravo"]);
        let some = trend_average(&idx, Year(2020), Metric::Deaths, &filter);
        assert_eq!(some.points, vec![TrendPoint { year: Year(2020), value: 65.0 }]);
    }

    #[test]
    fn project_dispatches_on_mode() {
        let idx = fixture();
        let filter = EntityFilter::from_entities(["Alpha"]);
        match project(&idx, Year(2021), Metric::Deaths, &filter, Mode::Ranking) {
            Projection::Ranking(points) => assert_eq!(points.len(), 1),
            other => panic!("unexpected projection {other:?}"),
        }
        match project(&idx, Year(2021), Metric::Deaths, &filter, Mode::Trend) {
            Projection::Trend(series) => assert_eq!(series[0].points.len(), 2),
            other => panic!("unexpected projection {other:?}"),
        }
    }

    #[test]
    fn filter_toggle_and_select_all() {
        let idx = fixture();
        let mut filter = EntityFilter::none();
        filter.toggle("Alpha");
        assert!(filter.contains("Alpha"));
        filter.toggle("Alpha");
        assert!(filter.is_empty());
        filter.select_all(idx.entities());
        assert_eq!(filter.entities().count(), 4);
        filter.clear();
        assert!(filter.is_empty());
    }
}
