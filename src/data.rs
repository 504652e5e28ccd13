use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

use crate::{
    core::{Year, YearRange},
    error::{ChartError, ChartResult},
};

/// One loaded row: a single entity at a single year. Immutable once loaded.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Record {
    pub year: Year,
    pub entity: String,
    pub deaths: u64,
    pub rate: f64,
    pub url: Option<String>,
}

/// Raw CSV row with the fixed upstream header names.
#[derive(Debug, serde::Deserialize)]
struct RawRow {
    #[serde(rename = "Year")]
    year: i32,
    #[serde(rename = "State")]
    state: String,
    #[serde(rename = "Deaths")]
    deaths: u64,
    #[serde(rename = "Age Adjusted Rate")]
    rate: f64,
    #[serde(rename = "URL", default)]
    url: Option<String>,
}

/// The selectable numeric field used for value, color, and position mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Metric {
    Deaths,
    Rate,
}

impl Metric {
    pub fn value(self, record: &Record) -> f64 {
        match self {
            Self::Deaths => record.deaths as f64,
            Self::Rate => record.rate,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Deaths => "Total Deaths",
            Self::Rate => "Age Adjusted Rate",
        }
    }

    /// Full-precision display form: grouped integers for counts, two
    /// decimals for rates.
    pub fn format_value(self, v: f64) -> String {
        match self {
            Self::Deaths => group_thousands(v.round().max(0.0) as u64),
            Self::Rate => format!("{v:.2}"),
        }
    }

    /// Compact axis-tick form (`1.2M`, `34k`, one-decimal rates).
    pub fn format_tick(self, v: f64) -> String {
        match self {
            Self::Deaths => {
                if v >= 1_000_000.0 {
                    format!("{:.1}M", v / 1_000_000.0)
                } else if v >= 1_000.0 {
                    format!("{:.0}k", v / 1_000.0)
                } else {
                    format!("{:.0}", v)
                }
            }
            Self::Rate => format!("{v:.1}"),
        }
    }
}

fn group_thousands(mut v: u64) -> String {
    let mut groups = Vec::new();
    loop {
        let rem = v % 1000;
        v /= 1000;
        if v == 0 {
            groups.push(rem.to_string());
            break;
        }
        groups.push(format!("{rem:03}"));
    }
    groups.reverse();
    groups.join(",")
}

/// Ordered record sequence with at most one record per (entity, year) pair.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Dataset {
    pub records: Vec<Record>,
}

impl Dataset {
    /// Parse CSV rows from a reader. Any unreadable or malformed row fails
    /// the whole load; there is no partial success and no retry.
    #[tracing::instrument(skip(reader))]
    pub fn from_csv_reader<R: Read>(reader: R) -> ChartResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        let mut seen: BTreeSet<(String, i32)> = BTreeSet::new();
        for (i, row) in csv_reader.deserialize::<RawRow>().enumerate() {
            let row = row.map_err(|e| ChartError::load(format!("row {}: {e}", i + 1)))?;
            if row.state.is_empty() {
                return Err(ChartError::load(format!("row {}: empty State field", i + 1)));
            }
            if !row.rate.is_finite() {
                return Err(ChartError::load(format!(
                    "row {}: non-finite Age Adjusted Rate",
                    i + 1
                )));
            }
            if !seen.insert((row.state.clone(), row.year)) {
                return Err(ChartError::load(format!(
                    "row {}: duplicate record for '{}' in {}",
                    i + 1,
                    row.state,
                    row.year
                )));
            }
            records.push(Record {
                year: Year(row.year),
                entity: row.state,
                deaths: row.deaths,
                rate: row.rate,
                url: row.url.filter(|u| !u.is_empty()),
            });
        }

        tracing::debug!(rows = records.len(), "dataset loaded");
        Ok(Self { records })
    }

    pub fn from_csv_str(text: &str) -> ChartResult<Self> {
        Self::from_csv_reader(text.as_bytes())
    }

    pub fn from_csv_path(path: &Path) -> ChartResult<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| ChartError::load(format!("{}: {e}", path.display())))?;
        Self::from_csv_reader(file)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Read-only lookup indices derived from a [`Dataset`], shared by all views.
#[derive(Clone, Debug, Default)]
pub struct Indices {
    by_entity: BTreeMap<String, Vec<Record>>,
    by_year: BTreeMap<Year, Vec<Record>>,
    entities: Vec<String>,
    years: Vec<Year>,
}

impl Indices {
    /// Pure function of the dataset: group by entity (sorted by year) and by
    /// year, plus sorted distinct catalogs of both dimensions.
    pub fn build(dataset: &Dataset) -> Self {
        let mut by_entity: BTreeMap<String, Vec<Record>> = BTreeMap::new();
        let mut by_year: BTreeMap<Year, Vec<Record>> = BTreeMap::new();
        for record in &dataset.records {
            by_entity
                .entry(record.entity.clone())
                .or_default()
                .push(record.clone());
            by_year.entry(record.year).or_default().push(record.clone());
        }
        for records in by_entity.values_mut() {
            records.sort_by_key(|r| r.year);
        }

        let entities = by_entity.keys().cloned().collect();
        let years = by_year.keys().copied().collect();
        Self {
            by_entity,
            by_year,
            entities,
            years,
        }
    }

    /// All records for one entity, ascending by year.
    pub fn entity_records(&self, entity: &str) -> &[Record] {
        self.by_entity.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All records at one year, in load order.
    pub fn year_records(&self, year: Year) -> &[Record] {
        self.by_year.get(&year).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sorted distinct entity names.
    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    /// Sorted distinct years.
    pub fn years(&self) -> &[Year] {
        &self.years
    }

    /// Inclusive bounds of the year catalog; `Err` when the dataset is empty.
    pub fn year_range(&self) -> ChartResult<YearRange> {
        match (self.years.first(), self.years.last()) {
            (Some(&first), Some(&last)) => YearRange::new(first, last),
            _ => Err(ChartError::validation("dataset has no years")),
        }
    }
}

/// Descriptive aggregate shown next to a frame: a sum for counts, a mean for
/// rates (summing age-adjusted rates across entities is meaningless).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub enum SummaryStat {
    Total(f64),
    Average(f64),
}

impl SummaryStat {
    /// Aggregate for a ranking snapshot; `None` when no records exist.
    pub fn for_snapshot(records: &[Record], metric: Metric) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        match metric {
            Metric::Deaths => {
                let total: u64 = records.iter().map(|r| r.deaths).sum();
                Some(Self::Total(total as f64))
            }
            Metric::Rate => {
                let sum: f64 = records.iter().map(|r| r.rate).sum();
                Some(Self::Average(sum / records.len() as f64))
            }
        }
    }

    /// Mean of the metric over a filtered snapshot, used by trend views.
    pub fn mean(records: &[Record], metric: Metric) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        let sum: f64 = records.iter().map(|r| metric.value(r)).sum();
        Some(Self::Average(sum / records.len() as f64))
    }

    pub fn text(&self, metric: Metric) -> String {
        match self {
            Self::Total(v) => format!("Total: {}", metric.format_value(*v)),
            Self::Average(v) => format!("Average: {v:.2}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
Year,State,Deaths,Age Adjusted Rate,URL
2014,Alabama,723,15.1,https://example.org/al
2014,Alaska,124,17.9,
2015,Alabama,756,15.7,https://example.org/al
";

    #[test]
    fn parses_typed_rows() {
        let ds = Dataset::from_csv_str(CSV).unwrap();
        assert_eq!(ds.records.len(), 3);
        let first = &ds.records[0];
        assert_eq!(first.year, Year(2014));
        assert_eq!(first.entity, "Alabama");
        assert_eq!(first.deaths, 723);
        assert_eq!(first.rate, 15.1);
        assert_eq!(first.url.as_deref(), Some("https://example.org/al"));
        assert_eq!(ds.records[1].url, None);
    }

    #[test]
    fn non_numeric_metric_is_a_load_error() {
        let bad = "Year,State,Deaths,Age Adjusted Rate,URL\n2014,Alabama,many,15.1,\n";
        let err = Dataset::from_csv_str(bad).unwrap_err();
        assert!(matches!(err, ChartError::Load(_)));
    }

    #[test]
    fn missing_column_is_a_load_error() {
        let bad = "Year,State,Deaths\n2014,Alabama,723\n";
        assert!(Dataset::from_csv_str(bad).is_err());
    }

    #[test]
    fn duplicate_entity_year_is_rejected() {
        let bad = "Year,State,Deaths,Age Adjusted Rate,URL\n\
                   2014,Alabama,723,15.1,\n2014,Alabama,800,16.0,\n";
        let err = Dataset::from_csv_str(bad).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn indices_group_and_sort() {
        let ds = Dataset::from_csv_str(CSV).unwrap();
        let idx = Indices::build(&ds);
        assert_eq!(idx.entities(), ["Alabama".to_string(), "Alaska".to_string()]);
        assert_eq!(idx.years(), [Year(2014), Year(2015)]);
        assert_eq!(idx.entity_records("Alabama").len(), 2);
        assert_eq!(idx.entity_records("Alabama")[0].year, Year(2014));
        assert_eq!(idx.year_records(Year(2014)).len(), 2);
        assert!(idx.year_records(Year(1999)).is_empty());
        assert_eq!(
            idx.year_range().unwrap(),
            YearRange::new(Year(2014), Year(2015)).unwrap()
        );
    }

    #[test]
    fn metric_formatting() {
        assert_eq!(Metric::Deaths.format_value(1234567.0), "1,234,567");
        assert_eq!(Metric::Deaths.format_tick(1_200_000.0), "1.2M");
        assert_eq!(Metric::Deaths.format_tick(34_000.0), "34k");
        assert_eq!(Metric::Deaths.format_tick(850.0), "850");
        assert_eq!(Metric::Rate.format_value(15.125), "15.13");
        assert_eq!(Metric::Rate.format_tick(15.125), "15.1");
    }

    #[test]
    fn snapshot_summary_sums_deaths_and_averages_rates() {
        let ds = Dataset::from_csv_str(CSV).unwrap();
        let idx = Indices::build(&ds);
        let records = idx.year_records(Year(2014));
        assert_eq!(
            SummaryStat::for_snapshot(records, Metric::Deaths),
            Some(SummaryStat::Total(847.0))
        );
        match SummaryStat::for_snapshot(records, Metric::Rate) {
            Some(SummaryStat::Average(v)) => assert!((v - 16.5).abs() < 1e-9),
            other => panic!("unexpected summary {other:?}"),
        }
        assert_eq!(SummaryStat::for_snapshot(&[], Metric::Deaths), None);
    }
}
