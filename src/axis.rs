use crate::core::Year;

/// One axis tick: pixel position along the axis plus its formatted label.
/// Grid lines share the same positions across the plot rect.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct AxisTick {
    pub pos: f64,
    pub label: String,
}

/// Year banner shown above an animated chart.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Banner {
    pub year: Year,
    /// "Year N of M (first-last)" progress text.
    pub progress: String,
}

impl Banner {
    pub fn new(year: Year, bounds: crate::core::YearRange) -> Self {
        Self {
            year,
            progress: format!(
                "Year {} of {} ({}-{})",
                bounds.ordinal(year),
                bounds.len_years(),
                bounds.first,
                bounds.last
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::YearRange;

    #[test]
    fn banner_progress_text() {
        let bounds = YearRange::new(Year(2014), Year(2023)).unwrap();
        let banner = Banner::new(Year(2016), bounds);
        assert_eq!(banner.progress, "Year 3 of 10 (2014-2023)");
    }
}
