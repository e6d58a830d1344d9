//! Season windows and year ranges

use chrono::{DateTime, TimeZone, Utc};
use kharif_core::{Error, Result};

/// Inclusive range of calendar months within one year
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Season {
    start_month: u32,
    end_month: u32,
}

impl Default for Season {
    /// June through November
    fn default() -> Self {
        Self {
            start_month: 6,
            end_month: 11,
        }
    }
}

impl Season {
    pub fn new(start_month: u32, end_month: u32) -> Result<Self> {
        for (name, month) in [("season_start_month", start_month), ("season_end_month", end_month)] {
            if !(1..=12).contains(&month) {
                return Err(Error::invalid_parameter(name, month, "month must be in 1..=12"));
            }
        }
        if start_month > end_month {
            return Err(Error::invalid_parameter(
                "season",
                format!("{}..{}", start_month, end_month),
                "start month is after end month",
            ));
        }
        Ok(Self {
            start_month,
            end_month,
        })
    }

    pub fn start_month(&self) -> u32 {
        self.start_month
    }

    pub fn end_month(&self) -> u32 {
        self.end_month
    }

    pub fn contains(&self, month: u32) -> bool {
        (self.start_month..=self.end_month).contains(&month)
    }

    /// First instant of the season in `year`
    pub fn start_of(&self, year: i32) -> Result<DateTime<Utc>> {
        Utc.with_ymd_and_hms(year, self.start_month, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| Error::invalid_parameter("year", year, "not representable"))
    }
}

/// Inclusive, ascending range of calendar years
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    start: i32,
    end: i32,
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            start: 2000,
            end: 2020,
        }
    }
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Result<Self> {
        if start > end {
            return Err(Error::invalid_parameter(
                "start_year",
                start,
                format!("after end_year {}", end),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }

    pub fn iter(&self) -> std::ops::RangeInclusive<i32> {
        self.start..=self.end
    }

    pub fn len(&self) -> usize {
        (self.end - self.start + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, year: i32) -> bool {
        self.iter().contains(&year)
    }

    /// `[start-01-01T00:00:00, end-12-31T23:59:59]`
    pub fn bounds(&self) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let first = Utc
            .with_ymd_and_hms(self.start, 1, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| Error::invalid_parameter("start_year", self.start, "not representable"))?;
        let last = Utc
            .with_ymd_and_hms(self.end, 12, 31, 23, 59, 59)
            .single()
            .ok_or_else(|| Error::invalid_parameter("end_year", self.end, "not representable"))?;
        Ok((first, last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_validation() {
        assert!(Season::new(6, 11).is_ok());
        assert!(Season::new(7, 7).is_ok());
        assert!(Season::new(11, 6).is_err());
        assert!(Season::new(0, 6).is_err());
        assert!(Season::new(6, 13).is_err());
    }

    #[test]
    fn test_season_start() {
        let season = Season::default();
        assert!(season.contains(6) && season.contains(11));
        assert!(!season.contains(5) && !season.contains(12));
        assert_eq!(
            season.start_of(2003).unwrap(),
            Utc.with_ymd_and_hms(2003, 6, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_year_range() {
        let years = YearRange::default();
        assert_eq!(years.len(), 21);
        assert_eq!(years.iter().next(), Some(2000));
        assert_eq!(years.iter().last(), Some(2020));
        assert!(YearRange::new(2021, 2020).is_err());
        assert_eq!(YearRange::new(2010, 2010).unwrap().len(), 1);
    }
}
