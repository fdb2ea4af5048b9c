//! Partial release dates as found in tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A release date with optional month and day precision.
///
/// Ordering is chronological; a less precise date sorts before a more
/// precise one in the same period (`2020 < 2020-01`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Date {
    pub year: i32,
    pub month: Option<u8>,
    pub day: Option<u8>,
}

impl Date {
    pub fn from_year(year: i32) -> Self {
        Self {
            year,
            month: None,
            day: None,
        }
    }

    /// Parse `yyyy`, `yyyy-mm`, `yyyy-mm-dd`, or an ISO-8601 timestamp.
    ///
    /// Components past the first invalid one are dropped rather than failing
    /// the whole date, since taggers are inconsistent about precision.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let date_part = value.split(['T', ' ']).next()?;
        let mut parts = date_part.split(['-', '/', '.']);

        let year_str = parts.next()?;
        if year_str.len() != 4 || !year_str.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let year: i32 = year_str.parse().ok()?;
        if year == 0 {
            return None;
        }

        let month = parts
            .next()
            .and_then(|m| m.parse::<u8>().ok())
            .filter(|m| (1..=12).contains(m));
        let day = month.and_then(|_| {
            parts
                .next()
                .and_then(|d| d.parse::<u8>().ok())
                .filter(|d| (1..=31).contains(d))
        });

        Some(Self { year, month, day })
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.year)?;
        if let Some(month) = self.month {
            write!(f, "-{:02}", month)?;
            if let Some(day) = self.day {
                write!(f, "-{:02}", day)?;
            }
        }
        Ok(())
    }
}

/// The span of dates across a group of songs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub min: Date,
    pub max: Date,
}

impl DateRange {
    /// Returns `None` when no date is present at all.
    pub fn from_dates(dates: impl IntoIterator<Item = Date>) -> Option<Self> {
        let mut iter = dates.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), d| (min.min(d), max.max(d)));
        Some(Self { min, max })
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{} - {}", self.min, self.max)
        }
    }
}
