//! Free-form date parsing and calendar-day ranges.

use jiff::ToSpan;
use jiff::civil::{Date, DateTime};
use jiff::fmt::strtime;

use crate::error::{Error, Result};

/// Layouts tried, in order, after ISO 8601 dates and date-times.
const LAYOUTS: &[&str] = &[
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%m/%d/%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%Y%m%d",
];

/// Parse a user-supplied date such as `2024-01-31`, `31.01.2024` or `January 31, 2024`.
pub fn parse_date(input: &str) -> Result<Date> {
    let trimmed = input.trim();
    if let Ok(date) = trimmed.parse::<Date>() {
        return Ok(date);
    }
    if let Ok(datetime) = trimmed.parse::<DateTime>() {
        return Ok(datetime.date());
    }

    LAYOUTS
        .iter()
        .find_map(|layout| {
            strtime::parse(layout, trimmed)
                .and_then(|tm| tm.to_date())
                .ok()
        })
        .ok_or_else(|| Error::InvalidDate(input.to_string()))
}

/// Every calendar day from `start` through `end`, both included.
pub fn days_in_range(start: Date, end: Date) -> Result<Vec<Date>> {
    if end < start {
        return Err(Error::InvalidRange { start, end });
    }

    Ok(start.series(1.day()).take_while(|day| *day <= end).collect())
}
