use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};

use super::domain::DayOfWeek;

/// Expand a weekly pattern into concrete dates.
///
/// Walks every calendar day from `start_date` through `end_date` inclusive
/// and keeps a date when its weekday is in `days_of_week` and it is not
/// excluded. Output is ascending. An empty weekday set, or a range where
/// `end_date < start_date`, yields no dates.
pub fn expand(
    start_date: NaiveDate,
    end_date: NaiveDate,
    days_of_week: &BTreeSet<DayOfWeek>,
    exclude_dates: &BTreeSet<NaiveDate>,
) -> Vec<NaiveDate> {
    start_date
        .iter_days()
        .take_while(|date| *date <= end_date)
        .filter(|date| days_of_week.contains(&DayOfWeek::from_weekday(date.weekday())))
        .filter(|date| !exclude_dates.contains(date))
        .collect()
}
