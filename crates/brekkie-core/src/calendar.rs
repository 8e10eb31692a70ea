//! Calendar date helpers for the planner views. Weeks start on Monday.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalendarView {
    Day,
    #[default]
    Week,
    Month,
}

impl FromStr for CalendarView {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(Error::InvalidInput(format!(
                "Unknown calendar view '{other}' (expected day, week, or month)"
            ))),
        }
    }
}

impl fmt::Display for CalendarView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        })
    }
}

/// Monday of the week containing `date`.
pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

/// Sunday of the week containing `date`.
pub fn end_of_week(date: NaiveDate) -> NaiveDate {
    start_of_week(date) + Days::new(6)
}

fn start_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn end_of_month(date: NaiveDate) -> NaiveDate {
    let first = start_of_month(date);
    first
        .checked_add_months(chrono::Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

/// Dates shown by `view` around `date`.
///
/// The month view pads to whole weeks, so it may include days of the
/// neighbouring months.
pub fn view_dates(view: CalendarView, date: NaiveDate) -> Vec<NaiveDate> {
    let (start, end) = match view {
        CalendarView::Day => return vec![date],
        CalendarView::Week => (start_of_week(date), end_of_week(date)),
        CalendarView::Month => (
            start_of_week(start_of_month(date)),
            end_of_week(end_of_month(date)),
        ),
    };
    start.iter_days().take_while(|day| *day <= end).collect()
}

pub fn is_same_month(date: NaiveDate, current: NaiveDate) -> bool {
    date.year() == current.year() && date.month() == current.month()
}

/// Key used for a date in the planned meals map (`YYYY-MM-DD`).
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Short label used in notices, e.g. `Jun 1`.
pub fn short_label(date: NaiveDate) -> String {
    date.format("%b %-d").to_string()
}

pub fn parse_date_key(value: &str) -> crate::Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| Error::InvalidInput(format!("Invalid date '{value}' (expected YYYY-MM-DD)")))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn week_runs_monday_to_sunday() {
        let dates = view_dates(CalendarView::Week, date(2024, 6, 1));
        assert_eq!(dates.len(), 7);
        assert_eq!(dates[0], date(2024, 5, 27));
        assert_eq!(dates[6], date(2024, 6, 2));
    }

    #[test]
    fn month_pads_to_whole_weeks() {
        let dates = view_dates(CalendarView::Month, date(2024, 6, 15));
        assert_eq!(dates.first().copied(), Some(date(2024, 5, 27)));
        assert_eq!(dates.last().copied(), Some(date(2024, 6, 30)));
        assert_eq!(dates.len(), 35);
        assert!(!is_same_month(dates[0], date(2024, 6, 15)));
    }

    #[test]
    fn day_view_is_single_date() {
        assert_eq!(view_dates(CalendarView::Day, date(2024, 2, 29)), vec![date(2024, 2, 29)]);
    }

    #[test]
    fn date_labels() {
        assert_eq!(date_key(date(2024, 6, 1)), "2024-06-01");
        assert_eq!(short_label(date(2024, 6, 1)), "Jun 1");
        assert_eq!(parse_date_key(" 2024-06-01 ").unwrap(), date(2024, 6, 1));
        assert!(parse_date_key("06/01/2024").is_err());
    }

    #[test]
    fn view_parses_case_insensitively() {
        assert_eq!("Month".parse::<CalendarView>().unwrap(), CalendarView::Month);
        assert!("year".parse::<CalendarView>().is_err());
    }
}
