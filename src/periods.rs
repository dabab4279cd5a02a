//! Calendar bucketing for report columns.
//!
//! Buckets are whole calendar days, inclusive at both ends, aligned to the
//! natural boundary of their granularity (Monday-start weeks, calendar months,
//! quarters, and years). The first bucket contains the range start and the
//! last one contains the range end.

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::Serialize;

use crate::config::Granularity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub label: String,
}

impl Period {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Produce the ordered buckets covering `[start, end]`.
///
/// Returns an empty list when either bound is missing or `start > end`.
pub fn generate_periods(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    granularity: Granularity,
) -> Vec<Period> {
    let (Some(start), Some(end)) = (start, end) else {
        return Vec::new();
    };
    if start > end {
        return Vec::new();
    }

    let mut periods = Vec::new();
    let Some(mut cursor) = bucket_start(start, granularity) else {
        return periods;
    };
    while cursor <= end {
        let Some(next) = next_bucket_start(cursor, granularity) else {
            break;
        };
        let Some(last_day) = next.pred_opt() else {
            break;
        };
        periods.push(Period {
            start: cursor,
            end: last_day,
            label: label_for(cursor, granularity),
        });
        cursor = next;
    }
    periods
}

fn bucket_start(date: NaiveDate, granularity: Granularity) -> Option<NaiveDate> {
    match granularity {
        Granularity::Daily => Some(date),
        // Sunday belongs to the week that started the Monday before it.
        Granularity::Weekly => {
            Some(date - Duration::days(date.weekday().num_days_from_monday() as i64))
        }
        Granularity::Monthly => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
        Granularity::Quarterly => {
            let first_month = (date.month0() / 3) * 3 + 1;
            NaiveDate::from_ymd_opt(date.year(), first_month, 1)
        }
        Granularity::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1),
    }
}

fn next_bucket_start(start: NaiveDate, granularity: Granularity) -> Option<NaiveDate> {
    match granularity {
        Granularity::Daily => start.succ_opt(),
        Granularity::Weekly => start.checked_add_signed(Duration::days(7)),
        Granularity::Monthly => start.checked_add_months(Months::new(1)),
        Granularity::Quarterly => start.checked_add_months(Months::new(3)),
        Granularity::Yearly => start.checked_add_months(Months::new(12)),
    }
}

/// Ordinal of the week within its month, counting the partial first week.
pub fn week_of_month(date: NaiveDate) -> u32 {
    let first_weekday = date
        .with_day(1)
        .map(|d| d.weekday().num_days_from_sunday())
        .unwrap_or(0);
    (date.day() + first_weekday).div_ceil(7)
}

fn label_for(start: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Daily => start.format("%b %d, %Y").to_string(),
        Granularity::Weekly => format!(
            "Week {} {}",
            week_of_month(start),
            start.format("%b %Y")
        ),
        Granularity::Monthly => start.format("%b %Y").to_string(),
        Granularity::Quarterly => format!("Q{} {}", start.month0() / 3 + 1, start.year()),
        Granularity::Yearly => start.year().to_string(),
    }
}
