//! Reading-log arithmetic: progress segments and weekly aggregation.

use std::collections::BTreeMap;

use chrono_tz::Tz;
use time::{Date, Duration, OffsetDateTime, format_description::FormatItem, macros::format_description};

use crate::domain::error::DomainError;
use crate::util::timezone::localized_date;

pub const WEEK_KEY_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month padding:zero]-[day padding:zero]");

/// Fractions of a book's pages, summing to exactly 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSegments {
    /// Read before this sitting.
    pub previously_read: f64,
    /// Read during this sitting.
    pub newly_read: f64,
    /// Still unread.
    pub remaining: f64,
}

/// Split a book's page count into the three progress-bar segments.
///
/// `old_bookmark` and `new_bookmark` are absolute page positions with
/// `old_bookmark <= new_bookmark <= total_pages`. The remaining segment is
/// derived from the other two so the sum is exactly 1.0.
pub fn progress_segments(
    old_bookmark: u32,
    new_bookmark: u32,
    total_pages: u32,
) -> Result<ProgressSegments, DomainError> {
    if total_pages == 0 {
        return Err(DomainError::validation("total_pages must be positive"));
    }
    if old_bookmark > new_bookmark {
        return Err(DomainError::validation(
            "bookmark cannot move backwards within one sitting",
        ));
    }
    if new_bookmark > total_pages {
        return Err(DomainError::validation(format!(
            "bookmark {new_bookmark} is past the last page ({total_pages})"
        )));
    }

    let total = f64::from(total_pages);
    let previously_read = f64::from(old_bookmark) / total;
    let newly_read = f64::from(new_bookmark - old_bookmark) / total;
    // Derived from the rounded sum of the other two, so the three segments
    // add up to exactly 1.0.
    let remaining = 1.0 - (previously_read + newly_read);

    Ok(ProgressSegments {
        previously_read,
        newly_read,
        remaining,
    })
}

/// Pages summed over one local week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekBucket {
    /// Local date of the Sunday the week starts on.
    pub week_start: Date,
    pub pages: u64,
}

impl WeekBucket {
    pub fn key(&self) -> String {
        self.week_start
            .format(WEEK_KEY_FORMAT)
            .expect("valid week key")
    }
}

/// Group `(unix-seconds, pages)` points into weekly buckets.
///
/// Weeks start on Sunday in the supplied timezone. Output is ascending by
/// week start; points sharing a timestamp accumulate into the same bucket.
pub fn weekly_totals(points: &[(i64, u32)], tz: Tz) -> Result<Vec<WeekBucket>, DomainError> {
    let mut buckets: BTreeMap<Date, u64> = BTreeMap::new();

    for &(unix_seconds, pages) in points {
        let at = OffsetDateTime::from_unix_timestamp(unix_seconds).map_err(|_| {
            DomainError::validation(format!("timestamp {unix_seconds} is out of range"))
        })?;
        let date = localized_date(at, tz);
        *buckets.entry(week_start_of(date)).or_insert(0) += u64::from(pages);
    }

    Ok(buckets
        .into_iter()
        .map(|(week_start, pages)| WeekBucket { week_start, pages })
        .collect())
}

fn week_start_of(date: Date) -> Date {
    let offset = i64::from(date.weekday().number_days_from_sunday());
    date.checked_sub(Duration::days(offset))
        .expect("week start within calendar range")
}
