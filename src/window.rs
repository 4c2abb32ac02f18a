// src/window.rs
//! Announcement window arithmetic and cutoff-date resolution.
//!
//! arXiv announces at 20:00 US/Eastern, Sunday through Thursday. The window
//! that an announcement covers starts at 14:00 local on an earlier day; the
//! offset table below encodes how far back that start lies for each weekday.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::{Result, ScanError};

/// Publishing timezone of the announcement schedule.
pub const PUBLISHING_TZ: Tz = chrono_tz::US::Eastern;

/// Days back from a weekday (Mon = 0) to the most recent window start.
const WINDOW_OFFSETS: [i64; 7] = [4, 4, 2, 2, 2, 3, 4];

/// Hour (local) at which the day's announcement is published.
const ANNOUNCE_HOUR: u32 = 20;

/// Hour (local) at which a submission window opens.
const WINDOW_START_HOUR: u32 = 14;

/// Start of the most recently announced submission window as seen at `now`.
pub fn submission_window_start<Z: TimeZone>(now: &DateTime<Z>) -> DateTime<Tz> {
    let local = now.with_timezone(&PUBLISHING_TZ);
    let weekday = local.weekday().num_days_from_monday() as usize;

    // no announcements on Friday and Saturday
    let offset = if !matches!(weekday, 4 | 5) && local.hour() >= ANNOUNCE_HOUR {
        WINDOW_OFFSETS[(weekday + 1) % 7] - 1
    } else {
        WINDOW_OFFSETS[weekday]
    };

    let day = local.date_naive() - Duration::days(offset);
    at_local_time(&PUBLISHING_TZ, day, WINDOW_START_HOUR)
}

/// Resolve a user-facing date option into a cutoff instant.
///
/// Accepted forms: `new`, `recent`, a number of days, `YYYY-MM`, `YYYY-MM-DD`.
/// Calendar forms are interpreted at local midnight in `now`'s timezone.
pub fn resolve_cutoff<Z: TimeZone>(option: &str, now: &DateTime<Z>) -> Result<DateTime<Utc>> {
    let option = option.trim();
    let tz = now.timezone();

    match option {
        "" | "new" => return Ok(submission_window_start(now).with_timezone(&Utc)),
        "recent" => {
            let earlier = now.clone() - Duration::days(6);
            return Ok(submission_window_start(&earlier).with_timezone(&Utc));
        }
        _ => {}
    }

    if let Ok(days) = option.parse::<i64>() {
        if days < 0 {
            return Err(ScanError::config(format!("negative day count: {days}")));
        }
        let day = Duration::try_days(days)
            .and_then(|back| now.date_naive().checked_sub_signed(back))
            .ok_or_else(|| ScanError::config(format!("day count out of range: {days}")))?;
        return Ok(at_local_time(&tz, day, 0).with_timezone(&Utc));
    }

    let day = NaiveDate::parse_from_str(option, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{option}-01"), "%Y-%m-%d"))
        .map_err(|_| ScanError::config(format!("cannot parse date option '{option}'")))?;
    Ok(at_local_time(&tz, day, 0).with_timezone(&Utc))
}

fn at_local_time<Z: TimeZone>(tz: &Z, day: NaiveDate, hour: u32) -> DateTime<Z> {
    let naive = day.and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default());
    // Gaps only occur around 02:00; fall back to reading the wall time as UTC.
    tz.from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}
