//! Next wall-clock occurrence of a daily `HH:MM` trigger

use chrono::{DateTime, Days, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone};
use healthhook_domain::{HealthHookError, SyncError};

/// Largest DST gap searched when a local time does not exist.
const MAX_GAP_MINUTES: i64 = 180;

/// Next instant strictly after `now` whose local time is `hour:minute`.
///
/// Today's occurrence is used when it is still in the future, otherwise the
/// trigger rolls forward to tomorrow. A time that falls inside a DST gap
/// resolves to the first valid local instant after the gap; a time that
/// occurs twice resolves to its earlier occurrence.
pub fn next_occurrence<Tz: TimeZone>(
    hour: u32,
    minute: u32,
    now: &DateTime<Tz>,
) -> Result<DateTime<Tz>, SyncError> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
        SyncError::ConfigInvalid(format!("invalid trigger time {hour:02}:{minute:02}"))
    })?;

    let tz = now.timezone();
    let today = now.date_naive();

    for offset in 0..=2 {
        let Some(date) = today.checked_add_days(Days::new(offset)) else {
            break;
        };
        if let Some(candidate) = resolve_local(&tz, date.and_time(time)) {
            if candidate > *now {
                return Ok(candidate);
            }
        }
    }

    Err(SyncError::Infrastructure(HealthHookError::Scheduling(format!(
        "no valid local instant for {hour:02}:{minute:02} after {}",
        now.naive_local()
    ))))
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(at) => Some(at),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => (1..=MAX_GAP_MINUTES)
            .find_map(|step| tz.from_local_datetime(&(local + Duration::minutes(step))).earliest()),
    }
}
