//! Daily gate: is it time to push a page to this user?

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use narasla_core::types::User;

/// Parse an IANA zone name, falling back to UTC for empty or unknown names.
pub fn resolve_timezone(name: &str) -> Tz {
    let name = name.trim();
    if name.is_empty() {
        return Tz::UTC;
    }
    name.parse::<Tz>().unwrap_or_else(|_| {
        tracing::debug!("unknown timezone '{name}', using UTC");
        Tz::UTC
    })
}

/// Today's send instant in `tz`. Times inside a DST gap slide forward an
/// hour; ambiguous times take the earlier instant.
fn target_instant(tz: Tz, date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Tz>> {
    let time = NaiveTime::from_hms_opt(hour.min(23), minute.min(59), 0)?;
    let naive = date.and_time(time);
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + TimeDelta::hours(1))).earliest())
}

/// True once the user's local send time has passed today and nothing has
/// been sent on the current local date.
pub fn should_send_now(user: &User, now: DateTime<Utc>) -> bool {
    let tz = resolve_timezone(&user.timezone);
    let local_now = now.with_timezone(&tz);
    let today = local_now.date_naive();

    let Some(target) = target_instant(tz, today, user.send_hour, user.send_minute) else {
        return false;
    };
    if local_now < target {
        return false;
    }

    match user.last_send_at {
        None => true,
        Some(last) => last.with_timezone(&tz).date_naive() != today,
    }
}
