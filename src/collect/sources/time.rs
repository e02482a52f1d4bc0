// src/collect/sources/time.rs

use chrono::{DateTime, Datelike, Local, Timelike, Utc};

use crate::collect::task::{BoxFuture, EnvSink, SourceTask, TaskContext};
use crate::environ::{self, ParentEnv};

/// UTC breakdown of the moment collection started, plus the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeSource;

impl SourceTask for TimeSource {
    fn name(&self) -> &'static str {
        "time"
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext, sink: EnvSink) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            sink.emit_all(time_entries(ctx.started_at)).await;

            if let Some(tz) = local_timezone(&ctx.parent_env).await {
                sink.emit(environ::STARTED_AT_TIMEZONE, tz).await;
            }
            Ok(())
        })
    }
}

/// Every value derived from `at`, timezone excluded.
pub fn time_entries(at: DateTime<Utc>) -> Vec<(&'static str, String)> {
    let offset = at.with_timezone(&Local).offset().local_minus_utc();

    vec![
        (environ::STARTED_AT_RFC3339, at.to_rfc3339()),
        (environ::STARTED_AT_UNIX, at.timestamp().to_string()),
        (environ::STARTED_AT_YEAR, at.year().to_string()),
        (environ::STARTED_AT_YEAR_DAY, at.ordinal().to_string()),
        (environ::STARTED_AT_DAY, at.day().to_string()),
        (environ::STARTED_AT_MONTH, at.month().to_string()),
        (environ::STARTED_AT_MONTH_STR, at.format("%B").to_string()),
        (environ::STARTED_AT_HOUR, at.hour().to_string()),
        (environ::STARTED_AT_MINUTE, at.minute().to_string()),
        (environ::STARTED_AT_SECOND, at.second().to_string()),
        (environ::STARTED_AT_NANOSECOND, at.nanosecond().to_string()),
        (environ::STARTED_AT_OFFSET, offset.to_string()),
        (
            environ::STARTED_AT_WEEKDAY,
            at.weekday().num_days_from_sunday().to_string(),
        ),
        (environ::STARTED_AT_WEEKDAY_STR, at.format("%A").to_string()),
    ]
}

/// Best-effort IANA name of the local timezone: `TZ`, then the
/// `/etc/localtime` link target.
async fn local_timezone(env: &ParentEnv) -> Option<String> {
    if let Some(tz) = env.get("TZ").map(|tz| tz.trim_start_matches(':')) {
        if !tz.is_empty() {
            return Some(tz.to_string());
        }
    }

    let target = tokio::fs::read_link("/etc/localtime").await.ok()?;
    zone_from_link(&target.to_string_lossy())
}

fn zone_from_link(target: &str) -> Option<String> {
    target
        .split_once("zoneinfo/")
        .map(|(_, zone)| zone.to_string())
        .filter(|zone| !zone.is_empty())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn breaks_down_utc_instant() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        let entries: std::collections::HashMap<_, _> = time_entries(at).into_iter().collect();

        assert_eq!(entries[environ::STARTED_AT_RFC3339], "2024-03-05T07:08:09+00:00");
        assert_eq!(entries[environ::STARTED_AT_UNIX], "1709622489");
        assert_eq!(entries[environ::STARTED_AT_YEAR], "2024");
        assert_eq!(entries[environ::STARTED_AT_YEAR_DAY], "65");
        assert_eq!(entries[environ::STARTED_AT_DAY], "5");
        assert_eq!(entries[environ::STARTED_AT_MONTH], "3");
        assert_eq!(entries[environ::STARTED_AT_MONTH_STR], "March");
        assert_eq!(entries[environ::STARTED_AT_HOUR], "7");
        assert_eq!(entries[environ::STARTED_AT_MINUTE], "8");
        assert_eq!(entries[environ::STARTED_AT_SECOND], "9");
        assert_eq!(entries[environ::STARTED_AT_NANOSECOND], "0");
        assert_eq!(entries[environ::STARTED_AT_WEEKDAY], "2");
        assert_eq!(entries[environ::STARTED_AT_WEEKDAY_STR], "Tuesday");
    }

    #[test]
    fn zone_is_taken_from_zoneinfo_link() {
        assert_eq!(
            zone_from_link("/usr/share/zoneinfo/Europe/Berlin").as_deref(),
            Some("Europe/Berlin")
        );
        assert_eq!(zone_from_link("/etc/UTC"), None);
    }

    #[tokio::test]
    async fn tz_variable_wins() {
        let env = ParentEnv::from_pairs([("TZ", ":America/New_York")]);
        assert_eq!(local_timezone(&env).await.as_deref(), Some("America/New_York"));
    }
}
