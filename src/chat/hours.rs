use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::warn;

const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Jerusalem;

const WEEK: [(Weekday, &str); 7] = [
    (Weekday::Sun, "sunday"),
    (Weekday::Mon, "monday"),
    (Weekday::Tue, "tuesday"),
    (Weekday::Wed, "wednesday"),
    (Weekday::Thu, "thursday"),
    (Weekday::Fri, "friday"),
    (Weekday::Sat, "saturday"),
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DayHours {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
}

/// Weekly opening table keyed by lowercase English day names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingHours {
    days: HashMap<String, DayHours>,
}

impl WorkingHours {
    pub fn parse(json: &str) -> Result<Self> {
        let days: HashMap<String, DayHours> =
            serde_json::from_str(json).context("Invalid working hours JSON")?;
        let days = days
            .into_iter()
            .map(|(day, hours)| (day.to_lowercase(), hours))
            .collect();
        Ok(Self { days })
    }

    pub fn day(&self, weekday: Weekday) -> Option<&DayHours> {
        let name = WEEK.iter().find(|(d, _)| *d == weekday)?.1;
        self.days.get(name)
    }

    /// True iff today's entry is active and `start <= HH:MM <= end`.
    pub fn is_open_at(&self, weekday: Weekday, time: NaiveTime) -> bool {
        let Some(hours) = self.day(weekday) else {
            return false;
        };
        if !hours.active {
            return false;
        }
        let (Some(start), Some(end)) = (parse_hhmm(&hours.start), parse_hhmm(&hours.end)) else {
            warn!(start = %hours.start, end = %hours.end, "Unparseable working hours entry");
            return false;
        };
        let Some(minute) = NaiveTime::from_hms_opt(time.hour(), time.minute(), 0) else {
            return false;
        };
        start <= minute && minute <= end
    }

    pub fn is_open(&self, timezone: &str, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&resolve_timezone(timezone));
        self.is_open_at(local.weekday(), local.time())
    }

    /// `day: start-end` / `day: closed` lines, Sunday first.
    pub fn describe(&self) -> String {
        WEEK.iter()
            .filter_map(|(_, name)| {
                self.days.get(*name).map(|hours| {
                    if hours.active {
                        format!("{}: {}-{}", name, hours.start, hours.end)
                    } else {
                        format!("{}: closed", name)
                    }
                })
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn resolve_timezone(name: &str) -> Tz {
    name.parse::<Tz>().unwrap_or_else(|_| {
        warn!("Unknown timezone '{}', using {}", name, DEFAULT_TIMEZONE);
        DEFAULT_TIMEZONE
    })
}

fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const HOURS: &str = r#"{
        "sunday": {"active": true, "start": "08:00", "end": "18:00"},
        "friday": {"active": true, "start": "08:00", "end": "13:00"},
        "saturday": {"active": false, "start": "", "end": ""}
    }"#;

    fn at(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn window_is_inclusive_at_minute_resolution() {
        let hours = WorkingHours::parse(HOURS).unwrap();
        assert!(hours.is_open_at(Weekday::Sun, at(8, 0, 0)));
        assert!(hours.is_open_at(Weekday::Sun, at(18, 0, 59)));
        assert!(!hours.is_open_at(Weekday::Sun, at(18, 1, 0)));
        assert!(!hours.is_open_at(Weekday::Sun, at(7, 59, 59)));
    }

    #[test]
    fn inactive_and_missing_days_are_closed() {
        let hours = WorkingHours::parse(HOURS).unwrap();
        assert!(!hours.is_open_at(Weekday::Sat, at(12, 0, 0)));
        assert!(!hours.is_open_at(Weekday::Tue, at(12, 0, 0)));
    }

    #[test]
    fn local_time_uses_business_timezone() {
        let hours = WorkingHours::parse(HOURS).unwrap();
        // 2024-01-07 is a Sunday; 05:30 UTC is 07:30 in Jerusalem (UTC+2 in winter).
        let early = Utc.with_ymd_and_hms(2024, 1, 7, 5, 30, 0).unwrap();
        assert!(!hours.is_open("Asia/Jerusalem", early));
        // 06:30 UTC is 08:30 local.
        let open = Utc.with_ymd_and_hms(2024, 1, 7, 6, 30, 0).unwrap();
        assert!(hours.is_open("Asia/Jerusalem", open));
        // Same instant is still 06:30 in UTC, before opening.
        assert!(!hours.is_open("UTC", open));
    }

    #[test]
    fn unknown_timezone_falls_back() {
        assert_eq!(resolve_timezone("Mars/Olympus"), DEFAULT_TIMEZONE);
    }

    #[test]
    fn describe_lists_days_in_week_order() {
        let hours = WorkingHours::parse(HOURS).unwrap();
        assert_eq!(
            hours.describe(),
            "sunday: 08:00-18:00\nfriday: 08:00-13:00\nsaturday: closed"
        );
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(WorkingHours::parse("not json").is_err());
    }
}
