use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, Utc};
use strum::{Display, EnumIter, EnumString};

use super::*;

pub use strum::IntoEnumIterator;

pub type PeriodKey = String;

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const SPACED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(
    Serialize,
    Deserialize,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Clone,
    Copy,
    EnumIter,
    EnumString,
    Display,
)]
pub enum TimePeriod {
    #[strum(serialize = "daily")]
    #[serde(rename = "daily")]
    Day,
    #[strum(serialize = "weekly")]
    #[serde(rename = "weekly")]
    Week,
    #[strum(serialize = "monthly")]
    #[serde(rename = "monthly")]
    Month,
}

impl TimePeriod {
    /// Bucket key for a calendar date: `YYYY-MM-DD` for days, the Monday of the
    /// ISO week for weeks and `YYYY-MM` for months.
    pub fn period_key(&self, date: NaiveDate) -> Option<PeriodKey> {
        let key = match self {
            TimePeriod::Day => date.format("%Y-%m-%d").to_string(),
            TimePeriod::Week => week_start(date)?.format("%Y-%m-%d").to_string(),
            TimePeriod::Month => format!("{:04}-{:02}", date.year(), date.month()),
        };
        Some(key)
    }

    pub fn time_string(&self, timestamp: &DateTime<Utc>) -> Option<PeriodKey> {
        self.period_key(timestamp.date_naive())
    }
}

pub fn week_start(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(date.weekday().num_days_from_monday() as u64))
}

/// Accepts `2024-11-05T10:00:00Z` (and other RFC 3339 forms) or `2024-11-05 10:00:00`,
/// the latter interpreted as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, ISO_FORMAT) {
        return Some(naive.and_utc());
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, SPACED_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Extracts the trailing date of a snapshot file stem such as `contributors_2024-11-05`
/// or `contributors_2024_11_05`. Mixed separators are tolerated as well.
pub fn date_from_file_stem(stem: &str) -> Option<NaiveDate> {
    let start = stem.len().checked_sub(10)?;
    let tail = stem.get(start..)?;
    let normalized: String = tail
        .chars()
        .map(|c| if c == '_' { '-' } else { c })
        .collect();
    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn period_keys() {
        // 2024-11-07 is a Thursday
        let day = date(2024, 11, 7);
        assert_eq!(TimePeriod::Day.period_key(day).unwrap(), "2024-11-07");
        assert_eq!(TimePeriod::Week.period_key(day).unwrap(), "2024-11-04");
        assert_eq!(TimePeriod::Month.period_key(day).unwrap(), "2024-11");
    }

    #[test]
    fn week_starts_on_monday_across_month_boundary() {
        // Sunday 2024-12-01 belongs to the week starting Monday 2024-11-25
        assert_eq!(
            TimePeriod::Week.period_key(date(2024, 12, 1)).unwrap(),
            "2024-11-25"
        );
        assert_eq!(
            TimePeriod::Week.period_key(date(2024, 11, 25)).unwrap(),
            "2024-11-25"
        );
    }

    #[test]
    fn both_timestamp_formats_parse_to_same_instant() {
        let iso = parse_timestamp("2024-11-05T10:20:30Z").unwrap();
        let spaced = parse_timestamp("2024-11-05 10:20:30").unwrap();
        assert_eq!(iso, spaced);
        assert!(parse_timestamp("2024-11-05T10:20:30.123Z").is_some());
        assert!(parse_timestamp("05/11/2024").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn file_stem_dates() {
        let expected = date(2024, 11, 5);
        assert_eq!(date_from_file_stem("contributors_2024-11-05"), Some(expected));
        assert_eq!(date_from_file_stem("contributors_2024_11_05"), Some(expected));
        assert_eq!(date_from_file_stem("contributors_2024_11-05"), Some(expected));
        assert_eq!(date_from_file_stem("contributors"), None);
        assert_eq!(date_from_file_stem("scored"), None);
    }

    #[test]
    fn granularity_names() {
        assert_eq!(TimePeriod::Week.to_string(), "weekly");
        assert_eq!("monthly".parse::<TimePeriod>().unwrap(), TimePeriod::Month);
        assert_eq!(TimePeriod::iter().count(), 3);
    }
}
