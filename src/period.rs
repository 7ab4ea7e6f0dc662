//! # Period
//! Calendar month used as the caching and query granularity.
//!
//! A `Period` is always anchored on the first day of its month. Keys are
//! rendered as `yyyy-MM`; the UTC window is `[first day 00:00, last
//! nanosecond of the month]`, inclusive on both ends, so it admits exactly
//! the instants [`Period::contains`] does.

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ingest::types::FetchParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period(NaiveDate);

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Period)
    }

    /// Period containing the given instant (UTC).
    pub fn containing(ts: DateTime<Utc>) -> Self {
        Self::of_date(ts.date_naive())
    }

    pub fn of_date(d: NaiveDate) -> Self {
        // day 1 exists in every month
        Period(d.with_day(1).unwrap_or(d))
    }

    pub fn current() -> Self {
        Self::containing(Utc::now())
    }

    /// Accepts `yyyy-MM`, `yyyy-MM-dd` or a full RFC 3339 timestamp.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(Self::of_date(d));
        }
        if let Ok(d) = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d") {
            return Some(Period(d));
        }
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| Self::containing(dt.with_timezone(&Utc)))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn key(&self) -> String {
        self.0.format("%Y-%m").to_string()
    }

    pub fn prev(&self) -> Option<Self> {
        self.0.checked_sub_months(Months::new(1)).map(Period)
    }

    pub fn next(&self) -> Option<Self> {
        self.0.checked_add_months(Months::new(1)).map(Period)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.0.and_time(NaiveTime::MIN).and_utc()
    }

    /// Last representable instant of the month.
    pub fn end(&self) -> DateTime<Utc> {
        let one = chrono::Duration::nanoseconds(1);
        match self.next() {
            Some(n) => n.start() - one,
            None => self.start() + chrono::Duration::days(31) - one,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        Self::containing(ts) == *self
    }

    pub fn fetch_params(&self) -> FetchParams {
        FetchParams::window(self.start(), self.end())
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m"))
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key())
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Period::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid period '{s}'")))
    }
}
