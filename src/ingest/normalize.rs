// src/ingest/normalize.rs
//! Shapes provider records into [`TgeEvent`].
//!
//! Every adapter maps its own payload type into a [`RawEvent`] (all fields
//! optional, nothing trusted) and hands it to [`normalize`], which either
//! returns a canonical event or `None` when the record must be dropped.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use sha2::{Digest, Sha256};

use super::normalize_text;
use super::types::{Credibility, MarketLink, TgeEvent};

pub const PLACEHOLDER_NAME: &str = "Unknown Event";

/// Date as found in a provider payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawDate {
    Text(String),
    UnixSeconds(i64),
}

impl From<&str> for RawDate {
    fn from(s: &str) -> Self {
        RawDate::Text(s.to_string())
    }
}

/// Untrusted, provider-agnostic input to the normalizer.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub start: Option<RawDate>,
    pub end: Option<RawDate>,
    pub blockchain: Option<String>,
    pub symbol: Option<String>,
    pub credibility: Credibility,
    pub announcement_url: Option<String>,
    pub markets: Vec<MarketLink>,
}

impl Default for RawEvent {
    fn default() -> Self {
        Self {
            id: None,
            name: None,
            description: None,
            start: None,
            end: None,
            blockchain: None,
            symbol: None,
            credibility: Credibility::Unverified,
            announcement_url: None,
            markets: Vec::new(),
        }
    }
}

/// Parse the date shapes providers actually send. Naive values are read as UTC.
pub fn parse_event_date(raw: &RawDate) -> Option<DateTime<Utc>> {
    match raw {
        RawDate::UnixSeconds(secs) => Utc.timestamp_opt(*secs, 0).single(),
        RawDate::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
                if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
                    return Some(ndt.and_utc());
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        }
    }
}

/// Stable id for records whose source carries none.
pub fn synthesize_id(source: &str, name: &str, start: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(b"|");
    hasher.update(start.to_rfc3339().as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(source.len() + 17);
    out.push_str(source);
    out.push('-');
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn clean_opt(s: Option<String>) -> Option<String> {
    s.map(|v| normalize_text(&v)).filter(|v| !v.is_empty())
}

/// Convert one raw record. `now` is used when the source omits a start date;
/// a start date that is present but unparseable drops the record.
pub fn normalize(source: &str, raw: RawEvent, now: DateTime<Utc>) -> Option<TgeEvent> {
    let start_date = match &raw.start {
        Some(d) => parse_event_date(d)?,
        None => now,
    };
    let end_date = raw.end.as_ref().and_then(parse_event_date);

    let name = clean_opt(raw.name).unwrap_or_else(|| PLACEHOLDER_NAME.to_string());
    let id = raw
        .id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| synthesize_id(source, &name, start_date));

    let markets = raw
        .markets
        .into_iter()
        .filter_map(|m| {
            let title = normalize_text(&m.title);
            (!title.is_empty()).then(|| MarketLink {
                title,
                url: m.url.filter(|u| !u.trim().is_empty()),
            })
        })
        .collect();

    Some(TgeEvent {
        id,
        name,
        description: raw.description.map(|d| normalize_text(&d)).unwrap_or_default(),
        start_date,
        end_date,
        blockchain: clean_opt(raw.blockchain),
        symbol: clean_opt(raw.symbol).map(|s| s.to_ascii_uppercase()),
        credibility: raw.credibility,
        announcement_url: raw.announcement_url.filter(|u| !u.trim().is_empty()),
        markets,
    })
}

fn fold(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Name folded for duplicate detection. A trailing trading pair such as
/// `(ASTER/USDT)` is removed, as is a trailing `(SYM)` that repeats the
/// event's own symbol; other bracketed text stays part of the name. Only
/// lower-case alphanumerics remain. If stripping leaves nothing, the whole
/// name is folded instead.
pub fn dedup_name(name: &str, symbol: Option<&str>) -> String {
    static RE_PAIR: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_pair = RE_PAIR.get_or_init(|| {
        regex::Regex::new(r"\s*[(\[]\s*[[:alnum:]]+\s*/\s*[[:alnum:]]+\s*[)\]]\s*$").unwrap()
    });
    static RE_TAIL: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tail = RE_TAIL.get_or_init(|| regex::Regex::new(r"\s*[(\[]([^()\[\]]*)[)\]]\s*$").unwrap());

    let mut base = re_pair.replace(name, "").into_owned();
    let cut = symbol.and_then(|sym| {
        let caps = re_tail.captures(&base)?;
        let whole = caps.get(0)?;
        caps[1].trim().eq_ignore_ascii_case(sym.trim()).then_some(whole.start())
    });
    if let Some(at) = cut {
        base.truncate(at);
    }

    let folded = fold(&base);
    if folded.is_empty() {
        fold(name)
    } else {
        folded
    }
}

/// Composite key: folded name + UTC calendar day of the start date.
pub fn dedup_key(ev: &TgeEvent) -> String {
    format!(
        "{}|{}",
        dedup_name(&ev.name, ev.symbol.as_deref()),
        ev.start_date.format("%Y-%m-%d")
    )
}
