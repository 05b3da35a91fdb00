/*
 * time.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Mailsift, a filtered mailbox retrieval service.
 *
 * Mailsift is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Mailsift is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Mailsift.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Flexible date/time text to UTC instants, and UTC instants to zone-local IMAP days.

use chrono::{DateTime, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::{MailsiftError, Result};

/// Accepted forms carrying an explicit offset (a trailing `Z` is rewritten to `+00:00` first).
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M%z",
];

/// Accepted forms without an offset; these are read as wall-clock time in the request zone.
const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// IMAP SEARCH date: two-digit day, English month abbreviation, four-digit year (e.g. 14-Oct-2025).
const IMAP_DAY_FORMAT: &str = "%d-%b-%Y";

/// Interprets user date/time text in one timezone.
#[derive(Debug, Clone)]
pub struct TimeNormalizer {
    zone: Tz,
}

impl TimeNormalizer {
    /// Build for a named zone (IANA identifier). Unknown names fall back to UTC.
    pub fn new(zone_name: &str) -> Self {
        let zone = zone_name.trim().parse::<Tz>().unwrap_or_else(|_| {
            warn!(tz = %zone_name, "unknown timezone identifier; using UTC");
            Tz::UTC
        });
        Self { zone }
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// Parse `text` to a UTC instant. Empty (or whitespace-only) text is `None`; text in no
    /// recognized form is `InvalidTimestamp`.
    pub fn normalize(&self, text: &str) -> Result<Option<DateTime<Utc>>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        self.parse_with_offset(text)
            .or_else(|| self.parse_local(text))
            .map(Some)
            .ok_or_else(|| MailsiftError::InvalidTimestamp(text.to_string()))
    }

    fn parse_with_offset(&self, text: &str) -> Option<DateTime<Utc>> {
        let text = match text.strip_suffix(|c: char| c == 'Z' || c == 'z') {
            Some(head) => format!("{}+00:00", head),
            None => text.to_string(),
        };
        OFFSET_FORMATS
            .iter()
            .find_map(|fmt| DateTime::<FixedOffset>::parse_from_str(&text, fmt).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn parse_local(&self, text: &str) -> Option<DateTime<Utc>> {
        let naive = LOCAL_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })?;
        self.attach_zone(naive)
    }

    /// Wall-clock time in the request zone to UTC. Ambiguous times (clocks going back) take the
    /// earlier instant; times inside a gap (clocks going forward) use the offset in force
    /// before the transition.
    fn attach_zone(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self.zone.from_local_datetime(&naive) {
            LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
            LocalResult::None => {
                let before = naive - Duration::hours(3);
                self.zone
                    .from_local_datetime(&before)
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc) + Duration::hours(3))
            }
        }
    }

    /// The calendar day containing `instant` in the request zone, in IMAP SEARCH form.
    pub fn imap_day(&self, instant: DateTime<Utc>) -> String {
        instant.with_timezone(&self.zone).format(IMAP_DAY_FORMAT).to_string()
    }
}

/// Optional UTC bounds of a request. An inverted range is allowed and simply matches nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// Normalize both bounds; the first malformed one aborts with `InvalidTimestamp`.
    pub fn resolve(start: Option<&str>, end: Option<&str>, normalizer: &TimeNormalizer) -> Result<Self> {
        Ok(Self {
            start: start.map(|s| normalizer.normalize(s)).transpose()?.flatten(),
            end: end.map(|s| normalizer.normalize(s)).transpose()?.flatten(),
        })
    }

    pub fn is_bounded(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn explicit_offsets_are_trusted() {
        let n = TimeNormalizer::new("Asia/Jakarta");
        assert_eq!(n.normalize("2025-10-14T13:45:10+07:00").unwrap(), Some(utc("2025-10-14T06:45:10Z")));
        assert_eq!(n.normalize("2025-10-14T13:45:10Z").unwrap(), Some(utc("2025-10-14T13:45:10Z")));
        assert_eq!(n.normalize("2025-10-14 13:45-0300").unwrap(), Some(utc("2025-10-14T16:45:00Z")));
        assert_eq!(
            n.normalize("2025-10-14T13:45:10.250+00:00").unwrap(),
            Some(utc("2025-10-14T13:45:10.250Z"))
        );
    }

    #[test]
    fn naive_values_use_request_zone() {
        let n = TimeNormalizer::new("Asia/Jakarta");
        assert_eq!(n.normalize("2025-10-14T13:45:10").unwrap(), Some(utc("2025-10-14T06:45:10Z")));
        assert_eq!(n.normalize("2025-10-14 13:45").unwrap(), Some(utc("2025-10-14T06:45:00Z")));
        assert_eq!(n.normalize(" 2025-10-14 23:59:59 ").unwrap(), Some(utc("2025-10-14T16:59:59Z")));
    }

    #[test]
    fn bare_date_is_local_midnight() {
        let n = TimeNormalizer::new("Asia/Jakarta");
        assert_eq!(n.normalize("2025-10-14").unwrap(), Some(utc("2025-10-13T17:00:00Z")));
        let ny = TimeNormalizer::new("America/New_York");
        assert_eq!(ny.normalize("2025-01-15").unwrap(), Some(utc("2025-01-15T05:00:00Z")));
    }

    #[test]
    fn empty_is_none_and_garbage_is_error() {
        let n = TimeNormalizer::new("UTC");
        assert_eq!(n.normalize("").unwrap(), None);
        assert_eq!(n.normalize("   ").unwrap(), None);
        for _ in 0..2 {
            assert!(matches!(n.normalize("14/10/2025"), Err(MailsiftError::InvalidTimestamp(_))));
        }
        assert!(n.normalize("2025-13-01").is_err());
    }

    #[test]
    fn unknown_zone_falls_back_to_utc() {
        let n = TimeNormalizer::new("Mars/Olympus_Mons");
        assert_eq!(n.zone(), Tz::UTC);
        assert_eq!(n.normalize("2025-10-14").unwrap(), Some(utc("2025-10-14T00:00:00Z")));
    }

    #[test]
    fn dst_edges() {
        let ny = TimeNormalizer::new("America/New_York");
        // 2025-11-02 01:30 happens twice; the EDT reading comes first.
        assert_eq!(ny.normalize("2025-11-02 01:30").unwrap(), Some(utc("2025-11-02T05:30:00Z")));
        // 2025-03-09 02:30 does not exist; read with the EST offset.
        assert_eq!(ny.normalize("2025-03-09 02:30").unwrap(), Some(utc("2025-03-09T07:30:00Z")));
    }

    #[test]
    fn imap_day_uses_local_calendar() {
        let n = TimeNormalizer::new("Asia/Jakarta");
        assert_eq!(n.imap_day(utc("2025-10-13T17:00:00Z")), "14-Oct-2025");
        assert_eq!(n.imap_day(utc("2025-10-13T16:59:59Z")), "13-Oct-2025");
        assert_eq!(n.imap_day(utc("2025-03-05T00:00:00Z")), "05-Mar-2025");
    }

    #[test]
    fn range_resolution() {
        let n = TimeNormalizer::new("UTC");
        let range = TimeRange::resolve(Some("2025-10-14"), None, &n).unwrap();
        assert!(range.is_bounded());
        assert_eq!(range.end, None);
        assert!(!TimeRange::resolve(Some(""), None, &n).unwrap().is_bounded());
        assert!(TimeRange::resolve(None, Some("soon"), &n).is_err());
    }
}
