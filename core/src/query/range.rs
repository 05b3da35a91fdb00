/*
 * range.rs
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

//! Precise, second-granularity filtering applied after fetch.

use chrono::{DateTime, Utc};

use super::time::TimeRange;
use crate::record::MessageRecord;

/// True when the record's date lies within every bound that is set (bounds inclusive).
/// With no bounds every record passes; with any bound an unparseable date fails.
pub fn within_range(record: &MessageRecord, range: &TimeRange) -> bool {
    if !range.is_bounded() {
        return true;
    }
    let Ok(date) = DateTime::parse_from_rfc3339(&record.date) else {
        return false;
    };
    let date = date.with_timezone(&Utc);
    range.start.map_or(true, |start| start <= date) && range.end.map_or(true, |end| date <= end)
}

/// Keep the records `within_range` accepts, in their original order.
pub fn apply_range(records: Vec<MessageRecord>, range: &TimeRange) -> Vec<MessageRecord> {
    records.into_iter().filter(|r| within_range(r, range)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: &str) -> MessageRecord {
        MessageRecord {
            uid: String::new(),
            seq: "1".into(),
            from: String::new(),
            subject: String::new(),
            date: date.into(),
            message_id: String::new(),
            snippet: String::new(),
        }
    }

    fn at(s: &str) -> Option<DateTime<Utc>> {
        Some(DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc))
    }

    #[test]
    fn unbounded_keeps_everything() {
        let range = TimeRange::default();
        assert!(within_range(&record("not a date"), &range));
        assert!(within_range(&record(""), &range));
    }

    #[test]
    fn unparseable_dropped_under_any_bound() {
        let start_only = TimeRange {
            start: at("2025-10-14T00:00:00Z"),
            end: None,
        };
        assert!(!within_range(&record("Tue, 14 Oct 2025 08:00"), &start_only));
        assert!(!within_range(&record("2025-10-14T08:00:00"), &start_only));
    }

    #[test]
    fn bounds_are_inclusive() {
        let range = TimeRange {
            start: at("2025-10-13T17:00:00Z"),
            end: at("2025-10-14T16:59:59Z"),
        };
        assert!(within_range(&record("2025-10-13T17:00:00+00:00"), &range));
        assert!(within_range(&record("2025-10-14T16:59:59+00:00"), &range));
        assert!(!within_range(&record("2025-10-14T17:00:00+00:00"), &range));
        assert!(!within_range(&record("2025-10-13T16:59:59+00:00"), &range));
    }

    #[test]
    fn inverted_range_matches_nothing() {
        let range = TimeRange {
            start: at("2025-10-15T00:00:00Z"),
            end: at("2025-10-14T00:00:00Z"),
        };
        let kept = apply_range(
            vec![record("2025-10-14T12:00:00+00:00"), record("2025-10-16T00:00:00+00:00")],
            &range,
        );
        assert!(kept.is_empty());
    }
}
