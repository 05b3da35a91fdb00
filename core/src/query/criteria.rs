/*
 * criteria.rs
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

//! IMAP SEARCH expression built from request filters.

use std::fmt;

use chrono::Duration;

use super::time::{TimeNormalizer, TimeRange};

/// Filters that shape the coarse server-side search.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchFilters<'a> {
    /// `UNSEEN` when true, otherwise `ALL`.
    pub unseen_only: bool,
    pub sender: Option<&'a str>,
    pub keyword: Option<&'a str>,
    pub range: TimeRange,
}

/// A complete, parenthesized SEARCH expression. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria(String);

impl SearchCriteria {
    /// Scope flag first, then `FROM`, `TEXT`, `SINCE`, `BEFORE` for the filters that are present.
    ///
    /// Date bounds have day granularity: `SINCE` is the local day of `start` (inclusive) and
    /// `BEFORE` the local day of `end + 1 day` (exclusive), so the day holding `end` is searched.
    pub fn build(filters: &SearchFilters<'_>, normalizer: &TimeNormalizer) -> Self {
        let mut parts = vec![if filters.unseen_only { "UNSEEN" } else { "ALL" }.to_string()];
        if let Some(sender) = filters.sender {
            parts.push(format!("FROM \"{}\"", sanitize(sender)));
        }
        if let Some(keyword) = filters.keyword {
            parts.push(format!("TEXT \"{}\"", sanitize(keyword)));
        }
        if let Some(start) = filters.range.start {
            parts.push(format!("SINCE {}", normalizer.imap_day(start)));
        }
        if let Some(end) = filters.range.end {
            parts.push(format!("BEFORE {}", normalizer.imap_day(end + Duration::days(1))));
        }
        Self(format!("({})", parts.join(" ")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Drop characters that could end the quoted string or the command line.
fn sanitize(value: &str) -> String {
    value.chars().filter(|c| !matches!(c, '"' | '\\' | '\r' | '\n')).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_flag_only() {
        let n = TimeNormalizer::new("UTC");
        let unseen = SearchFilters {
            unseen_only: true,
            ..Default::default()
        };
        assert_eq!(SearchCriteria::build(&unseen, &n).as_str(), "(UNSEEN)");
        assert_eq!(SearchCriteria::build(&SearchFilters::default(), &n).to_string(), "(ALL)");
    }

    #[test]
    fn one_day_in_jakarta() {
        let n = TimeNormalizer::new("Asia/Jakarta");
        let range = TimeRange::resolve(Some("2025-10-14"), Some("2025-10-14"), &n).unwrap();
        let filters = SearchFilters {
            unseen_only: true,
            range,
            ..Default::default()
        };
        assert_eq!(
            SearchCriteria::build(&filters, &n).as_str(),
            "(UNSEEN SINCE 14-Oct-2025 BEFORE 15-Oct-2025)"
        );
    }

    #[test]
    fn full_expression_in_order() {
        let n = TimeNormalizer::new("Asia/Jakarta");
        let range = TimeRange::resolve(Some("2025-10-01 08:00"), Some("2025-10-14 23:59:59"), &n).unwrap();
        let filters = SearchFilters {
            unseen_only: false,
            sender: Some("boss@example.com"),
            keyword: Some("invoice"),
            range,
        };
        assert_eq!(
            SearchCriteria::build(&filters, &n).as_str(),
            "(ALL FROM \"boss@example.com\" TEXT \"invoice\" SINCE 01-Oct-2025 BEFORE 15-Oct-2025)"
        );
    }

    #[test]
    fn quotes_cannot_break_out() {
        let n = TimeNormalizer::new("UTC");
        let filters = SearchFilters {
            unseen_only: true,
            sender: Some("x\" OR ALL \"y"),
            keyword: Some("a\\\"b\r\nc"),
            ..Default::default()
        };
        let criteria = SearchCriteria::build(&filters, &n);
        assert_eq!(criteria.as_str(), "(UNSEEN FROM \"x OR ALL y\" TEXT \"abc\")");
        assert!(criteria.as_str().starts_with("(UNSEEN"));
    }
}
