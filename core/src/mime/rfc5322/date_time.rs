/*
 * date_time.rs
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

//! RFC 5322 date-time parsing (section 3.3, with the obsolete forms of section 4.3).

use chrono::{DateTime, FixedOffset};

/// Parse an RFC 5322 date-time string (e.g. "Fri, 21 Nov 1997 09:55:06 -0600").
///
/// Also accepts what real mail carries: comments such as "(PDT)", a missing day-of-week,
/// two- and three-digit years, missing seconds, named zones, and no zone at all. A missing
/// or unrecognized zone is read as UTC. Returns None on parse failure.
pub fn parse_rfc5322_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let cleaned = strip_comments(value);
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(&cleaned)
        .ok()
        .or_else(|| parse_obsolete_date(&cleaned))
}

/// Remove (possibly nested) parenthesized comments.
fn strip_comments(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut depth = 0usize;
    for c in value.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Obsolete formats: tokens are normalized to `DD Mon YYYY HH:MM[:SS] +ZZZZ` and re-parsed.
fn parse_obsolete_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let mut tokens: Vec<&str> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.first().is_some_and(|t| t.chars().all(|c| c.is_ascii_alphabetic())) {
        tokens.remove(0);
    }
    if tokens.len() < 4 {
        return None;
    }
    let year = expand_year(tokens[2])?;
    let zone = tokens.get(4).map_or(Some("+0000"), |z| zone_offset(z))?;
    let normalized = format!("{} {} {} {} {}", tokens[0], tokens[1], year, tokens[3], zone);
    DateTime::parse_from_str(&normalized, "%d %b %Y %H:%M:%S %z")
        .or_else(|_| DateTime::parse_from_str(&normalized, "%d %b %Y %H:%M %z"))
        .ok()
}

/// RFC 5322 section 4.3: 00-49 -> 2000-2049, 50-99 -> 1950-1999, three digits + 1900.
fn expand_year(token: &str) -> Option<u32> {
    if !token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let yy: u32 = token.parse().ok()?;
    Some(match token.len() {
        2 if yy <= 49 => 2000 + yy,
        2 => 1900 + yy,
        3 => 1900 + yy,
        _ => yy,
    })
}

/// Numeric zones pass through; obsolete names map to offsets; anything else is UTC.
fn zone_offset(zone: &str) -> Option<&str> {
    let bytes = zone.as_bytes();
    if bytes.len() == 5 && matches!(bytes[0], b'+' | b'-') && bytes[1..].iter().all(u8::is_ascii_digit) {
        return Some(zone);
    }
    Some(match zone.to_ascii_uppercase().as_str() {
        "EST" => "-0500",
        "EDT" => "-0400",
        "CST" => "-0600",
        "CDT" => "-0500",
        "MST" => "-0700",
        "MDT" => "-0600",
        "PST" => "-0800",
        "PDT" => "-0700",
        _ => "+0000",
    })
}
