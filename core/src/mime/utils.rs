/*
 * utils.rs
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

//! MIME parsing utilities (RFC 2045 token, multipart boundary).

/// Checks if a character is valid in an RFC 2045 token.
#[inline]
pub fn is_token_char(c: u8) -> bool {
    matches!(c,
        b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z' |
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' |
        b'^' | b'_' | b'`' | b'{' | b'|' | b'}' | b'~'
    )
}

/// Checks if the string is a valid RFC 2045 token (1+ token chars).
pub fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_token_char)
}

/// Boundary usable for splitting a multipart body: 1-70 bytes, no line breaks. Characters
/// outside the RFC 2046 set are tolerated since real senders use them.
pub fn is_usable_boundary(boundary: &str) -> bool {
    (1..=70).contains(&boundary.len()) && !boundary.contains(['\r', '\n'])
}

/// Collapse every run of whitespace to one space and trim both ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries() {
        assert!(is_usable_boundary("----=_Part_0_12345.678"));
        assert!(is_usable_boundary("simple boundary"));
        assert!(is_usable_boundary("b@x#1"));
        assert!(!is_usable_boundary(""));
        assert!(!is_usable_boundary(&"x".repeat(71)));
    }

    #[test]
    fn whitespace_runs_collapse() {
        assert_eq!(collapse_whitespace("  a\r\n\t b  c "), "a b c");
        assert_eq!(collapse_whitespace("\r\n"), "");
    }
}
