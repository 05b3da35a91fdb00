/*
 * parameter.rs
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

//! MIME header parameters (RFC 2045 section 5.1): `; name=value` and `; name="quoted value"`.

use super::utils::is_token;

/// One `name=value` pair. Names compare case-insensitively; values keep their case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    value: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_value(&self) -> &str {
        &self.value
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Parse a semicolon-separated parameter list. Malformed entries are skipped, not fatal.
pub fn parse_parameter_list(params_part: &str) -> Vec<Parameter> {
    let mut parameters = Vec::new();
    let mut rest = params_part.trim_start_matches(|c: char| c == ';' || c.is_whitespace());
    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else {
            break;
        };
        if let Some(semi) = rest[..eq].find(';') {
            rest = rest[semi + 1..].trim_start_matches(|c: char| c == ';' || c.is_whitespace());
            continue;
        }
        let name = rest[..eq].trim();
        let after = rest[eq + 1..].trim_start();
        let (value, remainder) = if let Some(quoted) = after.strip_prefix('"') {
            read_quoted(quoted)
        } else {
            let end = after.find(';').unwrap_or(after.len());
            (after[..end].trim().to_string(), &after[end..])
        };
        if is_token(name) {
            parameters.push(Parameter::new(name, value));
        }
        rest = remainder.trim_start_matches(|c: char| c == ';' || c.is_whitespace());
    }
    parameters
}

/// Read a quoted-string body (opening quote already consumed). Returns (value, text after the closing quote
/// up to the next parameter).
fn read_quoted(s: &str) -> (String, &str) {
    let mut value = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    value.push(escaped);
                }
            }
            '"' => {
                let tail = &s[i + 1..];
                let next = tail.find(';').map(|n| &tail[n..]).unwrap_or("");
                return (value, next);
            }
            _ => value.push(c),
        }
    }
    (value, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_and_quoted_values() {
        let params = parse_parameter_list(r#"charset=UTF-8; name="Q3 \"final\".pdf"; format=flowed"#);
        assert_eq!(params.len(), 3);
        assert!(params[0].is_named("CHARSET"));
        assert_eq!(params[0].get_value(), "UTF-8");
        assert_eq!(params[1].get_value(), "Q3 \"final\".pdf");
        assert_eq!(params[2].get_value(), "flowed");
    }

    #[test]
    fn quoted_value_may_contain_semicolons_and_utf8() {
        let params = parse_parameter_list(r#"filename="été; brouillon.txt""#);
        assert_eq!(params, vec![Parameter::new("filename", "été; brouillon.txt")]);
    }

    #[test]
    fn empty_and_garbage() {
        assert!(parse_parameter_list("").is_empty());
        assert!(parse_parameter_list(";;").is_empty());
        assert_eq!(parse_parameter_list("junk; a=b").len(), 1);
    }
}
