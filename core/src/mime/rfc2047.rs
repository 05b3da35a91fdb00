/*
 * rfc2047.rs
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

//! RFC 2047 encoded-word decoding (e.g. =?charset?q?text?=) for unstructured header values.
//!
//! Decoding is all-or-nothing per header: a syntactically complete encoded-word whose payload
//! or charset cannot be decoded fails the whole value, and the caller keeps the raw text.
//! Text that only looks like the start of an encoded-word is copied through untouched.

use std::fmt;

use encoding_rs::Encoding;

use super::base64;
use super::quoted_printable;

/// An encoded-word was well-formed but could not be turned into text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedWordError {
    pub message: String,
}

impl EncodedWordError {
    fn new(msg: impl Into<String>) -> Self {
        Self { message: msg.into() }
    }
}

impl fmt::Display for EncodedWordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EncodedWordError {}

/// Syntactic pieces of one encoded-word.
struct EncodedWord<'a> {
    charset: &'a str,
    encoding: u8,
    payload: &'a str,
    /// Byte length of the whole `=?...?=` token.
    len: usize,
}

/// Recognize `=?charset?X?payload?=` at the start of `s`.
fn scan_encoded_word(s: &str) -> Option<EncodedWord<'_>> {
    let body = s.strip_prefix("=?")?;
    let q1 = body.find('?')?;
    let charset = &body[..q1];
    if charset.is_empty() || charset.contains(|c: char| c.is_whitespace()) {
        return None;
    }
    let after_charset = &body[q1 + 1..];
    let mut enc_chars = after_charset.chars();
    let encoding = enc_chars.next().filter(|c| c.is_ascii_alphabetic())?.to_ascii_lowercase() as u8;
    if enc_chars.next() != Some('?') {
        return None;
    }
    let payload_area = &after_charset[2..];
    let end = payload_area.find("?=")?;
    let payload = &payload_area[..end];
    if payload.contains(|c: char| c.is_whitespace()) {
        return None;
    }
    Some(EncodedWord {
        charset,
        encoding,
        payload,
        len: 2 + q1 + 1 + 2 + end + 2,
    })
}

/// Expand RFC 2047 encoded-words. Whitespace separating two adjacent encoded-words is dropped
/// (RFC 2047 section 6.2); all other text is kept as is.
pub fn decode_encoded_words(s: &str) -> Result<String, EncodedWordError> {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    let mut pending_space: Option<&str> = None;
    let mut after_word = false;

    while !rest.is_empty() {
        let Some(start) = rest.find("=?") else {
            flush_literal(&mut out, &mut pending_space, rest);
            break;
        };
        let literal = &rest[..start];
        match scan_encoded_word(&rest[start..]) {
            Some(word) => {
                let text = decode_word(&word)?;
                if after_word && literal.trim().is_empty() {
                    pending_space = None;
                } else {
                    flush_literal(&mut out, &mut pending_space, literal);
                }
                out.push_str(&text);
                after_word = true;
                rest = &rest[start + word.len..];
                let ws_len = rest.len() - rest.trim_start().len();
                if ws_len > 0 {
                    pending_space = Some(&rest[..ws_len]);
                    rest = &rest[ws_len..];
                }
            }
            None => {
                flush_literal(&mut out, &mut pending_space, &rest[..start + 2]);
                after_word = false;
                rest = &rest[start + 2..];
            }
        }
    }
    if let Some(ws) = pending_space {
        out.push_str(ws);
    }
    Ok(out)
}

fn flush_literal(out: &mut String, pending_space: &mut Option<&str>, literal: &str) {
    if let Some(ws) = pending_space.take() {
        out.push_str(ws);
    }
    out.push_str(literal);
}

fn decode_word(word: &EncodedWord<'_>) -> Result<String, EncodedWordError> {
    let payload = word.payload.as_bytes();
    let bytes = match word.encoding {
        b'b' => base64::decode_strict(payload)
            .ok_or_else(|| EncodedWordError::new(format!("invalid base64 payload: {}", word.payload)))?,
        b'q' => decode_q(payload),
        other => {
            return Err(EncodedWordError::new(format!(
                "unknown encoded-word encoding: {}",
                other as char
            )))
        }
    };
    charset_bytes_to_string(&bytes, word.charset)
}

/// Q encoding: _ = space, rest is quoted-printable.
fn decode_q(payload: &[u8]) -> Vec<u8> {
    let spaced: Vec<u8> = payload.iter().map(|&b| if b == b'_' { b' ' } else { b }).collect();
    quoted_printable::decode(&spaced)
}

/// Convert decoded bytes to text in the named charset (WHATWG labels, so `gb2312`, `koi8-r`,
/// `iso-2022-jp` and friends all resolve). Unknown labels and malformed input are errors.
pub fn charset_bytes_to_string(bytes: &[u8], charset: &str) -> Result<String, EncodedWordError> {
    // RFC 2231 language suffix: utf-8*en
    let label = charset.split('*').next().unwrap_or(charset).trim();
    if label.eq_ignore_ascii_case("us-ascii") || label.eq_ignore_ascii_case("ascii") {
        return if bytes.is_ascii() {
            Ok(bytes.iter().map(|&b| b as char).collect())
        } else {
            Err(EncodedWordError::new("non-ASCII byte in us-ascii text"))
        };
    }
    let encoding = Encoding::for_label(label.as_bytes())
        .ok_or_else(|| EncodedWordError::new(format!("unknown charset {}", label)))?;
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(EncodedWordError::new(format!("malformed {} text", encoding.name())));
    }
    Ok(text.into_owned())
}
