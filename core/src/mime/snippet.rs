/*
 * snippet.rs
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

//! Snippet body selection from raw RFC 822 / MIME bytes.
//!
//! For a multipart message the first `text/plain` part (in document order, at any depth) whose
//! Content-Disposition does not mention "attachment" supplies the text. A single-part message
//! supplies its own content when it is textual.

use crate::mime::content_disposition::marks_attachment;
use crate::mime::content_type::{parse_content_type, ContentType};
use crate::mime::handler::{MimeHandler, MimeParseError};
use crate::mime::parser::MimeParser;
use crate::mime::rfc2047::charset_bytes_to_string;
use crate::mime::utils::collapse_whitespace;

/// Longest snippet, in characters.
pub const SNIPPET_MAX_CHARS: usize = 200;

/// Text of the part chosen for the snippet, decoded to a string. None when no part qualifies.
pub fn select_snippet_text(raw: &[u8]) -> Result<Option<String>, MimeParseError> {
    let mut parser = MimeParser::new(SnippetCollector::default());
    parser.receive(raw)?;
    parser.close()?;
    Ok(parser.into_inner().selected)
}

/// Collapse whitespace runs and cut to `SNIPPET_MAX_CHARS` characters.
pub fn make_snippet(text: &str) -> String {
    collapse_whitespace(text).chars().take(SNIPPET_MAX_CHARS).collect()
}

#[derive(Default)]
struct PartInfo {
    content_type: Option<String>,
    disposition: Option<String>,
}

impl PartInfo {
    /// Parsed Content-Type; absent or malformed means text/plain (RFC 2045 section 5.2).
    fn parsed_type(&self) -> ContentType {
        self.content_type
            .as_deref()
            .and_then(parse_content_type)
            .unwrap_or_else(ContentType::default_text)
    }
}

#[derive(Default)]
struct SnippetCollector {
    parts: Vec<PartInfo>,
    root_multipart: bool,
    body: Vec<u8>,
    selected: Option<String>,
}

impl MimeHandler for SnippetCollector {
    fn start_entity(&mut self, _boundary: Option<&str>) -> Result<(), MimeParseError> {
        self.parts.push(PartInfo::default());
        self.body.clear();
        Ok(())
    }

    fn content_type(&mut self, value: &str) -> Result<(), MimeParseError> {
        if let Some(part) = self.parts.last_mut() {
            part.content_type = Some(value.to_string());
        }
        if self.parts.len() == 1 {
            self.root_multipart = parse_content_type(value).is_some_and(|ct| ct.is_primary_type("multipart"));
        }
        Ok(())
    }

    fn content_disposition(&mut self, value: &str) -> Result<(), MimeParseError> {
        if let Some(part) = self.parts.last_mut() {
            part.disposition = Some(value.to_string());
        }
        Ok(())
    }

    fn body_content(&mut self, data: &[u8]) -> Result<(), MimeParseError> {
        self.body.extend_from_slice(data);
        Ok(())
    }

    fn end_entity(&mut self, _boundary: Option<&str>) -> Result<(), MimeParseError> {
        let is_root = self.parts.len() == 1;
        let Some(part) = self.parts.pop() else {
            return Ok(());
        };
        let body = std::mem::take(&mut self.body);
        if self.selected.is_some() {
            return Ok(());
        }
        let ct = part.parsed_type();
        let wanted = if is_root {
            !self.root_multipart && ct.is_primary_type("text")
        } else {
            self.root_multipart
                && ct.is_mime_type("text", "plain")
                && !part.disposition.as_deref().is_some_and(marks_attachment)
        };
        if wanted {
            let charset = ct.charset().unwrap_or("us-ascii");
            let text = charset_bytes_to_string(&body, charset)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
            self.selected = Some(text);
        }
        Ok(())
    }
}
