/*
 * parser.rs
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

//! MIME parser: receive(buffer) contract, consume complete lines, keep the remainder for the next call.

use crate::mime::base64;
use crate::mime::content_type::parse_content_type;
use crate::mime::handler::{MimeHandler, MimeParseError};
use crate::mime::quoted_printable;
use crate::mime::utils::is_usable_boundary;

/// Event-driven MIME parser. Feed data via receive(); handler gets callbacks.
pub struct MimeParser<H> {
    handler: H,
    state: ParserState,
    /// Incomplete line carried over from previous receive()
    line_buffer: Vec<u8>,
    /// Header line still open to continuation lines
    pending_header: Option<Vec<u8>>,
    /// Open entities, root first
    entities: Vec<Entity>,
    /// Transfer-encoded body of the innermost leaf entity
    body: Vec<u8>,
}

struct Entity {
    /// Delimiter for this entity's children (multipart only)
    boundary: Option<String>,
    /// Closing delimiter seen; later lines are epilogue
    closed: bool,
    transfer_encoding: Option<String>,
    /// Boundary of the parent that opened this entity; None for the root
    opened_by: Option<String>,
}

impl Entity {
    fn new(opened_by: Option<String>) -> Self {
        Self {
            boundary: None,
            closed: false,
            transfer_encoding: None,
            opened_by,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
enum ParserState {
    Init,
    Header,
    Body,
    Preamble,
    Epilogue,
}

/// A line that delimits parts: index of the owning multipart entity, and whether it closes it.
struct Delimiter {
    owner: usize,
    closing: bool,
}

impl<H: MimeHandler> MimeParser<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            state: ParserState::Init,
            line_buffer: Vec::new(),
            pending_header: None,
            entities: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Process every complete line in `buf`; an incomplete tail is kept internally until the
    /// next call or close(). Returns number of bytes taken from buf (always all of it).
    pub fn receive(&mut self, buf: &[u8]) -> Result<usize, MimeParseError> {
        self.line_buffer.extend_from_slice(buf);
        let Some(last_newline) = self.line_buffer.iter().rposition(|&b| b == b'\n') else {
            return Ok(buf.len());
        };
        let complete: Vec<u8> = self.line_buffer.drain(..=last_newline).collect();
        for line in complete.split_inclusive(|&b| b == b'\n') {
            self.process_line(trim_crlf(line))?;
        }
        Ok(buf.len())
    }

    fn process_line(&mut self, line: &[u8]) -> Result<(), MimeParseError> {
        match self.state {
            ParserState::Init => {
                self.entities.push(Entity::new(None));
                self.handler.start_entity(None)?;
                self.state = ParserState::Header;
                self.process_header_line(line)?;
            }
            ParserState::Header => {
                if let Some(delimiter) = self.match_delimiter(line) {
                    self.finish_headers()?;
                    return self.handle_delimiter(delimiter);
                }
                self.process_header_line(line)?;
            }
            ParserState::Body | ParserState::Preamble | ParserState::Epilogue => {
                if let Some(delimiter) = self.match_delimiter(line) {
                    return self.handle_delimiter(delimiter);
                }
                if self.state == ParserState::Body {
                    self.body.extend_from_slice(line);
                    self.body.extend_from_slice(b"\r\n");
                }
            }
        }
        Ok(())
    }

    fn process_header_line(&mut self, line: &[u8]) -> Result<(), MimeParseError> {
        if line.is_empty() {
            return self.finish_headers();
        }
        if matches!(line[0], b' ' | b'\t') {
            if let Some(pending) = self.pending_header.as_mut() {
                pending.extend_from_slice(line);
                return Ok(());
            }
        }
        self.flush_header()?;
        self.pending_header = Some(line.to_vec());
        Ok(())
    }

    fn finish_headers(&mut self) -> Result<(), MimeParseError> {
        self.flush_header()?;
        self.handler.end_headers()?;
        let multipart = self.entities.last().is_some_and(|e| e.boundary.is_some());
        self.state = if multipart { ParserState::Preamble } else { ParserState::Body };
        self.body.clear();
        Ok(())
    }

    fn flush_header(&mut self) -> Result<(), MimeParseError> {
        let Some(line) = self.pending_header.take() else {
            return Ok(());
        };
        let Some((name, value)) = split_header(&line) else {
            return Ok(());
        };
        let name = bytes_to_string(name);
        let value = bytes_to_string(value).trim().to_string();
        match name.to_ascii_lowercase().as_str() {
            "content-type" => {
                let boundary = parse_content_type(&value)
                    .filter(|ct| ct.is_primary_type("multipart"))
                    .and_then(|ct| ct.get_parameter("boundary").map(str::to_string))
                    .filter(|b| is_usable_boundary(b));
                if let Some(entity) = self.entities.last_mut() {
                    entity.boundary = boundary;
                }
                self.handler.content_type(&value)?;
            }
            "content-disposition" => self.handler.content_disposition(&value)?,
            "content-transfer-encoding" => {
                if let Some(entity) = self.entities.last_mut() {
                    entity.transfer_encoding = Some(value.to_ascii_lowercase());
                }
                self.handler.content_transfer_encoding(&value)?;
            }
            _ => self.handler.header(&name, &value)?,
        }
        Ok(())
    }

    /// Find the innermost open multipart whose boundary this line is.
    fn match_delimiter(&self, line: &[u8]) -> Option<Delimiter> {
        let rest = line.strip_prefix(b"--")?;
        self.entities.iter().enumerate().rev().find_map(|(owner, entity)| {
            if entity.closed {
                return None;
            }
            let after = rest.strip_prefix(entity.boundary.as_deref()?.as_bytes())?;
            if let Some(tail) = after.strip_prefix(b"--") {
                is_lwsp(tail).then_some(Delimiter { owner, closing: true })
            } else {
                is_lwsp(after).then_some(Delimiter { owner, closing: false })
            }
        })
    }

    fn handle_delimiter(&mut self, delimiter: Delimiter) -> Result<(), MimeParseError> {
        while self.entities.len() > delimiter.owner + 1 {
            self.finish_entity()?;
        }
        if delimiter.closing {
            self.entities[delimiter.owner].closed = true;
            self.state = ParserState::Epilogue;
        } else {
            let boundary = self.entities[delimiter.owner].boundary.clone();
            self.handler.start_entity(boundary.as_deref())?;
            self.entities.push(Entity::new(boundary));
            self.state = ParserState::Header;
        }
        Ok(())
    }

    /// Pop the innermost entity: deliver its decoded body if it is a leaf, then end it.
    fn finish_entity(&mut self) -> Result<(), MimeParseError> {
        let Some(entity) = self.entities.pop() else {
            return Ok(());
        };
        if entity.boundary.is_none() {
            let raw = std::mem::take(&mut self.body);
            let raw = raw.strip_suffix(b"\r\n").unwrap_or(&raw);
            let decoded = match entity.transfer_encoding.as_deref() {
                Some("base64") => base64::decode(raw),
                Some("quoted-printable") => quoted_printable::decode(raw),
                _ => raw.to_vec(),
            };
            if !decoded.is_empty() {
                self.handler.body_content(&decoded)?;
            }
        }
        self.handler.end_entity(entity.opened_by.as_deref())
    }

    /// Return the handler (e.g. after close) for inspection.
    pub fn into_inner(self) -> H {
        self.handler
    }

    /// End of input; flush any pending state and end every open entity.
    pub fn close(&mut self) -> Result<(), MimeParseError> {
        if !self.line_buffer.is_empty() {
            let line = std::mem::take(&mut self.line_buffer);
            self.process_line(trim_crlf(&line))?;
        }
        if self.state == ParserState::Header {
            self.finish_headers()?;
        }
        while !self.entities.is_empty() {
            self.finish_entity()?;
        }
        Ok(())
    }
}

fn trim_crlf(s: &[u8]) -> &[u8] {
    let s = s.strip_suffix(b"\n").unwrap_or(s);
    s.strip_suffix(b"\r").unwrap_or(s)
}

fn is_lwsp(s: &[u8]) -> bool {
    s.iter().all(|&b| b == b' ' || b == b'\t')
}

/// Header bytes are UTF-8 when valid, otherwise ISO-8859-1.
fn bytes_to_string(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn split_header(line: &[u8]) -> Option<(&[u8], &[u8])> {
    let colon = line.iter().position(|&b| b == b':')?;
    let name = &line[..colon];
    if name.is_empty() || name.iter().any(|b| b.is_ascii_whitespace()) {
        return None;
    }
    Some((name, &line[colon + 1..]))
}
