/*
 * handler.rs
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

//! MIME handler trait: receives parsing events (entity, headers, body).

/// Handler for MIME parsing events (push model). Parser calls these as it reads.
///
/// Entities nest: every `start_entity` is matched by one `end_entity`, and the body of a
/// leaf entity arrives between its `end_headers` and `end_entity` with the transfer
/// encoding already removed.
pub trait MimeHandler {
    fn start_entity(&mut self, _boundary: Option<&str>) -> Result<(), MimeParseError> {
        Ok(())
    }

    fn content_type(&mut self, _content_type: &str) -> Result<(), MimeParseError> {
        Ok(())
    }

    fn content_disposition(&mut self, _value: &str) -> Result<(), MimeParseError> {
        Ok(())
    }

    fn content_transfer_encoding(&mut self, _encoding: &str) -> Result<(), MimeParseError> {
        Ok(())
    }

    /// Any other header, unfolded, with the raw value (no RFC 2047 decoding).
    fn header(&mut self, _name: &str, _value: &str) -> Result<(), MimeParseError> {
        Ok(())
    }

    fn end_headers(&mut self) -> Result<(), MimeParseError> {
        Ok(())
    }

    fn body_content(&mut self, _data: &[u8]) -> Result<(), MimeParseError> {
        Ok(())
    }

    fn end_entity(&mut self, _boundary: Option<&str>) -> Result<(), MimeParseError> {
        Ok(())
    }
}

#[derive(Debug)]
pub struct MimeParseError {
    pub message: String,
}

impl MimeParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { message: msg.into() }
    }
}

impl std::fmt::Display for MimeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for MimeParseError {}
