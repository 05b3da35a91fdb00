/*
 * error.rs
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

//! Request-level errors.

use thiserror::Error;

/// Errors surfaced by a retrieval request.
///
/// Caller faults (`is_client_error`) are detected before any session is opened;
/// session faults carry the server or transport message verbatim.
#[derive(Debug, Error)]
pub enum MailsiftError {
    #[error("unrecognized date/time: {0}")]
    InvalidTimestamp(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("SELECT failed: {0}")]
    Select(String),

    #[error("SEARCH failed: {0}")]
    Search(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl MailsiftError {
    /// True when the request itself was at fault (bad input), false for server-side failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MailsiftError::InvalidTimestamp(_)
                | MailsiftError::InvalidParameter(_)
                | MailsiftError::ArtifactNotFound(_)
        )
    }
}

impl From<serde_json::Error> for MailsiftError {
    fn from(e: serde_json::Error) -> Self {
        MailsiftError::Export(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MailsiftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_caller_faults() {
        assert!(MailsiftError::InvalidTimestamp("x".into()).is_client_error());
        assert!(MailsiftError::InvalidParameter("limit".into()).is_client_error());
        assert!(!MailsiftError::Search("NO".into()).is_client_error());
        assert!(!MailsiftError::Export("disk full".into()).is_client_error());
    }

    #[test]
    fn session_errors_keep_server_message() {
        let e = MailsiftError::Select("A0002 NO Mailbox does not exist".into());
        assert_eq!(e.to_string(), "SELECT failed: A0002 NO Mailbox does not exist");
    }
}
