/*
 * record.rs
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

//! The normalized, protocol-independent form of one retrieved message.

use serde::{Deserialize, Serialize};

/// Column order shared by every tabular rendering of records.
pub const RECORD_FIELDS: [&str; 7] = ["uid", "seq", "from", "subject", "date", "message_id", "snippet"];

/// One retrieved message. Built once by the extractor and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Store-assigned unique id; empty when the store did not report one.
    pub uid: String,
    /// Sequence number at search time, as text.
    pub seq: String,
    pub from: String,
    pub subject: String,
    /// UTC RFC 3339 instant, or the raw Date header when it could not be parsed.
    pub date: String,
    pub message_id: String,
    /// At most 200 characters, whitespace collapsed.
    pub snippet: String,
}

impl MessageRecord {
    /// Field values in `RECORD_FIELDS` order.
    pub fn values(&self) -> [&str; 7] {
        [
            &self.uid,
            &self.seq,
            &self.from,
            &self.subject,
            &self.date,
            &self.message_id,
            &self.snippet,
        ]
    }
}
