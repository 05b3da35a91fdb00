/*
 * extract.rs
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

//! Message extraction: one raw message in, one `MessageRecord` out, never a hard failure.
//!
//! Every field is computed as a `FieldOutcome` so callers and tests can see whether the value
//! was decoded, fell back to the raw header text, or was unavailable.

use chrono::{SecondsFormat, Utc};
use tracing::debug;

use crate::mailbox::RawMessage;
use crate::mime::{
    decode_encoded_words, make_snippet, parse_rfc5322_date, select_snippet_text, MimeHandler, MimeParseError,
    MimeParser,
};
use crate::record::MessageRecord;

/// How a field value was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    /// Decoded or normalized successfully.
    Decoded(String),
    /// Decoding failed; the raw header text is kept verbatim.
    FallbackRaw(String),
    /// Nothing to decode (header absent or empty, no usable body).
    Empty,
}

impl FieldOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            FieldOutcome::Decoded(s) | FieldOutcome::FallbackRaw(s) => s,
            FieldOutcome::Empty => "",
        }
    }

    pub fn into_value(self) -> String {
        match self {
            FieldOutcome::Decoded(s) | FieldOutcome::FallbackRaw(s) => s,
            FieldOutcome::Empty => String::new(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, FieldOutcome::FallbackRaw(_))
    }
}

/// Per-field extraction results for one message, before flattening into a record.
#[derive(Debug, Clone)]
pub struct ExtractedMessage {
    pub uid: String,
    pub seq: u32,
    pub from: FieldOutcome,
    pub subject: FieldOutcome,
    pub date: FieldOutcome,
    pub message_id: String,
    pub snippet: FieldOutcome,
}

impl ExtractedMessage {
    pub fn into_record(self) -> MessageRecord {
        MessageRecord {
            uid: self.uid,
            seq: self.seq.to_string(),
            from: self.from.into_value(),
            subject: self.subject.into_value(),
            date: self.date.into_value(),
            message_id: self.message_id,
            snippet: self.snippet.into_value(),
        }
    }
}

/// Extract every field of `message`. Faults in one field never affect the others.
pub fn extract_message(message: &RawMessage) -> ExtractedMessage {
    let headers = TopLevelHeaders::read(&message.raw);
    let extracted = ExtractedMessage {
        uid: message.uid.clone(),
        seq: message.seq,
        from: decode_header_field(headers.from.as_deref()),
        subject: decode_header_field(headers.subject.as_deref()),
        date: normalize_date(headers.date.as_deref()),
        message_id: headers.message_id.unwrap_or_default(),
        snippet: extract_snippet(&message.raw),
    };
    for (field, outcome) in [
        ("from", &extracted.from),
        ("subject", &extracted.subject),
        ("date", &extracted.date),
    ] {
        if outcome.is_fallback() {
            debug!(seq = message.seq, field, raw = %outcome.as_str(), "kept raw header text");
        }
    }
    extracted
}

/// Extract and flatten in one step.
pub fn extract_record(message: &RawMessage) -> MessageRecord {
    extract_message(message).into_record()
}

/// Decode RFC 2047 encoded-words; on failure keep the raw text.
pub fn decode_header_field(raw: Option<&str>) -> FieldOutcome {
    match raw {
        None => FieldOutcome::Empty,
        Some(raw) if raw.trim().is_empty() => FieldOutcome::Empty,
        Some(raw) => match decode_encoded_words(raw) {
            Ok(decoded) => FieldOutcome::Decoded(decoded),
            Err(_) => FieldOutcome::FallbackRaw(raw.to_string()),
        },
    }
}

/// Date header to a UTC RFC 3339 string (`+00:00` suffix); unparseable text is kept raw.
pub fn normalize_date(raw: Option<&str>) -> FieldOutcome {
    match raw {
        None => FieldOutcome::Empty,
        Some(raw) if raw.trim().is_empty() => FieldOutcome::Empty,
        Some(raw) => match parse_rfc5322_date(raw) {
            Some(date) => {
                FieldOutcome::Decoded(date.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::AutoSi, false))
            }
            None => FieldOutcome::FallbackRaw(raw.to_string()),
        },
    }
}

/// Snippet from the selected body part; any parse fault gives `Empty`.
pub fn extract_snippet(raw: &[u8]) -> FieldOutcome {
    match select_snippet_text(raw) {
        Ok(Some(text)) => FieldOutcome::Decoded(make_snippet(&text)),
        Ok(None) => FieldOutcome::Empty,
        Err(e) => {
            debug!(error = %e, "snippet unavailable");
            FieldOutcome::Empty
        }
    }
}

/// First occurrence of each header of interest in the top-level header block.
#[derive(Default)]
struct TopLevelHeaders {
    from: Option<String>,
    subject: Option<String>,
    date: Option<String>,
    message_id: Option<String>,
}

impl TopLevelHeaders {
    fn read(raw: &[u8]) -> Self {
        let mut parser = MimeParser::new(Self::default());
        let parsed = parser.receive(header_block(raw)).and_then(|_| parser.close());
        if let Err(e) = parsed {
            debug!(error = %e, "header block could not be parsed");
        }
        parser.into_inner()
    }
}

impl MimeHandler for TopLevelHeaders {
    fn header(&mut self, name: &str, value: &str) -> Result<(), MimeParseError> {
        let slot = match name.to_ascii_lowercase().as_str() {
            "from" => &mut self.from,
            "subject" => &mut self.subject,
            "date" => &mut self.date,
            "message-id" => &mut self.message_id,
            _ => return Ok(()),
        };
        if slot.is_none() {
            *slot = Some(value.to_string());
        }
        Ok(())
    }
}

/// Bytes up to and including the blank line that ends the top-level headers.
fn header_block(raw: &[u8]) -> &[u8] {
    let mut line_start = 0;
    for (i, &b) in raw.iter().enumerate() {
        if b == b'\n' {
            let line = &raw[line_start..i];
            if line.is_empty() || line == b"\r" {
                return &raw[..=i];
            }
            line_start = i + 1;
        }
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(raw: &str) -> RawMessage {
        RawMessage {
            uid: "812".into(),
            seq: 4,
            raw: raw.as_bytes().to_vec(),
        }
    }

    #[test]
    fn well_formed_message() {
        let raw = concat!(
            "From: =?UTF-8?Q?Jos=C3=A9?= <jose@example.com>\r\n",
            "Subject: =?UTF-8?B?UmFwYXQgbWluZ2d1YW4=?=\r\n",
            "Date: Tue, 14 Oct 2025 08:15:00 +0700\r\n",
            "Message-ID: <abc@example.com>\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "Halo   semua,\r\n\r\nsampai jumpa.\r\n",
        );
        let record = extract_record(&message(raw));
        assert_eq!(
            record,
            MessageRecord {
                uid: "812".into(),
                seq: "4".into(),
                from: "José <jose@example.com>".into(),
                subject: "Rapat mingguan".into(),
                date: "2025-10-14T01:15:00+00:00".into(),
                message_id: "<abc@example.com>".into(),
                snippet: "Halo semua, sampai jumpa.".into(),
            }
        );
    }

    #[test]
    fn undecodable_subject_is_kept_raw() {
        let raw = "Subject: =?utf-8?B?!!!!?=\r\n\r\nx";
        let extracted = extract_message(&message(raw));
        assert_eq!(extracted.subject, FieldOutcome::FallbackRaw("=?utf-8?B?!!!!?=".into()));
    }

    #[test]
    fn legacy_charset_headers_decode() {
        let raw = concat!(
            "From: =?ISO-8859-2?B?UPjtbGm5IL5sdbtvdehr/SBr+fI=?= <kun@example.cz>\r\n",
            "Subject: =?KOI8-R?B?8NLJ18XU?= =?GB2312?B?1tDOxA==?=\r\n",
            "\r\n",
            "x\r\n",
        );
        let extracted = extract_message(&message(raw));
        assert_eq!(extracted.from, FieldOutcome::Decoded("Příliš žluťoučký kůň <kun@example.cz>".into()));
        assert_eq!(extracted.subject, FieldOutcome::Decoded("Привет中文".into()));

        let jp = extract_message(&message("Subject: =?ISO-2022-JP?B?GyRCRnxLXDhsGyhC?=\r\n\r\nx"));
        assert_eq!(jp.subject, FieldOutcome::Decoded("日本語".into()));
    }

    #[test]
    fn unknown_charset_keeps_raw_header() {
        let raw = "Subject: =?x-made-up?Q?caf=E9?=\r\n\r\nx";
        let extracted = extract_message(&message(raw));
        assert_eq!(extracted.subject, FieldOutcome::FallbackRaw("=?x-made-up?Q?caf=E9?=".into()));
    }

    #[test]
    fn bad_date_kept_raw_and_missing_date_empty() {
        assert_eq!(
            normalize_date(Some("sometime last week")),
            FieldOutcome::FallbackRaw("sometime last week".into())
        );
        assert_eq!(normalize_date(None), FieldOutcome::Empty);
        assert_eq!(
            normalize_date(Some("14 Oct 2025 08:15:00")),
            FieldOutcome::Decoded("2025-10-14T08:15:00+00:00".into())
        );
    }

    #[test]
    fn missing_headers_degrade_to_empty() {
        let record = extract_record(&message("X-Junk: 1\r\n\r\n"));
        assert_eq!(record.from, "");
        assert_eq!(record.subject, "");
        assert_eq!(record.date, "");
        assert_eq!(record.message_id, "");
        assert_eq!(record.snippet, "");
    }

    #[test]
    fn headers_in_parts_are_ignored() {
        let raw = concat!(
            "Subject: outer\r\n",
            "Content-Type: multipart/mixed; boundary=q\r\n\r\n",
            "--q\r\n",
            "Subject: inner\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "part text\r\n",
            "--q--\r\n",
        );
        let record = extract_record(&message(raw));
        assert_eq!(record.subject, "outer");
        assert_eq!(record.snippet, "part text");
    }

    #[test]
    fn snippet_never_exceeds_limit() {
        let raw = format!("Subject: long\r\n\r\n{}", "lorem \t ipsum\r\n".repeat(100));
        let record = extract_record(&message(&raw));
        assert!(record.snippet.chars().count() <= 200);
        assert!(!record.snippet.contains("  "));
    }

    #[test]
    fn header_block_stops_at_blank_line() {
        assert_eq!(header_block(b"A: 1\r\n\r\nbody"), b"A: 1\r\n\r\n");
        assert_eq!(header_block(b"A: 1\n\nbody"), b"A: 1\n\n");
        assert_eq!(header_block(b"A: 1"), b"A: 1");
    }
}
