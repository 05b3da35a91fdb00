/*
 * mod.rs
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

//! Event-driven MIME and RFC 5322 message parsing (push/handler model).

mod base64;
mod content_disposition;
mod content_type;
mod handler;
mod parameter;
mod parser;
mod quoted_printable;
mod rfc2047;
mod rfc5322;
mod snippet;
mod utils;

pub use content_disposition::marks_attachment;
pub use content_type::{parse_content_type, ContentType};
pub use handler::{MimeHandler, MimeParseError};
pub use parameter::Parameter;
pub use parser::MimeParser;
pub use rfc2047::{decode_encoded_words, EncodedWordError};
pub use rfc5322::parse_rfc5322_date;
pub use snippet::{make_snippet, select_snippet_text, SNIPPET_MAX_CHARS};
pub use utils::{collapse_whitespace, is_token, is_usable_boundary};
