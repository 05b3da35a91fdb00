/*
 * content_disposition.rs
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

//! Content-Disposition header (RFC 2183): attachment detection.

/// Loose attachment test: any mention of "attachment" in the raw header value counts, so
/// malformed headers such as `attachment filename=x` still mark the part.
pub fn marks_attachment(raw_value: &str) -> bool {
    raw_value.to_ascii_lowercase().contains("attachment")
}
