/*
 * lib.rs
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

//! Mailsift core: filtered retrieval of messages from an IMAP mailbox, normalization into flat
//! records, precise time-range filtering, and JSON/CSV export.
//!
//! A request flows through `request` (parameters), `query` (times and SEARCH criteria),
//! `protocol::imap` (session), `extract` (records), `query::range` and `export`.
//! `pipeline::run` drives the whole sequence.

pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod mailbox;
pub mod mime;
pub mod net;
pub mod pipeline;
pub mod protocol;
pub mod query;
pub mod record;
pub mod request;

pub use config::{ImapSettings, ServiceConfig, TlsMode};
pub use error::{MailsiftError as Error, Result};
pub use export::{ExportArtifact, ExportFormat, Exporter};
pub use mailbox::{MailboxClient, MailboxConnector, RawMessage};
pub use pipeline::{error_json, run, FetchOutcome, FetchResponse};
pub use protocol::imap::ImapConnector;
pub use record::{MessageRecord, RECORD_FIELDS};
pub use request::{FetchRequest, OutputMode, ParamBag, RequestDefaults};
