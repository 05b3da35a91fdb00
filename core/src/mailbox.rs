/*
 * mailbox.rs
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

//! Mailbox traits: the seam between the retrieval pipeline and a mail store session.
//! The IMAP implementation lives in `protocol::imap`; tests substitute scripted fakes.

use async_trait::async_trait;

use crate::config::ImapSettings;
use crate::error::Result;

/// One message as retrieved from the store, before any header work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Store-assigned unique id as text; empty when the server did not report one.
    pub uid: String,
    /// Position of the message in the selected mailbox at search time.
    pub seq: u32,
    /// Full RFC 822 bytes.
    pub raw: Vec<u8>,
}

/// An open, authenticated session against one mail store.
#[async_trait]
pub trait MailboxClient: Send {
    /// Select a mailbox. With `read_only` the server must not change flags while we read.
    async fn select_mailbox(&mut self, name: &str, read_only: bool) -> Result<()>;

    /// Run a search and return matching sequence numbers in ascending order.
    async fn search(&mut self, criteria: &str) -> Result<Vec<u32>>;

    /// Fetch one message in full without marking it seen. `Ok(None)` when the server declined.
    async fn fetch_one(&mut self, seq: u32) -> Result<Option<RawMessage>>;

    /// End the session. Called on every path once the session exists.
    async fn close(&mut self) -> Result<()>;
}

/// Opens sessions. One connector serves many requests; each request gets its own session.
#[async_trait]
pub trait MailboxConnector: Send + Sync {
    type Client: MailboxClient;

    async fn connect(&self, settings: &ImapSettings) -> Result<Self::Client>;
}
