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

//! IMAP mailbox sessions: `ImapConnector` opens them, `ImapMailbox` adapts the wire client
//! to the `MailboxClient` trait.

mod client;

pub use client::{
    connect_and_authenticate, encode_mailbox_name, AuthenticatedSession, FetchedMessage, ImapClientError,
    ImapSession, SelectResult,
};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::config::ImapSettings;
use crate::error::{MailsiftError, Result};
use crate::mailbox::{MailboxClient, MailboxConnector, RawMessage};
use crate::net::MailStream;

/// Connects to the configured IMAP server with TLS as configured and logs in.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImapConnector;

#[async_trait]
impl MailboxConnector for ImapConnector {
    type Client = ImapMailbox<MailStream>;

    async fn connect(&self, settings: &ImapSettings) -> Result<Self::Client> {
        info!(host = %settings.host, port = settings.port, tls = ?settings.tls, "connecting to IMAP server");
        let session = connect_and_authenticate(settings)
            .await
            .map_err(|e| MailsiftError::Connection(e.message))?;
        info!(user = %settings.username, "IMAP login succeeded");
        Ok(ImapMailbox::new(session))
    }
}

/// A logged-in IMAP session seen through the `MailboxClient` trait.
pub struct ImapMailbox<S> {
    session: ImapSession<S>,
}

impl<S> ImapMailbox<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(session: ImapSession<S>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl<S> MailboxClient for ImapMailbox<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn select_mailbox(&mut self, name: &str, read_only: bool) -> Result<()> {
        if !read_only {
            warn!(mailbox = %name, "read-write select requested; using EXAMINE");
        }
        let selected = self
            .session
            .examine(name)
            .await
            .map_err(|e| MailsiftError::Select(e.message))?;
        debug!(
            mailbox = %name,
            exists = selected.exists,
            uid_validity = ?selected.uid_validity,
            "mailbox selected"
        );
        Ok(())
    }

    async fn search(&mut self, criteria: &str) -> Result<Vec<u32>> {
        let ids = self
            .session
            .search(criteria)
            .await
            .map_err(|e| MailsiftError::Search(e.message))?;
        debug!(criteria = %criteria, matches = ids.len(), "search completed");
        Ok(ids)
    }

    async fn fetch_one(&mut self, seq: u32) -> Result<Option<RawMessage>> {
        let fetched = self
            .session
            .fetch_message(seq)
            .await
            .map_err(|e| MailsiftError::Connection(e.message))?;
        Ok(fetched.map(|m| RawMessage {
            uid: m.uid,
            seq,
            raw: m.raw,
        }))
    }

    async fn close(&mut self) -> Result<()> {
        self.session
            .logout()
            .await
            .map_err(|e| MailsiftError::Connection(e.message))
    }
}
