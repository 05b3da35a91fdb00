/*
 * config.rs
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

//! Service configuration, resolved once at startup from environment variables.
//! `from_lookup` takes any key lookup so callers (and tests) decide where values come from.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::MailsiftError;

pub const DEFAULT_PORT: u16 = 993;
pub const DEFAULT_MAILBOX: &str = "INBOX";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TZ: &str = "Asia/Jakarta";
pub const DEFAULT_EXPORT_DIR: &str = "exports";

/// How the connection to the mail store is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// TLS handshake immediately after TCP connect (IMAPS, 993).
    Implicit,
    /// Plain connect, then STARTTLS before LOGIN. Fails if the server does not advertise it.
    StartTls,
    /// No TLS at all. Only sensible for local test servers.
    Plain,
}

impl TlsMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tls" | "ssl" | "implicit" => Some(TlsMode::Implicit),
            "starttls" => Some(TlsMode::StartTls),
            "plain" | "none" => Some(TlsMode::Plain),
            _ => None,
        }
    }
}

/// Everything needed to open one session against the mail store.
#[derive(Clone)]
pub struct ImapSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub tls: TlsMode,
    /// Bounds connect + login, and every later command round trip.
    pub timeout: Duration,
}

impl std::fmt::Debug for ImapSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tls", &self.tls)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Process-wide configuration: session settings plus request defaults and the export root.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub imap: ImapSettings,
    pub default_mailbox: String,
    pub default_tz: String,
    pub export_dir: PathBuf,
}

impl ServiceConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, MailsiftError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MailsiftError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| MailsiftError::Config(format!("{} is not set", key)))
        };

        let host = required("IMAP_HOST")?;
        let username = required("IMAP_USER")?;
        // Password is taken verbatim; surrounding spaces are significant.
        let password = lookup("IMAP_PASS")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| MailsiftError::Config("IMAP_PASS is not set".into()))?;

        let port = match get("IMAP_PORT") {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| MailsiftError::Config(format!("IMAP_PORT is not a port number: {}", p)))?,
            None => DEFAULT_PORT,
        };
        let timeout_secs = match get("IMAP_TIMEOUT") {
            Some(t) => t
                .parse::<u64>()
                .ok()
                .filter(|&secs| secs > 0)
                .ok_or_else(|| MailsiftError::Config(format!("IMAP_TIMEOUT must be a positive number of seconds: {}", t)))?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        let tls = match get("IMAP_SECURITY") {
            Some(s) => TlsMode::parse(&s)
                .ok_or_else(|| MailsiftError::Config(format!("IMAP_SECURITY must be tls, starttls or plain: {}", s)))?,
            None => TlsMode::Implicit,
        };

        Ok(Self {
            imap: ImapSettings {
                host,
                port,
                username,
                password,
                tls,
                timeout: Duration::from_secs(timeout_secs),
            },
            default_mailbox: get("IMAP_MAILBOX").unwrap_or_else(|| DEFAULT_MAILBOX.to_string()),
            default_tz: get("DEFAULT_TZ").unwrap_or_else(|| DEFAULT_TZ.to_string()),
            export_dir: export_dir_from_lookup(&lookup),
        })
    }

    /// Export root alone, for callers that never open a session (artifact lookup).
    pub fn export_dir_from_env() -> PathBuf {
        export_dir_from_lookup(|key| std::env::var(key).ok())
    }
}

/// `EXPORT_DIR`, or the default relative `exports` directory.
pub fn export_dir_from_lookup<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    lookup("EXPORT_DIR")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_DIR))
}
