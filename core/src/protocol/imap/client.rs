/*
 * client.rs
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

//! Async IMAP client: greeting, CAPABILITY, STARTTLS, LOGIN, EXAMINE, SEARCH, FETCH, LOGOUT.
//! Every command is a single tagged round trip bounded by the session timeout.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::{ImapSettings, TlsMode};
use crate::net::MailStream;

/// Literals larger than this are refused rather than buffered.
const MAX_LITERAL: usize = 64 * 1024 * 1024;

/// IMAP client error (network, protocol, auth).
#[derive(Debug)]
pub struct ImapClientError {
    pub message: String,
}

impl ImapClientError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { message: msg.into() }
    }
}

impl std::fmt::Display for ImapClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ImapClientError {}

impl From<io::Error> for ImapClientError {
    fn from(e: io::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// One line of IMAP response (untagged * or tagged A001).
#[derive(Debug, Clone)]
pub struct ImapLine {
    pub raw: String,
    pub tag: Option<String>,
    pub untagged: bool,
    pub status: Option<ImapStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImapStatus {
    Ok,
    No,
    Bad,
}

fn parse_status(rest: &str) -> Option<ImapStatus> {
    let word = rest.split(' ').next().unwrap_or("");
    if word.eq_ignore_ascii_case("OK") {
        Some(ImapStatus::Ok)
    } else if word.eq_ignore_ascii_case("NO") {
        Some(ImapStatus::No)
    } else if word.eq_ignore_ascii_case("BAD") {
        Some(ImapStatus::Bad)
    } else {
        None
    }
}

/// Parse "* OK ..." or "A001 OK ..." from a line.
fn parse_line(s: &str) -> ImapLine {
    let raw = s.to_string();
    let untagged = s.starts_with('*');
    let (tag, status) = if untagged {
        let rest = s.trim_start_matches('*').trim_start();
        (None, parse_status(rest))
    } else {
        let mut sp = s.splitn(2, ' ');
        let t = sp.next().unwrap_or("").to_string();
        let rest = sp.next().unwrap_or("");
        (Some(t), parse_status(rest))
    };
    ImapLine {
        raw,
        tag: tag.filter(|t| !t.is_empty()),
        untagged,
        status,
    }
}

/// A complete server response: the text of every line segment joined, plus the literals
/// that sat between them (e.g. the message body of a FETCH).
#[derive(Debug)]
pub struct ImapResponse {
    pub line: ImapLine,
    pub literals: Vec<Vec<u8>>,
}

/// Read one CRLF-terminated line; if it ends with {N}, return (line, Some(N)) without reading the literal.
async fn read_imap_line_literal_size<S>(
    stream: &mut S,
    buf: &mut Vec<u8>,
) -> io::Result<(String, Option<usize>)>
where
    S: AsyncRead + Unpin,
{
    buf.clear();
    loop {
        let mut b = [0u8; 1];
        let n = stream.read(&mut b).await?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"));
        }
        buf.push(b[0]);
        if buf.len() >= 2 && buf[buf.len() - 2..] == *b"\r\n" {
            break;
        }
    }
    let line_end = buf.len() - 2;
    let line = String::from_utf8_lossy(&buf[..line_end]).trim_end().to_string();
    let literal_size = match line.rfind('{') {
        Some(open) if line.ends_with('}') => line[open + 1..line.len() - 1]
            .trim_end_matches('+')
            .trim()
            .parse()
            .ok(),
        _ => None,
    };
    Ok((line, literal_size))
}

/// Read a full response, following literals until a line ends without one.
async fn read_response<S>(stream: &mut S, buf: &mut Vec<u8>) -> io::Result<ImapResponse>
where
    S: AsyncRead + Unpin,
{
    let mut text = String::new();
    let mut literals = Vec::new();
    loop {
        let (segment, literal_size) = read_imap_line_literal_size(stream, buf).await?;
        text.push_str(&segment);
        match literal_size {
            Some(n) if n > MAX_LITERAL => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("literal of {} bytes exceeds limit", n),
                ));
            }
            Some(n) => {
                let mut lit = vec![0u8; n];
                stream.read_exact(&mut lit).await?;
                literals.push(lit);
            }
            None => break,
        }
    }
    Ok(ImapResponse {
        line: parse_line(&text),
        literals,
    })
}

/// Write a line (no CRLF) then CRLF.
async fn write_line<S>(stream: &mut S, line: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(line).await?;
    stream.write_all(b"\r\n").await?;
    stream.flush().await?;
    Ok(())
}

/// Send command with tag, read until the tagged response. Returns (untagged responses, tagged line).
async fn send_command<S>(
    stream: &mut S,
    read_buf: &mut Vec<u8>,
    tag: &str,
    command: &str,
) -> Result<(Vec<ImapResponse>, ImapLine), ImapClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let full = format!("{} {}", tag, command);
    write_line(stream, full.as_bytes()).await?;

    let mut untagged = Vec::new();
    loop {
        let response = read_response(stream, read_buf).await?;
        if !response.line.untagged && response.line.tag.as_deref() == Some(tag) {
            return Ok((untagged, response.line));
        }
        untagged.push(response);
    }
}

fn has_starttls(capabilities: &[String]) -> bool {
    capabilities.iter().any(|c| c.eq_ignore_ascii_case("STARTTLS"))
}

/// Parse capability list from "* CAPABILITY IMAP4rev1 STARTTLS ..." or from [CAPABILITY ...] in OK.
fn parse_capabilities(line: &str) -> Vec<String> {
    const BRACKETED: &str = "[CAPABILITY ";
    let s = line
        .strip_prefix("* CAPABILITY ")
        .or_else(|| {
            line.find(BRACKETED)
                .map(|i| &line[i + BRACKETED.len()..])
                .and_then(|t| t.split(']').next())
        })
        .unwrap_or("");
    s.split_whitespace().map(|w| w.to_uppercase()).collect()
}

/// Generate next tag (A0001, A0002, ...).
fn next_tag() -> String {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed) % 9999 + 1;
    format!("A{:04}", n)
}

fn quote_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Modified BASE64 (RFC 3501 5.1.3): ',' instead of '/', no padding.
fn modified_base64(b: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+,";
    let mut out = String::with_capacity((b.len() + 2) / 3 * 4);
    for chunk in b.chunks(3) {
        let n = (chunk[0] as usize) << 16
            | (chunk.get(1).copied().unwrap_or(0) as usize) << 8
            | chunk.get(2).copied().unwrap_or(0) as usize;
        out.push(ALPHABET[n >> 18] as char);
        out.push(ALPHABET[(n >> 12) & 63] as char);
        if chunk.len() > 1 {
            out.push(ALPHABET[(n >> 6) & 63] as char);
        }
        if chunk.len() > 2 {
            out.push(ALPHABET[n & 63] as char);
        }
    }
    out
}

/// Encode a mailbox name in modified UTF-7 so non-ASCII names survive the wire.
pub fn encode_mailbox_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending: Vec<u16> = Vec::new();
    let flush = |pending: &mut Vec<u16>, out: &mut String| {
        if pending.is_empty() {
            return;
        }
        let bytes: Vec<u8> = pending.iter().flat_map(|u| u.to_be_bytes()).collect();
        out.push('&');
        out.push_str(&modified_base64(&bytes));
        out.push('-');
        pending.clear();
    };
    for c in name.chars() {
        if (' '..='~').contains(&c) {
            flush(&mut pending, &mut out);
            if c == '&' {
                out.push_str("&-");
            } else {
                out.push(c);
            }
        } else {
            let mut units = [0u16; 2];
            pending.extend_from_slice(c.encode_utf16(&mut units));
        }
    }
    flush(&mut pending, &mut out);
    out
}

/// Parse the numbers out of "* SEARCH 1 2 3" lines. Ascending, without duplicates.
fn parse_search_results(responses: &[ImapResponse]) -> Vec<u32> {
    let mut ids: Vec<u32> = responses
        .iter()
        .filter_map(|r| {
            let rest = r.line.raw.strip_prefix("* ")?;
            let (word, tail) = rest.split_at(rest.find(' ').unwrap_or(rest.len()));
            word.eq_ignore_ascii_case("SEARCH").then_some(tail)
        })
        .flat_map(|tail| tail.split_whitespace().filter_map(|n| n.parse::<u32>().ok()))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Extract the UID attribute from a FETCH response text (e.g. "* 4 FETCH (UID 812 BODY[] {120})").
fn parse_fetch_uid(text: &str) -> Option<String> {
    let upper = text.to_ascii_uppercase();
    let mut search_from = 0;
    while let Some(i) = upper[search_from..].find("UID ") {
        let at = search_from + i;
        let boundary_ok = at == 0 || matches!(upper.as_bytes()[at - 1], b'(' | b' ');
        if boundary_ok {
            let digits: String = text[at + 4..].chars().take_while(|c| c.is_ascii_digit()).collect();
            if !digits.is_empty() {
                return Some(digits);
            }
        }
        search_from = at + 4;
    }
    None
}

/// Sequence number of an untagged "* N FETCH" response.
fn fetch_seq(text: &str) -> Option<u32> {
    let rest = text.strip_prefix("* ")?;
    let mut words = rest.split_whitespace();
    let seq = words.next()?.parse().ok()?;
    words.next().filter(|w| w.eq_ignore_ascii_case("FETCH"))?;
    Some(seq)
}

/// Result of EXAMINE/SELECT (EXISTS, UIDVALIDITY).
#[derive(Debug, Default)]
pub struct SelectResult {
    pub exists: u32,
    pub uid_validity: Option<u32>,
    pub read_only: bool,
}

fn parse_select_result(untagged: &[ImapResponse], tagged: &ImapLine) -> SelectResult {
    let mut result = SelectResult {
        read_only: tagged.raw.to_ascii_uppercase().contains("[READ-ONLY]"),
        ..SelectResult::default()
    };
    for r in untagged {
        let Some(rest) = r.line.raw.strip_prefix("* ") else {
            continue;
        };
        if let Some(n) = rest.strip_suffix(" EXISTS").and_then(|n| n.trim().parse().ok()) {
            result.exists = n;
        } else if let Some(i) = rest.find("[UIDVALIDITY ") {
            result.uid_validity = rest[i + 13..]
                .split(|c: char| c == ']' || c.is_whitespace())
                .next()
                .and_then(|n| n.parse().ok());
        }
    }
    result
}

/// One fetched message: raw RFC 822 bytes and the store-assigned UID ("" if the server omitted it).
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    pub uid: String,
    pub raw: Vec<u8>,
}

/// An IMAP session over any byte stream. Tests drive it over an in-memory duplex.
pub struct ImapSession<S> {
    stream: S,
    read_buf: Vec<u8>,
    capabilities: Vec<String>,
    timeout: Duration,
}

/// Session over a real network stream.
pub type AuthenticatedSession = ImapSession<MailStream>;

impl<S> ImapSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Read the server greeting and learn capabilities (from the greeting or via CAPABILITY).
    pub async fn start(stream: S, timeout: Duration) -> Result<Self, ImapClientError> {
        let mut session = Self {
            stream,
            read_buf: Vec::with_capacity(4096),
            capabilities: Vec::new(),
            timeout,
        };
        let greeting = session.read_greeting().await?;
        session.capabilities = parse_capabilities(&greeting);
        if session.capabilities.is_empty() {
            session.refresh_capabilities().await?;
        }
        Ok(session)
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    async fn read_greeting(&mut self) -> Result<String, ImapClientError> {
        let response = tokio::time::timeout(self.timeout, read_response(&mut self.stream, &mut self.read_buf))
            .await
            .map_err(|_| ImapClientError::new("timed out waiting for server greeting"))??;
        let line = response.line.raw;
        if !line.starts_with("* OK") && !line.starts_with("* PREAUTH") {
            return Err(ImapClientError::new(format!("expected * OK greeting, got: {}", line)));
        }
        Ok(line)
    }

    /// Run one tagged command under the session timeout.
    async fn command(&mut self, command: &str) -> Result<(Vec<ImapResponse>, ImapLine), ImapClientError> {
        let tag = next_tag();
        let verb = command.split(' ').next().unwrap_or(command).to_string();
        tokio::time::timeout(
            self.timeout,
            send_command(&mut self.stream, &mut self.read_buf, &tag, command),
        )
        .await
        .map_err(|_| ImapClientError::new(format!("{} timed out after {}s", verb, self.timeout.as_secs())))?
    }

    /// Run a command that must end in tagged OK.
    async fn command_ok(&mut self, command: &str) -> Result<Vec<ImapResponse>, ImapClientError> {
        let (untagged, final_line) = self.command(command).await?;
        match final_line.status {
            Some(ImapStatus::Ok) => Ok(untagged),
            _ => Err(ImapClientError::new(final_line.raw)),
        }
    }

    async fn refresh_capabilities(&mut self) -> Result<(), ImapClientError> {
        let untagged = self.command_ok("CAPABILITY").await?;
        self.capabilities = untagged
            .iter()
            .find(|r| r.line.raw.starts_with("* CAPABILITY "))
            .map(|r| parse_capabilities(&r.line.raw))
            .unwrap_or_default();
        Ok(())
    }

    /// LOGIN with quoted user and password.
    pub async fn login(&mut self, user: &str, pass: &str) -> Result<(), ImapClientError> {
        if self.capabilities.iter().any(|c| c == "LOGINDISABLED") {
            return Err(ImapClientError::new("server advertises LOGINDISABLED on this connection"));
        }
        let cmd = format!("LOGIN {} {}", quote_string(user), quote_string(pass));
        self.command_ok(&cmd).await?;
        Ok(())
    }

    /// EXAMINE: select the mailbox read-only, so reading never changes flags.
    pub async fn examine(&mut self, mailbox: &str) -> Result<SelectResult, ImapClientError> {
        let cmd = format!("EXAMINE {}", quote_string(&encode_mailbox_name(mailbox)));
        let (untagged, final_line) = self.command(&cmd).await?;
        if final_line.status != Some(ImapStatus::Ok) {
            return Err(ImapClientError::new(final_line.raw));
        }
        Ok(parse_select_result(&untagged, &final_line))
    }

    /// SEARCH with a prebuilt criteria expression. Returns sequence numbers in ascending order.
    pub async fn search(&mut self, criteria: &str) -> Result<Vec<u32>, ImapClientError> {
        let cmd = if criteria.is_ascii() {
            format!("SEARCH {}", criteria)
        } else {
            format!("SEARCH CHARSET UTF-8 {}", criteria)
        };
        let untagged = self.command_ok(&cmd).await?;
        Ok(parse_search_results(&untagged))
    }

    /// FETCH one message by sequence number without setting \Seen.
    /// Returns None when the server answers NO or sends no body for that number.
    pub async fn fetch_message(&mut self, seq: u32) -> Result<Option<FetchedMessage>, ImapClientError> {
        let cmd = format!("FETCH {} (UID BODY.PEEK[])", seq);
        let (untagged, final_line) = self.command(&cmd).await?;
        match final_line.status {
            Some(ImapStatus::Ok) => {}
            Some(ImapStatus::No) => return Ok(None),
            _ => return Err(ImapClientError::new(final_line.raw)),
        }
        let message = untagged
            .into_iter()
            .filter(|r| fetch_seq(&r.line.raw) == Some(seq))
            .find_map(|r| {
                let uid = parse_fetch_uid(&r.line.raw).unwrap_or_default();
                r.literals.into_iter().next().map(|raw| FetchedMessage { uid, raw })
            });
        Ok(message)
    }

    /// LOGOUT and shut the stream down.
    pub async fn logout(&mut self) -> Result<(), ImapClientError> {
        let result = self.command_ok("LOGOUT").await.map(|_| ());
        let _ = self.stream.shutdown().await;
        result
    }

    fn into_parts(self) -> (S, Vec<u8>, Duration) {
        (self.stream, self.read_buf, self.timeout)
    }
}

impl AuthenticatedSession {
    /// STARTTLS: upgrade the underlying stream, then re-learn capabilities (no new greeting is sent).
    async fn starttls(mut self, host: &str) -> Result<Self, ImapClientError> {
        if !has_starttls(&self.capabilities) {
            return Err(ImapClientError::new("server does not advertise STARTTLS"));
        }
        self.command_ok("STARTTLS").await?;
        let (stream, read_buf, timeout) = self.into_parts();
        let stream = stream.upgrade_to_tls(host).await?;
        let mut session = Self {
            stream,
            read_buf,
            capabilities: Vec::new(),
            timeout,
        };
        session.refresh_capabilities().await?;
        Ok(session)
    }
}

/// Connect, secure the stream as configured, and LOGIN. The whole sequence is bounded by the
/// configured timeout.
pub async fn connect_and_authenticate(settings: &ImapSettings) -> Result<AuthenticatedSession, ImapClientError> {
    let host = settings.host.as_str();
    let port = settings.port;
    let establish = async {
        let mut session = match settings.tls {
            TlsMode::Implicit => {
                let stream = MailStream::connect_implicit_tls(host, port).await?;
                ImapSession::start(stream, settings.timeout).await?
            }
            TlsMode::StartTls => {
                let stream = MailStream::connect_plain(host, port).await?;
                ImapSession::start(stream, settings.timeout).await?.starttls(host).await?
            }
            TlsMode::Plain => {
                let stream = MailStream::connect_plain(host, port).await?;
                ImapSession::start(stream, settings.timeout).await?
            }
        };
        session.login(&settings.username, &settings.password).await?;
        Ok::<_, ImapClientError>(session)
    };
    tokio::time::timeout(settings.timeout, establish)
        .await
        .map_err(|_| {
            ImapClientError::new(format!(
                "timed out after {}s connecting to {}:{}",
                settings.timeout.as_secs(),
                host,
                port
            ))
        })?
}
