/*
 * pipeline.rs
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

//! One retrieval request end to end: normalize times, build the SEARCH expression, run the
//! session (select, search, keep the newest `limit` ids, fetch and extract one at a time),
//! filter precisely by time, then return records inline or as a stored artifact.

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::ImapSettings;
use crate::error::{MailsiftError, Result};
use crate::export::{ExportArtifact, Exporter};
use crate::extract::extract_record;
use crate::mailbox::{MailboxClient, MailboxConnector};
use crate::query::{apply_range, SearchCriteria, SearchFilters, TimeNormalizer, TimeRange};
use crate::record::MessageRecord;
use crate::request::{FetchRequest, OutputMode};

/// Where the records of a finished request went.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Inline(Vec<MessageRecord>),
    Saved(ExportArtifact),
}

/// Result of a successful request.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Records after range filtering.
    pub count: usize,
    /// Exact SEARCH expression sent to the server.
    pub criteria: SearchCriteria,
    /// Timezone identifier as requested.
    pub tz: String,
    pub outcome: FetchOutcome,
}

impl FetchResponse {
    /// Response object for the outer request layer.
    pub fn to_json(&self) -> Value {
        match &self.outcome {
            FetchOutcome::Inline(records) => json!({
                "ok": true,
                "count": self.count,
                "criteria": self.criteria.as_str(),
                "tz": self.tz,
                "data": records,
            }),
            FetchOutcome::Saved(artifact) => json!({
                "ok": true,
                "count": self.count,
                "saved_as": artifact.name,
                "download_url": artifact.download_url(),
                "criteria": self.criteria.as_str(),
                "tz": self.tz,
            }),
        }
    }
}

/// Failure object for the outer request layer.
pub fn error_json(error: &MailsiftError) -> Value {
    json!({ "ok": false, "error": error.to_string() })
}

/// Run one request. Timestamp and parameter faults surface before any connection is made;
/// the session, once open, is closed on every path.
pub async fn run<C>(
    connector: &C,
    settings: &ImapSettings,
    exporter: &Exporter,
    request: &FetchRequest,
) -> Result<FetchResponse>
where
    C: MailboxConnector,
{
    let normalizer = TimeNormalizer::new(&request.tz);
    let range = TimeRange::resolve(request.start.as_deref(), request.end.as_deref(), &normalizer)?;
    let criteria = SearchCriteria::build(
        &SearchFilters {
            unseen_only: request.unseen_only,
            sender: request.sender.as_deref(),
            keyword: request.keyword.as_deref(),
            range,
        },
        &normalizer,
    );
    info!(mailbox = %request.mailbox, criteria = %criteria, limit = request.limit, "retrieving messages");

    let mut client = connector.connect(settings).await?;
    let collected = collect_records(&mut client, &request.mailbox, &criteria, request.limit).await;
    if let Err(e) = client.close().await {
        warn!(error = %e, "closing mailbox session failed");
    }
    let fetched = collected?;
    let fetched_count = fetched.len();
    let records = apply_range(fetched, &range);
    debug!(fetched = fetched_count, kept = records.len(), "range filter applied");

    let count = records.len();
    let outcome = match request.output {
        OutputMode::Display => FetchOutcome::Inline(records),
        OutputMode::File => FetchOutcome::Saved(
            exporter
                .export(&records, request.format, request.filename.as_deref())
                .await?,
        ),
    };
    Ok(FetchResponse {
        count,
        criteria,
        tz: request.tz.clone(),
        outcome,
    })
}

/// The last `limit` ids of an ascending list: the newest matches.
pub fn select_newest(ids: &[u32], limit: usize) -> &[u32] {
    &ids[ids.len().saturating_sub(limit)..]
}

async fn collect_records<M>(
    client: &mut M,
    mailbox: &str,
    criteria: &SearchCriteria,
    limit: usize,
) -> Result<Vec<MessageRecord>>
where
    M: MailboxClient,
{
    client.select_mailbox(mailbox, true).await?;
    let mut ids = client.search(criteria.as_str()).await?;
    ids.sort_unstable();
    let selected = select_newest(&ids, limit);
    info!(matches = ids.len(), fetching = selected.len(), "search completed");

    let mut records = Vec::with_capacity(selected.len());
    for &seq in selected {
        debug!(seq, "fetching message");
        match client.fetch_one(seq).await? {
            Some(raw) => records.push(extract_record(&raw)),
            None => warn!(seq, "message no longer available; skipped"),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsMode;
    use crate::export::ExportFormat;
    use crate::mailbox::RawMessage;
    use crate::request::{ParamBag, RequestDefaults};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct SessionLog {
        connects: usize,
        searches: Vec<String>,
        fetched: Vec<u32>,
        closed: bool,
    }

    #[derive(Clone, Default)]
    struct FakeConnector {
        ids: Vec<u32>,
        messages: HashMap<u32, String>,
        fail_select: bool,
        fail_search: bool,
        fail_close: bool,
        log: Arc<Mutex<SessionLog>>,
    }

    struct FakeMailbox {
        script: FakeConnector,
    }

    #[async_trait]
    impl MailboxConnector for FakeConnector {
        type Client = FakeMailbox;

        async fn connect(&self, _settings: &ImapSettings) -> Result<FakeMailbox> {
            self.log.lock().unwrap().connects += 1;
            Ok(FakeMailbox { script: self.clone() })
        }
    }

    #[async_trait]
    impl MailboxClient for FakeMailbox {
        async fn select_mailbox(&mut self, name: &str, read_only: bool) -> Result<()> {
            assert!(read_only);
            if self.script.fail_select {
                return Err(MailsiftError::Select(format!("NO [NONEXISTENT] {}", name)));
            }
            Ok(())
        }

        async fn search(&mut self, criteria: &str) -> Result<Vec<u32>> {
            self.script.log.lock().unwrap().searches.push(criteria.to_string());
            if self.script.fail_search {
                return Err(MailsiftError::Search("BAD".into()));
            }
            Ok(self.script.ids.clone())
        }

        async fn fetch_one(&mut self, seq: u32) -> Result<Option<RawMessage>> {
            self.script.log.lock().unwrap().fetched.push(seq);
            Ok(self.script.messages.get(&seq).map(|raw| RawMessage {
                uid: format!("{}", 1000 + seq),
                seq,
                raw: raw.as_bytes().to_vec(),
            }))
        }

        async fn close(&mut self) -> Result<()> {
            self.script.log.lock().unwrap().closed = true;
            if self.script.fail_close {
                return Err(MailsiftError::Connection("broken pipe".into()));
            }
            Ok(())
        }
    }

    fn settings() -> ImapSettings {
        ImapSettings {
            host: "imap.test".into(),
            port: 993,
            username: "u".into(),
            password: "p".into(),
            tls: TlsMode::Implicit,
            timeout: Duration::from_secs(5),
        }
    }

    fn request(pairs: &[(&str, &str)]) -> FetchRequest {
        let bag: ParamBag = pairs.iter().copied().collect();
        let defaults = RequestDefaults {
            mailbox: "INBOX".into(),
            tz: "Asia/Jakarta".into(),
        };
        FetchRequest::from_params(&bag, &defaults).unwrap()
    }

    fn dated(date: &str) -> String {
        format!("Subject: s\r\nDate: {}\r\n\r\nbody\r\n", date)
    }

    fn exporter() -> (tempfile::TempDir, Exporter) {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path());
        (dir, exporter)
    }

    #[test]
    fn newest_tail() {
        let ids: Vec<u32> = (1..=12).collect();
        assert_eq!(select_newest(&ids, 5), &[8, 9, 10, 11, 12]);
        assert_eq!(select_newest(&ids, 50), ids.as_slice());
        assert!(select_newest(&[], 3).is_empty());
    }

    #[tokio::test]
    async fn fetches_only_newest_matches() {
        let connector = FakeConnector {
            ids: (1..=12).collect(),
            messages: (1..=12).map(|i| (i, dated("Tue, 14 Oct 2025 08:00:00 +0000"))).collect(),
            ..Default::default()
        };
        let (_dir, exporter) = exporter();
        let response = run(&connector, &settings(), &exporter, &request(&[("limit", "5")]))
            .await
            .unwrap();
        let log = connector.log.lock().unwrap();
        assert_eq!(log.fetched, vec![8, 9, 10, 11, 12]);
        assert!(log.closed);
        assert_eq!(response.count, 5);
        match &response.outcome {
            FetchOutcome::Inline(records) => {
                assert_eq!(records[0].seq, "8");
                assert_eq!(records[0].uid, "1008");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn bad_timestamp_fails_before_connecting() {
        let connector = FakeConnector::default();
        let (_dir, exporter) = exporter();
        let err = run(&connector, &settings(), &exporter, &request(&[("start", "next tuesday")]))
            .await
            .unwrap_err();
        assert!(matches!(err, MailsiftError::InvalidTimestamp(_)));
        assert_eq!(connector.log.lock().unwrap().connects, 0);
    }

    #[tokio::test]
    async fn session_errors_abort_but_still_close() {
        let (_dir, exporter) = exporter();
        let connector = FakeConnector {
            fail_search: true,
            ..Default::default()
        };
        let err = run(&connector, &settings(), &exporter, &request(&[])).await.unwrap_err();
        assert!(matches!(err, MailsiftError::Search(_)));
        assert!(connector.log.lock().unwrap().closed);

        let connector = FakeConnector {
            fail_select: true,
            ..Default::default()
        };
        let err = run(&connector, &settings(), &exporter, &request(&[])).await.unwrap_err();
        assert!(matches!(err, MailsiftError::Select(_)));
        assert!(connector.log.lock().unwrap().closed);
    }

    #[tokio::test]
    async fn close_failure_is_not_escalated() {
        let connector = FakeConnector {
            ids: vec![1],
            messages: HashMap::from([(1, dated("Tue, 14 Oct 2025 08:00:00 +0000"))]),
            fail_close: true,
            ..Default::default()
        };
        let (_dir, exporter) = exporter();
        let response = run(&connector, &settings(), &exporter, &request(&[])).await.unwrap();
        assert_eq!(response.count, 1);
    }

    #[tokio::test]
    async fn vanished_messages_are_omitted() {
        let connector = FakeConnector {
            ids: vec![3, 1, 2],
            messages: HashMap::from([(1, dated("Mon, 13 Oct 2025 10:00:00 +0000")), (3, dated("x"))]),
            ..Default::default()
        };
        let (_dir, exporter) = exporter();
        let response = run(&connector, &settings(), &exporter, &request(&[])).await.unwrap();
        assert_eq!(connector.log.lock().unwrap().fetched, vec![1, 2, 3]);
        assert_eq!(response.count, 2);
    }

    #[tokio::test]
    async fn range_filter_is_precise_and_criteria_coarse() {
        let connector = FakeConnector {
            ids: vec![1, 2, 3, 4],
            messages: HashMap::from([
                (1, dated("Tue, 14 Oct 2025 06:59:59 +0700")),
                (2, dated("Tue, 14 Oct 2025 07:00:00 +0700")),
                (3, dated("Tue, 14 Oct 2025 12:00:00 +0700")),
                (4, dated("garbled date")),
            ]),
            ..Default::default()
        };
        let (_dir, exporter) = exporter();
        let req = request(&[("all", "1"), ("start", "2025-10-14 07:00"), ("end", "2025-10-14T12:00:00+07:00")]);
        let response = run(&connector, &settings(), &exporter, &req).await.unwrap();
        assert_eq!(
            connector.log.lock().unwrap().searches,
            vec!["(ALL SINCE 14-Oct-2025 BEFORE 15-Oct-2025)".to_string()]
        );
        let FetchOutcome::Inline(records) = &response.outcome else {
            panic!("expected inline records");
        };
        let seqs: Vec<&str> = records.iter().map(|r| r.seq.as_str()).collect();
        assert_eq!(seqs, vec!["2", "3"]);
        assert_eq!(records[0].date, "2025-10-14T00:00:00+00:00");
    }

    #[tokio::test]
    async fn file_output_reports_artifact() {
        let connector = FakeConnector {
            ids: vec![1],
            messages: HashMap::from([(1, dated("Tue, 14 Oct 2025 08:00:00 +0000"))]),
            ..Default::default()
        };
        let (_dir, exporter) = exporter();
        let req = request(&[("output", "file"), ("format", "csv"), ("filename", "weekly")]);
        let response = run(&connector, &settings(), &exporter, &req).await.unwrap();
        let body = response.to_json();
        assert_eq!(body["ok"], true);
        assert_eq!(body["count"], 1);
        assert_eq!(body["saved_as"], "weekly.csv");
        assert_eq!(body["download_url"], "/exports/weekly.csv");
        assert_eq!(body["criteria"], "(UNSEEN)");
        assert_eq!(body["tz"], "Asia/Jakarta");
        assert!(body.get("data").is_none());
        let FetchOutcome::Saved(artifact) = &response.outcome else {
            panic!("expected a saved artifact");
        };
        assert_eq!(artifact.format, ExportFormat::Csv);
        assert_eq!(exporter.locate("weekly.csv").await.unwrap(), artifact.path);
    }

    #[test]
    fn error_body() {
        let body = error_json(&MailsiftError::Connection("refused".into()));
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "connection failed: refused");
    }
}
