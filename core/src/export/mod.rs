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

//! Persisting record sets as named artifacts (JSON listing or CSV table) under one output root.
//!
//! Artifact names come from the caller or from the local wall clock at one-second resolution;
//! an existing file with the same name is overwritten.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tracing::info;

use crate::error::{MailsiftError, Result};
use crate::record::{MessageRecord, RECORD_FIELDS};

/// URL prefix under which the outer request layer serves stored artifacts.
pub const DOWNLOAD_PREFIX: &str = "/exports/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    /// `csv` (any case) selects CSV; every other value means JSON.
    pub fn from_param(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("csv") {
            ExportFormat::Csv
        } else {
            ExportFormat::Json
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => ".json",
            ExportFormat::Csv => ".csv",
        }
    }
}

/// A stored export. `name` is what callers use to retrieve it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub name: String,
    pub format: ExportFormat,
    pub path: PathBuf,
}

impl ExportArtifact {
    pub fn download_url(&self) -> String {
        format!("{}{}", DOWNLOAD_PREFIX, self.name)
    }
}

/// Writes artifacts into, and finds them in, a single output root.
#[derive(Debug, Clone)]
pub struct Exporter {
    root: PathBuf,
}

impl Exporter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Serialize `records` in `format` and store them under the chosen name.
    pub async fn export(
        &self,
        records: &[MessageRecord],
        format: ExportFormat,
        filename: Option<&str>,
    ) -> Result<ExportArtifact> {
        let name = artifact_name(filename, format, Local::now().naive_local())?;
        let bytes = match format {
            ExportFormat::Json => render_json(records)?,
            ExportFormat::Csv => render_csv(records).into_bytes(),
        };
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| MailsiftError::Export(format!("{}: {}", self.root.display(), e)))?;
        let path = self.root.join(&name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| MailsiftError::Export(format!("{}: {}", path.display(), e)))?;
        info!(name = %name, path = %path.display(), count = records.len(), "artifact written");
        Ok(ExportArtifact { name, format, path })
    }

    /// Path of a stored artifact. Names carrying directory components are rejected.
    pub async fn locate(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(MailsiftError::ArtifactNotFound(name.to_string()));
        }
        let path = self.root.join(name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(MailsiftError::ArtifactNotFound(name.to_string())),
        }
    }
}

/// Name for a new artifact. A supplied name is reduced to its final path component and kept
/// as is when it already ends in `.json` or `.csv` (any case); otherwise the format's extension
/// is appended. Without a name, `emails_<YYYYmmdd_HHMMSS>` from `now` is used.
pub fn artifact_name(filename: Option<&str>, format: ExportFormat, now: NaiveDateTime) -> Result<String> {
    let base = match filename.map(str::trim).filter(|f| !f.is_empty()) {
        Some(requested) => Path::new(requested)
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| MailsiftError::InvalidParameter(format!("filename: {}", requested)))?,
        None => format!("emails_{}", now.format("%Y%m%d_%H%M%S")),
    };
    let lower = base.to_ascii_lowercase();
    if lower.ends_with(".json") || lower.ends_with(".csv") {
        Ok(base)
    } else {
        Ok(base + format.extension())
    }
}

/// Pretty-printed JSON array, two-space indent, non-ASCII written verbatim.
fn render_json(records: &[MessageRecord]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(records)?)
}

/// CSV with a header row, CRLF line ends, quoting only where needed.
fn render_csv(records: &[MessageRecord]) -> String {
    let mut out = String::new();
    push_row(&mut out, RECORD_FIELDS);
    for record in records {
        push_row(&mut out, record.values());
    }
    out
}

fn push_row(out: &mut String, fields: [&str; 7]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&csv_escape(field));
    }
    out.push_str("\r\n");
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 10, 14).unwrap().and_hms_opt(9, 5, 7).unwrap()
    }

    fn sample() -> Vec<MessageRecord> {
        vec![MessageRecord {
            uid: "812".into(),
            seq: "4".into(),
            from: "\"Doe, Jane\" <jane@example.com>".into(),
            subject: "Résumé".into(),
            date: "2025-10-14T01:15:00+00:00".into(),
            message_id: "<m1@example.com>".into(),
            snippet: "line one".into(),
        }]
    }

    #[test]
    fn naming_policy() {
        assert_eq!(artifact_name(None, ExportFormat::Json, noon()).unwrap(), "emails_20251014_090507.json");
        assert_eq!(artifact_name(Some(""), ExportFormat::Csv, noon()).unwrap(), "emails_20251014_090507.csv");
        assert_eq!(artifact_name(Some("report"), ExportFormat::Csv, noon()).unwrap(), "report.csv");
        assert_eq!(artifact_name(Some("Report.JSON"), ExportFormat::Csv, noon()).unwrap(), "Report.JSON");
        assert_eq!(artifact_name(Some("../../etc/x.csv"), ExportFormat::Csv, noon()).unwrap(), "x.csv");
        assert!(artifact_name(Some(".."), ExportFormat::Json, noon()).is_err());
    }

    #[test]
    fn csv_layout() {
        let csv = render_csv(&sample());
        let mut lines = csv.split("\r\n");
        assert_eq!(lines.next(), Some("uid,seq,from,subject,date,message_id,snippet"));
        assert_eq!(
            lines.next(),
            Some("812,4,\"\"\"Doe, Jane\"\" <jane@example.com>\",Résumé,2025-10-14T01:15:00+00:00,<m1@example.com>,line one")
        );
        assert_eq!(lines.next(), Some(""));
    }

    #[tokio::test]
    async fn export_and_locate() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path().join("exports"));

        let artifact = exporter.export(&sample(), ExportFormat::Json, Some("batch")).await.unwrap();
        assert_eq!(artifact.name, "batch.json");
        assert_eq!(artifact.download_url(), "/exports/batch.json");
        let written = std::fs::read_to_string(&artifact.path).unwrap();
        assert!(written.starts_with("[\n  {\n    \"uid\": \"812\""));
        assert!(written.contains("Résumé"));
        let parsed: Vec<MessageRecord> = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, sample());

        assert_eq!(exporter.locate("batch.json").await.unwrap(), artifact.path);
        assert!(matches!(
            exporter.locate("missing.json").await,
            Err(MailsiftError::ArtifactNotFound(_))
        ));
        assert!(exporter.locate("../batch.json").await.is_err());
    }

    #[tokio::test]
    async fn same_name_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path());
        exporter.export(&sample(), ExportFormat::Csv, Some("dup.csv")).await.unwrap();
        let second = exporter.export(&[], ExportFormat::Csv, Some("dup.csv")).await.unwrap();
        let text = std::fs::read_to_string(second.path).unwrap();
        assert_eq!(text, "uid,seq,from,subject,date,message_id,snippet\r\n");
    }
}
