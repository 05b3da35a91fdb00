/*
 * request.rs
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

//! Flat request parameters resolved once into a typed `FetchRequest`.

use std::collections::HashMap;

use crate::config::ServiceConfig;
use crate::error::{MailsiftError, Result};
use crate::export::ExportFormat;

pub const DEFAULT_LIMIT: usize = 10;

/// String key/value parameters as they arrive from the outer request layer.
#[derive(Debug, Clone, Default)]
pub struct ParamBag {
    values: HashMap<String, String>,
}

impl ParamBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Value for `key`, or None when absent or blank.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str).filter(|v| !v.trim().is_empty())
    }

    /// First non-blank value among `keys`.
    fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParamBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = Self::new();
        for (k, v) in iter {
            bag.insert(k, v);
        }
        bag
    }
}

/// Defaults applied to parameters the caller leaves out.
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    pub mailbox: String,
    pub tz: String,
}

impl From<&ServiceConfig> for RequestDefaults {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            mailbox: config.default_mailbox.clone(),
            tz: config.default_tz.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Records returned in the response.
    Display,
    /// Records written to an artifact; the response names it.
    File,
}

/// A validated retrieval request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub mailbox: String,
    /// Keep at most this many of the newest matches. Always at least 1.
    pub limit: usize,
    pub unseen_only: bool,
    pub sender: Option<String>,
    pub keyword: Option<String>,
    pub tz: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub output: OutputMode,
    pub format: ExportFormat,
    pub filename: Option<String>,
}

impl FetchRequest {
    /// Resolve parameters: `mailbox`, `limit`, `all`, `from`|`sender`, `q`|`keyword`, `tz`,
    /// `start`, `end`, `output`, `format`, `filename`.
    pub fn from_params(params: &ParamBag, defaults: &RequestDefaults) -> Result<Self> {
        let owned = |v: Option<&str>| v.map(str::to_string);
        let limit = match params.get("limit") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(MailsiftError::InvalidParameter(format!(
                        "limit must be a positive integer: {}",
                        raw
                    )))
                }
            },
            None => DEFAULT_LIMIT,
        };
        let output = match params.get("output").map(|o| o.trim().to_ascii_lowercase()) {
            None => OutputMode::Display,
            Some(o) if o == "display" => OutputMode::Display,
            Some(o) if o == "file" => OutputMode::File,
            Some(o) => {
                return Err(MailsiftError::InvalidParameter(format!(
                    "output must be display or file: {}",
                    o
                )))
            }
        };
        Ok(Self {
            mailbox: params.get("mailbox").unwrap_or(&defaults.mailbox).to_string(),
            limit,
            unseen_only: !params.get("all").is_some_and(is_truthy),
            sender: owned(params.first_of(&["from", "sender"])),
            keyword: owned(params.first_of(&["q", "keyword"])),
            tz: params.get("tz").unwrap_or(&defaults.tz).trim().to_string(),
            start: owned(params.get("start")),
            end: owned(params.get("end")),
            output,
            format: params.get("format").map_or(ExportFormat::Json, ExportFormat::from_param),
            filename: owned(params.get("filename")),
        })
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> RequestDefaults {
        RequestDefaults {
            mailbox: "INBOX".into(),
            tz: "Asia/Jakarta".into(),
        }
    }

    #[test]
    fn empty_bag_gets_defaults() {
        let req = FetchRequest::from_params(&ParamBag::new(), &defaults()).unwrap();
        assert_eq!(
            req,
            FetchRequest {
                mailbox: "INBOX".into(),
                limit: 10,
                unseen_only: true,
                sender: None,
                keyword: None,
                tz: "Asia/Jakarta".into(),
                start: None,
                end: None,
                output: OutputMode::Display,
                format: ExportFormat::Json,
                filename: None,
            }
        );
    }

    #[test]
    fn aliases_and_flags() {
        let bag: ParamBag = [
            ("sender", "boss@example.com"),
            ("keyword", "invoice"),
            ("all", "Yes"),
            ("limit", "25"),
            ("output", "FILE"),
            ("format", "CSV"),
            ("filename", "out"),
            ("mailbox", "Archive"),
        ]
        .into_iter()
        .collect();
        let req = FetchRequest::from_params(&bag, &defaults()).unwrap();
        assert_eq!(req.sender.as_deref(), Some("boss@example.com"));
        assert_eq!(req.keyword.as_deref(), Some("invoice"));
        assert!(!req.unseen_only);
        assert_eq!(req.limit, 25);
        assert_eq!(req.output, OutputMode::File);
        assert_eq!(req.format, ExportFormat::Csv);
        assert_eq!(req.filename.as_deref(), Some("out"));
        assert_eq!(req.mailbox, "Archive");
    }

    #[test]
    fn primary_keys_win_over_aliases() {
        let bag: ParamBag = [("from", "a@x"), ("sender", "b@x"), ("q", ""), ("keyword", "kw")]
            .into_iter()
            .collect();
        let req = FetchRequest::from_params(&bag, &defaults()).unwrap();
        assert_eq!(req.sender.as_deref(), Some("a@x"));
        assert_eq!(req.keyword.as_deref(), Some("kw"));
    }

    #[test]
    fn non_truthy_all_keeps_unseen() {
        let bag: ParamBag = [("all", "no")].into_iter().collect();
        assert!(FetchRequest::from_params(&bag, &defaults()).unwrap().unseen_only);
    }

    #[test]
    fn bad_limit_and_output_are_rejected() {
        for bad in ["0", "-3", "ten"] {
            let bag: ParamBag = [("limit", bad)].into_iter().collect();
            let err = FetchRequest::from_params(&bag, &defaults()).unwrap_err();
            assert!(err.is_client_error());
        }
        let bag: ParamBag = [("output", "email")].into_iter().collect();
        assert!(matches!(
            FetchRequest::from_params(&bag, &defaults()),
            Err(MailsiftError::InvalidParameter(_))
        ));
    }
}
