/*
 * main.rs
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

//! mailsift CLI: run one filtered retrieval, or look up a stored export. Configuration comes
//! from the environment (and an optional .env); results are printed as JSON on stdout.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mailsift_core::{
    error_json, run, Error, Exporter, FetchRequest, ImapConnector, ParamBag, RequestDefaults, ServiceConfig,
};
use serde_json::json;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mailsift")]
#[command(about = "Filtered IMAP retrieval with JSON/CSV export", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve messages. Parameters as KEY=VALUE: mailbox, limit, all, from, q, tz, start,
    /// end, output (display|file), format (json|csv), filename.
    Fetch {
        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Print the path of a stored export.
    Locate { name: String },
}

fn parse_param(arg: &str) -> Result<(String, String), String> {
    arg.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got {}", arg))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Fetch { params } => {
            let config = ServiceConfig::from_env().context("load configuration from environment (.env)")?;
            let exporter = Exporter::new(config.export_dir.clone());
            handle_fetch(&config, &exporter, params.into_iter().collect()).await
        }
        Commands::Locate { name } => {
            let exporter = Exporter::new(ServiceConfig::export_dir_from_env());
            handle_locate(&exporter, &name).await
        }
    };
    match outcome {
        Ok(body) => {
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "request failed");
            println!("{}", serde_json::to_string_pretty(&error_json(&e))?);
            Ok(ExitCode::from(if e.is_client_error() { 2 } else { 1 }))
        }
    }
}

async fn handle_fetch(
    config: &ServiceConfig,
    exporter: &Exporter,
    params: ParamBag,
) -> Result<serde_json::Value, Error> {
    let request = FetchRequest::from_params(&params, &RequestDefaults::from(config))?;
    let response = run(&ImapConnector, &config.imap, exporter, &request).await?;
    Ok(response.to_json())
}

async fn handle_locate(exporter: &Exporter, name: &str) -> Result<serde_json::Value, Error> {
    let path = exporter.locate(name).await?;
    let path = tokio::fs::canonicalize(&path).await.unwrap_or(path);
    Ok(json!({ "ok": true, "name": name, "path": path.display().to_string() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_split_on_first_equals() {
        assert_eq!(parse_param("q=a=b").unwrap(), ("q".to_string(), "a=b".to_string()));
        assert_eq!(parse_param("start=").unwrap(), ("start".to_string(), String::new()));
        assert!(parse_param("limit").is_err());
        assert!(parse_param("=5").is_err());
    }

    #[tokio::test]
    async fn locate_reports_stored_artifact() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("weekly.csv"), "uid\r\n").unwrap();
        let exporter = Exporter::new(dir.path());

        let body = handle_locate(&exporter, "weekly.csv").await.unwrap();
        assert_eq!(body["ok"], true);
        assert!(body["path"].as_str().unwrap().ends_with("weekly.csv"));

        let err = handle_locate(&exporter, "missing.json").await.unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn fetch_collects_params() {
        let cli = Cli::try_parse_from(["mailsift", "fetch", "limit=5", "all=1"]).unwrap();
        let Commands::Fetch { params } = cli.command else {
            panic!("expected fetch");
        };
        let bag: ParamBag = params.into_iter().collect();
        assert_eq!(bag.get("limit"), Some("5"));
        assert_eq!(bag.get("all"), Some("1"));
    }
}
