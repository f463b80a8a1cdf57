// mailverify
// Copyright (C) 2024 mailverify contributors

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! One-shot and file-driven bulk verification from a terminal, bypassing
//! the HTTP layer entirely. Shares `mailverify_core::Verifier` with the
//! backend — there is exactly one pipeline implementation.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use mailverify_core::bulk::verify_all;
use mailverify_core::cache::InMemoryVerdictCache;
use mailverify_core::mx::{HickoryMxResolver, MemoizingMxResolver};
use mailverify_core::smtp::TcpSmtpProber;
use mailverify_core::verdict::Verdict;
use mailverify_core::Verifier;
use serde::Serialize;

#[derive(Serialize)]
struct BulkReport {
    results: Vec<Verdict>,
    count: usize,
}

#[derive(Parser)]
#[clap(name = "mailverify", about = "Email address verification", version)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify a single address and print its verdict as JSON.
    Check { email: String },
    /// Verify every address in a newline-delimited file, in order.
    Bulk { path: String },
}

fn build_verifier() -> Verifier {
    let mx_resolver = MemoizingMxResolver::new(HickoryMxResolver::new(Duration::from_secs(5)));
    Verifier::new(
        Arc::new(mx_resolver),
        Arc::new(TcpSmtpProber::default()),
        Arc::new(InMemoryVerdictCache::new()),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let verifier = build_verifier();

    match cli.command {
        Command::Check { email } => {
            let verdict = verifier.verify(&email).await;
            println!("{}", serde_json::to_string_pretty(&verdict)?);
        }
        Command::Bulk { path } => {
            let contents = fs::read_to_string(&path)?;
            let emails: Vec<String> = contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();

            if emails.is_empty() {
                anyhow::bail!("{path} contains no addresses to verify");
            }

            let results = verify_all(&verifier, &emails).await;
            let count = results.len();
            println!("{}", serde_json::to_string_pretty(&BulkReport { results, count })?);
        }
    }

    Ok(())
}
