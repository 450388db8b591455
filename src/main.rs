// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mailsift::email::{account_pk, index_name, EMAIL_PREFIX};
use mailsift::store::{
    scan_all, Embedder, IndexAction, IndexMessage, IndexQueue, QueryEvaluator, QueryRequest,
    SimilarityIndex,
};
use mailsift::{
    classify, describe, normalize, prefix_for, EmailRecord, Error, FilterNode, Harness,
    HarnessConfig, MemoryBackend, PostingKey, Services, TokenField,
};

mod cli;
use cli::display;
use cli::{Cli, Commands, KeyAction};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("❌ {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "mailsift=debug" } else { "mailsift=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns `Ok(false)` when the command ran but reported failure.
fn run(command: Commands) -> Result<bool> {
    match command {
        Commands::ListEmails { fixture, account } => {
            let backend = load(&fixture)?;
            let items = scan_all(&backend, &account_pk(&account), EMAIL_PREFIX)?;
            let emails = items
                .iter()
                .map(|item| EmailRecord::from_item(&item.attributes))
                .collect::<mailsift::Result<Vec<_>>>()?;
            display::print_emails(&account, &emails);
            Ok(true)
        }

        Commands::Index {
            fixture,
            account,
            email,
            delete,
        } => {
            let backend = load(&fixture)?;
            let action = if delete {
                IndexAction::Delete
            } else {
                IndexAction::Index
            };
            let ack = backend.enqueue(&IndexMessage {
                account_id: account.clone(),
                email_id: email.clone(),
                action,
                api_url: std::env::var(mailsift::config::ENV_API_URL).ok(),
            })?;
            println!("Queued message: {}", ack);
            println!("  Account: {}", account);
            println!("  Email:   {}", email);
            println!("  Action:  {:?}", action);

            let applied = backend.process_pending();
            println!("  Applied: {} message(s)", applied);
            Ok(true)
        }

        Commands::Search {
            fixture,
            account,
            text,
            top_k,
        } => {
            let backend = load(&fixture)?;
            let vector = backend.embed(&text)?;
            println!(
                "Generated embedding ({} dimensions) for: {:?}\n",
                vector.len(),
                text
            );
            let index = index_name(&account);
            match backend.query(&index, &vector, top_k, None) {
                Ok(matches) => {
                    display::print_matches(&matches);
                    Ok(true)
                }
                Err(Error::IndexNotFound(_)) => {
                    println!(
                        "Vector index '{}' not found. Has any email been indexed for this account?",
                        index
                    );
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        }

        Commands::Query {
            fixture,
            account,
            filter,
            position,
            limit,
        } => {
            let backend = load(&fixture)?;
            let filter = parse_filter(&filter)?;
            println!("Filter:   {}", describe(&filter));
            println!(
                "Verdict:  {}",
                display::classification_label(&classify(&filter))
            );
            let request = QueryRequest {
                filter,
                position,
                limit,
            };
            match backend.evaluate(&account, &request) {
                Ok(page) => {
                    display::print_query_page(&page);
                    Ok(true)
                }
                Err(e) => {
                    println!("Error [{}]: {}", e.kind(), e);
                    Ok(false)
                }
            }
        }

        Commands::Key { action } => {
            run_key(action)?;
            Ok(true)
        }

        Commands::Filter { filter } => {
            let filter = parse_filter(&filter)?;
            let normalized = normalize(&filter);
            println!("Normalized: {}", describe(&normalized));
            println!(
                "JSON:       {}",
                serde_json::to_string(&normalized).context("serializing filter")?
            );
            println!(
                "Verdict:    {}",
                display::classification_label(&classify(&filter))
            );
            Ok(true)
        }

        Commands::Conform {
            fixture,
            account,
            email,
            config,
            reindex,
            top_k,
            json,
        } => {
            let backend = load(&fixture)?;
            let mut harness_config = match config {
                Some(path) => HarnessConfig::from_file(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => HarnessConfig::default(),
            }
            .apply_env()?;
            if reindex {
                harness_config.reindex = true;
            }
            if let Some(k) = top_k {
                harness_config.top_k = k;
            }

            let harness = Harness::new(Services::from_backend(&backend), harness_config);
            let report = harness
                .run(&account, &email)
                .with_context(|| format!("conformance run for {}/{}", account, email))?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("serializing report")?
                );
            } else {
                display::print_report(&report);
            }
            Ok(report.is_success())
        }
    }
}

fn run_key(action: KeyAction) -> Result<()> {
    match action {
        KeyAction::Encode {
            field,
            token,
            received_at,
            document_id,
        } => {
            let field = TokenField::from_str(&field)?;
            let key = PostingKey::new(field, &token, &received_at, &document_id)?;
            println!("{}", key);
        }
        KeyAction::Decode { key } => {
            let key = PostingKey::decode(&key)?;
            println!("field:      {}", key.field());
            println!("token:      {}", key.token());
            println!("receivedAt: {}", key.received_at());
            println!("documentId: {}", key.document_id());
        }
        KeyAction::Prefix {
            field,
            token_prefix,
        } => {
            let field = field.as_deref().map(TokenField::from_str).transpose()?;
            if field.is_none() && token_prefix.is_some() {
                bail!("a token prefix needs a field");
            }
            println!("{}", prefix_for(field, token_prefix.as_deref()));
        }
    }
    Ok(())
}

fn load(fixture: &Path) -> Result<MemoryBackend> {
    MemoryBackend::from_fixture(fixture)
        .with_context(|| format!("loading fixture {}", fixture.display()))
}

fn parse_filter(json: &str) -> Result<FilterNode> {
    serde_json::from_str(json).context("filter is not valid JMAP filter JSON")
}
