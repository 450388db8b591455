// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! CLI definitions for the mailsift command-line interface.
//!
//! Every command runs against an in-process backend loaded from a JSON
//! mailbox fixture: list and index emails, run vector searches and structured
//! queries, poke at the posting-key codec and the filter algebra, and run the
//! conformance harness.

pub mod display;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "mailsift",
    about = "Posting-key codec, filter algebra and search conformance harness",
    version
)]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the emails of an account
    ListEmails {
        /// Mailbox fixture (JSON)
        #[arg(short, long)]
        fixture: PathBuf,

        account: String,
    },

    /// Enqueue an index (or delete) message for one email
    Index {
        #[arg(short, long)]
        fixture: PathBuf,

        account: String,

        email: String,

        /// Remove the email from the search index instead
        #[arg(long)]
        delete: bool,
    },

    /// Vector search over an account's indexed chunks
    Search {
        #[arg(short, long)]
        fixture: PathBuf,

        account: String,

        /// Free text to embed
        text: String,

        /// Nearest neighbours to return
        #[arg(short = 'k', long, default_value = "10")]
        top_k: usize,
    },

    /// Run a structured query (JMAP filter JSON)
    Query {
        #[arg(short, long)]
        fixture: PathBuf,

        account: String,

        /// Filter, e.g. '{"operator":"AND","conditions":[{"inMailbox":"mb-1"}]}'
        filter: String,

        #[arg(long, default_value = "0")]
        position: usize,

        #[arg(short, long, default_value = "100")]
        limit: usize,
    },

    /// Encode, decode or build prefixes of posting keys
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Normalize and classify a filter without evaluating it
    Filter {
        /// Filter JSON
        filter: String,
    },

    /// Run the conformance scenarios against a seed email
    Conform {
        #[arg(short, long)]
        fixture: PathBuf,

        account: String,

        /// Seed email id
        email: String,

        /// Harness config (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Re-index the seed even if it already has chunks
        #[arg(long)]
        reindex: bool,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print the report as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum KeyAction {
    /// Build a posting key from its parts
    Encode {
        /// FROM, TO, CC, BCC, SUBJECT or BODY
        field: String,
        token: String,
        received_at: String,
        document_id: String,
    },

    /// Split a posting key into its parts
    Decode { key: String },

    /// Scan prefix for a field and optional token prefix
    Prefix {
        field: Option<String>,
        token_prefix: Option<String>,
    },
}
