//! CLI module for research-loop
//!
//! Provides command-line parsing for the `research-loop` binary, colored
//! terminal output and the interactive review prompt.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod output;
pub mod review;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// research-loop - iterative web research with human review
///
/// Decomposes a question into sub-queries, gathers and indexes web evidence,
/// drafts a cited report and loops on reviewer feedback.
#[derive(Parser, Debug)]
#[command(
    name = "research-loop",
    version,
    about = "Iterative web research with human review",
    long_about = "Decomposes a research question into sub-queries, searches and scrapes the web,\n\
                  indexes the evidence in a vector store and synthesizes a cited report.\n\
                  Each draft is reviewed; rejected drafts are revised with your feedback.",
    after_help = "EXAMPLES:\n    \
                  research-loop run \"What limits solid-state battery adoption?\"\n    \
                  research-loop run --detach \"...\"        # Stop at review, resume later\n    \
                  research-loop resume <session-id>        # Review a suspended draft\n    \
                  research-loop resume <id> --reject \"add more detail on cost\"\n    \
                  research-loop sessions                   # List checkpointed sessions"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "research.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a new research session
    Run {
        /// The research question
        question: String,

        /// Override the configured revision cap
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Clear the evidence store before starting
        #[arg(long)]
        fresh: bool,

        /// Stop at the first review instead of prompting
        #[arg(long)]
        detach: bool,
    },

    /// Continue a session suspended at review
    ///
    /// Without a decision flag the draft is shown and reviewed interactively.
    Resume {
        /// Session identifier printed by `run`
        session_id: String,

        /// Approve the pending draft
        #[arg(long, conflicts_with_all = ["reject", "abort"])]
        approve: bool,

        /// Reject the pending draft with this feedback
        #[arg(long, value_name = "FEEDBACK", conflicts_with = "abort")]
        reject: Option<String>,

        /// Specific change request (repeatable, used with --reject)
        #[arg(long = "change", value_name = "REQUEST", requires = "reject")]
        changes: Vec<String>,

        /// End the session without a final report
        #[arg(long)]
        abort: bool,
    },

    /// Show the status or final report of a session
    Show {
        /// Session identifier
        session_id: String,
    },

    /// List checkpointed sessions
    Sessions,

    /// Delete every indexed chunk from the evidence store
    ClearStore {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
