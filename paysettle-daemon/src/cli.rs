use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "paysettle")]
#[command(about = "CSV payment ingestion and daily customer invoicing")]
#[command(version)]
pub struct Cli {
    /// Configuration file
    #[arg(long, short = 'c', env = "PAYSETTLE_CONFIG", default_value = "paysettle.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the daily invoice schedule until interrupted
    #[command(after_help = "\
Examples:
  paysettle run
  paysettle run --inbox /srv/payments/inbox --poll-secs 30")]
    Run {
        /// Directory watched for CSV uploads
        #[arg(long)]
        inbox: Option<PathBuf>,

        /// Seconds between inbox polls, also the retry delay for deferred files
        #[arg(long, default_value_t = 10)]
        poll_secs: u64,
    },

    /// Upload CSV files and wait for their ingestion summaries
    Ingest {
        /// CSV or TXT files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Invoice unprocessed payments once, now
    Invoice {
        /// Creation day to invoice (UTC, YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Record a single payment from a JSON body
    #[command(after_help = "\
Examples:
  paysettle record --json '{\"customer_id\":\"CUS-1\",\"customer_email\":\"a@x.com\",...}'
  cat payment.json | paysettle record")]
    Record {
        /// Request body; read from stdin when omitted
        #[arg(long)]
        json: Option<String>,
    },

    /// List stored payments, newest first
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Page size (at most 100)
        #[arg(long)]
        per_page: Option<u32>,
    },
}
