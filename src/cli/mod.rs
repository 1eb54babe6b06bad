pub mod backup;
pub mod clients;
pub mod discharge;
pub mod import;
pub mod init;
pub mod pos;
pub mod status;
pub mod store;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::error::{Result, TrustError};

/// `--date` values are YYYY-MM-DD; omitted means today.
pub(crate) fn parse_date_opt(date: &Option<String>) -> Result<NaiveDate> {
    match date {
        Some(raw) => raw
            .parse()
            .map_err(|_| TrustError::InvalidDate(raw.clone())),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

#[derive(Parser)]
#[command(name = "trustbook", about = "Client trust ledger and store-list reconciliation.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up trustbook: choose a data directory and initialize the ledger.
    Init {
        /// Path for trustbook data (default: ~/Documents/trustbook)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Manage clients.
    Clients {
        #[command(subcommand)]
        command: ClientsCommands,
    },
    /// Import a batch sheet into the ledger.
    Import {
        #[command(subcommand)]
        command: ImportCommands,
    },
    /// Mark phase-4 clients with a zero balance as discharged.
    Discharge,
    /// Build, top up, and inspect daily store lists.
    Store {
        #[command(subcommand)]
        command: StoreCommands,
    },
    /// Keep the point-of-sale customer directory in step with the roster.
    Pos {
        #[command(subcommand)]
        command: PosCommands,
    },
    /// Show current database and summary statistics.
    Status,
    /// Back up the ledger database.
    Backup {
        /// Output path (default: <data_dir>/backups/trustbook-YYYYMMDD-HHMMSS.db)
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ClientsCommands {
    /// Add a client to the ledger.
    Add {
        first_name: String,
        last_name: String,
        /// Treatment phase (1 = on the store list)
        #[arg(long, default_value = "1")]
        phase: i64,
        /// Funding contract
        #[arg(long)]
        contract: Option<String>,
    },
    /// List all clients with their trust balances.
    List,
}

#[derive(Subcommand)]
pub enum ImportCommands {
    /// Deposits sheet: FirstName, LastName, Type, Amount.
    Deposits {
        /// Path to CSV or XLSX file
        file: String,
    },
    /// Withdrawals sheet: FirstName, LastName, Type, Amount.
    Withdrawals {
        /// Path to CSV or XLSX file
        file: String,
    },
    /// Admissions/discharges sheet: Type (A/D), FirstName, LastName,
    /// Contract, ReasonForDischarge.
    Roster {
        /// Path to CSV or XLSX file
        file: String,
    },
}

#[derive(Subcommand)]
pub enum StoreCommands {
    /// Build the store list for a day from the roster, the previous list,
    /// the quarters feed, and point-of-sale spend.
    Generate {
        /// Day to build: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Rebuild even if the day's list already exists
        #[arg(long)]
        force: bool,
    },
    /// Top up every client on the day's list from their trust balance.
    Topup {
        /// Day to reconcile: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Print a day's store list.
    Show {
        /// Day to show: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Summarize the current reconciliation week, day by day.
    Week {
        /// Treat this day as today: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum PosCommands {
    /// Register active clients missing from the directory and remove
    /// customers who are no longer on the roster.
    Sync,
}
