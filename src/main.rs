mod builder;
mod cli;
mod cycle;
mod db;
mod error;
mod fmt;
mod importer;
mod ledger;
mod models;
mod pos;
mod reconciler;
mod settings;
mod snapshot;

use clap::Parser;

use cli::{Cli, ClientsCommands, Commands, ImportCommands, PosCommands, StoreCommands};

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Clients { command } => match command {
            ClientsCommands::Add {
                first_name,
                last_name,
                phase,
                contract,
            } => cli::clients::add(&first_name, &last_name, phase, contract.as_deref()),
            ClientsCommands::List => cli::clients::list(),
        },
        Commands::Import { command } => match command {
            ImportCommands::Deposits { file } => cli::import::deposits(&file),
            ImportCommands::Withdrawals { file } => cli::import::withdrawals(&file),
            ImportCommands::Roster { file } => cli::import::roster(&file),
        },
        Commands::Discharge => cli::discharge::run(),
        Commands::Store { command } => match command {
            StoreCommands::Generate { date, force } => cli::store::generate(date, force),
            StoreCommands::Topup { date } => cli::store::topup(date),
            StoreCommands::Show { date } => cli::store::show(date),
            StoreCommands::Week { date } => cli::store::week(date),
        },
        Commands::Pos { command } => match command {
            PosCommands::Sync => cli::pos::sync(),
        },
        Commands::Status => cli::status::run(),
        Commands::Backup { output } => cli::backup::run(output),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
