use std::path::Path;

use crate::db::{get_connection, DB_FILE};
use crate::error::Result;
use crate::importer::{self, ImportOutcome};
use crate::settings::get_data_dir;

fn report(outcome: &ImportOutcome) {
    if outcome.duplicate_file {
        println!("This sheet has already been imported (duplicate checksum).");
        return;
    }
    for msg in &outcome.messages {
        println!("{msg}");
    }
    println!();
    println!("{} applied, {} skipped", outcome.applied, outcome.skipped);
}

pub fn deposits(file: &str) -> Result<()> {
    let conn = get_connection(&get_data_dir().join(DB_FILE))?;
    let today = chrono::Local::now().date_naive();
    let outcome = importer::import_deposits(&conn, Path::new(file), today)?;
    report(&outcome);
    Ok(())
}

pub fn withdrawals(file: &str) -> Result<()> {
    let conn = get_connection(&get_data_dir().join(DB_FILE))?;
    let today = chrono::Local::now().date_naive();
    let outcome = importer::import_withdrawals(&conn, Path::new(file), today)?;
    report(&outcome);
    Ok(())
}

pub fn roster(file: &str) -> Result<()> {
    let conn = get_connection(&get_data_dir().join(DB_FILE))?;
    let today = chrono::Local::now().date_naive();
    let outcome = importer::import_roster(&conn, Path::new(file), today)?;
    report(&outcome);
    Ok(())
}
