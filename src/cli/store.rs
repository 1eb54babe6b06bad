use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::builder;
use crate::cli::parse_date_opt;
use crate::cycle;
use crate::db::{get_connection, DB_FILE};
use crate::error::{Result, TrustError};
use crate::fmt::money;
use crate::importer;
use crate::pos::{JsonDirectory, MemoryDirectory, SalesLookup};
use crate::reconciler::{self, Outcome};
use crate::settings::{self, load_settings};
use crate::snapshot::SnapshotStore;

pub fn generate(date: Option<String>, force: bool) -> Result<()> {
    let s = load_settings();
    let data_dir = std::path::PathBuf::from(&s.data_dir);
    let conn = get_connection(&data_dir.join(DB_FILE))?;
    let store = SnapshotStore::open(settings::store_lists_dir(&data_dir))?;
    let day = parse_date_opt(&date)?;

    let quarters = importer::read_quarters_entries(&settings::quarters_dir(&data_dir), day)?;

    let export = settings::pos_export_path(&data_dir);
    let json;
    let memory;
    let pos: &dyn SalesLookup = if export.exists() {
        json = JsonDirectory::load(&export)?;
        &json
    } else {
        log::warn!(
            "no point-of-sale export at {}; store spend defaults to zero",
            export.display()
        );
        memory = MemoryDirectory::default();
        &memory
    };

    let outcome =
        builder::build_store_list(&conn, &store, pos, &quarters, day, s.anchor(), force)?;

    println!(
        "Store list for {day} created with {} clients.",
        outcome.rows.len()
    );
    match outcome.carried_from {
        Some(from) => println!("Balances carried from {from}."),
        None => println!("No previous list found; everyone starts at $0.00."),
    }
    for name in &outcome.new_clients {
        println!("  new: {name}");
    }

    if !outcome.leavers.is_empty() {
        println!("\n{}", "Left".yellow().bold());
        for (name, balance) in &outcome.leavers {
            println!("  {name} \u{2014} {}", money(*balance));
        }
    }
    for msg in &outcome.advisories {
        println!("{} {msg}", "advisory:".yellow());
    }
    Ok(())
}

pub fn topup(date: Option<String>) -> Result<()> {
    let s = load_settings();
    let data_dir = std::path::PathBuf::from(&s.data_dir);
    let conn = get_connection(&data_dir.join(DB_FILE))?;
    let store = SnapshotStore::open(settings::store_lists_dir(&data_dir))?;
    let day = parse_date_opt(&date)?;

    let report = reconciler::reconcile(&conn, &store, day, s.store_ceiling)?;

    let mut table = Table::new();
    table.set_header(vec!["Client", "Result", "Added", "Balance"]);
    for entry in &report.entries {
        let (result, added) = match &entry.outcome {
            Outcome::Applied(amount) => ("topped up".green().to_string(), money(*amount)),
            Outcome::NothingToDraw => ("nothing to draw".to_string(), String::new()),
            Outcome::AlreadyApplied => ("already applied".to_string(), String::new()),
            Outcome::AtCeiling => ("at ceiling".to_string(), String::new()),
            Outcome::OverCeiling => ("over ceiling".red().to_string(), String::new()),
            Outcome::NotOnStoreList => ("not on store list".yellow().to_string(), String::new()),
            Outcome::NoLedgerRecord => ("no ledger record".yellow().to_string(), String::new()),
        };
        table.add_row(vec![
            Cell::new(&entry.name),
            Cell::new(result),
            Cell::new(added),
            Cell::new(entry.final_balance.map(money).unwrap_or_default()),
        ]);
    }
    println!("Store top-ups for {day}\n{table}");
    println!(
        "Added {} total (ceiling {}).",
        money(report.total_applied),
        money(s.store_ceiling)
    );

    let advisories = report.entries.iter().filter(|e| e.outcome.is_advisory()).count();
    if advisories > 0 {
        println!("{} {advisories} client(s) need review.", "advisory:".yellow());
    }
    Ok(())
}

pub fn show(date: Option<String>) -> Result<()> {
    let s = load_settings();
    let data_dir = std::path::PathBuf::from(&s.data_dir);
    let store = SnapshotStore::open(settings::store_lists_dir(&data_dir))?;
    let day = parse_date_opt(&date)?;

    let rows = store
        .read(day)?
        .ok_or(TrustError::MissingStoreList(day))?;

    let mut table = Table::new();
    table.set_header(vec![
        "Last", "First", "Starting", "Spent", "Quarters", "Top-up", "Balance",
    ]);
    let (mut starting, mut spent, mut quarters, mut top_up, mut balance) =
        (0.0, 0.0, 0.0, 0.0, 0.0);
    for row in &rows {
        table.add_row(vec![
            Cell::new(&row.last_name),
            Cell::new(&row.first_name),
            Cell::new(money(row.starting_balance)),
            Cell::new(money(row.spent_at_store)),
            Cell::new(money(row.quarters)),
            Cell::new(money(row.top_up)),
            Cell::new(money(row.final_balance)),
        ]);
        starting += row.starting_balance;
        spent += row.spent_at_store;
        quarters += row.quarters;
        top_up += row.top_up;
        balance += row.final_balance;
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(""),
        Cell::new(money(starting)),
        Cell::new(money(spent)),
        Cell::new(money(quarters)),
        Cell::new(money(top_up)),
        Cell::new(money(balance)),
    ]);
    println!("Store list {day}\n{table}");
    Ok(())
}

pub fn week(date: Option<String>) -> Result<()> {
    let s = load_settings();
    let data_dir = std::path::PathBuf::from(&s.data_dir);
    let store = SnapshotStore::open(settings::store_lists_dir(&data_dir))?;
    let today = parse_date_opt(&date)?;

    let week = cycle::week_for(today, s.anchor());

    let mut table = Table::new();
    table.set_header(vec!["Date", "Clients", "Spent", "Quarters", "Top-ups"]);
    let (mut spent_total, mut quarters_total, mut top_up_total) = (0.0, 0.0, 0.0);
    let mut days_found = 0;

    for day in &week.dates {
        let Some(rows) = store.read(*day)? else {
            log::warn!("no store list for {day}; skipping");
            continue;
        };
        days_found += 1;
        let spent: f64 = rows.iter().map(|r| r.spent_at_store).sum();
        let quarters: f64 = rows.iter().map(|r| r.quarters).sum();
        let top_up: f64 = rows.iter().map(|r| r.top_up).sum();
        table.add_row(vec![
            Cell::new(day),
            Cell::new(rows.len()),
            Cell::new(money(spent)),
            Cell::new(money(quarters)),
            Cell::new(money(top_up)),
        ]);
        spent_total += spent;
        quarters_total += quarters;
        top_up_total += top_up;
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(""),
        Cell::new(money(spent_total)),
        Cell::new(money(quarters_total)),
        Cell::new(money(top_up_total)),
    ]);

    println!(
        "Week of {} ({} of {} days on file)\n{table}",
        week.anchor,
        days_found,
        week.dates.len()
    );
    Ok(())
}
