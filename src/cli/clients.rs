use comfy_table::{Cell, Table};

use crate::db::{get_connection, DB_FILE};
use crate::error::Result;
use crate::fmt::money;
use crate::ledger;
use crate::settings::get_data_dir;

pub fn add(first_name: &str, last_name: &str, phase: i64, contract: Option<&str>) -> Result<()> {
    let conn = get_connection(&get_data_dir().join(DB_FILE))?;
    let id = ledger::add_client(&conn, first_name, last_name, phase, contract)?;
    ledger::record_transaction(
        &conn,
        id,
        chrono::Local::now().date_naive(),
        "Beginning Balance",
        0.0,
        0.0,
        None,
    )?;
    println!("Added client: {last_name}, {first_name} (phase {phase})");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = get_connection(&get_data_dir().join(DB_FILE))?;
    let all = ledger::balances(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Last", "First", "Phase", "Status", "Balance"]);
    for cb in &all {
        let status = if cb.client.discharged { "discharged" } else { "active" };
        table.add_row(vec![
            Cell::new(cb.client.id),
            Cell::new(&cb.client.last_name),
            Cell::new(&cb.client.first_name),
            Cell::new(cb.client.phase),
            Cell::new(status),
            Cell::new(money(cb.balance)),
        ]);
    }
    println!("Clients\n{table}");
    Ok(())
}
