use crate::db::{get_connection, DB_FILE};
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::ledger;
use crate::settings::{self, load_settings};
use crate::snapshot::SnapshotStore;

pub fn run() -> Result<()> {
    let s = load_settings();
    let data_dir = std::path::PathBuf::from(&s.data_dir);
    let db_path = data_dir.join(DB_FILE);

    println!("Data dir:     {}", data_dir.display());
    println!("Database:     {}", db_path.display());
    println!("Cycle anchor: {}", s.anchor_weekday);
    println!("Ceiling:      {}", crate::fmt::money(s.store_ceiling));

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `trustbook init` to set up.");
        return Ok(());
    }

    let size = std::fs::metadata(&db_path)?.len();
    println!("DB size:      {}", format_bytes(size));

    let conn = get_connection(&db_path)?;
    let clients: i64 = conn.query_row("SELECT count(*) FROM clients", [], |r| r.get(0))?;
    let active = ledger::active_clients(&conn)?.len();
    let transactions: i64 =
        conn.query_row("SELECT count(*) FROM transactions", [], |r| r.get(0))?;
    let imports: i64 = conn.query_row("SELECT count(*) FROM imports", [], |r| r.get(0))?;

    let store = SnapshotStore::open(settings::store_lists_dir(&data_dir))?;

    println!();
    println!("Clients:       {clients} ({active} on the store list)");
    println!("Transactions:  {transactions}");
    println!("Imports:       {imports}");
    println!("Store lists:   {}", store.count());
    Ok(())
}
