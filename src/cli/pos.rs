use crate::db::{get_connection, DB_FILE};
use crate::error::{Result, TrustError};
use crate::ledger;
use crate::pos::{JsonDirectory, SalesLookup};
use crate::settings::{self, get_data_dir};

/// Reconcile the point-of-sale customer directory against the active
/// roster: register clients the store does not know yet, remove customers
/// who are no longer in treatment.
pub fn sync() -> Result<()> {
    let data_dir = get_data_dir();
    let conn = get_connection(&data_dir.join(DB_FILE))?;
    let mut directory = JsonDirectory::load(settings::pos_export_path(&data_dir))?;

    let roster = ledger::active_clients(&conn)?;
    let mut created = 0;
    let mut removed = 0;

    for client in &roster {
        match directory.find_customer(&client.first_name, &client.last_name) {
            Ok(Some(_)) => {}
            Ok(None) => {
                directory.create_customer(&client.first_name, &client.last_name)?;
                println!("Registered {} with the store.", client.display_name());
                created += 1;
            }
            Err(TrustError::Pos(msg)) => {
                println!("advisory: {}: {msg}", client.display_name());
            }
            Err(e) => return Err(e),
        }
    }

    // Customers with no matching active client have left the program.
    let stale: Vec<_> = directory
        .customers()
        .iter()
        .filter(|c| {
            !roster.iter().any(|client| {
                client.first_name.eq_ignore_ascii_case(&c.first_name)
                    && client.last_name.eq_ignore_ascii_case(&c.last_name)
            })
        })
        .map(|c| (c.id.clone(), format!("{}, {}", c.last_name, c.first_name)))
        .collect();
    for (id, name) in stale {
        directory.delete_customer(&id)?;
        println!("Removed {name} from the store directory.");
        removed += 1;
    }

    directory.save()?;
    println!("{created} registered, {removed} removed.");
    Ok(())
}
