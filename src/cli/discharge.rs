use crate::db::{get_connection, DB_FILE};
use crate::error::Result;
use crate::ledger;
use crate::settings::get_data_dir;

/// A balance is "zero" once it rounds to no cents either way.
const ZERO_EPSILON: f64 = 0.005;

pub fn run() -> Result<()> {
    let conn = get_connection(&get_data_dir().join(DB_FILE))?;

    let mut discharged = 0;
    for cb in ledger::balances(&conn)? {
        if cb.client.phase == ledger::PHASE_DISCHARGE
            && !cb.client.discharged
            && cb.balance.abs() < ZERO_EPSILON
        {
            ledger::mark_discharged(&conn, cb.client.id)?;
            println!(
                "Discharging: {}, phase {}, balance $0.00",
                cb.client.display_name(),
                cb.client.phase
            );
            discharged += 1;
        }
    }

    if discharged == 0 {
        println!("No clients met the discharge criteria.");
    }
    Ok(())
}
