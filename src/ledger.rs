use chrono::NaiveDate;
use rusqlite::Connection;

use crate::error::{Result, TrustError};
use crate::fmt::round_cents;
use crate::models::Client;

/// Phase 1 clients are on the store list; phase 4 clients are pending
/// discharge and take no further transactions.
pub const PHASE_ACTIVE: i64 = 1;
pub const PHASE_DISCHARGE: i64 = 4;

fn client_from_row(row: &rusqlite::Row) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        phase: row.get(3)?,
        discharged: row.get::<_, i64>(4)? != 0,
        contract: row.get(5)?,
        comments: row.get(6)?,
    })
}

const CLIENT_COLS: &str = "id, first_name, last_name, phase, discharged, contract, comments";

pub fn get_client(conn: &Connection, client_id: i64) -> Result<Option<Client>> {
    let mut stmt =
        conn.prepare_cached(&format!("SELECT {CLIENT_COLS} FROM clients WHERE id = ?1"))?;
    let mut rows = stmt.query_map([client_id], client_from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// Resolve a name from an external sheet to a ledger client. Matching is
/// case-insensitive; more than one match is an explicit error so a batch
/// row is never silently attributed to the wrong person.
pub fn find_by_name(conn: &Connection, first_name: &str, last_name: &str) -> Result<Option<Client>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {CLIENT_COLS} FROM clients \
         WHERE first_name = ?1 COLLATE NOCASE AND last_name = ?2 COLLATE NOCASE"
    ))?;
    let clients: Vec<Client> = stmt
        .query_map([first_name, last_name], client_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    match clients.len() {
        0 => Ok(None),
        1 => Ok(Some(clients.into_iter().next().unwrap())),
        _ => Err(TrustError::AmbiguousClient(format!("{first_name} {last_name}"))),
    }
}

/// Phase-1, non-discharged clients in (last name, first name) order — the
/// roster every store list is built from.
pub fn active_clients(conn: &Connection) -> Result<Vec<Client>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {CLIENT_COLS} FROM clients \
         WHERE phase = ?1 AND discharged = 0 \
         ORDER BY last_name COLLATE NOCASE ASC, first_name COLLATE NOCASE ASC"
    ))?;
    let clients = stmt
        .query_map([PHASE_ACTIVE], client_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(clients)
}

pub fn add_client(
    conn: &Connection,
    first_name: &str,
    last_name: &str,
    phase: i64,
    contract: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO clients (first_name, last_name, phase, contract) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![first_name, last_name, phase, contract],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn set_phase(conn: &Connection, client_id: i64, phase: i64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE clients SET phase = ?1 WHERE id = ?2",
        rusqlite::params![phase, client_id],
    )?;
    if updated == 0 {
        return Err(TrustError::UnknownClient(format!("id {client_id}")));
    }
    Ok(())
}

pub fn mark_discharged(conn: &Connection, client_id: i64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE clients SET discharged = 1 WHERE id = ?1",
        [client_id],
    )?;
    if updated == 0 {
        return Err(TrustError::UnknownClient(format!("id {client_id}")));
    }
    Ok(())
}

/// Sum of deposits minus sum of withdrawals over the client's whole
/// transaction history — the authoritative trust balance.
pub fn net_balance(conn: &Connection, client_id: i64) -> Result<f64> {
    let sum: f64 = conn.query_row(
        "SELECT COALESCE(SUM(deposit_amount), 0) - COALESCE(SUM(withdrawal_amount), 0) \
         FROM transactions WHERE client_id = ?1",
        [client_id],
        |row| row.get(0),
    )?;
    Ok(round_cents(sum))
}

pub fn record_transaction(
    conn: &Connection,
    client_id: i64,
    date: NaiveDate,
    description: &str,
    deposit_amount: f64,
    withdrawal_amount: f64,
    import_id: Option<i64>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO transactions (client_id, date, description, deposit_amount, withdrawal_amount, import_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            client_id,
            date.to_string(),
            description,
            deposit_amount,
            withdrawal_amount,
            import_id
        ],
    )?;
    Ok(())
}

/// An identical transaction was already recorded for this client on this
/// date. Batch sheets get re-imported; ledger rows must not.
pub fn duplicate_exists(
    conn: &Connection,
    client_id: i64,
    date: NaiveDate,
    description: &str,
    deposit_amount: f64,
    withdrawal_amount: f64,
) -> Result<bool> {
    let mut stmt = conn.prepare_cached(
        "SELECT 1 FROM transactions \
         WHERE client_id = ?1 AND date = ?2 AND description = ?3 \
         AND deposit_amount = ?4 AND withdrawal_amount = ?5",
    )?;
    Ok(stmt.exists(rusqlite::params![
        client_id,
        date.to_string(),
        description,
        deposit_amount,
        withdrawal_amount
    ])?)
}

pub struct ClientBalance {
    pub client: Client,
    pub balance: f64,
}

/// Every client with their net balance, (last, first) ordered.
pub fn balances(conn: &Connection) -> Result<Vec<ClientBalance>> {
    let mut stmt = conn.prepare_cached(
        "SELECT c.id, c.first_name, c.last_name, c.phase, c.discharged, c.contract, c.comments, \
                COALESCE(SUM(t.deposit_amount), 0) - COALESCE(SUM(t.withdrawal_amount), 0) \
         FROM clients c \
         LEFT JOIN transactions t ON t.client_id = c.id \
         GROUP BY c.id \
         ORDER BY c.last_name COLLATE NOCASE ASC, c.first_name COLLATE NOCASE ASC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ClientBalance {
                client: client_from_row(row)?,
                balance: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows
        .into_iter()
        .map(|mut cb| {
            cb.balance = round_cents(cb.balance);
            cb
        })
        .collect())
}
