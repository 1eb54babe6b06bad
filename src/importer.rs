use std::path::Path;

use chrono::NaiveDate;
use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::error::{Result, TrustError};
use crate::fmt::{money, round_cents};
use crate::ledger;
use crate::models::{BatchEntry, QuartersEntry, RosterEntry};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn parse_amount(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | '"' | '$' | ' '))
        .collect();
    if let Some(inner) = cleaned.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return -inner.parse::<f64>().unwrap_or(0.0);
    }
    cleaned.parse().unwrap_or(0.0)
}

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn header_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
}

fn field(record: &csv::StringRecord, idx: Option<usize>) -> String {
    idx.and_then(|i| record.get(i))
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

#[cfg(feature = "xlsx")]
fn is_xlsx(path: &Path) -> bool {
    path.extension()
        .map_or(false, |e| e.eq_ignore_ascii_case("xlsx"))
}

// ---------------------------------------------------------------------------
// Sheet kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SheetKind {
    Deposits,
    Withdrawals,
    Roster,
}

impl SheetKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Deposits => "deposits",
            Self::Withdrawals => "withdrawals",
            Self::Roster => "roster",
        }
    }
}

// ---------------------------------------------------------------------------
// Sheet parsers
// ---------------------------------------------------------------------------

/// Columns: FirstName, LastName, Type, Amount (any order, extra columns
/// ignored). Rows without both names are skipped.
pub fn parse_batch_sheet(path: &Path) -> Result<Vec<BatchEntry>> {
    #[cfg(feature = "xlsx")]
    if is_xlsx(path) {
        return parse_batch_sheet_xlsx(path);
    }

    let mut rdr = csv::Reader::from_path(path)?;
    let headers = rdr.headers()?.clone();
    let idx_first = header_index(&headers, "FirstName");
    let idx_last = header_index(&headers, "LastName");
    let idx_type = header_index(&headers, "Type");
    let idx_amount = header_index(&headers, "Amount");

    let mut entries = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let first_name = field(&record, idx_first);
        let last_name = field(&record, idx_last);
        if first_name.is_empty() || last_name.is_empty() {
            continue;
        }
        entries.push(BatchEntry {
            first_name,
            last_name,
            description: field(&record, idx_type),
            amount: round_cents(parse_amount(&field(&record, idx_amount))),
        });
    }
    Ok(entries)
}

/// Columns: Type (A/D), FirstName, LastName, Contract, ReasonForDischarge.
pub fn parse_roster_sheet(path: &Path) -> Result<Vec<RosterEntry>> {
    #[cfg(feature = "xlsx")]
    if is_xlsx(path) {
        return parse_roster_sheet_xlsx(path);
    }

    let mut rdr = csv::Reader::from_path(path)?;
    let headers = rdr.headers()?.clone();
    let idx_kind = header_index(&headers, "Type");
    let idx_first = header_index(&headers, "FirstName");
    let idx_last = header_index(&headers, "LastName");
    let idx_contract = header_index(&headers, "Contract");
    let idx_reason = header_index(&headers, "ReasonForDischarge");

    let mut entries = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let first_name = field(&record, idx_first);
        let last_name = field(&record, idx_last);
        if first_name.is_empty() || last_name.is_empty() {
            continue;
        }
        let contract = field(&record, idx_contract);
        let reason = field(&record, idx_reason);
        entries.push(RosterEntry {
            kind: field(&record, idx_kind).to_uppercase(),
            first_name,
            last_name,
            contract: (!contract.is_empty()).then_some(contract),
            discharge_reason: (!reason.is_empty()).then_some(reason),
        });
    }
    Ok(entries)
}

/// The quarters feed for one day: `quarters_YYYY-MM-DD.csv` with columns
/// FirstName, LastName, Amount. No file means no quarters moved that day.
pub fn read_quarters_entries(dir: &Path, date: NaiveDate) -> Result<Vec<QuartersEntry>> {
    let path = dir.join(format!("quarters_{date}.csv"));
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut rdr = csv::Reader::from_path(&path)?;
    let headers = rdr.headers()?.clone();
    let idx_first = header_index(&headers, "FirstName");
    let idx_last = header_index(&headers, "LastName");
    let idx_amount = header_index(&headers, "Amount");

    let mut entries = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let first_name = field(&record, idx_first);
        let last_name = field(&record, idx_last);
        if first_name.is_empty() || last_name.is_empty() {
            continue;
        }
        entries.push(QuartersEntry {
            first_name,
            last_name,
            amount: round_cents(parse_amount(&field(&record, idx_amount))),
        });
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// XLSX parsers (feature-gated)
// ---------------------------------------------------------------------------

#[cfg(feature = "xlsx")]
fn xlsx_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    use calamine::{Data, Reader};

    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| TrustError::Other(format!("Failed to open XLSX: {e}")))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| TrustError::Other("XLSX workbook has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| TrustError::Other(format!("Failed to read XLSX sheet: {e}")))?;

    let rows = range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Data::String(s) => s.trim().to_string(),
                    Data::Float(f) => f.to_string(),
                    Data::Int(i) => i.to_string(),
                    Data::Bool(b) => b.to_string(),
                    _ => String::new(),
                })
                .collect()
        })
        .collect();
    Ok(rows)
}

#[cfg(feature = "xlsx")]
fn xlsx_header_index(header: &[String], name: &str) -> Option<usize> {
    header.iter().position(|h| h.eq_ignore_ascii_case(name))
}

#[cfg(feature = "xlsx")]
fn xlsx_field(row: &[String], idx: Option<usize>) -> String {
    idx.and_then(|i| row.get(i)).cloned().unwrap_or_default()
}

#[cfg(feature = "xlsx")]
fn parse_batch_sheet_xlsx(path: &Path) -> Result<Vec<BatchEntry>> {
    let rows = xlsx_rows(path)?;
    let Some((header, body)) = rows.split_first() else {
        return Ok(Vec::new());
    };
    let idx_first = xlsx_header_index(header, "FirstName");
    let idx_last = xlsx_header_index(header, "LastName");
    let idx_type = xlsx_header_index(header, "Type");
    let idx_amount = xlsx_header_index(header, "Amount");

    let mut entries = Vec::new();
    for row in body {
        let first_name = xlsx_field(row, idx_first);
        let last_name = xlsx_field(row, idx_last);
        if first_name.is_empty() || last_name.is_empty() {
            continue;
        }
        entries.push(BatchEntry {
            first_name,
            last_name,
            description: xlsx_field(row, idx_type),
            amount: round_cents(parse_amount(&xlsx_field(row, idx_amount))),
        });
    }
    Ok(entries)
}

#[cfg(feature = "xlsx")]
fn parse_roster_sheet_xlsx(path: &Path) -> Result<Vec<RosterEntry>> {
    let rows = xlsx_rows(path)?;
    let Some((header, body)) = rows.split_first() else {
        return Ok(Vec::new());
    };
    let idx_kind = xlsx_header_index(header, "Type");
    let idx_first = xlsx_header_index(header, "FirstName");
    let idx_last = xlsx_header_index(header, "LastName");
    let idx_contract = xlsx_header_index(header, "Contract");
    let idx_reason = xlsx_header_index(header, "ReasonForDischarge");

    let mut entries = Vec::new();
    for row in body {
        let first_name = xlsx_field(row, idx_first);
        let last_name = xlsx_field(row, idx_last);
        if first_name.is_empty() || last_name.is_empty() {
            continue;
        }
        let contract = xlsx_field(row, idx_contract);
        let reason = xlsx_field(row, idx_reason);
        entries.push(RosterEntry {
            kind: xlsx_field(row, idx_kind).to_uppercase(),
            first_name,
            last_name,
            contract: (!contract.is_empty()).then_some(contract),
            discharge_reason: (!reason.is_empty()).then_some(reason),
        });
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Ledger application
// ---------------------------------------------------------------------------

pub struct ImportOutcome {
    pub applied: usize,
    pub skipped: usize,
    pub duplicate_file: bool,
    pub messages: Vec<String>,
}

impl ImportOutcome {
    fn duplicate() -> Self {
        Self { applied: 0, skipped: 0, duplicate_file: true, messages: Vec::new() }
    }
}

/// Already imported this exact file for this sheet kind?
fn is_duplicate_file(conn: &Connection, kind: SheetKind, checksum: &str) -> Result<bool> {
    let mut stmt =
        conn.prepare_cached("SELECT 1 FROM imports WHERE checksum = ?1 AND sheet_kind = ?2")?;
    Ok(stmt.exists(rusqlite::params![checksum, kind.key()])?)
}

fn record_import(
    conn: &Connection,
    path: &Path,
    kind: SheetKind,
    record_count: usize,
    checksum: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO imports (filename, sheet_kind, record_count, checksum) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            path.file_name().and_then(|n| n.to_str()).unwrap_or(""),
            kind.key(),
            record_count as i64,
            checksum
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn import_deposits(conn: &Connection, path: &Path, today: NaiveDate) -> Result<ImportOutcome> {
    let checksum = compute_checksum(path)?;
    if is_duplicate_file(conn, SheetKind::Deposits, &checksum)? {
        return Ok(ImportOutcome::duplicate());
    }

    let entries = parse_batch_sheet(path)?;
    let import_id = record_import(conn, path, SheetKind::Deposits, entries.len(), &checksum)?;

    let mut outcome = ImportOutcome {
        applied: 0,
        skipped: 0,
        duplicate_file: false,
        messages: Vec::new(),
    };

    for entry in &entries {
        let who = format!("{} {}", entry.first_name, entry.last_name);
        let client = match ledger::find_by_name(conn, &entry.first_name, &entry.last_name) {
            Ok(client) => client,
            Err(TrustError::AmbiguousClient(name)) => {
                outcome.messages.push(format!(
                    "More than one client is named {name}; deposit was not added."
                ));
                outcome.skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        let Some(client) = client else {
            outcome
                .messages
                .push(format!("{who} not found in the ledger; deposit was not added."));
            outcome.skipped += 1;
            continue;
        };
        if client.phase == ledger::PHASE_DISCHARGE {
            outcome.messages.push(format!(
                "{who} is phase {}; deposit was not added.",
                ledger::PHASE_DISCHARGE
            ));
            outcome.skipped += 1;
            continue;
        }
        if ledger::duplicate_exists(conn, client.id, today, &entry.description, entry.amount, 0.0)? {
            outcome.messages.push(format!(
                "A {} deposit for {who} is already recorded on {today}.",
                money(entry.amount)
            ));
            outcome.skipped += 1;
            continue;
        }

        ledger::record_transaction(
            conn,
            client.id,
            today,
            &entry.description,
            entry.amount,
            0.0,
            Some(import_id),
        )?;
        outcome
            .messages
            .push(format!("Deposited {} to {who}'s account.", money(entry.amount)));
        outcome.applied += 1;
    }

    Ok(outcome)
}

pub fn import_withdrawals(
    conn: &Connection,
    path: &Path,
    today: NaiveDate,
) -> Result<ImportOutcome> {
    let checksum = compute_checksum(path)?;
    if is_duplicate_file(conn, SheetKind::Withdrawals, &checksum)? {
        return Ok(ImportOutcome::duplicate());
    }

    let entries = parse_batch_sheet(path)?;
    let import_id = record_import(conn, path, SheetKind::Withdrawals, entries.len(), &checksum)?;

    let mut outcome = ImportOutcome {
        applied: 0,
        skipped: 0,
        duplicate_file: false,
        messages: Vec::new(),
    };

    for entry in &entries {
        let who = format!("{} {}", entry.first_name, entry.last_name);
        let client = match ledger::find_by_name(conn, &entry.first_name, &entry.last_name) {
            Ok(client) => client,
            Err(TrustError::AmbiguousClient(name)) => {
                outcome.messages.push(format!(
                    "More than one client is named {name}; withdrawal was not added."
                ));
                outcome.skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        let Some(client) = client else {
            outcome
                .messages
                .push(format!("{who} not found in the ledger; withdrawal was not added."));
            outcome.skipped += 1;
            continue;
        };
        if client.phase == ledger::PHASE_DISCHARGE {
            outcome.messages.push(format!(
                "{who} is phase {}; withdrawal was not added.",
                ledger::PHASE_DISCHARGE
            ));
            outcome.skipped += 1;
            continue;
        }
        if ledger::duplicate_exists(conn, client.id, today, &entry.description, 0.0, entry.amount)? {
            outcome.messages.push(format!(
                "A {} withdrawal for {who} is already recorded on {today}.",
                money(entry.amount)
            ));
            outcome.skipped += 1;
            continue;
        }
        let available = ledger::net_balance(conn, client.id)?;
        if entry.amount > available {
            outcome.messages.push(format!(
                "{who} only has {}; {} withdrawal was not added.",
                money(available),
                money(entry.amount)
            ));
            outcome.skipped += 1;
            continue;
        }

        ledger::record_transaction(
            conn,
            client.id,
            today,
            &entry.description,
            0.0,
            entry.amount,
            Some(import_id),
        )?;
        outcome
            .messages
            .push(format!("Withdrew {} from {who}'s account.", money(entry.amount)));
        outcome.applied += 1;
    }

    Ok(outcome)
}

pub fn import_roster(conn: &Connection, path: &Path, today: NaiveDate) -> Result<ImportOutcome> {
    let checksum = compute_checksum(path)?;
    if is_duplicate_file(conn, SheetKind::Roster, &checksum)? {
        return Ok(ImportOutcome::duplicate());
    }

    let entries = parse_roster_sheet(path)?;
    let import_id = record_import(conn, path, SheetKind::Roster, entries.len(), &checksum)?;

    let mut outcome = ImportOutcome {
        applied: 0,
        skipped: 0,
        duplicate_file: false,
        messages: Vec::new(),
    };

    for entry in &entries {
        let who = format!("{} {}", entry.first_name, entry.last_name);
        match entry.kind.as_str() {
            "A" => {
                let existing = match ledger::find_by_name(conn, &entry.first_name, &entry.last_name)
                {
                    Ok(existing) => existing,
                    Err(TrustError::AmbiguousClient(name)) => {
                        outcome.messages.push(format!(
                            "More than one client is already named {name}; admission skipped."
                        ));
                        outcome.skipped += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                if existing.is_some() {
                    outcome.messages.push(format!(
                        "{who} is already in the ledger. Check with records and enter the admission manually."
                    ));
                    outcome.skipped += 1;
                    continue;
                }
                let id = ledger::add_client(
                    conn,
                    &entry.first_name,
                    &entry.last_name,
                    ledger::PHASE_ACTIVE,
                    entry.contract.as_deref(),
                )?;
                ledger::record_transaction(
                    conn,
                    id,
                    today,
                    "Beginning Balance",
                    0.0,
                    0.0,
                    Some(import_id),
                )?;
                outcome.messages.push(format!("{who} added to the ledger."));
                outcome.applied += 1;
            }
            "D" => {
                let client = match ledger::find_by_name(conn, &entry.first_name, &entry.last_name)
                {
                    Ok(client) => client,
                    Err(TrustError::AmbiguousClient(name)) => {
                        outcome.messages.push(format!(
                            "More than one client is named {name}; discharge skipped."
                        ));
                        outcome.skipped += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                let Some(client) = client else {
                    outcome.messages.push(format!(
                        "{who} not found in the ledger; no discharge entry added."
                    ));
                    outcome.skipped += 1;
                    continue;
                };
                if client.phase == ledger::PHASE_DISCHARGE {
                    outcome
                        .messages
                        .push(format!("{who} has already been discharged."));
                    outcome.skipped += 1;
                    continue;
                }
                let reason = entry
                    .discharge_reason
                    .as_deref()
                    .unwrap_or("Discharged");
                ledger::record_transaction(conn, client.id, today, reason, 0.0, 0.0, Some(import_id))?;
                ledger::set_phase(conn, client.id, ledger::PHASE_DISCHARGE)?;
                outcome.messages.push(format!("{who} discharged."));
                outcome.applied += 1;
            }
            other => {
                outcome
                    .messages
                    .push(format!("Invalid entry type '{other}' for {who}."));
                outcome.skipped += 1;
            }
        }
    }

    Ok(outcome)
}
