use serde::{Deserialize, Serialize};

use crate::fmt::round_cents;

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Client {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub phase: i64,
    pub discharged: bool,
    pub contract: Option<String>,
    pub comments: Option<String>,
}

impl Client {
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

/// One row of a daily store list.
///
/// `final_balance` is derived from the other money fields and is only ever
/// written through `recompute_final`. `applied_ledger` is the cumulative
/// amount drawn from the trust ledger this cycle; the builder carries it
/// across days within a cycle and resets it at the anchor weekday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceRow {
    pub last_name: String,
    pub first_name: String,
    pub client_id: i64,
    pub starting_balance: f64,
    pub spent_at_store: f64,
    pub quarters: f64,
    pub top_up: f64,
    pub applied_ledger: f64,
    pub final_balance: f64,
}

impl BalanceRow {
    pub fn new(client_id: i64, last_name: &str, first_name: &str, starting_balance: f64) -> Self {
        let mut row = Self {
            last_name: last_name.to_string(),
            first_name: first_name.to_string(),
            client_id,
            starting_balance: round_cents(starting_balance),
            spent_at_store: 0.0,
            quarters: 0.0,
            top_up: 0.0,
            applied_ledger: 0.0,
            final_balance: 0.0,
        };
        row.recompute_final();
        row
    }

    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }

    pub fn recompute_final(&mut self) {
        self.final_balance =
            round_cents(self.starting_balance - self.spent_at_store - self.quarters + self.top_up);
    }
}

/// Parsed row from a deposits/withdrawals batch sheet before ledger insert.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub first_name: String,
    pub last_name: String,
    pub description: String,
    pub amount: f64,
}

/// Parsed row from a roster (ins & outs) sheet: 'A' admits, 'D' discharges.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub kind: String,
    pub first_name: String,
    pub last_name: String,
    pub contract: Option<String>,
    pub discharge_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct QuartersEntry {
    pub first_name: String,
    pub last_name: String,
    pub amount: f64,
}
