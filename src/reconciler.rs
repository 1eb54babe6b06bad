use chrono::NaiveDate;
use rusqlite::Connection;

use crate::error::{Result, TrustError};
use crate::fmt::round_cents;
use crate::ledger;
use crate::models::BalanceRow;
use crate::snapshot::SnapshotStore;

/// What the engine decided for one client.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Amount drawn from the trust ledger onto the store list this run.
    Applied(f64),
    /// Ledger balance is zero or negative; a client cannot fund the store
    /// list from withdrawals.
    NothingToDraw,
    /// This cycle already drew everything the ledger currently holds.
    AlreadyApplied,
    /// Balance sits exactly at the ceiling; no headroom.
    AtCeiling,
    /// Balance is above the ceiling, so the computed top-up would be
    /// negative. The row is left untouched and flagged for review.
    OverCeiling,
    /// In the ledger but missing from today's store list.
    NotOnStoreList,
    /// On the store list but missing from the ledger; treated as a zero
    /// balance.
    NoLedgerRecord,
}

impl Outcome {
    pub fn is_advisory(&self) -> bool {
        matches!(self, Self::OverCeiling | Self::NotOnStoreList | Self::NoLedgerRecord)
    }
}

#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub client_id: i64,
    pub name: String,
    pub outcome: Outcome,
    /// Final balance after the run; None for clients with no row today.
    pub final_balance: Option<f64>,
}

#[derive(Debug)]
pub struct ReconciliationReport {
    pub date: NaiveDate,
    pub entries: Vec<ReportEntry>,
    pub total_applied: f64,
}

/// Decide how much to draw from the ledger for one row. Pure; every
/// invariant the engine guarantees lives here.
///
/// `applied_ledger` already reflects earlier draws this cycle, so the
/// amount available is the delta against the live ledger balance and a
/// re-run with an unchanged ledger adds nothing. The capped branch never
/// draws more than that delta either, so the ledger is never overdrawn
/// onto the list.
fn decide(ceiling: f64, row: &BalanceRow, net_ledger: f64) -> Outcome {
    if net_ledger <= 0.0 {
        return Outcome::NothingToDraw;
    }
    let available = round_cents(net_ledger - row.applied_ledger);
    if available <= 0.0 {
        return Outcome::AlreadyApplied;
    }

    let prospective = row.top_up + row.final_balance + available;
    if prospective <= ceiling {
        return Outcome::Applied(available);
    }

    let headroom = round_cents(ceiling - row.final_balance);
    if headroom < 0.0 {
        Outcome::OverCeiling
    } else if headroom == 0.0 {
        Outcome::AtCeiling
    } else {
        Outcome::Applied(headroom.min(available))
    }
}

/// Top up every client on today's store list from their trust balance,
/// capped at `ceiling`. One pass, one client at a time; the amended list
/// is written back once at the end so an aborted run changes nothing.
pub fn reconcile(
    conn: &Connection,
    store: &SnapshotStore,
    today: NaiveDate,
    ceiling: f64,
) -> Result<ReconciliationReport> {
    let Some(mut rows) = store.read(today)? else {
        return Err(TrustError::MissingStoreList(today));
    };
    // Later lists already chain from this one's finals; amending it now
    // would corrupt them.
    if let Some(latest) = store.latest_date()? {
        if latest > today {
            return Err(TrustError::HistoricalStoreList(today));
        }
    }

    let mut entries = Vec::with_capacity(rows.len());
    let mut total_applied = 0.0;

    for row in &mut rows {
        if ledger::get_client(conn, row.client_id)?.is_none() {
            log::warn!(
                "{} (id {}) has no ledger record; treating the balance as zero",
                row.display_name(),
                row.client_id
            );
            entries.push(ReportEntry {
                client_id: row.client_id,
                name: row.display_name(),
                outcome: Outcome::NoLedgerRecord,
                final_balance: Some(row.final_balance),
            });
            continue;
        }

        let net = ledger::net_balance(conn, row.client_id)?;
        let outcome = decide(ceiling, row, net);
        if let Outcome::Applied(amount) = outcome {
            row.top_up = round_cents(row.top_up + amount);
            row.applied_ledger = round_cents(row.applied_ledger + amount);
            row.recompute_final();
            total_applied += amount;
        }
        entries.push(ReportEntry {
            client_id: row.client_id,
            name: row.display_name(),
            outcome,
            final_balance: Some(row.final_balance),
        });
    }

    // Active clients the list never picked up.
    for client in ledger::active_clients(conn)? {
        if !rows.iter().any(|r| r.client_id == client.id) {
            entries.push(ReportEntry {
                client_id: client.id,
                name: client.display_name(),
                outcome: Outcome::NotOnStoreList,
                final_balance: None,
            });
        }
    }

    store.write(today, &rows)?;

    Ok(ReconciliationReport {
        date: today,
        entries,
        total_applied: round_cents(total_applied),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};

    const CEILING: f64 = 100.0;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn setup() -> (tempfile::TempDir, Connection, SnapshotStore) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        let store = SnapshotStore::open(dir.path().join("store-lists")).unwrap();
        (dir, conn, store)
    }

    fn client_with_balance(conn: &Connection, first: &str, last: &str, balance: f64) -> i64 {
        let id = ledger::add_client(conn, first, last, ledger::PHASE_ACTIVE, None).unwrap();
        if balance != 0.0 {
            let (dep, wd) = if balance > 0.0 { (balance, 0.0) } else { (0.0, -balance) };
            ledger::record_transaction(conn, id, date("2026-08-01"), "Seed", dep, wd, None).unwrap();
        }
        id
    }

    fn row(id: i64, last: &str, first: &str, final_balance: f64) -> BalanceRow {
        let mut r = BalanceRow::new(id, last, first, final_balance);
        r.recompute_final();
        r
    }

    // decide() against the worked scenarios.

    #[test]
    fn test_decide_caps_at_the_ceiling() {
        // ledger 150, balance 30, no top-up yet: add 70, landing on 100.
        let r = row(1, "Lovelace", "Ada", 30.0);
        assert_eq!(decide(CEILING, &r, 150.0), Outcome::Applied(70.0));
    }

    #[test]
    fn test_decide_adds_full_ledger_when_under_ceiling() {
        // ledger 20, balance 50: everything fits.
        let r = row(1, "Hopper", "Grace", 50.0);
        assert_eq!(decide(CEILING, &r, 20.0), Outcome::Applied(20.0));
    }

    #[test]
    fn test_decide_ignores_negative_ledger() {
        let r = row(1, "Turing", "Alan", 10.0);
        assert_eq!(decide(CEILING, &r, -10.0), Outcome::NothingToDraw);
        assert_eq!(decide(CEILING, &r, 0.0), Outcome::NothingToDraw);
    }

    #[test]
    fn test_decide_second_run_is_a_no_op() {
        let mut r = row(1, "Lovelace", "Ada", 30.0);
        let Outcome::Applied(add) = decide(CEILING, &r, 150.0) else {
            panic!("expected a top-up");
        };
        r.top_up += add;
        r.applied_ledger += add;
        r.recompute_final();
        assert_eq!(r.final_balance, 100.0);

        // Ledger unchanged: at the ceiling, nothing more moves.
        assert_eq!(decide(CEILING, &r, 150.0), Outcome::AtCeiling);
    }

    #[test]
    fn test_decide_draws_remainder_once_headroom_opens() {
        let mut r = row(1, "Lovelace", "Ada", 30.0);
        r.top_up = 70.0;
        r.applied_ledger = 70.0;
        r.recompute_final(); // 100.00

        // Mid-cycle spend opens headroom; the undrawn 80 is still there.
        r.spent_at_store = 25.0;
        r.recompute_final(); // 75.00
        assert_eq!(decide(CEILING, &r, 150.0), Outcome::Applied(25.0));
    }

    #[test]
    fn test_decide_never_draws_more_than_the_ledger_delta() {
        // Headroom 40, but only 15 left undrawn in the ledger.
        let mut r = row(1, "Hopper", "Grace", 60.0);
        r.top_up = 55.0;
        r.applied_ledger = 55.0;
        assert_eq!(decide(CEILING, &r, 70.0), Outcome::Applied(15.0));
    }

    #[test]
    fn test_decide_flags_balance_above_ceiling() {
        let r = row(1, "Turing", "Alan", 120.0);
        assert_eq!(decide(CEILING, &r, 50.0), Outcome::OverCeiling);
    }

    #[test]
    fn test_decide_exact_fit_lands_on_ceiling() {
        let r = row(1, "Hopper", "Grace", 40.0);
        assert_eq!(decide(CEILING, &r, 60.0), Outcome::Applied(60.0));
    }

    // reconcile() over a real snapshot + ledger.

    #[test]
    fn test_reconcile_worked_scenarios() {
        let (_dir, conn, store) = setup();
        let a = client_with_balance(&conn, "Ada", "Lovelace", 150.0);
        let b = client_with_balance(&conn, "Grace", "Hopper", 20.0);
        let c = client_with_balance(&conn, "Alan", "Turing", -10.0);
        // Client D: in the ledger, never put on the list.
        client_with_balance(&conn, "Edsger", "Dijkstra", 35.0);

        let today = date("2026-08-07");
        store
            .write(
                today,
                &[
                    row(a, "Lovelace", "Ada", 30.0),
                    row(b, "Hopper", "Grace", 50.0),
                    row(c, "Turing", "Alan", 5.0),
                ],
            )
            .unwrap();

        let report = reconcile(&conn, &store, today, CEILING).unwrap();
        assert_eq!(report.total_applied, 90.0);

        let by_name = |name: &str| {
            report
                .entries
                .iter()
                .find(|e| e.name == name)
                .unwrap_or_else(|| panic!("no entry for {name}"))
        };
        assert_eq!(by_name("Lovelace, Ada").outcome, Outcome::Applied(70.0));
        assert_eq!(by_name("Lovelace, Ada").final_balance, Some(100.0));
        assert_eq!(by_name("Hopper, Grace").outcome, Outcome::Applied(20.0));
        assert_eq!(by_name("Hopper, Grace").final_balance, Some(70.0));
        assert_eq!(by_name("Turing, Alan").outcome, Outcome::NothingToDraw);
        assert_eq!(by_name("Dijkstra, Edsger").outcome, Outcome::NotOnStoreList);

        // The amended list is on disk with the ceiling honored everywhere.
        let rows = store.read(today).unwrap().unwrap();
        assert!(rows.iter().all(|r| r.final_balance <= CEILING));
        let ada = rows.iter().find(|r| r.client_id == a).unwrap();
        assert_eq!(ada.top_up, 70.0);
        assert_eq!(ada.applied_ledger, 70.0);
    }

    #[test]
    fn test_reconcile_twice_is_idempotent() {
        let (_dir, conn, store) = setup();
        let a = client_with_balance(&conn, "Ada", "Lovelace", 150.0);
        let b = client_with_balance(&conn, "Grace", "Hopper", 20.0);

        let today = date("2026-08-07");
        store
            .write(today, &[row(a, "Lovelace", "Ada", 30.0), row(b, "Hopper", "Grace", 50.0)])
            .unwrap();

        reconcile(&conn, &store, today, CEILING).unwrap();
        let after_first = store.read(today).unwrap().unwrap();

        let second = reconcile(&conn, &store, today, CEILING).unwrap();
        let after_second = store.read(today).unwrap().unwrap();

        assert_eq!(second.total_applied, 0.0);
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn test_reconcile_tops_up_again_after_new_deposit() {
        let (_dir, conn, store) = setup();
        let b = client_with_balance(&conn, "Grace", "Hopper", 20.0);

        let today = date("2026-08-07");
        store.write(today, &[row(b, "Hopper", "Grace", 50.0)]).unwrap();
        reconcile(&conn, &store, today, CEILING).unwrap();

        // Another deposit lands; only the delta moves.
        ledger::record_transaction(&conn, b, today, "Payroll", 15.0, 0.0, None).unwrap();
        let report = reconcile(&conn, &store, today, CEILING).unwrap();
        assert_eq!(report.total_applied, 15.0);

        let rows = store.read(today).unwrap().unwrap();
        assert_eq!(rows[0].top_up, 35.0);
        assert_eq!(rows[0].final_balance, 85.0);
    }

    #[test]
    fn test_reconcile_top_up_never_decreases() {
        let (_dir, conn, store) = setup();
        let a = client_with_balance(&conn, "Ada", "Lovelace", 150.0);
        let c = client_with_balance(&conn, "Alan", "Turing", -10.0);

        let today = date("2026-08-07");
        let mut turing = row(c, "Turing", "Alan", 5.0);
        turing.top_up = 2.0;
        turing.recompute_final();
        store.write(today, &[row(a, "Lovelace", "Ada", 30.0), turing]).unwrap();

        let before = store.read(today).unwrap().unwrap();
        reconcile(&conn, &store, today, CEILING).unwrap();
        let after = store.read(today).unwrap().unwrap();

        for (b, a) in before.iter().zip(after.iter()) {
            assert!(a.top_up >= b.top_up, "top_up shrank for {}", a.display_name());
        }
    }

    #[test]
    fn test_reconcile_row_without_ledger_record() {
        let (_dir, conn, store) = setup();
        let today = date("2026-08-07");
        store.write(today, &[row(404, "Ghost", "Gone", 12.0)]).unwrap();

        let report = reconcile(&conn, &store, today, CEILING).unwrap();
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].outcome, Outcome::NoLedgerRecord);
        assert_eq!(report.total_applied, 0.0);

        // Row untouched on disk.
        let rows = store.read(today).unwrap().unwrap();
        assert_eq!(rows[0].top_up, 0.0);
        assert_eq!(rows[0].final_balance, 12.0);
    }

    #[test]
    fn test_reconcile_without_a_store_list_fails() {
        let (_dir, conn, store) = setup();
        let err = reconcile(&conn, &store, date("2026-08-07"), CEILING).unwrap_err();
        assert!(matches!(err, TrustError::MissingStoreList(_)));
    }

    #[test]
    fn test_reconcile_refuses_a_historical_list() {
        let (_dir, conn, store) = setup();
        let a = client_with_balance(&conn, "Ada", "Lovelace", 50.0);

        store.write(date("2026-08-07"), &[row(a, "Lovelace", "Ada", 10.0)]).unwrap();
        store.write(date("2026-08-08"), &[row(a, "Lovelace", "Ada", 10.0)]).unwrap();

        let err = reconcile(&conn, &store, date("2026-08-07"), CEILING).unwrap_err();
        assert!(matches!(err, TrustError::HistoricalStoreList(_)));

        // Friday's list is untouched.
        let rows = store.read(date("2026-08-07")).unwrap().unwrap();
        assert_eq!(rows[0].top_up, 0.0);
    }

    #[test]
    fn test_reconcile_over_ceiling_row_is_left_alone() {
        let (_dir, conn, store) = setup();
        let a = client_with_balance(&conn, "Ada", "Lovelace", 50.0);

        let today = date("2026-08-07");
        store.write(today, &[row(a, "Lovelace", "Ada", 120.0)]).unwrap();

        let report = reconcile(&conn, &store, today, CEILING).unwrap();
        assert_eq!(report.entries[0].outcome, Outcome::OverCeiling);

        let rows = store.read(today).unwrap().unwrap();
        assert_eq!(rows[0].top_up, 0.0);
        assert_eq!(rows[0].final_balance, 120.0);
    }
}
