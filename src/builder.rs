use std::collections::HashSet;

use chrono::{Duration, NaiveDate, Weekday};
use rusqlite::Connection;

use crate::cycle;
use crate::error::{Result, TrustError};
use crate::fmt::{money, round_cents};
use crate::ledger;
use crate::models::{BalanceRow, QuartersEntry};
use crate::pos::SalesLookup;
use crate::snapshot::SnapshotStore;

/// How far back to look for a chain predecessor before starting everyone
/// at zero.
const MAX_LOOKBACK_DAYS: i64 = 31;

#[derive(Debug)]
pub struct BuildOutcome {
    pub rows: Vec<BalanceRow>,
    pub carried_from: Option<NaiveDate>,
    pub new_clients: Vec<String>,
    /// Clients on the predecessor list who are no longer on the roster,
    /// with the balance they left behind.
    pub leavers: Vec<(String, f64)>,
    pub advisories: Vec<String>,
}

/// Build and write the store list for `today`.
///
/// Starting balances chain from the predecessor list's final balances.
/// `applied_ledger` carries over only when the predecessor belongs to the
/// same cycle; a new cycle starts every anchor weekday and resets it,
/// which is what re-enables the weekly replenishment.
pub fn build_store_list(
    conn: &Connection,
    store: &SnapshotStore,
    pos: &dyn SalesLookup,
    quarters: &[QuartersEntry],
    today: NaiveDate,
    anchor: Weekday,
    force: bool,
) -> Result<BuildOutcome> {
    if store.exists(today) && !force {
        return Err(TrustError::StoreListExists(today));
    }

    let roster = ledger::active_clients(conn)?;
    let yesterday = today - Duration::days(1);
    let prior = store.latest_on_or_before(yesterday, MAX_LOOKBACK_DAYS)?;
    let (prior_date, prior_rows) = match &prior {
        Some((d, rows)) => (Some(*d), rows.as_slice()),
        None => (None, &[][..]),
    };

    if let Some(d) = prior_date {
        if d != yesterday {
            log::warn!("no store list for {yesterday}; carrying balances from {d}");
        }
    }

    let today_cycle = cycle::cycle_start(today, anchor);
    let same_cycle = prior_date.is_some_and(|d| cycle::cycle_start(d, anchor) == today_cycle);

    // Sales window: the predecessor list already counted everything before
    // its own date, so this one picks up from there. With no predecessor
    // the window falls back to the current reconciliation week.
    let window_start = match prior_date {
        Some(d) => {
            if d < today_cycle && d != yesterday {
                log::warn!("predecessor list {d} is from a previous cycle");
            }
            d
        }
        None => cycle::week_for(today, anchor).anchor,
    };
    let window_end = yesterday;

    let mut outcome = BuildOutcome {
        rows: Vec::with_capacity(roster.len()),
        carried_from: prior_date,
        new_clients: Vec::new(),
        leavers: Vec::new(),
        advisories: Vec::new(),
    };

    for client in &roster {
        let prior_row = prior_rows.iter().find(|r| r.client_id == client.id);
        let mut row = match prior_row {
            Some(p) => {
                let mut r = BalanceRow::new(
                    client.id,
                    &client.last_name,
                    &client.first_name,
                    p.final_balance,
                );
                if same_cycle {
                    r.applied_ledger = p.applied_ledger;
                }
                r
            }
            None => {
                outcome.new_clients.push(client.display_name());
                BalanceRow::new(client.id, &client.last_name, &client.first_name, 0.0)
            }
        };

        if window_start <= window_end {
            match pos.find_customer(&client.first_name, &client.last_name) {
                Ok(Some(customer)) => {
                    let from = window_start.and_hms_opt(0, 0, 0).unwrap();
                    let to = window_end.and_hms_opt(23, 59, 59).unwrap();
                    let sales = pos.get_sales(&customer, from, to)?;
                    let total: f64 = sales.iter().map(|s| s.payment.total_payed_amount).sum();
                    row.spent_at_store = round_cents(total);
                }
                // Not registered with the store; nothing spent.
                Ok(None) => {}
                Err(TrustError::Pos(msg)) => {
                    outcome
                        .advisories
                        .push(format!("{}: {msg}", client.display_name()));
                }
                Err(e) => return Err(e),
            }
        }

        row.recompute_final();
        outcome.rows.push(row);
    }

    merge_quarters(&mut outcome.rows, quarters, &mut outcome.advisories);

    let roster_ids: HashSet<i64> = roster.iter().map(|c| c.id).collect();
    outcome.leavers = prior_rows
        .iter()
        .filter(|r| !roster_ids.contains(&r.client_id))
        .map(|r| (r.display_name(), r.final_balance))
        .collect();

    store.write(today, &outcome.rows)?;
    Ok(outcome)
}

/// Apply the quarters feed to matching rows. An entry that matches nobody,
/// or more than one person, is reported rather than dropped or guessed.
fn merge_quarters(rows: &mut [BalanceRow], quarters: &[QuartersEntry], advisories: &mut Vec<String>) {
    for q in quarters {
        let mut matched: Vec<&mut BalanceRow> = rows
            .iter_mut()
            .filter(|r| {
                r.first_name.eq_ignore_ascii_case(&q.first_name)
                    && r.last_name.eq_ignore_ascii_case(&q.last_name)
            })
            .collect();
        match matched.len() {
            1 => {
                let row = &mut matched[0];
                row.quarters = round_cents(row.quarters + q.amount);
                row.recompute_final();
            }
            0 => advisories.push(format!(
                "Quarters entry of {} for {} {} matches nobody on today's list.",
                money(q.amount),
                q.first_name,
                q.last_name
            )),
            _ => advisories.push(format!(
                "Quarters entry for {} {} is ambiguous; not applied.",
                q.first_name, q.last_name
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use crate::pos::{MemoryDirectory, Payment, Sale};

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

    fn sale(customer_id: &str, time: &str, amount: f64) -> Sale {
        Sale {
            customer_id: customer_id.to_string(),
            time: time.parse().unwrap(),
            products: Vec::new(),
            payment: Payment { total_payed_amount: amount },
        }
    }

    // 2026-08-06 is a Thursday; the default anchor in these tests.

    #[test]
    fn test_first_list_starts_everyone_at_zero() {
        let (_dir, conn, store) = setup();
        ledger::add_client(&conn, "Ada", "Lovelace", ledger::PHASE_ACTIVE, None).unwrap();
        ledger::add_client(&conn, "Grace", "Hopper", ledger::PHASE_ACTIVE, None).unwrap();

        let pos = MemoryDirectory::default();
        let outcome =
            build_store_list(&conn, &store, &pos, &[], date("2026-08-07"), Weekday::Thu, false)
                .unwrap();

        assert_eq!(outcome.rows.len(), 2);
        assert!(outcome.rows.iter().all(|r| r.final_balance == 0.0));
        assert_eq!(outcome.new_clients.len(), 2);
        assert!(outcome.carried_from.is_none());
        assert!(store.read(date("2026-08-07")).unwrap().is_some());
    }

    #[test]
    fn test_starting_balance_chains_from_prior_final() {
        let (_dir, conn, store) = setup();
        let id = ledger::add_client(&conn, "Ada", "Lovelace", ledger::PHASE_ACTIVE, None).unwrap();

        let mut prior = BalanceRow::new(id, "Lovelace", "Ada", 60.0);
        prior.spent_at_store = 10.0;
        prior.recompute_final(); // 50.00
        store.write(date("2026-08-07"), &[prior]).unwrap();

        let pos = MemoryDirectory::default();
        let outcome =
            build_store_list(&conn, &store, &pos, &[], date("2026-08-08"), Weekday::Thu, false)
                .unwrap();

        assert_eq!(outcome.carried_from, Some(date("2026-08-07")));
        assert_eq!(outcome.rows[0].starting_balance, 50.0);
        assert_eq!(outcome.rows[0].final_balance, 50.0);
        assert_eq!(outcome.rows[0].top_up, 0.0);
    }

    #[test]
    fn test_applied_ledger_carries_within_cycle_and_resets_across() {
        let (_dir, conn, store) = setup();
        let id = ledger::add_client(&conn, "Ada", "Lovelace", ledger::PHASE_ACTIVE, None).unwrap();

        let mut prior = BalanceRow::new(id, "Lovelace", "Ada", 80.0);
        prior.top_up = 20.0;
        prior.applied_ledger = 20.0;
        prior.recompute_final();
        // Friday list, same cycle as the following Monday.
        store.write(date("2026-08-07"), &[prior.clone()]).unwrap();

        let pos = MemoryDirectory::default();
        let outcome =
            build_store_list(&conn, &store, &pos, &[], date("2026-08-10"), Weekday::Thu, false)
                .unwrap();
        assert_eq!(outcome.rows[0].applied_ledger, 20.0);

        // Wednesday list carried into Thursday: new cycle, counter resets.
        store.write(date("2026-08-12"), &[prior]).unwrap();
        let outcome =
            build_store_list(&conn, &store, &pos, &[], date("2026-08-13"), Weekday::Thu, false)
                .unwrap();
        assert_eq!(outcome.rows[0].applied_ledger, 0.0);
    }

    #[test]
    fn test_pos_sales_land_in_spent_at_store() {
        let (_dir, conn, store) = setup();
        let id = ledger::add_client(&conn, "Ada", "Lovelace", ledger::PHASE_ACTIVE, None).unwrap();
        store
            .write(date("2026-08-07"), &[BalanceRow::new(id, "Lovelace", "Ada", 50.0)])
            .unwrap();

        let mut pos = MemoryDirectory::default();
        let customer = pos.create_customer("Ada", "Lovelace").unwrap();
        // Predecessor date and the day after are in the window...
        pos.add_sale(sale(&customer, "2026-08-07T15:00:00", 4.25));
        pos.add_sale(sale(&customer, "2026-08-09T11:00:00", 3.00));
        // ...the build day itself is not.
        pos.add_sale(sale(&customer, "2026-08-10T09:00:00", 50.0));

        let outcome =
            build_store_list(&conn, &store, &pos, &[], date("2026-08-10"), Weekday::Thu, false)
                .unwrap();
        assert_eq!(outcome.rows[0].spent_at_store, 7.25);
        assert_eq!(outcome.rows[0].final_balance, 42.75);
    }

    #[test]
    fn test_client_without_pos_customer_spends_nothing() {
        let (_dir, conn, store) = setup();
        let id = ledger::add_client(&conn, "Ada", "Lovelace", ledger::PHASE_ACTIVE, None).unwrap();
        store
            .write(date("2026-08-07"), &[BalanceRow::new(id, "Lovelace", "Ada", 50.0)])
            .unwrap();

        let pos = MemoryDirectory::default();
        let outcome =
            build_store_list(&conn, &store, &pos, &[], date("2026-08-08"), Weekday::Thu, false)
                .unwrap();
        assert_eq!(outcome.rows[0].spent_at_store, 0.0);
        assert!(outcome.advisories.is_empty());
    }

    #[test]
    fn test_quarters_merge_and_orphans() {
        let (_dir, conn, store) = setup();
        ledger::add_client(&conn, "Ada", "Lovelace", ledger::PHASE_ACTIVE, None).unwrap();

        let quarters = vec![
            QuartersEntry { first_name: "Ada".into(), last_name: "Lovelace".into(), amount: 1.75 },
            QuartersEntry { first_name: "Kurt".into(), last_name: "Godel".into(), amount: 0.50 },
        ];
        let pos = MemoryDirectory::default();
        let outcome =
            build_store_list(&conn, &store, &pos, &quarters, date("2026-08-07"), Weekday::Thu, false)
                .unwrap();

        assert_eq!(outcome.rows[0].quarters, 1.75);
        assert_eq!(outcome.rows[0].final_balance, -1.75);
        assert_eq!(outcome.advisories.len(), 1);
        assert!(outcome.advisories[0].contains("Kurt Godel"));
    }

    #[test]
    fn test_leavers_are_reported_with_their_balance() {
        let (_dir, conn, store) = setup();
        let staying = ledger::add_client(&conn, "Ada", "Lovelace", ledger::PHASE_ACTIVE, None).unwrap();
        // Client 99 was on yesterday's list but is not on the roster.
        let prior = vec![
            BalanceRow::new(staying, "Lovelace", "Ada", 10.0),
            BalanceRow::new(99, "Turing", "Alan", 33.5),
        ];
        store.write(date("2026-08-07"), &prior).unwrap();

        let pos = MemoryDirectory::default();
        let outcome =
            build_store_list(&conn, &store, &pos, &[], date("2026-08-08"), Weekday::Thu, false)
                .unwrap();

        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.leavers, vec![("Turing, Alan".to_string(), 33.5)]);
    }

    #[test]
    fn test_existing_list_needs_force() {
        let (_dir, conn, store) = setup();
        ledger::add_client(&conn, "Ada", "Lovelace", ledger::PHASE_ACTIVE, None).unwrap();
        let pos = MemoryDirectory::default();

        build_store_list(&conn, &store, &pos, &[], date("2026-08-07"), Weekday::Thu, false).unwrap();
        let err =
            build_store_list(&conn, &store, &pos, &[], date("2026-08-07"), Weekday::Thu, false)
                .unwrap_err();
        assert!(matches!(err, TrustError::StoreListExists(_)));

        build_store_list(&conn, &store, &pos, &[], date("2026-08-07"), Weekday::Thu, true).unwrap();
    }
}
