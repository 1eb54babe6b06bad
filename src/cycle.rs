use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// One reconciliation week: the anchor day that opened it and the snapshot
/// dates to inspect, anchor through yesterday.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationWeek {
    pub anchor: NaiveDate,
    pub dates: Vec<NaiveDate>,
}

/// Most recent `anchor` weekday on or before `date`; `date` itself counts.
/// This is the cycle a given store list belongs to.
pub fn cycle_start(date: NaiveDate, anchor: Weekday) -> NaiveDate {
    let back =
        (7 + date.weekday().num_days_from_monday() - anchor.num_days_from_monday()) % 7;
    date - Duration::days(i64::from(back))
}

/// The week under reconciliation as of `today`. When today is itself the
/// anchor weekday, the cycle that opened today has not accumulated
/// anything yet, so the anchor moves seven days back.
pub fn week_for(today: NaiveDate, anchor: Weekday) -> ReconciliationWeek {
    let anchor_date = if today.weekday() == anchor {
        today - Duration::days(7)
    } else {
        cycle_start(today, anchor)
    };

    let mut dates = Vec::new();
    let mut d = anchor_date;
    while d < today {
        dates.push(d);
        d += Duration::days(1);
    }

    ReconciliationWeek { anchor: anchor_date, dates }
}
