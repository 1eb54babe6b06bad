use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};

use crate::error::Result;
use crate::models::BalanceRow;

/// Directory of daily store-list files, one CSV per calendar day. A
/// missing file for a date is a recoverable "not found", never an error.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("store-list_{date}.csv"))
    }

    pub fn exists(&self, date: NaiveDate) -> bool {
        self.path_for(date).exists()
    }

    pub fn read(&self, date: NaiveDate) -> Result<Option<Vec<BalanceRow>>> {
        let path = self.path_for(date);
        if !path.exists() {
            return Ok(None);
        }
        let mut rdr = csv::Reader::from_path(&path)?;
        let mut rows = Vec::new();
        for record in rdr.deserialize() {
            rows.push(record?);
        }
        Ok(Some(rows))
    }

    /// Rows are always written in (last name, first name) ascending order;
    /// downstream roster diffs rely on that ordering. The write goes
    /// through a temp file and a rename so an aborted run leaves the
    /// previous day state intact.
    pub fn write(&self, date: NaiveDate, rows: &[BalanceRow]) -> Result<()> {
        let mut rows = rows.to_vec();
        rows.sort_by(|a, b| {
            a.last_name
                .to_lowercase()
                .cmp(&b.last_name.to_lowercase())
                .then_with(|| a.first_name.to_lowercase().cmp(&b.first_name.to_lowercase()))
        });

        let tmp = self.dir.join(format!(".store-list_{date}.csv.tmp"));
        {
            let mut wtr = csv::Writer::from_path(&tmp)?;
            for row in &rows {
                wtr.serialize(row)?;
            }
            wtr.flush()?;
        }
        std::fs::rename(&tmp, self.path_for(date))?;
        Ok(())
    }

    /// Walk back from `date` to the most recent day that has a store list,
    /// giving up after `max_back` days.
    pub fn latest_on_or_before(
        &self,
        date: NaiveDate,
        max_back: i64,
    ) -> Result<Option<(NaiveDate, Vec<BalanceRow>)>> {
        let mut d = date;
        for _ in 0..=max_back {
            if let Some(rows) = self.read(d)? {
                return Ok(Some((d, rows)));
            }
            d -= Duration::days(1);
        }
        Ok(None)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Date of the newest store list on disk, if any.
    pub fn latest_date(&self) -> Result<Option<NaiveDate>> {
        let mut latest = None;
        for entry in std::fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            let Some(stamp) = name
                .strip_prefix("store-list_")
                .and_then(|n| n.strip_suffix(".csv"))
            else {
                continue;
            };
            if let Ok(d) = stamp.parse::<NaiveDate>() {
                if latest.map_or(true, |l| d > l) {
                    latest = Some(d);
                }
            }
        }
        Ok(latest)
    }

    /// Number of store-list files on disk, for status display.
    pub fn count(&self) -> usize {
        std::fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| {
                        e.file_name()
                            .to_string_lossy()
                            .starts_with("store-list_")
                    })
                    .count()
            })
            .unwrap_or(0)
    }
}
