use std::path::PathBuf;

use crate::db::{get_connection, init_db, DB_FILE};
use crate::error::Result;
use crate::settings::{self, save_settings, Settings};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut s = Settings::default();
    if let Some(dir) = data_dir {
        s.data_dir = dir;
    }
    let data_dir = PathBuf::from(&s.data_dir);

    std::fs::create_dir_all(&data_dir)?;
    std::fs::create_dir_all(settings::store_lists_dir(&data_dir))?;
    std::fs::create_dir_all(settings::quarters_dir(&data_dir))?;

    let conn = get_connection(&data_dir.join(DB_FILE))?;
    init_db(&conn)?;
    save_settings(&s)?;

    println!("Initialized trustbook.");
    println!("Data dir:     {}", data_dir.display());
    println!("Ledger:       {}", data_dir.join(DB_FILE).display());
    println!("Store lists:  {}", settings::store_lists_dir(&data_dir).display());
    println!("Quarters:     {}", settings::quarters_dir(&data_dir).display());
    println!();
    println!("Cycle anchor: {} / ceiling {}", s.anchor_weekday, crate::fmt::money(s.store_ceiling));
    Ok(())
}
