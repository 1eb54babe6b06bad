use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrustError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("Unknown client: {0}")]
    UnknownClient(String),

    #[error("Ambiguous client name: more than one active client is named {0}")]
    AmbiguousClient(String),

    #[error("No store list found for {0}. Run `trustbook store generate` first.")]
    MissingStoreList(chrono::NaiveDate),

    #[error("Store list for {0} already exists. Pass --force to rebuild it.")]
    StoreListExists(chrono::NaiveDate),

    #[error("The store list for {0} is not the newest; lists later days chain from are read-only.")]
    HistoricalStoreList(chrono::NaiveDate),

    #[error("Point-of-sale directory error: {0}")]
    Pos(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TrustError>;
