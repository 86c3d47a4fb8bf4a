//! Local persistence for favorites and recent transactions
//!
//! Each record is one JSON blob in the storage directory. A blob that is
//! missing or cannot be decoded reads as empty; only write failures are
//! reported to the caller.

use crate::{
    constants::MAX_STORED_TRANSACTIONS, error::StorageError, types::TransactionRecord,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

const FAVORITES_RECORD: &str = "favorites.json";
const TRANSACTIONS_RECORD: &str = "transactions.json";

/// Favorited asset ids and recent on-ramp transactions
pub struct PortfolioStore {
    dir: PathBuf,
}

impl PortfolioStore {
    /// Opens (creating if needed) a store rooted at `dir`
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Favorited asset identifiers, in the order they were added
    pub async fn favorites(&self) -> Vec<String> {
        self.read_record(FAVORITES_RECORD).await
    }

    pub async fn is_favorite(&self, id: &str) -> bool {
        self.favorites().await.iter().any(|f| f == id)
    }

    /// Adds or removes `id`, returning whether it is now a favorite
    pub async fn toggle_favorite(&self, id: &str) -> Result<bool, StorageError> {
        let mut favorites = self.favorites().await;
        let now_favorite = match favorites.iter().position(|f| f == id) {
            Some(index) => {
                favorites.remove(index);
                false
            }
            None => {
                favorites.push(id.to_string());
                true
            }
        };
        self.write_record(FAVORITES_RECORD, &favorites).await?;
        Ok(now_favorite)
    }

    /// Recent transactions, newest first
    pub async fn transactions(&self) -> Vec<TransactionRecord> {
        self.read_record(TRANSACTIONS_RECORD).await
    }

    /// Prepends `record`, keeping only the most recent entries
    pub async fn record_transaction(&self, record: TransactionRecord) -> Result<(), StorageError> {
        let mut transactions = self.transactions().await;
        transactions.insert(0, record);
        transactions.truncate(MAX_STORED_TRANSACTIONS);
        self.write_record(TRANSACTIONS_RECORD, &transactions).await
    }

    fn path(&self, record: &str) -> PathBuf {
        self.dir.join(record)
    }

    async fn read_record<T: DeserializeOwned + Default>(&self, record: &str) -> T {
        let path = self.path(record);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read stored record");
                return T::default();
            }
        };

        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Discarding unreadable stored record");
            T::default()
        })
    }

    async fn write_record<T: Serialize>(&self, record: &str, value: &T) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(value)?;
        write_atomically(&self.path(record), &bytes).await
    }
}

/// Writes via a temp file so readers never see a partial blob
async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
