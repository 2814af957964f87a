//! LMDB-backed cache store.
//!
//! Uses the heed crate (Rust bindings for LMDB) so several server processes
//! on one host can share overview payloads and warm-up markers through a
//! single memory-mapped file.
//!
//! # Value Format
//!
//! `[expires_at: 8 bytes LE unix millis][json value]`
//!
//! Expiry is wall-clock based because the file outlives any one process.
//! `add` reads and writes inside one write transaction; LMDB serialises
//! writers, which makes it atomic across processes.

use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use academy_core::CacheError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RwTxn};
use serde_json::Value;

use super::traits::{CacheStats, CacheStore};
use crate::clock::{Clock, SystemClock};

/// Error type for LMDB store setup.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for CacheError {
    fn from(e: LmdbCacheError) -> Self {
        CacheError::unavailable(e.to_string())
    }
}

fn txn_error(e: heed::Error) -> CacheError {
    CacheError::unavailable(format!("LMDB transaction error: {}", e))
}

/// LMDB-backed [`CacheStore`].
pub struct LmdbCacheStore {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Bytes>,
    clock: Arc<dyn Clock>,
    stats: Arc<RwLock<CacheStats>>,
}

impl std::fmt::Debug for LmdbCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbCacheStore")
            .field("path", &self.env.path())
            .finish_non_exhaustive()
    }
}

impl LmdbCacheStore {
    /// Open (or create) a store under `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        Self::with_clock(path, max_size_mb, Arc::new(SystemClock))
    }

    pub fn with_clock<P: AsRef<Path>>(
        path: P,
        max_size_mb: usize,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per store and the backing
        // file is only ever mapped through heed.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(Self {
            env,
            db,
            clock,
            stats: Arc::new(RwLock::new(CacheStats::default())),
        })
    }

    fn encode(&self, key: &str, value: &Value, ttl: Duration) -> Result<Vec<u8>, CacheError> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        let expires_at = (self.clock.now_utc() + ttl).timestamp_millis();
        let value_bytes = serde_json::to_vec(value).map_err(|e| CacheError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        let mut full_bytes = Vec::with_capacity(8 + value_bytes.len());
        full_bytes.extend_from_slice(&expires_at.to_le_bytes());
        full_bytes.extend_from_slice(&value_bytes);
        Ok(full_bytes)
    }

    fn expires_at(bytes: &[u8]) -> Option<DateTime<Utc>> {
        let stamp: [u8; 8] = bytes.get(0..8)?.try_into().ok()?;
        DateTime::from_timestamp_millis(i64::from_le_bytes(stamp))
    }

    fn is_live(&self, bytes: &[u8]) -> bool {
        Self::expires_at(bytes).is_some_and(|at| at > self.clock.now_utc())
    }

    fn put_in(&self, wtxn: &mut RwTxn<'_>, key: &str, bytes: &[u8]) -> Result<(), CacheError> {
        self.db
            .put(wtxn, key.as_bytes(), bytes)
            .map_err(txn_error)
    }

    fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        if let Ok(mut stats) = self.stats.write() {
            update(&mut stats);
        }
    }
}

#[async_trait]
impl CacheStore for LmdbCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;

        let Some(bytes) = self.db.get(&rtxn, key.as_bytes()).map_err(txn_error)? else {
            self.record(|s| s.misses += 1);
            return Ok(None);
        };

        if bytes.len() < 8 || !self.is_live(bytes) {
            self.record(|s| {
                s.misses += 1;
                s.expirations += 1;
            });
            return Ok(None);
        }

        let value: Value =
            serde_json::from_slice(&bytes[8..]).map_err(|e| CacheError::Deserialization {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        self.record(|s| s.hits += 1);
        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        let bytes = self.encode(key, value, ttl)?;

        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.put_in(&mut wtxn, key, &bytes)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(())
    }

    async fn add(&self, key: &str, value: &Value, ttl: Duration) -> Result<bool, CacheError> {
        let bytes = self.encode(key, value, ttl)?;

        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        let occupied = self
            .db
            .get(&wtxn, key.as_bytes())
            .map_err(txn_error)?
            .is_some_and(|existing| self.is_live(existing));
        if occupied {
            wtxn.abort();
            return Ok(false);
        }

        self.put_in(&mut wtxn, key, &bytes)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db
            .delete(&mut wtxn, key.as_bytes())
            .map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let entry_count = self.db.len(&rtxn).map_err(txn_error)?;
        let mut stats = self
            .stats
            .read()
            .map(|s| s.clone())
            .unwrap_or_default();
        stats.entry_count = entry_count;
        Ok(stats)
    }
}
