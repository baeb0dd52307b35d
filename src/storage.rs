use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use tracing::{info, warn};
use uuid::Uuid;
use zeroize::{Zeroize, Zeroizing};

use crate::crypto;
use crate::models::{AppData, ContractionLog, KickSession, PeriodDetails, PeriodLog, DATE_FORMAT};

const VAULT_FILE: &str = "data.cyclecast";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("data directory not found")]
    NoDataDir,
    #[error("no vault found, run `cyclecast init` first")]
    NotInitialized,
    #[error("a period entry already exists for {0}")]
    DuplicateEntry(String),
    #[error("no record with id {0}")]
    UnknownRecord(Uuid),
}

/// Where the app keeps its logs.
pub trait LogStore {
    fn exists(&self) -> Result<bool, StorageError>;
    fn load(&self) -> Result<AppData, StorageError>;
    fn save(&self, data: &AppData) -> Result<(), StorageError>;
    fn wipe(&self) -> Result<(), StorageError>;
}

/// Default vault directory: `<local data dir>/cyclecast`.
pub fn default_data_dir() -> Result<PathBuf, StorageError> {
    Ok(dirs::data_local_dir()
        .ok_or(StorageError::NoDataDir)?
        .join("cyclecast"))
}

/// Single-file vault holding all of `AppData`, sealed with the passphrase.
pub struct EncryptedFileStore {
    path: PathBuf,
    passphrase: Zeroizing<String>,
}

impl EncryptedFileStore {
    pub fn new(dir: impl AsRef<Path>, passphrase: String) -> Self {
        Self {
            path: dir.as_ref().join(VAULT_FILE),
            passphrase: Zeroizing::new(passphrase),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogStore for EncryptedFileStore {
    fn exists(&self) -> Result<bool, StorageError> {
        Ok(self.path.exists())
    }

    fn load(&self) -> Result<AppData, StorageError> {
        if !self.path.exists() {
            return Err(StorageError::NotInitialized);
        }
        let vault = fs::read(&self.path)?;
        let mut json = crypto::open(&self.passphrase, &vault).inspect_err(|e| {
            warn!(path = %self.path.display(), error = %e, "could not open vault");
        })?;
        let data: Result<AppData, _> = serde_json::from_slice(&json);
        json.zeroize();
        Ok(data?)
    }

    fn save(&self, data: &AppData) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = Zeroizing::new(serde_json::to_vec(data)?);
        let vault = crypto::seal(&self.passphrase, &json)?;
        fs::write(&self.path, vault)?;
        info!(
            path = %self.path.display(),
            period_logs = data.period_logs.len(),
            contractions = data.contractions.len(),
            "vault saved"
        );
        Ok(())
    }

    fn wipe(&self) -> Result<(), StorageError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            info!(path = %self.path.display(), "vault wiped");
        }
        Ok(())
    }
}

/// In-process store, used by tests and embedders that persist elsewhere.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<Option<AppData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: AppData) -> Self {
        Self {
            data: Mutex::new(Some(data)),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<AppData>> {
        // A poisoned slot still holds consistent data; writes are whole-value swaps.
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LogStore for MemoryStore {
    fn exists(&self) -> Result<bool, StorageError> {
        Ok(self.slot().is_some())
    }

    fn load(&self) -> Result<AppData, StorageError> {
        self.slot().clone().ok_or(StorageError::NotInitialized)
    }

    fn save(&self, data: &AppData) -> Result<(), StorageError> {
        *self.slot() = Some(data.clone());
        Ok(())
    }

    fn wipe(&self) -> Result<(), StorageError> {
        *self.slot() = None;
        Ok(())
    }
}

impl AppData {
    /// Record a new period start. Only one start may exist per date.
    pub fn log_period_start(
        &mut self,
        date: NaiveDate,
        details: PeriodDetails,
    ) -> Result<&PeriodLog, StorageError> {
        let formatted = date.format(DATE_FORMAT).to_string();
        let taken = self
            .period_logs
            .iter()
            .any(|log| log.is_start() && log.parsed_start() == Some(date));
        if taken {
            return Err(StorageError::DuplicateEntry(formatted));
        }
        self.period_logs.push(PeriodLog::start(date).with_details(details));
        Ok(&self.period_logs[self.period_logs.len() - 1])
    }

    pub fn log_period_end(&mut self, start: NaiveDate, end: NaiveDate) -> &PeriodLog {
        self.period_logs.push(PeriodLog::end(start, end));
        &self.period_logs[self.period_logs.len() - 1]
    }

    pub fn remove_log(&mut self, id: Uuid) -> Result<PeriodLog, StorageError> {
        let index = self
            .period_logs
            .iter()
            .position(|log| log.id == id)
            .ok_or(StorageError::UnknownRecord(id))?;
        Ok(self.period_logs.remove(index))
    }

    pub fn log_contraction(&mut self, contraction: ContractionLog) -> &ContractionLog {
        self.contractions.push(contraction);
        &self.contractions[self.contractions.len() - 1]
    }

    pub fn log_kick_session(&mut self, session: KickSession) -> &KickSession {
        self.kick_sessions.push(session);
        &self.kick_sessions[self.kick_sessions.len() - 1]
    }

    /// Period logs, most recent start first, the order the store is queried in.
    pub fn period_logs_newest_first(&self) -> Vec<&PeriodLog> {
        let mut logs: Vec<&PeriodLog> = self.period_logs.iter().collect();
        logs.sort_by(|a, b| b.parsed_start().cmp(&a.parsed_start()));
        logs
    }
}
