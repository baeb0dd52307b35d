use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::{Config, ConfigError};
use crate::models::*;
use crate::prediction::{CycleInsight, Predictor, ValidationError};
use crate::pregnancy;
use crate::storage::{LogStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid date {0:?}, expected yyyy-MM-dd")]
    InvalidDate(String),
    #[error("invalid timestamp {0:?}, expected RFC 3339")]
    InvalidTimestamp(String),
    #[error("end {end} is before start {start}")]
    InvalidRange { start: String, end: String },
    #[error("cannot log a period for a future date ({0})")]
    FutureDate(String),
    #[error("duration must be between 1 and 10 days, got {0}")]
    InvalidDuration(u32),
    #[error("vault already exists")]
    AlreadyInitialized,
    #[error("no passphrase given, pass --passphrase or set CYCLECAST_PASSPHRASE")]
    Locked,
}

pub const MIN_DURATION_DAYS: u32 = 1;
pub const MAX_DURATION_DAYS: u32 = 10;

pub fn parse_date_arg(value: &str) -> Result<NaiveDate, CommandError> {
    parse_date(value).ok_or_else(|| CommandError::InvalidDate(value.to_string()))
}

pub fn parse_timestamp_arg(value: &str) -> Result<DateTime<Utc>, CommandError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| CommandError::InvalidTimestamp(value.to_string()))
}

/// One unlocked session over a store: every command loads, acts, and saves.
pub struct App<S: LogStore, C: Clock> {
    store: S,
    predictor: Predictor<C>,
}

impl<S: LogStore, C: Clock> App<S, C> {
    pub fn new(store: S, config: &Config, clock: C) -> Self {
        Self {
            store,
            predictor: Predictor::new(config.date_policy(), clock),
        }
    }

    pub fn init(&self) -> Result<(), CommandError> {
        if self.store.exists()? {
            return Err(CommandError::AlreadyInitialized);
        }
        self.store.save(&AppData::default())?;
        info!("vault initialised");
        Ok(())
    }

    fn update<T>(
        &self,
        apply: impl FnOnce(&mut AppData) -> Result<T, CommandError>,
    ) -> Result<T, CommandError> {
        let mut data = self.store.load()?;
        let result = apply(&mut data)?;
        self.store.save(&data)?;
        Ok(result)
    }

    /// Log a period start. Future dates and out-of-range durations are refused.
    pub fn log_start(
        &self,
        date: NaiveDate,
        details: PeriodDetails,
    ) -> Result<PeriodLog, CommandError> {
        if date > self.predictor.today() {
            return Err(CommandError::FutureDate(date.format(DATE_FORMAT).to_string()));
        }
        if let Some(days) = details.duration_days {
            if !(MIN_DURATION_DAYS..=MAX_DURATION_DAYS).contains(&days) {
                return Err(CommandError::InvalidDuration(days));
            }
        }
        self.update(|data| Ok(data.log_period_start(date, details)?.clone()))
    }

    pub fn log_end(&self, start: NaiveDate, end: NaiveDate) -> Result<PeriodLog, CommandError> {
        if end < start {
            return Err(CommandError::InvalidRange {
                start: start.format(DATE_FORMAT).to_string(),
                end: end.format(DATE_FORMAT).to_string(),
            });
        }
        self.update(|data| Ok(data.log_period_end(start, end).clone()))
    }

    pub fn remove_log(&self, id: Uuid) -> Result<PeriodLog, CommandError> {
        self.update(|data| Ok(data.remove_log(id)?))
    }

    pub fn list_logs(&self) -> Result<Vec<PeriodLog>, CommandError> {
        let data = self.store.load()?;
        Ok(data
            .period_logs_newest_first()
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn add_contraction(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ContractionLog, CommandError> {
        if end < start {
            return Err(CommandError::InvalidRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        self.update(|data| Ok(data.log_contraction(ContractionLog::new(start, end)).clone()))
    }

    pub fn contraction_summary(&self) -> Result<Option<ContractionSummary>, CommandError> {
        Ok(pregnancy::contraction_summary(&self.store.load()?.contractions))
    }

    pub fn add_kick_session(
        &self,
        timestamp: DateTime<Utc>,
        kick_count: u32,
    ) -> Result<KickSession, CommandError> {
        let session = KickSession::new(timestamp, kick_count);
        self.update(|data| Ok(data.log_kick_session(session).clone()))
    }

    pub fn kick_summary(&self) -> Result<Option<KickSummary>, CommandError> {
        Ok(pregnancy::kick_summary(&self.store.load()?.kick_sessions))
    }

    pub fn predict(&self) -> Result<CyclePrediction, CommandError> {
        let data = self.store.load()?;
        Ok(self.predictor.predict_next(&data.period_logs)?)
    }

    pub fn insights(&self) -> Result<Vec<CycleInsight>, CommandError> {
        let data = self.store.load()?;
        Ok(self.predictor.insights(&data.period_logs)?)
    }

    pub fn summary(&self) -> Result<CycleSummary, CommandError> {
        let data = self.store.load()?;
        Ok(self.predictor.summary(&data.period_logs)?)
    }

    /// Whole vault as pretty JSON.
    pub fn export(&self) -> Result<String, CommandError> {
        Ok(serde_json::to_string_pretty(&self.store.load()?)?)
    }

    pub fn wipe(&self) -> Result<(), CommandError> {
        Ok(self.store.wipe()?)
    }
}
