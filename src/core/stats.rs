//! Session activity counters.
//!
//! Tracks what the session did (polls, accepted and discarded fields, fused
//! samples, engine skips) so the binary can report it and keep running
//! totals across runs.

use crate::core::scheduler::Acquisition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

#[derive(Debug)]
pub struct SessionLog {
    polls: AtomicU64,
    fields_accepted: AtomicU64,
    fields_discarded: AtomicU64,
    raw_samples: AtomicU64,
    fused_samples: AtomicU64,
    gas_index_misses: AtomicU64,
    truncated_batches: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self {
            polls: AtomicU64::new(0),
            fields_accepted: AtomicU64::new(0),
            fields_discarded: AtomicU64::new(0),
            raw_samples: AtomicU64::new(0),
            fused_samples: AtomicU64::new(0),
            gas_index_misses: AtomicU64::new(0),
            truncated_batches: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that starts from the totals stored at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            warn!(error = %e, "could not load previous session stats");
        }

        log
    }

    /// Fold one acquisition's counters in.
    pub fn record_acquisition(&self, run: &Acquisition) {
        self.polls.fetch_add(u64::from(run.polls), Ordering::Relaxed);
        self.fields_accepted
            .fetch_add(u64::from(run.accepted), Ordering::Relaxed);
        self.fields_discarded
            .fetch_add(u64::from(run.discarded), Ordering::Relaxed);
        if run.truncated {
            self.truncated_batches.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_raw_samples(&self, count: u64) {
        self.raw_samples.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_fused_sample(&self) {
        self.fused_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gas_index_miss(&self) {
        self.gas_index_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            polls: self.polls.load(Ordering::Relaxed),
            fields_accepted: self.fields_accepted.load(Ordering::Relaxed),
            fields_discarded: self.fields_discarded.load(Ordering::Relaxed),
            raw_samples: self.raw_samples.load(Ordering::Relaxed),
            fused_samples: self.fused_samples.load(Ordering::Relaxed),
            gas_index_misses: self.gas_index_misses.load(Ordering::Relaxed),
            truncated_batches: self.truncated_batches.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Add another log's counters to this one.
    pub fn absorb(&self, other: &SessionStats) {
        self.polls.fetch_add(other.polls, Ordering::Relaxed);
        self.fields_accepted
            .fetch_add(other.fields_accepted, Ordering::Relaxed);
        self.fields_discarded
            .fetch_add(other.fields_discarded, Ordering::Relaxed);
        self.raw_samples
            .fetch_add(other.raw_samples, Ordering::Relaxed);
        self.fused_samples
            .fetch_add(other.fused_samples, Ordering::Relaxed);
        self.gas_index_misses
            .fetch_add(other.gas_index_misses, Ordering::Relaxed);
        self.truncated_batches
            .fetch_add(other.truncated_batches, Ordering::Relaxed);
    }

    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Device polls: {}\n\
             - Fields accepted: {}\n\
             - Fields discarded (stale or gas-invalid): {}\n\
             - Raw samples returned: {}\n\
             - Fused samples returned: {}\n\
             - Gas index misses: {}\n\
             - Batches cut short by the poll limit: {}\n\
             - Session duration: {} seconds",
            stats.polls,
            stats.fields_accepted,
            stats.fields_discarded,
            stats.raw_samples,
            stats.fused_samples,
            stats.gas_index_misses,
            stats.truncated_batches,
            stats.session_duration_secs
        )
    }

    /// Save totals to the persistence path, if any.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            save_stats(path, &self.stats())?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;
                self.absorb(&persisted.into_stats(self.session_start));
            }
        }
        Ok(())
    }
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of session counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub polls: u64,
    pub fields_accepted: u64,
    pub fields_discarded: u64,
    pub raw_samples: u64,
    pub fused_samples: u64,
    pub gas_index_misses: u64,
    pub truncated_batches: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    polls: u64,
    fields_accepted: u64,
    fields_discarded: u64,
    raw_samples: u64,
    fused_samples: u64,
    gas_index_misses: u64,
    #[serde(default)]
    truncated_batches: u64,
    last_updated: DateTime<Utc>,
}

impl PersistedStats {
    fn into_stats(self, session_start: DateTime<Utc>) -> SessionStats {
        SessionStats {
            polls: self.polls,
            fields_accepted: self.fields_accepted,
            fields_discarded: self.fields_discarded,
            raw_samples: self.raw_samples,
            fused_samples: self.fused_samples,
            gas_index_misses: self.gas_index_misses,
            truncated_batches: self.truncated_batches,
            session_start,
            session_duration_secs: 0,
        }
    }
}

fn save_stats(path: &Path, stats: &SessionStats) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let persisted = PersistedStats {
        polls: stats.polls,
        fields_accepted: stats.fields_accepted,
        fields_discarded: stats.fields_discarded,
        raw_samples: stats.raw_samples,
        fused_samples: stats.fused_samples,
        gas_index_misses: stats.gas_index_misses,
        truncated_batches: stats.truncated_batches,
        last_updated: Utc::now(),
    };
    let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquisition_counting() {
        let log = SessionLog::new();
        log.record_acquisition(&Acquisition {
            polls: 3,
            received: 4,
            accepted: 2,
            discarded: 2,
            counted: 2,
            truncated: true,
        });
        log.record_fused_sample();
        log.record_gas_index_miss();

        let stats = log.stats();
        assert_eq!(stats.polls, 3);
        assert_eq!(stats.fields_accepted, 2);
        assert_eq!(stats.fields_discarded, 2);
        assert_eq!(stats.truncated_batches, 1);
        assert_eq!(stats.fused_samples, 1);
        assert_eq!(stats.gas_index_misses, 1);
    }

    #[test]
    fn test_persistence_accumulates() {
        let path = std::env::temp_dir()
            .join(format!("bme69x-stats-{}", uuid::Uuid::new_v4()))
            .join("stats.json");

        let first = SessionLog::with_persistence(path.clone());
        first.record_raw_samples(5);
        first.save().unwrap();

        let second = SessionLog::with_persistence(path.clone());
        second.record_raw_samples(2);
        assert_eq!(second.stats().raw_samples, 7);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_summary_format() {
        let summary = SessionLog::new().summary();
        assert!(summary.contains("Device polls"));
        assert!(summary.contains("Gas index misses"));
    }
}
