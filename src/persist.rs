//! # Config Persistence
//!
//! Saving policy for the config store. Edits apply to the in-memory store at
//! once; saving is debounced so a burst of edits produces one write, and a
//! failed write is retried with exponential backoff. The pending snapshot is
//! never dropped: only a newer snapshot replaces it.
//!
//! The storage itself sits behind [`ConfigSink`]. Time is passed in by the
//! caller, so the policy has no clock or thread of its own.

use std::time::{Duration, Instant};

use crate::config::{storage_key, ConfigStore};
use crate::error::PersistError;

/// Where persisted config records live.
pub trait ConfigSink {
    fn load(&self, key: &str) -> Result<Option<String>, PersistError>;
    fn save(&mut self, key: &str, payload: &str) -> Result<(), PersistError>;
}

/// Load a store through a sink, falling back to defaults on any failure.
pub fn load_store<S: ConfigSink + ?Sized>(
    sink: &S,
    project_id: &str,
    period_id: &str,
) -> ConfigStore {
    let key = storage_key(project_id, period_id);
    match sink.load(&key) {
        Ok(record) => ConfigStore::load_or_default(record.as_deref(), project_id, period_id),
        Err(e) => {
            log::warn!("could not load '{}', using defaults: {}", key, e);
            ConfigStore::load_or_default(None, project_id, period_id)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SaverPolicy {
    /// Quiet period after the last edit before saving.
    pub debounce: Duration,
    pub base_retry: Duration,
    pub max_retry: Duration,
}

impl Default for SaverPolicy {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            base_retry: Duration::from_secs(1),
            max_retry: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveStatus {
    Idle,
    /// A snapshot is waiting for the debounce window to close.
    Pending { due: Instant },
    Saved,
    Retrying {
        attempt: u32,
        next_attempt: Instant,
        last_error: PersistError,
    },
}

struct PendingSave {
    key: String,
    payload: String,
    due: Instant,
}

pub struct DebouncedSaver {
    policy: SaverPolicy,
    pending: Option<PendingSave>,
    failures: u32,
    status: SaveStatus,
}

impl DebouncedSaver {
    pub fn new(policy: SaverPolicy) -> Self {
        Self {
            policy,
            pending: None,
            failures: 0,
            status: SaveStatus::Idle,
        }
    }

    pub fn status(&self) -> &SaveStatus {
        &self.status
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Queue a snapshot of `store`, replacing any unsaved one.
    pub fn schedule(&mut self, store: &ConfigStore, now: Instant) -> Result<(), serde_json::Error> {
        let payload = store.to_json()?;
        let due = now + self.policy.debounce;
        self.pending = Some(PendingSave {
            key: store.storage_key(),
            payload,
            due,
        });
        self.failures = 0;
        self.status = SaveStatus::Pending { due };
        Ok(())
    }

    /// Save the pending snapshot if it is due.
    pub fn poll<S: ConfigSink + ?Sized>(&mut self, now: Instant, sink: &mut S) -> &SaveStatus {
        let Some(pending) = self.pending.as_mut() else {
            return &self.status;
        };
        if now < pending.due {
            return &self.status;
        }

        match sink.save(&pending.key, &pending.payload) {
            Ok(()) => {
                log::debug!("saved config '{}'", pending.key);
                self.pending = None;
                self.failures = 0;
                self.status = SaveStatus::Saved;
            }
            Err(e) => {
                self.failures += 1;
                let delay = backoff(&self.policy, self.failures);
                pending.due = now + delay;
                log::warn!(
                    "saving '{}' failed (attempt {}), retrying in {:?}: {}",
                    pending.key,
                    self.failures,
                    delay,
                    e
                );
                self.status = SaveStatus::Retrying {
                    attempt: self.failures,
                    next_attempt: pending.due,
                    last_error: e,
                };
            }
        }
        &self.status
    }
}

/// Delay before retry number `failures`: the base delay doubled per
/// failure, capped.
fn backoff(policy: &SaverPolicy, failures: u32) -> Duration {
    let factor = 1u32.checked_shl(failures.saturating_sub(1)).unwrap_or(u32::MAX);
    policy
        .base_retry
        .checked_mul(factor)
        .map_or(policy.max_retry, |d| d.min(policy.max_retry))
}

impl Default for DebouncedSaver {
    fn default() -> Self {
        Self::new(SaverPolicy::default())
    }
}
