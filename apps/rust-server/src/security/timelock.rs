// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Time-lock scheduler
//!
//! Holds high-value transactions for a fixed delay before they can be
//! released back to the caller.
//!
//! ## States
//!
//! ```text
//! Pending ──(unlock_at passes)──▶ Ready ──release──▶ Released
//!    │                              │
//!    └────────────cancel────────────┴──▶ Cancelled
//! ```
//!
//! `Released` and `Cancelled` are terminal. The sweeper drops terminal and
//! unreleased `Ready` entries once [`TERMINAL_RETENTION_SECS`] have passed
//! since unlock, so an abandoned lock does not outlive its retention.
//!
//! ## Sweeper
//!
//! [`TimeLockScheduler::run`] is spawned once at start-up and stops when its
//! `CancellationToken` fires.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use super::clock::Clock;
use crate::risk::Transaction;

/// Default hold applied to transactions above the threshold.
pub const DEFAULT_TIME_LOCK_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// How long an entry stays queryable after its unlock time. Ready entries
/// nobody released are dropped at the same point.
pub const TERMINAL_RETENTION_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimeLockStatus {
    Pending,
    Ready,
    Released,
    Cancelled,
}

impl TimeLockStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TimeLockStatus::Released | TimeLockStatus::Cancelled)
    }
}

/// Handle returned when a transaction is put on hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PendingTransaction {
    pub id: Uuid,
    /// Value in SOL that triggered the lock.
    pub value: f64,
    pub scheduled_at: DateTime<Utc>,
    pub unlock_at: DateTime<Utc>,
}

/// Current view of a held transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TimeLockEntry {
    #[serde(flatten)]
    pub pending: PendingTransaction,
    pub status: TimeLockStatus,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimeLockError {
    #[error("time-locked transaction {0} not found")]
    NotFound(Uuid),

    #[error("time-locked transaction {0} was already cancelled")]
    AlreadyCancelled(Uuid),

    #[error("time-locked transaction {0} was already released")]
    AlreadyReleased(Uuid),

    #[error("time-locked transaction {id} is locked until {unlock_at}")]
    EarlyRelease { id: Uuid, unlock_at: DateTime<Utc> },
}

#[derive(Debug, Clone)]
struct TimeLockRecord {
    pending: PendingTransaction,
    status: TimeLockStatus,
    transaction: Transaction,
}

impl TimeLockRecord {
    fn entry(&self) -> TimeLockEntry {
        TimeLockEntry {
            pending: self.pending.clone(),
            status: self.status,
        }
    }

    /// Promote `Pending` to `Ready` once the unlock time has passed.
    fn refresh(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == TimeLockStatus::Pending && now >= self.pending.unlock_at {
            self.status = TimeLockStatus::Ready;
            return true;
        }
        false
    }
}

pub struct TimeLockScheduler {
    entries: Mutex<HashMap<Uuid, TimeLockRecord>>,
    clock: Arc<dyn Clock>,
    sweep_interval: Duration,
}

impl TimeLockScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, TimeLockRecord>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hold `tx` for `delay`.
    pub fn schedule(&self, tx: Transaction, value: f64, delay: Duration) -> PendingTransaction {
        let now = self.clock.now();
        let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
        let unlock_at = now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let pending = PendingTransaction {
            id: Uuid::new_v4(),
            value,
            scheduled_at: now,
            unlock_at,
        };

        self.lock().insert(
            pending.id,
            TimeLockRecord {
                pending: pending.clone(),
                status: TimeLockStatus::Pending,
                transaction: tx,
            },
        );

        info!(id = %pending.id, value, unlock_at = %pending.unlock_at, "Transaction time-locked");
        pending
    }

    pub fn status(&self, id: Uuid) -> Result<TimeLockEntry, TimeLockError> {
        let now = self.clock.now();
        let mut entries = self.lock();
        let record = entries.get_mut(&id).ok_or(TimeLockError::NotFound(id))?;
        record.refresh(now);
        Ok(record.entry())
    }

    /// Cancel a held transaction. Nothing is ever submitted for it.
    pub fn cancel(&self, id: Uuid) -> Result<TimeLockEntry, TimeLockError> {
        let mut entries = self.lock();
        let record = entries.get_mut(&id).ok_or(TimeLockError::NotFound(id))?;
        match record.status {
            TimeLockStatus::Cancelled => Err(TimeLockError::AlreadyCancelled(id)),
            TimeLockStatus::Released => Err(TimeLockError::AlreadyReleased(id)),
            TimeLockStatus::Pending | TimeLockStatus::Ready => {
                record.status = TimeLockStatus::Cancelled;
                info!(%id, "Time-locked transaction cancelled");
                Ok(record.entry())
            }
        }
    }

    /// Hand the transaction back once its unlock time has passed.
    pub fn release(&self, id: Uuid) -> Result<(TimeLockEntry, Transaction), TimeLockError> {
        let now = self.clock.now();
        let mut entries = self.lock();
        let record = entries.get_mut(&id).ok_or(TimeLockError::NotFound(id))?;
        match record.status {
            TimeLockStatus::Cancelled => Err(TimeLockError::AlreadyCancelled(id)),
            TimeLockStatus::Released => Err(TimeLockError::AlreadyReleased(id)),
            TimeLockStatus::Pending if now < record.pending.unlock_at => {
                Err(TimeLockError::EarlyRelease {
                    id,
                    unlock_at: record.pending.unlock_at,
                })
            }
            TimeLockStatus::Pending | TimeLockStatus::Ready => {
                record.status = TimeLockStatus::Released;
                info!(%id, "Time-locked transaction released");
                Ok((record.entry(), record.transaction.clone()))
            }
        }
    }

    /// Mark due entries `Ready` and drop every entry whose retention has
    /// passed, released or not.
    ///
    /// Returns the number of entries that became ready.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let retention = chrono::Duration::seconds(TERMINAL_RETENTION_SECS);
        let mut entries = self.lock();

        let mut ready = 0;
        for record in entries.values_mut() {
            if record.refresh(now) {
                ready += 1;
            }
        }
        let before = entries.len();
        let mut abandoned = 0;
        entries.retain(|_, record| {
            if now < record.pending.unlock_at + retention {
                return true;
            }
            if record.status == TimeLockStatus::Ready {
                abandoned += 1;
            }
            false
        });
        if before != entries.len() {
            info!(
                dropped = before - entries.len(),
                abandoned, "Expired time locks pruned"
            );
        }
        ready
    }

    /// Entries not yet released or cancelled.
    pub fn pending_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|record| !record.status.is_terminal())
            .count()
    }

    /// Run the sweeper until the cancellation token fires.
    ///
    /// ```rust,ignore
    /// tokio::spawn(scheduler.clone().run(shutdown.clone()));
    /// ```
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(
            interval_secs = self.sweep_interval.as_secs(),
            "Time-lock sweeper starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Time-lock sweeper shutting down");
                return;
            }

            let ready = self.sweep();
            if ready > 0 {
                info!(ready, pending = self.pending_count(), "Time-locked transactions ready");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.sweep_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Time-lock sweeper shutting down");
                    return;
                }
            }
        }
    }
}

impl std::fmt::Debug for TimeLockScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeLockScheduler")
            .field("sweep_interval", &self.sweep_interval)
            .finish_non_exhaustive()
    }
}
