//! Snapshot reconciliation.
//!
//! Folds one observed snapshot into the accumulated timeline. New identities
//! open an `active` entry; active identities missing from the snapshot are
//! closed with the observation date. Identities present in both are left
//! untouched: the first-seen description is kept.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use kouhyou_core::config::{GapWindow, PipelineConfig};
use kouhyou_core::date::format_date;
use kouhyou_core::key::{IdentityKey, KeyMode, KeyStrategy};
use kouhyou_core::record::{ChangeLogEntry, GAP_FLAG_TRUE, Status, TimelineEntry, ViolationRecord};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(
        "snapshot has {count} records, fewer than the configured minimum of {min}; \
         refusing to close entries"
    )]
    SnapshotTooSmall { count: usize, min: usize },
}

/// A non-fatal problem met while reconciling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileWarning {
    /// The entry was closed but its duration could not be computed.
    UnparseableFirstAppeared { key: IdentityKey, value: String },
    /// `first_appeared` lies after the observation date (back-filled runs).
    FirstAppearedAfterObservation { key: IdentityKey, value: String },
}

impl std::fmt::Display for ReconcileWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnparseableFirstAppeared { key, value } => {
                write!(f, "{key}: first_appeared {value:?} is not a date; duration left blank")
            }
            Self::FirstAppearedAfterObservation { key, value } => {
                write!(f, "{key}: first_appeared {value} is after the observation date")
            }
        }
    }
}

/// Result of one reconciliation run.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    pub added: usize,
    /// Entries that went from `active` to `removed` in this run.
    pub removed: usize,
    pub total_active: usize,
    pub warnings: Vec<ReconcileWarning>,
    /// Keys held by more than one `active` entry before the run.
    pub duplicate_active: Vec<IdentityKey>,
}

impl ReconcileOutcome {
    pub fn change_log_entry(&self, observed: NaiveDate) -> ChangeLogEntry {
        ChangeLogEntry {
            date: format_date(observed),
            added: self.added as u64,
            removed: self.removed as u64,
            total_active: self.total_active as u64,
        }
    }
}

/// Reconciles snapshots against a timeline using a pluggable key strategy.
#[derive(Debug, Clone)]
pub struct Reconciler<K = KeyMode> {
    keys: K,
    gap: GapWindow,
    min_snapshot_records: usize,
}

impl Reconciler<KeyMode> {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.key_mode, config.data_gap)
            .with_min_snapshot_records(config.min_snapshot_records)
    }
}

impl<K: KeyStrategy> Reconciler<K> {
    pub fn new(keys: K, gap: GapWindow) -> Self {
        Self {
            keys,
            gap,
            min_snapshot_records: 0,
        }
    }

    /// Refuse snapshots smaller than `min` (0 accepts anything, including
    /// an empty snapshot that closes every active entry).
    pub fn with_min_snapshot_records(mut self, min: usize) -> Self {
        self.min_snapshot_records = min;
        self
    }

    /// Fold `snapshot`, observed on `observed`, into `timeline` in place.
    pub fn reconcile(
        &self,
        timeline: &mut Vec<TimelineEntry>,
        snapshot: &[ViolationRecord],
        observed: NaiveDate,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        if snapshot.len() < self.min_snapshot_records {
            return Err(ReconcileError::SnapshotTooSmall {
                count: snapshot.len(),
                min: self.min_snapshot_records,
            });
        }
        if snapshot.is_empty() {
            warn!(date = %observed, "empty snapshot; every active entry will be closed");
        }

        let mut outcome = ReconcileOutcome {
            duplicate_active: self.duplicate_active(timeline),
            ..Default::default()
        };

        let existing: HashSet<IdentityKey> = timeline.iter().map(|e| self.keys.key_of(e)).collect();
        let current: HashSet<IdentityKey> = snapshot.iter().map(|r| self.keys.key_of(r)).collect();

        // Close first; the entries opened below are all in the snapshot.
        for entry in timeline.iter_mut() {
            if !entry.is_active() {
                continue;
            }
            let key = self.keys.key_of(entry);
            if current.contains(&key) {
                continue;
            }
            if let Some(warning) = self.close(entry, observed, key) {
                outcome.warnings.push(warning);
            }
            outcome.removed += 1;
        }

        let mut opened: HashSet<IdentityKey> = HashSet::new();
        for record in snapshot {
            let key = self.keys.key_of(record);
            if existing.contains(&key) || !opened.insert(key) {
                continue;
            }
            let first_appeared = if record.publication_date.is_empty() {
                format_date(observed)
            } else {
                record.publication_date.clone()
            };
            timeline.push(TimelineEntry::opened(record, first_appeared));
            outcome.added += 1;
        }

        outcome.total_active = timeline.iter().filter(|e| e.is_active()).count();

        for warning in &outcome.warnings {
            warn!(%warning, "reconcile");
        }
        if !outcome.duplicate_active.is_empty() {
            warn!(
                count = outcome.duplicate_active.len(),
                "timeline holds several active entries for the same key"
            );
        }
        info!(
            date = %observed,
            added = outcome.added,
            removed = outcome.removed,
            total_active = outcome.total_active,
            "reconciled snapshot"
        );
        Ok(outcome)
    }

    fn close(
        &self,
        entry: &mut TimelineEntry,
        observed: NaiveDate,
        key: IdentityKey,
    ) -> Option<ReconcileWarning> {
        entry.status = Status::Removed.as_str().to_string();
        entry.last_appeared = format_date(observed);

        let warning = match entry.first_appeared_date() {
            Some(first) => {
                entry.duration_days = (observed - first).num_days().to_string();
                (first > observed).then(|| ReconcileWarning::FirstAppearedAfterObservation {
                    key,
                    value: entry.first_appeared.clone(),
                })
            }
            None => {
                entry.duration_days.clear();
                Some(ReconcileWarning::UnparseableFirstAppeared {
                    key,
                    value: entry.first_appeared.clone(),
                })
            }
        };

        entry.crossed_data_gap = if self.gap.crossed_by(entry) {
            GAP_FLAG_TRUE.to_string()
        } else {
            String::new()
        };
        warning
    }

    fn duplicate_active(&self, timeline: &[TimelineEntry]) -> Vec<IdentityKey> {
        let mut counts: BTreeMap<IdentityKey, usize> = BTreeMap::new();
        for entry in timeline.iter().filter(|e| e.is_active()) {
            *counts.entry(self.keys.key_of(entry)).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(key, _)| key)
            .collect()
    }
}
