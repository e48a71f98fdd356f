//! Timeline maintenance: reconciliation, data-gap flags, audit, statistics.

pub mod audit;
pub mod gap;
pub mod reconcile;
pub mod stats;

pub use audit::{AuditReport, Auditor, FixOutcome, Issue, IssueKind, Severity};
pub use gap::apply_gap_flags;
pub use reconcile::{ReconcileError, ReconcileOutcome, ReconcileWarning, Reconciler};
pub use stats::Statistics;
