//! Row types shared by the extractor, the reconciler, and the auditor.
//!
//! Timeline fields are kept as the raw strings of the stored table so that a
//! malformed value survives loading and can be reported (and repaired) by the
//! auditor. Typed views are available through the accessor methods.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::date::parse_date;

// ── Columns ──

/// Every column that appears in one of the pipeline's tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    LaborBureau,
    CompanyName,
    Location,
    PublicationDate,
    PublicationDateOriginal,
    ViolationLaw,
    ViolationSummary,
    Reference,
    ProsecutionDate,
    FirstAppeared,
    LastAppeared,
    DurationDays,
    Status,
    CrossedDataGap,
}

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LaborBureau => "labor_bureau",
            Self::CompanyName => "company_name",
            Self::Location => "location",
            Self::PublicationDate => "publication_date",
            Self::PublicationDateOriginal => "publication_date_original",
            Self::ViolationLaw => "violation_law",
            Self::ViolationSummary => "violation_summary",
            Self::Reference => "reference",
            Self::ProsecutionDate => "prosecution_date",
            Self::FirstAppeared => "first_appeared",
            Self::LastAppeared => "last_appeared",
            Self::DurationDays => "duration_days",
            Self::Status => "status",
            Self::CrossedDataGap => "crossed_data_gap",
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Snapshot table columns, in file order.
pub const SNAPSHOT_COLUMNS: &[Column] = &[
    Column::LaborBureau,
    Column::CompanyName,
    Column::Location,
    Column::PublicationDate,
    Column::PublicationDateOriginal,
    Column::ViolationLaw,
    Column::ViolationSummary,
    Column::Reference,
    Column::ProsecutionDate,
];

/// Timeline table columns, in file order.
pub const TIMELINE_COLUMNS: &[Column] = &[
    Column::CompanyName,
    Column::Location,
    Column::LaborBureau,
    Column::FirstAppeared,
    Column::LastAppeared,
    Column::DurationDays,
    Column::ViolationLaw,
    Column::ViolationSummary,
    Column::ProsecutionDate,
    Column::Status,
    Column::CrossedDataGap,
];

/// Change log columns, in file order.
pub const CHANGE_LOG_COLUMNS: &[&str] = &["date", "added", "removed", "total_active"];

/// Uniform column access over the different row types.
///
/// `COLUMNS` lists the columns the row type carries; `get` returns `""` for
/// any column outside that list and `set` ignores it.
pub trait TableRow {
    const COLUMNS: &'static [Column];

    fn get(&self, column: Column) -> &str;
    fn set(&mut self, column: Column, value: String);

    fn has(column: Column) -> bool {
        Self::COLUMNS.contains(&column)
    }
}

// ── ViolationRecord ──

/// One row of a snapshot: a single violation as published on a given day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub labor_bureau: String,
    pub company_name: String,
    pub location: String,
    /// Canonical `YYYY-MM-DD`, or empty when the source token was unreadable.
    pub publication_date: String,
    /// The date token exactly as printed in the source.
    pub publication_date_original: String,
    pub violation_law: String,
    pub violation_summary: String,
    pub reference: String,
    pub prosecution_date: String,
}

impl TableRow for ViolationRecord {
    const COLUMNS: &'static [Column] = SNAPSHOT_COLUMNS;

    fn get(&self, column: Column) -> &str {
        match column {
            Column::LaborBureau => &self.labor_bureau,
            Column::CompanyName => &self.company_name,
            Column::Location => &self.location,
            Column::PublicationDate => &self.publication_date,
            Column::PublicationDateOriginal => &self.publication_date_original,
            Column::ViolationLaw => &self.violation_law,
            Column::ViolationSummary => &self.violation_summary,
            Column::Reference => &self.reference,
            Column::ProsecutionDate => &self.prosecution_date,
            _ => "",
        }
    }

    fn set(&mut self, column: Column, value: String) {
        match column {
            Column::LaborBureau => self.labor_bureau = value,
            Column::CompanyName => self.company_name = value,
            Column::Location => self.location = value,
            Column::PublicationDate => self.publication_date = value,
            Column::PublicationDateOriginal => self.publication_date_original = value,
            Column::ViolationLaw => self.violation_law = value,
            Column::ViolationSummary => self.violation_summary = value,
            Column::Reference => self.reference = value,
            Column::ProsecutionDate => self.prosecution_date = value,
            _ => {}
        }
    }
}

// ── Status ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Removed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Removed => "removed",
        }
    }

    /// Parse a stored status value. Anything but the two literals is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "removed" => Some(Self::Removed),
            _ => None,
        }
    }
}

// ── TimelineEntry ──

/// Value stored in `crossed_data_gap` for flagged entries.
pub const GAP_FLAG_TRUE: &str = "true";

/// One distinct identity ever observed, with its observation interval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub company_name: String,
    pub location: String,
    pub labor_bureau: String,
    pub first_appeared: String,
    pub last_appeared: String,
    pub duration_days: String,
    pub violation_law: String,
    pub violation_summary: String,
    pub prosecution_date: String,
    pub status: String,
    pub crossed_data_gap: String,
}

impl TimelineEntry {
    /// A freshly observed entry. `first_appeared` is fixed here and never
    /// rewritten by the reconciler.
    pub fn opened(record: &ViolationRecord, first_appeared: String) -> Self {
        Self {
            company_name: record.company_name.clone(),
            location: record.location.clone(),
            labor_bureau: record.labor_bureau.clone(),
            first_appeared,
            last_appeared: String::new(),
            duration_days: String::new(),
            violation_law: record.violation_law.clone(),
            violation_summary: record.violation_summary.clone(),
            prosecution_date: record.prosecution_date.clone(),
            status: Status::Active.as_str().to_string(),
            crossed_data_gap: String::new(),
        }
    }

    pub fn status(&self) -> Option<Status> {
        Status::parse(&self.status)
    }

    pub fn is_active(&self) -> bool {
        self.status() == Some(Status::Active)
    }

    pub fn first_appeared_date(&self) -> Option<NaiveDate> {
        parse_date(&self.first_appeared)
    }

    pub fn last_appeared_date(&self) -> Option<NaiveDate> {
        parse_date(&self.last_appeared)
    }

    /// `duration_days` as an integer, if it holds one.
    pub fn duration(&self) -> Option<i64> {
        self.duration_days.trim().parse().ok()
    }

    pub fn crossed_data_gap(&self) -> bool {
        self.crossed_data_gap == GAP_FLAG_TRUE
    }
}

impl TableRow for TimelineEntry {
    const COLUMNS: &'static [Column] = TIMELINE_COLUMNS;

    fn get(&self, column: Column) -> &str {
        match column {
            Column::CompanyName => &self.company_name,
            Column::Location => &self.location,
            Column::LaborBureau => &self.labor_bureau,
            Column::FirstAppeared => &self.first_appeared,
            Column::LastAppeared => &self.last_appeared,
            Column::DurationDays => &self.duration_days,
            Column::ViolationLaw => &self.violation_law,
            Column::ViolationSummary => &self.violation_summary,
            Column::ProsecutionDate => &self.prosecution_date,
            Column::Status => &self.status,
            Column::CrossedDataGap => &self.crossed_data_gap,
            _ => "",
        }
    }

    fn set(&mut self, column: Column, value: String) {
        match column {
            Column::CompanyName => self.company_name = value,
            Column::Location => self.location = value,
            Column::LaborBureau => self.labor_bureau = value,
            Column::FirstAppeared => self.first_appeared = value,
            Column::LastAppeared => self.last_appeared = value,
            Column::DurationDays => self.duration_days = value,
            Column::ViolationLaw => self.violation_law = value,
            Column::ViolationSummary => self.violation_summary = value,
            Column::ProsecutionDate => self.prosecution_date = value,
            Column::Status => self.status = value,
            Column::CrossedDataGap => self.crossed_data_gap = value,
            _ => {}
        }
    }
}

// ── ChangeLogEntry ──

/// One reconciliation run, as appended to the change log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    /// Observation date of the run (`YYYY-MM-DD`).
    pub date: String,
    pub added: u64,
    pub removed: u64,
    pub total_active: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ViolationRecord {
        ViolationRecord {
            labor_bureau: "東京労働局".into(),
            company_name: "株式会社アルファ".into(),
            location: "東京都港区".into(),
            publication_date: "2024-03-10".into(),
            publication_date_original: "R6.3.10".into(),
            violation_law: "労働基準法第32条".into(),
            violation_summary: "違法な時間外労働を行わせたもの".into(),
            reference: "R6.2.20送検".into(),
            prosecution_date: "2024-02-20".into(),
        }
    }

    #[test]
    fn opened_entry_is_active_with_empty_interval_end() {
        let entry = TimelineEntry::opened(&record(), "2024-03-10".into());
        assert!(entry.is_active());
        assert_eq!(entry.first_appeared, "2024-03-10");
        assert!(entry.last_appeared.is_empty());
        assert!(entry.duration_days.is_empty());
        assert_eq!(entry.prosecution_date, "2024-02-20");
        assert!(!entry.crossed_data_gap());
    }

    #[test]
    fn status_parse_rejects_unknown_values() {
        assert_eq!(Status::parse("active"), Some(Status::Active));
        assert_eq!(Status::parse("removed"), Some(Status::Removed));
        assert_eq!(Status::parse("Active"), None);
        assert_eq!(Status::parse(""), None);
    }

    #[test]
    fn table_row_access_is_limited_to_own_columns() {
        let mut rec = record();
        assert_eq!(rec.get(Column::Reference), "R6.2.20送検");
        assert_eq!(rec.get(Column::Status), "");
        rec.set(Column::Status, "active".into());
        assert_eq!(rec.get(Column::Status), "");
        assert!(ViolationRecord::has(Column::PublicationDate));
        assert!(!TimelineEntry::has(Column::PublicationDate));
    }

    #[test]
    fn duration_parses_only_integers() {
        let mut entry = TimelineEntry::opened(&record(), "2024-03-10".into());
        entry.duration_days = "151".into();
        assert_eq!(entry.duration(), Some(151));
        entry.duration_days = "abc".into();
        assert_eq!(entry.duration(), None);
    }
}
