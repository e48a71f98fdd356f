//! The pipeline's three persisted tables.
//!
//! The timeline and change log are accumulated across runs: when either file
//! is absent the table starts empty. A snapshot is always the output of an
//! extraction run, so a missing snapshot is an error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray, UInt64Array};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDateTime;
use kouhyou_core::record::{CHANGE_LOG_COLUMNS, ChangeLogEntry, Column, TimelineEntry, ViolationRecord};
use kouhyou_core::schema::tables;
use tracing::info;

use crate::StoreError;
use crate::tsv::{read_table, text_batch, write_table};

/// Default locations, relative to the working directory.
pub const TIMELINE_PATH: &str = "timeline/appearances.tsv";
pub const CHANGE_LOG_PATH: &str = "timeline/changes.tsv";
pub const SNAPSHOT_PATH: &str = "timeline/current.tsv";

// Timelines written before gap flagging existed lack this column.
const TIMELINE_OPTIONAL: &[Column] = &[Column::CrossedDataGap];

// ── Timeline ──

/// Load the timeline; an absent file is an empty timeline.
pub fn load_timeline(path: &Path) -> Result<Vec<TimelineEntry>, StoreError> {
    if !path.exists() {
        info!(path = %path.display(), "no timeline yet, starting empty");
        return Ok(Vec::new());
    }
    let table = read_table(path)?;
    if table.names().is_empty() {
        return Ok(Vec::new());
    }
    let rows = table.rows(TIMELINE_OPTIONAL)?;
    info!(path = %path.display(), count = rows.len(), "loaded timeline");
    Ok(rows)
}

pub fn save_timeline(path: &Path, rows: &[TimelineEntry]) -> Result<(), StoreError> {
    write_table(path, &text_batch(tables::timeline_schema(), rows)?)?;
    info!(path = %path.display(), count = rows.len(), "saved timeline");
    Ok(())
}

// ── Snapshot ──

/// Load an extracted snapshot; the file must exist.
pub fn load_snapshot(path: &Path) -> Result<Vec<ViolationRecord>, StoreError> {
    let table = read_table(path)?;
    if table.names().is_empty() {
        return Ok(Vec::new());
    }
    let rows = table.rows(&[])?;
    info!(path = %path.display(), count = rows.len(), "loaded snapshot");
    Ok(rows)
}

pub fn save_snapshot(path: &Path, rows: &[ViolationRecord]) -> Result<(), StoreError> {
    write_table(path, &text_batch(tables::snapshot_schema(), rows)?)?;
    info!(path = %path.display(), count = rows.len(), "saved snapshot");
    Ok(())
}

// ── Change log ──

/// Load the change log; an absent file is an empty log.
pub fn load_change_log(path: &Path) -> Result<Vec<ChangeLogEntry>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let table = read_table(path)?;
    if table.names().is_empty() {
        return Ok(Vec::new());
    }

    let date = table.require(CHANGE_LOG_COLUMNS[0])?;
    let added = table.require(CHANGE_LOG_COLUMNS[1])?;
    let removed = table.require(CHANGE_LOG_COLUMNS[2])?;
    let total = table.require(CHANGE_LOG_COLUMNS[3])?;

    let count = |row: usize, values: &[String], name: &str| -> Result<u64, StoreError> {
        values[row].trim().parse().map_err(|_| StoreError::Malformed {
            path: path.to_path_buf(),
            row: row + 1,
            detail: format!("`{name}` is not a count: {:?}", values[row]),
        })
    };

    (0..table.num_rows())
        .map(|row| {
            Ok(ChangeLogEntry {
                date: date[row].clone(),
                added: count(row, added, CHANGE_LOG_COLUMNS[1])?,
                removed: count(row, removed, CHANGE_LOG_COLUMNS[2])?,
                total_active: count(row, total, CHANGE_LOG_COLUMNS[3])?,
            })
        })
        .collect()
}

/// Append one run to the change log, rewriting the file atomically.
pub fn append_change_log(path: &Path, entry: &ChangeLogEntry) -> Result<(), StoreError> {
    let mut log = load_change_log(path)?;
    log.push(entry.clone());
    save_change_log(path, &log)?;
    info!(
        path = %path.display(),
        date = %entry.date,
        added = entry.added,
        removed = entry.removed,
        total_active = entry.total_active,
        "appended change log"
    );
    Ok(())
}

/// Write the whole change log, counts as unsigned integer columns.
pub fn save_change_log(path: &Path, log: &[ChangeLogEntry]) -> Result<(), StoreError> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(log.iter().map(|e| e.date.as_str()))),
        Arc::new(UInt64Array::from_iter_values(log.iter().map(|e| e.added))),
        Arc::new(UInt64Array::from_iter_values(log.iter().map(|e| e.removed))),
        Arc::new(UInt64Array::from_iter_values(log.iter().map(|e| e.total_active))),
    ];
    let batch = RecordBatch::try_new(Arc::new(tables::change_log_schema()), columns)?;
    write_table(path, &batch)
}

// ── Backup ──

/// `appearances.tsv` → `appearances.backup.20240521_093000.tsv`.
pub fn backup_path(path: &Path, at: NaiveDateTime) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tsv".to_string());
    path.with_file_name(format!("{stem}.backup.{}.{ext}", at.format("%Y%m%d_%H%M%S")))
}

/// Copy `path` beside itself under a timestamped name.
pub fn backup(path: &Path, at: NaiveDateTime) -> Result<PathBuf, StoreError> {
    if !path.exists() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    let target = backup_path(path, at);
    std::fs::copy(path, &target).map_err(StoreError::io(&target))?;
    info!(from = %path.display(), to = %target.display(), "backup written");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn entry(company: &str, status: &str) -> TimelineEntry {
        TimelineEntry {
            company_name: company.into(),
            location: "東京都港区".into(),
            labor_bureau: "東京労働局".into(),
            first_appeared: "2023-01-01".into(),
            violation_law: "労働基準法第32条".into(),
            violation_summary: "違法な時間外労働".into(),
            status: status.into(),
            ..Default::default()
        }
    }

    #[test]
    fn absent_timeline_and_log_are_empty() {
        let dir = TempDir::new().unwrap();
        assert!(load_timeline(&dir.path().join(TIMELINE_PATH)).unwrap().is_empty());
        assert!(load_change_log(&dir.path().join(CHANGE_LOG_PATH)).unwrap().is_empty());
    }

    #[test]
    fn absent_snapshot_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = load_snapshot(&dir.path().join(SNAPSHOT_PATH)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn timeline_round_trip_preserves_column_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(TIMELINE_PATH);
        let mut removed = entry("株式会社ベータ", "removed");
        removed.last_appeared = "2023-06-01".into();
        removed.duration_days = "151".into();
        let rows = vec![entry("株式会社アルファ", "active"), removed];

        save_timeline(&path, &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(
            "company_name\tlocation\tlabor_bureau\tfirst_appeared\tlast_appeared\tduration_days\t"
        ));
        assert_eq!(load_timeline(&path).unwrap(), rows);
    }

    #[test]
    fn legacy_timeline_without_gap_column_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("appearances.tsv");
        std::fs::write(
            &path,
            "company_name\tlocation\tlabor_bureau\tfirst_appeared\tlast_appeared\tduration_days\t\
             violation_law\tviolation_summary\tprosecution_date\tstatus\n\
             株式会社アルファ\t東京都港区\t東京労働局\t2023-01-01\t\t\t労働基準法第32条\t概要\t\tactive\n",
        )
        .unwrap();
        let rows = load_timeline(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].crossed_data_gap, "");
        assert!(rows[0].is_active());
    }

    #[test]
    fn change_log_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CHANGE_LOG_PATH);
        let first = ChangeLogEntry {
            date: "2024-05-01".into(),
            added: 3,
            removed: 0,
            total_active: 3,
        };
        let second = ChangeLogEntry {
            date: "2024-06-01".into(),
            added: 1,
            removed: 2,
            total_active: 2,
        };
        append_change_log(&path, &first).unwrap();
        append_change_log(&path, &second).unwrap();

        assert_eq!(load_change_log(&path).unwrap(), vec![first, second]);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("date\tadded\tremoved\ttotal_active\n"));
    }

    #[test]
    fn saved_change_log_replaces_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("changes.tsv");
        std::fs::write(&path, "date\tadded\tremoved\ttotal_active\n2024-05-01\t9\t9\t9\n").unwrap();
        let log = vec![ChangeLogEntry {
            date: "2024-06-01".into(),
            added: 1,
            removed: 0,
            total_active: 1,
        }];
        save_change_log(&path, &log).unwrap();
        assert_eq!(load_change_log(&path).unwrap(), log);
    }

    #[test]
    fn malformed_change_count_is_reported_with_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("changes.tsv");
        std::fs::write(&path, "date\tadded\tremoved\ttotal_active\n2024-05-01\tx\t0\t3\n").unwrap();
        let err = load_change_log(&path).unwrap_err();
        assert!(matches!(err, StoreError::Malformed { row: 1, .. }));
    }

    #[test]
    fn backup_uses_timestamped_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("appearances.tsv");
        save_timeline(&path, &[entry("株式会社アルファ", "active")]).unwrap();

        let at = NaiveDate::from_ymd_opt(2024, 5, 21)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let target = backup(&path, at).unwrap();
        assert_eq!(
            target.file_name().unwrap(),
            "appearances.backup.20240521_093000.tsv"
        );
        assert_eq!(
            std::fs::read(&target).unwrap(),
            std::fs::read(&path).unwrap()
        );
    }
}
