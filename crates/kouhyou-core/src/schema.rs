/// Arrow schema definitions for the pipeline's TSV tables.
///
/// Text tables are all-`Utf8`: dates, statuses, and durations are stored as
/// written so that malformed values survive a load and reach the auditor.
pub mod tables {
    use arrow::datatypes::{DataType, Field, Schema};

    use crate::record::{CHANGE_LOG_COLUMNS, Column, SNAPSHOT_COLUMNS, TIMELINE_COLUMNS};

    fn utf8_schema(columns: &[Column]) -> Schema {
        Schema::new(
            columns
                .iter()
                .map(|c| Field::new(c.name(), DataType::Utf8, true))
                .collect::<Vec<_>>(),
        )
    }

    /// Schema for the accumulated timeline (`appearances.tsv`).
    pub fn timeline_schema() -> Schema {
        utf8_schema(TIMELINE_COLUMNS)
    }

    /// Schema for one extracted snapshot (`current.tsv`).
    pub fn snapshot_schema() -> Schema {
        utf8_schema(SNAPSHOT_COLUMNS)
    }

    /// Schema for the append-only change log (`changes.tsv`).
    pub fn change_log_schema() -> Schema {
        let mut fields = vec![Field::new(CHANGE_LOG_COLUMNS[0], DataType::Utf8, false)];
        fields.extend(
            CHANGE_LOG_COLUMNS[1..]
                .iter()
                .map(|name| Field::new(*name, DataType::UInt64, false)),
        );
        Schema::new(fields)
    }

    /// An all-`Utf8` schema for arbitrary header names, used when reading.
    pub fn text_schema<S: AsRef<str>>(names: &[S]) -> Schema {
        Schema::new(
            names
                .iter()
                .map(|n| Field::new(n.as_ref(), DataType::Utf8, true))
                .collect::<Vec<_>>(),
        )
    }
}
