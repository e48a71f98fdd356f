//! Storage layer: TSV tables read and written through arrow's CSV codec.

mod error;
pub use error::StoreError;

pub mod tables;
pub mod tsv;

pub use tables::{
    CHANGE_LOG_PATH, SNAPSHOT_PATH, TIMELINE_PATH, append_change_log, backup, load_change_log,
    load_snapshot, load_timeline, save_change_log, save_snapshot, save_timeline,
};
pub use tsv::{TextTable, read_table, write_text};
