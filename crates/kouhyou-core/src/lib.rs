pub mod config;
pub mod date;
pub mod extract;
pub mod key;
pub mod record;
pub mod schema;

pub use config::{ConfigError, Correction, GapWindow, PipelineConfig};
pub use date::{DateNormalizer, YearRange, normalize_date, parse_date};
pub use extract::{Extraction, TextExtractor};
pub use key::{ExactKey, IdentityKey, KeyMode, KeyStrategy, TrimmedKey};
pub use record::{ChangeLogEntry, Column, Status, TableRow, TimelineEntry, ViolationRecord};
pub use schema::tables;
