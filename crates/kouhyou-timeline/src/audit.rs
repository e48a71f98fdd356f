//! Data-quality audit for the timeline and snapshot tables.
//!
//! [`Auditor::detect`] runs every rule over every row and reports issues
//! without touching anything. [`Auditor::fix`] applies the deterministic
//! corrections, re-detects, and deletes rows that still carry an
//! [`Severity::Error`] issue, so its output never has one. Warnings are
//! reported and left alone.
//!
//! Rules only look at columns the row type actually has, so one auditor
//! serves both tables.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use kouhyou_core::config::PipelineConfig;
use kouhyou_core::date::{DateNormalizer, contains_era_token, parse_date};
use kouhyou_core::key::{IdentityKey, Identified, KeyStrategy};
use kouhyou_core::record::{Column, Status, TableRow};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    InvalidDateFormat,
    InvalidYear,
    DateOrder,
    EmptyOrInvalid,
    NumericOnly,
    ContainsLawName,
    ContainsEraDate,
    TooLong,
    MissingPrefecture,
    CorruptedText,
    StrayWhitespace,
    BadSuffix,
    UnknownBureau,
    MissingLawKeyword,
    ContainsCompanyMarker,
    KnownCorruption,
    InvalidStatus,
    StatusMismatch,
    InvalidDuration,
    NegativeDuration,
    ExcessiveDuration,
    MissingProsecutionDate,
    DuplicateActive,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidDateFormat => "invalid_date_format",
            Self::InvalidYear => "invalid_year",
            Self::DateOrder => "date_order",
            Self::EmptyOrInvalid => "empty_or_invalid",
            Self::NumericOnly => "numeric_only",
            Self::ContainsLawName => "contains_law_name",
            Self::ContainsEraDate => "contains_era_date",
            Self::TooLong => "too_long",
            Self::MissingPrefecture => "missing_prefecture",
            Self::CorruptedText => "corrupted_text",
            Self::StrayWhitespace => "stray_whitespace",
            Self::BadSuffix => "bad_suffix",
            Self::UnknownBureau => "unknown_bureau",
            Self::MissingLawKeyword => "missing_law_keyword",
            Self::ContainsCompanyMarker => "contains_company_marker",
            Self::KnownCorruption => "known_corruption",
            Self::InvalidStatus => "invalid_status",
            Self::StatusMismatch => "status_mismatch",
            Self::InvalidDuration => "invalid_duration",
            Self::NegativeDuration => "negative_duration",
            Self::ExcessiveDuration => "excessive_duration",
            Self::MissingProsecutionDate => "missing_prosecution_date",
            Self::DuplicateActive => "duplicate_active",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rule violation on one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// Index into the audited rows.
    pub row: usize,
    #[serde(serialize_with = "column_name")]
    pub column: Column,
    pub value: String,
    pub kind: IssueKind,
    pub severity: Severity,
}

fn column_name<S: serde::Serializer>(column: &Column, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(column.name())
}

impl Issue {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// A correction applied in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fix {
    pub row: usize,
    pub column: Column,
    pub from: String,
    pub to: String,
}

/// A row dropped because an error survived correction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deletion {
    /// Index into the rows passed to [`Auditor::fix`].
    pub row: usize,
    pub kinds: Vec<IssueKind>,
}

#[derive(Debug, Clone)]
pub struct FixOutcome<R> {
    pub rows: Vec<R>,
    pub fixes: Vec<Fix>,
    pub deleted: Vec<Deletion>,
    /// Issues detected on `rows`; never error-grade.
    pub remaining: Vec<Issue>,
}

/// Summary counts for one audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub detected: usize,
    pub detected_errors: usize,
    pub detected_warnings: usize,
    pub fixed: usize,
    pub deleted: usize,
    pub remaining_errors: usize,
    pub remaining_warnings: usize,
}

impl AuditReport {
    /// Report for a detection-only run: everything detected remains.
    pub fn detected(issues: &[Issue]) -> Self {
        let errors = issues.iter().filter(|i| i.is_error()).count();
        Self {
            detected: issues.len(),
            detected_errors: errors,
            detected_warnings: issues.len() - errors,
            remaining_errors: errors,
            remaining_warnings: issues.len() - errors,
            ..Default::default()
        }
    }

    pub fn fixed<R>(issues: &[Issue], outcome: &FixOutcome<R>) -> Self {
        let remaining_errors = outcome.remaining.iter().filter(|i| i.is_error()).count();
        Self {
            fixed: outcome.fixes.len(),
            deleted: outcome.deleted.len(),
            remaining_errors,
            remaining_warnings: outcome.remaining.len() - remaining_errors,
            ..Self::detected(issues)
        }
    }

    pub fn is_clean(&self) -> bool {
        self.remaining_errors == 0
    }
}

// ── Auditor ──

pub struct Auditor<'a> {
    config: &'a PipelineConfig,
    normalizer: DateNormalizer,
}

const DATE_COLUMNS: &[Column] = &[
    Column::FirstAppeared,
    Column::LastAppeared,
    Column::ProsecutionDate,
    Column::PublicationDate,
];

/// 送検 = referred for prosecution.
const PROSECUTION_MARKER: &str = "送検";

impl<'a> Auditor<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            config,
            normalizer: config.normalizer(),
        }
    }

    /// Every issue in `rows`, in row order.
    pub fn detect<R: TableRow + Identified>(&self, rows: &[R]) -> Vec<Issue> {
        let mut issues = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            self.check_row(i, row, &mut issues);
        }
        self.check_duplicates(rows, &mut issues);
        issues.sort_by_key(|i| i.row);
        issues
    }

    /// Apply deterministic corrections for `issues`, then delete every row
    /// that still has an error.
    pub fn fix<R: TableRow + Identified>(&self, mut rows: Vec<R>, issues: &[Issue]) -> FixOutcome<R> {
        let mut fixes = Vec::new();
        for issue in issues.iter().filter(|i| i.is_error()) {
            let Some(row) = rows.get_mut(issue.row) else {
                continue;
            };
            let current = row.get(issue.column).to_string();
            let Some(to) = self.correction(&*row, issue.column, issue.kind, &current) else {
                continue;
            };
            if to == current {
                continue;
            }
            debug!(row = issue.row, column = %issue.column, from = %current, to = %to, "fixed");
            row.set(issue.column, to.clone());
            fixes.push(Fix {
                row: issue.row,
                column: issue.column,
                from: current,
                to,
            });
        }

        let mut doomed: BTreeMap<usize, Vec<IssueKind>> = BTreeMap::new();
        for issue in self.detect(&rows).into_iter().filter(Issue::is_error) {
            doomed.entry(issue.row).or_default().push(issue.kind);
        }
        let deleted: Vec<Deletion> = doomed
            .into_iter()
            .map(|(row, kinds)| Deletion { row, kinds })
            .collect();

        let mut index = 0;
        let mut next = deleted.iter().map(|d| d.row).peekable();
        rows.retain(|_| {
            let keep = next.peek() != Some(&index);
            if !keep {
                next.next();
            }
            index += 1;
            keep
        });

        let remaining = self.detect(&rows);
        info!(
            fixed = fixes.len(),
            deleted = deleted.len(),
            remaining = remaining.len(),
            "applied audit fixes"
        );
        FixOutcome {
            rows,
            fixes,
            deleted,
            remaining,
        }
    }

    // ── Corrections ──

    fn correction<R: TableRow>(&self, row: &R, column: Column, kind: IssueKind, value: &str) -> Option<String> {
        match kind {
            IssueKind::InvalidDateFormat | IssueKind::InvalidYear => {
                let mut fixed = self.normalizer.normalize(value);
                if fixed.is_empty() && column == Column::PublicationDate {
                    fixed = self
                        .normalizer
                        .normalize(row.get(Column::PublicationDateOriginal));
                }
                // prosecution_date is optional, so an unrecoverable one is dropped.
                (!fixed.is_empty() || column == Column::ProsecutionDate).then_some(fixed)
            }
            IssueKind::InvalidStatus => Some(Status::Active.as_str().to_string()),
            IssueKind::StrayWhitespace => Some(collapse_whitespace(value)),
            IssueKind::KnownCorruption => Some(self.apply_corrections(value)),
            IssueKind::InvalidDuration | IssueKind::NegativeDuration => Some(String::new()),
            _ => None,
        }
    }

    fn apply_corrections(&self, value: &str) -> String {
        self.config
            .corrections
            .iter()
            .filter(|c| !c.from.is_empty())
            .fold(value.to_string(), |acc, c| acc.replace(&c.from, &c.to))
    }

    // ── Rules ──

    fn check_row<R: TableRow>(&self, row_idx: usize, row: &R, out: &mut Vec<Issue>) {
        let mut push = |column: Column, kind: IssueKind, severity: Severity| {
            out.push(Issue {
                row: row_idx,
                column,
                value: row.get(column).to_string(),
                kind,
                severity,
            });
        };

        for &column in DATE_COLUMNS.iter().filter(|c| R::has(**c)) {
            if let Some(kind) = self.date_issue(row.get(column)) {
                push(column, kind, Severity::Error);
            }
        }
        if R::has(Column::FirstAppeared) && R::has(Column::LastAppeared) {
            let first = parse_date(row.get(Column::FirstAppeared));
            let last = parse_date(row.get(Column::LastAppeared));
            if let (Some(first), Some(last)) = (first, last) {
                if first > last {
                    push(Column::LastAppeared, IssueKind::DateOrder, Severity::Error);
                }
            }
        }

        if R::has(Column::CompanyName) {
            for (kind, severity) in self.company_issues(row.get(Column::CompanyName)) {
                push(Column::CompanyName, kind, severity);
            }
        }
        if R::has(Column::Location) {
            for (kind, severity) in self.location_issues(row.get(Column::Location)) {
                push(Column::Location, kind, severity);
            }
        }
        if R::has(Column::LaborBureau) {
            if let Some((kind, severity)) = self.bureau_issue(row.get(Column::LaborBureau)) {
                push(Column::LaborBureau, kind, severity);
            }
        }
        if R::has(Column::ViolationLaw) {
            for kind in self.law_issues(row.get(Column::ViolationLaw)) {
                push(Column::ViolationLaw, kind, Severity::Warn);
            }
        }

        for &column in R::COLUMNS {
            if self.has_known_corruption(row.get(column)) {
                push(column, IssueKind::KnownCorruption, Severity::Error);
            }
        }

        if R::has(Column::Status) {
            let status = row.get(Column::Status);
            if !status.is_empty() && Status::parse(status).is_none() {
                push(Column::Status, IssueKind::InvalidStatus, Severity::Error);
            } else if R::has(Column::LastAppeared) {
                let closed = !row.get(Column::LastAppeared).is_empty();
                let mismatch = match Status::parse(status) {
                    Some(Status::Active) => closed,
                    Some(Status::Removed) => !closed,
                    None => false,
                };
                if mismatch {
                    push(Column::Status, IssueKind::StatusMismatch, Severity::Warn);
                }
            }
        }

        if R::has(Column::DurationDays) {
            if let Some((kind, severity)) = self.duration_issue(row.get(Column::DurationDays)) {
                push(Column::DurationDays, kind, severity);
            }
        }

        if R::has(Column::Reference) {
            let reference = row.get(Column::Reference);
            if reference.contains(PROSECUTION_MARKER) && !contains_era_token(reference) {
                push(Column::Reference, IssueKind::MissingProsecutionDate, Severity::Warn);
            }
        }
    }

    fn date_issue(&self, value: &str) -> Option<IssueKind> {
        if value.is_empty() {
            return None;
        }
        if parse_date(value).is_none() {
            Some(IssueKind::InvalidDateFormat)
        } else if !self.normalizer.is_plausible(value) {
            Some(IssueKind::InvalidYear)
        } else {
            None
        }
    }

    fn company_issues(&self, name: &str) -> Vec<(IssueKind, Severity)> {
        let trimmed = name.trim();
        if trimmed.chars().count() < 2 {
            return vec![(IssueKind::EmptyOrInvalid, Severity::Error)];
        }
        let mut found = Vec::new();
        if trimmed.chars().all(char::is_numeric) {
            found.push(IssueKind::NumericOnly);
        }
        if self.contains_law_name(name) {
            found.push(IssueKind::ContainsLawName);
        }
        if contains_era_token(name) {
            found.push(IssueKind::ContainsEraDate);
        }
        if name.chars().count() > self.config.max_company_name_chars {
            found.push(IssueKind::TooLong);
        }
        found.into_iter().map(|k| (k, Severity::Error)).collect()
    }

    fn location_issues(&self, location: &str) -> Vec<(IssueKind, Severity)> {
        let mut found = Vec::new();
        let has_prefecture = self.config.find_prefecture(location).is_some();
        if !has_prefecture {
            found.push((IssueKind::MissingPrefecture, Severity::Warn));
        }
        if self.contains_law_name(location) {
            found.push((IssueKind::ContainsLawName, Severity::Error));
        }
        if location.chars().count() > self.config.max_location_chars {
            found.push((IssueKind::TooLong, Severity::Warn));
        }
        if has_repeated_kana(location, self.config.kana_repeat_threshold) {
            let severity = if has_prefecture {
                Severity::Warn
            } else {
                Severity::Error
            };
            found.push((IssueKind::CorruptedText, severity));
        }
        if collapse_whitespace(location) != location {
            found.push((IssueKind::StrayWhitespace, Severity::Error));
        }
        found
    }

    fn bureau_issue(&self, bureau: &str) -> Option<(IssueKind, Severity)> {
        if !bureau.ends_with(self.config.bureau_suffix.as_str()) {
            Some((IssueKind::BadSuffix, Severity::Error))
        } else if !self.config.labor_bureaus.iter().any(|b| b == bureau) {
            Some((IssueKind::UnknownBureau, Severity::Warn))
        } else {
            None
        }
    }

    fn law_issues(&self, law: &str) -> Vec<IssueKind> {
        let mut found = Vec::new();
        if !self.config.law_keywords.iter().any(|k| law.contains(k.as_str())) {
            found.push(IssueKind::MissingLawKeyword);
        }
        if self.config.company_markers.iter().any(|m| law.contains(m.as_str())) {
            found.push(IssueKind::ContainsCompanyMarker);
        }
        found
    }

    fn duration_issue(&self, value: &str) -> Option<(IssueKind, Severity)> {
        if value.is_empty() {
            return None;
        }
        match value.parse::<i64>() {
            Err(_) => Some((IssueKind::InvalidDuration, Severity::Error)),
            Ok(d) if d < 0 => Some((IssueKind::NegativeDuration, Severity::Error)),
            Ok(d) if d > self.config.max_duration_days => {
                Some((IssueKind::ExcessiveDuration, Severity::Warn))
            }
            Ok(_) => None,
        }
    }

    fn contains_law_name(&self, s: &str) -> bool {
        self.config.law_names.iter().any(|l| s.contains(l.as_str()))
    }

    fn has_known_corruption(&self, s: &str) -> bool {
        self.config
            .corrections
            .iter()
            .any(|c| !c.from.is_empty() && s.contains(c.from.as_str()))
    }

    /// Every active row after the first in a group sharing a key.
    fn check_duplicates<R: TableRow + Identified>(&self, rows: &[R], out: &mut Vec<Issue>) {
        if !R::has(Column::Status) {
            return;
        }
        let mut seen: HashMap<IdentityKey, usize> = HashMap::new();
        for (i, row) in rows.iter().enumerate() {
            if Status::parse(row.get(Column::Status)) != Some(Status::Active) {
                continue;
            }
            let key = self.config.key_mode.key_of(row);
            if seen.insert(key.clone(), i).is_some() {
                out.push(Issue {
                    row: i,
                    column: Column::CompanyName,
                    value: key.to_string(),
                    kind: IssueKind::DuplicateActive,
                    severity: Severity::Warn,
                });
            }
        }
    }
}

/// Trim and reduce internal whitespace runs to a single space.
fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_kana(c: char) -> bool {
    matches!(c, '\u{3041}'..='\u{3096}' | '\u{30A1}'..='\u{30FA}')
}

/// A kana repeated `threshold` times in a row (`アアア`), or a kana pair
/// repeated `threshold` times in a row (`イタイタイタ`).
fn has_repeated_kana(s: &str, threshold: usize) -> bool {
    if threshold < 2 {
        return false;
    }
    let chars: Vec<char> = s.chars().collect();

    let mut run = 1;
    for w in chars.windows(2) {
        if is_kana(w[1]) && w[0] == w[1] {
            run += 1;
            if run >= threshold {
                return true;
            }
        } else {
            run = 1;
        }
    }

    for start in 0..chars.len().saturating_sub(1) {
        let pair = &chars[start..start + 2];
        if !pair.iter().all(|&c| is_kana(c)) || pair[0] == pair[1] {
            continue;
        }
        let repeats = chars[start..]
            .chunks_exact(2)
            .take_while(|chunk| *chunk == pair)
            .count();
        if repeats >= threshold {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use kouhyou_core::record::{TimelineEntry, ViolationRecord};

    fn entry() -> TimelineEntry {
        TimelineEntry {
            company_name: "株式会社アルファ".into(),
            location: "東京都港区".into(),
            labor_bureau: "東京労働局".into(),
            first_appeared: "2023-01-01".into(),
            last_appeared: "2023-06-01".into(),
            duration_days: "151".into(),
            violation_law: "労働基準法第32条".into(),
            violation_summary: "違法な時間外労働を行わせたもの".into(),
            prosecution_date: "2022-12-01".into(),
            status: "removed".into(),
            crossed_data_gap: String::new(),
        }
    }

    fn kinds(issues: &[Issue]) -> Vec<IssueKind> {
        issues.iter().map(|i| i.kind).collect()
    }

    #[test]
    fn clean_entry_has_no_issues() {
        let config = PipelineConfig::default();
        assert!(Auditor::new(&config).detect(&[entry()]).is_empty());
    }

    #[test]
    fn date_rules() {
        let config = PipelineConfig::default();
        let auditor = Auditor::new(&config);

        let mut bad_format = entry();
        bad_format.first_appeared = "R5.1.1".into();
        let mut bad_year = entry();
        bad_year.last_appeared = "2035-01-01".into();
        let mut inverted = entry();
        inverted.first_appeared = "2023-07-01".into();

        let issues = auditor.detect(&[bad_format, bad_year, inverted]);
        assert_eq!(
            kinds(&issues),
            vec![
                IssueKind::InvalidDateFormat,
                IssueKind::InvalidYear,
                IssueKind::DateOrder,
            ]
        );
        assert!(issues.iter().all(Issue::is_error));
        assert_eq!(issues[1].row, 1);
        assert_eq!(issues[1].column, Column::LastAppeared);
    }

    #[test]
    fn company_name_rules() {
        let config = PipelineConfig::default();
        let auditor = Auditor::new(&config);
        let cases = [
            ("A", IssueKind::EmptyOrInvalid),
            ("123456", IssueKind::NumericOnly),
            ("労働基準法違反株式会社", IssueKind::ContainsLawName),
            ("株式会社ABC R6.5.21", IssueKind::ContainsEraDate),
        ];
        for (name, expected) in cases {
            let mut e = entry();
            e.company_name = name.into();
            let issues = auditor.detect(&[e]);
            assert!(kinds(&issues).contains(&expected), "{name}: {issues:?}");
            assert!(issues.iter().any(|i| i.kind == expected && i.is_error()));
        }

        let mut long = entry();
        long.company_name = "株".repeat(101);
        assert!(kinds(&auditor.detect(&[long])).contains(&IssueKind::TooLong));
    }

    #[test]
    fn location_rules_and_grades() {
        let config = PipelineConfig::default();
        let auditor = Auditor::new(&config);

        let mut no_pref = entry();
        no_pref.location = "港区".into();
        let issues = auditor.detect(&[no_pref]);
        assert_eq!(kinds(&issues), vec![IssueKind::MissingPrefecture]);
        assert_eq!(issues[0].severity, Severity::Warn);

        let mut corrupted = entry();
        corrupted.location = "アアアアイ".into();
        let issues = auditor.detect(&[corrupted]);
        let corrupted_issue = issues.iter().find(|i| i.kind == IssueKind::CorruptedText).unwrap();
        assert_eq!(corrupted_issue.severity, Severity::Error);

        let mut corrupted_with_pref = entry();
        corrupted_with_pref.location = "東京都イタイタイタ町".into();
        let issues = auditor.detect(&[corrupted_with_pref]);
        let corrupted_issue = issues.iter().find(|i| i.kind == IssueKind::CorruptedText).unwrap();
        assert_eq!(corrupted_issue.severity, Severity::Warn);

        let mut spaced = entry();
        spaced.location = " 東京都  港区".into();
        assert!(kinds(&auditor.detect(&[spaced])).contains(&IssueKind::StrayWhitespace));

        let mut long = entry();
        long.location = format!("東京都{}", "港区".repeat(30));
        let issues = auditor.detect(&[long]);
        assert_eq!(kinds(&issues), vec![IssueKind::TooLong]);
        assert_eq!(issues[0].column, Column::Location);
        assert_eq!(issues[0].severity, Severity::Warn);

        let mut with_law = entry();
        with_law.location = "東京都港区労働基準法".into();
        let issues = auditor.detect(&[with_law]);
        assert_eq!(kinds(&issues), vec![IssueKind::ContainsLawName]);
        assert_eq!(issues[0].column, Column::Location);
        assert_eq!(issues[0].severity, Severity::Error);
    }

    #[test]
    fn bureau_and_law_rules() {
        let config = PipelineConfig::default();
        let auditor = Auditor::new(&config);

        let mut bad_suffix = entry();
        bad_suffix.labor_bureau = "東京都".into();
        let mut unknown = entry();
        unknown.labor_bureau = "月面労働局".into();
        let mut law = entry();
        law.violation_law = "株式会社ベータ".into();

        let issues = auditor.detect(&[bad_suffix, unknown, law]);
        let got: Vec<(usize, IssueKind, Severity)> =
            issues.iter().map(|i| (i.row, i.kind, i.severity)).collect();
        assert_eq!(
            got,
            vec![
                (0, IssueKind::BadSuffix, Severity::Error),
                (1, IssueKind::UnknownBureau, Severity::Warn),
                (2, IssueKind::MissingLawKeyword, Severity::Warn),
                (2, IssueKind::ContainsCompanyMarker, Severity::Warn),
            ]
        );
    }

    #[test]
    fn status_and_duration_rules() {
        let config = PipelineConfig::default();
        let auditor = Auditor::new(&config);

        let mut bad_status = entry();
        bad_status.status = "foo".into();
        let mut mismatch = entry();
        mismatch.status = "active".into();
        let mut negative = entry();
        negative.duration_days = "-3".into();
        let mut long = entry();
        long.duration_days = "4000".into();
        let mut garbage = entry();
        garbage.duration_days = "abc".into();

        let issues = auditor.detect(&[bad_status, mismatch, negative, long, garbage]);
        let got: Vec<(usize, IssueKind, Severity)> =
            issues.iter().map(|i| (i.row, i.kind, i.severity)).collect();
        assert_eq!(
            got,
            vec![
                (0, IssueKind::InvalidStatus, Severity::Error),
                (1, IssueKind::StatusMismatch, Severity::Warn),
                (2, IssueKind::NegativeDuration, Severity::Error),
                (3, IssueKind::ExcessiveDuration, Severity::Warn),
                (4, IssueKind::InvalidDuration, Severity::Error),
            ]
        );
    }

    #[test]
    fn duplicate_active_reported_after_first() {
        let config = PipelineConfig::default();
        let auditor = Auditor::new(&config);
        let mut a = entry();
        a.status = "active".into();
        a.last_appeared.clear();
        a.duration_days.clear();
        let rows = vec![a.clone(), a.clone(), a];
        let dups: Vec<usize> = auditor
            .detect(&rows)
            .iter()
            .filter(|i| i.kind == IssueKind::DuplicateActive)
            .map(|i| i.row)
            .collect();
        assert_eq!(dups, vec![1, 2]);
    }

    #[test]
    fn invalid_status_is_fixed_not_deleted() {
        let config = PipelineConfig::default();
        let auditor = Auditor::new(&config);
        let mut e = entry();
        e.status = "foo".into();
        e.last_appeared.clear();
        e.duration_days.clear();

        let issues = auditor.detect(&[e.clone()]);
        let outcome = auditor.fix(vec![e], &issues);
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].status, "active");
        assert_eq!(outcome.fixes.len(), 1);
        assert!(outcome.deleted.is_empty());

        let report = AuditReport::fixed(&issues, &outcome);
        assert_eq!(report.fixed, 1);
        assert_eq!(report.deleted, 0);
        assert!(report.is_clean());
    }

    #[test]
    fn recoverable_values_are_corrected_in_place() {
        let config = PipelineConfig::default();
        let auditor = Auditor::new(&config);
        let mut e = entry();
        e.first_appeared = "R5.1.1".into();
        e.prosecution_date = "2031-01-01".into();
        e.location = "東京都 港区 ".into();
        e.violation_summary = "\u{2F24}阪の現場".into();
        e.duration_days = "abc".into();

        let issues = auditor.detect(&[e.clone()]);
        let outcome = auditor.fix(vec![e], &issues);
        assert!(outcome.deleted.is_empty());
        let fixed = &outcome.rows[0];
        assert_eq!(fixed.first_appeared, "2023-01-01");
        assert_eq!(fixed.prosecution_date, "");
        assert_eq!(fixed.location, "東京都 港区");
        assert_eq!(fixed.violation_summary, "大阪の現場");
        assert_eq!(fixed.duration_days, "");
    }

    #[test]
    fn unrecoverable_rows_are_deleted() {
        let config = PipelineConfig::default();
        let auditor = Auditor::new(&config);
        let mut bad = entry();
        bad.company_name = "".into();
        let rows = vec![entry(), bad, entry()];

        let issues = auditor.detect(&rows);
        let outcome = auditor.fix(rows, &issues);
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.deleted.len(), 1);
        assert_eq!(outcome.deleted[0].row, 1);
        assert_eq!(outcome.deleted[0].kinds, vec![IssueKind::EmptyOrInvalid]);
    }

    #[test]
    fn fix_converges_to_no_errors() {
        let config = PipelineConfig::default();
        let auditor = Auditor::new(&config);

        let mutations: [fn(&mut TimelineEntry); 9] = [
            |e: &mut TimelineEntry| e.first_appeared = "不明".into(),
            |e: &mut TimelineEntry| e.last_appeared = "H30.2.30".into(),
            |e: &mut TimelineEntry| e.status = "closed".into(),
            |e: &mut TimelineEntry| e.company_name = "9999".into(),
            |e: &mut TimelineEntry| e.location = "労働安全衛生法第21条".into(),
            |e: &mut TimelineEntry| e.labor_bureau = "".into(),
            |e: &mut TimelineEntry| e.duration_days = "-10".into(),
            |e: &mut TimelineEntry| e.first_appeared = "2024-01-01".into(),
            |e: &mut TimelineEntry| e.location = "\u{2F2D}口県".into(),
        ];
        let mut rows = vec![entry()];
        for mutate in mutations {
            let mut e = entry();
            mutate(&mut e);
            rows.push(e);
        }

        let issues = auditor.detect(&rows);
        let outcome = auditor.fix(rows, &issues);
        assert!(outcome.remaining.iter().all(|i| !i.is_error()));
        assert!(auditor.detect(&outcome.rows).iter().all(|i| !i.is_error()));
    }

    #[test]
    fn snapshot_rules_use_snapshot_columns() {
        let config = PipelineConfig::default();
        let auditor = Auditor::new(&config);
        let record = ViolationRecord {
            labor_bureau: "大阪労働局".into(),
            company_name: "ベータ工業（株）".into(),
            location: "大阪府大阪市".into(),
            publication_date: "45000".into(),
            publication_date_original: "R5.3.15".into(),
            violation_law: "労働安全衛生法第21条".into(),
            violation_summary: "墜落防止措置を講じなかったもの".into(),
            reference: "送検済".into(),
            prosecution_date: String::new(),
        };

        let issues = auditor.detect(&[record.clone()]);
        assert_eq!(
            kinds(&issues),
            vec![IssueKind::InvalidDateFormat, IssueKind::MissingProsecutionDate]
        );

        let outcome = auditor.fix(vec![record], &issues);
        assert_eq!(outcome.rows[0].publication_date, "2023-03-15");
        assert_eq!(outcome.remaining.len(), 1);
    }

    #[test]
    fn repeated_kana_detection() {
        assert!(has_repeated_kana("アアア", 3));
        assert!(has_repeated_kana("東京都ぬぬぬ", 3));
        assert!(has_repeated_kana("イタイタイタ", 3));
        assert!(!has_repeated_kana("イタイタ", 3));
        assert!(!has_repeated_kana("アア", 3));
        assert!(!has_repeated_kana("東京都港区", 3));
        assert!(!has_repeated_kana("111", 3));
    }

    #[test]
    fn report_counts() {
        let config = PipelineConfig::default();
        let auditor = Auditor::new(&config);
        let mut warn = entry();
        warn.location = "港区".into();
        let mut err = entry();
        err.company_name = "X".into();
        let issues = auditor.detect(&[warn, err]);
        let report = AuditReport::detected(&issues);
        assert_eq!(report.detected, 2);
        assert_eq!(report.detected_errors, 1);
        assert_eq!(report.remaining_warnings, 1);
        assert!(!report.is_clean());
    }
}
