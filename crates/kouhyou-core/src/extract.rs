//! Text-mode record extraction.
//!
//! Parses text copied out of a publication PDF: bureau header lines followed
//! by table rows whose cells are separated by tabs or by runs of two or more
//! spaces. Cells are read positionally:
//!
//! ```text
//! 東京労働局
//! 株式会社アルファ  東京都港区  R6.3.10  労働基準法第32条  時間外労働…もの  R6.2.20送検
//! ```
//!
//! Rows that do not fit the expected shape are skipped and reported, never
//! fatal. PDF decoding itself happens upstream.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::date::DateNormalizer;
use crate::record::ViolationRecord;

/// Minimum cells for a data row: company, location, date, law, summary.
pub const MIN_CELLS: usize = 5;

/// Bureau header lines are short; anything longer is a data row.
const MAX_BUREAU_LINE_CHARS: usize = 15;

static RE_CELL_GAP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

/// Why a line produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A data-looking line before any bureau header.
    NoBureau,
    TooFewCells(usize),
    HeaderRow,
    EmptyCompany,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number in the input text.
    pub line_no: usize,
    pub reason: SkipReason,
}

/// Records extracted from one snapshot, plus the lines that were passed over.
#[derive(Debug, Default)]
pub struct Extraction {
    pub records: Vec<ViolationRecord>,
    pub skipped: Vec<SkippedLine>,
    /// Bureau headers seen, in order.
    pub bureaus: Vec<String>,
}

pub struct TextExtractor {
    normalizer: DateNormalizer,
    bureau_suffix: String,
}

impl TextExtractor {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            normalizer: config.normalizer(),
            bureau_suffix: config.bureau_suffix.clone(),
        }
    }

    pub fn extract(&self, text: &str) -> Extraction {
        let mut out = Extraction::default();
        let mut current_bureau: Option<String> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if self.is_bureau_header(line) {
                current_bureau = Some(line.to_string());
                out.bureaus.push(line.to_string());
                continue;
            }

            let cells = split_cells(line);
            let skip = |reason: SkipReason, out: &mut Extraction| {
                debug!(line_no, ?reason, "skipping line");
                out.skipped.push(SkippedLine { line_no, reason });
            };

            if cells.len() < MIN_CELLS {
                skip(SkipReason::TooFewCells(cells.len()), &mut out);
                continue;
            }
            let Some(bureau) = current_bureau.as_deref() else {
                skip(SkipReason::NoBureau, &mut out);
                continue;
            };

            match self.parse_row(&cells, bureau) {
                Ok(record) => out.records.push(record),
                Err(reason) => skip(reason, &mut out),
            }
        }

        out
    }

    fn is_bureau_header(&self, line: &str) -> bool {
        line.ends_with(self.bureau_suffix.as_str())
            && line.chars().count() < MAX_BUREAU_LINE_CHARS
    }

    /// Cells: `[company, location, publication date, law, summary, reference?]`.
    fn parse_row(&self, cells: &[&str], bureau: &str) -> Result<ViolationRecord, SkipReason> {
        let cell = |i: usize| cells.get(i).map(|c| c.trim()).unwrap_or_default();

        let company_name = cell(0);
        if company_name.contains("企業・事業場") || company_name == "所在地" {
            return Err(SkipReason::HeaderRow);
        }
        if matches!(company_name, "" | "-" | "－") {
            return Err(SkipReason::EmptyCompany);
        }

        let publication_date_original = cell(2);
        let reference = cell(5);

        Ok(ViolationRecord {
            labor_bureau: bureau.to_string(),
            company_name: company_name.to_string(),
            location: cell(1).to_string(),
            publication_date: self.normalizer.normalize(publication_date_original),
            publication_date_original: publication_date_original.to_string(),
            violation_law: cell(3).to_string(),
            violation_summary: cell(4).to_string(),
            reference: reference.to_string(),
            prosecution_date: self.normalizer.prosecution_date(reference),
        })
    }
}

fn split_cells(line: &str) -> Vec<&str> {
    if line.contains('\t') {
        line.split('\t').collect()
    } else {
        RE_CELL_GAP.split(line).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> TextExtractor {
        TextExtractor::new(&PipelineConfig::default())
    }

    const SAMPLE: &str = "\
東京労働局
企業・事業場名称\t所在地\t公表日\t違反法条\t事案概要\t その他参考事項
株式会社アルファ\t東京都港区\tR6.3.10\t労働基準法第32条\t違法な時間外労働を行わせたもの\tR6.2.20送検
-\t東京都港区\tR6.3.10\t労働基準法第32条\t概要\t

大阪労働局
ベータ工業（株）  大阪府大阪市  H30.12.1  労働安全衛生法第21条  墜落防止措置を講じなかったもの
短い行  だけ
";

    #[test]
    fn extracts_tab_and_space_separated_rows() {
        let out = extractor().extract(SAMPLE);
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.bureaus, vec!["東京労働局", "大阪労働局"]);

        let alpha = &out.records[0];
        assert_eq!(alpha.labor_bureau, "東京労働局");
        assert_eq!(alpha.company_name, "株式会社アルファ");
        assert_eq!(alpha.location, "東京都港区");
        assert_eq!(alpha.publication_date, "2024-03-10");
        assert_eq!(alpha.publication_date_original, "R6.3.10");
        assert_eq!(alpha.prosecution_date, "2024-02-20");

        let beta = &out.records[1];
        assert_eq!(beta.labor_bureau, "大阪労働局");
        assert_eq!(beta.company_name, "ベータ工業（株）");
        assert_eq!(beta.publication_date, "2018-12-01");
        assert!(beta.reference.is_empty());
        assert!(beta.prosecution_date.is_empty());
    }

    #[test]
    fn skipped_lines_are_reported() {
        let out = extractor().extract(SAMPLE);
        let reasons: Vec<&SkipReason> = out.skipped.iter().map(|s| &s.reason).collect();
        assert_eq!(
            reasons,
            vec![
                &SkipReason::HeaderRow,
                &SkipReason::EmptyCompany,
                &SkipReason::TooFewCells(2),
            ]
        );
        assert_eq!(out.skipped[0].line_no, 2);
    }

    #[test]
    fn rows_before_any_bureau_are_skipped() {
        let out = extractor().extract("株式会社A\t東京都\tR6.1.1\t労働基準法\t概要\n");
        assert!(out.records.is_empty());
        assert_eq!(out.skipped[0].reason, SkipReason::NoBureau);
    }

    #[test]
    fn long_lines_ending_in_bureau_are_not_headers() {
        let line = "労働基準関係法令違反に係る公表事案の一覧北海道労働局";
        let out = extractor().extract(line);
        assert!(out.bureaus.is_empty());
    }

    #[test]
    fn oversized_era_year_leaves_date_empty() {
        let text = "東京労働局\n株式会社A\t東京都\tR2147483647.1.1\t労働基準法\t概要\n";
        let out = extractor().extract(text);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].publication_date, "");
        assert_eq!(out.records[0].publication_date_original, "R2147483647.1.1");
    }
}
