//! Pipeline configuration.
//!
//! Every tunable the reconciler and auditor depend on lives here and is
//! passed in explicitly. A JSON file may override any subset of the
//! defaults; missing keys keep their default value.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::date::{DateNormalizer, YearRange};
use crate::key::KeyMode;
use crate::record::TimelineEntry;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Data-collection gap ──

/// A historical interval with no available snapshots.
///
/// Transitions that happened inside the window cannot be dated, so an entry
/// observed across it may carry an inflated `last_appeared`/`duration_days`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Default for GapWindow {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2018, 8, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2020, 11, 30).unwrap_or_default(),
        }
    }
}

impl GapWindow {
    /// Observed on or before the gap start and still observed on or after its end.
    pub fn crosses(&self, first: Option<NaiveDate>, last: Option<NaiveDate>) -> bool {
        match (first, last) {
            (Some(first), Some(last)) => first <= self.start && last >= self.end,
            _ => false,
        }
    }

    pub fn crossed_by(&self, entry: &TimelineEntry) -> bool {
        self.crosses(entry.first_appeared_date(), entry.last_appeared_date())
    }
}

// ── Literal corrections ──

/// A known corrupted literal and its replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub from: String,
    pub to: String,
}

impl Correction {
    fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

// ── PipelineConfig ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Plausible calendar years for any stored date.
    pub years: YearRange,
    pub data_gap: GapWindow,
    pub key_mode: KeyMode,
    /// Refuse to reconcile snapshots with fewer records (0 disables the guard).
    pub min_snapshot_records: usize,
    pub prefectures: Vec<String>,
    pub labor_bureaus: Vec<String>,
    pub bureau_suffix: String,
    /// Statute names whose presence in a name or location means a column bled over.
    pub law_names: Vec<String>,
    /// At least one must occur in a violation citation.
    pub law_keywords: Vec<String>,
    pub company_markers: Vec<String>,
    pub corrections: Vec<Correction>,
    pub max_company_name_chars: usize,
    pub max_location_chars: usize,
    pub max_duration_days: i64,
    /// Consecutive repeats of a kana (or kana pair) treated as corruption.
    pub kana_repeat_threshold: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let prefectures: Vec<String> = PREFECTURES.iter().map(|s| s.to_string()).collect();
        let labor_bureaus = prefectures
            .iter()
            .map(|p| bureau_for_prefecture(p, BUREAU_SUFFIX))
            .collect();
        Self {
            years: YearRange::default(),
            data_gap: GapWindow::default(),
            key_mode: KeyMode::default(),
            min_snapshot_records: 0,
            prefectures,
            labor_bureaus,
            bureau_suffix: BUREAU_SUFFIX.to_string(),
            law_names: to_strings(LAW_NAMES),
            law_keywords: to_strings(LAW_KEYWORDS),
            company_markers: to_strings(COMPANY_MARKERS),
            corrections: RADICAL_CORRECTIONS
                .iter()
                .map(|(from, to)| Correction::new(from, to))
                .collect(),
            max_company_name_chars: 100,
            max_location_chars: 50,
            max_duration_days: 3650,
            kana_repeat_threshold: 3,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.years.min > self.years.max {
            return Err(ConfigError::Invalid(format!(
                "year range {}..{} is empty",
                self.years.min, self.years.max
            )));
        }
        if self.data_gap.start > self.data_gap.end {
            return Err(ConfigError::Invalid(format!(
                "data gap starts ({}) after it ends ({})",
                self.data_gap.start, self.data_gap.end
            )));
        }
        if self.bureau_suffix.is_empty() {
            return Err(ConfigError::Invalid("bureau_suffix is empty".into()));
        }
        Ok(())
    }

    pub fn normalizer(&self) -> DateNormalizer {
        DateNormalizer::new(self.years)
    }

    /// The first configured prefecture name occurring in `s`.
    pub fn find_prefecture(&self, s: &str) -> Option<&str> {
        self.prefectures
            .iter()
            .find(|p| s.contains(p.as_str()))
            .map(|p| p.as_str())
    }
}

/// `東京都` → `東京労働局`, `北海道` → `北海道労働局`.
pub fn bureau_for_prefecture(prefecture: &str, suffix: &str) -> String {
    let stem = if prefecture == "北海道" {
        prefecture
    } else {
        prefecture
            .strip_suffix(['都', '府', '県'])
            .unwrap_or(prefecture)
    };
    format!("{stem}{suffix}")
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ── Defaults ──

const BUREAU_SUFFIX: &str = "労働局";

const PREFECTURES: &[&str] = &[
    "北海道", "青森県", "岩手県", "宮城県", "秋田県", "山形県", "福島県", "茨城県", "栃木県",
    "群馬県", "埼玉県", "千葉県", "東京都", "神奈川県", "新潟県", "富山県", "石川県", "福井県",
    "山梨県", "長野県", "岐阜県", "静岡県", "愛知県", "三重県", "滋賀県", "京都府", "大阪府",
    "兵庫県", "奈良県", "和歌山県", "鳥取県", "島根県", "岡山県", "広島県", "山口県", "徳島県",
    "香川県", "愛媛県", "高知県", "福岡県", "佐賀県", "長崎県", "熊本県", "大分県", "宮崎県",
    "鹿児島県", "沖縄県",
];

const LAW_NAMES: &[&str] = &[
    "労働基準法",
    "労働安全衛生法",
    "最低賃金法",
    "労働者派遣法",
    "職業安定法",
    "じん肺法",
    "作業環境測定法",
    "賃金の支払の確保等に関する法律",
];

const LAW_KEYWORDS: &[&str] = &[
    "労働基準法",
    "労基法",
    "労働安全衛生法",
    "安衛法",
    "労働安全衛生規則",
    "安衛則",
    "最低賃金法",
    "最賃法",
    "労働者派遣法",
    "派遣法",
    "職業安定法",
    "職安法",
    "じん肺法",
    "作業環境測定法",
    "規則",
    "施行令",
    "法律",
];

const COMPANY_MARKERS: &[&str] = &[
    "株式会社",
    "有限会社",
    "合同会社",
    "合資会社",
    "合名会社",
    "（株）",
    "(株)",
    "（有）",
    "(有)",
    "㈱",
    "㈲",
];

// PDF text extraction frequently emits Kangxi / CJK radical code points in
// place of the unified ideographs they look identical to.
const RADICAL_CORRECTIONS: &[(&str, &str)] = &[
    ("\u{2F00}", "一"),
    ("\u{2F06}", "二"),
    ("\u{2F08}", "人"),
    ("\u{2F0A}", "入"),
    ("\u{2F0B}", "八"),
    ("\u{2F12}", "力"),
    ("\u{2F17}", "十"),
    ("\u{2F1D}", "口"),
    ("\u{2F1F}", "土"),
    ("\u{2F24}", "大"),
    ("\u{2F25}", "女"),
    ("\u{2F26}", "子"),
    ("\u{2F29}", "小"),
    ("\u{2F2D}", "山"),
    ("\u{2F2F}", "工"),
    ("\u{2F3E}", "戸"),
    ("\u{2F42}", "文"),
    ("\u{2F45}", "方"),
    ("\u{2F47}", "日"),
    ("\u{2F49}", "月"),
    ("\u{2F4A}", "木"),
    ("\u{2F54}", "水"),
    ("\u{2F55}", "火"),
    ("\u{2F65}", "田"),
    ("\u{2F69}", "白"),
    ("\u{2F6C}", "目"),
    ("\u{2F83}", "自"),
    ("\u{2F8F}", "行"),
    ("\u{2F92}", "見"),
    ("\u{2F94}", "言"),
    ("\u{2F9E}", "車"),
    ("\u{2FA6}", "金"),
    ("\u{2FA8}", "門"),
    ("\u{2FB7}", "食"),
    ("\u{2FBC}", "高"),
    ("\u{2EC4}", "西"),
    ("\u{2ED1}", "長"),
    ("\u{2ED8}", "青"),
];
