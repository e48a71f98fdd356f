//! Date normalisation for publication, prosecution, and timeline dates.
//!
//! Converts the date tokens found in the published tables into canonical
//! `YYYY-MM-DD` strings. The empty string is the "unrecoverable" sentinel;
//! nothing in this module fails or panics on bad input.
//!
//! # Accepted inputs
//!
//! - Era tokens: `R6.5.21` (Reiwa, year + 2018), `H30.12.1` (Heisei, year + 1988),
//!   also when embedded in noise: `市町R4.2.21`, `ー R4.7.6`, `H29.3. 9`
//! - Calendar dates: `2024-05-21`, `2024/5/21`
//! - Spreadsheet serial day counts: `45000` (days since 1899-12-30)
//!
//! Every result must fall inside the plausible [`YearRange`] and be a real
//! calendar date; anything else normalises to `""`.

use std::sync::LazyLock;

use chrono::{Datelike, Days, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Reiwa 1 = 2019.
pub const REIWA_OFFSET: i32 = 2018;
/// Heisei 1 = 1989.
pub const HEISEI_OFFSET: i32 = 1988;

// ── Patterns ──

static RE_ERA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([HR])(\d+)\.(\d+)\.(\d+)").unwrap());

static RE_CALENDAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})[/-](\d{1,2})[/-](\d{1,2})(?:\D|$)").unwrap());

static RE_CANONICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

static RE_SERIAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5}$").unwrap());

// 送検 = referred for prosecution; the era token directly precedes it.
static RE_PROSECUTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([HR]\d+\.\d+\.\d+)\s*送検").unwrap());

// ── Era ──

/// Imperial era prefixes that occur in the publications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Era {
    Reiwa,
    Heisei,
}

impl Era {
    pub fn from_letter(c: char) -> Option<Self> {
        match c {
            'R' => Some(Self::Reiwa),
            'H' => Some(Self::Heisei),
            _ => None,
        }
    }

    pub fn offset(&self) -> i32 {
        match self {
            Self::Reiwa => REIWA_OFFSET,
            Self::Heisei => HEISEI_OFFSET,
        }
    }

    /// `None` when the era year is too large to map onto the calendar.
    pub fn calendar_year(&self, era_year: i32) -> Option<i32> {
        era_year.checked_add(self.offset())
    }
}

// ── YearRange ──

/// Inclusive range of calendar years considered plausible for a publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            min: 2010,
            max: 2030,
        }
    }
}

impl YearRange {
    pub fn contains(&self, year: i32) -> bool {
        (self.min..=self.max).contains(&year)
    }
}

// ── Normaliser ──

/// Date normaliser bound to a plausible-year range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateNormalizer {
    years: YearRange,
}

impl DateNormalizer {
    pub fn new(years: YearRange) -> Self {
        Self { years }
    }

    pub fn years(&self) -> YearRange {
        self.years
    }

    /// Normalise a raw date token to `YYYY-MM-DD`, or `""` if unrecoverable.
    ///
    /// Idempotent: a canonical in-range date is returned unchanged.
    pub fn normalize(&self, raw: &str) -> String {
        let cleaned = clean(raw);
        if cleaned.is_empty() {
            return String::new();
        }

        if RE_SERIAL.is_match(&cleaned) {
            return self.from_serial(&cleaned).unwrap_or_default();
        }

        if let Some(caps) = RE_CALENDAR.captures(&cleaned) {
            return self
                .validated(&caps[1], &caps[2], &caps[3], None)
                .unwrap_or_default();
        }

        if let Some(caps) = RE_ERA.captures(&cleaned) {
            let era = caps[1].chars().next().and_then(Era::from_letter);
            return era
                .and_then(|era| self.validated(&caps[2], &caps[3], &caps[4], Some(era)))
                .unwrap_or_default();
        }

        String::new()
    }

    /// Prosecution date from a reference note such as `R7.1.15送検`.
    pub fn prosecution_date(&self, reference: &str) -> String {
        RE_PROSECUTION
            .captures(reference)
            .map(|caps| self.normalize(&caps[1]))
            .unwrap_or_default()
    }

    /// `true` when `s` is a canonical date whose year is in range.
    pub fn is_plausible(&self, s: &str) -> bool {
        parse_date(s).is_some_and(|d| self.years.contains(d.year()))
    }

    fn from_serial(&self, digits: &str) -> Option<String> {
        let serial: u64 = digits.parse().ok()?;
        let date = serial_epoch().checked_add_days(Days::new(serial))?;
        self.years
            .contains(date.year())
            .then(|| format_date(date))
    }

    fn validated(&self, year: &str, month: &str, day: &str, era: Option<Era>) -> Option<String> {
        let year: i32 = year.parse().ok()?;
        let month: u32 = month.parse().ok()?;
        let day: u32 = day.parse().ok()?;
        let year = match era {
            Some(era) => era.calendar_year(year)?,
            None => year,
        };
        if !self.years.contains(year) || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, day).map(format_date)
    }
}

/// Normalise with the default plausible-year range.
pub fn normalize_date(raw: &str) -> String {
    DateNormalizer::default().normalize(raw)
}

/// Parse a strictly canonical `YYYY-MM-DD` string.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    if !RE_CANONICAL.is_match(s) {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// `true` for a strictly canonical, calendar-valid `YYYY-MM-DD` string.
pub fn is_canonical_date(s: &str) -> bool {
    parse_date(s).is_some()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `true` when an era token (`R6.5.21`) occurs anywhere in `s`.
pub fn contains_era_token(s: &str) -> bool {
    RE_ERA.is_match(&clean(s))
}

/// Extract the prosecution date from a reference note such as `R7.1.15送検`.
pub fn extract_prosecution_date(reference: &str) -> String {
    DateNormalizer::default().prosecution_date(reference)
}

fn serial_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

/// Strip whitespace and fold full-width ASCII (`Ｒ６．５．２１`) to half-width.
fn clean(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            _ => c,
        })
        .collect()
}
