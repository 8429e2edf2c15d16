//! Row exclusion: the analysis time window and the denylist rules.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;

use crate::models::EventRow;

/// Inclusive `[start, end]` window; rows without a timestamp never match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn contains(&self, ts: Option<NaiveDateTime>) -> bool {
        ts.is_some_and(|ts| ts >= self.start && ts <= self.end)
    }
}

pub fn apply_time_window(rows: Vec<EventRow>, window: &TimeWindow) -> Vec<EventRow> {
    let before = rows.len();
    let kept: Vec<EventRow> = rows
        .into_iter()
        .filter(|row| window.contains(row.timestamp))
        .collect();
    tracing::debug!(
        before,
        after = kept.len(),
        start = %window.start,
        end = %window.end,
        "applied time window"
    );
    kept
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleField {
    Description,
    Context,
}

impl RuleField {
    fn value<'a>(&self, row: &'a EventRow) -> &'a str {
        match self {
            RuleField::Description => &row.description,
            RuleField::Context => &row.context,
        }
    }
}

/// Static denylist: prefix rules and exact-match rules per field.
#[derive(Debug, Clone)]
pub struct ExclusionRules {
    prefixes: Vec<(RuleField, &'static str)>,
    exact: Vec<(RuleField, &'static str)>,
}

const PREFIX_RULES: &[(RuleField, &str)] = &[
    (RuleField::Description, "The user with id '-1'"),
    (RuleField::Context, "Címke:"),
    (RuleField::Context, "Más"),
];

const EXACT_CONTEXT_RULES: &[&str] = &[
    "Címke: _Adatok_",
    "Címke: _Adatok_ (copy)",
    "Címke: _Adatok_ (copy) (copy)",
    "Címke: _EXTRA feladatok _",
    "Címke: _EXTRA feladatok _ (copy)",
    "Címke: _EXTRA feladatok _ (copy) (copy)",
    "Címke: _EXTRA feladatok _ (copy) (copy) (copy)",
    "Címke: _EXTRA feladatok _- Minta feladatsor Elmélet * A t...",
    "Címke: 1. HÁZI FELADAT A Scopus (https://www.scopus.com) ...",
    "Címke: 11:40-13:10 IDŐSÁV HALLGATÓI",
    "Címke: 2. BEADANDÓ FELADAT Készítse el a Jupyter notebook...",
    "Címke: 2025.JÚNIUS 12.",
    "Címke: 2025.JÚNIUS 4.",
    "Címke: 3. BEADANDÓ FELADAT (CSOPORTOS) Elkészültek a csop…",
    "Címke: 3. BEADANDÓ FELADAT (EGYÉNI TANRENDBEN TANULÓK SZÁ...",
    "Címke: 8:00-9:30 IDŐSÁV HALLGATÓI",
    "Címke: 9:50-11:20 IDŐSÁV HALLGATÓI",
    "Címke: A tárgy széles áttekintést ad a mesterséges intell...",
    "Címke: ELŐADÁSOK ANYAGA (copy)",
    "Címke: Érdeklődőknek",
    "Címke: Érdeklődőknek (copy)",
    "Címke: Érdeklődőknek (copy) (copy)",
    "Címke: Érdeklődőknek (copy) (copy) (copy)",
    "Címke: JELENLÉT",
    "Címke: KEDVEZMÉNYES TANULMÁNYI REND (KÜLFÖLDI RÉSZKÉPZÉSE...",
    "Címke: Label (copy)",
    "Címke: Label (copy) (copy)",
    "Címke: Label (copy) (copy) (copy)",
    "Címke: Label (copy) (copy) (copy) (copy)",
    "Címke: Label (copy) (copy) (copy) (copy) (copy)",
    "Címke: LOKÁLIS ÁLLOMÁNY ELÉRÉSE GOOGLE DRIVE-RÓL 1) Elérh...",
    "Címke: OKTATÓK ELÉRHETŐSÉGEI JAKOVÁC ANTAL (ELŐADÓ) Szoba...",
    "Címke: Programozási környezet kialakítása",
    "Kurzus: A mesterséges intelligencia alapjai (INSA011NMBB) Előadás (E01)",
    "Más",
];

static DEFAULT_RULES: Lazy<ExclusionRules> = Lazy::new(|| ExclusionRules {
    prefixes: PREFIX_RULES.to_vec(),
    exact: EXACT_CONTEXT_RULES
        .iter()
        .map(|value| (RuleField::Context, *value))
        .collect(),
});

impl ExclusionRules {
    /// The built-in LMS denylist.
    pub fn standard() -> &'static ExclusionRules {
        &DEFAULT_RULES
    }

    pub fn is_excluded(&self, row: &EventRow) -> bool {
        let by_prefix = self
            .prefixes
            .iter()
            .any(|(field, prefix)| field.value(row).starts_with(prefix));

        by_prefix
            || self
                .exact
                .iter()
                .any(|(field, value)| field.value(row) == *value)
    }
}

pub fn apply_exclusions(rows: Vec<EventRow>, rules: &ExclusionRules) -> Vec<EventRow> {
    let before = rows.len();
    let kept: Vec<EventRow> = rows.into_iter().filter(|row| !rules.is_excluded(row)).collect();
    tracing::debug!(before, after = kept.len(), "applied denylist");
    kept
}
