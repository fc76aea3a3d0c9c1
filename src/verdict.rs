//! Threshold policy, verdict records and the trace-level summary.
//!
//! Every threshold below is a fixed policy constant. Records are produced once
//! per evaluated comparison and never modified afterwards; the report only
//! reads them.
use crate::detect::{Trigger, TriggerKind};
use crate::error::{OracleError, SkipReason};
use serde::Serialize;
use std::collections::BTreeMap;

/// Back navigation passes only above this structural similarity.
pub const BACK_SSIM_MIN: f64 = 0.8;
pub const BACK_TEXT_MISMATCH_MAX: f64 = 0.5;
/// Delta-E at or below this is perceptually the same colour.
pub const THEME_DELTA_E_MAX: f64 = 2.0;
pub const THEME_TEXT_MISSING_MAX: f64 = 0.5;
pub const LANGUAGE_BAD_RATIO_MAX: f64 = 0.05;
/// Identifications below this confidence never count as mismatches.
pub const LANGUAGE_CONFIDENCE_MIN: f64 = 70.0;
pub const SETTLE_RATIO_MIN: f64 = 0.90;
/// Diagnostic entries kept per record when detailed output is off.
pub const CONDENSED_DETAIL_ITEMS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    BackSimilarity,
    ThemeChange,
    ThemeConsistency,
    ThemeTextCoverage,
    LanguageConsistency,
    InputPresence,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BackSimilarity => "back_similarity",
            Self::ThemeChange => "theme_change",
            Self::ThemeConsistency => "theme_consistency",
            Self::ThemeTextCoverage => "theme_text_coverage",
            Self::LanguageConsistency => "language_consistency",
            Self::InputPresence => "input_presence",
        }
    }

    /// The metric a trigger is reported under when it cannot be measured at all.
    pub fn primary(kind: TriggerKind) -> Self {
        match kind {
            TriggerKind::BackNavigation => Self::BackSimilarity,
            TriggerKind::ThemeToggle => Self::ThemeChange,
            TriggerKind::LanguageSelection => Self::LanguageConsistency,
            TriggerKind::UserInputConfirmation => Self::InputPresence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Above,
    AtMost,
    Differs,
}

/// One threshold a score was held against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Threshold {
    pub score: &'static str,
    pub comparison: Comparison,
    pub value: f64,
}

impl Threshold {
    const fn new(score: &'static str, comparison: Comparison, value: f64) -> Self {
        Self {
            score,
            comparison,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
    Inconclusive,
}

impl Outcome {
    fn from_pass(passed: bool) -> Self {
        if passed {
            Self::Passed
        } else {
            Self::Failed
        }
    }
}

/// One diagnostic entry, e.g. a missing string or a line in the wrong language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailItem {
    pub label: String,
    pub value: String,
}

impl DetailItem {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Detail {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<DetailItem>,
    /// Entries dropped from `items` by condensed output.
    #[serde(skip_serializing_if = "is_zero")]
    pub omitted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
}

fn is_zero(value: &usize) -> bool {
    *value == 0
}

/// Result of one comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerdictRecord {
    pub kind: TriggerKind,
    pub trigger_index: u32,
    pub metric: MetricKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    pub scores: BTreeMap<&'static str, f64>,
    pub thresholds: Vec<Threshold>,
    pub outcome: Outcome,
    pub passed: bool,
    pub detail: Detail,
}

/// Raw output of a verification metric, before any threshold is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Measurement {
    Back {
        screen: String,
        ssim: f64,
        /// Absent when the similarity check already failed.
        text_mismatch: Option<f64>,
        missing_text: Vec<String>,
    },
    ThemeChange {
        screen: String,
        before_light: bool,
        after_light: bool,
    },
    ThemeConsistency {
        screen: String,
        delta_e: f64,
    },
    ThemeTextCoverage {
        screen: String,
        total: usize,
        missing: Vec<String>,
    },
    Language {
        screen: String,
        total_lines: usize,
        /// `(line, identified language)` pairs counted as mismatches.
        mismatched: Vec<(String, String)>,
        undetected: usize,
    },
    Inputs {
        screen: String,
        /// `(input, found)` per expected input, in entry order.
        results: Vec<(String, bool)>,
    },
}

impl Measurement {
    pub fn metric(&self) -> MetricKind {
        match self {
            Self::Back { .. } => MetricKind::BackSimilarity,
            Self::ThemeChange { .. } => MetricKind::ThemeChange,
            Self::ThemeConsistency { .. } => MetricKind::ThemeConsistency,
            Self::ThemeTextCoverage { .. } => MetricKind::ThemeTextCoverage,
            Self::Language { .. } => MetricKind::LanguageConsistency,
            Self::Inputs { .. } => MetricKind::InputPresence,
        }
    }
}

/// Fraction of `missing` over `total`, zero when there is nothing to miss.
pub fn fraction(missing: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        missing as f64 / total as f64
    }
}

/// Applies the threshold policy to measurements.
#[derive(Debug, Clone, Copy)]
pub struct VerdictEngine {
    detailed: bool,
}

impl VerdictEngine {
    pub fn new(detailed: bool) -> Self {
        Self { detailed }
    }

    fn detail(&self, mut items: Vec<DetailItem>) -> Detail {
        let mut omitted = 0;
        if !self.detailed && items.len() > CONDENSED_DETAIL_ITEMS {
            omitted = items.len() - CONDENSED_DETAIL_ITEMS;
            items.truncate(CONDENSED_DETAIL_ITEMS);
        }
        Detail {
            items,
            omitted,
            reason: None,
        }
    }

    pub fn judge(&self, trigger: &Trigger, measurement: Measurement) -> VerdictRecord {
        let metric = measurement.metric();
        let mut scores = BTreeMap::new();
        let (screen, thresholds, passed, items) = match measurement {
            Measurement::Back {
                screen,
                ssim,
                text_mismatch,
                missing_text,
            } => {
                scores.insert("ssim", ssim);
                if let Some(mismatch) = text_mismatch {
                    scores.insert("text_mismatch", mismatch);
                }
                let passed = ssim > BACK_SSIM_MIN
                    && text_mismatch.is_some_and(|mismatch| mismatch <= BACK_TEXT_MISMATCH_MAX);
                let items = missing_text
                    .into_iter()
                    .map(|text| DetailItem::new(text, "missing after back"))
                    .collect();
                (
                    screen,
                    vec![
                        Threshold::new("ssim", Comparison::Above, BACK_SSIM_MIN),
                        Threshold::new("text_mismatch", Comparison::AtMost, BACK_TEXT_MISMATCH_MAX),
                    ],
                    passed,
                    items,
                )
            }
            Measurement::ThemeChange {
                screen,
                before_light,
                after_light,
            } => {
                scores.insert("before_light", f64::from(u8::from(before_light)));
                scores.insert("after_light", f64::from(u8::from(after_light)));
                (
                    screen,
                    vec![Threshold::new(
                        "after_light",
                        Comparison::Differs,
                        f64::from(u8::from(before_light)),
                    )],
                    before_light != after_light,
                    Vec::new(),
                )
            }
            Measurement::ThemeConsistency { screen, delta_e } => {
                scores.insert("delta_e", delta_e);
                (
                    screen,
                    vec![Threshold::new("delta_e", Comparison::AtMost, THEME_DELTA_E_MAX)],
                    delta_e <= THEME_DELTA_E_MAX,
                    Vec::new(),
                )
            }
            Measurement::ThemeTextCoverage {
                screen,
                total,
                missing,
            } => {
                let missing_fraction = fraction(missing.len(), total);
                scores.insert("missing_fraction", missing_fraction);
                scores.insert("visible_pct", ((1.0 - missing_fraction) * 100.0).round());
                let items = missing
                    .into_iter()
                    .map(|text| DetailItem::new(text, "not visible"))
                    .collect();
                (
                    screen,
                    vec![Threshold::new(
                        "missing_fraction",
                        Comparison::AtMost,
                        THEME_TEXT_MISSING_MAX,
                    )],
                    missing_fraction <= THEME_TEXT_MISSING_MAX,
                    items,
                )
            }
            Measurement::Language {
                screen,
                total_lines,
                mismatched,
                undetected,
            } => {
                let bad_ratio = fraction(mismatched.len(), total_lines);
                scores.insert("bad_ratio", bad_ratio);
                scores.insert("lines", total_lines as f64);
                scores.insert("undetected_lines", undetected as f64);
                let items = mismatched
                    .into_iter()
                    .map(|(line, language)| DetailItem::new(line, language))
                    .collect();
                (
                    screen,
                    vec![Threshold::new(
                        "bad_ratio",
                        Comparison::AtMost,
                        LANGUAGE_BAD_RATIO_MAX,
                    )],
                    bad_ratio <= LANGUAGE_BAD_RATIO_MAX,
                    items,
                )
            }
            Measurement::Inputs { screen, results } => {
                let missing = results.iter().filter(|(_, found)| !found).count();
                scores.insert("inputs", results.len() as f64);
                scores.insert("missing_inputs", missing as f64);
                let items = results
                    .into_iter()
                    .map(|(text, found)| {
                        DetailItem::new(text, if found { "shown" } else { "missing" })
                    })
                    .collect();
                (
                    screen,
                    vec![Threshold::new("missing_inputs", Comparison::AtMost, 0.0)],
                    missing == 0,
                    items,
                )
            }
        };

        let outcome = Outcome::from_pass(passed);
        tracing::debug!(
            kind = %trigger.kind,
            trigger_index = trigger.trigger_index,
            metric = metric.as_str(),
            screen = %screen,
            ?outcome,
            "verdict"
        );
        VerdictRecord {
            kind: trigger.kind,
            trigger_index: trigger.trigger_index,
            metric,
            screen: Some(screen),
            scores,
            thresholds,
            outcome,
            passed,
            detail: self.detail(items),
        }
    }

    /// Record a comparison that could not be evaluated.
    pub fn inconclusive(
        &self,
        trigger: &Trigger,
        metric: MetricKind,
        screen: Option<String>,
        err: &OracleError,
    ) -> VerdictRecord {
        tracing::warn!(
            kind = %trigger.kind,
            trigger_index = trigger.trigger_index,
            metric = metric.as_str(),
            error = %err,
            "comparison inconclusive"
        );
        VerdictRecord {
            kind: trigger.kind,
            trigger_index: trigger.trigger_index,
            metric,
            screen,
            scores: BTreeMap::new(),
            thresholds: Vec::new(),
            outcome: Outcome::Inconclusive,
            passed: false,
            detail: Detail {
                reason: Some(SkipReason::from_error(trigger.trigger_index, err)),
                ..Detail::default()
            },
        }
    }
}

/// Aggregate outcome of one trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerVerdict {
    pub kind: TriggerKind,
    pub trigger_index: u32,
    pub outcome: Outcome,
    pub records: usize,
}

/// Failed beats inconclusive beats passed; no records at all is inconclusive.
pub fn aggregate(trigger: &Trigger, records: &[VerdictRecord]) -> TriggerVerdict {
    let own: Vec<&VerdictRecord> = records
        .iter()
        .filter(|record| record.kind == trigger.kind && record.trigger_index == trigger.trigger_index)
        .collect();
    let outcome = if own.is_empty() {
        Outcome::Inconclusive
    } else if own.iter().any(|record| record.outcome == Outcome::Failed) {
        Outcome::Failed
    } else if own.iter().any(|record| record.outcome == Outcome::Inconclusive) {
        Outcome::Inconclusive
    } else {
        Outcome::Passed
    };
    TriggerVerdict {
        kind: trigger.kind,
        trigger_index: trigger.trigger_index,
        outcome,
        records: own.len(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub triggers: usize,
    pub passed: usize,
    pub failed: usize,
    pub inconclusive: usize,
}

impl Counts {
    fn add(&mut self, outcome: Outcome) {
        self.triggers += 1;
        match outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Inconclusive => self.inconclusive += 1,
        }
    }
}

/// Trace-level summary handed to the report sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    #[serde(flatten)]
    pub totals: Counts,
    pub records: usize,
    pub skipped_steps: usize,
    pub by_kind: BTreeMap<TriggerKind, Counts>,
}

impl Summary {
    pub fn new(
        kinds: &[TriggerKind],
        verdicts: &[TriggerVerdict],
        records: usize,
        skipped_steps: usize,
    ) -> Self {
        let mut summary = Self {
            records,
            skipped_steps,
            ..Self::default()
        };
        for kind in kinds {
            summary.by_kind.entry(*kind).or_default();
        }
        for verdict in verdicts {
            summary.totals.add(verdict.outcome);
            summary.by_kind.entry(verdict.kind).or_default().add(verdict.outcome);
        }
        summary
    }
}

#[cfg(test)]
#[path = "verdict_tests.rs"]
mod tests;
