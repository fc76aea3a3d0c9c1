use super::*;
use crate::detect::SelectionPayload;

fn trigger(kind: TriggerKind, trigger_index: u32) -> Trigger {
    Trigger {
        kind,
        trigger_index,
        payload: SelectionPayload::None,
    }
}

fn theme() -> Trigger {
    trigger(TriggerKind::ThemeToggle, 4)
}

fn consistency(delta_e: f64) -> Measurement {
    Measurement::ThemeConsistency {
        screen: "Main5.png".to_string(),
        delta_e,
    }
}

fn language(mismatched: usize, total_lines: usize) -> Measurement {
    Measurement::Language {
        screen: "Main7.png".to_string(),
        total_lines,
        mismatched: (0..mismatched)
            .map(|line| (format!("line {line}"), "English".to_string()))
            .collect(),
        undetected: 0,
    }
}

#[test]
fn small_delta_e_is_consistent() {
    let engine = VerdictEngine::new(true);
    let record = engine.judge(&theme(), consistency(1.3));
    assert!(record.passed);
    assert_eq!(record.outcome, Outcome::Passed);
    assert_eq!(record.scores.get("delta_e"), Some(&1.3));
    assert_eq!(record.thresholds[0].value, THEME_DELTA_E_MAX);

    let record = engine.judge(&theme(), consistency(3.0));
    assert!(!record.passed);
    assert_eq!(record.outcome, Outcome::Failed);
}

#[test]
fn delta_e_threshold_is_inclusive() {
    let record = VerdictEngine::new(true).judge(&theme(), consistency(2.0));
    assert!(record.passed);
}

#[test]
fn language_bad_ratio_above_five_percent_fails() {
    let engine = VerdictEngine::new(true);
    let selection = trigger(TriggerKind::LanguageSelection, 2);

    let record = engine.judge(&selection, language(6, 100));
    assert_eq!(record.scores.get("bad_ratio"), Some(&0.06));
    assert!(!record.passed);

    let record = engine.judge(&selection, language(5, 100));
    assert!(record.passed);
}

#[test]
fn text_free_screen_passes_language_check() {
    let record = VerdictEngine::new(true).judge(
        &trigger(TriggerKind::LanguageSelection, 2),
        language(0, 0),
    );
    assert!(record.passed);
    assert_eq!(record.scores.get("bad_ratio"), Some(&0.0));
}

#[test]
fn identical_back_screens_pass() {
    let record = VerdictEngine::new(true).judge(
        &trigger(TriggerKind::BackNavigation, 5),
        Measurement::Back {
            screen: "Main5.png".to_string(),
            ssim: 1.0,
            text_mismatch: Some(0.0),
            missing_text: Vec::new(),
        },
    );
    assert!(record.passed);
    assert_eq!(record.metric, MetricKind::BackSimilarity);
}

#[test]
fn back_needs_both_similarity_and_text() {
    let engine = VerdictEngine::new(true);
    let back = trigger(TriggerKind::BackNavigation, 5);
    let measure = |ssim: f64, text_mismatch: Option<f64>| Measurement::Back {
        screen: "Main5.png".to_string(),
        ssim,
        text_mismatch,
        missing_text: Vec::new(),
    };
    assert!(!engine.judge(&back, measure(0.8, None)).passed);
    assert!(!engine.judge(&back, measure(0.95, Some(0.6))).passed);
    assert!(engine.judge(&back, measure(0.95, Some(0.5))).passed);
    let skipped_text = engine.judge(&back, measure(0.3, None));
    assert!(!skipped_text.scores.contains_key("text_mismatch"));
}

#[test]
fn theme_change_requires_flipped_lightness() {
    let engine = VerdictEngine::new(true);
    let change = |before_light: bool, after_light: bool| Measurement::ThemeChange {
        screen: "Main4.png".to_string(),
        before_light,
        after_light,
    };
    assert!(engine.judge(&theme(), change(true, false)).passed);
    assert!(!engine.judge(&theme(), change(false, false)).passed);
}

#[test]
fn coverage_reports_visible_percentage() {
    let record = VerdictEngine::new(true).judge(
        &theme(),
        Measurement::ThemeTextCoverage {
            screen: "Main5.png".to_string(),
            total: 4,
            missing: vec!["drafts".to_string()],
        },
    );
    assert_eq!(record.scores.get("visible_pct"), Some(&75.0));
    assert!(record.passed);
    assert_eq!(record.detail.items[0].label, "drafts");

    let empty = VerdictEngine::new(true).judge(
        &theme(),
        Measurement::ThemeTextCoverage {
            screen: "Main6.png".to_string(),
            total: 0,
            missing: Vec::new(),
        },
    );
    assert_eq!(empty.scores.get("visible_pct"), Some(&100.0));
}

#[test]
fn missing_input_fails_confirmation() {
    let record = VerdictEngine::new(true).judge(
        &trigger(TriggerKind::UserInputConfirmation, 3),
        Measurement::Inputs {
            screen: "Main3.png".to_string(),
            results: vec![("42".to_string(), true), ("Ada".to_string(), false)],
        },
    );
    assert!(!record.passed);
    assert_eq!(record.scores.get("missing_inputs"), Some(&1.0));
    assert_eq!(record.detail.items[1], DetailItem::new("Ada", "missing"));
}

#[test]
fn brief_output_condenses_detail() {
    let selection = trigger(TriggerKind::LanguageSelection, 2);
    let brief = VerdictEngine::new(false).judge(&selection, language(8, 10));
    assert_eq!(brief.detail.items.len(), CONDENSED_DETAIL_ITEMS);
    assert_eq!(brief.detail.omitted, 3);

    let detailed = VerdictEngine::new(true).judge(&selection, language(8, 10));
    assert_eq!(detailed.detail.items.len(), 8);
    assert_eq!(detailed.detail.omitted, 0);
    // Scores never depend on the output mode.
    assert_eq!(brief.scores, detailed.scores);
}

#[test]
fn inconclusive_record_keeps_the_reason() {
    let err = OracleError::missing("Main5.png", vec!["/runs/1/Main5.png".to_string()]);
    let record = VerdictEngine::new(true).inconclusive(
        &theme(),
        MetricKind::ThemeConsistency,
        Some("Main5.png".to_string()),
        &err,
    );
    assert_eq!(record.outcome, Outcome::Inconclusive);
    assert!(!record.passed);
    let reason = record.detail.reason.expect("reason");
    assert_eq!(reason.code, "missing_asset");
    assert_eq!(reason.sequence_index, 4);
}

#[test]
fn trigger_outcome_prefers_failure_then_inconclusive() {
    let engine = VerdictEngine::new(true);
    let toggle = theme();
    let passed = engine.judge(&toggle, consistency(0.5));
    let failed = engine.judge(&toggle, consistency(9.0));
    let unknown = engine.inconclusive(
        &toggle,
        MetricKind::ThemeTextCoverage,
        None,
        &OracleError::backend("ocr", "tesseract exited with 1"),
    );

    let outcome = |records: &[VerdictRecord]| aggregate(&toggle, records).outcome;
    assert_eq!(outcome(&[passed.clone()]), Outcome::Passed);
    assert_eq!(
        outcome(&[passed.clone(), unknown.clone()]),
        Outcome::Inconclusive
    );
    assert_eq!(outcome(&[passed, unknown, failed]), Outcome::Failed);
    assert_eq!(outcome(&[]), Outcome::Inconclusive);
}

#[test]
fn aggregate_ignores_other_triggers() {
    let engine = VerdictEngine::new(true);
    let other = engine.judge(&trigger(TriggerKind::ThemeToggle, 9), consistency(9.0));
    let verdict = aggregate(&theme(), &[other]);
    assert_eq!(verdict.records, 0);
    assert_eq!(verdict.outcome, Outcome::Inconclusive);
}

#[test]
fn summary_counts_every_requested_kind() {
    let verdicts = vec![
        TriggerVerdict {
            kind: TriggerKind::BackNavigation,
            trigger_index: 5,
            outcome: Outcome::Passed,
            records: 1,
        },
        TriggerVerdict {
            kind: TriggerKind::BackNavigation,
            trigger_index: 9,
            outcome: Outcome::Failed,
            records: 1,
        },
    ];
    let summary = Summary::new(
        &[TriggerKind::BackNavigation, TriggerKind::ThemeToggle],
        &verdicts,
        2,
        1,
    );
    assert_eq!(summary.totals.triggers, 2);
    assert_eq!(summary.totals.passed, 1);
    assert_eq!(summary.totals.failed, 1);
    assert_eq!(summary.by_kind[&TriggerKind::ThemeToggle], Counts::default());
    assert_eq!(summary.skipped_steps, 1);
}

#[test]
fn empty_trace_summary_is_all_zero() {
    let summary = Summary::new(&TriggerKind::ALL, &[], 0, 0);
    assert_eq!(summary.totals, Counts::default());
    assert_eq!(summary.by_kind.len(), 4);
}
