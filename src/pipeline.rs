//! Trace evaluation: Loader output through detection, correlation, metrics
//! and verdicts.
//!
//! Stages run strictly in order and only read the output of earlier stages.
//! Every recoverable failure is confined to the trigger it belongs to.
use crate::assets::{self, TraceAssets};
use crate::backends::TextRecognition;
use crate::correlate::{correlate_all, AffectedWindow, LanguageScope};
use crate::detect::{ScreenSource, Trigger, TriggerKind};
use crate::error::{OracleError, SkipReason};
use crate::metric::MetricContext;
use crate::trace::{Step, Trace};
use crate::uitree::UiTree;
use crate::verdict::{
    aggregate, MetricKind, Summary, TriggerVerdict, VerdictEngine, VerdictRecord,
};
use serde::Serialize;
use std::time::Instant;

/// Screen content of a recorded run on disk.
///
/// Text falls back to OCR of the interaction capture when a step has no UI
/// tree dump.
pub struct RunScreens<'a> {
    assets: &'a TraceAssets,
    ocr: &'a dyn TextRecognition,
}

impl<'a> RunScreens<'a> {
    pub fn new(assets: &'a TraceAssets, ocr: &'a dyn TextRecognition) -> Self {
        Self { assets, ocr }
    }
}

impl ScreenSource for RunScreens<'_> {
    fn ui_tree(&self, step: &Step) -> Result<UiTree, OracleError> {
        let path = self.assets.ui_tree(step)?;
        UiTree::load(&path)
    }

    fn screen_text(&self, step: &Step) -> Result<Vec<String>, OracleError> {
        let err = match self.ui_tree(step) {
            Ok(tree) => return Ok(tree.texts()),
            Err(err @ OracleError::MissingAsset { .. }) => err,
            Err(err) => return Err(err),
        };
        let Some(screenshot) = step.screenshot.as_deref() else {
            return Err(err);
        };
        let capture = self
            .assets
            .screen(&assets::interaction_capture_name(screenshot))
            .map_err(|_| err)?;
        tracing::debug!(
            sequence_index = step.sequence_index,
            capture = %capture.display(),
            "no ui tree, reading screen text with ocr"
        );
        self.ocr.ocr_text(&capture)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub kinds: Vec<TriggerKind>,
    pub language_scope: LanguageScope,
    pub detailed: bool,
}

/// Triggers of one kind with their windows.
#[derive(Debug, Clone, Serialize)]
pub struct KindDetection {
    pub kind: TriggerKind,
    pub triggers: Vec<Trigger>,
    pub windows: Vec<AffectedWindow>,
    /// Steps and triggers that could not be used, in trace order.
    pub skipped: Vec<SkipReason>,
    #[serde(skip)]
    failed_windows: Vec<(Trigger, OracleError)>,
}

/// Output of the detect-only command.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub run_id: String,
    pub steps: usize,
    pub kinds: Vec<KindDetection>,
}

/// Everything the report sink consumes for one trace.
#[derive(Debug, Clone, Serialize)]
pub struct TraceVerdicts {
    pub run_id: String,
    pub summary: Summary,
    pub triggers: Vec<TriggerVerdict>,
    pub records: Vec<VerdictRecord>,
    pub skipped: Vec<SkipReason>,
}

fn detect_kind(
    trace: &Trace,
    screens: &dyn ScreenSource,
    kind: TriggerKind,
    scope: LanguageScope,
) -> KindDetection {
    let detection = kind.detector().detect(trace, screens);
    let mut skipped = detection.skipped;
    let mut windows = Vec::new();
    let mut failed_windows = Vec::new();
    for (trigger, window) in detection
        .triggers
        .iter()
        .zip(correlate_all(trace, &detection.triggers, scope))
    {
        match window {
            Ok(window) => windows.push(window),
            Err(err) => {
                tracing::warn!(
                    kind = %kind,
                    trigger_index = trigger.trigger_index,
                    error = %err,
                    "trigger has no usable window"
                );
                skipped.push(SkipReason::from_error(trigger.trigger_index, &err));
                failed_windows.push((trigger.clone(), err));
            }
        }
    }
    skipped.sort_by_key(|reason| reason.sequence_index);
    tracing::info!(
        kind = %kind,
        triggers = detection.triggers.len(),
        skipped = skipped.len(),
        "detection finished"
    );
    KindDetection {
        kind,
        triggers: detection.triggers,
        windows,
        skipped,
        failed_windows,
    }
}

/// Run detection and correlation for the requested kinds.
pub fn detect(
    trace: &Trace,
    screens: &dyn ScreenSource,
    options: &PipelineOptions,
) -> DetectionReport {
    DetectionReport {
        run_id: trace.run_id.clone(),
        steps: trace.steps.len(),
        kinds: options
            .kinds
            .iter()
            .map(|kind| detect_kind(trace, screens, *kind, options.language_scope))
            .collect(),
    }
}

fn judge_window(
    window: &AffectedWindow,
    ctx: &MetricContext<'_>,
    engine: &VerdictEngine,
) -> Vec<VerdictRecord> {
    let trigger = &window.trigger;
    trigger
        .kind
        .metric()
        .measure(window, ctx)
        .into_iter()
        .map(|evaluation| match evaluation.result {
            Ok(measurement) => engine.judge(trigger, measurement),
            Err(err) => engine.inconclusive(trigger, evaluation.metric, evaluation.screen, &err),
        })
        .collect()
}

/// Evaluate a loaded trace end to end.
pub fn evaluate(
    trace: &Trace,
    screens: &dyn ScreenSource,
    ctx: &MetricContext<'_>,
    options: &PipelineOptions,
) -> TraceVerdicts {
    let started = Instant::now();
    let engine = VerdictEngine::new(options.detailed);
    let detection = detect(trace, screens, options);

    let mut records = Vec::new();
    let mut triggers = Vec::new();
    let mut skipped = Vec::new();
    for kind in detection.kinds {
        for window in &kind.windows {
            let own = judge_window(window, ctx, &engine);
            triggers.push(aggregate(&window.trigger, &own));
            records.extend(own);
        }
        for (trigger, err) in &kind.failed_windows {
            let record = engine.inconclusive(trigger, MetricKind::primary(trigger.kind), None, err);
            triggers.push(aggregate(trigger, std::slice::from_ref(&record)));
            records.push(record);
        }
        skipped.extend(kind.skipped);
    }
    triggers.sort_by_key(|verdict| (verdict.kind, verdict.trigger_index));
    records.sort_by_key(|record| (record.kind, record.trigger_index));

    let summary = Summary::new(&options.kinds, &triggers, records.len(), skipped.len());
    tracing::info!(
        run_id = %trace.run_id,
        triggers = summary.totals.triggers,
        passed = summary.totals.passed,
        failed = summary.totals.failed,
        inconclusive = summary.totals.inconclusive,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "trace evaluated"
    );
    TraceVerdicts {
        run_id: trace.run_id.clone(),
        summary,
        triggers,
        records,
        skipped,
    }
}
