//! Verification metrics: turn an affected window into raw measurements.
//!
//! Metrics never apply thresholds; they hand `Measurement`s to the verdict
//! engine. Each comparison carries its own result, so a missing asset or a
//! failing backend only makes that comparison inconclusive.
use crate::assets::TraceAssets;
use crate::backends::Backends;
use crate::correlate::{AffectedWindow, ScreenRef};
use crate::detect::TriggerKind;
use crate::error::OracleError;
use crate::uitree::UiTree;
use crate::verdict::{Measurement, MetricKind};
use std::path::PathBuf;

mod back;
mod input;
mod language;
mod theme;

pub use back::BackMetric;
pub use input::InputMetric;
pub use language::LanguageMetric;
pub use theme::ThemeMetric;

/// Everything a metric may read for one run.
#[derive(Clone, Copy)]
pub struct MetricContext<'a> {
    pub assets: &'a TraceAssets,
    pub backends: Backends<'a>,
}

impl MetricContext<'_> {
    pub fn screen_path(&self, screen: &ScreenRef) -> Result<PathBuf, OracleError> {
        self.assets.screen(&screen.screen)
    }

    pub fn ui_tree(&self, screen: &ScreenRef) -> Result<UiTree, OracleError> {
        let path = self
            .assets
            .ui_tree_from(screen.sequence_index, &screen.ui_tree)?;
        UiTree::load(&path)
    }
}

/// One comparison: the measurement, or the error that prevented it.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub metric: MetricKind,
    pub screen: Option<String>,
    pub result: Result<Measurement, OracleError>,
}

impl Evaluation {
    fn new(metric: MetricKind, screen: &str, result: Result<Measurement, OracleError>) -> Self {
        Self {
            metric,
            screen: Some(screen.to_string()),
            result,
        }
    }

    fn failed(metric: MetricKind, screen: Option<&str>, err: OracleError) -> Self {
        Self {
            metric,
            screen: screen.map(str::to_string),
            result: Err(err),
        }
    }
}

pub trait Metric {
    fn measure(&self, window: &AffectedWindow, ctx: &MetricContext<'_>) -> Vec<Evaluation>;
}

impl TriggerKind {
    pub fn metric(self) -> Box<dyn Metric> {
        match self {
            Self::BackNavigation => Box::new(BackMetric),
            Self::ThemeToggle => Box::new(ThemeMetric),
            Self::LanguageSelection => Box::new(LanguageMetric),
            Self::UserInputConfirmation => Box::new(InputMetric),
        }
    }
}

fn unexpected_reference(window: &AffectedWindow) -> OracleError {
    OracleError::backend(
        "metric",
        format!(
            "{} window for step {} has an unexpected reference",
            window.trigger.kind, window.trigger.trigger_index
        ),
    )
}

#[cfg(test)]
pub(crate) mod fakes;
