//! Trigger detection: find the steps that initiate a tracked behavior.
//!
//! Each kind has its own detector. Detectors walk the trace strictly in order
//! and never fail as a whole: a step they cannot interpret becomes a
//! `SkipReason` next to the triggers they did find.
use crate::error::{OracleError, SkipReason};
use crate::trace::{Step, Trace};
use crate::uitree::UiTree;
use serde::{Deserialize, Serialize};
use std::fmt;

mod back;
mod input;
mod language;
mod theme;

pub use back::BackDetector;
pub use input::InputDetector;
pub use language::LanguageDetector;
pub use theme::ThemeDetector;

/// Behavior tracked by the oracle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum TriggerKind {
    BackNavigation,
    ThemeToggle,
    LanguageSelection,
    UserInputConfirmation,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 4] = [
        TriggerKind::BackNavigation,
        TriggerKind::ThemeToggle,
        TriggerKind::LanguageSelection,
        TriggerKind::UserInputConfirmation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BackNavigation => "back_navigation",
            Self::ThemeToggle => "theme_toggle",
            Self::LanguageSelection => "language_selection",
            Self::UserInputConfirmation => "user_input_confirmation",
        }
    }

    pub fn detector(self) -> Box<dyn Detector> {
        match self {
            Self::BackNavigation => Box::new(BackDetector),
            Self::ThemeToggle => Box::new(ThemeDetector),
            Self::LanguageSelection => Box::new(LanguageDetector),
            Self::UserInputConfirmation => Box::new(InputDetector),
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An edit-field entry recorded before a confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpectedInput {
    pub sequence_index: u32,
    pub text: String,
}

/// Kind-specific data captured when a trigger fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SelectionPayload {
    None,
    /// Normalized language label chosen by the user.
    Language { label: String },
    /// Where the theme change settled.
    Theme {
        baseline_index: u32,
        before_screen: String,
        settled_index: u32,
        settled_screen: String,
    },
    /// Edit-field text expected on the confirmation screen.
    Inputs { expected: Vec<ExpectedInput> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trigger {
    pub kind: TriggerKind,
    pub trigger_index: u32,
    pub payload: SelectionPayload,
}

/// Output of one detector over one trace.
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub kind: TriggerKind,
    pub triggers: Vec<Trigger>,
    pub skipped: Vec<SkipReason>,
}

impl Detection {
    pub fn new(kind: TriggerKind) -> Self {
        Self {
            kind,
            triggers: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn push_trigger(&mut self, trigger_index: u32, payload: SelectionPayload) {
        tracing::debug!(kind = %self.kind, trigger_index, "trigger detected");
        self.triggers.push(Trigger {
            kind: self.kind,
            trigger_index,
            payload,
        });
    }

    fn skip(&mut self, reason: SkipReason) {
        tracing::debug!(
            kind = %self.kind,
            sequence_index = reason.sequence_index,
            code = %reason.code,
            "step skipped"
        );
        self.skipped.push(reason);
    }

    fn skip_error(&mut self, sequence_index: u32, err: &OracleError) {
        self.skip(SkipReason::from_error(sequence_index, err));
    }

    /// Skip a step whose component metadata failed to parse; returns whether it did.
    fn skip_malformed_component(&mut self, step: &Step) -> bool {
        let Some(reason) = step.component_error.as_deref() else {
            return false;
        };
        let err = OracleError::UnparsableCommand {
            sequence_index: step.sequence_index,
            reason: format!("dynGuiComponent: {reason}"),
        };
        self.skip_error(step.sequence_index, &err);
        true
    }
}

/// Access to the per-step screen content detectors need.
pub trait ScreenSource {
    fn ui_tree(&self, step: &Step) -> Result<UiTree, OracleError>;

    /// Text visible on the step's screen.
    fn screen_text(&self, step: &Step) -> Result<Vec<String>, OracleError> {
        Ok(self.ui_tree(step)?.texts())
    }
}

pub trait Detector {
    fn kind(&self) -> TriggerKind;

    fn detect(&self, trace: &Trace, screens: &dyn ScreenSource) -> Detection;
}

/// Reduce a language label to the bare language name.
///
/// `"Español (Spain), Latin America"` becomes `"Español"`.
pub fn normalize_language_label(label: &str) -> String {
    let label = label.split(',').next().unwrap_or_default();
    let label = label.split('(').next().unwrap_or_default();
    label.trim().to_string()
}

#[cfg(test)]
pub(crate) mod fixtures;
