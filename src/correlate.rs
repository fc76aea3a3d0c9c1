//! Screen correlation: which screens each trigger is judged on.
//!
//! Windows are index based. A trigger owns the steps after it (after the
//! settled screen for theme toggles) up to, not including, the next trigger of
//! the same kind.
use crate::assets;
use crate::detect::{SelectionPayload, Trigger, TriggerKind};
use crate::error::OracleError;
use crate::trace::{Step, Trace};
use serde::{Deserialize, Serialize};

/// Which accumulated screens a language selection is checked on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageScope {
    #[default]
    All,
    Next,
}

/// A plain screen capture and the UI-tree dumps that may describe it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenRef {
    pub sequence_index: u32,
    pub screen: String,
    #[serde(skip)]
    pub ui_tree: Vec<String>,
}

impl ScreenRef {
    pub fn for_step(step: &Step) -> Option<Self> {
        Some(Self {
            sequence_index: step.sequence_index,
            screen: step.screen()?,
            ui_tree: step.ui_tree.clone(),
        })
    }

    /// Screen of step `target`, named after the capture of `anchor`.
    ///
    /// Recorded steps supply their own dump names; unrecorded ones get names
    /// derived from the anchor's capture.
    fn derived(trace: &Trace, anchor: &Step, target: u32) -> Option<Self> {
        let screenshot = anchor.screenshot.as_deref()?;
        let screen = assets::screen_name_at(screenshot, anchor.sequence_index, target)?;
        let ui_tree = match trace.step(target) {
            Some(step) if !step.ui_tree.is_empty() => step.ui_tree.clone(),
            _ => assets::ui_tree_candidates(screenshot, &trace.run_id, target),
        };
        Some(Self {
            sequence_index: target,
            screen,
            ui_tree,
        })
    }
}

/// A screen plus the earlier screen used instead when a keyboard covers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenSlot {
    pub primary: ScreenRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyboard_fallback: Option<ScreenRef>,
}

impl ScreenSlot {
    fn derived(trace: &Trace, anchor: &Step, target: u32) -> Option<Self> {
        Some(Self {
            primary: ScreenRef::derived(trace, anchor, target)?,
            keyboard_fallback: target
                .checked_sub(1)
                .and_then(|prev| ScreenRef::derived(trace, anchor, prev)),
        })
    }
}

/// What the affected screens are compared against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reference {
    /// Back navigation: the screen two steps before against the trigger screen.
    Pair { before: ScreenSlot, after: ScreenSlot },
    /// Theme toggle: the settled screen.
    Settled { before: ScreenRef, settled: ScreenRef },
    /// Language selection: the selected label.
    Label { label: String },
    /// Input confirmation: the confirmation screen's UI tree.
    Confirmation { screen: ScreenRef },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffectedWindow {
    pub trigger: Trigger,
    pub reference: Reference,
    pub affected: Vec<ScreenRef>,
}

/// Screens of the steps with `after < index < until`.
fn screens_between(trace: &Trace, after: u32, until: Option<u32>) -> Vec<ScreenRef> {
    trace
        .steps
        .iter()
        .filter(|step| step.sequence_index > after)
        .take_while(|step| match until {
            Some(end) => step.sequence_index < end,
            None => true,
        })
        .filter_map(ScreenRef::for_step)
        .collect()
}

fn no_screen(trigger: &Trigger, what: &str) -> OracleError {
    OracleError::missing(
        format!("{what} for {} trigger at step {}", trigger.kind, trigger.trigger_index),
        Vec::new(),
    )
}

/// Build the window of one trigger.
///
/// `next_index` is the index of the next trigger of the same kind, if any.
pub fn correlate(
    trace: &Trace,
    trigger: &Trigger,
    next_index: Option<u32>,
    scope: LanguageScope,
) -> Result<AffectedWindow, OracleError> {
    let step = trace
        .step(trigger.trigger_index)
        .ok_or_else(|| no_screen(trigger, "step"))?;

    let (reference, affected) = match (trigger.kind, &trigger.payload) {
        (TriggerKind::BackNavigation, _) => {
            let before_index = trigger
                .trigger_index
                .checked_sub(2)
                .ok_or_else(|| no_screen(trigger, "screen two steps before"))?;
            let before = ScreenSlot::derived(trace, step, before_index)
                .ok_or_else(|| no_screen(trigger, "screen two steps before"))?;
            let after = ScreenSlot::derived(trace, step, trigger.trigger_index)
                .ok_or_else(|| no_screen(trigger, "trigger screen"))?;
            (Reference::Pair { before, after }, Vec::new())
        }
        (
            TriggerKind::ThemeToggle,
            SelectionPayload::Theme {
                before_screen,
                settled_index,
                settled_screen,
                ..
            },
        ) => {
            let settled = trace
                .step(*settled_index)
                .and_then(ScreenRef::for_step)
                .unwrap_or_else(|| ScreenRef {
                    sequence_index: *settled_index,
                    screen: settled_screen.clone(),
                    ui_tree: Vec::new(),
                });
            let before = ScreenRef {
                sequence_index: trigger.trigger_index,
                screen: before_screen.clone(),
                ui_tree: step.ui_tree.clone(),
            };
            let affected = screens_between(trace, *settled_index, next_index);
            (Reference::Settled { before, settled }, affected)
        }
        (TriggerKind::LanguageSelection, SelectionPayload::Language { label }) => {
            let mut affected = screens_between(trace, trigger.trigger_index, next_index);
            if scope == LanguageScope::Next {
                affected.truncate(1);
            }
            (
                Reference::Label {
                    label: label.clone(),
                },
                affected,
            )
        }
        (TriggerKind::UserInputConfirmation, _) => {
            let screen = ScreenRef::for_step(step).ok_or_else(|| no_screen(trigger, "screen"))?;
            (Reference::Confirmation { screen }, Vec::new())
        }
        (kind, payload) => {
            return Err(OracleError::backend(
                "correlator",
                format!("{kind} trigger carries unexpected payload {payload:?}"),
            ));
        }
    };

    tracing::debug!(
        kind = %trigger.kind,
        trigger_index = trigger.trigger_index,
        affected = affected.len(),
        "window correlated"
    );
    Ok(AffectedWindow {
        trigger: trigger.clone(),
        reference,
        affected,
    })
}

/// Windows for an ordered trigger list of one kind, one result per trigger.
pub fn correlate_all(
    trace: &Trace,
    triggers: &[Trigger],
    scope: LanguageScope,
) -> Vec<Result<AffectedWindow, OracleError>> {
    triggers
        .iter()
        .enumerate()
        .map(|(pos, trigger)| {
            let next_index = triggers.get(pos + 1).map(|next| next.trigger_index);
            correlate(trace, trigger, next_index, scope)
        })
        .collect()
}
