//! Theme toggle detection.
//!
//! A toggle is recognised either from a tap on a screen mentioning the theme
//! or from a tap on a toggle widget sharing a row with a theme label. The
//! change counts as settled at the first later screen whose UI-tree text is at
//! least [`SETTLE_RATIO_MIN`] similar to the baseline captured at the trigger.
use super::{Detection, Detector, ScreenSource, SelectionPayload, TriggerKind};
use crate::error::SkipReason;
use crate::trace::{Interaction, Step, Trace};
use crate::verdict::SETTLE_RATIO_MIN;
use similar::TextDiff;

pub const THEME_KEYWORDS: [&str; 2] = ["theme", "night"];
const TOGGLE_CLASSES: [&str; 4] = ["switch", "radio", "checkbox", "toggle"];

/// Sequence-similarity ratio of two text lists, in `0.0..=1.0`.
pub fn settle_ratio(first: &[String], second: &[String]) -> f64 {
    let first: Vec<&str> = first.iter().map(String::as_str).collect();
    let second: Vec<&str> = second.iter().map(String::as_str).collect();
    f64::from(TextDiff::from_slices(&first, &second).ratio())
}

fn mentions_theme(texts: &[String]) -> bool {
    texts.iter().any(|text| {
        let text = text.to_lowercase();
        THEME_KEYWORDS.iter().any(|keyword| text.contains(keyword))
    })
}

fn sorted(mut texts: Vec<String>) -> Vec<String> {
    texts.sort();
    texts
}

#[derive(Debug, Clone)]
struct Pending {
    trigger_index: u32,
    baseline_index: u32,
    before_screen: String,
    baseline: Vec<String>,
}

#[derive(Debug)]
enum ThemeState {
    Searching,
    /// Fired on the keyword rule; confirmation starts with the next step.
    TriggerFound(Pending),
    Confirming(Pending),
    /// Settled; re-arms once a screen no longer mentions the theme.
    Done,
}

pub struct ThemeDetector;

impl ThemeDetector {
    /// Check a step for a theme trigger while searching.
    fn search(
        &self,
        trace: &Trace,
        position: usize,
        screens: &dyn ScreenSource,
        detection: &mut Detection,
    ) -> ThemeState {
        let step = &trace.steps[position];
        if detection.skip_malformed_component(step) {
            return ThemeState::Searching;
        }
        let Interaction::Tap { y, .. } = step.command else {
            return ThemeState::Searching;
        };
        let Some(before_screen) = step.screen() else {
            return ThemeState::Searching;
        };

        let texts = match screens.screen_text(step) {
            Ok(texts) => texts,
            Err(err) => {
                detection.skip_error(step.sequence_index, &err);
                return ThemeState::Searching;
            }
        };

        if mentions_theme(&texts) {
            // The screen the user returns to is the one before the settings screen.
            let baseline_step = position
                .checked_sub(1)
                .map(|prev| &trace.steps[prev])
                .unwrap_or(step);
            return match screens.ui_tree(baseline_step) {
                Ok(tree) => ThemeState::TriggerFound(Pending {
                    trigger_index: step.sequence_index,
                    baseline_index: baseline_step.sequence_index,
                    before_screen,
                    baseline: sorted(tree.texts()),
                }),
                Err(err) => {
                    detection.skip_error(baseline_step.sequence_index, &err);
                    ThemeState::Searching
                }
            };
        }

        let toggle = step.component.as_ref().is_some_and(|component| {
            let class = component.class_name.as_deref().unwrap_or("").to_lowercase();
            TOGGLE_CLASSES.iter().any(|name| class.contains(name))
        });
        if !toggle {
            return ThemeState::Searching;
        }
        match screens.ui_tree(step) {
            Ok(tree) => {
                let on_theme_row = tree
                    .keyword_row_bounds(&THEME_KEYWORDS)
                    .is_some_and(|row| row.contains_y(y));
                if on_theme_row {
                    ThemeState::Confirming(Pending {
                        trigger_index: step.sequence_index,
                        baseline_index: step.sequence_index,
                        before_screen,
                        baseline: sorted(tree.texts()),
                    })
                } else {
                    ThemeState::Searching
                }
            }
            Err(err) => {
                detection.skip_error(step.sequence_index, &err);
                ThemeState::Searching
            }
        }
    }

    fn confirm(
        &self,
        step: &Step,
        pending: Pending,
        screens: &dyn ScreenSource,
        detection: &mut Detection,
    ) -> ThemeState {
        let Some(settled_screen) = step.screen() else {
            return ThemeState::Confirming(pending);
        };
        let texts = match screens.ui_tree(step) {
            Ok(tree) => sorted(tree.texts()),
            Err(err) => {
                detection.skip_error(step.sequence_index, &err);
                return ThemeState::Confirming(pending);
            }
        };
        let ratio = settle_ratio(&texts, &pending.baseline);
        tracing::debug!(
            trigger_index = pending.trigger_index,
            sequence_index = step.sequence_index,
            ratio,
            "theme settle check"
        );
        if ratio < SETTLE_RATIO_MIN {
            return ThemeState::Confirming(pending);
        }
        detection.push_trigger(
            pending.trigger_index,
            SelectionPayload::Theme {
                baseline_index: pending.baseline_index,
                before_screen: pending.before_screen,
                settled_index: step.sequence_index,
                settled_screen,
            },
        );
        ThemeState::Done
    }
}

impl Detector for ThemeDetector {
    fn kind(&self) -> TriggerKind {
        TriggerKind::ThemeToggle
    }

    fn detect(&self, trace: &Trace, screens: &dyn ScreenSource) -> Detection {
        let mut detection = Detection::new(self.kind());
        let mut state = ThemeState::Searching;

        for (position, step) in trace.steps.iter().enumerate() {
            if step.screenshot.is_none() {
                continue;
            }
            state = match state {
                ThemeState::Searching => {
                    match self.search(trace, position, screens, &mut detection) {
                        ThemeState::Confirming(pending) => {
                            self.confirm(step, pending, screens, &mut detection)
                        }
                        other => other,
                    }
                }
                ThemeState::TriggerFound(pending) | ThemeState::Confirming(pending) => {
                    self.confirm(step, pending, screens, &mut detection)
                }
                ThemeState::Done => match screens.screen_text(step) {
                    Ok(texts) if !mentions_theme(&texts) => ThemeState::Searching,
                    Ok(_) => ThemeState::Done,
                    Err(err) => {
                        detection.skip_error(step.sequence_index, &err);
                        ThemeState::Done
                    }
                },
            };
        }

        if let ThemeState::TriggerFound(pending) | ThemeState::Confirming(pending) = state {
            detection.skip(SkipReason::new(
                pending.trigger_index,
                "unsettled_theme_trigger",
                format!(
                    "no later screen reached {SETTLE_RATIO_MIN:.2} text similarity with step {}",
                    pending.baseline_index
                ),
            ));
        }
        detection
    }
}
