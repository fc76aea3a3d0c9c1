use super::{
    normalize_language_label, Detection, Detector, ScreenSource, SelectionPayload, TriggerKind,
};
use crate::error::SkipReason;
use crate::trace::{ComponentMetadata, Step, Trace};

const CONTEXT_WORD: &str = "language";
const LAUNCHER_WORD: &str = "launcher";

fn in_selection_context(component: &ComponentMetadata) -> bool {
    let mentions = |window: &Option<String>| {
        window
            .as_deref()
            .is_some_and(|name| name.to_lowercase().contains(CONTEXT_WORD))
    };
    mentions(&component.current_window) && mentions(&component.title_window)
}

/// Text of the following step when it is a launcher confirmation.
fn launcher_override(next: Option<&Step>) -> Option<&str> {
    let component = next?.component.as_ref()?;
    let launcher = component
        .activity
        .as_deref()
        .is_some_and(|activity| activity.to_lowercase().contains(LAUNCHER_WORD));
    let text = component.text().trim();
    (launcher && !text.is_empty()).then_some(text)
}

/// Language picks made on a language settings screen.
///
/// A selection is read when the trace enters the selection context (both
/// window names mention "language"). The following step is consulted as a
/// one-step lookahead: a launcher activity showing text confirms the actual
/// choice. Re-entering the context with a different label starts a new
/// trigger; the same label keeps the current one.
pub struct LanguageDetector;

impl Detector for LanguageDetector {
    fn kind(&self) -> TriggerKind {
        TriggerKind::LanguageSelection
    }

    fn detect(&self, trace: &Trace, _screens: &dyn ScreenSource) -> Detection {
        let mut detection = Detection::new(self.kind());
        let mut current: Option<String> = None;
        let mut armed = true;

        for (position, step) in trace.steps.iter().enumerate() {
            if detection.skip_malformed_component(step) {
                continue;
            }
            let Some(component) = step.component.as_ref() else {
                armed = true;
                continue;
            };
            if !in_selection_context(component) {
                armed = true;
                continue;
            }
            if !armed {
                continue;
            }

            let next = trace.steps.get(position + 1);
            let raw = launcher_override(next).unwrap_or_else(|| component.text());
            let label = normalize_language_label(raw);
            if label.is_empty() {
                detection.skip(SkipReason::new(
                    step.sequence_index,
                    "empty_language_label",
                    "language screen step has no label text",
                ));
                continue;
            }
            armed = false;
            if current.as_deref() == Some(label.as_str()) {
                continue;
            }
            detection.push_trigger(
                step.sequence_index,
                SelectionPayload::Language {
                    label: label.clone(),
                },
            );
            current = Some(label);
        }
        detection
    }
}
