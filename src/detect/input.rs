use super::{Detection, Detector, ExpectedInput, ScreenSource, SelectionPayload, TriggerKind};
use crate::trace::{Interaction, Step, Trace};

const CONFIRM_CLASSES: [&str; 3] = ["Button", "ImageButton", "TextView"];
const CONFIRM_WORDS: [&str; 5] = ["done", "set", "ok", "save", "add"];
const EDIT_CLASS: &str = "EditText";

fn is_confirmation(step: &Step) -> bool {
    let Some(component) = step.component.as_ref() else {
        return false;
    };
    let element_id = component
        .element_id
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    CONFIRM_CLASSES.contains(&component.simple_class_name())
        && CONFIRM_WORDS.iter().any(|word| element_id.contains(word))
}

/// Text entered into an edit field at this step, if any.
fn entered_text(step: &Step) -> Option<String> {
    let component = step.component.as_ref()?;
    if component.simple_class_name() != EDIT_CLASS {
        return None;
    }
    let text = match &step.command {
        Interaction::Type { text } if !text.trim().is_empty() => text.trim(),
        Interaction::None => component.text().trim(),
        _ => return None,
    };
    (!text.is_empty()).then(|| text.to_string())
}

/// Confirmation taps and the edit-field entries each one confirms.
///
/// The entries expected for a trigger are those recorded strictly between the
/// previous trigger (or the start of the trace) and the trigger itself.
pub struct InputDetector;

impl Detector for InputDetector {
    fn kind(&self) -> TriggerKind {
        TriggerKind::UserInputConfirmation
    }

    fn detect(&self, trace: &Trace, _screens: &dyn ScreenSource) -> Detection {
        let mut detection = Detection::new(self.kind());
        let mut pending: Vec<ExpectedInput> = Vec::new();

        for step in &trace.steps {
            if detection.skip_malformed_component(step) {
                continue;
            }
            if let Some(text) = entered_text(step) {
                pending.push(ExpectedInput {
                    sequence_index: step.sequence_index,
                    text,
                });
                continue;
            }
            if is_confirmation(step) {
                let expected = std::mem::take(&mut pending);
                detection.push_trigger(step.sequence_index, SelectionPayload::Inputs { expected });
            }
        }
        detection
    }
}
