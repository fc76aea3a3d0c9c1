use super::{Detection, Detector, ScreenSource, SelectionPayload, TriggerKind};
use crate::error::OracleError;
use crate::trace::{Interaction, Trace};

/// Element ids the recorder assigns to back controls.
const BACK_ELEMENT_IDS: [&str; 1] = ["BACK_MODAL"];
/// Height of the bottom strip holding the system back button.
const BOTTOM_STRIP_PX: i64 = 200;

/// Taps on a back control or on the bottom-left system back region.
pub struct BackDetector;

impl Detector for BackDetector {
    fn kind(&self) -> TriggerKind {
        TriggerKind::BackNavigation
    }

    fn detect(&self, trace: &Trace, _screens: &dyn ScreenSource) -> Detection {
        let mut detection = Detection::new(self.kind());
        let width = i64::from(trace.device.width);
        let height = i64::from(trace.device.height);

        for step in &trace.steps {
            if detection.skip_malformed_component(step) {
                continue;
            }
            let (x, y) = match &step.command {
                Interaction::Tap { x, y } => (*x, *y),
                Interaction::Unrecognized { raw }
                    if raw.split_whitespace().any(|token| token == "tap") =>
                {
                    let err = OracleError::UnparsableCommand {
                        sequence_index: step.sequence_index,
                        reason: format!("tap without coordinates: {raw:?}"),
                    };
                    detection.skip_error(step.sequence_index, &err);
                    continue;
                }
                _ => continue,
            };
            let back_element = step
                .component
                .as_ref()
                .and_then(|component| component.element_id.as_deref())
                .is_some_and(|id| BACK_ELEMENT_IDS.contains(&id));
            let back_region = x < width / 3 && y >= height - BOTTOM_STRIP_PX;
            if back_element || back_region {
                detection.push_trigger(step.sequence_index, SelectionPayload::None);
            }
        }
        detection
    }
}
