//! Synthetic traces and screen sources for detector and pipeline tests.
use super::ScreenSource;
use crate::error::OracleError;
use crate::trace::{ComponentMetadata, DeviceDimensions, Interaction, Step, Trace};
use crate::uitree::UiTree;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub fn capture(sequence_index: u32) -> String {
    format!("app.User-Trace.1.app_7_Main{sequence_index}_augmented.png")
}

pub fn step(sequence_index: u32, command: &str) -> Step {
    Step {
        sequence_index,
        screenshot: Some(capture(sequence_index)),
        ui_tree: Vec::new(),
        command: Interaction::parse(command),
        component: None,
        component_error: None,
    }
}

pub fn component(class_name: &str, element_id: &str, text: &str) -> ComponentMetadata {
    ComponentMetadata {
        element_id: Some(element_id.to_string()),
        class_name: Some(class_name.to_string()),
        text: Some(text.to_string()),
        ..ComponentMetadata::default()
    }
}

pub fn with_component(mut step: Step, component: ComponentMetadata) -> Step {
    step.component = Some(component);
    step
}

pub fn trace(steps: Vec<Step>) -> Trace {
    Trace {
        run_id: "1".to_string(),
        source: PathBuf::from("Execution-1.json"),
        device: DeviceDimensions {
            width: 1080,
            height: 1920,
        },
        steps,
    }
}

/// Render a flat UI tree whose rows hold the given texts.
pub fn xml(texts: &[&str]) -> String {
    let mut out = String::from(
        r#"<hierarchy rotation="0"><node text="" class="android.widget.FrameLayout" bounds="[0,0][1080,1920]">"#,
    );
    for (row, text) in texts.iter().enumerate() {
        let top = 100 + row * 150;
        out.push_str(&format!(
            r#"<node text="" class="android.widget.LinearLayout" bounds="[0,{top}][1080,{}]"><node text="{text}" class="android.widget.TextView" bounds="[40,{}][700,{}]" /><node text="" class="android.widget.Switch" bounds="[900,{}][1040,{}]" /></node>"#,
            top + 150,
            top + 20,
            top + 130,
            top + 20,
            top + 130
        ));
    }
    out.push_str("</node></hierarchy>");
    out
}

/// Screen source backed by in-memory UI trees keyed by sequence index.
#[derive(Default)]
pub struct FakeScreens {
    trees: BTreeMap<u32, String>,
}

impl FakeScreens {
    pub fn with(mut self, sequence_index: u32, texts: &[&str]) -> Self {
        self.trees.insert(sequence_index, xml(texts));
        self
    }
}

impl ScreenSource for FakeScreens {
    fn ui_tree(&self, step: &Step) -> Result<UiTree, OracleError> {
        self.trees
            .get(&step.sequence_index)
            .map(|xml| UiTree::parse(xml))
            .ok_or_else(|| {
                OracleError::missing(format!("ui tree for step {}", step.sequence_index), vec![])
            })
    }
}
