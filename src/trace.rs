//! Trace loading: the recorded run as an ordered sequence of steps.
//!
//! The execution document is parsed eagerly. Missing or unparsable device
//! metadata and step lists are fatal; malformed component metadata only marks
//! the offending step so detection can skip it.
use crate::assets;
use crate::error::OracleError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Recorded device screen size, parsed from `"WxH"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceDimensions {
    pub width: u32,
    pub height: u32,
}

impl DeviceDimensions {
    pub fn parse(raw: &str) -> Option<Self> {
        let (width, height) = raw.trim().split_once(['x', 'X'])?;
        Some(Self {
            width: width.trim().parse().ok()?,
            height: height.trim().parse().ok()?,
        })
    }
}

/// Interaction recorded for a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interaction {
    Tap { x: i64, y: i64 },
    Type { text: String },
    None,
    Unrecognized { raw: String },
}

impl Interaction {
    /// Parse a `textEntry` command (`"tap X Y"`, `"type ..."`, `"none"`).
    ///
    /// A leading `type` keeps the rest of the entry as literal text, so typed
    /// words are never read as commands.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        let Some(first) = tokens.first() else {
            return Self::None;
        };
        if *first == "type" {
            let text = trimmed["type".len()..].trim().to_string();
            return Self::Type { text };
        }
        if let Some(pos) = tokens.iter().position(|token| *token == "tap") {
            let coords = (tokens.get(pos + 1), tokens.get(pos + 2));
            if let (Some(x), Some(y)) = coords {
                if let (Ok(x), Ok(y)) = (x.parse::<i64>(), y.parse::<i64>()) {
                    return Self::Tap { x, y };
                }
            }
            return Self::Unrecognized {
                raw: trimmed.to_string(),
            };
        }
        if tokens.contains(&"none") {
            return Self::None;
        }
        Self::Unrecognized {
            raw: trimmed.to_string(),
        }
    }
}

/// Metadata of the component the step interacted with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentMetadata {
    #[serde(default, rename = "idXml")]
    pub element_id: Option<String>,
    #[serde(default, rename = "name")]
    pub class_name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "currentWindow")]
    pub current_window: Option<String>,
    #[serde(default, rename = "titleWindow")]
    pub title_window: Option<String>,
    #[serde(default)]
    pub activity: Option<String>,
}

impl ComponentMetadata {
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Class name without its package qualifier (`android.widget.Button` -> `Button`).
    pub fn simple_class_name(&self) -> &str {
        let class = self.class_name.as_deref().unwrap_or("");
        class.rsplit('.').next().unwrap_or(class)
    }
}

/// One recorded interaction step.
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub sequence_index: u32,
    pub screenshot: Option<String>,
    /// UI-tree dump names in resolution order.
    pub ui_tree: Vec<String>,
    pub command: Interaction,
    pub component: Option<ComponentMetadata>,
    /// Set when the component metadata was present but could not be parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_error: Option<String>,
}

impl Step {
    /// Plain screen name (`_augmented` suffix stripped).
    pub fn screen(&self) -> Option<String> {
        self.screenshot.as_deref().map(assets::plain_screen_name)
    }
}

/// A loaded trace for a single run.
#[derive(Debug, Clone)]
pub struct Trace {
    pub run_id: String,
    pub source: PathBuf,
    pub device: DeviceDimensions,
    pub steps: Vec<Step>,
}

impl Trace {
    /// Look up a step by its sequence index.
    pub fn step(&self, sequence_index: u32) -> Option<&Step> {
        self.steps
            .binary_search_by_key(&sequence_index, |step| step.sequence_index)
            .ok()
            .map(|pos| &self.steps[pos])
    }
}

#[derive(Debug, Deserialize)]
struct TraceDocument {
    #[serde(default, rename = "deviceDimensions")]
    device_dimensions: Option<Value>,
    #[serde(default)]
    steps: Option<Vec<Value>>,
}

/// Load and parse `Execution-<run>.json`.
pub fn load_trace(path: &Path, run_id: &str) -> Result<Trace, OracleError> {
    let text = fs::read_to_string(path)
        .map_err(|err| OracleError::malformed(path, format!("read failed: {err}")))?;
    parse_trace(&text, path, run_id)
}

pub fn parse_trace(text: &str, path: &Path, run_id: &str) -> Result<Trace, OracleError> {
    let doc: TraceDocument = serde_json::from_str(text)
        .map_err(|err| OracleError::malformed(path, format!("invalid JSON: {err}")))?;
    let raw_dims = doc
        .device_dimensions
        .ok_or_else(|| OracleError::malformed(path, "deviceDimensions missing"))?;
    let device = raw_dims
        .as_str()
        .and_then(DeviceDimensions::parse)
        .ok_or_else(|| {
            OracleError::malformed(path, format!("deviceDimensions not WxH: {raw_dims}"))
        })?;
    let raw_steps = doc
        .steps
        .ok_or_else(|| OracleError::malformed(path, "steps missing"))?;

    let mut steps: Vec<Step> = Vec::with_capacity(raw_steps.len());
    for (pos, raw) in raw_steps.iter().enumerate() {
        let step = parse_step(raw, run_id)
            .map_err(|reason| OracleError::malformed(path, format!("step #{pos}: {reason}")))?;
        if let Some(prev) = steps.last() {
            if step.sequence_index <= prev.sequence_index {
                return Err(OracleError::malformed(
                    path,
                    format!(
                        "sequenceStep {} does not increase after {}",
                        step.sequence_index, prev.sequence_index
                    ),
                ));
            }
        }
        steps.push(step);
    }

    tracing::debug!(steps = steps.len(), run_id, "trace loaded");
    Ok(Trace {
        run_id: run_id.to_string(),
        source: path.to_path_buf(),
        device,
        steps,
    })
}

fn parse_step(raw: &Value, run_id: &str) -> Result<Step, String> {
    let object = raw.as_object().ok_or("step is not an object")?;
    let sequence_index = match object.get("sequenceStep") {
        Some(Value::Number(num)) => num.as_u64(),
        Some(Value::String(text)) => text.trim().parse::<u64>().ok(),
        _ => None,
    }
    .and_then(|value| u32::try_from(value).ok())
    .ok_or("sequenceStep missing or not a non-negative integer")?;

    let screenshot = object
        .get("screenshot")
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|name| !name.trim().is_empty());
    let command = object
        .get("textEntry")
        .and_then(Value::as_str)
        .map(Interaction::parse)
        .unwrap_or(Interaction::None);

    let (component, component_error) = match object.get("dynGuiComponent") {
        None | Some(Value::Null) => (None, None),
        Some(value) => match ComponentMetadata::deserialize(value) {
            Ok(component) => (Some(component), None),
            Err(err) => (None, Some(err.to_string())),
        },
    };

    let ui_tree = screenshot
        .as_deref()
        .map(|name| assets::ui_tree_candidates(name, run_id, sequence_index))
        .unwrap_or_default();

    Ok(Step {
        sequence_index,
        screenshot,
        ui_tree,
        command,
        component,
        component_error,
    })
}

#[cfg(test)]
#[path = "trace_tests.rs"]
mod tests;
