//! Collaborator interfaces consumed by the metrics.
//!
//! The core never decodes images, runs OCR or classifies languages itself; it
//! talks to these traits. The binary wires the concrete implementations in the
//! submodules, tests wire fakes.
use crate::color::Lab;
use crate::error::OracleError;
use crate::uitree::Bounds;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod command;
pub mod image;
pub mod language;
pub mod ocr;

pub use language::LanguageNames;

/// Pixel-level analysis of screen captures.
pub trait ImageAnalysis {
    /// Structural similarity of the grayscale images, in `-1.0..=1.0`.
    fn similarity(&self, first: &Path, second: &Path) -> Result<f64, OracleError>;

    /// Representative Lab colour of a screen, ignoring the keyboard band when
    /// `keyboard` is set and the `exclude` rectangle when given.
    fn color_sample(
        &self,
        image: &Path,
        keyboard: bool,
        exclude: Option<Bounds>,
    ) -> Result<Lab, OracleError>;

    fn is_light(&self, image: &Path) -> Result<bool, OracleError>;

    fn has_keyboard(&self, image: &Path) -> Result<bool, OracleError>;
}

pub trait TextRecognition {
    /// Recognised text lines, trimmed and non-empty.
    fn ocr_text(&self, image: &Path) -> Result<Vec<String>, OracleError>;
}

/// One candidate language for a piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageGuess {
    #[serde(default)]
    pub name: String,
    pub code: String,
    /// Confidence on a 0-100 scale.
    pub confidence: f64,
}

pub trait LanguageIdentification {
    fn identify(&self, text: &str) -> Result<Vec<LanguageGuess>, OracleError>;
}

/// The set of collaborators handed to the metric stage for one run.
#[derive(Clone, Copy)]
pub struct Backends<'a> {
    pub image: &'a dyn ImageAnalysis,
    pub ocr: &'a dyn TextRecognition,
    pub language: &'a dyn LanguageIdentification,
    pub names: &'a LanguageNames,
}
