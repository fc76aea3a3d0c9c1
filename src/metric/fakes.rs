//! In-memory collaborators and an on-disk run directory for metric tests.
//!
//! Fakes answer by file name, so tests only need empty placeholder files for
//! screens and real XML for UI trees.
use crate::assets::TraceAssets;
use crate::backends::{
    Backends, ImageAnalysis, LanguageGuess, LanguageIdentification, LanguageNames,
    TextRecognition,
};
use crate::color::Lab;
use crate::correlate::ScreenRef;
use crate::detect::fixtures::xml;
use crate::error::OracleError;
use crate::uitree::Bounds;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn key(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn screen_ref(sequence_index: u32) -> ScreenRef {
    ScreenRef {
        sequence_index,
        screen: format!("screen{sequence_index}.png"),
        ui_tree: vec![format!("screen{sequence_index}.xml")],
    }
}

/// A temporary `<root>/1/` run directory.
pub struct RunDir {
    _root: TempDir,
    pub assets: TraceAssets,
}

impl RunDir {
    pub fn create() -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let assets = TraceAssets::new(root.path(), "1");
        fs::create_dir_all(assets.run_dir()).expect("create run dir");
        Self {
            _root: root,
            assets,
        }
    }

    pub fn screen(self, sequence_index: u32) -> Self {
        let path = self.assets.run_dir().join(format!("screen{sequence_index}.png"));
        fs::write(path, b"").expect("write screen");
        self
    }

    pub fn tree(self, sequence_index: u32, texts: &[&str]) -> Self {
        let path = self.assets.run_dir().join(format!("screen{sequence_index}.xml"));
        fs::write(path, xml(texts)).expect("write ui tree");
        self
    }

    pub fn file(self, name: &str, contents: &str) -> Self {
        fs::write(self.assets.run_dir().join(name), contents).expect("write run file");
        self
    }

    pub fn raw_tree(self, sequence_index: u32, xml: &str) -> Self {
        let path = self.assets.run_dir().join(format!("screen{sequence_index}.xml"));
        fs::write(path, xml).expect("write ui tree");
        self
    }
}

#[derive(Default)]
pub struct FakeImage {
    pub similarity: BTreeMap<(String, String), f64>,
    pub light: BTreeSet<String>,
    pub keyboard: BTreeSet<String>,
    pub colors: BTreeMap<String, Lab>,
    /// `(screen, keyboard, exclude)` of every colour sample taken.
    pub samples: RefCell<Vec<(String, bool, Option<Bounds>)>>,
}

impl FakeImage {
    pub fn similar(mut self, first: &str, second: &str, score: f64) -> Self {
        self.similarity
            .insert((first.to_string(), second.to_string()), score);
        self
    }

    pub fn light(mut self, screen: &str) -> Self {
        self.light.insert(screen.to_string());
        self
    }

    pub fn keyboard(mut self, screen: &str) -> Self {
        self.keyboard.insert(screen.to_string());
        self
    }

    pub fn color(mut self, screen: &str, lab: Lab) -> Self {
        self.colors.insert(screen.to_string(), lab);
        self
    }
}

impl ImageAnalysis for FakeImage {
    fn similarity(&self, first: &Path, second: &Path) -> Result<f64, OracleError> {
        self.similarity
            .get(&(key(first), key(second)))
            .copied()
            .ok_or_else(|| OracleError::backend("image", "no similarity scripted"))
    }

    fn color_sample(
        &self,
        image: &Path,
        keyboard: bool,
        exclude: Option<Bounds>,
    ) -> Result<Lab, OracleError> {
        let name = key(image);
        self.samples
            .borrow_mut()
            .push((name.clone(), keyboard, exclude));
        self.colors
            .get(&name)
            .copied()
            .ok_or_else(|| OracleError::backend("image", format!("no colour for {name}")))
    }

    fn is_light(&self, image: &Path) -> Result<bool, OracleError> {
        Ok(self.light.contains(&key(image)))
    }

    fn has_keyboard(&self, image: &Path) -> Result<bool, OracleError> {
        Ok(self.keyboard.contains(&key(image)))
    }
}

#[derive(Default)]
pub struct FakeOcr {
    pub lines: BTreeMap<String, Vec<String>>,
}

impl FakeOcr {
    pub fn with(mut self, screen: &str, lines: &[&str]) -> Self {
        self.lines.insert(
            screen.to_string(),
            lines.iter().map(|line| line.to_string()).collect(),
        );
        self
    }
}

impl TextRecognition for FakeOcr {
    fn ocr_text(&self, image: &Path) -> Result<Vec<String>, OracleError> {
        self.lines
            .get(&key(image))
            .cloned()
            .ok_or_else(|| OracleError::backend("ocr", format!("no text for {}", key(image))))
    }
}

/// Identifies text by exact lookup; unknown text is a backend failure.
#[derive(Default)]
pub struct FakeLanguage {
    pub guesses: BTreeMap<String, Vec<LanguageGuess>>,
}

impl FakeLanguage {
    pub fn with(mut self, text: &str, code: &str, confidence: f64) -> Self {
        self.guesses.entry(text.to_string()).or_default().push(LanguageGuess {
            name: String::new(),
            code: code.to_string(),
            confidence,
        });
        self
    }
}

impl LanguageIdentification for FakeLanguage {
    fn identify(&self, text: &str) -> Result<Vec<LanguageGuess>, OracleError> {
        self.guesses
            .get(text)
            .cloned()
            .ok_or_else(|| OracleError::backend("language", format!("cannot identify {text:?}")))
    }
}

pub struct FakeBackends {
    pub image: FakeImage,
    pub ocr: FakeOcr,
    pub language: FakeLanguage,
    pub names: LanguageNames,
}

impl Default for FakeBackends {
    fn default() -> Self {
        Self {
            image: FakeImage::default(),
            ocr: FakeOcr::default(),
            language: FakeLanguage::default(),
            names: LanguageNames::bundled().expect("bundled language names"),
        }
    }
}

impl FakeBackends {
    pub fn backends(&self) -> Backends<'_> {
        Backends {
            image: &self.image,
            ocr: &self.ocr,
            language: &self.language,
            names: &self.names,
        }
    }
}
