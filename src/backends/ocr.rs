//! OCR through an external recogniser (tesseract by default).
use super::command::ExternalCommand;
use super::TextRecognition;
use crate::error::OracleError;
use anyhow::Result;
use std::path::Path;

pub const DEFAULT_OCR_COMMAND: &str = "tesseract {image} stdout";

pub struct CommandOcr {
    command: ExternalCommand,
}

impl CommandOcr {
    pub fn new(command: &str) -> Result<Self> {
        Ok(Self {
            command: ExternalCommand::parse(command)?,
        })
    }

    fn recognise(&self, image: &Path) -> Result<Vec<String>> {
        self.command.ensure_available()?;
        let stdout = self.command.run(&self.command.image_args(image), None)?;
        Ok(split_lines(&stdout))
    }
}

impl TextRecognition for CommandOcr {
    fn ocr_text(&self, image: &Path) -> Result<Vec<String>, OracleError> {
        self.recognise(image)
            .map_err(|err| OracleError::backend("ocr", format!("{err:#}")))
    }
}

fn split_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
