//! Language identification backends and the language-name table.
//!
//! Two transports are supported: an external command that reads text on stdin
//! and prints `[{"name","code","confidence"}]`, and a LibreTranslate-style HTTP
//! `/detect` endpoint. Both report confidence on a 0-100 scale.
use super::command::ExternalCommand;
use super::{LanguageGuess, LanguageIdentification};
use crate::error::OracleError;
use crate::templates;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct LanguageEntry {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "nativeName")]
    native_name: String,
}

/// English and native names per ISO-639 code.
#[derive(Debug, Clone, Default)]
pub struct LanguageNames {
    by_code: BTreeMap<String, Vec<String>>,
}

impl LanguageNames {
    /// The table shipped with the binary.
    pub fn bundled() -> Result<Self> {
        Self::from_json(templates::LANGUAGE_CODES_JSON).context("parse bundled language table")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parse {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let entries: BTreeMap<String, LanguageEntry> = serde_json::from_str(text)?;
        let by_code = entries
            .into_iter()
            .map(|(code, entry)| {
                let names = entry
                    .name
                    .split(',')
                    .chain(entry.native_name.split(','))
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect();
                (code.to_lowercase(), names)
            })
            .collect();
        Ok(Self { by_code })
    }

    /// Names for a code; region subtags (`pt-BR`) fall back to the base language.
    pub fn names(&self, code: &str) -> &[String] {
        let code = code.trim().to_lowercase();
        let base = code.split(['-', '_']).next().unwrap_or_default();
        self.by_code
            .get(&code)
            .or_else(|| self.by_code.get(base))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether `label` is one of the names of `code`, ignoring case.
    pub fn accepts(&self, code: &str, label: &str) -> bool {
        let label = label.trim().to_lowercase();
        self.names(code)
            .iter()
            .any(|name| name.to_lowercase() == label)
    }

    /// Display name for a guess: its own name, else the first table name, else the code.
    pub fn display_name(&self, guess: &LanguageGuess) -> String {
        if !guess.name.trim().is_empty() {
            return guess.name.clone();
        }
        self.names(&guess.code)
            .first()
            .cloned()
            .unwrap_or_else(|| guess.code.clone())
    }
}

fn backend_error(err: anyhow::Error) -> OracleError {
    OracleError::backend("language", format!("{err:#}"))
}

/// Identification through an external command.
pub struct CommandLanguageId {
    command: ExternalCommand,
}

impl CommandLanguageId {
    pub fn new(command: &str) -> Result<Self> {
        Ok(Self {
            command: ExternalCommand::parse(command)?,
        })
    }

    fn run(&self, text: &str) -> Result<Vec<LanguageGuess>> {
        let stdout = self.command.run(self.command.plain_args(), Some(text))?;
        serde_json::from_str(stdout.trim())
            .with_context(|| format!("parse {} output as guesses", self.command.program()))
    }
}

impl LanguageIdentification for CommandLanguageId {
    fn identify(&self, text: &str) -> Result<Vec<LanguageGuess>, OracleError> {
        self.run(text).map_err(backend_error)
    }
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    language: String,
    confidence: f64,
}

/// Identification through a LibreTranslate-compatible `/detect` endpoint.
pub struct HttpLanguageId {
    url: String,
}

impl HttpLanguageId {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }

    fn post(&self, text: &str) -> Result<Vec<LanguageGuess>> {
        let body = serde_json::json!({ "q": text });
        let mut response = ureq::post(self.url.as_str())
            .send_json(&body)
            .with_context(|| format!("POST {}", self.url))?;
        let detected: Vec<DetectResponse> = response
            .body_mut()
            .read_json()
            .with_context(|| format!("decode response from {}", self.url))?;
        tracing::debug!(url = %self.url, candidates = detected.len(), "language detect complete");
        Ok(detected
            .into_iter()
            .map(|item| LanguageGuess {
                name: String::new(),
                code: item.language,
                confidence: item.confidence,
            })
            .collect())
    }
}

impl LanguageIdentification for HttpLanguageId {
    fn identify(&self, text: &str) -> Result<Vec<LanguageGuess>, OracleError> {
        self.post(text).map_err(backend_error)
    }
}

/// Placeholder used when no identification backend is configured.
pub struct UnconfiguredLanguageId;

impl LanguageIdentification for UnconfiguredLanguageId {
    fn identify(&self, _text: &str) -> Result<Vec<LanguageGuess>, OracleError> {
        Err(backend_error(anyhow!(
            "no language identification command or url configured"
        )))
    }
}
