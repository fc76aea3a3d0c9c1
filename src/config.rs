//! Run configuration for the oracle.
//!
//! A config file is optional; every field has a default so a partial file
//! only overrides what it names.
use crate::assets::TraceAssets;
use crate::backends::image::ImageSettings;
use crate::backends::ocr::DEFAULT_OCR_COMMAND;
use crate::correlate::LanguageScope;
use crate::detect::TriggerKind;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_SCHEMA_VERSION: u32 = 1;
pub const OCR_COMMAND_ENV: &str = "TRACE_ORACLE_OCR_COMMAND";
pub const LANG_COMMAND_ENV: &str = "TRACE_ORACLE_LANG_COMMAND";
const USER_CONFIG_DIR: &str = "trace-oracle";
const USER_CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OracleConfig {
    pub schema_version: u32,
    /// Full diagnostic lists in verdict records; `false` condenses them.
    pub detailed: bool,
    pub kinds: Vec<TriggerKind>,
    pub language_scope: LanguageScope,
    pub ocr: OcrConfig,
    pub language: LanguageConfig,
    pub keyboard: KeyboardConfig,
    pub image: ImageConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OcrConfig {
    /// Unset falls through to the environment, then to tesseract.
    pub command: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LanguageConfig {
    pub command: Option<String>,
    pub url: Option<String>,
    pub names_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeyboardConfig {
    pub command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageConfig {
    pub crop_top_px: u32,
    pub crop_bottom_px: u32,
    pub keyboard_fraction: f64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        default_config()
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        let settings = ImageSettings::default();
        Self {
            crop_top_px: settings.crop_top_px,
            crop_bottom_px: settings.crop_bottom_px,
            keyboard_fraction: settings.keyboard_fraction,
        }
    }
}

impl ImageConfig {
    pub fn settings(&self) -> ImageSettings {
        ImageSettings {
            crop_top_px: self.crop_top_px,
            crop_bottom_px: self.crop_bottom_px,
            keyboard_fraction: self.keyboard_fraction,
        }
    }
}

pub fn default_config() -> OracleConfig {
    OracleConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        detailed: true,
        kinds: TriggerKind::ALL.to_vec(),
        language_scope: LanguageScope::default(),
        ocr: OcrConfig::default(),
        language: LanguageConfig::default(),
        keyboard: KeyboardConfig::default(),
        image: ImageConfig::default(),
    }
}

/// Defaults as a file users can start from, with the OCR command spelled out.
pub fn config_stub() -> Result<String> {
    let mut config = default_config();
    config.ocr.command = Some(DEFAULT_OCR_COMMAND.to_string());
    serde_json::to_string_pretty(&config).context("serialize config stub")
}

pub fn load_config(path: &Path) -> Result<OracleConfig> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let config: OracleConfig =
        serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))?;
    validate_config(&config).with_context(|| format!("validate {}", path.display()))?;
    Ok(config)
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(USER_CONFIG_DIR).join(USER_CONFIG_FILE))
}

/// Locate and load the config for a run.
///
/// Returns the config together with the file it came from (`None` for
/// built-in defaults). An explicit path must exist.
pub fn resolve_config(
    explicit: Option<&Path>,
    assets: &TraceAssets,
) -> Result<(OracleConfig, Option<PathBuf>)> {
    if let Some(path) = explicit {
        return Ok((load_config(path)?, Some(path.to_path_buf())));
    }
    let candidates = [Some(assets.config_path()), user_config_path()];
    for path in candidates.into_iter().flatten() {
        if path.is_file() {
            tracing::debug!(path = %path.display(), "using config file");
            return Ok((load_config(&path)?, Some(path)));
        }
    }
    Ok((default_config(), None))
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Pick a command: explicit flag, then config value, then environment.
pub fn resolve_command(
    flag: Option<&str>,
    configured: Option<&str>,
    env_name: &str,
) -> Option<String> {
    flag.or(configured)
        .map(str::to_string)
        .or_else(|| non_empty_env(env_name))
}

/// The OCR command line for a run.
pub fn ocr_command(flag: Option<&str>, config: &OracleConfig) -> String {
    resolve_command(flag, config.ocr.command.as_deref(), OCR_COMMAND_ENV)
        .unwrap_or_else(|| DEFAULT_OCR_COMMAND.to_string())
}

fn ensure_command(field: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(command) if command.trim().is_empty() => {
            Err(anyhow!("{field} must not be an empty string"))
        }
        _ => Ok(()),
    }
}

pub fn validate_config(config: &OracleConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {} (expected {CONFIG_SCHEMA_VERSION})",
            config.schema_version
        ));
    }
    if config.kinds.is_empty() {
        return Err(anyhow!("kinds must name at least one trigger kind"));
    }
    let fraction = config.image.keyboard_fraction;
    if fraction.is_nan() || fraction <= 0.0 || fraction >= 1.0 {
        return Err(anyhow!(
            "image.keyboard_fraction must be between 0 and 1 (got {fraction})"
        ));
    }
    ensure_command("ocr.command", config.ocr.command.as_deref())?;
    ensure_command("language.command", config.language.command.as_deref())?;
    ensure_command("language.url", config.language.url.as_deref())?;
    ensure_command("keyboard.command", config.keyboard.command.as_deref())?;
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
