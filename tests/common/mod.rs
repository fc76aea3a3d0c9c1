//! Shared test infrastructure for integration tests.
//!
//! `TraceFixture` writes a recorded run to a temp directory: the execution
//! document, PNG screens generated with `image`, and uiautomator-style dumps.
#![allow(dead_code)]

use image::{Rgb, RgbImage};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const APP: &str = "com.example.mail";
pub const RUN: &str = "12";
const WIDTH: u32 = 54;
const HEIGHT: u32 = 96;

/// Synthetic screen contents.
#[derive(Debug, Clone, Copy)]
pub enum Screen {
    Light,
    Dark,
    Stripes,
    Columns,
}

impl Screen {
    fn render(self) -> RgbImage {
        match self {
            Screen::Light => RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([246, 246, 246])),
            Screen::Dark => RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([18, 18, 20])),
            Screen::Stripes => RgbImage::from_fn(WIDTH, HEIGHT, |_, y| {
                if (y / 4) % 2 == 0 {
                    Rgb([250, 250, 250])
                } else {
                    Rgb([30, 30, 30])
                }
            }),
            Screen::Columns => RgbImage::from_fn(WIDTH, HEIGHT, |x, _| {
                if (x / 5) % 2 == 0 {
                    Rgb([30, 30, 30])
                } else {
                    Rgb([250, 250, 250])
                }
            }),
        }
    }
}

pub fn screenshot(sequence_index: u32) -> String {
    format!("mail.User-Trace.{RUN}.mail_7_Main{sequence_index}_augmented.png")
}

pub fn plain_screen(sequence_index: u32) -> String {
    format!("mail.User-Trace.{RUN}.mail_7_Main{sequence_index}.png")
}

pub fn ui_tree_name(sequence_index: u32) -> String {
    format!("mail-7-{RUN}-User-Trace-{sequence_index}.xml")
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// A flat dump with one row per text.
pub fn ui_tree_xml(texts: &[&str]) -> String {
    let mut out = String::from(
        r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?><hierarchy rotation="0"><node index="0" text="" class="android.widget.FrameLayout" bounds="[0,0][1080,1920]">"#,
    );
    for (row, text) in texts.iter().enumerate() {
        let top = 100 + row * 150;
        out.push_str(&format!(
            r#"<node index="{row}" text="" class="android.widget.LinearLayout" bounds="[0,{top}][1080,{}]"><node index="0" text="{}" class="android.widget.TextView" bounds="[40,{}][700,{}]" /></node>"#,
            top + 150,
            escape(text),
            top + 20,
            top + 130,
        ));
    }
    out.push_str("</node></hierarchy>");
    out
}

/// One recorded step.
pub struct RecordedStep {
    sequence_index: u32,
    text_entry: String,
    component: Value,
    screen: Option<Screen>,
    texts: Option<Vec<String>>,
    ocr: Option<Vec<String>>,
}

pub fn step(sequence_index: u32, text_entry: &str) -> RecordedStep {
    RecordedStep {
        sequence_index,
        text_entry: text_entry.to_string(),
        component: Value::Null,
        screen: None,
        texts: None,
        ocr: None,
    }
}

impl RecordedStep {
    pub fn component(mut self, class_name: &str, element_id: &str, text: &str) -> Self {
        self.component = json!({
            "idXml": element_id,
            "name": class_name,
            "text": text,
            "currentWindow": "Main",
            "titleWindow": "Main",
            "activity": "MainActivity",
        });
        self
    }

    /// A row tapped on the language settings screen.
    pub fn language_row(mut self, label: &str) -> Self {
        self.component = json!({
            "idXml": "language_item",
            "name": "android.widget.TextView",
            "text": label,
            "currentWindow": "LanguageActivity",
            "titleWindow": "Choose Language",
            "activity": "SettingsActivity",
        });
        self
    }

    pub fn screen(mut self, screen: Screen) -> Self {
        self.screen = Some(screen);
        self
    }

    pub fn texts(mut self, texts: &[&str]) -> Self {
        self.texts = Some(texts.iter().map(|text| text.to_string()).collect());
        self
    }

    /// Lines the `cat`-based OCR command will print for this step's screen.
    pub fn ocr(mut self, lines: &[&str]) -> Self {
        self.ocr = Some(lines.iter().map(|line| line.to_string()).collect());
        self
    }
}

pub struct TraceFixture {
    root: TempDir,
}

impl TraceFixture {
    pub fn write(steps: Vec<RecordedStep>) -> Self {
        let root = tempfile::tempdir().expect("create temp trace root");
        let fixture = Self { root };
        fs::create_dir_all(fixture.run_dir()).expect("create run dir");

        let mut documents = Vec::new();
        for recorded in &steps {
            documents.push(json!({
                "sequenceStep": recorded.sequence_index,
                "screenshot": screenshot(recorded.sequence_index),
                "textEntry": recorded.text_entry,
                "dynGuiComponent": recorded.component,
            }));
            if let Some(screen) = recorded.screen {
                let path = fixture.run_dir().join(plain_screen(recorded.sequence_index));
                screen.render().save(&path).expect("write screen png");
            }
            if let Some(texts) = &recorded.texts {
                let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
                fixture.write_file(&ui_tree_name(recorded.sequence_index), &ui_tree_xml(&texts));
            }
            if let Some(lines) = &recorded.ocr {
                let name = format!("{}.txt", plain_screen(recorded.sequence_index));
                fixture.write_file(&name, &format!("{}\n", lines.join("\n")));
            }
        }
        let document = json!({
            "deviceDimensions": "1080x1920",
            "steps": documents,
        });
        fixture.write_file(
            &format!("Execution-{RUN}.json"),
            &serde_json::to_string_pretty(&document).expect("serialize trace"),
        );
        fixture
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn run_dir(&self) -> PathBuf {
        self.root.path().join(RUN)
    }

    pub fn write_file(&self, name: &str, contents: &str) {
        fs::write(self.run_dir().join(name), contents).expect("write run file");
    }

    /// Run `toracle <command> --trace-root <root> --app <APP> --run <RUN> <extra>`.
    pub fn toracle(&self, command: &str, extra: &[&str]) -> Output {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_toracle"));
        cmd.arg(command)
            .arg("--trace-root")
            .arg(self.root())
            .args(["--app", APP, "--run", RUN])
            .args(extra)
            .env_remove("RUST_LOG")
            .env_remove("TRACE_ORACLE_OCR_COMMAND")
            .env_remove("TRACE_ORACLE_LANG_COMMAND")
            // Keep a user-level config file out of the run.
            .env("XDG_CONFIG_HOME", self.root().join("xdg"))
            .env("HOME", self.root().join("home"));
        cmd.output().expect("run toracle")
    }

    /// Run with `--json` and parse stdout, failing with stderr on a non-zero exit.
    pub fn json(&self, command: &str, extra: &[&str]) -> Value {
        let mut args = vec!["--json"];
        args.extend_from_slice(extra);
        let output = self.toracle(command, &args);
        assert!(
            output.status.success(),
            "toracle {command} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("stdout is JSON")
    }
}

/// Records of one kind, in report order.
pub fn records<'a>(report: &'a Value, kind: &str) -> Vec<&'a Value> {
    report["records"]
        .as_array()
        .expect("records array")
        .iter()
        .filter(|record| record["kind"] == kind)
        .collect()
}
