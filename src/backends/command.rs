//! External command invocation shared by the command-backed collaborators.
//!
//! Commands are configured as a single string and split with shell-words. An
//! `{image}` placeholder in any argument is replaced with the capture path; a
//! command without the placeholder gets the path appended.
use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;

const IMAGE_PLACEHOLDER: &str = "{image}";

#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
}

impl ExternalCommand {
    pub fn parse(command: &str) -> Result<Self> {
        let mut words =
            shell_words::split(command).with_context(|| format!("parse command: {command}"))?;
        if words.is_empty() {
            return Err(anyhow!("command is empty"));
        }
        let program = words.remove(0);
        Ok(Self {
            program,
            args: words,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Fail early when the program is not on `PATH`.
    pub fn ensure_available(&self) -> Result<()> {
        which::which(&self.program)
            .map(|_| ())
            .with_context(|| format!("locate {}", self.program))
    }

    /// Arguments with the image placeholder resolved.
    pub fn image_args(&self, image: &Path) -> Vec<String> {
        let image = image.display().to_string();
        let mut substituted = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains(IMAGE_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(IMAGE_PLACEHOLDER, &image)
                } else {
                    arg.clone()
                }
            })
            .collect();
        if !substituted {
            args.push(image);
        }
        args
    }

    pub fn plain_args(&self) -> &[String] {
        &self.args
    }

    /// Run to completion and return stdout; a non-zero exit is an error carrying stderr.
    pub fn run(&self, args: &[String], stdin: Option<&str>) -> Result<String> {
        let start = Instant::now();
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn command: {}", self.program))?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes())
                .with_context(|| format!("write stdin of {}", self.program))?;
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("wait for {}", self.program))?;
        let elapsed_ms = start.elapsed().as_millis();

        tracing::debug!(
            elapsed_ms,
            program = %self.program,
            input_bytes = stdin.map(str::len).unwrap_or(0),
            output_bytes = output.stdout.len(),
            "command complete"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "{} failed with status {}: {}",
                self.program,
                output.status,
                stderr.trim()
            ));
        }

        String::from_utf8(output.stdout)
            .with_context(|| format!("decode {} stdout as UTF-8", self.program))
    }
}
