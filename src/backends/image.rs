//! Image analysis backed by the `image` crate.
use super::command::ExternalCommand;
use super::ImageAnalysis;
use crate::color::Lab;
use crate::error::OracleError;
use crate::uitree::Bounds;
use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, GrayImage};
use std::path::Path;

const SSIM_WINDOW: u32 = 7;
const SSIM_K1: f64 = 0.01;
const SSIM_K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;
const LIGHT_LUMA_MIN: f64 = 128.0;

/// Preprocessing applied to every capture before analysis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSettings {
    /// Rows removed from the top (status bar).
    pub crop_top_px: u32,
    /// Rows removed from the bottom (navigation/notification area).
    pub crop_bottom_px: u32,
    /// Bottom fraction of the screen covered by an on-screen keyboard.
    pub keyboard_fraction: f64,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            crop_top_px: 0,
            crop_bottom_px: 0,
            keyboard_fraction: 0.4,
        }
    }
}

pub struct ImageBackend {
    settings: ImageSettings,
    keyboard: Option<ExternalCommand>,
}

impl ImageBackend {
    pub fn new(settings: ImageSettings, keyboard_command: Option<&str>) -> anyhow::Result<Self> {
        let keyboard = keyboard_command
            .map(ExternalCommand::parse)
            .transpose()
            .context("keyboard detection command")?;
        Ok(Self { settings, keyboard })
    }

    fn open(&self, path: &Path) -> Result<DynamicImage> {
        let image = image::open(path).with_context(|| format!("decode {}", path.display()))?;
        let height = image.height();
        let removed = self.settings.crop_top_px + self.settings.crop_bottom_px;
        if removed >= height {
            return Err(anyhow!(
                "crop of {removed} rows leaves nothing of {} ({height} rows)",
                path.display()
            ));
        }
        if removed == 0 {
            return Ok(image);
        }
        Ok(image.crop_imm(
            0,
            self.settings.crop_top_px,
            image.width(),
            height - removed,
        ))
    }

    fn sample(&self, path: &Path, keyboard: bool, exclude: Option<Bounds>) -> Result<Lab> {
        let rgb = self.open(path)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        let visible_rows = if keyboard {
            let covered = (f64::from(height) * self.settings.keyboard_fraction).round() as u32;
            height.saturating_sub(covered)
        } else {
            height
        };
        // Bounds are in device coordinates; shift them into the cropped frame.
        let offset = i64::from(self.settings.crop_top_px);
        let excluded = |x: u32, y: u32| {
            exclude.is_some_and(|rect| {
                let (x, y) = (i64::from(x), i64::from(y) + offset);
                rect.left <= x && x < rect.right && rect.top <= y && y < rect.bottom
            })
        };

        let mut sums = [0f64; 3];
        let mut count = 0u64;
        for (x, y, pixel) in rgb.enumerate_pixels() {
            if y >= visible_rows || excluded(x, y) {
                continue;
            }
            for (sum, channel) in sums.iter_mut().zip(pixel.0) {
                *sum += f64::from(channel);
            }
            count += 1;
        }
        if count == 0 {
            return Err(anyhow!(
                "no pixels left to sample in {} ({width}x{height})",
                path.display()
            ));
        }
        let mean = sums.map(|sum| sum / count as f64 / DATA_RANGE);
        Ok(Lab::from_srgb(mean))
    }

    fn mean_luma(&self, path: &Path) -> Result<f64> {
        let gray = self.open(path)?.to_luma8();
        let total: u64 = gray.pixels().map(|pixel| u64::from(pixel.0[0])).sum();
        let count = u64::from(gray.width()) * u64::from(gray.height());
        Ok(total as f64 / count.max(1) as f64)
    }

    fn keyboard_visible(&self, path: &Path) -> Result<bool> {
        let Some(command) = &self.keyboard else {
            return Ok(false);
        };
        let stdout = command.run(&command.image_args(path), None)?;
        match stdout.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(anyhow!(
                "{} printed {other:?}, expected true or false",
                command.program()
            )),
        }
    }
}

fn backend_error(err: anyhow::Error) -> OracleError {
    OracleError::backend("image", format!("{err:#}"))
}

impl ImageAnalysis for ImageBackend {
    fn similarity(&self, first: &Path, second: &Path) -> Result<f64, OracleError> {
        let first = self.open(first).map_err(backend_error)?.to_luma8();
        let second = self.open(second).map_err(backend_error)?.to_luma8();
        ssim(&first, &second).map_err(backend_error)
    }

    fn color_sample(
        &self,
        image: &Path,
        keyboard: bool,
        exclude: Option<Bounds>,
    ) -> Result<Lab, OracleError> {
        self.sample(image, keyboard, exclude).map_err(backend_error)
    }

    fn is_light(&self, image: &Path) -> Result<bool, OracleError> {
        let luma = self.mean_luma(image).map_err(backend_error)?;
        Ok(luma >= LIGHT_LUMA_MIN)
    }

    fn has_keyboard(&self, image: &Path) -> Result<bool, OracleError> {
        self.keyboard_visible(image)
            .map_err(|err| OracleError::backend("keyboard", format!("{err:#}")))
    }
}

/// Summed-area table over `f(pixel_a, pixel_b)`, `(width + 1) * (height + 1)` entries.
fn integral(first: &GrayImage, second: &GrayImage, f: impl Fn(u64, u64) -> u64) -> Vec<u64> {
    let (width, height) = first.dimensions();
    let stride = width as usize + 1;
    let mut table = vec![0u64; stride * (height as usize + 1)];
    for y in 0..height {
        let mut row = 0u64;
        for x in 0..width {
            let a = u64::from(first.get_pixel(x, y).0[0]);
            let b = u64::from(second.get_pixel(x, y).0[0]);
            row += f(a, b);
            let idx = (y as usize + 1) * stride + x as usize + 1;
            table[idx] = table[idx - stride] + row;
        }
    }
    table
}

/// Mean structural similarity over all full windows.
pub fn ssim(first: &GrayImage, second: &GrayImage) -> Result<f64> {
    if first.dimensions() != second.dimensions() {
        return Err(anyhow!(
            "image dimensions differ: {:?} vs {:?}",
            first.dimensions(),
            second.dimensions()
        ));
    }
    let (width, height) = first.dimensions();
    let window = SSIM_WINDOW.min(width).min(height);
    if window == 0 {
        return Err(anyhow!("empty image"));
    }

    let sum_a = integral(first, second, |a, _| a);
    let sum_b = integral(first, second, |_, b| b);
    let sum_aa = integral(first, second, |a, _| a * a);
    let sum_bb = integral(first, second, |_, b| b * b);
    let sum_ab = integral(first, second, |a, b| a * b);

    let stride = width as usize + 1;
    let window_sum = |table: &[u64], x: usize, y: usize| -> f64 {
        let w = window as usize;
        let total = table[(y + w) * stride + x + w] + table[y * stride + x];
        let overlap = table[y * stride + x + w] + table[(y + w) * stride + x];
        (total - overlap) as f64
    };

    let n = f64::from(window * window);
    let cov_norm = if n > 1.0 { n / (n - 1.0) } else { 1.0 };
    let c1 = (SSIM_K1 * DATA_RANGE).powi(2);
    let c2 = (SSIM_K2 * DATA_RANGE).powi(2);

    let mut total = 0.0;
    let mut windows = 0u64;
    for y in 0..=(height - window) as usize {
        for x in 0..=(width - window) as usize {
            let mean_a = window_sum(&sum_a, x, y) / n;
            let mean_b = window_sum(&sum_b, x, y) / n;
            let var_a = cov_norm * (window_sum(&sum_aa, x, y) / n - mean_a * mean_a);
            let var_b = cov_norm * (window_sum(&sum_bb, x, y) / n - mean_b * mean_b);
            let cov = cov_norm * (window_sum(&sum_ab, x, y) / n - mean_a * mean_b);
            let numerator = (2.0 * mean_a * mean_b + c1) * (2.0 * cov + c2);
            let denominator = (mean_a * mean_a + mean_b * mean_b + c1) * (var_a + var_b + c2);
            total += numerator / denominator;
            windows += 1;
        }
    }
    Ok(total / windows as f64)
}
