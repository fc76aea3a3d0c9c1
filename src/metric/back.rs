use super::{unexpected_reference, Evaluation, Metric, MetricContext};
use crate::correlate::{AffectedWindow, Reference, ScreenRef, ScreenSlot};
use crate::error::OracleError;
use crate::verdict::{fraction, Measurement, MetricKind, BACK_SSIM_MIN};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Structural similarity plus UI-text loss between the screen before the
/// navigated-away-from screen and the screen after going back.
pub struct BackMetric;

/// The slot's screen, or the one before it when a keyboard covers it.
fn usable<'s>(
    slot: &'s ScreenSlot,
    ctx: &MetricContext<'_>,
) -> Result<(&'s ScreenRef, PathBuf), OracleError> {
    let path = ctx.screen_path(&slot.primary)?;
    if !ctx.backends.image.has_keyboard(&path)? {
        return Ok((&slot.primary, path));
    }
    let Some(fallback) = slot.keyboard_fallback.as_ref() else {
        return Ok((&slot.primary, path));
    };
    match ctx.screen_path(fallback) {
        Ok(fallback_path) => {
            tracing::debug!(
                screen = %slot.primary.screen,
                fallback = %fallback.screen,
                "keyboard visible, using previous screen"
            );
            Ok((fallback, fallback_path))
        }
        Err(err) => {
            tracing::debug!(screen = %slot.primary.screen, error = %err, "keyboard fallback unavailable");
            Ok((&slot.primary, path))
        }
    }
}

fn compare(
    before: &ScreenSlot,
    after: &ScreenSlot,
    ctx: &MetricContext<'_>,
) -> Result<Measurement, OracleError> {
    let (before, before_path) = usable(before, ctx)?;
    let (after, after_path) = usable(after, ctx)?;
    let ssim = ctx.backends.image.similarity(&before_path, &after_path)?;

    let mut text_mismatch = None;
    let mut missing_text = Vec::new();
    if ssim > BACK_SSIM_MIN {
        let before_text = ctx.ui_tree(before)?.texts();
        let after_text: BTreeSet<String> = ctx.ui_tree(after)?.texts().into_iter().collect();
        let missing: BTreeSet<&String> = before_text
            .iter()
            .filter(|text| !after_text.contains(*text))
            .collect();
        text_mismatch = Some(fraction(missing.len(), before_text.len()));
        missing_text = missing.into_iter().cloned().collect();
    }

    Ok(Measurement::Back {
        screen: after.screen.clone(),
        ssim,
        text_mismatch,
        missing_text,
    })
}

impl Metric for BackMetric {
    fn measure(&self, window: &AffectedWindow, ctx: &MetricContext<'_>) -> Vec<Evaluation> {
        match &window.reference {
            Reference::Pair { before, after } => vec![Evaluation::new(
                MetricKind::BackSimilarity,
                &after.primary.screen,
                compare(before, after, ctx),
            )],
            _ => vec![Evaluation::failed(
                MetricKind::BackSimilarity,
                None,
                unexpected_reference(window),
            )],
        }
    }
}
