//! Theme toggle metrics: did the theme flip, does every later screen share the
//! settled screen's colour, and is the UI text still legible.
use super::{unexpected_reference, Evaluation, Metric, MetricContext};
use crate::color::{delta_e_2000, Lab};
use crate::correlate::{AffectedWindow, Reference, ScreenRef};
use crate::error::OracleError;
use crate::verdict::{Measurement, MetricKind};
use std::collections::BTreeSet;

pub struct ThemeMetric;

/// Lowercase, fold line breaks and collapse runs of whitespace.
pub fn normalize_screen_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn change(
    before: &ScreenRef,
    settled: &ScreenRef,
    ctx: &MetricContext<'_>,
) -> Result<Measurement, OracleError> {
    let image = ctx.backends.image;
    let before_light = image.is_light(&ctx.screen_path(before)?)?;
    let after_light = image.is_light(&ctx.screen_path(settled)?)?;
    Ok(Measurement::ThemeChange {
        screen: settled.screen.clone(),
        before_light,
        after_light,
    })
}

fn reference_color(settled: &ScreenRef, ctx: &MetricContext<'_>) -> Result<Lab, OracleError> {
    let image = ctx.backends.image;
    let path = ctx.screen_path(settled)?;
    let keyboard = image.has_keyboard(&path)?;
    image.color_sample(&path, keyboard, None)
}

fn consistency(
    reference: Lab,
    screen: &ScreenRef,
    ctx: &MetricContext<'_>,
) -> Result<Measurement, OracleError> {
    let image = ctx.backends.image;
    let path = ctx.screen_path(screen)?;
    let keyboard = image.has_keyboard(&path)?;
    let focused = ctx.ui_tree(screen)?.focused_bounds();
    let sample = image.color_sample(&path, keyboard, focused)?;
    Ok(Measurement::ThemeConsistency {
        screen: screen.screen.clone(),
        delta_e: delta_e_2000(reference, sample),
    })
}

fn coverage(screen: &ScreenRef, ctx: &MetricContext<'_>) -> Result<Measurement, OracleError> {
    let expected: Vec<String> = ctx
        .ui_tree(screen)?
        .texts()
        .iter()
        .map(|text| normalize_screen_text(text))
        .collect();
    if expected.is_empty() {
        return Ok(Measurement::ThemeTextCoverage {
            screen: screen.screen.clone(),
            total: 0,
            missing: Vec::new(),
        });
    }

    let path = ctx.screen_path(screen)?;
    let seen: BTreeSet<String> = ctx
        .backends
        .ocr
        .ocr_text(&path)?
        .iter()
        .map(|line| normalize_screen_text(line))
        .collect();
    let missing: BTreeSet<&String> = expected.iter().filter(|text| !seen.contains(*text)).collect();
    Ok(Measurement::ThemeTextCoverage {
        screen: screen.screen.clone(),
        total: expected.len(),
        missing: missing.into_iter().cloned().collect(),
    })
}

impl Metric for ThemeMetric {
    fn measure(&self, window: &AffectedWindow, ctx: &MetricContext<'_>) -> Vec<Evaluation> {
        let Reference::Settled { before, settled } = &window.reference else {
            return vec![Evaluation::failed(
                MetricKind::ThemeChange,
                None,
                unexpected_reference(window),
            )];
        };

        let mut evaluations = vec![Evaluation::new(
            MetricKind::ThemeChange,
            &settled.screen,
            change(before, settled, ctx),
        )];

        let reference = reference_color(settled, ctx);
        for screen in &window.affected {
            let result = match &reference {
                Ok(lab) => consistency(*lab, screen, ctx),
                Err(err) => Err(err.clone()),
            };
            evaluations.push(Evaluation::new(
                MetricKind::ThemeConsistency,
                &screen.screen,
                result,
            ));
        }
        for screen in &window.affected {
            evaluations.push(Evaluation::new(
                MetricKind::ThemeTextCoverage,
                &screen.screen,
                coverage(screen, ctx),
            ));
        }
        evaluations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{SelectionPayload, Trigger, TriggerKind};
    use crate::metric::fakes::{screen_ref, FakeBackends, FakeImage, FakeOcr, RunDir};
    use crate::uitree::Bounds;

    const DARK: Lab = Lab {
        l: 12.0,
        a: 0.5,
        b: -1.0,
    };

    fn window(affected: &[u32]) -> AffectedWindow {
        AffectedWindow {
            trigger: Trigger {
                kind: TriggerKind::ThemeToggle,
                trigger_index: 2,
                payload: SelectionPayload::None,
            },
            reference: Reference::Settled {
                before: screen_ref(2),
                settled: screen_ref(4),
            },
            affected: affected.iter().map(|idx| screen_ref(*idx)).collect(),
        }
    }

    fn metrics(evaluations: &[Evaluation]) -> Vec<(MetricKind, Option<&str>)> {
        evaluations
            .iter()
            .map(|evaluation| (evaluation.metric, evaluation.screen.as_deref()))
            .collect()
    }

    #[test]
    fn screen_text_is_normalized() {
        assert_eq!(normalize_screen_text("  Dark\nTheme  On "), "dark theme on");
        assert_eq!(normalize_screen_text("\n"), "");
    }

    #[test]
    fn evaluations_cover_change_then_consistency_then_coverage() {
        let run = RunDir::create()
            .screen(2)
            .screen(4)
            .screen(5)
            .screen(6)
            .tree(5, &["Inbox"])
            .tree(6, &[]);
        let fakes = FakeBackends {
            image: FakeImage::default()
                .light("screen2.png")
                .color("screen4.png", DARK)
                .color("screen5.png", DARK)
                .color("screen6.png", DARK),
            ocr: FakeOcr::default().with("screen5.png", &["INBOX"]),
            ..FakeBackends::default()
        };
        let ctx = MetricContext {
            assets: &run.assets,
            backends: fakes.backends(),
        };
        let evaluations = ThemeMetric.measure(&window(&[5, 6]), &ctx);
        assert_eq!(
            metrics(&evaluations),
            vec![
                (MetricKind::ThemeChange, Some("screen4.png")),
                (MetricKind::ThemeConsistency, Some("screen5.png")),
                (MetricKind::ThemeConsistency, Some("screen6.png")),
                (MetricKind::ThemeTextCoverage, Some("screen5.png")),
                (MetricKind::ThemeTextCoverage, Some("screen6.png")),
            ]
        );
        let results: Vec<Measurement> = evaluations
            .into_iter()
            .map(|evaluation| evaluation.result.expect("measurement"))
            .collect();
        assert_eq!(
            results[0],
            Measurement::ThemeChange {
                screen: "screen4.png".to_string(),
                before_light: true,
                after_light: false,
            }
        );
        assert_eq!(
            results[1],
            Measurement::ThemeConsistency {
                screen: "screen5.png".to_string(),
                delta_e: 0.0,
            }
        );
        assert_eq!(
            results[3],
            Measurement::ThemeTextCoverage {
                screen: "screen5.png".to_string(),
                total: 1,
                missing: Vec::new(),
            }
        );
        // Empty tree: full coverage without asking OCR.
        assert_eq!(
            results[4],
            Measurement::ThemeTextCoverage {
                screen: "screen6.png".to_string(),
                total: 0,
                missing: Vec::new(),
            }
        );
    }

    #[test]
    fn focused_element_is_excluded_from_the_sample() {
        let focused = r#"<hierarchy><node text="Name" focused="true" bounds="[10,20][300,80]" /></hierarchy>"#;
        let run = RunDir::create().screen(4).screen(5).raw_tree(5, focused);
        let fakes = FakeBackends {
            image: FakeImage::default()
                .keyboard("screen5.png")
                .color("screen4.png", DARK)
                .color("screen5.png", DARK),
            ..FakeBackends::default()
        };
        let ctx = MetricContext {
            assets: &run.assets,
            backends: fakes.backends(),
        };
        let _ = ThemeMetric.measure(&window(&[5]), &ctx);
        let samples = fakes.image.samples.borrow();
        assert_eq!(samples[0], ("screen4.png".to_string(), false, None));
        assert_eq!(
            samples[1],
            (
                "screen5.png".to_string(),
                true,
                Some(Bounds {
                    left: 10,
                    top: 20,
                    right: 300,
                    bottom: 80,
                })
            )
        );
    }

    #[test]
    fn unreadable_reference_makes_every_consistency_check_inconclusive() {
        let run = RunDir::create()
            .screen(2)
            .screen(5)
            .screen(6)
            .tree(5, &["Inbox"])
            .tree(6, &["Inbox"]);
        let fakes = FakeBackends {
            ocr: FakeOcr::default()
                .with("screen5.png", &["Inbox"])
                .with("screen6.png", &[]),
            ..FakeBackends::default()
        };
        let ctx = MetricContext {
            assets: &run.assets,
            backends: fakes.backends(),
        };
        let evaluations = ThemeMetric.measure(&window(&[5, 6]), &ctx);
        let failures: Vec<MetricKind> = evaluations
            .iter()
            .filter(|evaluation| evaluation.result.is_err())
            .map(|evaluation| evaluation.metric)
            .collect();
        assert_eq!(
            failures,
            vec![
                MetricKind::ThemeChange,
                MetricKind::ThemeConsistency,
                MetricKind::ThemeConsistency,
            ]
        );
        match &evaluations[4].result {
            Ok(Measurement::ThemeTextCoverage { missing, total, .. }) => {
                assert_eq!(*total, 1);
                assert_eq!(missing, &vec!["inbox".to_string()]);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }
}
