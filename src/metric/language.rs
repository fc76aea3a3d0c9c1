use super::{unexpected_reference, Evaluation, Metric, MetricContext};
use crate::backends::LanguageGuess;
use crate::correlate::{AffectedWindow, Reference, ScreenRef};
use crate::error::OracleError;
use crate::verdict::{Measurement, MetricKind, LANGUAGE_CONFIDENCE_MIN};

/// Per-line language identification of the OCR text on each affected screen.
pub struct LanguageMetric;

/// The first confident guess that names a language other than `label`.
fn contradicting<'g>(
    guesses: &'g [LanguageGuess],
    label: &str,
    ctx: &MetricContext<'_>,
) -> Option<&'g LanguageGuess> {
    let label_lower = label.to_lowercase();
    guesses.iter().find(|guess| {
        guess.confidence >= LANGUAGE_CONFIDENCE_MIN
            && !ctx.backends.names.accepts(&guess.code, label)
            && guess.name.trim().to_lowercase() != label_lower
    })
}

fn check(
    label: &str,
    screen: &ScreenRef,
    ctx: &MetricContext<'_>,
) -> Result<Measurement, OracleError> {
    let path = ctx.screen_path(screen)?;
    let lines = ctx.backends.ocr.ocr_text(&path)?;

    let mut mismatched = Vec::new();
    let mut undetected = 0;
    let mut last_error = None;
    for line in &lines {
        match ctx.backends.language.identify(line) {
            Ok(guesses) => {
                if let Some(guess) = contradicting(&guesses, label, ctx) {
                    mismatched.push((line.clone(), ctx.backends.names.display_name(guess)));
                }
            }
            Err(err) => {
                tracing::debug!(screen = %screen.screen, error = %err, "line not identified");
                undetected += 1;
                last_error = Some(err);
            }
        }
    }
    if undetected == lines.len() {
        if let Some(err) = last_error {
            return Err(err);
        }
    }

    Ok(Measurement::Language {
        screen: screen.screen.clone(),
        total_lines: lines.len(),
        mismatched,
        undetected,
    })
}

impl Metric for LanguageMetric {
    fn measure(&self, window: &AffectedWindow, ctx: &MetricContext<'_>) -> Vec<Evaluation> {
        let Reference::Label { label } = &window.reference else {
            return vec![Evaluation::failed(
                MetricKind::LanguageConsistency,
                None,
                unexpected_reference(window),
            )];
        };
        window
            .affected
            .iter()
            .map(|screen| {
                Evaluation::new(
                    MetricKind::LanguageConsistency,
                    &screen.screen,
                    check(label, screen, ctx),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{SelectionPayload, Trigger, TriggerKind};
    use crate::metric::fakes::{screen_ref, FakeBackends, FakeLanguage, FakeOcr, RunDir};

    fn window(label: &str, affected: &[u32]) -> AffectedWindow {
        AffectedWindow {
            trigger: Trigger {
                kind: TriggerKind::LanguageSelection,
                trigger_index: 2,
                payload: SelectionPayload::Language {
                    label: label.to_string(),
                },
            },
            reference: Reference::Label {
                label: label.to_string(),
            },
            affected: affected.iter().map(|idx| screen_ref(*idx)).collect(),
        }
    }

    #[test]
    fn confident_foreign_lines_are_mismatches() {
        let run = RunDir::create().screen(3);
        let fakes = FakeBackends {
            ocr: FakeOcr::default().with("screen3.png", &["Bandeja de entrada", "Settings", "OK"]),
            language: FakeLanguage::default()
                .with("Bandeja de entrada", "es", 98.0)
                .with("Settings", "en", 95.0)
                .with("OK", "en", 40.0),
            ..FakeBackends::default()
        };
        let ctx = MetricContext {
            assets: &run.assets,
            backends: fakes.backends(),
        };
        let evaluations = LanguageMetric.measure(&window("Español", &[3]), &ctx);
        assert_eq!(evaluations.len(), 1);
        assert_eq!(
            evaluations[0].result.as_ref().expect("measurement"),
            &Measurement::Language {
                screen: "screen3.png".to_string(),
                total_lines: 3,
                mismatched: vec![("Settings".to_string(), "English".to_string())],
                undetected: 0,
            }
        );
    }

    #[test]
    fn label_matching_ignores_case_and_accepts_native_names() {
        let run = RunDir::create().screen(3);
        let fakes = FakeBackends {
            ocr: FakeOcr::default().with("screen3.png", &["Einstellungen"]),
            language: FakeLanguage::default().with("Einstellungen", "de", 99.0),
            ..FakeBackends::default()
        };
        let ctx = MetricContext {
            assets: &run.assets,
            backends: fakes.backends(),
        };
        for label in ["Deutsch", "german"] {
            let evaluations = LanguageMetric.measure(&window(label, &[3]), &ctx);
            match evaluations[0].result.as_ref().expect("measurement") {
                Measurement::Language { mismatched, .. } => assert!(mismatched.is_empty(), "{label}"),
                other => panic!("unexpected measurement {other:?}"),
            }
        }
    }

    #[test]
    fn unidentified_lines_are_counted_and_all_failures_are_inconclusive() {
        let run = RunDir::create().screen(3).screen(4).screen(5);
        let fakes = FakeBackends {
            ocr: FakeOcr::default()
                .with("screen3.png", &["Hola", "xyzzy"])
                .with("screen4.png", &["xyzzy"])
                .with("screen5.png", &[]),
            language: FakeLanguage::default().with("Hola", "es", 90.0),
            ..FakeBackends::default()
        };
        let ctx = MetricContext {
            assets: &run.assets,
            backends: fakes.backends(),
        };
        let evaluations = LanguageMetric.measure(&window("Español", &[3, 4, 5]), &ctx);
        match evaluations[0].result.as_ref().expect("partial identification") {
            Measurement::Language {
                undetected,
                mismatched,
                ..
            } => {
                assert_eq!(*undetected, 1);
                assert!(mismatched.is_empty());
            }
            other => panic!("unexpected measurement {other:?}"),
        }
        let err = evaluations[1].result.as_ref().expect_err("nothing identified");
        assert_eq!(err.code(), "detection_backend");
        // A screen without text has nothing in the wrong language.
        match evaluations[2].result.as_ref().expect("empty screen") {
            Measurement::Language { total_lines, .. } => assert_eq!(*total_lines, 0),
            other => panic!("unexpected measurement {other:?}"),
        }
    }
}
