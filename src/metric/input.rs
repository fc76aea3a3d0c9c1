use super::{unexpected_reference, Evaluation, Metric, MetricContext};
use crate::correlate::{AffectedWindow, Reference, ScreenRef};
use crate::detect::{ExpectedInput, SelectionPayload};
use crate::error::OracleError;
use crate::verdict::{Measurement, MetricKind};

/// Whether `input` equals `text` or one of its space-separated words.
fn matches_words(input: &str, text: &str) -> bool {
    text == input || text.split(' ').any(|word| word == input)
}

/// Whether `input` shows up in the screen text, whole or as one part of an entry.
///
/// An entry holding a comma is split on `", "` first and each part on spaces,
/// so `"Ada Lovelace"` is found in `"Name, Ada Lovelace"` and `"42"` in
/// `"Age: 42, Verified"`. A bare comma does not split: `"a"` is not in `"a,b"`.
pub fn input_matches(input: &str, entries: &[String]) -> bool {
    let input = input.trim();
    entries.iter().any(|entry| {
        let entry = entry.trim();
        if entry.contains(',') {
            entry == input || entry.split(", ").any(|part| matches_words(input, part))
        } else {
            matches_words(input, entry)
        }
    })
}

/// Presence of every confirmed edit-field entry on the confirmation screen.
pub struct InputMetric;

fn check(
    expected: &[ExpectedInput],
    screen: &ScreenRef,
    ctx: &MetricContext<'_>,
) -> Result<Measurement, OracleError> {
    let texts = if expected.is_empty() {
        Vec::new()
    } else {
        ctx.ui_tree(screen)?.texts()
    };
    let results = expected
        .iter()
        .map(|input| (input.text.clone(), input_matches(&input.text, &texts)))
        .collect();
    Ok(Measurement::Inputs {
        screen: screen.screen.clone(),
        results,
    })
}

impl Metric for InputMetric {
    fn measure(&self, window: &AffectedWindow, ctx: &MetricContext<'_>) -> Vec<Evaluation> {
        match (&window.reference, &window.trigger.payload) {
            (Reference::Confirmation { screen }, SelectionPayload::Inputs { expected }) => {
                vec![Evaluation::new(
                    MetricKind::InputPresence,
                    &screen.screen,
                    check(expected, screen, ctx),
                )]
            }
            _ => vec![Evaluation::failed(
                MetricKind::InputPresence,
                None,
                unexpected_reference(window),
            )],
        }
    }
}
