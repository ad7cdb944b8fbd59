use crate::extraction::{ExtractionOutcome, ExtractionTarget};

/// Text handed to the model for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedText {
    pub text: String,
    pub partial: bool,
}

/// Pick the text to analyse: the extracted body on success, otherwise the
/// search title and snippet. Never empty.
pub fn compose(target: &ExtractionTarget, outcome: &ExtractionOutcome) -> ComposedText {
    match outcome {
        ExtractionOutcome::Success { text } if !text.trim().is_empty() => ComposedText {
            text: text.clone(),
            partial: false,
        },
        _ => ComposedText { text: fallback_text(target), partial: true },
    }
}

fn fallback_text(target: &ExtractionTarget) -> String {
    let joined = format!("{} {}", target.title.trim(), target.snippet.trim());
    let joined = joined.trim();
    if joined.is_empty() {
        target.url.clone()
    } else {
        joined.to_string()
    }
}
