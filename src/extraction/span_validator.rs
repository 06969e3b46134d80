//! Source span verification: confirms each extraction's cited span
//! actually occurs in the document text, flagging it otherwise.
//!
//! Grounded on `llm_extraction.py`'s `validate_source_spans`.

use std::collections::HashMap;

use crate::extraction::value::{ExtractionTier, ExtractionValue};

fn normalise_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Sets `flagged = true` on any extraction whose `source_span` cannot
/// be found (exactly, after whitespace normalisation, or via a fuzzy
/// word-overlap check) in `original_text`. LLM extractions with an
/// empty span are flagged outright; rule extractions are not, since
/// their spans are always byte-accurate slices of the input.
pub fn validate_source_spans(
    extractions: &mut HashMap<String, ExtractionValue>,
    original_text: &str,
    fuzzy_threshold: f64,
) {
    let normalised_text = normalise_whitespace(original_text);

    for (_field_name, ev) in extractions.iter_mut() {
        if ev.source_span.trim().is_empty() {
            if ev.extraction_tier == ExtractionTier::Llm {
                ev.flagged = true;
            }
            continue;
        }

        let normalised_span = normalise_whitespace(&ev.source_span);
        if normalised_text.contains(&normalised_span) {
            continue;
        }

        let span_words: Vec<&str> = normalised_span.split(' ').filter(|w| !w.is_empty()).collect();
        if span_words.is_empty() {
            continue;
        }

        let found_count = span_words.iter().filter(|w| normalised_text.contains(**w)).count();
        let similarity = found_count as f64 / span_words.len() as f64;

        if similarity >= fuzzy_threshold {
            continue;
        }

        ev.flagged = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(span: &str, tier: ExtractionTier) -> ExtractionValue {
        ExtractionValue {
            value: "x".into(),
            source_span: span.to_string(),
            source_span_start: 0,
            source_span_end: span.len(),
            extraction_tier: tier,
            confidence: 0.8,
            section: None,
            vocab_valid: true,
            flagged: false,
        }
    }

    #[test]
    fn exact_span_match_is_not_flagged() {
        let mut extractions = HashMap::from([("f".to_string(), ev("IDH1 positif", ExtractionTier::Rule))]);
        validate_source_spans(&mut extractions, "Rapport : IDH1 positif sur la pièce.", 0.8);
        assert!(!extractions["f"].flagged);
    }

    #[test]
    fn span_with_different_whitespace_still_matches() {
        let mut extractions = HashMap::from([("f".to_string(), ev("IDH1   positif", ExtractionTier::Rule))]);
        validate_source_spans(&mut extractions, "Rapport : IDH1 positif.", 0.8);
        assert!(!extractions["f"].flagged);
    }

    #[test]
    fn fuzzy_match_above_threshold_is_not_flagged() {
        let mut extractions = HashMap::from([("f".to_string(), ev("IDH1 clairement positif ici", ExtractionTier::Llm))]);
        validate_source_spans(&mut extractions, "Rapport : IDH1 positif ici sur la pièce.", 0.7);
        assert!(!extractions["f"].flagged);
    }

    #[test]
    fn unrelated_span_is_flagged() {
        let mut extractions = HashMap::from([("f".to_string(), ev("texte complètement différent absent", ExtractionTier::Llm))]);
        validate_source_spans(&mut extractions, "Rapport : IDH1 positif sur la pièce.", 0.8);
        assert!(extractions["f"].flagged);
    }

    #[test]
    fn empty_span_from_llm_tier_is_flagged() {
        let mut extractions = HashMap::from([("f".to_string(), ev("", ExtractionTier::Llm))]);
        validate_source_spans(&mut extractions, "texte quelconque", 0.8);
        assert!(extractions["f"].flagged);
    }

    #[test]
    fn empty_span_from_rule_tier_is_not_flagged() {
        let mut extractions = HashMap::from([("f".to_string(), ev("", ExtractionTier::Rule))]);
        validate_source_spans(&mut extractions, "texte quelconque", 0.8);
        assert!(!extractions["f"].flagged);
    }
}
