//! Assertion annotator: negation, hypothesis, and history detection.
//!
//! Grounded on `negation.py`'s regex fallback backend (the spaCy/edsnlp
//! backend is out of scope for this crate — see spec.md §1 Non-goals).
//! Cue patterns, the 60-character context window, and the
//! sentence-boundary clipping rule are carried over unchanged.

use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedSpan {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub label: String,
    pub is_negated: bool,
    pub is_hypothesis: bool,
    pub is_history: bool,
}

const CONTEXT_WINDOW: usize = 60;

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

static NEGATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"(?i)\bpas\s+(?:de|d['\u{2019}]\s*)",
        r"(?i)\babsence\s+(?:de|d['\u{2019}]\s*)",
        r"(?i)\bsans\s+",
        r"(?i)\baucun(?:e)?\s+",
        r"(?i)\bni\s+",
        r"(?i)\bnon\s+",
        r"(?i)\bn['\u{2019}]?\s*(?:est|a|montre|r[ée]v[èe]le|retrouve|objective)\s+pas\b",
        r"(?i)\bn[ée]gatif(?:ve)?\b",
    ])
});

static HYPOTHESIS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"(?i)\bpossible(?:ment)?\b",
        r"(?i)\bprobable(?:ment)?\b",
        r"(?i)\bsuspect[ée]e?\b",
        r"(?i)\bsuspecion\b",
        r"(?i)\bsuspicion\b",
        r"(?i)\b[aà]\s+confirmer\b",
        r"(?i)\b[aà]\s+(?:confronter|corr[ée]ler)\b",
        r"(?i)\b[ée]ventuel(?:le(?:ment)?)?\b",
        r"(?i)\bhypoth[èe]se\b",
    ])
});

/// Both the correctly-spelled "antérieurement" and the variant spelling
/// found in the original source are accepted (see DESIGN.md Open
/// Question 3).
static HISTORY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"(?i)\bant[ée]c[ée]dent(?:s)?\b",
        r"(?i)\bhistoire\s+de\b",
        r"(?i)\bhistorique(?:ment)?\b",
        r"(?i)\bancien(?:ne)?(?:ment)?\b",
        r"(?i)\bpr[ée]c[ée]demment\b",
        r"(?i)\baut?[ée]rieurement\b",
        r"(?i)\ben\s+\d{4}\b",
    ])
});

static SENTENCE_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?;]\s").unwrap());

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

fn has_pattern_near_span(
    text: &str,
    span_start: usize,
    span_end: usize,
    patterns: &[Regex],
    look_after: bool,
) -> bool {
    let ctx_start = floor_char_boundary(text, span_start.saturating_sub(CONTEXT_WINDOW));
    let before_end = ceil_char_boundary(text, span_end.min(text.len()));
    let mut before_context = &text[ctx_start..before_end];
    let mut before_ctx_start = ctx_start;

    if let Some(last) = SENTENCE_BOUNDARY.find_iter(before_context).last() {
        let rel_span_start = span_start.saturating_sub(before_ctx_start);
        if last.end() <= rel_span_start {
            before_ctx_start += last.end();
            before_context = &before_context[last.end()..];
        }
    }

    for pat in patterns {
        if let Some(m) = pat.find(before_context) {
            let cue_end_abs = before_ctx_start + m.end();
            if cue_end_abs <= span_end {
                return true;
            }
        }
    }

    if look_after {
        let after_start = floor_char_boundary(text, span_start.min(text.len()));
        let ctx_end = ceil_char_boundary(text, (span_end + CONTEXT_WINDOW).min(text.len()));
        let mut after_context = &text[after_start..ctx_end];
        let rel_span_end = span_end.saturating_sub(after_start);

        if rel_span_end <= after_context.len() {
            if let Some(boundary) = SENTENCE_BOUNDARY.find_at(after_context, rel_span_end) {
                after_context = &after_context[..boundary.start()];
            }
        }

        for pat in patterns {
            if pat.find(after_context).is_some() {
                return true;
            }
        }
    }

    false
}

/// Pre-annotates text spans with negation/hypothesis/history status.
/// Stateless and idempotent: same input always produces the same output.
pub struct AssertionAnnotator;

impl AssertionAnnotator {
    pub fn new() -> Self {
        AssertionAnnotator
    }

    pub fn annotate(&self, text: &str, spans: &[(usize, usize, String)]) -> Vec<AnnotatedSpan> {
        spans
            .iter()
            .map(|(start, end, label)| {
                let span_text = text.get(*start..*end).unwrap_or_default().to_string();
                AnnotatedSpan {
                    text: span_text,
                    start: *start,
                    end: *end,
                    label: label.clone(),
                    is_negated: has_pattern_near_span(text, *start, *end, &NEGATION_PATTERNS, false),
                    is_hypothesis: has_pattern_near_span(text, *start, *end, &HYPOTHESIS_PATTERNS, true),
                    is_history: has_pattern_near_span(text, *start, *end, &HISTORY_PATTERNS, true),
                }
            })
            .collect()
    }

    /// Convenience: is `target` negated anywhere in `text`? Searches the
    /// first case-insensitive occurrence of `target` and checks negation
    /// on that match. Returns `false` when `target` is not found.
    pub fn detect_negation(&self, text: &str, target: &str) -> bool {
        let pattern = format!("(?i){}", regex::escape(target));
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(_) => return false,
        };
        match re.find(text) {
            Some(m) => {
                let results = self.annotate(text, &[(m.start(), m.end(), target.to_string())]);
                results.first().map(|s| s.is_negated).unwrap_or(false)
            }
            None => false,
        }
    }
}

impl Default for AssertionAnnotator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotator() -> AssertionAnnotator {
        AssertionAnnotator::new()
    }

    #[test]
    fn detects_pas_de_negation() {
        let text = "Pas d'épilepsie rapportée chez ce patient.";
        assert!(annotator().detect_negation(text, "épilepsie"));
    }

    #[test]
    fn detects_absence_de_negation() {
        let text = "Absence de déficit moteur à l'examen.";
        assert!(annotator().detect_negation(text, "déficit"));
    }

    #[test]
    fn does_not_flag_unnegated_term() {
        let text = "Présence d'un déficit moteur net.";
        assert!(!annotator().detect_negation(text, "déficit"));
    }

    #[test]
    fn negation_does_not_cross_sentence_boundary() {
        let text = "Pas de céphalées. Déficit moteur confirmé à l'examen.";
        assert!(!annotator().detect_negation(text, "déficit"));
    }

    #[test]
    fn detects_hypothesis_cue_after_span() {
        let spans = vec![(0usize, 4usize, "IDH1".to_string())];
        let text = "IDH1 possiblement muté, à confirmer par biologie moléculaire.";
        let results = annotator().annotate(text, &spans);
        assert!(results[0].is_hypothesis);
    }

    #[test]
    fn detects_history_cue_correct_spelling() {
        let spans = vec![(40usize, 48usize, "epilepsie".to_string())];
        let text = "Patient suivi en neurologie, traité antérieurement pour épilepsie.";
        let start = text.find("épilepsie").unwrap();
        let spans = vec![(start, start + "épilepsie".len(), "epilepsie".to_string())];
        let results = annotator().annotate(text, &spans);
        assert!(results[0].is_history);
        let _ = spans;
    }

    #[test]
    fn detects_history_cue_variant_spelling() {
        let text = "Traité autérieurement pour un méningiome, asymptomatique depuis.";
        let start = text.find("méningiome").unwrap();
        let spans = vec![(start, start + "méningiome".len(), "meningiome".to_string())];
        let results = annotator().annotate(text, &spans);
        assert!(results[0].is_history);
    }

    #[test]
    fn annotator_is_idempotent() {
        let text = "Pas de progression radiologique à ce jour.";
        let a = annotator();
        let r1 = a.detect_negation(text, "progression");
        let r2 = a.detect_negation(text, "progression");
        assert_eq!(r1, r2);
    }

    #[test]
    fn target_not_found_is_not_negated() {
        assert!(!annotator().detect_negation("texte sans rapport", "glioblastome"));
    }
}
