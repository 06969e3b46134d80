//! Document-type classifier: keyword scoring with an optional LLM
//! fallback on ambiguous results.
//!
//! Grounded on `document_classifier.py`'s `DocumentClassifier` class and
//! `pipeline::structuring::classify.rs`'s style for the crate-local date
//! parsing helper.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::LlmError;
use crate::schema::routing::DocumentType;

const STRONG_WEIGHT: i32 = 3;
const MODERATE_WEIGHT: i32 = 1;
const AMBIGUITY_THRESHOLD: i32 = 2;
const LLM_EXCERPT_CHARS: usize = 2000;

struct Keywords {
    strong: &'static [&'static str],
    moderate: &'static [&'static str],
}

static DOCUMENT_TYPE_KEYWORDS: LazyLock<HashMap<DocumentType, Keywords>> = LazyLock::new(|| {
    HashMap::from([
        (
            DocumentType::Anapath,
            Keywords {
                strong: &["anatomopathologie", "examen anatomopathologique", "compte-rendu anatomopathologique", "diagnostic histologique", "macroscopie", "microscopie"],
                moderate: &["biopsie", "pièce opératoire", "immunohistochimie", "classification oms"],
            },
        ),
        (
            DocumentType::MolecularReport,
            Keywords {
                strong: &["biologie moléculaire", "analyse moléculaire", "panel ngs", "séquençage", "rapport moléculaire"],
                moderate: &["mutation", "idh1", "mgmt", "cgh array", "amplification"],
            },
        ),
        (
            DocumentType::Consultation,
            Keywords {
                strong: &["compte-rendu de consultation", "consultation de suivi", "examen clinique"],
                moderate: &["interrogatoire", "indice de karnofsky", "traitement en cours", "plan de soins"],
            },
        ),
        (
            DocumentType::Rcp,
            Keywords {
                strong: &["réunion de concertation pluridisciplinaire", "rcp neuro-oncologie", "décision thérapeutique rcp"],
                moderate: &["staff", "pluridisciplinaire", "proposition thérapeutique"],
            },
        ),
        (
            DocumentType::Radiology,
            Keywords {
                strong: &["compte-rendu radiologique", "imagerie par résonance magnétique", "compte rendu irm"],
                moderate: &["irm cérébrale", "scanner cérébral", "bilan radiologique", "prise de contraste"],
            },
        ),
    ])
});

#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub document_type: DocumentType,
    pub scores: HashMap<DocumentType, i32>,
    pub confidence: f32,
    pub is_ambiguous: bool,
    pub used_llm_fallback: bool,
    pub matched_keywords: Vec<String>,
}

fn score_text(text: &str) -> (HashMap<DocumentType, i32>, HashMap<DocumentType, Vec<String>>) {
    let lowered = text.to_lowercase();
    let mut scores = HashMap::new();
    let mut matched = HashMap::new();

    for (&doc_type, keywords) in DOCUMENT_TYPE_KEYWORDS.iter() {
        let mut score = 0;
        let mut hits = Vec::new();
        for kw in keywords.strong {
            if lowered.contains(kw) {
                score += STRONG_WEIGHT;
                hits.push(kw.to_string());
            }
        }
        for kw in keywords.moderate {
            if lowered.contains(kw) {
                score += MODERATE_WEIGHT;
                hits.push(kw.to_string());
            }
        }
        scores.insert(doc_type, score);
        matched.insert(doc_type, hits);
    }

    (scores, matched)
}

fn rank_scores(scores: &HashMap<DocumentType, i32>) -> Vec<(DocumentType, i32)> {
    let mut ranked: Vec<(DocumentType, i32)> = scores.iter().map(|(&k, &v)| (k, v)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.as_str().cmp(b.0.as_str())));
    ranked
}

fn compute_confidence(ranked: &[(DocumentType, i32)]) -> f32 {
    let top = ranked.first().map(|(_, s)| *s).unwrap_or(0);
    let second = ranked.get(1).map(|(_, s)| *s).unwrap_or(0);
    let denom = top.max(1) as f32;
    ((top - second) as f32 / denom).clamp(0.0, 1.0)
}

fn truncate_to_tokens(text: &str, max_chars: usize) -> &str {
    let boundary = text.char_indices().nth(max_chars / 4 * 4).map(|(i, _)| i).unwrap_or(text.len());
    let mut end = boundary.min(text.len());
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn parse_llm_response(response: &str) -> Option<DocumentType> {
    let lowered = response.to_lowercase();
    for dt in DocumentType::all() {
        if lowered.contains(dt.as_str()) {
            return Some(*dt);
        }
    }
    None
}

fn llm_classification_prompt(excerpt: &str) -> String {
    format!(
        "Vous êtes un assistant médical. Classez le document suivant dans une seule \
catégorie parmi : anapath, molecular_report, consultation, rcp, radiology. \
Répondez uniquement par le nom de la catégorie.\n\nDocument :\n{excerpt}"
    )
}

/// Scores text against per-type keyword sets, escalating to an LLM when
/// the keyword result is ambiguous.
pub struct DocumentClassifier<'a> {
    llm: Option<&'a dyn Fn(&str) -> Result<String, LlmError>>,
    ambiguity_threshold: i32,
}

impl<'a> DocumentClassifier<'a> {
    pub fn new() -> Self {
        DocumentClassifier { llm: None, ambiguity_threshold: AMBIGUITY_THRESHOLD }
    }

    pub fn with_llm(llm: &'a dyn Fn(&str) -> Result<String, LlmError>) -> Self {
        DocumentClassifier { llm: Some(llm), ambiguity_threshold: AMBIGUITY_THRESHOLD }
    }

    pub fn classify(&self, text: &str) -> ClassificationResult {
        if text.trim().is_empty() {
            return ClassificationResult {
                document_type: DocumentType::Consultation,
                scores: HashMap::new(),
                confidence: 0.0,
                is_ambiguous: true,
                used_llm_fallback: false,
                matched_keywords: Vec::new(),
            };
        }

        let (scores, matched) = score_text(text);
        let ranked = rank_scores(&scores);
        let top = ranked.first().map(|(_, s)| *s).unwrap_or(0);
        let second = ranked.get(1).map(|(_, s)| *s).unwrap_or(0);
        let mut predicted = ranked.first().map(|(dt, _)| *dt).unwrap_or(DocumentType::Consultation);
        let mut confidence = compute_confidence(&ranked);
        let is_ambiguous = top == 0 || (top - second) <= self.ambiguity_threshold;
        let mut used_llm_fallback = false;
        let mut matched_keywords = matched.get(&predicted).cloned().unwrap_or_default();

        if is_ambiguous {
            if let Some(llm) = self.llm {
                let excerpt = truncate_to_tokens(text, LLM_EXCERPT_CHARS);
                let prompt = llm_classification_prompt(excerpt);
                if let Ok(response) = llm(&prompt) {
                    if let Some(llm_type) = parse_llm_response(&response) {
                        used_llm_fallback = true;
                        if llm_type == predicted {
                            confidence = (confidence + 0.3).min(1.0);
                        } else {
                            predicted = llm_type;
                            confidence = 0.5;
                            matched_keywords = matched.get(&predicted).cloned().unwrap_or_default();
                        }
                    }
                }
            }
        }

        ClassificationResult {
            document_type: predicted,
            scores,
            confidence,
            is_ambiguous,
            used_llm_fallback,
            matched_keywords,
        }
    }
}

impl<'a> Default for DocumentClassifier<'a> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_keyword_wins_unambiguously() {
        let result = DocumentClassifier::new().classify(
            "Examen anatomopathologique. Diagnostic histologique : glioblastome IDH wildtype.",
        );
        assert_eq!(result.document_type, DocumentType::Anapath);
        assert!(!result.is_ambiguous);
    }

    #[test]
    fn empty_text_defaults_to_consultation_ambiguous() {
        let result = DocumentClassifier::new().classify("   ");
        assert_eq!(result.document_type, DocumentType::Consultation);
        assert_eq!(result.confidence, 0.0);
        assert!(result.is_ambiguous);
    }

    #[test]
    fn no_keyword_matches_is_ambiguous_without_llm() {
        let result = DocumentClassifier::new().classify("Du texte quelconque sans mot-clé médical reconnu.");
        assert!(result.is_ambiguous);
        assert!(!result.used_llm_fallback);
    }

    #[test]
    fn llm_fallback_overrides_on_disagreement() {
        let llm = |_: &str| -> Result<String, LlmError> { Ok("radiology".to_string()) };
        let classifier = DocumentClassifier::with_llm(&llm);
        let result = classifier.classify("Texte ambigu sans mot-clé fort.");
        assert_eq!(result.document_type, DocumentType::Radiology);
        assert!(result.used_llm_fallback);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn llm_fallback_boosts_confidence_on_agreement() {
        let llm = |_: &str| -> Result<String, LlmError> { Ok("consultation".to_string()) };
        let classifier = DocumentClassifier::with_llm(&llm);
        let result = classifier.classify("interrogatoire du patient, sans élément marquant.");
        assert_eq!(result.document_type, DocumentType::Consultation);
        assert!(result.used_llm_fallback);
    }

    #[test]
    fn llm_failure_keeps_keyword_prediction() {
        let llm = |_: &str| -> Result<String, LlmError> { Err(LlmError::Timeout(30)) };
        let classifier = DocumentClassifier::with_llm(&llm);
        let result = classifier.classify("Texte ambigu sans mot-clé fort.");
        assert!(!result.used_llm_fallback);
    }

    #[test]
    fn truncate_to_tokens_respects_char_budget() {
        let text = "a".repeat(10_000);
        let excerpt = truncate_to_tokens(&text, 2000);
        assert!(excerpt.len() <= 2000);
    }

    #[test]
    fn parse_llm_response_finds_first_valid_token() {
        assert_eq!(parse_llm_response("Ceci est un RAPPORT RCP"), Some(DocumentType::Rcp));
        assert_eq!(parse_llm_response("réponse incompréhensible"), None);
    }
}
