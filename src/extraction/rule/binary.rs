//! Binary (yes/no) clinical flag extraction: epilepsy, cephalgia/HIC,
//! deficit, cognitive impairment, and related symptom/treatment flags.
//!
//! Grounded on `rule_extraction.py`'s `extract_binary`. Each field has a
//! list of French keyword/synonym cues; the first cue to match sets the
//! field, with its value ("oui"/"non") decided by a negation check —
//! delegated to an [`AssertionAnnotator`](crate::negation::AssertionAnnotator)
//! when one is supplied, falling back to a short look-behind regex
//! otherwise (the same fallback the Python source uses when no
//! annotator is passed in).

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::extraction::value::ExtractionValue;
use crate::negation::AssertionAnnotator;

struct BinaryField {
    field: &'static str,
    keywords: &'static [&'static str],
}

static BINARY_KEYWORDS: LazyLock<Vec<BinaryField>> = LazyLock::new(|| {
    vec![
        BinaryField { field: "epilepsie", keywords: &["épilepsie", "epilepsie", "crise convulsive", "crise comitiale", "crise d'épilepsie"] },
        BinaryField { field: "ceph_hic", keywords: &["céphalée", "cephalee", "hypertension intracrânienne", "hic", "syndrome d'hic"] },
        BinaryField { field: "deficit", keywords: &["déficit moteur", "deficit moteur", "hémiparésie", "hemiparesie", "déficit neurologique"] },
        BinaryField { field: "cognitif", keywords: &["trouble cognitif", "troubles cognitifs", "déclin cognitif", "trouble mnésique"] },
        BinaryField { field: "histo_necrose", keywords: &["nécrose", "necrose", "foyers de nécrose", "plages de nécrose"] },
        BinaryField { field: "histo_pec", keywords: &["prolifération endothélio-capillaire", "proliferation endothelio-capillaire", "pec"] },
        BinaryField { field: "corticoides", keywords: &["corticoïdes", "corticoides", "corticothérapie", "dexaméthasone", "dexamethasone"] },
        BinaryField { field: "optune", keywords: &["optune", "tumor treating fields", "ttfields"] },
        BinaryField { field: "anti_epileptiques", keywords: &["anti-épileptiques", "anti epileptiques", "antiépileptique", "lévétiracétam", "levetiracetam"] },
        BinaryField { field: "essai_therapeutique", keywords: &["essai thérapeutique", "essai therapeutique", "protocole d'essai", "inclusion dans un essai"] },
        BinaryField { field: "contraste_1er_symptome", keywords: &["prise de contraste", "rehaussement après injection"] },
        BinaryField { field: "oedeme_1er_symptome", keywords: &["oedème périlésionnel", "œdème périlésionnel", "oedeme perilesionnel"] },
        BinaryField { field: "calcif_1er_symptome", keywords: &["calcification", "calcifications", "foyer calcifié"] },
        BinaryField { field: "progress_clinique", keywords: &["aggravation clinique", "progression clinique", "dégradation clinique"] },
        BinaryField { field: "progress_radiologique", keywords: &["progression radiologique", "progression tumorale à l'imagerie"] },
        BinaryField { field: "antecedent_tumoral", keywords: &["antécédent tumoral", "antecedent tumoral", "antécédent de cancer", "antécédent néoplasique"] },
    ]
});

static QUICK_NEGATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:pas\s+de|absence\s+de|sans|aucun[e]?|ne\s+pr[ée]sente\s+pas)\b\s*$").unwrap()
});

fn quick_negation_check(text: &str, match_start: usize) -> bool {
    let window_start = {
        let mut i = match_start.saturating_sub(50);
        while i < text.len() && !text.is_char_boundary(i) {
            i += 1;
        }
        i
    };
    let before = &text[window_start..match_start];
    QUICK_NEGATION.is_match(before)
}

pub fn extract_binary(text: &str, annotator: Option<&AssertionAnnotator>) -> HashMap<String, ExtractionValue> {
    let mut results = HashMap::new();
    let lowered = text.to_lowercase();

    for bf in BINARY_KEYWORDS.iter() {
        for kw in bf.keywords {
            if let Some(pos) = lowered.find(kw) {
                let start = pos;
                let end = pos + kw.len();
                let negated = match annotator {
                    Some(ann) => ann.detect_negation(text, kw),
                    None => quick_negation_check(&lowered, start),
                };
                let value = if negated { "non" } else { "oui" };
                let raw_span = &text[start.min(text.len())..end.min(text.len())];
                results.entry(bf.field.to_string()).or_insert_with(|| {
                    ExtractionValue::rule(value, raw_span, start, end, 0.75)
                });
                break;
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_epilepsy_keyword_as_affirmed() {
        let results = extract_binary("Le patient présente une épilepsie partielle depuis 2 ans.", None);
        assert_eq!(results["epilepsie"].value.as_str(), Some("oui"));
    }

    #[test]
    fn detects_negated_keyword_via_quick_fallback() {
        let results = extract_binary("Absence de déficit moteur à l'examen clinique.", None);
        assert_eq!(results["deficit"].value.as_str(), Some("non"));
    }

    #[test]
    fn detects_negated_keyword_via_annotator() {
        let annotator = AssertionAnnotator::new();
        let results = extract_binary("Pas de céphalée rapportée par le patient.", Some(&annotator));
        assert_eq!(results["ceph_hic"].value.as_str(), Some("non"));
    }

    #[test]
    fn first_keyword_match_wins_per_field() {
        let results = extract_binary("Corticoïdes en cours, puis dexaméthasone introduite.", None);
        assert_eq!(results["corticoides"].value.as_str(), Some("oui"));
    }

    #[test]
    fn unrelated_text_produces_no_flags() {
        let results = extract_binary("Le patient va globalement bien, aucun symptôme rapporté.", None);
        assert!(!results.contains_key("epilepsie"));
    }
}
