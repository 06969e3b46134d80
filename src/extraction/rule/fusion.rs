//! Gene fusion extraction (FGFR, NTRK, ALK, ROS1, MET, BRAF).
//!
//! Grounded on `rule_extraction.py`'s `extract_fusions`. Only FGFR and
//! NTRK have dedicated vocabulary fields; the remaining genes fall
//! through to the catch-all `fusion_autre` field, matching the
//! original's canonical-name table. As with amplifications, the negated
//! pattern runs before the positive one.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::extraction::value::ExtractionValue;

const FUSION_GENES: &[&str] = &["fgfr", "ntrk", "alk", "ros1", "met", "braf"];

static FUSION_CANONICAL: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("fgfr", "fusion_fgfr"),
        ("ntrk", "fusion_ntrk"),
        ("alk", "fusion_autre"),
        ("ros1", "fusion_autre"),
        ("met", "fusion_autre"),
        ("braf", "fusion_autre"),
    ])
});

fn alternation(genes: &[&str]) -> String {
    let mut sorted: Vec<&str> = genes.to_vec();
    sorted.sort_by_key(|g| std::cmp::Reverse(g.len()));
    sorted.iter().map(|g| regex::escape(g)).collect::<Vec<_>>().join("|")
}

static FUSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:fusion\s+(?:(?:du?|de)\s+g[èe]ne?\s+)?(?P<gene1>{genes})|(?P<gene2>{genes})\s+fusionn[ée]e?)",
        genes = alternation(FUSION_GENES)
    ))
    .unwrap()
});

static FUSION_NEGATED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:pas\s+de\s+fusion|absence\s+de\s+fusion)\s+(?:du?\s+g[èe]ne?\s+)?(?P<gene>{})",
        alternation(FUSION_GENES)
    ))
    .unwrap()
});

pub fn extract_fusions(text: &str) -> HashMap<String, ExtractionValue> {
    let mut results: HashMap<String, ExtractionValue> = HashMap::new();

    for m in FUSION_NEGATED_PATTERN.captures_iter(text) {
        let gene = m["gene"].to_lowercase();
        if let Some(&field_name) = FUSION_CANONICAL.get(gene.as_str()) {
            let whole = m.get(0).unwrap();
            results.entry(field_name.to_string()).or_insert_with(|| {
                ExtractionValue::rule("non", whole.as_str(), whole.start(), whole.end(), 0.85)
            });
        }
    }

    for m in FUSION_PATTERN.captures_iter(text) {
        let gene = m.name("gene1").or_else(|| m.name("gene2")).map(|g| g.as_str().to_lowercase());
        let Some(gene) = gene else { continue };
        if let Some(&field_name) = FUSION_CANONICAL.get(gene.as_str()) {
            let whole = m.get(0).unwrap();
            results.entry(field_name.to_string()).or_insert_with(|| {
                ExtractionValue::rule("oui", whole.as_str(), whole.start(), whole.end(), 0.85)
            });
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fgfr_fusion_prefix_form() {
        let results = extract_fusions("Fusion du gène FGFR3-TACC3 identifiée en RNA-seq.");
        assert_eq!(results["fusion_fgfr"].value.as_str(), Some("oui"));
    }

    #[test]
    fn extracts_ntrk_fusion_suffix_form() {
        let results = extract_fusions("NTRK fusionné, confirmé par panel NGS.");
        assert_eq!(results["fusion_ntrk"].value.as_str(), Some("oui"));
    }

    #[test]
    fn other_fusion_genes_fall_through_to_fusion_autre() {
        let results = extract_fusions("Fusion du gène ALK mise en évidence.");
        assert_eq!(results["fusion_autre"].value.as_str(), Some("oui"));
    }

    #[test]
    fn negated_fusion_sets_non_and_is_not_overwritten() {
        let results = extract_fusions("Absence de fusion du gène NTRK sur cet échantillon.");
        assert_eq!(results["fusion_ntrk"].value.as_str(), Some("non"));
    }
}
