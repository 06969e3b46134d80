//! Gene amplification extraction (MDM2, CDK4, EGFR, MET, MDM4).
//!
//! Grounded on `rule_extraction.py`'s `extract_amplifications`. The
//! negated pattern is checked before the positive one, since a field
//! already set by the negated pass must not be overwritten by a later,
//! weaker positive match — first-result-wins semantics require the
//! stronger claim to run first.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::extraction::value::ExtractionValue;

const AMPLI_GENES: &[&str] = &["mdm2", "cdk4", "egfr", "met", "mdm4"];

static AMPLI_CANONICAL: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("mdm2", "ampli_mdm2"),
        ("cdk4", "ampli_cdk4"),
        ("egfr", "ampli_egfr"),
        ("met", "ampli_met"),
        ("mdm4", "ampli_mdm4"),
    ])
});

fn alternation(genes: &[&str]) -> String {
    let mut sorted: Vec<&str> = genes.to_vec();
    sorted.sort_by_key(|g| std::cmp::Reverse(g.len()));
    sorted.iter().map(|g| regex::escape(g)).collect::<Vec<_>>().join("|")
}

static AMPLI_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:amplification\s+(?:du?\s+g[èe]ne?\s+)?(?P<gene1>{genes})|(?P<gene2>{genes})\s+amplifi[ée]e?)",
        genes = alternation(AMPLI_GENES)
    ))
    .unwrap()
});

static AMPLI_NEGATED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:pas\s+d['\u{{2019}}]amplification|absence\s+d['\u{{2019}}]amplification)\s+(?:du?\s+g[èe]ne?\s+)?(?P<gene>{})",
        alternation(AMPLI_GENES)
    ))
    .unwrap()
});

pub fn extract_amplifications(text: &str) -> HashMap<String, ExtractionValue> {
    let mut results: HashMap<String, ExtractionValue> = HashMap::new();

    for m in AMPLI_NEGATED_PATTERN.captures_iter(text) {
        let gene = m["gene"].to_lowercase();
        if let Some(&field_name) = AMPLI_CANONICAL.get(gene.as_str()) {
            let whole = m.get(0).unwrap();
            results.entry(field_name.to_string()).or_insert_with(|| {
                ExtractionValue::rule("non", whole.as_str(), whole.start(), whole.end(), 0.85)
            });
        }
    }

    for m in AMPLI_PATTERN.captures_iter(text) {
        let gene = m.name("gene1").or_else(|| m.name("gene2")).map(|g| g.as_str().to_lowercase());
        let Some(gene) = gene else { continue };
        if let Some(&field_name) = AMPLI_CANONICAL.get(gene.as_str()) {
            let whole = m.get(0).unwrap();
            results.entry(field_name.to_string()).or_insert_with(|| {
                ExtractionValue::rule("oui", whole.as_str(), whole.start(), whole.end(), 0.85)
            });
        }
    }

    results
}
