//! Molecular status extraction (IDH, TERT, MGMT methylation, etc.).
//!
//! Grounded on `rule_extraction.py`'s `extract_molecular`. The variant
//! pattern (`R132H`, `p.V600E`, …) and the three complementary phrasing
//! patterns (regular, negated, "mutation <gene>") are carried over
//! unchanged.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::extraction::value::ExtractionValue;

const MOL_GENES: &[&str] = &[
    "idh1", "idh-1", "idh2", "idh-2",
    "tert", "cdkn2a", "h3f3a", "hist1h3b",
    "braf", "mgmt", "fgfr1",
    "egfr", "prkca", "p53", "tp53",
    "pten", "cic", "fubp1", "atrx",
];

static MOL_CANONICAL: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("idh1", "mol_idh1"), ("idh-1", "mol_idh1"),
        ("idh2", "mol_idh2"), ("idh-2", "mol_idh2"),
        ("tert", "mol_tert"),
        ("cdkn2a", "mol_CDKN2A"),
        ("h3f3a", "mol_h3f3a"),
        ("hist1h3b", "mol_hist1h3b"),
        ("braf", "mol_braf"),
        ("mgmt", "mol_mgmt"),
        ("fgfr1", "mol_fgfr1"),
        ("egfr", "mol_egfr_mut"),
        ("prkca", "mol_prkca"),
        ("p53", "mol_p53"), ("tp53", "mol_p53"),
        ("pten", "mol_pten"),
        ("cic", "mol_cic"),
        ("fubp1", "mol_fubp1"),
        ("atrx", "mol_atrx"),
    ])
});

static MOL_STATUS_NORM: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("wt", "wt"), ("wild-type", "wt"), ("wild type", "wt"), ("sauvage", "wt"), ("type sauvage", "wt"),
        ("non muté", "wt"), ("non mutée", "wt"), ("non mute", "wt"), ("non mutee", "wt"),
        ("absence de mutation", "wt"), ("pas de mutation", "wt"),
        ("muté", "mute"), ("mutée", "mute"), ("mute", "mute"), ("mutee", "mute"),
        ("mutation", "mute"), ("présence de mutation", "mute"), ("muté(e)", "mute"),
        ("méthylé", "methyle"), ("methylé", "methyle"), ("methyle", "methyle"),
        ("methylation positive", "methyle"), ("méthylation positive", "methyle"),
        ("non méthylé", "non methyle"), ("non methylé", "non methyle"), ("non methyle", "non methyle"),
        ("methylation negative", "non methyle"), ("méthylation négative", "non methyle"),
        ("non methylation", "non methyle"),
        ("absence de méthylation", "non methyle"), ("absence de methylation", "non methyle"),
    ])
});

fn alternation(genes: &[&str]) -> String {
    let mut sorted: Vec<&str> = genes.to_vec();
    sorted.sort_by_key(|g| std::cmp::Reverse(g.len()));
    sorted.iter().map(|g| regex::escape(g)).collect::<Vec<_>>().join("|")
}

static VARIANT_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(?:p\.)?[A-Z]\d+[A-Z]$").unwrap());

static MOL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?P<gene>{})\s*[:=\-\s]\s*(?P<status>wt|wild[- ]?type|sauvage|type\s+sauvage|non\s+mut[ée]e?|mut[ée]e?|mutation|pr[ée]sence\s+de\s+mutation|absence\s+de\s+mutation|pas\s+de\s+mutation|m[ée]thyl[ée]|non\s+m[ée]thyl[ée]|m[ée]thylation\s+(?:positive|n[ée]gative)|absence\s+de\s+m[ée]thylation|(?:p\.)?[A-Z]\d+[A-Z])",
        alternation(MOL_GENES)
    ))
    .unwrap()
});

static MOL_NEGATED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:pas\s+de\s+mutation|absence\s+de\s+mutation)\s+(?:du?\s+g[èe]ne?\s+)?(?P<gene>{})",
        alternation(MOL_GENES)
    ))
    .unwrap()
});

static MOL_MUTATION_GENE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)mutation\s+(?:du?\s+(?:g[èe]ne?\s+)?)?(?:promoteur\s+(?:du?\s+)?)?(?P<gene>{})",
        alternation(MOL_GENES)
    ))
    .unwrap()
});

pub fn extract_molecular(text: &str) -> HashMap<String, ExtractionValue> {
    let mut results: HashMap<String, ExtractionValue> = HashMap::new();

    let mut set = |field_name: &str, value: &str, raw: &str, start: usize, end: usize, results: &mut HashMap<String, ExtractionValue>| {
        results
            .entry(field_name.to_string())
            .or_insert_with(|| ExtractionValue::rule(value, raw, start, end, 0.9));
    };

    for m in MOL_PATTERN.captures_iter(text) {
        let gene_raw = m["gene"].to_lowercase();
        let status_raw = m["status"].trim().to_lowercase();
        let Some(&field_name) = MOL_CANONICAL.get(gene_raw.as_str()) else { continue };
        let whole = m.get(0).unwrap();

        let normalised = if let Some(&v) = MOL_STATUS_NORM.get(status_raw.as_str()) {
            v.to_string()
        } else if VARIANT_PATTERN.is_match(&status_raw) {
            "mute".to_string()
        } else {
            status_raw.clone()
        };

        set(field_name, &normalised, whole.as_str(), whole.start(), whole.end(), &mut results);
    }

    for m in MOL_NEGATED_PATTERN.captures_iter(text) {
        let gene_raw = m["gene"].to_lowercase();
        if let Some(&field_name) = MOL_CANONICAL.get(gene_raw.as_str()) {
            let whole = m.get(0).unwrap();
            set(field_name, "wt", whole.as_str(), whole.start(), whole.end(), &mut results);
        }
    }

    for m in MOL_MUTATION_GENE_PATTERN.captures_iter(text) {
        let gene_raw = m["gene"].to_lowercase();
        if let Some(&field_name) = MOL_CANONICAL.get(gene_raw.as_str()) {
            let whole = m.get(0).unwrap();
            set(field_name, "mute", whole.as_str(), whole.start(), whole.end(), &mut results);
        }
    }

    results
}
