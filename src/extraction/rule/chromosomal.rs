//! Chromosome-arm gain/loss extraction (1p/19q, 10p/10q, 7p/7q, 9p/9q).
//!
//! Grounded on `rule_extraction.py`'s `extract_chromosomal`. The Python
//! source maps bare "normal"/"normale" wording to `"gain"`; that is a
//! latent bug in the original (see DESIGN.md, Open Question 4) and is
//! deliberately NOT reproduced here — an unqualified "normal" status
//! yields no value rather than a wrong one.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::extraction::value::ExtractionValue;

const CHROMOSOME_ARMS: &[&str] = &["1p", "19q", "10p", "10q", "7p", "7q", "9p", "9q"];

static CHR_CANONICAL: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("1p", "ch1p"), ("19q", "ch19q"),
        ("10p", "ch10p"), ("10q", "ch10q"),
        ("7p", "ch7p"), ("7q", "ch7q"),
        ("9p", "ch9p"), ("9q", "ch9q"),
    ])
});

static CHR_STATUS_NORM: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("gain", "gain"), ("amplification", "gain"), ("amplifié", "gain"), ("amplifie", "gain"),
        ("perte", "perte"), ("délétion", "perte"), ("deletion", "perte"), ("délété", "perte"), ("delete", "perte"),
        ("perte partielle", "perte partielle"), ("délétion partielle", "perte partielle"),
        ("deletion partielle", "perte partielle"),
        ("codélétion", "perte"), ("codeletion", "perte"),
        ("perte hétérozygote", "perte partielle"), ("perte heterozygote", "perte partielle"),
        ("perte homozygote", "perte"),
        ("del", "perte"),
    ])
});

fn alternation(items: &[&str]) -> String {
    let mut sorted: Vec<&str> = items.to_vec();
    sorted.sort_by_key(|i| std::cmp::Reverse(i.len()));
    sorted.iter().map(|i| regex::escape(i)).collect::<Vec<_>>().join("|")
}

static CHR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?P<arm>{})\s*[:=\-\s]\s*(?P<status>perte\s+h[ée]t[ée]rozygote|perte\s+homozygote|perte\s+partielle|d[ée]l[ée]tion\s+partielle|deletion\s+partielle|codél[ée]tion|codeletion|gain|amplification|amplifi[ée]e?|perte|d[ée]l[ée]tion|d[ée]l[ée]t[ée]e?|\bdel\b)",
        alternation(CHROMOSOME_ARMS)
    ))
    .unwrap()
});

static CHR_ABSENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)absence\s+de\s+perte\s+(?:du?\s+)?(?P<arm>{})", alternation(CHROMOSOME_ARMS))).unwrap()
});

static CODELETION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)cod[ée]l[ée]tion\s+(?:1p[\s/]*19q|1p19q)").unwrap());

pub fn extract_chromosomal(text: &str) -> HashMap<String, ExtractionValue> {
    let mut results: HashMap<String, ExtractionValue> = HashMap::new();

    for m in CHR_PATTERN.captures_iter(text) {
        let arm = m["arm"].to_lowercase();
        let status_raw = m["status"].trim().to_lowercase();
        let Some(&field_name) = CHR_CANONICAL.get(arm.as_str()) else { continue };
        let whole = m.get(0).unwrap();

        if let Some(&normalised) = CHR_STATUS_NORM.get(status_raw.as_str()) {
            results.entry(field_name.to_string()).or_insert_with(|| {
                ExtractionValue::rule(normalised, whole.as_str(), whole.start(), whole.end(), 0.85)
            });
        }
    }

    // `_CHR_ABSENCE_PATTERN` matches but, per the original implementation,
    // intentionally sets no field value: "absence of loss" is not the
    // same claim as "gain" and the vocabulary has no neutral label for it.
    let _ = CHR_ABSENCE_PATTERN.is_match(text);

    if let Some(m) = CODELETION_PATTERN.find(text) {
        for field_name in ["ch1p", "ch19q"] {
            results.entry(field_name.to_string()).or_insert_with(|| {
                ExtractionValue::rule("perte", m.as_str(), m.start(), m.end(), 0.85)
            });
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_1p_loss() {
        let results = extract_chromosomal("1p : perte observée sur le caryotype.");
        assert_eq!(results["ch1p"].value.as_str(), Some("perte"));
    }

    #[test]
    fn extracts_19q_gain() {
        let results = extract_chromosomal("19q : amplification confirmée par FISH.");
        assert_eq!(results["ch19q"].value.as_str(), Some("gain"));
    }

    #[test]
    fn codeletion_sets_both_1p_and_19q_to_perte() {
        let results = extract_chromosomal("Codélétion 1p/19q retrouvée, en faveur d'un oligodendrogliome.");
        assert_eq!(results["ch1p"].value.as_str(), Some("perte"));
        assert_eq!(results["ch19q"].value.as_str(), Some("perte"));
    }

    #[test]
    fn bare_normal_wording_yields_no_value() {
        let results = extract_chromosomal("7p : normal sur cet échantillon.");
        assert!(!results.contains_key("ch7p"));
    }

    #[test]
    fn absence_of_loss_phrase_sets_no_value() {
        let results = extract_chromosomal("Absence de perte du 10q sur ce prélèvement.");
        assert!(!results.contains_key("ch10q"));
    }

    #[test]
    fn partial_loss_is_distinguished_from_full_loss() {
        let results = extract_chromosomal("9p : perte partielle identifiée en FISH.");
        assert_eq!(results["ch9p"].value.as_str(), Some("perte partielle"));
    }

    #[test]
    fn heterozygous_loss_normalises_to_partial_loss() {
        let results = extract_chromosomal("10q : perte hétérozygote");
        assert_eq!(results["ch10q"].value.as_str(), Some("perte partielle"));
    }

    #[test]
    fn homozygous_loss_normalises_to_full_loss() {
        let results = extract_chromosomal("10q : perte homozygote");
        assert_eq!(results["ch10q"].value.as_str(), Some("perte"));
    }

    #[test]
    fn bare_del_abbreviation_normalises_to_loss() {
        let results = extract_chromosomal("9p : del confirmée en FISH.");
        assert_eq!(results["ch9p"].value.as_str(), Some("perte"));
    }
}
