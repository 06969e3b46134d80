//! Immunohistochemistry (IHC) marker extraction.
//!
//! Grounded on `rule_extraction.py`'s `extract_ihc`.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::extraction::value::ExtractionValue;

const IHC_MARKERS: &[&str] = &[
    "idh1", "idh-1", "p53", "atrx", "fgfr3", "braf", "h3k27m",
    "h3k27me3", "egfr", "gfap", "olig2", "ki67", "ki-67",
    "mmr", "mlh1", "msh2", "msh6", "pms2",
];

static IHC_CANONICAL: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("idh1", "ihc_idh1"), ("idh-1", "ihc_idh1"),
        ("p53", "ihc_p53"),
        ("atrx", "ihc_atrx"),
        ("fgfr3", "ihc_fgfr3"),
        ("braf", "ihc_braf"),
        ("h3k27m", "ihc_hist_h3k27m"),
        ("h3k27me3", "ihc_hist_h3k27me3"),
        ("egfr", "ihc_egfr_hirsch"),
        ("gfap", "ihc_gfap"),
        ("olig2", "ihc_olig2"),
        ("ki67", "ihc_ki67"), ("ki-67", "ihc_ki67"),
        ("mmr", "ihc_mmr"), ("mlh1", "ihc_mmr"), ("msh2", "ihc_mmr"), ("msh6", "ihc_mmr"), ("pms2", "ihc_mmr"),
    ])
});

static IHC_VALUE_NORM: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("positive", "positif"), ("positif", "positif"), ("positifs", "positif"), ("+", "positif"),
        ("négative", "negatif"), ("negative", "negatif"), ("négatif", "negatif"), ("negatif", "negatif"), ("-", "negatif"),
        ("maintenu", "maintenu"), ("maintenue", "maintenu"),
        ("conservé", "maintenu"), ("conserve", "maintenu"), ("conservée", "maintenu"), ("conservee", "maintenu"),
        ("perte d'expression", "negatif"),
    ])
});

fn alternation(markers: &[&str]) -> String {
    let mut sorted: Vec<&str> = markers.to_vec();
    sorted.sort_by_key(|m| std::cmp::Reverse(m.len()));
    sorted.iter().map(|m| regex::escape(m)).collect::<Vec<_>>().join("|")
}

static IHC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?P<marker>{})\s*[:=\-\s]\s*(?P<value>positif[s]?|n[ée]gatif(?:ve)?|positive?|n[ée]gative?|maintenu[e]?|perte\s+d['\u{{2019}}]expression|conserv[ée]e?|\+|\-|\d+\s*(?:[àa]\s*\d+\s*)?%|<?\.?\s*\d+\s*%|score\s+(?:de\s+)?\d+)",
        alternation(IHC_MARKERS)
    ))
    .unwrap()
});

pub fn extract_ihc(text: &str) -> HashMap<String, ExtractionValue> {
    let mut results = HashMap::new();

    for m in IHC_PATTERN.captures_iter(text) {
        let marker_raw = m["marker"].to_lowercase();
        let value_raw = m["value"].trim().to_lowercase();
        let whole = m.get(0).unwrap();

        let Some(&field_name) = IHC_CANONICAL.get(marker_raw.as_str()) else { continue };

        let normalised = IHC_VALUE_NORM.get(value_raw.as_str()).map(|s| s.to_string()).unwrap_or_else(|| {
            static PCT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*%").unwrap());
            static SCORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"score\s+(?:de\s+)?(\d+)").unwrap());
            if let Some(c) = PCT.captures(&value_raw) {
                c[1].to_string()
            } else if let Some(c) = SCORE.captures(&value_raw) {
                c[1].to_string()
            } else {
                value_raw.clone()
            }
        });

        results.entry(field_name.to_string()).or_insert_with(|| {
            ExtractionValue::rule(normalised, whole.as_str(), whole.start(), whole.end(), 0.9)
        });
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_idh1_positive() {
        let results = extract_ihc("IHC IDH1 : positif sur la pièce opératoire.");
        assert_eq!(results["ihc_idh1"].value.as_str(), Some("positif"));
    }

    #[test]
    fn extracts_atrx_negative() {
        let results = extract_ihc("ATRX - négatif, perte d'expression nucléaire.");
        assert_eq!(results["ihc_atrx"].value.as_str(), Some("negatif"));
    }

    #[test]
    fn mlh1_msh2_map_to_mmr() {
        let results = extract_ihc("MLH1 : maintenu, MSH2 : maintenu");
        assert_eq!(results["ihc_mmr"].value.as_str(), Some("maintenu"));
    }

    #[test]
    fn ki67_percentage_is_kept_as_raw_value() {
        let results = extract_ihc("Ki67 : 15%");
        assert_eq!(results["ihc_ki67"].value.as_str(), Some("15"));
    }

    #[test]
    fn first_occurrence_wins_per_field() {
        let results = extract_ihc("IDH1 : positif. Plus loin, IDH1 : négatif.");
        assert_eq!(results["ihc_idh1"].value.as_str(), Some("positif"));
    }
}
