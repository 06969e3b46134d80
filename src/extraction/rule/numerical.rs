//! Numeric field extraction: Ki67 index, Karnofsky score, mitotic count,
//! WHO grade, radiotherapy dose, chemotherapy cycle count.
//!
//! Grounded on `rule_extraction.py`'s `extract_numerical`.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::extraction::value::ExtractionValue;

static PAT_KI67: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bki[\s\-]?67\s*[:=\-\s]\s*(?P<value>\d{1,3})\s*%").unwrap());

static PAT_KARNOFSKY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:indice\s+de\s+)?karnofsky\s*[:=\-\s]\s*(?P<value>\d{2,3})\b").unwrap()
});

static PAT_MITOSES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?P<value>\d+)\s*mitoses?\s*(?:/|\bpour\b|\bsur\b)\s*10\s*champs").unwrap()
});

static PAT_GRADE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bgrade\s*(?:oms\s*)?[:=\-\s]?\s*(?P<value>I{1,3}V?|IV|[1-4])\b").unwrap()
});

static PAT_DOSE_GY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?P<value>\d+(?:[.,]\d+)?)\s*gy\b").unwrap());

static PAT_CYCLES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?P<value>\d+)\s*cycles?\b").unwrap());

fn roman_to_int(s: &str) -> Option<i64> {
    match s.to_uppercase().as_str() {
        "I" => Some(1),
        "II" => Some(2),
        "III" => Some(3),
        "IV" => Some(4),
        _ => None,
    }
}

pub fn extract_numerical(text: &str) -> HashMap<String, ExtractionValue> {
    let mut results = HashMap::new();

    if let Some(m) = PAT_KI67.captures(text) {
        let whole = m.get(0).unwrap();
        let value: i64 = m["value"].parse().unwrap_or(0);
        results.insert(
            "ihc_ki67".to_string(),
            ExtractionValue::rule(value, whole.as_str(), whole.start(), whole.end(), 0.9),
        );
    }

    if let Some(m) = PAT_KARNOFSKY.captures(text) {
        let whole = m.get(0).unwrap();
        let value: i64 = m["value"].parse().unwrap_or(0);
        results.insert(
            "ik_clinique".to_string(),
            ExtractionValue::rule(value, whole.as_str(), whole.start(), whole.end(), 0.85),
        );
    }

    if let Some(m) = PAT_MITOSES.captures(text) {
        let whole = m.get(0).unwrap();
        let value: i64 = m["value"].parse().unwrap_or(0);
        results.insert(
            "histo_mitoses".to_string(),
            ExtractionValue::rule(value, whole.as_str(), whole.start(), whole.end(), 0.85),
        );
    }

    if let Some(m) = PAT_GRADE.captures(text) {
        let whole = m.get(0).unwrap();
        let raw = &m["value"];
        let value = roman_to_int(raw).or_else(|| raw.parse::<i64>().ok());
        if let Some(value) = value {
            results.insert(
                "grade".to_string(),
                ExtractionValue::rule(value, whole.as_str(), whole.start(), whole.end(), 0.8),
            );
        }
    }

    if let Some(m) = PAT_DOSE_GY.captures(text) {
        let whole = m.get(0).unwrap();
        let raw = m["value"].replace(',', ".");
        if let Ok(value) = raw.parse::<f64>() {
            results.insert(
                "rx_dose".to_string(),
                ExtractionValue::rule(value, whole.as_str(), whole.start(), whole.end(), 0.85),
            );
        }
    }

    if let Some(m) = PAT_CYCLES.captures(text) {
        let whole = m.get(0).unwrap();
        let value: i64 = m["value"].parse().unwrap_or(0);
        results.insert(
            "chm_cycles".to_string(),
            ExtractionValue::rule(value, whole.as_str(), whole.start(), whole.end(), 0.85),
        );
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::value::FieldValue;

    #[test]
    fn extracts_ki67_percentage() {
        let results = extract_numerical("Index Ki-67 : 25% sur la zone la plus proliférative.");
        assert_eq!(results["ihc_ki67"].value, FieldValue::Integer(25));
    }

    #[test]
    fn extracts_karnofsky_score() {
        let results = extract_numerical("Indice de Karnofsky : 80 à l'entrée.");
        assert_eq!(results["ik_clinique"].value, FieldValue::Integer(80));
    }

    #[test]
    fn extracts_mitotic_count() {
        let results = extract_numerical("8 mitoses pour 10 champs à fort grossissement.");
        assert_eq!(results["histo_mitoses"].value, FieldValue::Integer(8));
    }

    #[test]
    fn extracts_roman_numeral_grade() {
        let results = extract_numerical("Grade OMS : IV, glioblastome.");
        assert_eq!(results["grade"].value, FieldValue::Integer(4));
    }

    #[test]
    fn extracts_dose_with_comma_decimal() {
        let results = extract_numerical("Radiothérapie délivrée à 59,4 Gy en 33 fractions.");
        assert_eq!(results["rx_dose"].value, FieldValue::Float(59.4));
    }

    #[test]
    fn extracts_cycle_count() {
        let results = extract_numerical("6 cycles de témozolomide administrés.");
        assert_eq!(results["chm_cycles"].value, FieldValue::Integer(6));
    }
}
