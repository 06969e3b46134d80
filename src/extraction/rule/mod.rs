//! Tier-1 rule-based extraction: orchestrates the per-family extractors
//! over detected sections, with a full-text catch-all pass for fields
//! no section covered.
//!
//! Grounded on `rule_extraction.py`'s `run_rule_extraction`, `_merge`,
//! `_is_date_field`, and `_relevant_groups`.

pub mod amplification;
pub mod binary;
pub mod chromosomal;
pub mod dates;
pub mod fusion;
pub mod ihc;
pub mod molecular;
pub mod numerical;

use std::collections::{HashMap, HashSet};

use crate::extraction::value::ExtractionValue;
use crate::negation::AssertionAnnotator;
use crate::schema::fields::{get_field, AllowedValues, FieldType};

/// The eight extractor families named in `_SECTION_EXTRACTORS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Family {
    Date,
    Ihc,
    Molecular,
    Chromosomal,
    Binary,
    Numerical,
    Amplification,
    Fusion,
}

const FULL_TEXT_FAMILIES: &[Family] =
    &[Family::Date, Family::Ihc, Family::Molecular, Family::Chromosomal, Family::Binary, Family::Numerical, Family::Amplification, Family::Fusion];

/// Which families apply to which detected section name. Unknown
/// section names fall back to the full-text family list, matching
/// Python's `_SECTION_EXTRACTORS.get(name, _SECTION_EXTRACTORS["full_text"])`.
fn section_extractors(section: &str) -> &'static [Family] {
    use Family::*;
    match section {
        "ihc" => &[Ihc, Numerical],
        "molecular" => &[Molecular, Amplification, Fusion],
        "chromosomal" => &[Chromosomal, Amplification],
        "macroscopy" => &[Binary, Numerical],
        "microscopy" => &[Binary, Numerical, Ihc],
        "conclusion" => &[Ihc, Molecular, Chromosomal, Numerical, Amplification, Fusion],
        "history" => &[Date, Binary],
        "treatment" => &[Date, Binary, Numerical],
        "clinical_exam" => &[Binary, Numerical],
        "radiology" => &[Binary, Date],
        "full_text" => FULL_TEXT_FAMILIES,
        _ => FULL_TEXT_FAMILIES,
    }
}

fn is_date_field(field_name: &str) -> bool {
    get_field(field_name).map(|f| f.field_type == FieldType::Date).unwrap_or(false)
}

fn is_binary_like(field_name: &str) -> bool {
    let Ok(field) = get_field(field_name) else { return false };
    if field.field_type != FieldType::Categorical {
        return false;
    }
    match &field.allowed_values {
        Some(AllowedValues::Strings(values)) => {
            values.iter().all(|v| v.eq_ignore_ascii_case("oui") || v.eq_ignore_ascii_case("non"))
        }
        _ => false,
    }
}

/// Maps the set of still-unfilled fields to the extractor families
/// worth trying against the full text in the catch-all pass. Mirrors
/// `_relevant_groups`: date fields are deliberately excluded — the
/// catch-all pass never re-assigns dates.
fn relevant_groups(field_names: &[String]) -> HashSet<Family> {
    use Family::*;
    let mut groups = HashSet::new();
    for fname in field_names {
        if fname.starts_with("ihc_") {
            groups.insert(Ihc);
        } else if fname.starts_with("mol_") {
            groups.insert(Molecular);
        } else if fname.starts_with("ch") && fname.len() <= 5 {
            groups.insert(Chromosomal);
        } else if fname.starts_with("ampli_") {
            groups.insert(Amplification);
        } else if fname.starts_with("fusion_") {
            groups.insert(Fusion);
        } else if fname.starts_with("histo_") {
            groups.insert(Binary);
            groups.insert(Numerical);
        } else if matches!(fname.as_str(), "grade" | "ik_clinique" | "histo_mitoses" | "ihc_ki67" | "rx_dose" | "chm_cycles") {
            groups.insert(Numerical);
        } else if is_binary_like(fname) {
            groups.insert(Binary);
        }
    }
    groups
}

fn run_family(family: Family, text: &str, annotator: Option<&AssertionAnnotator>) -> HashMap<String, ExtractionValue> {
    match family {
        Family::Date => HashMap::new(), // dates are positional, handled by assign_dates
        Family::Ihc => ihc::extract_ihc(text),
        Family::Molecular => molecular::extract_molecular(text),
        Family::Chromosomal => chromosomal::extract_chromosomal(text),
        Family::Binary => binary::extract_binary(text, annotator),
        Family::Numerical => numerical::extract_numerical(text),
        Family::Amplification => amplification::extract_amplifications(text),
        Family::Fusion => fusion::extract_fusions(text),
    }
}

/// Keeps the first (highest-priority) result per field, restricted to
/// `feature_set`.
fn merge(target: &mut HashMap<String, ExtractionValue>, source: HashMap<String, ExtractionValue>, feature_set: &HashSet<String>, section_name: &str) {
    for (field, value) in source {
        if !feature_set.contains(&field) || target.contains_key(&field) {
            continue;
        }
        target.insert(field, value.with_section(section_name));
    }
}

/// Assigns the i-th date detected in `section_text` (by position) to
/// the i-th date field in `feature_set` still lacking a value, in the
/// field set's iteration order — mirrors the Python loop over
/// `date_fields_in_subset`.
fn assign_dates(target: &mut HashMap<String, ExtractionValue>, section_text: &str, feature_set: &HashSet<String>, section_name: &str) {
    let mut date_fields: Vec<&String> = feature_set.iter().filter(|f| !target.contains_key(f.as_str()) && is_date_field(f)).collect();
    date_fields.sort();
    if date_fields.is_empty() {
        return;
    }
    let detected = dates::extract_dates(section_text);
    for (field, (normalised, raw, start, end)) in date_fields.into_iter().zip(detected.into_iter()) {
        target.insert(field.clone(), ExtractionValue::rule(normalised, raw, start, end, 0.7).with_section(section_name));
    }
}

/// Runs all applicable Tier-1 extractors over `sections`, merging into a
/// single first-result-wins map restricted to `feature_subset`. `sections`
/// must be in document order — `merge`'s "first wins" rule makes the
/// earliest section in that order win a field appearing in more than
/// one. Falls back to a full-text pass — all families except dates —
/// for any `feature_subset` field still unfilled once sections are
/// exhausted, unless a `full_text` section was already present.
pub fn run_rule_extraction(
    full_text: &str,
    sections: &[(String, String)],
    feature_subset: &[String],
    annotator: Option<&AssertionAnnotator>,
) -> HashMap<String, ExtractionValue> {
    let feature_set: HashSet<String> = feature_subset.iter().cloned().collect();
    let mut results: HashMap<String, ExtractionValue> = HashMap::new();

    for (section_name, section_text) in sections {
        if section_text.trim().is_empty() {
            continue;
        }
        for &family in section_extractors(section_name) {
            if family == Family::Date {
                assign_dates(&mut results, section_text, &feature_set, section_name);
                continue;
            }
            let found = run_family(family, section_text, annotator);
            merge(&mut results, found, &feature_set, section_name);
        }
    }

    if !sections.iter().any(|(name, _)| name == "full_text") {
        let remaining: Vec<String> = feature_subset.iter().filter(|f| !results.contains_key(f.as_str())).cloned().collect();
        if !remaining.is_empty() {
            for family in relevant_groups(&remaining) {
                let found = run_family(family, full_text, annotator);
                merge(&mut results, found, &feature_set, "full_text");
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sections(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn runs_ihc_extractor_scoped_to_its_section() {
        let secs = sections(&[("ihc", "IDH1 : positif. ATRX : négatif.")]);
        let subset = vec!["ihc_idh1".to_string(), "ihc_atrx".to_string()];
        let results = run_rule_extraction("IDH1 : positif. ATRX : négatif.", &secs, &subset, None);
        assert_eq!(results["ihc_idh1"].value.as_str(), Some("positif"));
        assert_eq!(results["ihc_idh1"].section.as_deref(), Some("ihc"));
    }

    #[test]
    fn feature_subset_filters_out_unwanted_fields() {
        let secs = sections(&[("ihc", "IDH1 : positif. ATRX : négatif.")]);
        let subset = vec!["ihc_idh1".to_string()];
        let results = run_rule_extraction("IDH1 : positif. ATRX : négatif.", &secs, &subset, None);
        assert!(results.contains_key("ihc_idh1"));
        assert!(!results.contains_key("ihc_atrx"));
    }

    #[test]
    fn catch_all_pass_runs_when_no_full_text_section_present() {
        let secs = sections(&[("history", "Dossier ouvert le 03/04/2022.")]);
        let subset = vec!["ihc_idh1".to_string()];
        let results = run_rule_extraction("Dossier ouvert le 03/04/2022. IDH1 : positif.", &secs, &subset, None);
        assert_eq!(results["ihc_idh1"].section.as_deref(), Some("full_text"));
    }

    #[test]
    fn dates_are_assigned_positionally_to_unfilled_date_fields() {
        let secs = sections(&[("history", "Né le 01/01/1980, opéré le 12/03/2024.")]);
        let subset = vec!["date_de_naissance".to_string(), "chir_date".to_string()];
        let results = run_rule_extraction("Né le 01/01/1980, opéré le 12/03/2024.", &secs, &subset, None);
        assert_eq!(results["chir_date"].value.as_str(), Some("01/01/1980"));
        assert_eq!(results["date_de_naissance"].value.as_str(), Some("12/03/2024"));
    }

    #[test]
    fn first_section_wins_when_field_appears_in_two_sections() {
        let secs = sections(&[("ihc", "IDH1 : positif."), ("conclusion", "IDH1 : négatif.")]);
        let subset = vec!["ihc_idh1".to_string()];
        let results = run_rule_extraction("IDH1 : positif. ... IDH1 : négatif.", &secs, &subset, None);
        assert_eq!(results["ihc_idh1"].section.as_deref(), Some("ihc"));
    }

    #[test]
    fn catch_all_pass_does_not_assign_dates() {
        let secs = sections(&[("ihc", "IDH1 : positif.")]);
        let subset = vec!["ihc_idh1".to_string(), "date_de_naissance".to_string()];
        let results = run_rule_extraction("IDH1 : positif. Né le 01/01/1980.", &secs, &subset, None);
        assert!(!results.contains_key("date_de_naissance"));
    }
}
