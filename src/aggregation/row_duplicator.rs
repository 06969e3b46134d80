//! Row duplication for documents reporting multiple treatment events.
//!
//! Detects when a single document describes multiple distinct surgeries,
//! chemotherapy lines, radiotherapy courses, or progression events, and
//! splits it into separate [`ExtractionResult`] rows.
//!
//! Grounded on `row_duplicator.py`'s `detect_multiple_events` and its
//! four per-axis detectors.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::extraction::value::{ExtractionValue, FieldValue};
use crate::provenance::ExtractionResult;

/// Fields shared across all rows produced for one document: demographics,
/// tumour location, and every specimen-bound biological field.
pub static SHARED_FEATURES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "nip", "date_de_naissance", "sexe", "activite_professionnelle", "antecedent_tumoral",
        "neuroncologue", "neurochirurgien", "radiotherapeute", "localisation_radiotherapie", "localisation_chir",
        "tumeur_lateralite", "tumeur_position",
        "date_deces", "infos_deces",
        "num_labo",
        "diag_histologique", "diag_integre", "classification_oms", "grade",
        "date_1er_symptome", "epilepsie_1er_symptome", "ceph_hic_1er_symptome", "deficit_1er_symptome",
        "cognitif_1er_symptome", "autre_trouble_1er_symptome",
        "exam_radio_date_decouverte", "contraste_1er_symptome", "oedeme_1er_symptome", "calcif_1er_symptome",
        "ihc_idh1", "ihc_p53", "ihc_atrx", "ihc_fgfr3", "ihc_braf", "ihc_hist_h3k27m", "ihc_hist_h3k27me3",
        "ihc_egfr_hirsch", "ihc_gfap", "ihc_olig2", "ihc_ki67", "ihc_mmr",
        "histo_necrose", "histo_pec", "histo_mitoses",
        "mol_idh1", "mol_idh2", "mol_tert", "mol_CDKN2A", "mol_h3f3a", "mol_hist1h3b", "mol_braf", "mol_mgmt",
        "mol_fgfr1", "mol_egfr_mut", "mol_prkca", "mol_p53", "mol_pten", "mol_cic", "mol_fubp1", "mol_atrx",
        "ch1p", "ch19q", "ch10p", "ch10q", "ch7p", "ch7q", "ch9p", "ch9q",
        "ampli_mdm2", "ampli_cdk4", "ampli_egfr", "ampli_met", "ampli_mdm4",
        "fusion_fgfr", "fusion_ntrk", "fusion_autre",
    ]
    .into_iter()
    .collect()
});

/// Clinical state fields carried alongside each event's timepoint.
const CLINICAL_STATE_FIELDS: &[&str] = &[
    "ik_clinique", "epilepsie", "ceph_hic", "deficit", "cognitif", "autre_trouble", "anti_epileptiques",
    "essai_therapeutique", "corticoides", "optune", "dn_date", "evol_clinique",
];

static DELIMITER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)[;,]|\bet\b|\bpuis\b").unwrap());

fn get_feature_str(extraction: &ExtractionResult, field: &str) -> Option<String> {
    let ev = extraction.features.get(field)?;
    match &ev.value {
        FieldValue::Null => None,
        FieldValue::String(s) => Some(s.clone()),
        FieldValue::Integer(i) => Some(i.to_string()),
        FieldValue::Float(f) => Some(f.to_string()),
    }
}

/// Splits a concatenated value string on `;`, `,`, ` et `, ` puis ` — never
/// on `/`, since dates use `DD/MM/YYYY`.
fn parse_multiple_values(value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    DELIMITER_RE.split(value).map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect()
}

/// Distinct values from a (possibly multi-valued) date-like field,
/// order-preserving.
fn count_distinct_dates(extraction: &ExtractionResult, field: &str) -> Vec<String> {
    let Some(raw) = get_feature_str(extraction, field) else { return Vec::new() };
    let parts = parse_multiple_values(&raw);
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for p in parts {
        if seen.insert(p.clone()) {
            result.push(p);
        }
    }
    result
}

fn dedup_preserving_order(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for v in values {
        if seen.insert(v.clone()) {
            result.push(v);
        }
    }
    result
}

fn date_value(date: &str) -> ExtractionValue {
    ExtractionValue::rule(date, date, 0, date.len(), 0.7)
}

fn create_event_row(base: &ExtractionResult, event_features: Vec<(String, ExtractionValue)>, event_index: usize, event_type: &str) -> ExtractionResult {
    let mut new_result = ExtractionResult::new(base.document_id.clone(), base.document_type);
    new_result.document_date = base.document_date.clone();
    new_result.patient_id = base.patient_id.clone();
    new_result.sections_detected = base.sections_detected.clone();
    new_result.extraction_log = base.extraction_log.clone();
    new_result.flagged_for_review = base.flagged_for_review.clone();
    new_result.classification_confidence = base.classification_confidence;
    new_result.classification_is_ambiguous = base.classification_is_ambiguous;
    new_result.tier1_count = base.tier1_count;
    new_result.tier2_count = base.tier2_count;
    new_result.total_extraction_time_ms = base.total_extraction_time_ms;

    let mut new_features = std::collections::HashMap::new();
    for (fname, fval) in &base.features {
        if SHARED_FEATURES.contains(fname.as_str()) {
            new_features.insert(fname.clone(), fval.clone());
        }
    }
    for (fname, fval) in event_features {
        new_features.insert(fname, fval);
    }
    new_result.features = new_features;
    new_result.add_log(format!("Row duplicated: event {} ({}) from document {}", event_index + 1, event_type, base.document_id));
    new_result
}

fn copy_clinical_state(extraction: &ExtractionResult, event: &mut Vec<(String, ExtractionValue)>) {
    for f in CLINICAL_STATE_FIELDS {
        if let Some(v) = extraction.features.get(*f) {
            event.push((f.to_string(), v.clone()));
        }
    }
}

fn detect_surgery_events(extraction: &ExtractionResult) -> Vec<Vec<(String, ExtractionValue)>> {
    let mut dates = Vec::new();
    for field in ["chir_date", "date_chir"] {
        dates.extend(count_distinct_dates(extraction, field));
    }
    let unique_dates = dedup_preserving_order(dates);
    if unique_dates.len() <= 1 {
        return Vec::new();
    }

    unique_dates
        .into_iter()
        .map(|date_val| {
            let mut event = vec![("chir_date".to_string(), date_value(&date_val)), ("date_chir".to_string(), date_value(&date_val))];
            if let Some(v) = extraction.features.get("type_chirurgie") {
                event.push(("type_chirurgie".to_string(), v.clone()));
            }
            copy_clinical_state(extraction, &mut event);
            event
        })
        .collect()
}

fn detect_chemo_events(extraction: &ExtractionResult) -> Vec<Vec<(String, ExtractionValue)>> {
    let dates = count_distinct_dates(extraction, "chm_date_debut");
    if dates.len() <= 1 {
        return Vec::new();
    }

    let chemo_names = parse_multiple_values(&get_feature_str(extraction, "chimios").unwrap_or_default());

    dates
        .iter()
        .enumerate()
        .map(|(i, date_val)| {
            let mut event = vec![("chm_date_debut".to_string(), date_value(date_val))];
            if chemo_names.len() == dates.len() {
                event.push(("chimios".to_string(), date_value(&chemo_names[i])));
            } else if let Some(v) = extraction.features.get("chimios") {
                event.push(("chimios".to_string(), v.clone()));
            }
            for f in ["chm_date_fin", "chm_cycles"] {
                if let Some(v) = extraction.features.get(f) {
                    event.push((f.to_string(), v.clone()));
                }
            }
            copy_clinical_state(extraction, &mut event);
            event
        })
        .collect()
}

fn detect_radio_events(extraction: &ExtractionResult) -> Vec<Vec<(String, ExtractionValue)>> {
    let dates = count_distinct_dates(extraction, "rx_date_debut");
    if dates.len() <= 1 {
        return Vec::new();
    }

    dates
        .iter()
        .map(|date_val| {
            let mut event = vec![("rx_date_debut".to_string(), date_value(date_val))];
            for f in ["rx_date_fin", "rx_dose"] {
                if let Some(v) = extraction.features.get(f) {
                    event.push((f.to_string(), v.clone()));
                }
            }
            copy_clinical_state(extraction, &mut event);
            event
        })
        .collect()
}

fn detect_progression_events(extraction: &ExtractionResult) -> Vec<Vec<(String, ExtractionValue)>> {
    let dates = count_distinct_dates(extraction, "date_progression");
    if dates.len() <= 1 {
        return Vec::new();
    }

    dates
        .iter()
        .map(|date_val| {
            let mut event = vec![("date_progression".to_string(), date_value(date_val))];
            for f in ["progress_clinique", "progress_radiologique"] {
                if let Some(v) = extraction.features.get(f) {
                    event.push((f.to_string(), v.clone()));
                }
            }
            copy_clinical_state(extraction, &mut event);
            event
        })
        .collect()
}

/// Checks if the document reports multiple distinct treatment events, in
/// priority order (surgery, chemotherapy, radiotherapy, progression), and
/// splits into one `ExtractionResult` per event if so. Event axes are
/// never combined in a single pass to avoid a combinatorial explosion;
/// the first axis with more than one event wins.
pub fn detect_multiple_events(extraction: &ExtractionResult) -> Vec<ExtractionResult> {
    let detectors: [(fn(&ExtractionResult) -> Vec<Vec<(String, ExtractionValue)>>, &str); 4] = [
        (detect_surgery_events, "surgery"),
        (detect_chemo_events, "chemotherapy"),
        (detect_radio_events, "radiotherapy"),
        (detect_progression_events, "progression"),
    ];

    for (detector, event_type) in detectors {
        let events = detector(extraction);
        if !events.is_empty() {
            return events.into_iter().enumerate().map(|(i, ev)| create_event_row(extraction, ev, i, event_type)).collect();
        }
    }

    vec![extraction.clone()]
}
