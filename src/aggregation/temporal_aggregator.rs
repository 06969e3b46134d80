//! Temporal forward-fill and conflict resolution across a patient's
//! documents.
//!
//! Three feature temporal categories:
//! - **Static** — set once, updated only on a higher-priority correction.
//! - **Specimen-bound** — carried from specimen date until the next
//!   surgery resets it.
//! - **Time-varying** — carries the latest explicit value; a null never
//!   overwrites a previous explicit value.
//!
//! Grounded on `temporal_aggregation.py`'s `aggregate_patient_timeline`,
//! reimplemented over a plain `Vec<TimelineRow>` instead of a
//! `pandas.DataFrame`.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use serde::Serialize;

use crate::extraction::value::FieldValue;
use crate::provenance::ExtractionResult;
use crate::schema::fields::{ALL_BIO_FIELD_NAMES, ALL_CLINIQUE_FIELD_NAMES};
use crate::schema::routing::DocumentType;

static STATIC_FEATURES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "nip", "sexe", "date_de_naissance", "tumeur_lateralite", "tumeur_position", "activite_professionnelle",
        "antecedent_tumoral", "date_deces", "infos_deces",
        "date_1er_symptome", "epilepsie_1er_symptome", "ceph_hic_1er_symptome", "deficit_1er_symptome",
        "cognitif_1er_symptome", "autre_trouble_1er_symptome",
        "exam_radio_date_decouverte", "contraste_1er_symptome", "oedeme_1er_symptome", "calcif_1er_symptome",
        "neuroncologue", "neurochirurgien", "radiotherapeute", "localisation_radiotherapie", "localisation_chir",
    ]
    .into_iter()
    .collect()
});

static SPECIMEN_BOUND_FEATURES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "date_chir", "num_labo", "diag_histologique", "diag_integre", "classification_oms", "grade",
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

static TIME_VARYING_FEATURES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "ik_clinique", "epilepsie", "ceph_hic", "deficit", "cognitif", "autre_trouble",
        "chimios", "chm_date_debut", "chm_date_fin", "chm_cycles",
        "chir_date", "type_chirurgie",
        "rx_date_debut", "rx_date_fin", "rx_dose",
        "corticoides", "optune", "anti_epileptiques", "essai_therapeutique",
        "progress_clinique", "progress_radiologique", "date_progression",
        "dn_date", "evol_clinique",
    ]
    .into_iter()
    .collect()
});

const BIO_PRIORITY: &[&str] = &["anapath", "molecular_report", "rcp", "consultation", "radiology"];
const CLINIQUE_PRIORITY: &[&str] = &["consultation", "rcp", "anapath", "molecular_report", "radiology"];

fn priority_rank(doc_type: &str, field_name: &str) -> usize {
    let priority_list = if ALL_BIO_FIELD_NAMES.contains(&field_name) {
        BIO_PRIORITY
    } else if ALL_CLINIQUE_FIELD_NAMES.contains(&field_name) {
        CLINIQUE_PRIORITY
    } else {
        CLINIQUE_PRIORITY
    };
    priority_list.iter().position(|d| *d == doc_type).unwrap_or(priority_list.len())
}

fn is_surgery_event(extraction: &ExtractionResult) -> bool {
    for field in ["chir_date", "date_chir"] {
        if let Some(ev) = extraction.features.get(field) {
            if !ev.value.is_null() {
                return true;
            }
        }
    }
    false
}

/// `DD/MM/YYYY` → `YYYYMMDD` for chronological sorting; a missing date
/// sorts last and an unparseable date falls back to a plain string sort.
fn extraction_sort_key(extraction: &ExtractionResult) -> String {
    let Some(date_str) = &extraction.document_date else { return "99999999".to_string() };
    let parts: Vec<&str> = date_str.split('/').collect();
    if parts.len() == 3 {
        let (day, month, year) = (parts[0], parts[1], parts[2]);
        return format!("{:0>4}{:0>2}{:0>2}", year, month, day);
    }
    date_str.clone()
}

/// One timepoint in a patient's aggregated timeline.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineRow {
    pub patient_id: String,
    pub document_id: String,
    pub document_type: DocumentType,
    pub document_date: Option<String>,
    pub fields: HashMap<String, FieldValue>,
}

/// Aggregates all `ExtractionResult`s for one patient into a chronological
/// timeline, one row per source document, applying the static /
/// specimen-bound / time-varying forward-fill rules and document-type
/// priority conflict resolution at each step.
pub fn aggregate_patient_timeline(extractions: &[ExtractionResult]) -> Vec<TimelineRow> {
    if extractions.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<&ExtractionResult> = extractions.iter().collect();
    sorted.sort_by_key(|e| extraction_sort_key(e));

    let mut all_fields: HashSet<String> = HashSet::new();
    for ext in &sorted {
        all_fields.extend(ext.features.keys().cloned());
    }

    let mut static_state: HashMap<String, (FieldValue, String)> = HashMap::new();
    let mut specimen_state: HashMap<String, (FieldValue, String)> = HashMap::new();
    let mut time_varying_state: HashMap<String, (FieldValue, String)> = HashMap::new();

    let mut rows = Vec::with_capacity(sorted.len());

    for extraction in sorted {
        let doc_type = extraction.document_type.as_str();

        if is_surgery_event(extraction) {
            specimen_state.clear();
            tracing::debug!(document_id = %extraction.document_id, "new surgery detected, resetting specimen-bound features");
        }

        for (fname, ev) in &extraction.features {
            if ev.value.is_null() {
                continue;
            }
            let new_value = ev.value.clone();

            if STATIC_FEATURES.contains(fname.as_str()) {
                apply_priority_update(fname, new_value, doc_type, &mut static_state);
            } else if SPECIMEN_BOUND_FEATURES.contains(fname.as_str()) {
                apply_priority_update(fname, new_value, doc_type, &mut specimen_state);
            } else {
                apply_time_varying(fname, new_value, doc_type, &mut time_varying_state);
            }
        }

        let mut fields = HashMap::new();
        for fname in &all_fields {
            let value = static_state
                .get(fname)
                .or_else(|| specimen_state.get(fname))
                .or_else(|| time_varying_state.get(fname))
                .map(|(v, _)| v.clone())
                .unwrap_or(FieldValue::Null);
            fields.insert(fname.clone(), value);
        }

        rows.push(TimelineRow {
            patient_id: extraction.patient_id.clone(),
            document_id: extraction.document_id.clone(),
            document_type: extraction.document_type,
            document_date: extraction.document_date.clone(),
            fields,
        });
    }

    rows
}

/// Shared update rule for static and specimen-bound features: set on
/// first sight, otherwise update only if the new source outranks the
/// one currently held.
fn apply_priority_update(fname: &str, new_value: FieldValue, doc_type: &str, state: &mut HashMap<String, (FieldValue, String)>) {
    match state.get(fname) {
        None => {
            state.insert(fname.to_string(), (new_value, doc_type.to_string()));
        }
        Some((_, existing_doc_type)) => {
            if priority_rank(doc_type, fname) < priority_rank(existing_doc_type, fname) {
                state.insert(fname.to_string(), (new_value, doc_type.to_string()));
            }
        }
    }
}

/// Time-varying update rule: always take the latest explicit value,
/// since extractions are processed in chronological order.
fn apply_time_varying(fname: &str, new_value: FieldValue, doc_type: &str, state: &mut HashMap<String, (FieldValue, String)>) {
    state.insert(fname.to_string(), (new_value, doc_type.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::value::ExtractionValue;

    fn make_extraction(document_id: &str, document_type: DocumentType, date: Option<&str>, fields: &[(&str, &str)]) -> ExtractionResult {
        let mut result = ExtractionResult::new(document_id, document_type);
        result.document_date = date.map(|d| d.to_string());
        result.patient_id = "patient_1".to_string();
        for (name, value) in fields {
            result.features.insert(name.to_string(), ExtractionValue::rule(*value, *value, 0, value.len(), 0.9));
        }
        result
    }

    #[test]
    fn empty_input_yields_empty_timeline() {
        assert!(aggregate_patient_timeline(&[]).is_empty());
    }

    #[test]
    fn sorts_chronologically_by_document_date() {
        let early = make_extraction("doc_b", DocumentType::Consultation, Some("01/01/2021"), &[]);
        let late = make_extraction("doc_a", DocumentType::Consultation, Some("01/06/2022"), &[]);
        let rows = aggregate_patient_timeline(&[late, early]);
        assert_eq!(rows[0].document_id, "doc_b");
        assert_eq!(rows[1].document_id, "doc_a");
    }

    #[test]
    fn missing_date_sorts_last() {
        let with_date = make_extraction("doc_dated", DocumentType::Consultation, Some("01/01/2020"), &[]);
        let no_date = make_extraction("doc_undated", DocumentType::Consultation, None, &[]);
        let rows = aggregate_patient_timeline(&[no_date, with_date]);
        assert_eq!(rows[0].document_id, "doc_dated");
        assert_eq!(rows[1].document_id, "doc_undated");
    }

    #[test]
    fn static_feature_is_set_once_and_persists() {
        let ext = make_extraction("doc_1", DocumentType::Consultation, Some("01/01/2020"), &[("sexe", "M")]);
        let rows = aggregate_patient_timeline(&[ext]);
        assert_eq!(rows[0].fields["sexe"].as_str(), Some("M"));
    }

    #[test]
    fn static_feature_updates_only_from_higher_priority_source() {
        let clinique_first = make_extraction("doc_1", DocumentType::Radiology, Some("01/01/2020"), &[("sexe", "F")]);
        let consultation_second = make_extraction("doc_2", DocumentType::Consultation, Some("01/02/2020"), &[("sexe", "M")]);
        let rows = aggregate_patient_timeline(&[clinique_first, consultation_second]);
        assert_eq!(rows[1].fields["sexe"].as_str(), Some("M"));
    }

    #[test]
    fn specimen_bound_feature_resets_on_new_surgery() {
        let first_surgery = make_extraction("doc_1", DocumentType::Anapath, Some("01/01/2020"), &[("chir_date", "01/01/2020"), ("diag_histologique", "glioblastome")]);
        let second_surgery = make_extraction("doc_2", DocumentType::Anapath, Some("01/01/2022"), &[("chir_date", "01/01/2022")]);
        let rows = aggregate_patient_timeline(&[first_surgery, second_surgery]);
        assert_eq!(rows[0].fields["diag_histologique"].as_str(), Some("glioblastome"));
        assert!(rows[1].fields["diag_histologique"].is_null());
    }

    #[test]
    fn time_varying_feature_carries_latest_explicit_value() {
        let first = make_extraction("doc_1", DocumentType::Consultation, Some("01/01/2020"), &[("ik_clinique", "90")]);
        let second = make_extraction("doc_2", DocumentType::Consultation, Some("01/02/2020"), &[]);
        let rows = aggregate_patient_timeline(&[first, second]);
        assert_eq!(rows[1].fields["ik_clinique"].as_str(), Some("90"));
    }

    #[test]
    fn time_varying_feature_updates_to_a_new_explicit_value() {
        let first = make_extraction("doc_1", DocumentType::Consultation, Some("01/01/2020"), &[("ik_clinique", "90")]);
        let second = make_extraction("doc_2", DocumentType::Consultation, Some("01/02/2020"), &[("ik_clinique", "70")]);
        let rows = aggregate_patient_timeline(&[first, second]);
        assert_eq!(rows[1].fields["ik_clinique"].as_str(), Some("70"));
    }
}
