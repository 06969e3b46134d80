//! The ~100-field registry.
//!
//! Grounded on `schema.py`'s `BIO_FIELDS` / `CLINIQUE_FIELDS` lists (names,
//! display labels, types, allowed-value sets) merged with the temporal
//! category assignments from `aggregation/temporal_aggregation.py`'s
//! `STATIC_FEATURES` / `SPECIMEN_BOUND_FEATURES` / `TIME_VARYING_FEATURES`
//! sets. Fields are declared once in a `LazyLock` table and never mutated
//! afterwards, per spec.md §9 ("dynamic field registry → static schema").

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::SchemaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Date,
    Categorical,
    FreeText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalCategory {
    Static,
    SpecimenBound,
    TimeVarying,
}

/// Allowed-value set for a categorical/constrained field. `None` on the
/// `FieldDefinition` means unconstrained (free text or unbounded string/int).
#[derive(Debug, Clone, Copy)]
pub enum AllowedValues {
    Strings(&'static [&'static str]),
    Integers(&'static [i64]),
}

impl AllowedValues {
    pub fn contains_str(&self, value: &str) -> bool {
        match self {
            AllowedValues::Strings(set) => set.iter().any(|v| v.eq_ignore_ascii_case(value)),
            AllowedValues::Integers(_) => false,
        }
    }

    pub fn contains_int(&self, value: i64) -> bool {
        match self {
            AllowedValues::Integers(set) => set.contains(&value),
            AllowedValues::Strings(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: &'static str,
    pub display_name: &'static str,
    pub field_type: FieldType,
    pub allowed_values: Option<AllowedValues>,
    pub nullable: bool,
    pub group: &'static str,
    pub temporal: TemporalCategory,
}

const SEX: &[&str] = &["M", "F"];
const BINARY: &[&str] = &["oui", "non"];
const IHC_STATUS: &[&str] = &["positif", "negatif", "maintenu"];
const CHROMOSOMAL: &[&str] = &["gain", "perte", "perte partielle"];
const WHO_CLASSIFICATION: &[&str] = &["2007", "2016", "2021"];
const SURGERY_TYPE: &[&str] = &["exerese complete", "exerese partielle", "exerese", "biopsie", "en attente"];
const GRADE: &[i64] = &[1, 2, 3, 4];
const LATERALITY: &[&str] = &["gauche", "droite", "bilateral", "median"];
const ANTECEDENT_TUMORAL: &[&str] = &["Oui", "Non", "oui", "non"];

use FieldType::*;
use TemporalCategory::*;

fn def(
    name: &'static str,
    display_name: &'static str,
    field_type: FieldType,
    allowed_values: Option<AllowedValues>,
    group: &'static str,
    temporal: TemporalCategory,
) -> FieldDefinition {
    FieldDefinition { name, display_name, field_type, allowed_values, nullable: true, group, temporal }
}

fn strs(s: &'static [&'static str]) -> Option<AllowedValues> {
    Some(AllowedValues::Strings(s))
}

fn ints(s: &'static [i64]) -> Option<AllowedValues> {
    Some(AllowedValues::Integers(s))
}

/// The 54 biological fields (`BIO_FIELDS`), in Python source order.
fn bio_fields() -> Vec<FieldDefinition> {
    vec![
        def("nip", "NIP (patient ID)", String, None, "identifiers", Static),
        def("date_chir", "Date chirurgie", Date, None, "identifiers", SpecimenBound),
        def("num_labo", "Numéro laboratoire", String, None, "identifiers", SpecimenBound),
        def("diag_histologique", "Diagnostic histologique", FreeText, None, "diagnosis", SpecimenBound),
        def("diag_integre", "Diagnostic intégré", FreeText, None, "diagnosis", SpecimenBound),
        def("classification_oms", "Classification OMS", Categorical, strs(WHO_CLASSIFICATION), "diagnosis", SpecimenBound),
        def("grade", "Grade OMS", Integer, ints(GRADE), "diagnosis", SpecimenBound),
        def("ihc_idh1", "IHC IDH1", Categorical, strs(IHC_STATUS), "ihc", SpecimenBound),
        def("ihc_p53", "IHC p53", Categorical, strs(IHC_STATUS), "ihc", SpecimenBound),
        def("ihc_atrx", "IHC ATRX", Categorical, strs(IHC_STATUS), "ihc", SpecimenBound),
        def("ihc_fgfr3", "IHC FGFR3", Categorical, strs(IHC_STATUS), "ihc", SpecimenBound),
        def("ihc_braf", "IHC BRAF", Categorical, strs(IHC_STATUS), "ihc", SpecimenBound),
        def("ihc_hist_h3k27m", "IHC H3K27M", Categorical, strs(IHC_STATUS), "ihc", SpecimenBound),
        def("ihc_hist_h3k27me3", "IHC H3K27me3", Categorical, strs(IHC_STATUS), "ihc", SpecimenBound),
        def("ihc_egfr_hirsch", "IHC EGFR (Hirsch / status)", String, None, "ihc", SpecimenBound),
        def("ihc_gfap", "IHC GFAP", Categorical, strs(IHC_STATUS), "ihc", SpecimenBound),
        def("ihc_olig2", "IHC Olig2", Categorical, strs(IHC_STATUS), "ihc", SpecimenBound),
        def("ihc_ki67", "IHC Ki67 (%)", String, None, "ihc", SpecimenBound),
        def("ihc_mmr", "IHC MMR", Categorical, strs(IHC_STATUS), "ihc", SpecimenBound),
        def("histo_necrose", "Nécrose", Categorical, strs(BINARY), "histology", SpecimenBound),
        def("histo_pec", "Prise de contraste endothéliocapillaire", Categorical, strs(BINARY), "histology", SpecimenBound),
        def("histo_mitoses", "Mitoses (count)", Integer, None, "histology", SpecimenBound),
        def("mol_idh1", "IDH1 moléculaire", String, None, "molecular", SpecimenBound),
        def("mol_idh2", "IDH2 moléculaire", String, None, "molecular", SpecimenBound),
        def("mol_tert", "TERT moléculaire", String, None, "molecular", SpecimenBound),
        def("mol_CDKN2A", "CDKN2A moléculaire", String, None, "molecular", SpecimenBound),
        def("mol_h3f3a", "H3F3A moléculaire", String, None, "molecular", SpecimenBound),
        def("mol_hist1h3b", "HIST1H3B moléculaire", String, None, "molecular", SpecimenBound),
        def("mol_braf", "BRAF moléculaire", String, None, "molecular", SpecimenBound),
        def("mol_mgmt", "MGMT méthylation", String, None, "molecular", SpecimenBound),
        def("mol_fgfr1", "FGFR1 moléculaire", String, None, "molecular", SpecimenBound),
        def("mol_egfr_mut", "EGFR mutation", String, None, "molecular", SpecimenBound),
        def("mol_prkca", "PRKCA moléculaire", String, None, "molecular", SpecimenBound),
        def("mol_p53", "TP53 moléculaire", String, None, "molecular", SpecimenBound),
        def("mol_pten", "PTEN moléculaire", String, None, "molecular", SpecimenBound),
        def("mol_cic", "CIC moléculaire", String, None, "molecular", SpecimenBound),
        def("mol_fubp1", "FUBP1 moléculaire", String, None, "molecular", SpecimenBound),
        def("mol_atrx", "ATRX moléculaire", String, None, "molecular", SpecimenBound),
        def("ch1p", "1p", Categorical, strs(CHROMOSOMAL), "chromosomal", SpecimenBound),
        def("ch19q", "19q", Categorical, strs(CHROMOSOMAL), "chromosomal", SpecimenBound),
        def("ch10p", "10p", Categorical, strs(CHROMOSOMAL), "chromosomal", SpecimenBound),
        def("ch10q", "10q", Categorical, strs(CHROMOSOMAL), "chromosomal", SpecimenBound),
        def("ch7p", "7p", Categorical, strs(CHROMOSOMAL), "chromosomal", SpecimenBound),
        def("ch7q", "7q", Categorical, strs(CHROMOSOMAL), "chromosomal", SpecimenBound),
        def("ch9p", "9p", Categorical, strs(CHROMOSOMAL), "chromosomal", SpecimenBound),
        def("ch9q", "9q", Categorical, strs(CHROMOSOMAL), "chromosomal", SpecimenBound),
        def("ampli_mdm2", "Amplification MDM2", Categorical, strs(BINARY), "amplification", SpecimenBound),
        def("ampli_cdk4", "Amplification CDK4", Categorical, strs(BINARY), "amplification", SpecimenBound),
        def("ampli_egfr", "Amplification EGFR", Categorical, strs(BINARY), "amplification", SpecimenBound),
        def("ampli_met", "Amplification MET", Categorical, strs(BINARY), "amplification", SpecimenBound),
        def("ampli_mdm4", "Amplification MDM4", Categorical, strs(BINARY), "amplification", SpecimenBound),
        def("fusion_fgfr", "Fusion FGFR", Categorical, strs(BINARY), "fusion", SpecimenBound),
        def("fusion_ntrk", "Fusion NTRK", Categorical, strs(BINARY), "fusion", SpecimenBound),
        def("fusion_autre", "Fusion autre", Categorical, strs(BINARY), "fusion", SpecimenBound),
    ]
}

/// The 48 clinical fields (`CLINIQUE_FIELDS`), in Python source order.
/// `nip` is redeclared here (demographics/string) and, per the dict-merge
/// semantics of the Python registry, this definition wins over the
/// biological one (see DESIGN.md Open Question 1).
fn clinique_fields() -> Vec<FieldDefinition> {
    vec![
        def("nip", "NIP (patient ID)", String, None, "demographics", Static),
        def("date_de_naissance", "Date de naissance", Date, None, "demographics", Static),
        def("sexe", "Sexe", Categorical, strs(SEX), "demographics", Static),
        def("activite_professionnelle", "Activité professionnelle", FreeText, None, "demographics", Static),
        def("antecedent_tumoral", "Antécédent tumoral", Categorical, strs(ANTECEDENT_TUMORAL), "demographics", Static),
        def("neuroncologue", "Neuro-oncologue", FreeText, None, "care_team", Static),
        def("neurochirurgien", "Neurochirurgien", FreeText, None, "care_team", Static),
        def("radiotherapeute", "Radiothérapeute", FreeText, None, "care_team", Static),
        def("localisation_radiotherapie", "Localisation radiothérapie", FreeText, None, "care_team", Static),
        def("localisation_chir", "Localisation chirurgie", FreeText, None, "care_team", Static),
        def("date_deces", "Date décès", Date, None, "outcome", Static),
        def("infos_deces", "Infos décès", FreeText, None, "outcome", Static),
        def("date_1er_symptome", "Date 1er symptôme", Date, None, "first_symptoms", Static),
        def("epilepsie_1er_symptome", "Épilepsie 1er symptôme", Categorical, strs(BINARY), "first_symptoms", Static),
        def("ceph_hic_1er_symptome", "Céphalées/HTIC 1er symptôme", Categorical, strs(BINARY), "first_symptoms", Static),
        def("deficit_1er_symptome", "Déficit 1er symptôme", Categorical, strs(BINARY), "first_symptoms", Static),
        def("cognitif_1er_symptome", "Cognitif 1er symptôme", Categorical, strs(BINARY), "first_symptoms", Static),
        def("autre_trouble_1er_symptome", "Autre trouble 1er symptôme", Categorical, strs(BINARY), "first_symptoms", Static),
        def("exam_radio_date_decouverte", "Date découverte radiologique", Date, None, "radiology", Static),
        def("contraste_1er_symptome", "Prise de contraste initiale", Categorical, strs(BINARY), "radiology", Static),
        def("oedeme_1er_symptome", "Œdème initial", Categorical, strs(BINARY), "radiology", Static),
        def("calcif_1er_symptome", "Calcification initiale", Categorical, strs(BINARY), "radiology", Static),
        def("tumeur_lateralite", "Latéralité tumeur", Categorical, strs(LATERALITY), "tumour_location", Static),
        def("tumeur_position", "Position tumeur", FreeText, None, "tumour_location", Static),
        def("dn_date", "Date dernière nouvelle", Date, None, "evolution", TimeVarying),
        def("evol_clinique", "Évolution clinique", String, None, "evolution", TimeVarying),
        def("chimios", "Chimiothérapie(s)", FreeText, None, "treatment_chemo", TimeVarying),
        def("chm_date_debut", "Date début chimio", Date, None, "treatment_chemo", TimeVarying),
        def("chm_date_fin", "Date fin chimio", Date, None, "treatment_chemo", TimeVarying),
        def("chm_cycles", "Nombre cycles chimio", Integer, None, "treatment_chemo", TimeVarying),
        def("ik_clinique", "Indice de Karnofsky", Integer, None, "clinical_state", TimeVarying),
        def("progress_clinique", "Progression clinique", Categorical, strs(BINARY), "clinical_state", TimeVarying),
        def("progress_radiologique", "Progression radiologique", Categorical, strs(BINARY), "clinical_state", TimeVarying),
        def("date_progression", "Date progression", Date, None, "clinical_state", TimeVarying),
        def("epilepsie", "Épilepsie actuelle", Categorical, strs(BINARY), "current_symptoms", TimeVarying),
        def("ceph_hic", "Céphalées/HTIC actuelle", Categorical, strs(BINARY), "current_symptoms", TimeVarying),
        def("deficit", "Déficit actuel", Categorical, strs(BINARY), "current_symptoms", TimeVarying),
        def("cognitif", "Trouble cognitif", Categorical, strs(BINARY), "current_symptoms", TimeVarying),
        def("autre_trouble", "Autre trouble", FreeText, None, "current_symptoms", TimeVarying),
        def("anti_epileptiques", "Anti-épileptiques", Categorical, strs(BINARY), "adjunct", TimeVarying),
        def("essai_therapeutique", "Essai thérapeutique", Categorical, strs(BINARY), "adjunct", TimeVarying),
        def("chir_date", "Date chirurgie", Date, None, "surgery", TimeVarying),
        def("type_chirurgie", "Type chirurgie", Categorical, strs(SURGERY_TYPE), "surgery", TimeVarying),
        def("rx_date_debut", "Date début radiothérapie", Date, None, "treatment_radio", TimeVarying),
        def("rx_date_fin", "Date fin radiothérapie", Date, None, "treatment_radio", TimeVarying),
        def("rx_dose", "Dose radiothérapie (Gy)", String, None, "treatment_radio", TimeVarying),
        def("corticoides", "Corticoïdes", Categorical, strs(BINARY), "adjunct", TimeVarying),
        def("optune", "Optune (TTFields)", Categorical, strs(BINARY), "adjunct", TimeVarying),
    ]
}

/// All fields, BIO first then CLINIQUE — later entries win on name
/// collision, matching the Python `{**bio, **clinique}` merge.
pub static FIELDS_BY_NAME: LazyLock<HashMap<&'static str, FieldDefinition>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for f in bio_fields() {
        map.insert(f.name, f);
    }
    for f in clinique_fields() {
        map.insert(f.name, f);
    }
    map
});

pub static ALL_BIO_FIELD_NAMES: LazyLock<Vec<&'static str>> =
    LazyLock::new(|| bio_fields().into_iter().map(|f| f.name).collect());

pub static ALL_CLINIQUE_FIELD_NAMES: LazyLock<Vec<&'static str>> =
    LazyLock::new(|| clinique_fields().into_iter().map(|f| f.name).collect());

pub fn get_field(name: &str) -> Result<&'static FieldDefinition, SchemaError> {
    FIELDS_BY_NAME
        .get(name)
        .ok_or_else(|| SchemaError::UnknownField(name.to_string()))
}

pub fn all_field_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = FIELDS_BY_NAME.keys().copied().collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_unique_field_count_matches_python_merge() {
        // 54 bio + 48 clinique, minus the one `nip` collision.
        assert_eq!(FIELDS_BY_NAME.len(), 54 + 48 - 1);
    }

    #[test]
    fn nip_resolves_to_clinique_demographics_definition() {
        let nip = get_field("nip").unwrap();
        assert_eq!(nip.group, "demographics");
        assert_eq!(nip.field_type, FieldType::String);
        assert_eq!(nip.temporal, TemporalCategory::Static);
    }

    #[test]
    fn unknown_field_is_an_error() {
        assert!(get_field("not_a_real_field").is_err());
    }

    #[test]
    fn grade_is_integer_with_allowed_values() {
        let grade = get_field("grade").unwrap();
        assert_eq!(grade.field_type, FieldType::Integer);
        match grade.allowed_values {
            Some(AllowedValues::Integers(vals)) => assert_eq!(vals, &[1, 2, 3, 4]),
            _ => panic!("expected integer allowed values"),
        }
    }

    #[test]
    fn ihc_idh1_is_specimen_bound() {
        assert_eq!(get_field("ihc_idh1").unwrap().temporal, TemporalCategory::SpecimenBound);
    }

    #[test]
    fn chir_date_is_time_varying() {
        assert_eq!(get_field("chir_date").unwrap().temporal, TemporalCategory::TimeVarying);
    }

    #[test]
    fn allowed_values_string_match_is_case_insensitive() {
        let sexe = get_field("sexe").unwrap();
        let av = sexe.allowed_values.as_ref().unwrap();
        assert!(av.contains_str("m"));
        assert!(av.contains_str("M"));
        assert!(!av.contains_str("x"));
    }
}
