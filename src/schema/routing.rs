//! Document-type routing and LLM feature-group buckets.
//!
//! Grounded on `schema.py`'s `FEATURE_ROUTING` / `FEATURE_GROUPS` dicts and
//! the `_resolve_patterns` prefix-glob helper that builds them.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::SchemaError;
use crate::schema::fields::{ALL_BIO_FIELD_NAMES, ALL_CLINIQUE_FIELD_NAMES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Anapath,
    MolecularReport,
    Consultation,
    Rcp,
    Radiology,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Anapath => "anapath",
            DocumentType::MolecularReport => "molecular_report",
            DocumentType::Consultation => "consultation",
            DocumentType::Rcp => "rcp",
            DocumentType::Radiology => "radiology",
        }
    }

    pub fn all() -> &'static [DocumentType] {
        &[
            DocumentType::Anapath,
            DocumentType::MolecularReport,
            DocumentType::Consultation,
            DocumentType::Rcp,
            DocumentType::Radiology,
        ]
    }
}

impl std::str::FromStr for DocumentType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anapath" => Ok(DocumentType::Anapath),
            "molecular_report" => Ok(DocumentType::MolecularReport),
            "consultation" => Ok(DocumentType::Consultation),
            "rcp" => Ok(DocumentType::Rcp),
            "radiology" => Ok(DocumentType::Radiology),
            other => Err(SchemaError::UnknownDocumentType(other.to_string())),
        }
    }
}

/// Resolve a list of field-name patterns (optional trailing or leading
/// `*`) against a candidate field-name pool, returning the sorted,
/// deduplicated set of concrete matches. Mirrors `_resolve_patterns` /
/// `_fields_matching`.
fn resolve_patterns(pool: &[&'static str], patterns: &[&str]) -> Vec<&'static str> {
    let mut out = Vec::new();
    for pat in patterns {
        if let Some(prefix) = pat.strip_suffix('*') {
            out.extend(pool.iter().copied().filter(|name| name.starts_with(prefix)));
        } else if let Some(suffix) = pat.strip_prefix('*') {
            out.extend(pool.iter().copied().filter(|name| name.ends_with(suffix)));
        } else {
            out.extend(pool.iter().copied().filter(|name| *name == *pat));
        }
    }
    out.sort_unstable();
    out.dedup();
    out
}

static RCP_BIO_FIELDS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    resolve_patterns(
        &ALL_BIO_FIELD_NAMES,
        &[
            "diag_histologique", "diag_integre", "classification_oms", "grade",
            "ihc_*", "mol_*", "ch*", "ampli_*", "fusion_*",
            "histo_necrose", "histo_pec", "histo_mitoses",
        ],
    )
});

static RCP_CLINIQUE_FIELDS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    resolve_patterns(
        &ALL_CLINIQUE_FIELD_NAMES,
        &[
            "nip", "sexe", "date_de_naissance",
            "chimios", "chm_*",
            "rx_*",
            "chir_date", "type_chirurgie",
            "ik_clinique",
            "tumeur_lateralite", "tumeur_position",
            "evol_clinique",
            "progress_clinique", "progress_radiologique", "date_progression",
        ],
    )
});

static RADIOLOGY_CLINIQUE_FIELDS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    resolve_patterns(
        &ALL_CLINIQUE_FIELD_NAMES,
        &[
            "tumeur_lateralite", "tumeur_position",
            "exam_radio_date_decouverte",
            "contraste_1er_symptome", "oedeme_1er_symptome", "calcif_1er_symptome",
            "progress_radiologique",
        ],
    )
});

struct Routing {
    bio: Vec<&'static str>,
    clinique: Vec<&'static str>,
}

static FEATURE_ROUTING: LazyLock<HashMap<DocumentType, Routing>> = LazyLock::new(|| {
    let mut m = HashMap::new();
    m.insert(
        DocumentType::Anapath,
        Routing { bio: ALL_BIO_FIELD_NAMES.clone(), clinique: Vec::new() },
    );
    m.insert(
        DocumentType::MolecularReport,
        Routing {
            bio: resolve_patterns(&ALL_BIO_FIELD_NAMES, &["mol_*", "ch*", "ampli_*", "fusion_*", "mol_mgmt"]),
            clinique: Vec::new(),
        },
    );
    m.insert(
        DocumentType::Consultation,
        Routing { bio: Vec::new(), clinique: ALL_CLINIQUE_FIELD_NAMES.clone() },
    );
    m.insert(
        DocumentType::Rcp,
        Routing { bio: RCP_BIO_FIELDS.clone(), clinique: RCP_CLINIQUE_FIELDS.clone() },
    );
    m.insert(
        DocumentType::Radiology,
        Routing { bio: Vec::new(), clinique: RADIOLOGY_CLINIQUE_FIELDS.clone() },
    );
    m
});

/// Fields extractable from a document of the given type (union of its
/// bio and clinique routing lists, sorted and deduplicated).
pub fn get_extractable_fields(document_type: DocumentType) -> Vec<&'static str> {
    let routing = &FEATURE_ROUTING[&document_type];
    let mut fields: Vec<&'static str> =
        routing.bio.iter().chain(routing.clinique.iter()).copied().collect();
    fields.sort_unstable();
    fields.dedup();
    fields
}

/// The 8 LLM prompt groups used by the Tier 2 extractor.
pub static FEATURE_GROUPS: LazyLock<HashMap<&'static str, Vec<&'static str>>> = LazyLock::new(|| {
    let mut m = HashMap::new();
    m.insert("ihc", resolve_patterns(&ALL_BIO_FIELD_NAMES, &["ihc_*"]));
    m.insert("molecular", resolve_patterns(&ALL_BIO_FIELD_NAMES, &["mol_*"]));
    m.insert("chromosomal", {
        let mut v = resolve_patterns(&ALL_BIO_FIELD_NAMES, &["ch*"]);
        v.extend(resolve_patterns(&ALL_BIO_FIELD_NAMES, &["ampli_*"]));
        v.extend(resolve_patterns(&ALL_BIO_FIELD_NAMES, &["fusion_*"]));
        v.sort_unstable();
        v.dedup();
        v
    });
    m.insert(
        "diagnosis",
        resolve_patterns(
            &ALL_BIO_FIELD_NAMES,
            &["diag_histologique", "diag_integre", "classification_oms", "grade", "histo_necrose", "histo_pec", "histo_mitoses"],
        ),
    );
    m.insert(
        "demographics",
        resolve_patterns(
            &ALL_CLINIQUE_FIELD_NAMES,
            &[
                "nip", "date_de_naissance", "sexe", "activite_professionnelle",
                "antecedent_tumoral", "neuroncologue", "neurochirurgien",
                "radiotherapeute", "localisation_radiotherapie", "localisation_chir",
            ],
        ),
    );
    m.insert("symptoms", {
        let mut v = resolve_patterns(
            &ALL_CLINIQUE_FIELD_NAMES,
            &[
                "date_1er_symptome", "epilepsie_1er_symptome",
                "ceph_hic_1er_symptome", "deficit_1er_symptome",
                "cognitif_1er_symptome", "autre_trouble_1er_symptome",
                "exam_radio_date_decouverte",
                "contraste_1er_symptome", "oedeme_1er_symptome", "calcif_1er_symptome",
            ],
        );
        v.extend(resolve_patterns(
            &ALL_CLINIQUE_FIELD_NAMES,
            &["epilepsie", "ceph_hic", "deficit", "cognitif", "autre_trouble", "ik_clinique"],
        ));
        v.sort_unstable();
        v.dedup();
        v
    });
    m.insert(
        "treatment",
        resolve_patterns(
            &ALL_CLINIQUE_FIELD_NAMES,
            &[
                "chimios", "chm_*",
                "chir_date", "type_chirurgie",
                "rx_*",
                "anti_epileptiques", "essai_therapeutique",
                "corticoides", "optune",
            ],
        ),
    );
    m.insert(
        "evolution",
        resolve_patterns(
            &ALL_CLINIQUE_FIELD_NAMES,
            &[
                "dn_date", "evol_clinique",
                "progress_clinique", "progress_radiologique", "date_progression",
                "tumeur_lateralite", "tumeur_position",
                "date_deces", "infos_deces",
            ],
        ),
    );
    m
});

pub fn all_feature_group_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = FEATURE_GROUPS.keys().copied().collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn document_type_round_trips_through_str() {
        for dt in DocumentType::all() {
            assert_eq!(DocumentType::from_str(dt.as_str()).unwrap(), *dt);
        }
    }

    #[test]
    fn unknown_document_type_is_an_error() {
        assert!(DocumentType::from_str("pathology-report").is_err());
    }

    #[test]
    fn anapath_routes_all_bio_fields_and_no_clinique() {
        let fields = get_extractable_fields(DocumentType::Anapath);
        assert!(fields.contains(&"ihc_idh1"));
        assert!(!fields.contains(&"sexe"));
    }

    #[test]
    fn consultation_routes_all_clinique_fields_and_no_bio() {
        let fields = get_extractable_fields(DocumentType::Consultation);
        assert!(fields.contains(&"sexe"));
        assert!(!fields.contains(&"ihc_idh1"));
    }

    #[test]
    fn rcp_routes_a_mixed_subset() {
        let fields = get_extractable_fields(DocumentType::Rcp);
        assert!(fields.contains(&"grade"));
        assert!(fields.contains(&"ik_clinique"));
        assert!(!fields.contains(&"neuroncologue"));
    }

    #[test]
    fn radiology_routes_only_radiology_relevant_clinique_fields() {
        let fields = get_extractable_fields(DocumentType::Radiology);
        assert!(fields.contains(&"contraste_1er_symptome"));
        assert!(!fields.contains(&"ik_clinique"));
    }

    #[test]
    fn chromosomal_group_includes_arms_amplifications_and_fusions() {
        let group = &FEATURE_GROUPS["chromosomal"];
        assert!(group.contains(&"ch1p"));
        assert!(group.contains(&"ampli_egfr"));
        assert!(group.contains(&"fusion_ntrk"));
    }

    #[test]
    fn eight_feature_groups_are_defined() {
        assert_eq!(FEATURE_GROUPS.len(), 8);
    }
}
