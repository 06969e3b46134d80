//! Section detection and segmentation.
//!
//! Grounded on `section_detector.py`: strict header patterns requiring
//! a header to occupy its own line, a lenient fallback requiring only a
//! line-start match, and a fixed section → expected-fields map. Rust's
//! `regex` crate has no lookaround, so the one `(?<!\w)IHC(?!\w)` cue
//! becomes the equivalent `\bIHC\b`.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::schema::fields::{ALL_BIO_FIELD_NAMES, ALL_CLINIQUE_FIELD_NAMES};

const MIN_SECTION_LENGTH: usize = 10;

fn compiled(pairs: &[(&'static str, &'static str)]) -> Vec<(&'static str, Regex)> {
    pairs.iter().map(|(name, pat)| (*name, Regex::new(pat).unwrap())).collect()
}

static STRICT_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    compiled(&[
        ("ihc", r"(?im)^[ \t]*(?:immunohistochimie|\bIHC\b|marqueurs?\s+immuno(?:histochim(?:iques?|ie))?)[ \t]*[:.\-—–]*[ \t]*$"),
        ("molecular", r"(?im)^[ \t]*(?:biologie\s+mol[eé]culaire|analyse\s+mol[eé]culaire|panel\s+NGS|s[eé]quen[cç]age|r[eé]sultats?\s+mol[eé]culaire)[ \t]*[:.\-—–]*[ \t]*$"),
        ("chromosomal", r"(?im)^[ \t]*(?:CGH[\s\-]?array|alt[eé]rations?\s+chromosomiques?|profil\s+g[eé]nomique|analyse\s+chromosomique)[ \t]*[:.\-—–]*[ \t]*$"),
        ("macroscopy", r"(?im)^[ \t]*(?:examen\s+macroscopique|macroscopie|description\s+macroscopique)[ \t]*[:.\-—–]*[ \t]*$"),
        ("microscopy", r"(?im)^[ \t]*(?:examen\s+microscopique|microscopie|description\s+microscopique|histologie)[ \t]*[:.\-—–]*[ \t]*$"),
        ("conclusion", r"(?im)^[ \t]*(?:conclusion|diagnostic|synth[eè]se\s+diagnostique|diagnostic\s+int[eé]gr[eé])[ \t]*[:.\-—–]*[ \t]*$"),
        ("history", r"(?im)^[ \t]*(?:ant[eé]c[eé]dents?|histoire\s+de\s+la\s+maladie|anamn[eè]se|(?:r[eé]sum[eé]\s+de\s+l')?historique)[ \t]*[:.\-—–]*[ \t]*$"),
        ("treatment", r"(?im)^[ \t]*(?:traitements?|proposition\s+th[eé]rapeutique|th[eé]rapeutique|protocole\s+th[eé]rapeutique|d[eé]cision\s+th[eé]rapeutique)[ \t]*[:.\-—–]*[ \t]*$"),
        ("clinical_exam", r"(?im)^[ \t]*(?:examen\s+clinique|examen\s+neurologique|interrogatoire|examen\s+physique)[ \t]*[:.\-—–]*[ \t]*$"),
        ("radiology", r"(?im)^[ \t]*(?:imagerie|IRM(?:\s+c[eé]r[eé]brale)?|scanner(?:\s+c[eé]r[eé]bral)?|radiologie|bilan\s+radiologique|compte[\s\-]rendu\s+radiologique)[ \t]*[:.\-—–]*[ \t]*$"),
    ])
});

static LENIENT_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    compiled(&[
        ("ihc", r"(?im)^[ \t]*(?:immunohistochimie|\bIHC\b|marqueurs?\s+immuno)"),
        ("molecular", r"(?im)^[ \t]*(?:biologie\s+mol[eé]culaire|analyse\s+mol[eé]culaire|panel\s+NGS|s[eé]quen[cç]age)"),
        ("chromosomal", r"(?im)^[ \t]*(?:CGH[\s\-]?array|alt[eé]rations?\s+chromosomiques?|profil\s+g[eé]nomique)"),
        ("macroscopy", r"(?im)^[ \t]*(?:examen\s+macroscopique|macroscopie|description\s+macroscopique)"),
        ("microscopy", r"(?im)^[ \t]*(?:examen\s+microscopique|microscopie|description\s+microscopique|histologie)"),
        ("conclusion", r"(?im)^[ \t]*(?:conclusion|diagnostic|synth[eè]se\s+diagnostique)"),
        ("history", r"(?im)^[ \t]*(?:ant[eé]c[eé]dents?|histoire\s+de\s+la\s+maladie|anamn[eè]se)"),
        ("treatment", r"(?im)^[ \t]*(?:traitements?|proposition\s+th[eé]rapeutique|th[eé]rapeutique|protocole\s+th[eé]rapeutique)"),
        ("clinical_exam", r"(?im)^[ \t]*(?:examen\s+clinique|examen\s+neurologique|interrogatoire)"),
        ("radiology", r"(?im)^[ \t]*(?:imagerie|IRM(?:\s+c[eé]r[eé]brale)?|scanner(?:\s+c[eé]r[eé]bral)?|radiologie|bilan\s+radiologique)"),
    ])
});

static SECTION_TO_FEATURES: LazyLock<HashMap<&'static str, Vec<&'static str>>> = LazyLock::new(|| {
    HashMap::from([
        ("ihc", vec!["ihc_idh1", "ihc_p53", "ihc_atrx", "ihc_fgfr3", "ihc_braf", "ihc_hist_h3k27m", "ihc_hist_h3k27me3", "ihc_egfr_hirsch", "ihc_gfap", "ihc_olig2", "ihc_ki67", "ihc_mmr"]),
        ("molecular", vec!["mol_idh1", "mol_idh2", "mol_tert", "mol_CDKN2A", "mol_h3f3a", "mol_hist1h3b", "mol_braf", "mol_mgmt", "mol_fgfr1", "mol_egfr_mut", "mol_prkca", "mol_p53", "mol_pten", "mol_cic", "mol_fubp1", "mol_atrx"]),
        ("chromosomal", vec!["ch1p", "ch19q", "ch10p", "ch10q", "ch7p", "ch7q", "ch9p", "ch9q", "ampli_mdm2", "ampli_cdk4", "ampli_egfr", "ampli_met", "ampli_mdm4", "fusion_fgfr", "fusion_ntrk", "fusion_autre"]),
        ("macroscopy", vec!["num_labo", "date_chir"]),
        ("microscopy", vec!["diag_histologique", "grade", "histo_necrose", "histo_pec", "histo_mitoses", "ihc_ki67"]),
        ("conclusion", vec!["diag_histologique", "diag_integre", "classification_oms", "grade", "ihc_idh1", "mol_idh1", "mol_mgmt", "ch1p", "ch19q"]),
        ("history", vec!["date_1er_symptome", "epilepsie_1er_symptome", "ceph_hic_1er_symptome", "deficit_1er_symptome", "cognitif_1er_symptome", "autre_trouble_1er_symptome", "antecedent_tumoral", "activite_professionnelle", "date_de_naissance", "sexe", "nip"]),
        ("treatment", vec!["chimios", "chm_date_debut", "chm_date_fin", "chm_cycles", "chir_date", "type_chirurgie", "rx_date_debut", "rx_date_fin", "rx_dose", "anti_epileptiques", "essai_therapeutique", "corticoides", "optune"]),
        ("clinical_exam", vec!["ik_clinique", "epilepsie", "ceph_hic", "deficit", "cognitif", "autre_trouble", "progress_clinique"]),
        ("radiology", vec!["exam_radio_date_decouverte", "contraste_1er_symptome", "oedeme_1er_symptome", "calcif_1er_symptome", "tumeur_lateralite", "tumeur_position", "progress_radiologique"]),
    ])
});

const PREAMBLE_FEATURES: &[&str] = &[
    "nip", "date_chir", "num_labo",
    "date_de_naissance", "sexe",
    "neuroncologue", "neurochirurgien", "radiotherapeute",
    "localisation_radiotherapie", "localisation_chir",
    "date_deces", "infos_deces",
    "dn_date", "evol_clinique",
    "date_progression",
    "progress_clinique", "progress_radiologique",
];

#[derive(Debug, Clone)]
struct SectionMatch {
    section_name: &'static str,
    start: usize,
    end: usize,
    body_start: usize,
}

fn find_header_matches(text: &str, patterns: &[(&'static str, Regex)]) -> Vec<SectionMatch> {
    let mut matches = Vec::new();
    let mut seen = HashSet::new();

    for (name, pattern) in patterns {
        if let Some(m) = pattern.find(text) {
            if seen.contains(name) {
                continue;
            }
            seen.insert(*name);
            let mut body_start = m.end();
            let bytes = text.as_bytes();
            while body_start < bytes.len() && (bytes[body_start] == b'\r' || bytes[body_start] == b'\n') {
                body_start += 1;
            }
            matches.push(SectionMatch { section_name: name, start: m.start(), end: m.end(), body_start });
        }
    }

    matches.sort_by_key(|sm| sm.start);
    matches
}

/// Regex-based clinical document section detector. Stateless; the
/// `strict` flag chooses between the full-line and lenient pattern sets.
pub struct SectionDetector {
    pub strict: bool,
    pub min_section_length: usize,
}

impl SectionDetector {
    pub fn new() -> Self {
        SectionDetector { strict: true, min_section_length: MIN_SECTION_LENGTH }
    }

    pub fn lenient() -> Self {
        SectionDetector { strict: false, min_section_length: MIN_SECTION_LENGTH }
    }

    fn patterns(&self) -> &'static [(&'static str, Regex)] {
        if self.strict {
            &STRICT_PATTERNS
        } else {
            &LENIENT_PATTERNS
        }
    }

    /// Returns detected sections in document order — `"preamble"` first
    /// when present, then each header section in the order its header
    /// appears in `text`. Order matters downstream: Tier 1 resolves a
    /// field appearing in two sections in favor of whichever section
    /// comes first here.
    pub fn detect(&self, text: &str) -> Vec<(String, String)> {
        if text.trim().is_empty() {
            return vec![("full_text".to_string(), text.to_string())];
        }

        let mut matches = find_header_matches(text, self.patterns());

        if matches.is_empty() && self.strict {
            matches = find_header_matches(text, &LENIENT_PATTERNS);
            if matches.is_empty() {
                return vec![("full_text".to_string(), text.to_string())];
            }
        }

        if matches.is_empty() {
            return vec![("full_text".to_string(), text.to_string())];
        }

        let mut sections = Vec::new();

        if matches[0].start > 0 {
            let preamble = text[..matches[0].start].trim();
            if !preamble.is_empty() {
                sections.push(("preamble".to_string(), preamble.to_string()));
            }
        }

        for (i, sm) in matches.iter().enumerate() {
            let body = if i + 1 < matches.len() {
                &text[sm.body_start..matches[i + 1].start]
            } else {
                &text[sm.body_start..]
            };
            let body = body.trim();
            if body.len() < self.min_section_length {
                continue;
            }
            sections.push((sm.section_name.to_string(), body.to_string()));
        }

        let non_preamble_count = sections.iter().filter(|(n, _)| n != "preamble").count();
        if non_preamble_count == 0 {
            return vec![("full_text".to_string(), text.to_string())];
        }

        sections
    }
}

impl Default for SectionDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Union of feature fields associated with the given section names.
/// `full_text` is special-cased to mean "every field".
pub fn get_features_for_sections(section_names: &[String], include_preamble: bool) -> Vec<String> {
    if section_names.iter().any(|n| n == "full_text") {
        let mut all: Vec<String> = ALL_BIO_FIELD_NAMES
            .iter()
            .chain(ALL_CLINIQUE_FIELD_NAMES.iter())
            .map(|s| s.to_string())
            .collect();
        all.sort_unstable();
        all.dedup();
        return all;
    }

    let mut result: HashSet<String> = HashSet::new();
    for name in section_names {
        if let Some(features) = SECTION_TO_FEATURES.get(name.as_str()) {
            result.extend(features.iter().map(|s| s.to_string()));
        }
    }

    if include_preamble {
        result.extend(PREAMBLE_FEATURES.iter().map(|s| s.to_string()));
    }

    let mut out: Vec<String> = result.into_iter().collect();
    out.sort_unstable();
    out
}

pub fn get_section_for_feature(feature_name: &str) -> Vec<&'static str> {
    SECTION_TO_FEATURES
        .iter()
        .filter(|(_, features)| features.contains(&feature_name))
        .map(|(name, _)| *name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_section(sections: &[(String, String)], name: &str) -> bool {
        sections.iter().any(|(n, _)| n == name)
    }

    fn section_text<'a>(sections: &'a [(String, String)], name: &str) -> Option<&'a str> {
        sections.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    #[test]
    fn detects_ihc_and_conclusion_sections() {
        let text = "IHC\nIDH1 : positif\nATRX : maintenu\n\nConclusion:\nGlioblastome IDH wildtype, grade 4.";
        let sections = SectionDetector::new().detect(text);
        assert!(has_section(&sections, "ihc"));
        assert!(has_section(&sections, "conclusion"));
    }

    #[test]
    fn inline_ihc_mention_does_not_trigger_strict_header() {
        let text = "Le marquage IHC : positif pour GFAP dans ce contexte tumoral bien caractérisé.";
        let sections = SectionDetector::new().detect(text);
        assert_eq!(sections.first().map(|(n, _)| n.as_str()), Some("full_text"));
    }

    #[test]
    fn no_headers_falls_back_to_full_text() {
        let text = "Texte libre sans aucun en-tête structuré dans ce document clinique.";
        let sections = SectionDetector::new().detect(text);
        assert_eq!(section_text(&sections, "full_text"), Some(text));
    }

    #[test]
    fn preamble_is_captured_before_first_header() {
        let text = "NIP: 12345\nPatient suivi pour glioblastome depuis janvier.\n\nConclusion:\nStabilité radiologique confirmée sur cette imagerie.";
        let sections = SectionDetector::new().detect(text);
        assert!(has_section(&sections, "preamble"));
        assert!(has_section(&sections, "conclusion"));
        assert_eq!(sections.first().map(|(n, _)| n.as_str()), Some("preamble"));
    }

    #[test]
    fn short_sections_are_discarded() {
        let text = "Conclusion:\nOk\n\nHistorique:\nAntécédent de méningiome opéré en 2018, suivi régulier depuis lors.";
        let sections = SectionDetector::new().detect(text);
        assert!(!has_section(&sections, "conclusion"));
        assert!(has_section(&sections, "history"));
    }

    #[test]
    fn full_text_feature_lookup_returns_everything() {
        let features = get_features_for_sections(&["full_text".to_string()], true);
        assert!(features.len() > 50);
    }

    #[test]
    fn section_feature_lookup_always_includes_preamble_when_requested() {
        let features = get_features_for_sections(&["ihc".to_string()], true);
        assert!(features.contains(&"nip".to_string()));
        assert!(features.contains(&"ihc_idh1".to_string()));
    }

    #[test]
    fn section_feature_lookup_excludes_preamble_when_not_requested() {
        let features = get_features_for_sections(&["ihc".to_string()], false);
        assert!(!features.contains(&"nip".to_string()));
    }

    #[test]
    fn get_section_for_feature_finds_multiple_sections() {
        let sections = get_section_for_feature("grade");
        assert!(sections.contains(&"microscopy"));
        assert!(sections.contains(&"conclusion"));
    }
}
