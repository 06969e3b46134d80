//! `ExtractionResult`: the per-document bundle of extracted features,
//! section detection, and pipeline audit trail.
//!
//! Grounded on `provenance.py`'s `ExtractionResult` dataclass and its
//! convenience methods.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::extraction::value::{ExtractionValue, FieldValue};
use crate::schema::routing::DocumentType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub document_id: String,
    pub document_type: DocumentType,
    #[serde(default)]
    pub document_date: Option<String>,
    #[serde(default)]
    pub patient_id: String,
    #[serde(default)]
    pub features: HashMap<String, ExtractionValue>,
    #[serde(default)]
    pub sections_detected: Vec<String>,
    #[serde(default)]
    pub extraction_log: Vec<String>,
    #[serde(default)]
    pub flagged_for_review: Vec<String>,
    #[serde(default)]
    pub classification_confidence: f32,
    #[serde(default)]
    pub classification_is_ambiguous: bool,
    #[serde(default)]
    pub tier1_count: u32,
    #[serde(default)]
    pub tier2_count: u32,
    #[serde(default)]
    pub total_extraction_time_ms: f64,
}

/// A compact, loggable summary of an [`ExtractionResult`].
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionSummary {
    pub document_id: String,
    pub document_type: DocumentType,
    pub document_date: Option<String>,
    pub patient_id: String,
    pub total_features: usize,
    pub tier1_count: u32,
    pub tier2_count: u32,
    pub flagged_count: usize,
    pub sections: Vec<String>,
    pub extraction_time_ms: f64,
}

impl ExtractionResult {
    pub fn new(document_id: impl Into<String>, document_type: DocumentType) -> Self {
        ExtractionResult {
            document_id: document_id.into(),
            document_type,
            document_date: None,
            patient_id: String::new(),
            features: HashMap::new(),
            sections_detected: Vec::new(),
            extraction_log: Vec::new(),
            flagged_for_review: Vec::new(),
            classification_confidence: 0.0,
            classification_is_ambiguous: false,
            tier1_count: 0,
            tier2_count: 0,
            total_extraction_time_ms: 0.0,
        }
    }

    pub fn add_log(&mut self, message: impl Into<String>) {
        self.extraction_log.push(message.into());
    }

    pub fn flag_field(&mut self, field_name: &str) {
        if !self.flagged_for_review.iter().any(|f| f == field_name) {
            self.flagged_for_review.push(field_name.to_string());
        }
    }

    /// Scans `features` and adds any field with `flagged = true` to
    /// `flagged_for_review`, without duplicating existing entries.
    pub fn update_flagged_from_features(&mut self) {
        let to_flag: Vec<String> = self
            .features
            .iter()
            .filter(|(_, ev)| ev.flagged)
            .map(|(name, _)| name.clone())
            .collect();
        for name in to_flag {
            self.flag_field(&name);
        }
    }

    pub fn summary(&self) -> ExtractionSummary {
        ExtractionSummary {
            document_id: self.document_id.clone(),
            document_type: self.document_type,
            document_date: self.document_date.clone(),
            patient_id: self.patient_id.clone(),
            total_features: self.features.len(),
            tier1_count: self.tier1_count,
            tier2_count: self.tier2_count,
            flagged_count: self.flagged_for_review.len(),
            sections: self.sections_detected.clone(),
            extraction_time_ms: (self.total_extraction_time_ms * 10.0).round() / 10.0,
        }
    }

    /// A flat `field_name → value` projection with provenance stripped.
    pub fn get_values_dict(&self) -> HashMap<String, FieldValue> {
        self.features.iter().map(|(name, ev)| (name.clone(), ev.value.clone())).collect()
    }
}
