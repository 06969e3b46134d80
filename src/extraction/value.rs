//! The atomic extracted datum and its tagged value type.
//!
//! Grounded on `schema.py`'s `ExtractionValue` pydantic model and
//! spec.md §9's "tagged variants" design note (`Null | Integer | Float |
//! String`, dispatched on tag + field type rather than open
//! polymorphism).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Float(f64),
    String(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionTier {
    Rule,
    Llm,
    Manual,
}

/// The atomic extracted datum for one field in one document.
///
/// Invariant: if `value` is non-null and `flagged` is false, `value`
/// lies in the field's allowed-value set (when one exists) or passes
/// the field's type check. Enforcing this is the vocabulary
/// validator's job, not this struct's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionValue {
    pub value: FieldValue,
    pub source_span: String,
    pub source_span_start: usize,
    pub source_span_end: usize,
    pub extraction_tier: ExtractionTier,
    pub confidence: f32,
    #[serde(default)]
    pub section: Option<String>,
    pub vocab_valid: bool,
    #[serde(default)]
    pub flagged: bool,
}

impl ExtractionValue {
    pub fn rule(
        value: impl Into<FieldValue>,
        source_span: impl Into<String>,
        start: usize,
        end: usize,
        confidence: f32,
    ) -> Self {
        ExtractionValue {
            value: value.into(),
            source_span: source_span.into(),
            source_span_start: start,
            source_span_end: end,
            extraction_tier: ExtractionTier::Rule,
            confidence,
            section: None,
            vocab_valid: true,
            flagged: false,
        }
    }

    /// LLM extractions get a lower fixed confidence than rule-based ones
    /// and carry `vocab_valid = true` pending the later vocabulary pass.
    pub fn llm(value: impl Into<FieldValue>, source_span: Option<String>) -> Self {
        let source_span = source_span.unwrap_or_default();
        ExtractionValue {
            value: value.into(),
            source_span,
            source_span_start: 0,
            source_span_end: 0,
            extraction_tier: ExtractionTier::Llm,
            confidence: 0.7,
            section: None,
            vocab_valid: true,
            flagged: false,
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_value_from_conversions() {
        assert_eq!(FieldValue::from("positif"), FieldValue::String("positif".to_string()));
        assert_eq!(FieldValue::from(4i64), FieldValue::Integer(4));
    }

    #[test]
    fn rule_constructor_sets_tier_and_vocab_valid() {
        let ev = ExtractionValue::rule("oui", "épilepsie", 10, 19, 0.8);
        assert_eq!(ev.extraction_tier, ExtractionTier::Rule);
        assert!(ev.vocab_valid);
        assert!(!ev.flagged);
    }

    #[test]
    fn with_section_sets_the_section_name() {
        let ev = ExtractionValue::rule("positif", "IDH1", 0, 5, 0.9).with_section("ihc");
        assert_eq!(ev.section.as_deref(), Some("ihc"));
    }
}
