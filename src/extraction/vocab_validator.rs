//! Vocabulary validator: normalizes and checks each extracted value
//! against its field's controlled vocabulary.
//!
//! Grounded directly on spec.md §4.7 — the original `validation.py` is
//! an unimplemented stub in the source it was distilled from.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::extraction::value::{ExtractionValue, FieldValue};
use crate::schema::fields::{get_field, AllowedValues, FieldType};
use crate::schema::vocab::{is_valid_evolution, is_valid_molecular};

static SYNONYMS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("homme", "M"), ("masculin", "M"), ("mr", "M"), ("m.", "M"), ("m", "M"),
        ("femme", "F"), ("féminin", "F"), ("feminin", "F"), ("mme", "F"), ("mlle", "F"),
        ("exérèse complète", "exerese complete"), ("exerese complete", "exerese complete"),
        ("exérèse totale", "exerese complete"), ("exerese totale", "exerese complete"),
        ("résection complète", "exerese complete"), ("resection complete", "exerese complete"),
        ("exérèse subtotale", "exerese partielle"), ("exerese subtotale", "exerese partielle"),
        ("résection partielle", "exerese partielle"), ("resection partielle", "exerese partielle"),
        ("biopsie stéréotaxique", "biopsie"), ("biopsie stereotaxique", "biopsie"),
        ("oms 2007", "2007"), ("who 2007", "2007"),
        ("oms 2016", "2016"), ("who 2016", "2016"),
        ("oms 2021", "2021"), ("who 2021", "2021"),
    ])
});

fn normalise_synonym(value: &str) -> String {
    let lowered = value.trim().to_lowercase();
    SYNONYMS.get(lowered.as_str()).map(|s| s.to_string()).unwrap_or(lowered)
}

/// Validates and, on success, normalizes a single value in place.
/// Unknown field names are left untouched (a programming error
/// surfaced elsewhere via `get_field`/`SchemaError::UnknownField`).
pub fn validate_field(field_name: &str, ev: &mut ExtractionValue) {
    if ev.value.is_null() {
        return;
    }

    let Ok(field) = get_field(field_name) else { return };

    if field.field_type == FieldType::FreeText {
        ev.vocab_valid = true;
        return;
    }

    let as_string = match &ev.value {
        FieldValue::String(s) => Some(s.clone()),
        FieldValue::Integer(i) => Some(i.to_string()),
        FieldValue::Float(f) => Some(f.to_string()),
        FieldValue::Null => None,
    };

    if field.field_type == FieldType::Integer {
        if let Some(s) = &as_string {
            if let Ok(parsed) = s.trim().parse::<i64>() {
                ev.value = FieldValue::Integer(parsed);
                ev.vocab_valid = true;
                return;
            }
        }
        if matches!(ev.value, FieldValue::Integer(_)) {
            ev.vocab_valid = true;
            return;
        }
        ev.vocab_valid = false;
        ev.flagged = true;
        return;
    }

    let Some(raw) = as_string else {
        ev.vocab_valid = true;
        return;
    };

    let normalised = normalise_synonym(&raw);

    let valid = if field_name == "evol_clinique" {
        is_valid_evolution(&normalised)
    } else if field_name.starts_with("mol_") {
        is_valid_molecular(&normalised)
    } else if let Some(allowed) = &field.allowed_values {
        match allowed {
            AllowedValues::Strings(_) => allowed.contains_str(&normalised),
            AllowedValues::Integers(_) => false,
        }
    } else {
        true
    };

    if valid {
        ev.value = FieldValue::String(normalised);
        ev.vocab_valid = true;
    } else {
        ev.vocab_valid = false;
        ev.flagged = true;
    }
}

/// Runs [`validate_field`] over every entry of an extraction map.
pub fn validate_all(extractions: &mut HashMap<String, ExtractionValue>) {
    for (field_name, ev) in extractions.iter_mut() {
        validate_field(field_name, ev);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(value: impl Into<FieldValue>) -> ExtractionValue {
        ExtractionValue::rule(value, "span", 0, 4, 0.8)
    }

    #[test]
    fn sex_synonym_normalises_to_canonical_code() {
        let mut v = ev("homme");
        validate_field("sexe", &mut v);
        assert_eq!(v.value.as_str(), Some("M"));
        assert!(v.vocab_valid);
        assert!(!v.flagged);
    }

    #[test]
    fn categorical_value_outside_allowed_set_is_flagged() {
        let mut v = ev("indetermine");
        validate_field("sexe", &mut v);
        assert!(!v.vocab_valid);
        assert!(v.flagged);
    }

    #[test]
    fn integer_field_coerces_string_value() {
        let mut v = ev("25");
        validate_field("ihc_ki67", &mut v);
        assert_eq!(v.value, FieldValue::Integer(25));
        assert!(v.vocab_valid);
    }

    #[test]
    fn evolution_field_accepts_progression_token() {
        let mut v = ev("P2");
        validate_field("evol_clinique", &mut v);
        assert!(v.vocab_valid);
    }

    #[test]
    fn molecular_field_accepts_bounded_free_form_variant() {
        let mut v = ev("p.R132H");
        validate_field("mol_idh1", &mut v);
        assert!(v.vocab_valid);
    }

    #[test]
    fn null_value_is_left_untouched() {
        let mut v = ev("placeholder");
        v.value = FieldValue::Null;
        validate_field("sexe", &mut v);
        assert!(!v.flagged);
    }

    #[test]
    fn unknown_field_name_is_left_untouched() {
        let mut v = ev("x");
        validate_field("not_a_real_field", &mut v);
        assert_eq!(v.value.as_str(), Some("x"));
    }
}
