//! Controlled vocabularies and their validators.
//!
//! Grounded on `schema.py`'s `ControlledVocab` class. Most sets are
//! exposed through `FieldDefinition::allowed_values` (see `fields.rs`);
//! the two fields whose vocabulary can't be expressed as a fixed set
//! (evolution labels, molecular variant tokens) get dedicated predicate
//! functions here, matching `is_valid_evolution` / `is_valid_molecular`.

use std::sync::LazyLock;

use regex::Regex;

/// `initial`, `terminal`, or `P<k>` for any non-negative integer k.
static EVOLUTION_PROGRESSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^P\d+$").unwrap());

pub fn is_valid_evolution(value: &str) -> bool {
    matches!(value, "initial" | "terminal") || EVOLUTION_PROGRESSION.is_match(value)
}

/// Molecular status token: `wt`, `mute`, or a bounded free-form variant
/// description. spec.md §3 bounds this directly as
/// `[A-Za-z0-9_+/ .-]{1,50}`; see DESIGN.md Open Question 2.
static MOLECULAR_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_+/ .-]{1,50}$").unwrap());

pub fn is_valid_molecular(value: &str) -> bool {
    matches!(value, "wt" | "mute") || MOLECULAR_TOKEN.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evolution_accepts_initial_and_terminal() {
        assert!(is_valid_evolution("initial"));
        assert!(is_valid_evolution("terminal"));
    }

    #[test]
    fn evolution_accepts_progression_tokens() {
        assert!(is_valid_evolution("P1"));
        assert!(is_valid_evolution("P23"));
    }

    #[test]
    fn evolution_rejects_other_tokens() {
        assert!(!is_valid_evolution("progression"));
        assert!(!is_valid_evolution("p1"));
    }

    #[test]
    fn molecular_accepts_wt_and_mute() {
        assert!(is_valid_molecular("wt"));
        assert!(is_valid_molecular("mute"));
    }

    #[test]
    fn molecular_accepts_bounded_free_form() {
        assert!(is_valid_molecular("R132H"));
        assert!(is_valid_molecular("c.395G>A"));
    }

    #[test]
    fn molecular_rejects_tokens_over_50_chars() {
        let too_long = "a".repeat(51);
        assert!(!is_valid_molecular(&too_long));
    }

    #[test]
    fn molecular_rejects_disallowed_characters() {
        assert!(!is_valid_molecular("wt;DROP TABLE"));
    }
}
