//! Tier 2 LLM-based feature extraction: fills gaps Tier 1 left in
//! `feature_subset`, one schema-constrained Ollama call per feature
//! group still needed.
//!
//! Grounded on `llm_extraction.py`'s `run_llm_extraction`,
//! `_determine_groups_for_features`, `_select_section_text`,
//! `_parse_llm_response`, and `_normalise_llm_value`.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::extraction::llm::{ChatMessage, LlmClient, OllamaResponse};
use crate::extraction::ollama::call_with_retry;
use crate::extraction::prompts::{build_user_prompt, get_prompt};
use crate::extraction::value::{ExtractionValue, FieldValue};
use crate::schema::fields::{get_field, FieldType};
use crate::schema::json_schema::get_json_schema;
use crate::schema::routing::FEATURE_GROUPS;

const MAX_SECTION_CHARS: usize = 4000;

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Options governing a single `run_llm_extraction` call.
pub struct Tier2Options<'a> {
    pub model: &'a str,
    pub max_retries: u32,
    pub retry_delay: std::time::Duration,
}

/// Groups `remaining` field names by the feature group(s) that cover
/// them, dropping groups with no remaining fields. A field absent from
/// every `FEATURE_GROUPS` entry is simply never assigned to a group
/// and is silently skipped by Tier 2 (it was either already extracted
/// by Tier 1 or is not LLM-coverable).
fn determine_groups_for_features(remaining: &HashSet<String>) -> HashMap<&'static str, Vec<&'static str>> {
    let mut result = HashMap::new();
    for (&group_name, group_fields) in FEATURE_GROUPS.iter() {
        let needed: Vec<&'static str> = group_fields.iter().copied().filter(|f| remaining.contains(*f)).collect();
        if !needed.is_empty() {
            result.insert(group_name, needed);
        }
    }
    result
}

/// Picks the best section text for a feature group: the first detected
/// section whose canonical name maps to this group (per
/// `section_for_group`), else the `full_text` section if present, else
/// the raw document text.
fn select_section_text<'a>(
    sections: &'a HashMap<String, String>,
    group_name: &str,
    full_text: &'a str,
) -> (&'a str, Option<&'a str>) {
    for section_name in section_names_for_group(group_name) {
        if let Some(text) = sections.get(section_name) {
            if !text.trim().is_empty() {
                return (text.as_str(), Some(section_name));
            }
        }
    }
    if let Some(text) = sections.get("full_text") {
        return (text.as_str(), Some("full_text"));
    }
    (full_text, None)
}

/// The inverse of `llm_extraction.py`'s `_SECTION_TO_GROUPS`, in the
/// same section-key precedence order the Python dict iterates in
/// (ihc, molecular, chromosomal, macroscopy, microscopy, conclusion,
/// history, treatment, clinical_exam, radiology).
fn section_names_for_group(group_name: &str) -> &'static [&'static str] {
    match group_name {
        "ihc" => &["ihc", "conclusion"],
        "molecular" => &["molecular", "conclusion"],
        "chromosomal" => &["chromosomal", "conclusion"],
        "diagnosis" => &["macroscopy", "microscopy", "conclusion"],
        "demographics" => &["history"],
        "symptoms" => &["history", "clinical_exam"],
        "treatment" => &["treatment"],
        "evolution" => &["radiology"],
        _ => &[],
    }
}

fn normalise_llm_value(field_name: &str, raw: &Value) -> Option<FieldValue> {
    match raw {
        Value::Null => None,
        Value::Bool(b) => Some(FieldValue::String(if *b { "oui".to_string() } else { "non".to_string() })),
        Value::Number(n) => {
            let field_type = get_field(field_name).ok().map(|f| f.field_type);
            match field_type {
                Some(FieldType::Integer) => n.as_i64().map(FieldValue::Integer),
                Some(FieldType::Float) => n.as_f64().map(FieldValue::Float),
                _ => {
                    if let Some(i) = n.as_i64() {
                        Some(FieldValue::Integer(i))
                    } else {
                        n.as_f64().map(FieldValue::Float)
                    }
                }
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || matches!(trimmed.to_lowercase().as_str(), "null" | "none" | "n/a" | "na") {
                return None;
            }
            let lowered = trimmed.to_lowercase();
            let normalised = match lowered.as_str() {
                "négatif" | "négative" | "negative" => "negatif".to_string(),
                "muté" | "mutée" => "mute".to_string(),
                "méthylé" => "methyle".to_string(),
                "non méthylé" | "non methylé" => "non methyle".to_string(),
                _ => trimmed.to_string(),
            };
            Some(FieldValue::String(normalised))
        }
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn parse_llm_response(
    response: &OllamaResponse,
    target_fields: &[&str],
) -> HashMap<String, ExtractionValue> {
    let mut results = HashMap::new();

    let parsed: Value = match serde_json::from_str(&response.content) {
        Ok(v) => v,
        Err(_) => {
            tracing::warn!(response = %response.content.chars().take(200).collect::<String>(), "LLM response was not valid JSON");
            return results;
        }
    };

    let values = parsed.get("values").unwrap_or(&parsed);
    let empty_sources = serde_json::Map::new();
    let sources = parsed.get("_source").and_then(Value::as_object).unwrap_or(&empty_sources);

    for &field_name in target_fields {
        let Some(raw_value) = values.get(field_name) else { continue };
        let Some(normalised) = normalise_llm_value(field_name, raw_value) else { continue };

        let source_span = sources.get(field_name).and_then(Value::as_str).map(|s| s.to_string());
        results.insert(field_name.to_string(), ExtractionValue::llm(normalised, source_span));
    }

    results
}

/// Runs Tier 2 over every `feature_subset` field not already present in
/// `already_extracted`, one Ollama call per applicable feature group.
/// Returns only newly LLM-extracted fields; never overwrites
/// `already_extracted`.
pub fn run_llm_extraction(
    client: &dyn LlmClient,
    options: &Tier2Options,
    full_text: &str,
    sections: &HashMap<String, String>,
    feature_subset: &[String],
    already_extracted: &HashMap<String, ExtractionValue>,
) -> HashMap<String, ExtractionValue> {
    let remaining: HashSet<String> =
        feature_subset.iter().filter(|f| !already_extracted.contains_key(f.as_str())).cloned().collect();

    if remaining.is_empty() {
        tracing::info!("all features already extracted by tier 1, skipping LLM");
        return HashMap::new();
    }

    let groups_needed = determine_groups_for_features(&remaining);
    if groups_needed.is_empty() {
        tracing::info!("no feature groups applicable to remaining fields");
        return HashMap::new();
    }

    let mut group_names: Vec<&str> = groups_needed.keys().copied().collect();
    group_names.sort_unstable();
    tracing::info!(remaining = remaining.len(), groups = ?group_names, "running tier 2 LLM extraction");

    let mut all_results: HashMap<String, ExtractionValue> = HashMap::new();

    for group_name in group_names {
        let fields_in_group = &groups_needed[group_name];

        let Some(prompt_config) = get_prompt(group_name) else {
            tracing::warn!(group = group_name, "no prompt template for group, skipping");
            continue;
        };

        let (mut section_text, used_section) = select_section_text(sections, group_name, full_text);
        let truncated_owned;
        if section_text.len() > MAX_SECTION_CHARS {
            let boundary = floor_char_boundary(section_text, MAX_SECTION_CHARS);
            truncated_owned = format!("{}\n[... texte tronqué ...]", &section_text[..boundary]);
            section_text = truncated_owned.as_str();
        }

        let user_prompt = prompt_config.user_template.replace("{section_text}", section_text);

        let json_schema = get_json_schema(group_name).ok();

        let messages = [ChatMessage::system(prompt_config.system), ChatMessage::user(user_prompt)];

        let response = match call_with_retry(
            client,
            options.model,
            &messages,
            json_schema.as_ref(),
            options.max_retries,
            options.retry_delay,
        ) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(group = group_name, error = %e, "ollama call failed");
                continue;
            }
        };

        let group_results = parse_llm_response(&response, fields_in_group);

        let mut assigned = 0usize;
        for (field_name, mut ev) in group_results {
            if all_results.contains_key(&field_name) || already_extracted.contains_key(&field_name) {
                continue;
            }
            if let Some(section_name) = used_section {
                ev.section = Some(section_name.to_string());
            }
            all_results.insert(field_name, ev);
            assigned += 1;
        }

        tracing::info!(group = group_name, assigned, total = fields_in_group.len(), "tier 2 group complete");
    }

    all_results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ollama::MockLlmClient;

    fn opts() -> Tier2Options<'static> {
        Tier2Options { model: "qwen3:4b-instruct", max_retries: 0, retry_delay: std::time::Duration::from_millis(1) }
    }

    #[test]
    fn skips_llm_entirely_when_nothing_remains() {
        let client = MockLlmClient::new("{}");
        let already = HashMap::from([("ihc_idh1".to_string(), ExtractionValue::rule("positif", "x", 0, 1, 0.9))]);
        let result = run_llm_extraction(&client, &opts(), "texte", &HashMap::new(), &["ihc_idh1".to_string()], &already);
        assert!(result.is_empty());
    }

    #[test]
    fn extracts_field_from_values_wrapped_response() {
        let client = MockLlmClient::new(r#"{"values": {"ihc_idh1": "positif"}, "_source": {"ihc_idh1": "IDH1 positif"}}"#);
        let result = run_llm_extraction(&client, &opts(), "IDH1 positif", &HashMap::new(), &["ihc_idh1".to_string()], &HashMap::new());
        assert_eq!(result["ihc_idh1"].value.as_str(), Some("positif"));
        assert_eq!(result["ihc_idh1"].extraction_tier, crate::extraction::value::ExtractionTier::Llm);
    }

    #[test]
    fn null_field_in_response_is_not_fabricated() {
        let client = MockLlmClient::new(r#"{"values": {"ihc_idh1": null}, "_source": {}}"#);
        let result = run_llm_extraction(&client, &opts(), "texte", &HashMap::new(), &["ihc_idh1".to_string()], &HashMap::new());
        assert!(!result.contains_key("ihc_idh1"));
    }

    #[test]
    fn malformed_json_response_yields_no_results() {
        let client = MockLlmClient::new("not json at all");
        let result = run_llm_extraction(&client, &opts(), "texte", &HashMap::new(), &["ihc_idh1".to_string()], &HashMap::new());
        assert!(result.is_empty());
    }

    #[test]
    fn already_extracted_fields_are_never_overwritten() {
        let client = MockLlmClient::new(r#"{"values": {"ihc_idh1": "negatif"}, "_source": {}}"#);
        let already = HashMap::from([("ihc_idh1".to_string(), ExtractionValue::rule("positif", "x", 0, 1, 0.9))]);
        let result = run_llm_extraction(&client, &opts(), "texte", &HashMap::new(), &["ihc_idh1".to_string(), "ihc_p53".to_string()], &already);
        assert!(!result.contains_key("ihc_idh1"));
    }

    #[test]
    fn boolean_value_normalises_to_oui_non() {
        let client = MockLlmClient::new(r#"{"values": {"ampli_egfr": true}, "_source": {}}"#);
        let result = run_llm_extraction(&client, &opts(), "texte", &HashMap::new(), &["ampli_egfr".to_string()], &HashMap::new());
        assert_eq!(result["ampli_egfr"].value.as_str(), Some("oui"));
    }

    #[test]
    fn section_text_picked_from_mapped_section_name() {
        let secs = HashMap::from([("ihc".to_string(), "IDH1 positif".to_string())]);
        let (text, used) = select_section_text(&secs, "ihc", "full document text");
        assert_eq!(text, "IDH1 positif");
        assert_eq!(used, Some("ihc"));
    }

    #[test]
    fn falls_back_to_full_text_when_no_section_matches() {
        let (text, used) = select_section_text(&HashMap::new(), "ihc", "full document text");
        assert_eq!(text, "full document text");
        assert_eq!(used, None);
    }
}
