//! Deterministic query composer: brand/model + field aliases (§4.6).
//!
//! This is the fallback path used when the LLM planner (role `plan`) is
//! unavailable or budget-exhausted; it has no external dependencies and
//! always produces at least one query per target field.

use crate::types::{DocHint, PlannedQuery, SearchProfile};

/// Aliases tried for a field key when composing a query, most specific first.
fn field_aliases(field_key: &str) -> Vec<String> {
    let mut aliases = vec![field_key.replace('_', " ")];
    match field_key {
        "weight_kg" | "weight" => aliases.push("weight".to_string()),
        "warranty_years" | "warranty" => aliases.push("warranty".to_string()),
        "dimensions" => aliases.push("size".to_string()),
        _ => {}
    }
    aliases
}

/// Compose a SearchProfile covering `target_fields` for the given identity.
/// One query per (doc_hint, field) pair keeps each query narrowly scoped,
/// which tends to outperform a single kitchen-sink query in SERP triage.
pub fn compose_fallback_profile(
    brand: &str,
    model: &str,
    target_fields: &[String],
    domain_hint: Option<&str>,
) -> SearchProfile {
    let mut queries = Vec::new();

    for field in target_fields {
        for alias in field_aliases(field) {
            let doc_hint = doc_hint_for_field(field);
            let query_text = format!("{brand} {model} {alias} {}", doc_hint.as_str());
            queries.push(PlannedQuery {
                query_text,
                target_fields: vec![field.clone()],
                doc_hint,
                domain_hint: domain_hint.map(str::to_string),
            });
        }
    }

    if queries.is_empty() {
        queries.push(PlannedQuery {
            query_text: format!("{brand} {model} specifications"),
            target_fields: Vec::new(),
            doc_hint: DocHint::Spec,
            domain_hint: domain_hint.map(str::to_string),
        });
    }

    SearchProfile { queries }
}

fn doc_hint_for_field(field_key: &str) -> DocHint {
    match field_key {
        f if f.contains("review") || f.contains("rating") => DocHint::Review,
        f if f.contains("install") || f.contains("setup") || f.contains("manual") => DocHint::Manual,
        f if f.contains("driver") || f.contains("firmware") => DocHint::Driver,
        _ => DocHint::Spec,
    }
}
