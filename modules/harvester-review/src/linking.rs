//! Canonical linking (§3 invariants 3–4, §4.10): item↔canonical links for
//! shared component/list rows. Kept separate from `transitions.rs` because
//! these effects cross keys — a shared accept can touch many items' links
//! at once, which a single-key pure transition function cannot express.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::types::{LinkAction, LinkEvent};

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

#[derive(Debug, Clone)]
pub struct CanonicalRow {
    pub id: String,
    pub value_norm: String,
    pub display_value: String,
}

/// In-memory arena for canonical rows (`list_values` / `component_identity`)
/// and the item↔canonical link table, keyed by stable ids rather than
/// mutable references (§9 redesign flag: no cyclic references).
#[derive(Debug, Default)]
pub struct CanonicalRegistry {
    rows: HashMap<String, CanonicalRow>,
    /// `(product_id, field_key) -> canonical_id`.
    item_links: HashMap<(String, String), String>,
}

impl CanonicalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a canonical row (contract-compiler territory in the real
    /// system; exposed here only so the review layer has rows to select
    /// from — the review lane itself never creates one, per invariant 3).
    pub fn seed_row(&mut self, id: impl Into<String>, value: impl Into<String>) {
        let display = value.into();
        let row = CanonicalRow { id: id.into(), value_norm: normalize(&display), display_value: display };
        self.rows.insert(row.id.clone(), row);
    }

    pub fn find_by_value(&self, value: &str) -> Option<&CanonicalRow> {
        let norm = normalize(value);
        self.rows.values().find(|r| r.value_norm == norm)
    }

    pub fn linked_canonical_id(&self, product_id: &str, field_key: &str) -> Option<&str> {
        self.item_links
            .get(&(product_id.to_string(), field_key.to_string()))
            .map(String::as_str)
    }

    /// Link an item to an *existing* canonical row. Invariant 3: shared
    /// accepts never upsert a master — if no row matches, the item is left
    /// unlinked rather than fabricating one.
    pub fn relink_item(
        &mut self,
        product_id: impl Into<String>,
        field_key: impl Into<String>,
        canonical_id: &str,
        at: DateTime<Utc>,
    ) -> LinkEvent {
        let product_id = product_id.into();
        let field_key = field_key.into();
        self.item_links
            .insert((product_id.clone(), field_key.clone()), canonical_id.to_string());
        LinkEvent {
            product_id,
            field_key,
            canonical_id: Some(canonical_id.to_string()),
            action: LinkAction::Relinked,
            at,
        }
    }

    /// Detach an item's link (e.g. on item override) without touching the
    /// canonical row or any other item's link.
    pub fn detach_item(&mut self, product_id: &str, field_key: &str, at: DateTime<Utc>) -> Option<LinkEvent> {
        self.item_links
            .remove(&(product_id.to_string(), field_key.to_string()))?;
        Some(LinkEvent {
            product_id: product_id.to_string(),
            field_key: field_key.to_string(),
            canonical_id: None,
            action: LinkAction::Detached,
            at,
        })
    }

    /// Given the newly shared-accepted value and every item's current item
    /// lane `(product_id, field_key, selected_value)`, relink every item
    /// whose normalized value matches — "a shared accept re-links all items
    /// whose item lane resolves to the same normalized value" (§4.10).
    pub fn relink_on_shared_accept(
        &mut self,
        accepted_value: &str,
        item_values: impl IntoIterator<Item = (String, String, Option<String>)>,
        at: DateTime<Utc>,
    ) -> Vec<LinkEvent> {
        let Some(canonical_id) = self.find_by_value(accepted_value).map(|r| r.id.clone()) else {
            return Vec::new();
        };
        let accepted_norm = normalize(accepted_value);

        item_values
            .into_iter()
            .filter_map(|(product_id, field_key, value)| {
                let value = value?;
                if normalize(&value) == accepted_norm {
                    Some(self.relink_item(product_id, field_key, &canonical_id, at))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Rename a canonical row in place: same id, new text. Every item
    /// already linked by id sees the new text with no link-table change —
    /// rename propagates to linked items; the reverse never happens
    /// (invariant 4). Returns `false` if `canonical_id` is unknown.
    pub fn rename(&mut self, canonical_id: &str, new_value: &str) -> bool {
        let Some(row) = self.rows.get_mut(canonical_id) else {
            return false;
        };
        row.value_norm = normalize(new_value);
        row.display_value = new_value.to_string();
        true
    }

    pub fn row(&self, canonical_id: &str) -> Option<&CanonicalRow> {
        self.rows.get(canonical_id)
    }

    pub fn items_linked_to(&self, canonical_id: &str) -> Vec<(String, String)> {
        self.item_links
            .iter()
            .filter(|(_, v)| v.as_str() == canonical_id)
            .map(|(k, _)| k.clone())
            .collect()
    }
}
