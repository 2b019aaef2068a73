//! Deterministic id derivation: product identity and content hashing.
//!
//! Both use the same normalize-then-hash shape so that re-running a harvest
//! for the same inputs always resolves to the same `product_id`/`snippet_id`
//! (invariant: `content_hash(a1) = content_hash(a2) => snippet_id(a1) = snippet_id(a2)`).

use sha2::{Digest, Sha256};

/// Lowercase, trim, and collapse internal whitespace.
fn normalize_token(s: &str) -> String {
    s.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hash arbitrary normalized text into a stable, content-addressed hex id.
pub fn content_hash(text: &str) -> String {
    let normalized = normalize_token(text);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Deterministic `product_id` for `(category, brand, model, variant?)`.
///
/// Identity is immutable within a run (§3): the same four-tuple always
/// resolves to the same id, independent of casing/whitespace.
pub fn product_id(category: &str, brand: &str, model: &str, variant: Option<&str>) -> String {
    let key = format!(
        "{}\u{1f}{}\u{1f}{}\u{1f}{}",
        normalize_token(category),
        normalize_token(brand),
        normalize_token(model),
        variant.map(normalize_token).unwrap_or_default(),
    );
    content_hash(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_id_is_deterministic() {
        let a = product_id("mouse", "Razer", "Viper V3 Pro", None);
        let b = product_id("mouse", "razer", "  viper v3 pro ", None);
        assert_eq!(a, b);
    }

    #[test]
    fn product_id_distinguishes_variant() {
        let a = product_id("mouse", "Razer", "Viper V3", Some("Pro"));
        let b = product_id("mouse", "Razer", "Viper V3", Some("Hyperspeed"));
        assert_ne!(a, b);
    }

    #[test]
    fn content_hash_ignores_whitespace_case() {
        let a = content_hash("Focus Pro 35K");
        let b = content_hash("  focus   pro 35k  ");
        assert_eq!(a, b);
    }
}
