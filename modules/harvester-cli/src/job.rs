//! Input job format (§6): `inputs/{category}/products/{product_id}.json`.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityLock {
    pub brand: String,
    pub model: String,
    pub variant: Option<String>,
}

impl IdentityLock {
    pub fn product_id(&self, category: &str) -> String {
        harvester_common::product_id(category, &self.brand, &self.model, self.variant.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobInput {
    pub category: String,
    #[serde(rename = "identityLock")]
    pub identity_lock: IdentityLock,
    #[serde(rename = "seedUrls", default)]
    pub seed_urls: Vec<String>,
}

impl JobInput {
    pub fn product_id(&self) -> String {
        self.identity_lock.product_id(&self.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_documented_input_shape() {
        let raw = r#"{
            "category": "mice",
            "identityLock": { "brand": "Acme", "model": "X100", "variant": null },
            "seedUrls": ["https://acme.example/x100"]
        }"#;
        let job: JobInput = serde_json::from_str(raw).unwrap();
        assert_eq!(job.category, "mice");
        assert_eq!(job.identity_lock.brand, "Acme");
        assert_eq!(job.seed_urls.len(), 1);
    }
}
