//! Dedupe key construction (§4.11): `{type, domain, query-norm,
//! field-targets, reason}`. Two jobs that would enqueue with the same key
//! collapse into one queued row rather than piling up duplicates.

use harvester_common::JobType;

pub fn build_dedupe_key(
    job_type: JobType,
    domain: &str,
    query_norm: &str,
    field_targets: &[String],
    reason: &str,
) -> String {
    let mut sorted_fields = field_targets.to_vec();
    sorted_fields.sort();
    format!(
        "{job_type:?}|{}|{}|{}|{reason}",
        domain.trim().to_lowercase(),
        query_norm.trim().to_lowercase(),
        sorted_fields.join(",")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_target_order_does_not_change_the_key() {
        let a = build_dedupe_key(JobType::RepairSearch, "shop.test", "viper v3", &["dpi".into(), "weight".into()], "dead_path");
        let b = build_dedupe_key(JobType::RepairSearch, "shop.test", "viper v3", &["weight".into(), "dpi".into()], "dead_path");
        assert_eq!(a, b);
    }

    #[test]
    fn different_domains_produce_different_keys() {
        let a = build_dedupe_key(JobType::RepairSearch, "shop.test", "q", &[], "r");
        let b = build_dedupe_key(JobType::RepairSearch, "other.test", "q", &[], "r");
        assert_ne!(a, b);
    }
}
