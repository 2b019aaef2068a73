//! Per-host request pacing (§4.3, §5: "per-host delay clocks are process-wide").

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::sleep;

pub struct HostPacer {
    min_delay: Duration,
    next_allowed: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl HostPacer {
    pub fn new(min_delay_ms: u64) -> Self {
        Self {
            min_delay: Duration::from_millis(min_delay_ms),
            next_allowed: Mutex::new(HashMap::new()),
        }
    }

    /// Block the caller until `host` may be fetched again, then reserve the
    /// next slot. Requests to the same host are thereby serialized in
    /// arrival order after admission.
    pub async fn wait_turn(&self, host: &str) {
        loop {
            let wait = {
                let mut next_allowed = self.next_allowed.lock().unwrap();
                let now = Utc::now();
                let entry = next_allowed.entry(host.to_string()).or_insert(now);
                if *entry <= now {
                    *entry = now + chrono::Duration::from_std(self.min_delay).unwrap();
                    None
                } else {
                    let wait_for = *entry - now;
                    *entry += chrono::Duration::from_std(self.min_delay).unwrap();
                    Some(wait_for)
                }
            };

            match wait {
                None => return,
                Some(delta) => {
                    sleep(delta.to_std().unwrap_or(Duration::ZERO)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_host_requests_serialize_with_min_delay() {
        let pacer = HostPacer::new(20);
        let start = std::time::Instant::now();
        pacer.wait_turn("shop.test").await;
        pacer.wait_turn("shop.test").await;
        pacer.wait_turn("shop.test").await;
        assert!(start.elapsed() >= Duration::from_millis(39));
    }

    #[tokio::test]
    async fn different_hosts_do_not_block_each_other() {
        let pacer = HostPacer::new(5_000);
        let start = std::time::Instant::now();
        pacer.wait_turn("a.test").await;
        pacer.wait_turn("b.test").await;
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
