//! Per-role, per-run token budget counters (§5). Exhaustion degrades the
//! caller to deterministic extraction rather than panicking.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::Role;

pub struct TokenBudget {
    limits: HashMap<Role, u64>,
    spent: Mutex<HashMap<Role, u64>>,
}

impl TokenBudget {
    pub fn new(limits: HashMap<Role, u64>) -> Self {
        Self {
            limits,
            spent: Mutex::new(HashMap::new()),
        }
    }

    /// `true` if spending `tokens` more on `role` would stay within budget.
    pub fn has_headroom(&self, role: Role, tokens: u64) -> bool {
        let limit = self.limits.get(&role).copied().unwrap_or(u64::MAX);
        let spent = *self.spent.lock().unwrap().get(&role).unwrap_or(&0);
        spent + tokens <= limit
    }

    pub fn record_spend(&self, role: Role, tokens: u64) {
        *self.spent.lock().unwrap().entry(role).or_insert(0) += tokens;
    }

    pub fn spent_for(&self, role: Role) -> u64 {
        *self.spent.lock().unwrap().get(&role).unwrap_or(&0)
    }

    pub fn remaining_for(&self, role: Role) -> u64 {
        let limit = self.limits.get(&role).copied().unwrap_or(u64::MAX);
        limit.saturating_sub(self.spent_for(role))
    }
}
