//! Per-account daily usage limits.
//!
//! In-memory, lock-protected counters checked before every run and
//! updated as usage lands. Counters auto-reset when the UTC date rolls
//! over. Hitting a limit fails the run with kind `billing`, without
//! retry.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use parking_lot::RwLock;

use al_domain::config::BillingConfig;
use al_domain::error::{Error, Result};

struct DailyUsage {
    date: NaiveDate,
    tokens: u64,
    runs: u64,
}

pub struct BillingGuard {
    config: BillingConfig,
    usage: RwLock<HashMap<String, DailyUsage>>,
}

impl BillingGuard {
    pub fn new(config: BillingConfig) -> Self {
        Self {
            config,
            usage: RwLock::new(HashMap::new()),
        }
    }

    /// Check whether the account may start another run.
    pub fn check(&self, account_id: &str) -> Result<()> {
        let today = Utc::now().date_naive();
        let usage = self.usage.read();
        let Some(entry) = usage.get(account_id) else {
            return Ok(());
        };
        if entry.date != today {
            return Ok(());
        }
        if let Some(limit) = self.config.daily_token_limit {
            if entry.tokens >= limit {
                return Err(Error::BillingLimit(format!(
                    "daily token limit reached ({}/{limit})",
                    entry.tokens
                )));
            }
        }
        if let Some(limit) = self.config.daily_run_limit {
            if entry.runs >= limit {
                return Err(Error::BillingLimit(format!(
                    "daily run limit reached ({}/{limit})",
                    entry.runs
                )));
            }
        }
        Ok(())
    }

    pub fn record_run(&self, account_id: &str) {
        self.entry(account_id, |e| e.runs += 1);
    }

    pub fn record_tokens(&self, account_id: &str, tokens: u64) {
        self.entry(account_id, |e| e.tokens += tokens);
    }

    fn entry<F: FnOnce(&mut DailyUsage)>(&self, account_id: &str, f: F) {
        let today = Utc::now().date_naive();
        let mut usage = self.usage.write();
        let entry = usage.entry(account_id.to_string()).or_insert(DailyUsage {
            date: today,
            tokens: 0,
            runs: 0,
        });
        if entry.date != today {
            entry.date = today;
            entry.tokens = 0;
            entry.runs = 0;
        }
        f(entry);
    }
}
