//! Daily request quota, bucketed by UTC day

use std::fs;
use std::path::PathBuf;
use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct QuotaState {
    day_bucket: i64,
    used: u32,
}

/// Outcome of a quota check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaCheck {
    Granted { used: u32 },
    Exhausted { limit: u32 },
    Unlimited,
}

/// Persisted per-day request counter
pub struct DailyQuota {
    path: PathBuf,
    limit: u32,
}

impl DailyQuota {
    /// `limit == 0` disables the quota
    pub fn new(path: PathBuf, limit: u32) -> Self {
        Self { path, limit }
    }

    /// Consume one request for today
    pub fn consume(&self) -> Result<QuotaCheck> {
        self.consume_on(current_day_bucket())
    }

    fn consume_on(&self, today: i64) -> Result<QuotaCheck> {
        if self.limit == 0 {
            return Ok(QuotaCheck::Unlimited);
        }

        let mut state = self.load()?;
        if state.day_bucket != today {
            state = QuotaState { day_bucket: today, used: 0 };
        }

        if state.used >= self.limit {
            return Ok(QuotaCheck::Exhausted { limit: self.limit });
        }

        state.used += 1;
        self.save(&state)?;
        Ok(QuotaCheck::Granted { used: state.used })
    }

    fn load(&self) -> Result<QuotaState> {
        if !self.path.exists() {
            return Ok(QuotaState::default());
        }
        let data = fs::read_to_string(&self.path)
            .context("Failed to read quota file")?;
        Ok(serde_json::from_str(&data).unwrap_or_default())
    }

    fn save(&self, state: &QuotaState) -> Result<()> {
        let data = serde_json::to_string(state)
            .context("Failed to serialize quota")?;
        fs::write(&self.path, data)
            .context("Failed to write quota file")?;
        Ok(())
    }
}

fn current_day_bucket() -> i64 {
    chrono::Utc::now().timestamp().div_euclid(86_400)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exhausts_and_resets_next_day() {
        let dir = tempfile::tempdir().unwrap();
        let quota = DailyQuota::new(dir.path().join("quota.json"), 2);

        assert_eq!(quota.consume_on(100).unwrap(), QuotaCheck::Granted { used: 1 });
        assert_eq!(quota.consume_on(100).unwrap(), QuotaCheck::Granted { used: 2 });
        assert_eq!(quota.consume_on(100).unwrap(), QuotaCheck::Exhausted { limit: 2 });
        assert_eq!(quota.consume_on(101).unwrap(), QuotaCheck::Granted { used: 1 });
    }

    #[test]
    fn test_zero_limit_is_unlimited() {
        let dir = tempfile::tempdir().unwrap();
        let quota = DailyQuota::new(dir.path().join("quota.json"), 0);
        for _ in 0..50 {
            assert_eq!(quota.consume().unwrap(), QuotaCheck::Unlimited);
        }
        assert!(!dir.path().join("quota.json").exists());
    }
}
