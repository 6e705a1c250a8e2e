//! Tier to limit mapping.

use crate::config::schema::LimitsConfig;
use crate::identity::types::Tier;

/// Requests-per-window for each tier, plus the shared window length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    free: u64,
    pro: u64,
    window_secs: u64,
}

impl TierLimits {
    pub fn new(free: u64, pro: u64, window_secs: u64) -> Self {
        Self {
            free,
            pro,
            window_secs,
        }
    }

    /// Limit for a tier. Pro gets the pro limit; everything else is treated as free.
    pub fn limit_for(&self, tier: Tier) -> u64 {
        match tier {
            Tier::Pro => self.pro,
            Tier::Free => self.free,
        }
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }
}

impl Default for TierLimits {
    fn default() -> Self {
        Self::from(&LimitsConfig::default())
    }
}

impl From<&LimitsConfig> for TierLimits {
    fn from(config: &LimitsConfig) -> Self {
        Self::new(config.free_limit, config.pro_limit, config.window_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tier_mapping() {
        let limits = TierLimits::default();
        assert_eq!(limits.limit_for(Tier::Pro), 100);
        assert_eq!(limits.limit_for(Tier::Free), 5);
        assert_eq!(limits.window_secs(), 60);
    }

    #[test]
    fn test_unknown_tier_names_map_to_free_limit() {
        let limits = TierLimits::default();
        for raw in ["enterprise", "", "premium"] {
            assert_eq!(limits.limit_for(Tier::parse_lenient(raw)), 5);
        }
    }
}
