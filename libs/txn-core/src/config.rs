//! Tunables for the held-transaction core (spec §3's "Configuration").

/// Four integer knobs that govern how many transactions may be held at
/// once, how long they may be held for, and how often the reaper sweeps.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Upper bound on simultaneously held transactions per process.
    pub max_concurrent: u32,
    /// Timeout applied when a caller omits `timeout_seconds`.
    pub default_timeout_secs: u32,
    /// Server-side ceiling; requested timeouts are clamped to this.
    pub max_timeout_secs: u32,
    /// Sleep between reaper sweeps.
    pub reaper_interval_secs: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            default_timeout_secs: 30,
            max_timeout_secs: 60,
            reaper_interval_secs: 5,
        }
    }
}

impl Config {
    /// Resolve a caller-requested timeout against `default_timeout_secs`
    /// and `max_timeout_secs`, per spec §3: `min(requested ?? default, max)`.
    #[must_use]
    pub fn clamp_timeout(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_timeout_secs)
            .min(self.max_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let cfg = Config::default();
        assert_eq!(cfg.max_concurrent, 10);
        assert_eq!(cfg.default_timeout_secs, 30);
        assert_eq!(cfg.max_timeout_secs, 60);
        assert_eq!(cfg.reaper_interval_secs, 5);
    }

    #[test]
    fn clamp_applies_default_when_omitted() {
        let cfg = Config {
            default_timeout_secs: 15,
            ..Config::default()
        };
        assert_eq!(cfg.clamp_timeout(None), 15);
    }

    #[test]
    fn clamp_caps_at_max_timeout() {
        let cfg = Config {
            max_timeout_secs: 60,
            ..Config::default()
        };
        assert_eq!(cfg.clamp_timeout(Some(500)), 60);
        assert_eq!(cfg.clamp_timeout(Some(10)), 10);
    }
}
