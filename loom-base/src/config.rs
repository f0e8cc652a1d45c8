use serde::Deserialize;

/// Ambient configuration, deliberately tiny. See SPEC_FULL.md §9.3.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Optional ceiling on automation steps applied within a single
    /// `resolve_action` transaction. `None` disables the ceiling, which is
    /// the default: strong recursion budgets are a non-goal, this knob is
    /// only the failure-mitigation option the spec names.
    pub max_automation_steps: Option<usize>,

    /// Default `tracing` filter directive, overridable by `LOOM_LOG`.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_automation_steps: None,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Builds a `Config` from defaults, then overlays the `LOOM_LOG`
    /// environment variable if it is set.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        if let Ok(filter) = std::env::var("LOOM_LOG") {
            config.log_filter = filter;
        }
        config
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn default_has_no_automation_ceiling() {
        let config = Config::default();
        assert_eq!(config.max_automation_steps, None);
        assert_eq!(config.log_filter, "info");
    }
}
