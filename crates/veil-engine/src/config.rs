//! Engine configuration.
//!
//! The reveal threshold is an injected configuration value, not a hidden
//! literal: deployments tune it, and tests run with small values.

use veil_shared::constants::{DEFAULT_PAGE_SIZE, DEFAULT_REVEAL_THRESHOLD, MAX_PAGE_SIZE};

/// Policy knobs for the messaging core.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Counted messages required before either side may request a reveal.
    /// Env: `VEIL_REVEAL_THRESHOLD`
    pub reveal_threshold: u32,

    /// When `true`, other participants see a redacted placeholder for
    /// soft-deleted messages; when `false` (default) those messages vanish
    /// from their transcripts entirely.
    /// Env: `VEIL_DELETED_PLACEHOLDER` (true/false)
    pub show_deleted_placeholder: bool,

    /// Page size used when the caller does not ask for one.
    pub default_page_size: u32,

    /// Hard cap applied to caller-requested page sizes.
    pub max_page_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reveal_threshold: DEFAULT_REVEAL_THRESHOLD,
            show_deleted_placeholder: false,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("VEIL_REVEAL_THRESHOLD") {
            match val.parse::<u32>() {
                Ok(n) => config.reveal_threshold = n,
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid VEIL_REVEAL_THRESHOLD, using default");
                }
            }
        }

        if let Ok(val) = std::env::var("VEIL_DELETED_PLACEHOLDER") {
            config.show_deleted_placeholder = val == "true" || val == "1";
        }

        config
    }

    /// Clamp a caller-requested page size to the configured bounds.
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.reveal_threshold, DEFAULT_REVEAL_THRESHOLD);
        assert!(!config.show_deleted_placeholder);
    }

    #[test]
    fn page_size_is_clamped() {
        let config = EngineConfig::default();
        assert_eq!(config.page_size(None), config.default_page_size);
        assert_eq!(config.page_size(Some(0)), 1);
        assert_eq!(config.page_size(Some(10)), 10);
        assert_eq!(config.page_size(Some(100_000)), config.max_page_size);
    }
}
