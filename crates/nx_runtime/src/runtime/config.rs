//! Runtime configuration.

use crate::cache::CacheStrategy;

/// Runtime configuration options.
#[derive(Clone, Copy, Debug)]
pub struct RuntimeConfig {
    /// Locking strategy of the member metadata caches.
    pub cache_strategy: CacheStrategy,
    /// Compile a node the first time `Runtime::get_value` evaluates it.
    pub auto_compile: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cache_strategy: CacheStrategy::Optimistic,
            auto_compile: false,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `NAVEX_CACHE_STRATEGY` and `NAVEX_AUTO_COMPILE`.
    /// Unrecognized values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(strategy) = std::env::var("NAVEX_CACHE_STRATEGY")
            .ok()
            .and_then(|v| CacheStrategy::parse(&v))
        {
            config.cache_strategy = strategy;
        }
        if let Ok(v) = std::env::var("NAVEX_AUTO_COMPILE") {
            config.auto_compile = v == "1" || v.eq_ignore_ascii_case("true");
        }
        config
    }
}
