// Store configuration
//
// Defaults with environment overrides. The demo binary layers a TOML file
// on top of these.

use serde::{Deserialize, Serialize};

/// REST resource client configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// API base, e.g. `http://localhost:9101/xosapi/v1`
    pub api_base: String,
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:9101/xosapi/v1".to_string(),
            timeout_ms: 10_000,
            user_agent: "meshscope/0.1".to_string(),
        }
    }
}

/// Graph store configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphStoreConfig {
    /// Quiet period before the combined dataset is rebuilt
    pub debounce_ms: u64,
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self { debounce_ms: 500 }
    }
}

/// Push feed configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedConfig {
    pub capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    pub resource: ResourceConfig,
    pub graph: GraphStoreConfig,
    pub feed: FeedConfig,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            resource: ResourceConfig {
                api_base: std::env::var("MESHSCOPE_API_BASE")
                    .ok()
                    .filter(|s| !s.is_empty())
                    .unwrap_or(defaults.resource.api_base),
                timeout_ms: std::env::var("MESHSCOPE_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.resource.timeout_ms),
                user_agent: defaults.resource.user_agent,
            },
            graph: GraphStoreConfig {
                debounce_ms: std::env::var("MESHSCOPE_DEBOUNCE_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.graph.debounce_ms),
            },
            feed: FeedConfig {
                capacity: std::env::var("MESHSCOPE_FEED_CAPACITY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|c: &usize| *c > 0)
                    .unwrap_or(defaults.feed.capacity),
            },
        }
    }
}
