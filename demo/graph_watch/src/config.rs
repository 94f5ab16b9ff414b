use std::fs;
use std::path::Path;

use meshscope_core::StoreConfig;

/// Configuration for the graph watcher demo
#[derive(Clone, Debug)]
pub struct GraphWatchConfig {
    pub store: StoreConfig,
    /// Print every graph as JSON on stdout in addition to the log summary
    pub print_json: bool,
}

impl Default for GraphWatchConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::from_env(),
            print_json: std::env::var("GRAPH_WATCH_PRINT_JSON")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }
}

impl GraphWatchConfig {
    /// Load configuration from a TOML file (path via GRAPH_WATCH_CONFIG or ./graph_watch.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path = std::env::var("GRAPH_WATCH_CONFIG").unwrap_or_else(|_| "graph_watch.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target = "graph_watch", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => Self::from_toml_str(&s).unwrap_or_else(|e| {
                tracing::warn!(target = "graph_watch", error = %e, "Failed to parse TOML; using defaults");
                default
            }),
            Err(e) => {
                tracing::warn!(target = "graph_watch", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<GraphWatchToml>(s).map(|t| t.overlay(Self::default()))
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct GraphWatchToml {
    pub print_json: Option<bool>,
    pub api: Option<ApiToml>,
    pub graph: Option<GraphToml>,
    pub feed: Option<FeedToml>,
}

impl GraphWatchToml {
    fn overlay(self, mut base: GraphWatchConfig) -> GraphWatchConfig {
        if let Some(p) = self.print_json {
            base.print_json = p;
        }
        if let Some(a) = self.api {
            if let Some(v) = a.base {
                base.store.resource.api_base = v;
            }
            if let Some(v) = a.timeout_ms {
                base.store.resource.timeout_ms = v;
            }
            if let Some(v) = a.user_agent {
                base.store.resource.user_agent = v;
            }
        }
        if let Some(g) = self.graph.and_then(|g| g.debounce_ms) {
            base.store.graph.debounce_ms = g;
        }
        if let Some(c) = self.feed.and_then(|f| f.capacity) {
            base.store.feed.capacity = c.max(1);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct ApiToml {
    pub base: Option<String>,
    pub timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct GraphToml {
    pub debounce_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct FeedToml {
    pub capacity: Option<usize>,
}
