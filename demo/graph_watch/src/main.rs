mod config;
use config::GraphWatchConfig;
use meshscope_core::{EventFeed, GraphStore, GraphStream, ModelEvent, ModelStore, RestClient};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    // Logging / tracing
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,meshscope_core=info,graph_watch=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    // Load configuration (defaults + env + optional TOML overlay)
    let cfg = GraphWatchConfig::load();
    info!(
        target = "graph_watch",
        api_base = %cfg.store.resource.api_base,
        "Starting graph watcher: REST load + push events → service graphs"
    );

    let feed = EventFeed::new(cfg.store.feed.capacity);
    let client = Arc::new(RestClient::new(cfg.store.resource.clone()));
    let models = Arc::new(ModelStore::new(client, feed.clone()));
    let graphs = GraphStore::new(&models, &cfg.store.graph);

    let coarse_task = tokio::spawn(watch_graph("coarse", graphs.get_coarse(), cfg.print_json));
    let fine_task = tokio::spawn(watch_graph("fine", graphs.get(), cfg.print_json));
    let input_task = tokio::spawn(read_stdin(feed, Arc::clone(&models)));

    info!(
        target = "graph_watch",
        "Ready. Push events as JSON lines on stdin, `?term` to search, Ctrl+C to exit."
    );
    signal::ctrl_c().await?;

    info!(target = "graph_watch", "Shutting down");
    input_task.abort();
    graphs.dispose();
    models.shutdown();
    coarse_task.abort();
    fine_task.abort();
    Ok(())
}

async fn watch_graph(view: &'static str, mut graphs: GraphStream, print_json: bool) {
    while let Some(update) = graphs.next().await {
        match update {
            Ok(graph) => {
                info!(
                    target = "graph_watch",
                    view,
                    nodes = graph.nodes.len(),
                    links = graph.links.len(),
                    "Graph updated"
                );
                if print_json {
                    match serde_json::to_string(&*graph) {
                        Ok(json) => println!("{}", json),
                        Err(e) => warn!(target = "graph_watch", error = %e, "Failed to encode graph"),
                    }
                }
            }
            Err(e) => {
                error!(target = "graph_watch", view, error = %e, "Graph stream terminated");
            }
        }
    }
}

// Each line is either a push event (`{"model": ..., "msg": {...}}`) or `?term`
async fn read_stdin(feed: EventFeed, models: Arc<ModelStore>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(target = "graph_watch", error = %e, "Failed to read stdin");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(term) = line.strip_prefix('?') {
            for hit in models.search(term.trim()) {
                info!(
                    target = "graph_watch",
                    model = %hit.model_name,
                    id = ?hit.entity.id,
                    name = hit.entity.display_name().unwrap_or_default(),
                    "Search hit"
                );
            }
            continue;
        }

        match serde_json::from_str::<ModelEvent>(line) {
            Ok(event) => feed.publish(event),
            Err(e) => warn!(target = "graph_watch", error = %e, "Ignoring malformed event"),
        }
    }
}
