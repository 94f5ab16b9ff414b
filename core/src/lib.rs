// Meshscope Core Library
// Reactive model store and service graph projections

pub mod collection;
pub mod config;
pub mod debounce;
pub mod entity;
pub mod feed;
pub mod graph;
pub mod graph_store;
pub mod model_store;
pub mod resource;

// Export core types
pub use collection::{apply_event, CollectionStream, ReactiveCollection, Snapshot};
pub use config::{FeedConfig, GraphStoreConfig, ResourceConfig, StoreConfig};
pub use debounce::Debouncer;
pub use entity::{Entity, EntityKind, Relations, SubscriberRef};
pub use feed::{EventFeed, EventMessage, ModelEvent};
pub use graph::{
    coarse_graph, fine_grained_graph, Graph, GraphDataset, GraphError, GraphId, GraphLink,
    GraphNode,
};
pub use graph_store::{GraphStore, GraphStream};
pub use model_store::{ModelStore, SearchHit};
pub use resource::{
    url_from_core_model, DateFieldInspector, EntityResource, FieldFormat, FieldFormatInspector,
    ResourceClient, RestClient,
};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeshscopeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, MeshscopeError>;
