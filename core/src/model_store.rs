//! Model store: one reactive collection per model.
//!
//! The first `query` for a model creates an empty collection, starts the
//! REST load for it and starts listening to the push feed for events of
//! that model. Later queries share the same collection.
//!
//! The initial load and live push events are not sequenced against each
//! other: if events arrive before the REST response, the loaded snapshot
//! replaces them.

use crate::collection::{apply_event, CollectionStream, ReactiveCollection, Snapshot};
use crate::entity::Entity;
use crate::feed::EventFeed;
use crate::resource::{url_from_core_model, ResourceClient};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Search match tagged with the model it came from
#[derive(Clone, Debug, Serialize)]
pub struct SearchHit {
    pub model_name: String,
    pub entity: Entity,
}

pub struct ModelStore {
    collections: DashMap<String, Arc<ReactiveCollection>>,
    // model names in creation order
    order: Mutex<Vec<String>>,
    resources: Arc<dyn ResourceClient>,
    feed: EventFeed,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ModelStore {
    pub fn new(resources: Arc<dyn ResourceClient>, feed: EventFeed) -> Self {
        Self {
            collections: DashMap::new(),
            order: Mutex::new(Vec::new()),
            resources,
            feed,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Observe a model collection.
    ///
    /// The returned stream yields the current snapshot first (empty until
    /// the initial load resolves) and then every later snapshot. Must be
    /// called inside a tokio runtime.
    pub fn query(&self, model: &str) -> CollectionStream {
        let (collection, created) = match self.collections.entry(model.to_string()) {
            Entry::Occupied(existing) => (Arc::clone(existing.get()), false),
            Entry::Vacant(slot) => {
                let collection = Arc::new(ReactiveCollection::new(model));
                slot.insert(Arc::clone(&collection));
                (collection, true)
            }
        };

        let stream = collection.stream();
        if created {
            self.order
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(model.to_string());
            debug!(target: "model_store", model = %model, "Created collection");

            let push = self.spawn_push_listener(Arc::clone(&collection));
            let load = self.spawn_initial_load(collection);
            self.tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend([push, load]);
        }
        stream
    }

    /// Case-insensitive match on `humanReadableName`, else `name`, across
    /// every collection known so far
    pub fn search(&self, term: &str) -> Vec<SearchHit> {
        let needle = term.to_lowercase();
        let order = self
            .order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut results = Vec::new();
        for model in order {
            let Some(collection) = self.collections.get(&model) else {
                continue;
            };
            let snapshot = collection.current();
            results.extend(
                snapshot
                    .iter()
                    .filter(|e| {
                        e.display_name()
                            .map(|name| name.to_lowercase().contains(&needle))
                            .unwrap_or(false)
                    })
                    .map(|e| SearchHit {
                        model_name: model.clone(),
                        entity: e.clone(),
                    }),
            );
        }
        debug!(target: "model_store", term = %term, matches = results.len(), "Search");
        results
    }

    /// Current snapshot of a known collection
    pub fn snapshot(&self, model: &str) -> Option<Snapshot> {
        self.collections.get(model).map(|c| c.current())
    }

    /// Models queried so far, in creation order
    pub fn models(&self) -> Vec<String> {
        self.order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn feed(&self) -> &EventFeed {
        &self.feed
    }

    /// Stop every load and push task started by this store
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
        info!(target: "model_store", "Model store shut down");
    }

    fn spawn_initial_load(&self, collection: Arc<ReactiveCollection>) -> JoinHandle<()> {
        let endpoint = url_from_core_model(collection.name());
        let resource = self.resources.get_resource(&endpoint);

        tokio::spawn(async move {
            let model = collection.name().to_string();
            match resource.query().await {
                Ok(records) => {
                    let mut items = Vec::with_capacity(records.len());
                    for record in records {
                        match Entity::from_record(collection.kind().clone(), record) {
                            Ok(entity) => items.push(entity),
                            Err(e) => {
                                warn!(target: "model_store", model = %model, error = %e, "Skipping record")
                            }
                        }
                    }
                    let count = items.len();
                    let version = collection.replace(items);
                    info!(
                        target: "model_store",
                        model = %model,
                        endpoint = %endpoint,
                        count,
                        version,
                        "Loaded initial snapshot"
                    );
                }
                Err(e) => {
                    warn!(target: "model_store", model = %model, error = %e, "Error retrieving model");
                }
            }
        })
    }

    fn spawn_push_listener(&self, collection: Arc<ReactiveCollection>) -> JoinHandle<()> {
        // subscribe before spawning so events published right after query are seen
        let mut rx = self.feed.subscribe();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.model == collection.name() => {
                        if let Err(e) = apply_event(&collection, &event) {
                            warn!(
                                target: "model_store",
                                model = %collection.name(),
                                error = %e,
                                "Dropping malformed push event"
                            );
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            target: "model_store",
                            model = %collection.name(),
                            skipped,
                            "Push listener lagged behind"
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Drop for ModelStore {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}
