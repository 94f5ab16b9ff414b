//! Graph store: keeps the coarse and fine-grained graphs current.
//!
//! Five model collections feed one combined dataset. Every collection
//! update resets a debounce timer; when the quiet window elapses the latest
//! value of every slot is published as a new dataset, and both projections
//! run against it.
//!
//! A projection error ends that projection's stream. The other projection
//! keeps running.

use crate::collection::Snapshot;
use crate::config::GraphStoreConfig;
use crate::debounce::Debouncer;
use crate::entity::Entity;
use crate::graph::{coarse_graph, fine_grained_graph, Graph, GraphDataset, GraphError};
use crate::model_store::ModelStore;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info};

/// Value held by a graph channel
#[derive(Clone, Debug)]
enum GraphEmission {
    Ready(Arc<Graph>),
    Failed(GraphError),
}

/// Dataset slot fed by one model collection
#[derive(Clone, Copy, Debug)]
enum Slot {
    Services,
    ServiceDependencies,
    Tenants,
    Subscribers,
    Networks,
}

impl Slot {
    const ALL: [(&'static str, Slot); 5] = [
        ("Service", Slot::Services),
        ("ServiceDependency", Slot::ServiceDependencies),
        ("Tenant", Slot::Tenants),
        ("Tenantroot", Slot::Subscribers),
        ("Network", Slot::Networks),
    ];

    fn assign(self, data: &mut GraphDataset, items: Arc<Vec<Entity>>) {
        match self {
            Slot::Services => data.services = items,
            Slot::ServiceDependencies => data.service_dependencies = items,
            Slot::Tenants => data.tenants = items,
            Slot::Subscribers => data.subscribers = items,
            Slot::Networks => data.networks = items,
        }
    }
}

/// Graph updates for one view.
///
/// Yields the current graph first, then every later version. After an
/// `Err` the stream ends.
pub struct GraphStream {
    latest: watch::Receiver<GraphEmission>,
    inner: WatchStream<GraphEmission>,
    done: bool,
}

impl GraphStream {
    fn new(rx: watch::Receiver<GraphEmission>) -> Self {
        Self {
            latest: rx.clone(),
            inner: WatchStream::new(rx),
            done: false,
        }
    }

    /// Most recent graph without waiting
    pub fn latest(&self) -> Result<Arc<Graph>, GraphError> {
        match &*self.latest.borrow() {
            GraphEmission::Ready(graph) => Ok(Arc::clone(graph)),
            GraphEmission::Failed(e) => Err(e.clone()),
        }
    }
}

impl Stream for GraphStream {
    type Item = Result<Arc<Graph>, GraphError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(GraphEmission::Ready(graph))) => Poll::Ready(Some(Ok(graph))),
            Poll::Ready(Some(GraphEmission::Failed(e))) => {
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

pub struct GraphStore {
    dataset: Arc<watch::Sender<Arc<GraphDataset>>>,
    coarse: Arc<watch::Sender<GraphEmission>>,
    fine_grained: Arc<watch::Sender<GraphEmission>>,
    debouncer: Arc<Debouncer>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl GraphStore {
    /// Subscribe to the five graph collections and start projecting.
    /// Must be called inside a tokio runtime.
    pub fn new(models: &ModelStore, config: &GraphStoreConfig) -> Self {
        info!(target: "graph_store", debounce_ms = config.debounce_ms, "Setup");

        let slots = Arc::new(Mutex::new(GraphDataset::default()));
        let (dataset, _) = watch::channel(Arc::new(GraphDataset::default()));
        let dataset = Arc::new(dataset);

        let empty = || GraphEmission::Ready(Arc::new(Graph::default()));
        let coarse = Arc::new(watch::channel(empty()).0);
        let fine_grained = Arc::new(watch::channel(empty()).0);

        let debouncer = {
            let slots = Arc::clone(&slots);
            let dataset = Arc::clone(&dataset);
            Arc::new(Debouncer::spawn(
                Duration::from_millis(config.debounce_ms),
                move || {
                    let combined = slots.lock().unwrap_or_else(PoisonError::into_inner).clone();
                    debug!(
                        target: "graph_store",
                        services = combined.services.len(),
                        tenants = combined.tenants.len(),
                        networks = combined.networks.len(),
                        subscribers = combined.subscribers.len(),
                        dependencies = combined.service_dependencies.len(),
                        "Publishing combined dataset"
                    );
                    dataset.send_replace(Arc::new(combined));
                },
            ))
        };

        let mut tasks = Vec::with_capacity(Slot::ALL.len() + 1);
        tasks.push(Self::spawn_projection(
            dataset.subscribe(),
            Arc::clone(&coarse),
            Arc::clone(&fine_grained),
        ));
        for (model, slot) in Slot::ALL {
            tasks.push(Self::spawn_slot(
                models.query(model),
                slot,
                Arc::clone(&slots),
                Arc::clone(&debouncer),
            ));
        }

        Self {
            dataset,
            coarse,
            fine_grained,
            debouncer,
            tasks: Mutex::new(tasks),
        }
    }

    /// Fine-grained graph
    pub fn get(&self) -> GraphStream {
        GraphStream::new(self.fine_grained.subscribe())
    }

    /// Coarse service dependency graph
    pub fn get_coarse(&self) -> GraphStream {
        GraphStream::new(self.coarse.subscribe())
    }

    /// Latest combined dataset
    pub fn dataset(&self) -> Arc<GraphDataset> {
        Arc::clone(&self.dataset.borrow())
    }

    /// Release the collection subscriptions and stop projecting
    pub fn dispose(&self) {
        self.debouncer.cancel();
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
        info!(target: "graph_store", "Disposed");
    }

    fn spawn_slot(
        mut updates: impl Stream<Item = Snapshot> + Unpin + Send + 'static,
        slot: Slot,
        slots: Arc<Mutex<GraphDataset>>,
        debouncer: Arc<Debouncer>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(snapshot) = updates.next().await {
                {
                    let mut data = slots.lock().unwrap_or_else(PoisonError::into_inner);
                    slot.assign(&mut data, snapshot.items);
                }
                debouncer.call();
            }
        })
    }

    fn spawn_projection(
        mut datasets: watch::Receiver<Arc<GraphDataset>>,
        coarse: Arc<watch::Sender<GraphEmission>>,
        fine_grained: Arc<watch::Sender<GraphEmission>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut coarse_live = true;
            let mut fine_live = true;

            while datasets.changed().await.is_ok() {
                let data = Arc::clone(&datasets.borrow_and_update());

                if coarse_live {
                    match coarse_graph(&data) {
                        Ok(graph) => {
                            coarse.send_replace(GraphEmission::Ready(Arc::new(graph)));
                        }
                        Err(e) => {
                            error!(target: "graph_store", error = %e, "Coarse graph failed");
                            coarse.send_replace(GraphEmission::Failed(e));
                            coarse_live = false;
                        }
                    }
                }

                if fine_live {
                    match fine_grained_graph(&data) {
                        Ok(Some(graph)) => {
                            fine_grained.send_replace(GraphEmission::Ready(Arc::new(graph)));
                        }
                        Ok(None) => {
                            debug!(target: "graph_store", "Nothing to draw, keeping previous graph");
                        }
                        Err(e) => {
                            error!(target: "graph_store", error = %e, "Fine-grained graph failed");
                            fine_grained.send_replace(GraphEmission::Failed(e));
                            fine_live = false;
                        }
                    }
                }

                if !coarse_live && !fine_live {
                    break;
                }
            }
        })
    }
}

impl Drop for GraphStore {
    fn drop(&mut self) {
        self.debouncer.cancel();
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}
