// Reactive collection
//
// One replay-latest channel per model. Each write publishes a whole new
// snapshot; readers never see a partially updated list.

use crate::entity::{Entity, EntityKind};
use crate::feed::ModelEvent;
use crate::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::trace;

/// Stream of snapshots: the current one first, then every later one
pub type CollectionStream = WatchStream<Snapshot>;

/// Immutable view of a collection at one version
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub version: u64,
    pub items: Arc<Vec<Entity>>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.items.iter()
    }
}

pub struct ReactiveCollection {
    name: String,
    kind: EntityKind,
    sender: watch::Sender<Snapshot>,
}

impl ReactiveCollection {
    /// Create an empty collection at version 0
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let (sender, _) = watch::channel(Snapshot::default());
        Self {
            kind: EntityKind::from_model(&name),
            name,
            sender,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    /// Latest snapshot
    pub fn current(&self) -> Snapshot {
        self.sender.borrow().clone()
    }

    /// Replace the contents wholesale; returns the new version
    pub fn replace(&self, items: Vec<Entity>) -> u64 {
        let mut version = 0;
        self.sender.send_modify(|snapshot| {
            snapshot.version += 1;
            snapshot.items = Arc::new(items);
            version = snapshot.version;
        });
        trace!(target: "collection", model = %self.name, version, "Published snapshot");
        version
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.sender.subscribe()
    }

    pub fn stream(&self) -> CollectionStream {
        WatchStream::new(self.subscribe())
    }
}

/// Merge a push event into a collection.
///
/// Matching is by id: a present record is replaced in place, or removed when
/// the event marks it deleted; an absent record is appended unless deleted.
pub fn apply_event(collection: &ReactiveCollection, event: &ModelEvent) -> Result<()> {
    let mut incoming = Entity::from_record(collection.kind().clone(), event.msg.object.clone())?;
    if incoming.id.is_none() {
        if let Some(pk) = event.msg.pk {
            incoming = incoming.with_id(pk);
        }
    }
    let id = incoming.id;
    let deleted = event.is_deleted();

    let current = collection.current();
    let mut items: Vec<Entity> = current.items.as_ref().clone();
    let index = id.and_then(|id| items.iter().position(|e| e.id == Some(id)));

    match (index, deleted) {
        (Some(i), true) => {
            items.remove(i);
        }
        (Some(i), false) => {
            items[i] = incoming;
        }
        (None, false) => items.push(incoming),
        (None, true) => {}
    }

    collection.replace(items);
    Ok(())
}
