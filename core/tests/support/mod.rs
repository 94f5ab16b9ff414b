//! Shared test doubles for the store tests

#![allow(dead_code)]

use async_trait::async_trait;
use dashmap::DashMap;
use meshscope_core::{EntityResource, MeshscopeError, ResourceClient, Result, Snapshot};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::{Stream, StreamExt};

/// Canned REST backend keyed by endpoint, optionally held until released
#[derive(Default)]
pub struct StubResources {
    records: DashMap<String, Vec<Value>>,
    failing: DashMap<String, ()>,
    gate: Option<watch::Receiver<bool>>,
}

impl StubResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads wait until the returned sender is set to `true`
    pub fn gated() -> (Self, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                gate: Some(rx),
                ..Self::default()
            },
            tx,
        )
    }

    pub fn with(self, endpoint: &str, records: Vec<Value>) -> Self {
        self.records.insert(endpoint.to_string(), records);
        self
    }

    pub fn failing(self, endpoint: &str) -> Self {
        self.failing.insert(endpoint.to_string(), ());
        self
    }
}

impl ResourceClient for StubResources {
    fn get_resource(&self, type_url: &str) -> Arc<dyn EntityResource> {
        Arc::new(StubResource {
            records: self
                .records
                .get(type_url)
                .map(|r| r.clone())
                .unwrap_or_default(),
            fail: self.failing.contains_key(type_url),
            gate: self.gate.clone(),
        })
    }
}

pub struct StubResource {
    records: Vec<Value>,
    fail: bool,
    gate: Option<watch::Receiver<bool>>,
}

#[async_trait]
impl EntityResource for StubResource {
    async fn query(&self) -> Result<Vec<Value>> {
        if let Some(mut gate) = self.gate.clone() {
            loop {
                let open = *gate.borrow();
                if open || gate.changed().await.is_err() {
                    break;
                }
            }
        }
        if self.fail {
            return Err(MeshscopeError::Status {
                status: 500,
                url: "stub".to_string(),
            });
        }
        Ok(self.records.clone())
    }

    async fn save(&self, record: Map<String, Value>) -> Result<Value> {
        Ok(Value::Object(record))
    }
}

/// Wait (bounded) for a snapshot satisfying `pred`
pub async fn next_matching<S, F>(stream: &mut S, pred: F) -> Snapshot
where
    S: Stream<Item = Snapshot> + Unpin,
    F: Fn(&Snapshot) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = stream.next().await.expect("collection stream ended");
            if pred(&snapshot) {
                return snapshot;
            }
        }
    })
    .await
    .expect("timed out waiting for snapshot")
}
