// Graph projections
//
// Builds the coarse (service dependency) and fine-grained (entity level)
// graphs from the combined dataset. Link endpoints are positions in the node
// list of the same graph value.

use crate::entity::{composite_id, Entity, EntityKind, Relations};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Latest snapshot of each collection the graphs are built from
#[derive(Clone, Debug, Default)]
pub struct GraphDataset {
    pub services: Arc<Vec<Entity>>,
    pub tenants: Arc<Vec<Entity>>,
    pub networks: Arc<Vec<Entity>>,
    /// Tenant roots
    pub subscribers: Arc<Vec<Entity>>,
    pub service_dependencies: Arc<Vec<Entity>>,
}

impl GraphDataset {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
            && self.tenants.is_empty()
            && self.networks.is_empty()
            && self.subscribers.is_empty()
            && self.service_dependencies.is_empty()
    }
}

/// Raw entity id (coarse) or `<type>~<id>` (fine-grained)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum GraphId {
    Raw(i64),
    Composite(String),
}

#[derive(Clone, Debug, Serialize)]
pub struct GraphNode {
    pub id: GraphId,
    pub label: String,
    pub model: Entity,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GraphLink {
    pub id: GraphId,
    /// Index into `Graph::nodes`, `-1` when unresolved (coarse only)
    pub source: i64,
    pub target: i64,
    pub model: Entity,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

impl Graph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }

    pub fn node(&self, index: i64) -> Option<&GraphNode> {
        usize::try_from(index).ok().and_then(|i| self.nodes.get(i))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("{kind} record has no id")]
    MissingId { kind: String },
}

fn require_id(entity: &Entity) -> Result<i64, GraphError> {
    entity.id.ok_or_else(|| GraphError::MissingId {
        kind: entity.kind.tag(),
    })
}

/// One node per service, one link per service dependency.
///
/// Dependencies pointing at an unknown service keep the link with a `-1`
/// endpoint.
pub fn coarse_graph(data: &GraphDataset) -> Result<Graph, GraphError> {
    let mut index: HashMap<i64, usize> = HashMap::new();
    let mut nodes = Vec::with_capacity(data.services.len());

    for service in data.services.iter() {
        let id = require_id(service)?;
        index.entry(id).or_insert(nodes.len());
        nodes.push(GraphNode {
            id: GraphId::Raw(id),
            label: service.name.clone().unwrap_or_default(),
            model: service.clone(),
            node_type: None,
        });
    }

    let position = |id: Option<i64>| -> i64 {
        id.and_then(|id| index.get(&id))
            .map(|&i| i as i64)
            .unwrap_or(-1)
    };

    let mut links = Vec::with_capacity(data.service_dependencies.len());
    for dependency in data.service_dependencies.iter() {
        let id = require_id(dependency)?;
        let (provider, subscriber) = match &dependency.relations {
            Relations::Dependency {
                provider_service_id,
                subscriber_service_id,
            } => (*provider_service_id, *subscriber_service_id),
            _ => (None, None),
        };
        links.push(GraphLink {
            id: GraphId::Raw(id),
            source: position(provider),
            target: position(subscriber),
            model: dependency.clone(),
        });
    }

    Ok(Graph { nodes, links })
}

/// Entity-level graph with tenants, subscribers and networks as nodes.
///
/// Returns `Ok(None)` when there is nothing to draw, so callers keep the
/// previous graph instead of flashing an empty one.
pub fn fine_grained_graph(data: &GraphDataset) -> Result<Option<Graph>, GraphError> {
    let tenants: Vec<&Entity> = data
        .tenants
        .iter()
        .filter(|t| t.tenant_kind() != Some("coarse"))
        .collect();

    let networks: Vec<&Entity> = data
        .networks
        .iter()
        .filter(|n| match n.id {
            Some(id) => tenants
                .iter()
                .any(|t| t.subscriber_network_id() == Some(id)),
            None => false,
        })
        .collect();

    let entities = data
        .services
        .iter()
        .chain(tenants.iter().copied())
        .chain(data.subscribers.iter())
        .chain(networks.iter().copied())
        .chain(data.service_dependencies.iter());

    let mut nodes = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for entity in entities {
        let id = require_id(entity)?;
        let node_id = composite_id(&entity.class_tag(), id);
        let label = match entity.display_name() {
            Some(name) => name.to_string(),
            None if entity.kind == EntityKind::Tenant => id.to_string(),
            None => String::new(),
        };

        let position = nodes.len();
        index.entry(node_id.clone()).or_insert(position);
        // links address nodes by collection type even when class_names is more specific
        index
            .entry(composite_id(&entity.kind.tag(), id))
            .or_insert(position);

        nodes.push(GraphNode {
            id: GraphId::Composite(node_id),
            label,
            model: entity.clone(),
            node_type: Some(entity.class_tag()),
        });
    }

    let mut links = Vec::new();
    for tenant in &tenants {
        let tenant_id = composite_id(&EntityKind::Tenant.tag(), require_id(tenant)?);

        if let Some(subscriber) = tenant.subscriber() {
            push_link(&mut links, &index, tenant, &tenant_id, &subscriber.composite_id());
        }
        if let Some(provider) = tenant.provider_service_id() {
            let provider_id = composite_id(&EntityKind::Service.tag(), provider);
            push_link(&mut links, &index, tenant, &provider_id, &tenant_id);
        }
    }

    if nodes.is_empty() && links.is_empty() {
        return Ok(None);
    }
    Ok(Some(Graph { nodes, links }))
}

// Links with an endpoint missing from the node list are dropped
fn push_link(
    links: &mut Vec<GraphLink>,
    index: &HashMap<String, usize>,
    model: &Entity,
    source: &str,
    target: &str,
) {
    let (Some(&s), Some(&t)) = (index.get(source), index.get(target)) else {
        return;
    };
    links.push(GraphLink {
        id: GraphId::Composite(format!("{}-{}", source, target)),
        source: s as i64,
        target: t as i64,
        model: model.clone(),
    });
}
