//! Typed view over the records served by the orchestration API.
//!
//! Records arrive as loose JSON objects. Kind and foreign keys are resolved
//! once here, so the projections never inspect raw field names again.

use crate::{MeshscopeError, Result};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Entity kinds known to the graph projections
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Service,
    Tenant,
    Network,
    TenantRoot,
    ServiceDependency,
    Other(String),
}

impl EntityKind {
    /// Resolve a kind from a model name (`Service`, `Tenantroot`, ...)
    pub fn from_model(model: &str) -> Self {
        match model.to_ascii_lowercase().as_str() {
            "service" => EntityKind::Service,
            "tenant" => EntityKind::Tenant,
            "network" => EntityKind::Network,
            "tenantroot" => EntityKind::TenantRoot,
            "servicedependency" => EntityKind::ServiceDependency,
            _ => EntityKind::Other(model.to_string()),
        }
    }

    /// Lowercase tag used as the prefix of composite ids
    pub fn tag(&self) -> String {
        match self {
            EntityKind::Service => "service".to_string(),
            EntityKind::Tenant => "tenant".to_string(),
            EntityKind::Network => "network".to_string(),
            EntityKind::TenantRoot => "tenantroot".to_string(),
            EntityKind::ServiceDependency => "servicedependency".to_string(),
            EntityKind::Other(name) => name.to_ascii_lowercase(),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

/// Target of a tenant's subscriber edge
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriberRef {
    Service(i64),
    Tenant(i64),
    Network(i64),
    Root(i64),
}

impl SubscriberRef {
    pub fn kind(&self) -> EntityKind {
        match self {
            SubscriberRef::Service(_) => EntityKind::Service,
            SubscriberRef::Tenant(_) => EntityKind::Tenant,
            SubscriberRef::Network(_) => EntityKind::Network,
            SubscriberRef::Root(_) => EntityKind::TenantRoot,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            SubscriberRef::Service(id)
            | SubscriberRef::Tenant(id)
            | SubscriberRef::Network(id)
            | SubscriberRef::Root(id) => *id,
        }
    }

    pub fn composite_id(&self) -> String {
        composite_id(&self.kind().tag(), self.id())
    }
}

/// Foreign keys of an entity, by kind
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Relations {
    #[default]
    None,
    Tenant {
        kind: Option<String>,
        provider_service_id: Option<i64>,
        subscriber: Option<SubscriberRef>,
    },
    Dependency {
        provider_service_id: Option<i64>,
        subscriber_service_id: Option<i64>,
    },
}

/// Build a `<tag>~<id>` identifier
pub fn composite_id(tag: &str, id: i64) -> String {
    format!("{}~{}", tag, id)
}

/// A record from one of the model collections
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub human_readable_name: Option<String>,
    pub class_names: Option<String>,
    pub kind: EntityKind,
    pub relations: Relations,
    record: Map<String, Value>,
}

impl Entity {
    /// Parse a JSON record belonging to a collection of the given kind
    pub fn from_record(kind: EntityKind, value: Value) -> Result<Self> {
        let record = match value {
            Value::Object(map) => map,
            other => {
                return Err(MeshscopeError::InvalidEntity(format!(
                    "expected an object for {}, got {}",
                    kind, other
                )))
            }
        };

        let relations = match kind {
            EntityKind::Tenant => Relations::Tenant {
                kind: string_field(&record, "kind"),
                provider_service_id: id_field(&record, "provider_service_id"),
                subscriber: resolve_subscriber(&record),
            },
            EntityKind::ServiceDependency => Relations::Dependency {
                provider_service_id: id_field(&record, "provider_service_id"),
                subscriber_service_id: id_field(&record, "subscriber_service_id"),
            },
            _ => Relations::None,
        };

        Ok(Self {
            id: record_id(&record),
            name: string_field(&record, "name"),
            human_readable_name: string_field(&record, "humanReadableName"),
            class_names: string_field(&record, "class_names"),
            kind,
            relations,
            record,
        })
    }

    /// Parse a record for a collection identified by model name
    pub fn from_model_record(model: &str, value: Value) -> Result<Self> {
        Self::from_record(EntityKind::from_model(model), value)
    }

    /// Lowercased first entry of `class_names`, falling back to the kind tag
    pub fn class_tag(&self) -> String {
        self.class_names
            .as_deref()
            .and_then(|names| names.split(',').next())
            .map(|first| first.trim().to_ascii_lowercase())
            .filter(|first| !first.is_empty())
            .unwrap_or_else(|| self.kind.tag())
    }

    pub fn composite_id(&self) -> Option<String> {
        self.id.map(|id| composite_id(&self.class_tag(), id))
    }

    /// `humanReadableName` if set and non-empty, else `name`
    pub fn display_name(&self) -> Option<&str> {
        self.human_readable_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.name.as_deref())
    }

    /// Fill in an id that the record itself did not carry
    pub(crate) fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self.record.insert("id".to_string(), Value::from(id));
        self
    }

    /// Tenant `kind` field (`coarse` tenants only belong to the coarse view)
    pub fn tenant_kind(&self) -> Option<&str> {
        match &self.relations {
            Relations::Tenant { kind, .. } => kind.as_deref(),
            _ => None,
        }
    }

    pub fn subscriber(&self) -> Option<SubscriberRef> {
        match &self.relations {
            Relations::Tenant { subscriber, .. } => *subscriber,
            _ => None,
        }
    }

    pub fn provider_service_id(&self) -> Option<i64> {
        match &self.relations {
            Relations::Tenant {
                provider_service_id,
                ..
            }
            | Relations::Dependency {
                provider_service_id,
                ..
            } => *provider_service_id,
            Relations::None => None,
        }
    }

    /// Network foreign key of a tenant, whichever subscriber field wins
    pub fn subscriber_network_id(&self) -> Option<i64> {
        match self.kind {
            EntityKind::Tenant => id_field(&self.record, "subscriber_network_id"),
            _ => None,
        }
    }

    pub fn record(&self) -> &Map<String, Value> {
        &self.record
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.record.serialize(serializer)
    }
}

// Subscriber precedence: service, tenant, network, root
fn resolve_subscriber(record: &Map<String, Value>) -> Option<SubscriberRef> {
    id_field(record, "subscriber_service_id")
        .map(SubscriberRef::Service)
        .or_else(|| id_field(record, "subscriber_tenant_id").map(SubscriberRef::Tenant))
        .or_else(|| id_field(record, "subscriber_network_id").map(SubscriberRef::Network))
        .or_else(|| id_field(record, "subscriber_root_id").map(SubscriberRef::Root))
}

/// `id` of a raw record, as a number or a numeric string
pub fn record_id(record: &Map<String, Value>) -> Option<i64> {
    id_field(record, "id")
}

fn id_field(record: &Map<String, Value>, key: &str) -> Option<i64> {
    match record.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_field(record: &Map<String, Value>, key: &str) -> Option<String> {
    record.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscriber_precedence() {
        let tenant = Entity::from_model_record(
            "Tenant",
            json!({
                "id": 3,
                "subscriber_network_id": 9,
                "subscriber_tenant_id": 4,
                "subscriber_root_id": 1
            }),
        )
        .unwrap();
        assert_eq!(tenant.subscriber(), Some(SubscriberRef::Tenant(4)));

        let rooted = Entity::from_model_record(
            "Tenant",
            json!({"id": 5, "subscriber_service_id": null, "subscriber_root_id": 2}),
        )
        .unwrap();
        assert_eq!(rooted.subscriber(), Some(SubscriberRef::Root(2)));
        assert_eq!(rooted.subscriber().unwrap().composite_id(), "tenantroot~2");
    }

    #[test]
    fn test_class_tag_uses_first_class_name() {
        let svc = Entity::from_model_record(
            "Service",
            json!({"id": 5, "class_names": "VSGService,Service,XOSBase"}),
        )
        .unwrap();
        assert_eq!(svc.class_tag(), "vsgservice");

        let plain = Entity::from_model_record("Service", json!({"id": 5})).unwrap();
        assert_eq!(plain.composite_id().as_deref(), Some("service~5"));
    }

    #[test]
    fn test_rejects_non_object_records() {
        assert!(Entity::from_model_record("Service", json!([1, 2])).is_err());
    }

    #[test]
    fn test_network_key_ignores_precedence() {
        let tenant = Entity::from_model_record(
            "Tenant",
            json!({"id": 3, "subscriber_service_id": 1, "subscriber_network_id": "9"}),
        )
        .unwrap();
        assert_eq!(tenant.subscriber(), Some(SubscriberRef::Service(1)));
        assert_eq!(tenant.subscriber_network_id(), Some(9));
    }

    #[test]
    fn test_empty_human_readable_name_falls_back() {
        let e = Entity::from_model_record(
            "Service",
            json!({"id": 1, "name": "vsg", "humanReadableName": ""}),
        )
        .unwrap();
        assert_eq!(e.display_name(), Some("vsg"));
    }

    #[test]
    fn test_with_id_updates_record() {
        let e = Entity::from_model_record("Service", json!({"name": "vsg"}))
            .unwrap()
            .with_id(4);
        assert_eq!(e.id, Some(4));
        assert_eq!(e.record()["id"], json!(4));
    }

    #[test]
    fn test_display_name_prefers_human_readable() {
        let e = Entity::from_model_record(
            "Network",
            json!({"id": 1, "name": "net", "humanReadableName": "Public Net"}),
        )
        .unwrap();
        assert_eq!(e.display_name(), Some("Public Net"));
    }
}
