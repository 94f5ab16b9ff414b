//! Entity resource client
//!
//! Thin REST wrapper over one entity collection of the orchestration API,
//! bound to `{api_base}/{type_url}/{id}/`.

use crate::config::ResourceConfig;
use crate::entity::record_id;
use crate::{MeshscopeError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::Method;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// CRUD handle for one entity collection
#[async_trait]
pub trait EntityResource: Send + Sync {
    /// List the collection, flattened to one ordered sequence
    async fn query(&self) -> Result<Vec<Value>>;

    /// Create (no id) or update (id present) a record; returns the stored record
    async fn save(&self, record: Map<String, Value>) -> Result<Value>;
}

/// Factory for collection handles
pub trait ResourceClient: Send + Sync {
    fn get_resource(&self, type_url: &str) -> Arc<dyn EntityResource>;
}

/// Shape of a field value as seen by the form layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldFormat {
    Date,
    Text,
    Number,
    Boolean,
    Array,
    Object,
    Null,
}

pub trait FieldFormatInspector: Send + Sync {
    fn field_format(&self, value: &Value) -> FieldFormat;
}

/// Recognizes RFC 3339 timestamps and `YYYY-MM-DD` dates
#[derive(Clone, Copy, Debug, Default)]
pub struct DateFieldInspector;

impl FieldFormatInspector for DateFieldInspector {
    fn field_format(&self, value: &Value) -> FieldFormat {
        match value {
            Value::Null => FieldFormat::Null,
            Value::Bool(_) => FieldFormat::Boolean,
            Value::Number(_) => FieldFormat::Number,
            Value::Array(_) => FieldFormat::Array,
            Value::Object(_) => FieldFormat::Object,
            Value::String(s) if parse_date_millis(s).is_some() => FieldFormat::Date,
            Value::String(_) => FieldFormat::Text,
        }
    }
}

fn parse_date_millis(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Convert every date-valued field to epoch milliseconds
pub fn prepare_for_save(
    mut record: Map<String, Value>,
    inspector: &dyn FieldFormatInspector,
) -> Map<String, Value> {
    for value in record.values_mut() {
        if inspector.field_format(value) != FieldFormat::Date {
            continue;
        }
        if let Some(ms) = value.as_str().and_then(parse_date_millis) {
            *value = Value::from(ms);
        }
    }
    record
}

/// Accept either a bare array or an `{items: [...]}` envelope
pub fn normalize_list(body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut envelope) => match envelope.remove("items") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(MeshscopeError::Decode(
                "list response has no items array".to_string(),
            )),
        },
        other => Err(MeshscopeError::Decode(format!(
            "unexpected list response: {}",
            other
        ))),
    }
}

/// `{api_base}/{type_url}/` or `{api_base}/{type_url}/{id}/`
pub fn resource_url(api_base: &str, type_url: &str, id: Option<i64>) -> String {
    let base = format!(
        "{}/{}/",
        api_base.trim_end_matches('/'),
        type_url.trim_matches('/')
    );
    match id {
        Some(id) => format!("{}{}/", base, id),
        None => base,
    }
}

/// Endpoint of a core model, e.g. `Service` -> `/core/services`
pub fn url_from_core_model(model: &str) -> String {
    format!("/core/{}", pluralize(&model.to_ascii_lowercase()))
}

fn pluralize(word: &str) -> String {
    let consonant_y = word.ends_with('y')
        && !word[..word.len() - 1].ends_with(|c: char| "aeiou".contains(c));
    if consonant_y {
        format!("{}ies", &word[..word.len() - 1])
    } else if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        format!("{}es", word)
    } else {
        format!("{}s", word)
    }
}

/// reqwest-backed resource client
pub struct RestClient {
    config: ResourceConfig,
    http_client: reqwest::Client,
    inspector: Arc<dyn FieldFormatInspector>,
}

impl RestClient {
    pub fn new(config: ResourceConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(&config.user_agent)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config,
            http_client,
            inspector: Arc::new(DateFieldInspector),
        }
    }

    /// Replace the field format inspector used on save
    pub fn with_inspector(mut self, inspector: Arc<dyn FieldFormatInspector>) -> Self {
        self.inspector = inspector;
        self
    }
}

impl ResourceClient for RestClient {
    fn get_resource(&self, type_url: &str) -> Arc<dyn EntityResource> {
        Arc::new(RestResource {
            api_base: self.config.api_base.clone(),
            type_url: type_url.to_string(),
            http_client: self.http_client.clone(),
            inspector: Arc::clone(&self.inspector),
        })
    }
}

struct RestResource {
    api_base: String,
    type_url: String,
    http_client: reqwest::Client,
    inspector: Arc<dyn FieldFormatInspector>,
}

impl RestResource {
    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let url = response.url().to_string();
            warn!(target: "resource", status = status.as_u16(), url = %url, "Request failed");
            return Err(MeshscopeError::Status {
                status: status.as_u16(),
                url,
            });
        }
        Ok(response.json::<Value>().await?)
    }

    // create without an id (or with id 0), update with one
    fn save_route(&self, record: &Map<String, Value>) -> (Method, String) {
        match record_id(record).filter(|id| *id != 0) {
            Some(id) => (
                Method::PUT,
                resource_url(&self.api_base, &self.type_url, Some(id)),
            ),
            None => (
                Method::POST,
                resource_url(&self.api_base, &self.type_url, None),
            ),
        }
    }
}

#[async_trait]
impl EntityResource for RestResource {
    async fn query(&self) -> Result<Vec<Value>> {
        let url = resource_url(&self.api_base, &self.type_url, None);
        debug!(target: "resource", url = %url, "GET collection");

        let response = self.http_client.get(&url).send().await?;
        normalize_list(Self::read_json(response).await?)
    }

    async fn save(&self, record: Map<String, Value>) -> Result<Value> {
        let record = prepare_for_save(record, self.inspector.as_ref());
        let (method, url) = self.save_route(&record);
        debug!(target: "resource", method = %method, url = %url, "Saving record");

        let response = self
            .http_client
            .request(method, url)
            .json(&record)
            .send()
            .await?;
        Self::read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_list_accepts_envelope_and_array() {
        let raw = normalize_list(json!([{"id": 1}, {"id": 2}])).unwrap();
        assert_eq!(raw.len(), 2);

        let wrapped = normalize_list(json!({"items": [{"id": 3}]})).unwrap();
        assert_eq!(wrapped, vec![json!({"id": 3})]);

        assert!(normalize_list(json!({"count": 0})).is_err());
        assert!(normalize_list(json!("nope")).is_err());
    }

    #[test]
    fn test_resource_url() {
        assert_eq!(
            resource_url("http://api/xosapi/v1/", "/core/services", None),
            "http://api/xosapi/v1/core/services/"
        );
        assert_eq!(
            resource_url("http://api/xosapi/v1", "/core/services", Some(4)),
            "http://api/xosapi/v1/core/services/4/"
        );
    }

    #[test]
    fn test_url_from_core_model() {
        assert_eq!(url_from_core_model("Service"), "/core/services");
        assert_eq!(url_from_core_model("Tenantroot"), "/core/tenantroots");
        assert_eq!(
            url_from_core_model("ServiceDependency"),
            "/core/servicedependencies"
        );
        assert_eq!(url_from_core_model("Network"), "/core/networks");
    }

    #[test]
    fn test_prepare_for_save_converts_dates() {
        let record = json!({
            "id": 1,
            "name": "vsg",
            "created": "2017-03-01T00:00:00Z",
            "expires": "2017-03-02",
            "enabled": true
        });
        let Value::Object(map) = record else {
            unreachable!()
        };
        let saved = prepare_for_save(map, &DateFieldInspector);

        assert_eq!(saved["created"], json!(1_488_326_400_000_i64));
        assert_eq!(saved["expires"], json!(1_488_412_800_000_i64));
        assert_eq!(saved["name"], json!("vsg"));
        assert_eq!(saved["enabled"], json!(true));
    }

    #[test]
    fn test_save_route_picks_verb_by_id() {
        let resource = RestResource {
            api_base: "http://api/xosapi/v1".to_string(),
            type_url: "/core/services".to_string(),
            http_client: reqwest::Client::new(),
            inspector: Arc::new(DateFieldInspector),
        };

        let Value::Object(new_record) = json!({"name": "vsg"}) else {
            unreachable!()
        };
        let (method, url) = resource.save_route(&new_record);
        assert_eq!(method, Method::POST);
        assert_eq!(url, "http://api/xosapi/v1/core/services/");

        let Value::Object(existing) = json!({"id": 12, "name": "vsg"}) else {
            unreachable!()
        };
        let (method, url) = resource.save_route(&existing);
        assert_eq!(method, Method::PUT);
        assert_eq!(url, "http://api/xosapi/v1/core/services/12/");

        let Value::Object(string_id) = json!({"id": "12"}) else {
            unreachable!()
        };
        let (method, url) = resource.save_route(&string_id);
        assert_eq!(method, Method::PUT);
        assert_eq!(url, "http://api/xosapi/v1/core/services/12/");

        let Value::Object(zero_id) = json!({"id": 0, "name": "vsg"}) else {
            unreachable!()
        };
        let (method, url) = resource.save_route(&zero_id);
        assert_eq!(method, Method::POST);
        assert_eq!(url, "http://api/xosapi/v1/core/services/");
    }

    struct PlainText;

    impl FieldFormatInspector for PlainText {
        fn field_format(&self, _value: &Value) -> FieldFormat {
            FieldFormat::Text
        }
    }

    #[test]
    fn test_custom_inspector_controls_date_conversion() {
        let client = RestClient::new(ResourceConfig::default()).with_inspector(Arc::new(PlainText));
        let Value::Object(map) = json!({"id": 1, "created": "2017-03-01"}) else {
            unreachable!()
        };
        let saved = prepare_for_save(map, client.inspector.as_ref());
        assert_eq!(saved["created"], json!("2017-03-01"));
    }

    #[test]
    fn test_inspector_formats() {
        let i = DateFieldInspector;
        assert_eq!(i.field_format(&json!("hello")), FieldFormat::Text);
        assert_eq!(i.field_format(&json!(3)), FieldFormat::Number);
        assert_eq!(i.field_format(&json!(null)), FieldFormat::Null);
        assert_eq!(i.field_format(&json!("2020-01-01")), FieldFormat::Date);
    }
}
