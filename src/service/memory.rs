//! In-process `RestDriver` over JSON records, one table per resource.

use crate::context::{ReadContext, WriteContext};
use crate::endpoint::EndpointConfig;
use crate::filter::apply_filter;
use crate::response::{error, json, json_list, json_with_status, not_found, ApiError};
use crate::service::driver::{DriverMethod, DriverResult, RestDriver};
use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

type Tables = HashMap<String, Vec<Value>>;

#[derive(Clone, Debug, Default)]
pub struct MemoryDriver {
    tables: Arc<RwLock<Tables>>,
    allowed: Option<BTreeSet<DriverMethod>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same store, but only `methods` are reported as supported.
    pub fn only(mut self, methods: &[DriverMethod]) -> Self {
        self.allowed = Some(methods.iter().copied().collect());
        self
    }

    /// Replace the records of `table`.
    pub async fn seed(&self, table: &str, records: Vec<Value>) {
        self.tables.write().await.insert(table.to_string(), records);
    }

    /// Snapshot of `table`, in insertion order.
    pub async fn records(&self, table: &str) -> Vec<Value> {
        self.tables
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

/// Table for a resource: the `table` extra if set, else the resource name.
fn table_of(config: &EndpointConfig) -> String {
    config
        .extra("table")
        .and_then(Value::as_str)
        .unwrap_or(&config.name)
        .to_string()
}

/// Keys compare as text so `/users/1` finds both `"1"` and `1`.
fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn position(records: &[Value], key: &str, id: &str) -> Option<usize> {
    records
        .iter()
        .position(|r| r.get(key).and_then(key_text).as_deref() == Some(id))
}

fn object(body: &Value) -> Map<String, Value> {
    match body {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    }
}

#[async_trait]
impl RestDriver for MemoryDriver {
    fn supports(&self, method: DriverMethod) -> bool {
        let crud = DriverMethod::CRUD.contains(&method);
        match &self.allowed {
            Some(allowed) => crud && allowed.contains(&method),
            None => crud,
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_all(&self, ctx: &ReadContext, config: &EndpointConfig) -> DriverResult {
        let records = self.records(&table_of(config)).await;
        let (data, meta) = apply_filter(records, ctx.filter.as_ref());
        Ok(json_list(data, meta))
    }

    async fn get_one(&self, _ctx: &ReadContext, config: &EndpointConfig, id: &str) -> DriverResult {
        let tables = self.tables.read().await;
        let key = config.key();
        let found = tables
            .get(&table_of(config))
            .and_then(|records| position(records, key, id).map(|i| records[i].clone()));
        Ok(match found {
            Some(record) => json(record),
            None => not_found(Some(key)),
        })
    }

    async fn create(&self, _ctx: &WriteContext, config: &EndpointConfig, body: &Value) -> DriverResult {
        let key = config.key();
        let mut record = object(body);
        let id = match record.get(key).and_then(key_text) {
            Some(id) => id,
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                record.insert(key.to_string(), Value::String(id.clone()));
                id
            }
        };
        let mut tables = self.tables.write().await;
        let records = tables.entry(table_of(config)).or_default();
        if position(records, key, &id).is_some() {
            return Ok(error(
                vec![ApiError::new("conflict", key, format!("{} already exists", id))],
                StatusCode::CONFLICT,
            ));
        }
        let record = Value::Object(record);
        records.push(record.clone());
        tracing::debug!(resource = %config.name, %id, "record created");
        Ok(json_with_status(record, StatusCode::CREATED))
    }

    async fn update(
        &self,
        _ctx: &WriteContext,
        config: &EndpointConfig,
        id: &str,
        body: &Value,
    ) -> DriverResult {
        let key = config.key();
        let mut tables = self.tables.write().await;
        let Some(records) = tables.get_mut(&table_of(config)) else {
            return Ok(not_found(Some(key)));
        };
        let Some(i) = position(records, key, id) else {
            return Ok(not_found(Some(key)));
        };
        let record = &mut records[i];
        if let Value::Object(fields) = record {
            for (name, value) in object(body) {
                if name != key {
                    fields.insert(name, value);
                }
            }
        }
        Ok(json(record.clone()))
    }

    async fn replace(
        &self,
        _ctx: &WriteContext,
        config: &EndpointConfig,
        id: &str,
        body: &Value,
    ) -> DriverResult {
        let key = config.key();
        let mut tables = self.tables.write().await;
        let Some(records) = tables.get_mut(&table_of(config)) else {
            return Ok(not_found(Some(key)));
        };
        let Some(i) = position(records, key, id) else {
            return Ok(not_found(Some(key)));
        };
        let record = &mut records[i];
        let mut fresh = object(body);
        if let Some(original) = record.get(key) {
            fresh.insert(key.to_string(), original.clone());
        }
        *record = Value::Object(fresh);
        Ok(json(record.clone()))
    }

    async fn delete_one(&self, _ctx: &ReadContext, config: &EndpointConfig, id: &str) -> DriverResult {
        let key = config.key();
        let mut tables = self.tables.write().await;
        let removed = tables
            .get_mut(&table_of(config))
            .and_then(|records| position(records, key, id).map(|i| records.remove(i)));
        Ok(match removed {
            Some(record) => json(record),
            None => not_found(Some(key)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use axum::http::Method;
    use serde_json::json;
    use url::Url;

    fn ctx() -> ReadContext {
        ReadContext::new(Method::GET, Url::parse("http://localhost/api/users").unwrap())
    }

    fn write(body: Value) -> WriteContext {
        WriteContext { read: ctx(), body }
    }

    #[tokio::test]
    async fn create_assigns_key_and_rejects_duplicates() {
        let driver = MemoryDriver::new();
        let config = EndpointConfig::new("users");
        let created = driver
            .create(&write(json!({"name": "Ada"})), &config, &json!({"name": "Ada"}))
            .await
            .unwrap();
        assert_eq!(created.status, StatusCode::CREATED);
        let id = created.body["id"].as_str().unwrap().to_string();
        assert_eq!(id.len(), 36);

        let body = json!({"id": id, "name": "Again"});
        let dup = driver.create(&write(body.clone()), &config, &body).await.unwrap();
        assert_eq!(dup.status, StatusCode::CONFLICT);
        assert_eq!(driver.records("users").await.len(), 1);
    }

    #[tokio::test]
    async fn update_merges_and_replace_keeps_key() {
        let driver = MemoryDriver::new();
        let config = EndpointConfig::new("users").with_primary_key("uid");
        driver
            .seed("users", vec![json!({"uid": 7, "name": "Ada", "age": 36})])
            .await;

        let patch = json!({"age": 37, "uid": 99});
        let updated = driver.update(&write(patch.clone()), &config, "7", &patch).await.unwrap();
        assert_eq!(updated.body, json!({"uid": 7, "name": "Ada", "age": 37}));

        let put = json!({"name": "Grace"});
        let replaced = driver.replace(&write(put.clone()), &config, "7", &put).await.unwrap();
        assert_eq!(replaced.body, json!({"uid": 7, "name": "Grace"}));
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let driver = MemoryDriver::new();
        let config = EndpointConfig::new("users");
        let read = driver.get_one(&ctx(), &config, "nope").await.unwrap();
        assert_eq!(read.status, StatusCode::NOT_FOUND);
        assert_eq!(read.body["errors"][0]["field"], "id");
        let deleted = driver.delete_one(&ctx(), &config, "nope").await.unwrap();
        assert!(!deleted.ok);
    }

    #[tokio::test]
    async fn get_all_filters_and_reports_meta() {
        let driver = MemoryDriver::new();
        let config = EndpointConfig::new("people").with_extra("table", "humans");
        driver
            .seed(
                "humans",
                vec![
                    json!({"id": 1, "age": 20}),
                    json!({"id": 2, "age": 40}),
                    json!({"id": 3, "age": 60}),
                ],
            )
            .await;
        let mut ctx = ctx();
        ctx.filter = Filter::parse(r#"{"where": {"age": {"gt": 30}}, "limit": 1, "order": ["age:desc"]}"#);
        let listed = driver.get_all(&ctx, &config).await.unwrap();
        assert!(listed.multiple);
        assert_eq!(listed.body["data"], json!([{"id": 3, "age": 60}]));
        assert_eq!(listed.body["meta"]["total"], 2);
        assert_eq!(listed.body["meta"]["limit"], 1);
    }

    #[test]
    fn restricted_driver_reports_subset() {
        let driver = MemoryDriver::new().only(&[DriverMethod::GetAll]);
        assert!(driver.supports(DriverMethod::GetAll));
        assert!(!driver.supports(DriverMethod::Create));
        assert!(!MemoryDriver::new().supports(DriverMethod::Post));
    }
}
