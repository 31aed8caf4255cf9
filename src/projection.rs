//! Field projection for `select`: `true` keeps a key, a nested object recurses into the value.

use serde_json::{Map, Value};

/// Project one record. Non-object records are returned unchanged; arrays are projected element-wise.
pub fn select(entity: &Value, fields: &Value) -> Value {
    match (entity, fields) {
        (Value::Object(record), Value::Object(fields)) => Value::Object(project(record, fields)),
        (Value::Array(items), Value::Object(_)) => Value::Array(select_all(items, fields)),
        _ => entity.clone(),
    }
}

pub fn select_all(entities: &[Value], fields: &Value) -> Vec<Value> {
    entities.iter().map(|e| select(e, fields)).collect()
}

fn project(record: &Map<String, Value>, fields: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, sel) in fields {
        match sel {
            Value::Bool(true) => {
                if let Some(v) = record.get(key) {
                    out.insert(key.clone(), v.clone());
                }
            }
            Value::Object(_) => match record.get(key) {
                Some(v @ (Value::Object(_) | Value::Array(_))) => {
                    out.insert(key.clone(), select(v, sel));
                }
                Some(v) => {
                    tracing::warn!(key = %key, "selection mismatch: expected an object");
                    out.insert(key.clone(), v.clone());
                }
                None => {}
            },
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_only_selected_keys() {
        let user = json!({"id": 1, "name": "Ada", "password": "x"});
        assert_eq!(select(&user, &json!({"id": true, "name": true})), json!({"id": 1, "name": "Ada"}));
    }

    #[test]
    fn recurses_into_objects_and_arrays() {
        let post = json!({
            "title": "Notes",
            "author": {"id": 1, "name": "Ada", "email": "a@x"},
            "comments": [{"id": 1, "body": "hi", "spam": false}, {"id": 2, "body": "yo"}]
        });
        let fields = json!({"author": {"name": true}, "comments": {"body": true}});
        assert_eq!(
            select(&post, &fields),
            json!({"author": {"name": "Ada"}, "comments": [{"body": "hi"}, {"body": "yo"}]})
        );
    }

    #[test]
    fn mismatch_keeps_raw_value() {
        let record = json!({"author": "Ada"});
        assert_eq!(select(&record, &json!({"author": {"name": true}})), record);
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(select(&json!("plain"), &json!({"a": true})), json!("plain"));
        assert_eq!(select_all(&[json!({"a": 1, "b": 2})], &json!({"b": true})), vec![json!({"b": 2})]);
    }
}
