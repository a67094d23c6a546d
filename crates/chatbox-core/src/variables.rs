use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    #[default]
    Any,
    String,
    Number,
    Boolean,
    Object,
    ArrayString,
    ArrayNumber,
    ArrayBoolean,
    ArrayObject,
    ArrayAny,
}

impl ValueType {
    pub fn is_array(self) -> bool {
        matches!(
            self,
            Self::ArrayString
                | Self::ArrayNumber
                | Self::ArrayBoolean
                | Self::ArrayObject
                | Self::ArrayAny
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDecl {
    pub key: String,
    #[serde(default)]
    pub value_type: ValueType,
    #[serde(default)]
    pub default_value: Option<Value>,
}

/// Form state for workflow variables, keyed by variable name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariablesStore {
    values: BTreeMap<String, Value>,
}

impl VariablesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Hand-off point for `VariablesUpdate` stream events.
    pub fn apply_update(&mut self, update: BTreeMap<String, Value>) {
        self.values.extend(update);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

/// Variables sent with a prompt: declared keys only, blanks replaced by the
/// declared default, every value coerced to its declared type.
pub fn request_variables(decls: &[VariableDecl], store: &VariablesStore) -> BTreeMap<String, Value> {
    decls
        .iter()
        .map(|decl| {
            let value = match store.get(&decl.key) {
                None | Some(Value::Null) => decl.default_value.clone(),
                Some(Value::String(text)) if text.is_empty() => decl.default_value.clone(),
                Some(value) => Some(value.clone()),
            };
            let formatted = value
                .map(|value| format_value(value, decl.value_type))
                .unwrap_or(Value::Null);
            (decl.key.clone(), formatted)
        })
        .collect()
}

pub fn format_value(value: Value, value_type: ValueType) -> Value {
    if value.is_null() || value_type == ValueType::Any {
        return value;
    }
    if already_matches(&value, value_type) {
        return value;
    }

    match value_type {
        ValueType::String => match value {
            Value::String(_) => value,
            other if other.is_object() || other.is_array() => {
                Value::String(other.to_string())
            }
            Value::Bool(flag) => Value::String(flag.to_string()),
            Value::Number(number) => Value::String(number.to_string()),
            other => Value::String(other.to_string()),
        },
        ValueType::Number => match &value {
            Value::String(text) if text.trim().is_empty() => Value::Null,
            Value::String(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Value::Bool(flag) => Value::from(u8::from(*flag)),
            _ => Value::Null,
        },
        ValueType::Boolean => match &value {
            Value::String(text) => Value::Bool(text.eq_ignore_ascii_case("true")),
            Value::Number(number) => Value::Bool(number.as_f64().is_some_and(|n| n != 0.0)),
            _ => Value::Bool(true),
        },
        ValueType::Object if value.is_array() => value,
        ValueType::Object => {
            parse_json_text(&value).unwrap_or_else(|| Value::Object(serde_json::Map::new()))
        }
        array_type if array_type.is_array() => {
            parse_json_text(&value).unwrap_or_else(|| Value::Array(vec![value]))
        }
        _ => value,
    }
}

fn already_matches(value: &Value, value_type: ValueType) -> bool {
    match value_type {
        ValueType::Any => true,
        ValueType::String => value.is_string(),
        ValueType::Number => value.is_number(),
        ValueType::Boolean => value.is_boolean(),
        ValueType::Object => value.is_object(),
        other => other.is_array() && value.is_array(),
    }
}

/// Object and array literals typed by hand: JSON5 accepts unquoted keys,
/// single quotes and trailing commas.
fn parse_json_text(value: &Value) -> Option<Value> {
    let text = value.as_str()?.trim();
    let looks_like_json = (text.starts_with('{') && text.ends_with('}'))
        || (text.starts_with('[') && text.ends_with(']'));
    if !looks_like_json {
        return None;
    }
    json5::from_str(text).ok()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn decl(key: &str, value_type: ValueType, default_value: Option<Value>) -> VariableDecl {
        VariableDecl {
            key: key.to_string(),
            value_type,
            default_value,
        }
    }

    #[test]
    fn update_merges_by_key() {
        let mut store = VariablesStore::new();
        store.set("a", json!(1));
        store.apply_update(BTreeMap::from([
            ("b".to_string(), json!(2)),
            ("a".to_string(), json!(3)),
        ]));
        assert_eq!(store.get("a"), Some(&json!(3)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn only_declared_variables_are_sent() {
        let mut store = VariablesStore::new();
        store.set("city", json!("Lisbon"));
        store.set("undeclared", json!("x"));

        let sent = request_variables(&[decl("city", ValueType::String, None)], &store);

        assert_eq!(sent, BTreeMap::from([("city".to_string(), json!("Lisbon"))]));
    }

    #[test]
    fn blank_values_fall_back_to_default() {
        let mut store = VariablesStore::new();
        store.set("limit", json!(""));

        let sent = request_variables(
            &[
                decl("limit", ValueType::Number, Some(json!("5"))),
                decl("missing", ValueType::Boolean, Some(json!("true"))),
                decl("none", ValueType::String, None),
            ],
            &store,
        );

        assert_eq!(sent["limit"], json!(5.0));
        assert_eq!(sent["missing"], json!(true));
        assert_eq!(sent["none"], Value::Null);
    }

    #[test]
    fn strings_coerce_to_structured_types() {
        assert_eq!(
            format_value(json!("{\"a\": 1}"), ValueType::Object),
            json!({ "a": 1 })
        );
        assert_eq!(format_value(json!("oops"), ValueType::Object), json!({}));
        assert_eq!(
            format_value(json!("[1, 2]"), ValueType::ArrayNumber),
            json!([1, 2])
        );
        assert_eq!(format_value(json!("solo"), ValueType::ArrayString), json!(["solo"]));
    }

    #[test]
    fn hand_typed_literals_are_parsed_leniently() {
        assert_eq!(format_value(json!("{a: 1}"), ValueType::Object), json!({ "a": 1 }));
        assert_eq!(
            format_value(json!(" {'name': 'x', list: [1, 2,],} "), ValueType::Object),
            json!({ "name": "x", "list": [1, 2] })
        );
        assert_eq!(
            format_value(json!("['a', 'b']"), ValueType::ArrayString),
            json!(["a", "b"])
        );
    }

    #[test]
    fn array_value_is_kept_for_object_type() {
        assert_eq!(format_value(json!([1, 2]), ValueType::Object), json!([1, 2]));
        assert_eq!(format_value(json!("[1, 2]"), ValueType::Object), json!([1, 2]));
    }

    #[test]
    fn structured_values_coerce_to_string() {
        assert_eq!(
            format_value(json!({ "a": 1 }), ValueType::String),
            json!("{\"a\":1}")
        );
        assert_eq!(format_value(json!(false), ValueType::String), json!("false"));
    }

    #[test]
    fn matching_values_pass_through() {
        assert_eq!(format_value(json!(7), ValueType::Number), json!(7));
        assert_eq!(format_value(json!([1]), ValueType::ArrayAny), json!([1]));
        assert_eq!(format_value(json!("x"), ValueType::Any), json!("x"));
    }
}
