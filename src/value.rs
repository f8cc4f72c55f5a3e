//! Structured task results.
//!
//! Daemon outputs arrive as JSON and come in several shapes: bare scalars,
//! lists, mappings and stored data nodes that remember their type. Comparing
//! them against expectations is done structurally per shape instead of on the
//! raw JSON text.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;

/// JSON key carrying the type name of a stored data node
pub const NODE_TYPE_KEY: &str = "$node";
/// JSON key carrying the payload of a stored data node
pub const NODE_VALUE_KEY: &str = "$value";

#[derive(Debug, Clone)]
pub enum ResultValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ResultValue>),
    Mapping(BTreeMap<String, ResultValue>),
    /// A stored data node: a payload tagged with the daemon-side type name
    Node {
        type_name: String,
        value: Box<ResultValue>,
    },
}

impl ResultValue {
    pub fn str(value: impl Into<String>) -> Self {
        ResultValue::Str(value.into())
    }

    pub fn node(type_name: &str, value: ResultValue) -> Self {
        ResultValue::Node {
            type_name: type_name.to_string(),
            value: Box::new(value),
        }
    }

    pub fn mapping<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ResultValue)>,
    {
        ResultValue::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn list<I: IntoIterator<Item = ResultValue>>(items: I) -> Self {
        ResultValue::List(items.into_iter().collect())
    }

    /// Short name of the shape, used in mismatch reports
    pub fn type_name(&self) -> &str {
        match self {
            ResultValue::Null => "null",
            ResultValue::Bool(_) => "bool",
            ResultValue::Int(_) => "int",
            ResultValue::Float(_) => "float",
            ResultValue::Str(_) => "str",
            ResultValue::List(_) => "list",
            ResultValue::Mapping(_) => "mapping",
            ResultValue::Node { type_name, .. } => type_name,
        }
    }

    /// The payload of a data node, or the value itself
    pub fn unwrap_node(&self) -> &ResultValue {
        match self {
            ResultValue::Node { value, .. } => value.unwrap_node(),
            other => other,
        }
    }

    pub fn get(&self, key: &str) -> Option<&ResultValue> {
        match self.unwrap_node() {
            ResultValue::Mapping(map) => map.get(key),
            _ => None,
        }
    }

    /// Walk a dotted path of mapping keys, e.g. `add.settings.allow_negative`
    pub fn lookup(&self, path: &str) -> Option<&ResultValue> {
        path.split('.').try_fold(self, |current, key| current.get(key))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.unwrap_node() {
            ResultValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.unwrap_node() {
            ResultValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.unwrap_node() {
            ResultValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Turn a list of `[name, content]` pairs into a mapping.
    ///
    /// Returns `None` when the value is not such a list.
    pub fn pairs_to_mapping(&self) -> Option<ResultValue> {
        let ResultValue::List(items) = self.unwrap_node() else {
            return None;
        };

        let mut map = BTreeMap::new();
        for item in items {
            match item.unwrap_node() {
                ResultValue::List(pair) if pair.len() == 2 => {
                    let key = pair[0].as_str()?;
                    map.insert(key.to_string(), pair[1].clone());
                }
                _ => return None,
            }
        }
        Some(ResultValue::Mapping(map))
    }

    pub fn to_json(&self) -> Value {
        match self {
            ResultValue::Null => Value::Null,
            ResultValue::Bool(b) => Value::Bool(*b),
            ResultValue::Int(i) => Value::Number(Number::from(*i)),
            ResultValue::Float(f) => Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ResultValue::Str(s) => Value::String(s.clone()),
            ResultValue::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            ResultValue::Mapping(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
            ResultValue::Node { type_name, value } => {
                let mut object = Map::new();
                object.insert(NODE_TYPE_KEY.to_string(), Value::String(type_name.clone()));
                object.insert(NODE_VALUE_KEY.to_string(), value.to_json());
                Value::Object(object)
            }
        }
    }

    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }

    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(raw)?;
        Ok(ResultValue::from(value))
    }
}

impl From<Value> for ResultValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ResultValue::Null,
            Value::Bool(b) => ResultValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ResultValue::Int(i),
                None => ResultValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => ResultValue::Str(s),
            Value::Array(items) => {
                ResultValue::List(items.into_iter().map(ResultValue::from).collect())
            }
            Value::Object(mut object) => {
                let is_node = object.len() == 2
                    && object.get(NODE_TYPE_KEY).is_some_and(Value::is_string)
                    && object.contains_key(NODE_VALUE_KEY);
                if is_node {
                    let type_name = match object.remove(NODE_TYPE_KEY) {
                        Some(Value::String(s)) => s,
                        _ => String::new(),
                    };
                    let value = object.remove(NODE_VALUE_KEY).unwrap_or(Value::Null);
                    return ResultValue::Node {
                        type_name,
                        value: Box::new(ResultValue::from(value)),
                    };
                }
                ResultValue::Mapping(
                    object
                        .into_iter()
                        .map(|(k, v)| (k, ResultValue::from(v)))
                        .collect(),
                )
            }
        }
    }
}

impl From<i64> for ResultValue {
    fn from(value: i64) -> Self {
        ResultValue::Int(value)
    }
}

impl From<bool> for ResultValue {
    fn from(value: bool) -> Self {
        ResultValue::Bool(value)
    }
}

impl From<&str> for ResultValue {
    fn from(value: &str) -> Self {
        ResultValue::Str(value.to_string())
    }
}

/// Structural equality.
///
/// Data nodes compare equal to a bare value when their payload does, two nodes
/// additionally need the same type name, and integers compare numerically with
/// floats.
impl PartialEq for ResultValue {
    fn eq(&self, other: &Self) -> bool {
        use ResultValue::*;
        match (self, other) {
            (
                Node {
                    type_name: left_type,
                    value: left,
                },
                Node {
                    type_name: right_type,
                    value: right,
                },
            ) => left_type == right_type && left == right,
            (Node { value, .. }, plain) | (plain, Node { value, .. }) => value.as_ref() == plain,
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(i), Float(f)) | (Float(f), Int(i)) => (*i as f64) == *f,
            (Str(a), Str(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Mapping(a), Mapping(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Serialize for ResultValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ResultValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(ResultValue::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Test the purpose of ResultValue: JSON shapes map onto the right tags
    #[test]
    fn test_from_json_shapes() {
        assert_eq!(ResultValue::from(json!(null)), ResultValue::Null);
        assert!(matches!(ResultValue::from(json!(3)), ResultValue::Int(3)));
        assert!(matches!(ResultValue::from(json!(2.5)), ResultValue::Float(_)));
        assert!(matches!(ResultValue::from(json!([1, 2])), ResultValue::List(_)));
        assert!(matches!(
            ResultValue::from(json!({"a": 1})),
            ResultValue::Mapping(_)
        ));

        let node = ResultValue::from(json!({"$node": "Int", "$value": 2}));
        match node {
            ResultValue::Node { type_name, value } => {
                assert_eq!(type_name, "Int");
                assert!(matches!(*value, ResultValue::Int(2)));
            }
            other => panic!("expected node, got {other:?}"),
        }
    }

    #[test]
    fn test_object_with_extra_keys_is_a_mapping() {
        let value = ResultValue::from(json!({"$node": "Int", "$value": 2, "extra": true}));
        assert!(matches!(value, ResultValue::Mapping(_)));
    }

    #[test]
    fn test_json_round_trip_keeps_nodes() {
        let value = ResultValue::mapping([
            ("sum", ResultValue::node("Int", ResultValue::Int(5))),
            ("tags", ResultValue::list([ResultValue::str("a")])),
        ]);
        let back = ResultValue::from_json_str(&value.to_json_string()).unwrap();
        assert_eq!(back, value);
        assert_eq!(back.lookup("sum").and_then(ResultValue::as_i64), Some(5));
    }

    /// Test the expected behavior: nodes compare by payload against bare values
    #[test]
    fn test_node_equality_rules() {
        let int_node = ResultValue::node("Int", ResultValue::Int(2));
        assert_eq!(int_node, ResultValue::Int(2));
        assert_eq!(ResultValue::Int(2), int_node);
        assert_ne!(int_node, ResultValue::Int(3));
        assert_ne!(int_node, ResultValue::node("Float", ResultValue::Int(2)));
        assert_eq!(int_node, ResultValue::node("Int", ResultValue::Int(2)));
    }

    #[test]
    fn test_numeric_equality_crosses_int_and_float() {
        assert_eq!(ResultValue::Int(10), ResultValue::Float(10.0));
        assert_ne!(ResultValue::Int(10), ResultValue::Float(10.5));
        assert_ne!(ResultValue::Int(1), ResultValue::Bool(true));
        assert_ne!(ResultValue::Str("1".into()), ResultValue::Int(1));
    }

    #[test]
    fn test_mapping_and_list_equality_is_structural() {
        let left = ResultValue::mapping([
            ("value", ResultValue::Int(10)),
            (
                "artifacts",
                ResultValue::mapping([("triple_value", ResultValue::str("15"))]),
            ),
        ]);
        let right = ResultValue::from(json!({
            "artifacts": {"triple_value": "15"},
            "value": 10
        }));
        assert_eq!(left, right);

        let reordered = ResultValue::list([ResultValue::Int(2), ResultValue::Int(4)]);
        assert_ne!(
            reordered,
            ResultValue::list([ResultValue::Int(4), ResultValue::Int(2)])
        );
    }

    #[test]
    fn test_pairs_to_mapping() {
        let pairs = ResultValue::from(json!([["triple_value", "15"], ["other", "1"]]));
        assert_eq!(
            pairs.pairs_to_mapping(),
            Some(ResultValue::from(json!({"triple_value": "15", "other": "1"})))
        );

        assert_eq!(ResultValue::from(json!([["a"]])).pairs_to_mapping(), None);
        assert_eq!(ResultValue::from(json!([[1, "x"]])).pairs_to_mapping(), None);
        assert_eq!(ResultValue::from(json!({"a": 1})).pairs_to_mapping(), None);
        assert_eq!(
            ResultValue::from(json!([])).pairs_to_mapping(),
            Some(ResultValue::Mapping(BTreeMap::new()))
        );
    }

    #[test]
    fn test_type_names_for_reports() {
        assert_eq!(ResultValue::Int(1).type_name(), "int");
        assert_eq!(ResultValue::list([]).type_name(), "list");
        assert_eq!(
            ResultValue::node("List", ResultValue::list([])).type_name(),
            "List"
        );
    }

    #[test]
    fn test_non_finite_floats_serialize_as_null() {
        assert_eq!(ResultValue::Float(f64::INFINITY).to_json(), json!(null));
    }

    #[test]
    fn test_serde_uses_json_representation() {
        let value = ResultValue::node("Str", ResultValue::str("hi"));
        let encoded = serde_json::to_string(&value).unwrap();
        assert_eq!(encoded, r#"{"$node":"Str","$value":"hi"}"#);
        let decoded: ResultValue = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, value);
    }
}
