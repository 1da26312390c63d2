//! Request/response bodies shared by the tunnel server and client.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Body of a successful `GET`.
///
/// `value` is omitted when nothing is stored at `key`; a stored `null` is
/// sent as `"value": null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetResponse {
    pub key: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub value: Option<Value>,
}

/// Body of a `POST`. The path in the URL decides where the value goes;
/// `key` is informational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Value,
}

impl SetRequest {
    /// Interpret an already-parsed POST body. Only an object can carry
    /// `key` and `value`; any other JSON document is a body without a value.
    pub fn from_body(body: Value) -> Self {
        let Value::Object(mut fields) = body else {
            return Self {
                key: None,
                value: Value::Null,
            };
        };
        Self {
            key: fields
                .remove("key")
                .and_then(|key| key.as_str().map(str::to_string)),
            value: fields.remove("value").unwrap_or(Value::Null),
        }
    }
}

// A present field (even `null`) is `Some`; `default` covers the absent case.
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_get_response_miss_omits_value() {
        let miss = GetResponse {
            key: "foo".to_string(),
            value: None,
        };
        assert_eq!(serde_json::to_value(&miss).unwrap(), json!({"key": "foo"}));
    }

    #[test]
    fn test_get_response_null_vs_absent() {
        let null: GetResponse = serde_json::from_str(r#"{"key":"a","value":null}"#).unwrap();
        assert_eq!(null.value, Some(Value::Null));

        let absent: GetResponse = serde_json::from_str(r#"{"key":"a"}"#).unwrap();
        assert_eq!(absent.value, None);
    }

    #[test]
    fn test_set_request_defaults() {
        let req: SetRequest = serde_json::from_str(r#"{"value": [1, 2]}"#).unwrap();
        assert_eq!(req.key, None);
        assert_eq!(req.value, json!([1, 2]));

        let empty: SetRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.value, Value::Null);
    }

    #[test]
    fn test_set_request_from_object_body() {
        let req = SetRequest::from_body(json!({"key": "foo", "value": {"a": 1}}));
        assert_eq!(req.key.as_deref(), Some("foo"));
        assert_eq!(req.value, json!({"a": 1}));

        let req = SetRequest::from_body(json!({"key": 5, "value": null}));
        assert_eq!(req.key, None);
        assert_eq!(req.value, Value::Null);
    }

    #[test]
    fn test_set_request_from_non_object_body() {
        for body in [json!("test"), json!(42), json!([1, 2]), json!(["k", 5]), Value::Null] {
            let req = SetRequest::from_body(body.clone());
            assert_eq!(req.key, None, "body {body}");
            assert_eq!(req.value, Value::Null, "body {body}");
        }
    }
}
