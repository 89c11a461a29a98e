//! Endpoint + parameter values → request descriptor
//!
//! Only values whose key matches a declared parameter are forwarded; every
//! failure here happens before anything touches the network.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::RequestError;
use crate::spec::{EndpointRecord, Method, ParamLocation};

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Reserved key in the value map that carries the JSON payload.
pub const BODY_KEY: &str = "body";

/// What to do with a `{name}` placeholder that has no value and whose
/// parameter is not marked required.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderPolicy {
    /// Leave the literal `{name}` in the URL.
    #[default]
    Lenient,
    /// Refuse to build the request.
    Strict,
}

/// Per-request settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct RequestOptions {
    pub timeout: Duration,
    pub placeholder_policy: PlaceholderPolicy,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            placeholder_policy: PlaceholderPolicy::Lenient,
        }
    }
}

impl RequestOptions {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn placeholder_policy(mut self, policy: PlaceholderPolicy) -> Self {
        self.placeholder_policy = policy;
        self
    }
}

/// A fully resolved request, ready to hand to the transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Absolute URL with path placeholders substituted
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    #[serde(rename = "timeoutSecs", serialize_with = "serialize_secs")]
    pub timeout: Duration,
}

fn serialize_secs<S: Serializer>(timeout: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(timeout.as_secs_f64())
}

/// Build a request for `endpoint` from a bag of named values.
///
/// * query / header parameters become query pairs / headers
/// * path parameters are percent-encoded into their `{name}` placeholder
/// * the payload is `body` if given, else the reserved [`BODY_KEY`] value,
///   else the value of a declared `in: body` parameter
///
/// Keys that match no declared parameter are dropped, as are parameters
/// whose location is not one of the four above.
pub fn build_request(
    base_url: &str,
    endpoint: &EndpointRecord,
    values: &Map<String, Value>,
    body: Option<Value>,
    options: &RequestOptions,
) -> Result<RequestDescriptor, RequestError> {
    let mut query = Vec::new();
    let mut headers = Vec::new();
    let mut path_values: HashMap<&str, String> = HashMap::new();
    let mut body_param = None;

    for param in &endpoint.parameters {
        let Some(value) = values.get(&param.name).filter(|v| !v.is_null()) else {
            continue;
        };

        match &param.location {
            ParamLocation::Query => match value {
                // Repeated key per element: ?tag=a&tag=b
                Value::Array(items) => query.extend(
                    items
                        .iter()
                        .filter(|v| !v.is_null())
                        .map(|v| (param.name.clone(), value_to_string(v))),
                ),
                _ => query.push((param.name.clone(), value_to_string(value))),
            },
            ParamLocation::Path => {
                path_values.insert(param.name.as_str(), value_to_string(value));
            }
            ParamLocation::Header => headers.push((param.name.clone(), value_to_string(value))),
            ParamLocation::Body => {
                if body_param.is_none() {
                    body_param = Some(value.clone());
                }
            }
            ParamLocation::Other(location) => {
                debug!(name = %param.name, %location, "ignoring parameter location");
            }
        }
    }

    let path = substitute_path(endpoint, &path_values, options.placeholder_policy)?;
    let url = format!("{}{}", base_url.trim_end_matches('/'), path);

    let body = body
        .or_else(|| values.get(BODY_KEY).filter(|v| !v.is_null()).cloned())
        .or(body_param);

    debug!(
        method = %endpoint.method,
        %url,
        query = query.len(),
        headers = headers.len(),
        has_body = body.is_some(),
        "built request"
    );

    Ok(RequestDescriptor {
        method: endpoint.method,
        url,
        query,
        headers,
        body,
        timeout: options.timeout,
    })
}

/// Names of the `{name}` placeholders in a path template, in order.
pub fn path_placeholders(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        names.push(&rest[start + 1..start + len]);
        rest = &rest[start + len + 1..];
    }
    names
}

fn substitute_path(
    endpoint: &EndpointRecord,
    path_values: &HashMap<&str, String>,
    policy: PlaceholderPolicy,
) -> Result<String, RequestError> {
    let template = endpoint.path.as_str();
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let name = &rest[start + 1..start + len];
        out.push_str(&rest[..start]);

        match path_values.get(name) {
            Some(value) => out.push_str(&urlencoding::encode(value)),
            None => {
                let required = endpoint
                    .parameter(name, &ParamLocation::Path)
                    .is_some_and(|p| p.required);
                if required {
                    return Err(RequestError::MissingPathParameter {
                        name: name.to_string(),
                    });
                }
                if policy == PlaceholderPolicy::Strict {
                    return Err(RequestError::UnresolvedPlaceholder {
                        name: name.to_string(),
                    });
                }
                warn!(placeholder = name, path = template, "leaving path placeholder unresolved");
                out.push_str(&rest[start..=start + len]);
            }
        }

        rest = &rest[start + len + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// String form used for path segments, query values and headers.
///
/// Strings are used verbatim; everything else is rendered as compact JSON
/// (`42`, `true`, `[1,2]`).
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::ParameterSpec;
    use serde_json::json;

    const BASE: &str = "https://api.example.com";

    fn user_endpoint() -> EndpointRecord {
        EndpointRecord::new("/users/{id}", Method::Get)
            .with_parameter(ParameterSpec::new("id", ParamLocation::Path, true))
    }

    fn values(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn build(endpoint: &EndpointRecord, v: Value) -> Result<RequestDescriptor, RequestError> {
        build_request(BASE, endpoint, &values(v), None, &RequestOptions::default())
    }

    #[test]
    fn substitutes_path_parameter() {
        let req = build(&user_endpoint(), json!({"id": 42})).unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.url, "https://api.example.com/users/42");
        assert_eq!(req.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn missing_required_path_parameter_fails() {
        let err = build(&user_endpoint(), json!({})).unwrap_err();
        assert!(
            matches!(err, RequestError::MissingPathParameter { ref name } if name == "id"),
            "got: {err}"
        );
    }

    #[test]
    fn null_path_value_counts_as_missing() {
        let err = build(&user_endpoint(), json!({"id": null})).unwrap_err();
        assert!(matches!(err, RequestError::MissingPathParameter { .. }));
    }

    #[test]
    fn undeclared_keys_are_dropped() {
        let req = build(&user_endpoint(), json!({"id": 42, "secret": "x"})).unwrap();

        assert!(!req.url.contains("secret"));
        assert!(req.query.iter().all(|(k, v)| k != "secret" && v != "x"));
        assert!(req.headers.iter().all(|(k, v)| k != "secret" && v != "x"));
        assert!(req.body.is_none());
    }

    #[test]
    fn optional_placeholder_left_literal_when_lenient() {
        let endpoint = EndpointRecord::new("/files/{dir}/{name}", Method::Get)
            .with_parameter(ParameterSpec::new("dir", ParamLocation::Path, false))
            .with_parameter(ParameterSpec::new("name", ParamLocation::Path, true));

        let req = build(&endpoint, json!({"name": "a.txt"})).unwrap();
        assert_eq!(req.url, "https://api.example.com/files/{dir}/a.txt");
    }

    #[test]
    fn undeclared_placeholder_left_literal_when_lenient() {
        let endpoint = EndpointRecord::new("/orgs/{org}", Method::Get);
        let req = build(&endpoint, json!({"org": "acme"})).unwrap();
        assert_eq!(req.url, "https://api.example.com/orgs/{org}");
    }

    #[test]
    fn strict_policy_rejects_unresolved_placeholder() {
        let endpoint = EndpointRecord::new("/files/{dir}", Method::Get)
            .with_parameter(ParameterSpec::new("dir", ParamLocation::Path, false));
        let options = RequestOptions::default().placeholder_policy(PlaceholderPolicy::Strict);

        let err = build_request(BASE, &endpoint, &Map::new(), None, &options).unwrap_err();
        assert!(matches!(err, RequestError::UnresolvedPlaceholder { ref name } if name == "dir"));
        assert_eq!(err.to_string(), "path placeholder has no value: {dir}");
    }

    #[test]
    fn path_values_are_percent_encoded() {
        let req = build(&user_endpoint(), json!({"id": "hello world/1"})).unwrap();
        assert_eq!(req.url, "https://api.example.com/users/hello%20world%2F1");
    }

    #[test]
    fn partitions_values_by_location() {
        let endpoint = EndpointRecord::new("/pets/{petId}", Method::Put)
            .with_parameter(ParameterSpec::new("petId", ParamLocation::Path, true))
            .with_parameter(ParameterSpec::new("verbose", ParamLocation::Query, false))
            .with_parameter(ParameterSpec::new("tag", ParamLocation::Query, false))
            .with_parameter(ParameterSpec::new("X-Trace", ParamLocation::Header, false))
            .with_parameter(ParameterSpec::new(
                "session",
                ParamLocation::Other("cookie".into()),
                false,
            ));

        let req = build(
            &endpoint,
            json!({
                "petId": 7,
                "verbose": true,
                "tag": ["a", "b"],
                "X-Trace": "abc",
                "session": "s3cr3t"
            }),
        )
        .unwrap();

        assert_eq!(req.url, "https://api.example.com/pets/7");
        assert_eq!(
            req.query,
            vec![
                ("verbose".to_string(), "true".to_string()),
                ("tag".to_string(), "a".to_string()),
                ("tag".to_string(), "b".to_string()),
            ]
        );
        assert_eq!(req.headers, vec![("X-Trace".to_string(), "abc".to_string())]);
        assert!(!req.url.contains("s3cr3t"));
        assert!(req.query.iter().chain(&req.headers).all(|(_, v)| v != "s3cr3t"));
    }

    #[test]
    fn reserved_body_key_becomes_payload() {
        let endpoint = EndpointRecord::new("/pets", Method::Post);
        let req = build(&endpoint, json!({"body": {"name": "rex"}})).unwrap();
        assert_eq!(req.body, Some(json!({"name": "rex"})));
        assert!(req.query.is_empty());
    }

    #[test]
    fn explicit_body_wins_over_reserved_key() {
        let endpoint = EndpointRecord::new("/pets", Method::Post);
        let req = build_request(
            BASE,
            &endpoint,
            &values(json!({"body": {"from": "values"}})),
            Some(json!({"from": "argument"})),
            &RequestOptions::default(),
        )
        .unwrap();
        assert_eq!(req.body, Some(json!({"from": "argument"})));
    }

    #[test]
    fn declared_body_parameter_becomes_payload() {
        let endpoint = EndpointRecord::new("/pets", Method::Post)
            .with_parameter(ParameterSpec::new("pet", ParamLocation::Body, true));

        let req = build(&endpoint, json!({"pet": {"name": "rex"}})).unwrap();
        assert_eq!(req.body, Some(json!({"name": "rex"})));
    }

    #[test]
    fn trailing_slashes_on_base_url_are_stripped() {
        let req = build_request(
            "http://localhost:8080//",
            &user_endpoint(),
            &values(json!({"id": 1})),
            None,
            &RequestOptions::default().timeout(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(req.url, "http://localhost:8080/users/1");
        assert_eq!(req.timeout, Duration::from_secs(5));
    }

    #[test]
    fn descriptor_serializes_timeout_in_seconds() {
        let req = build(&user_endpoint(), json!({"id": 1})).unwrap();
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["method"], "GET");
        assert_eq!(value["timeoutSecs"], 30.0);
    }

    #[test]
    fn path_placeholders_in_order() {
        assert_eq!(
            path_placeholders("/a/{x}/b/{y}.json"),
            vec!["x", "y"]
        );
        assert!(path_placeholders("/plain").is_empty());
        assert!(path_placeholders("/broken/{x").is_empty());
    }

    #[test]
    fn value_to_string_renders_scalars() {
        assert_eq!(value_to_string(&json!("abc")), "abc");
        assert_eq!(value_to_string(&json!(42)), "42");
        assert_eq!(value_to_string(&json!(1.5)), "1.5");
        assert_eq!(value_to_string(&json!(false)), "false");
        assert_eq!(value_to_string(&json!([1, 2])), "[1,2]");
    }
}
