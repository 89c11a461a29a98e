//! OpenAPI document → endpoint catalog
//!
//! Reads a raw OpenAPI/Swagger JSON value into a flat, ordered list of
//! `EndpointRecord`s. Only the path/method/parameter shape is interpreted;
//! request bodies and responses are carried through untouched.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::error::SpecError;
use crate::request::path_placeholders;

/// HTTP methods an endpoint record may carry.
///
/// Any other key under a path item (`head`, `options`, `parameters`,
/// vendor extensions, ...) is skipped while building the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl Method {
    pub const ALL: [Method; 5] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Patch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }

    /// Case-insensitive lookup; `None` for anything outside the allow-list.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a parameter travels in the request (`in` in the document).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParamLocation {
    Query,
    Path,
    Header,
    Body,
    /// Kept on the record but never used when building requests
    /// (`cookie`, `formData`, vendor-specific values).
    Other(String),
}

impl ParamLocation {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Query => "query",
            Self::Path => "path",
            Self::Header => "header",
            Self::Body => "body",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ParamLocation {
    fn from(s: String) -> Self {
        match s.as_str() {
            "query" => Self::Query,
            "path" => Self::Path,
            "header" => Self::Header,
            "body" => Self::Body,
            _ => Self::Other(s),
        }
    }
}

impl From<ParamLocation> for String {
    fn from(loc: ParamLocation) -> Self {
        loc.as_str().to_string()
    }
}

impl fmt::Display for ParamLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[non_exhaustive]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParamLocation,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, location: ParamLocation, required: bool) -> Self {
        Self {
            name: name.into(),
            location,
            required,
            description: None,
            schema: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One HTTP operation declared in the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct EndpointRecord {
    /// URL path template (e.g. "/users/{id}")
    pub path: String,
    pub method: Method,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    pub summary: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Path-level parameters merged with operation-level ones
    pub parameters: Vec<ParameterSpec>,
    /// `requestBody` as written in the document, `{}` when absent
    pub request_body: Value,
    /// `responses` as written in the document, `{}` when absent
    pub responses: Value,
}

impl EndpointRecord {
    pub fn new(path: impl Into<String>, method: Method) -> Self {
        Self {
            path: path.into(),
            method,
            operation_id: None,
            summary: String::new(),
            description: String::new(),
            tags: Vec::new(),
            parameters: Vec::new(),
            request_body: json!({}),
            responses: json!({}),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_parameter(mut self, param: ParameterSpec) -> Self {
        self.parameters.push(param);
        self
    }

    /// Find a declared parameter by name and location.
    pub fn parameter(&self, name: &str, location: &ParamLocation) -> Option<&ParameterSpec> {
        self.parameters
            .iter()
            .find(|p| p.name == name && &p.location == location)
    }

    /// Names of required parameters that `values` does not supply.
    ///
    /// A required body parameter is also satisfied by the reserved `body` key.
    pub fn missing_required<'a>(&'a self, values: &Map<String, Value>) -> Vec<&'a str> {
        let supplied = |key: &str| values.get(key).is_some_and(|v| !v.is_null());

        self.parameters
            .iter()
            .filter(|p| p.required)
            .filter(|p| match p.location {
                ParamLocation::Query | ParamLocation::Path | ParamLocation::Header => {
                    !supplied(&p.name)
                }
                ParamLocation::Body => !supplied(&p.name) && !supplied("body"),
                ParamLocation::Other(_) => false,
            })
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn summary_entry(&self) -> EndpointSummary {
        EndpointSummary {
            path: self.path.clone(),
            method: self.method,
            summary: self.summary.clone(),
        }
    }
}

/// Minimal view of an endpoint handed to an intent resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSummary {
    pub path: String,
    pub method: Method,
    pub summary: String,
}

/// Ordered, immutable set of endpoints parsed from one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    endpoints: Vec<EndpointRecord>,
    base_path: String,
}

impl Catalog {
    /// Build a catalog from a parsed document.
    ///
    /// Everything needed is copied out of `document`, so the catalog does not
    /// observe later changes to it. No partial catalog is ever returned.
    pub fn build(document: &Value) -> Result<Self, SpecError> {
        let root = document.as_object().ok_or_else(|| {
            SpecError::malformed(format!(
                "top-level document must be an object, got {}",
                json_kind(document)
            ))
        })?;

        let base_path = root
            .get("basePath")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let paths = match root.get("paths") {
            None | Some(Value::Null) => {
                debug!("document has no paths");
                return Ok(Self {
                    endpoints: Vec::new(),
                    base_path,
                });
            }
            Some(Value::Object(paths)) => paths,
            Some(other) => {
                return Err(SpecError::malformed(format!(
                    "`paths` must be an object, got {}",
                    json_kind(other)
                )))
            }
        };

        let mut endpoints: Vec<EndpointRecord> = Vec::new();
        let mut index: HashMap<(String, Method), usize> = HashMap::new();

        for (path, path_item) in paths {
            let path_item = path_item.as_object().ok_or_else(|| {
                SpecError::malformed(format!(
                    "path item for {path} must be an object, got {}",
                    json_kind(path_item)
                ))
            })?;

            let path_level_params = parse_params(path, path_item.get("parameters"))?;

            for (key, operation) in path_item {
                let Some(method) = Method::from_name(key) else {
                    continue;
                };

                let record = extract_endpoint(path, method, operation, &path_level_params)?;
                debug!(
                    method = %record.method,
                    path = %record.path,
                    params = record.parameters.len(),
                    "parsed endpoint"
                );

                // Last-seen wins; the record keeps its first position.
                let key = (path.clone(), method);
                match index.get(&key).copied() {
                    Some(pos) => {
                        warn!(%method, %path, "duplicate operation, keeping the later one");
                        endpoints[pos] = record;
                    }
                    None => {
                        index.insert(key, endpoints.len());
                        endpoints.push(record);
                    }
                }
            }
        }

        info!(endpoints = endpoints.len(), "built endpoint catalog");
        Ok(Self {
            endpoints,
            base_path,
        })
    }

    /// Parse JSON text and build a catalog from it.
    pub fn from_json_str(text: &str) -> Result<Self, SpecError> {
        let document: Value = serde_json::from_str(text).map_err(SpecError::InvalidJson)?;
        Self::build(&document)
    }

    /// Read JSON from `reader` and build a catalog from it.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, SpecError> {
        let mut text = String::new();
        reader.read_to_string(&mut text).map_err(SpecError::Read)?;
        Self::from_json_str(&text)
    }

    /// `(path, method, summary)` for every endpoint, in document order.
    pub fn summarize(&self) -> Vec<EndpointSummary> {
        self.endpoints
            .iter()
            .map(EndpointRecord::summary_entry)
            .collect()
    }

    /// Exact match on `path`, case-insensitive on `method`.
    ///
    /// Paths are compared as raw strings: `/users/42` does not match
    /// `/users/{id}`.
    pub fn lookup(&self, path: &str, method: &str) -> Result<&EndpointRecord, SpecError> {
        Method::from_name(method)
            .and_then(|m| self.get(path, m))
            .ok_or_else(|| SpecError::EndpointNotFound {
                method: method.to_uppercase(),
                path: path.to_string(),
            })
    }

    pub fn get(&self, path: &str, method: Method) -> Option<&EndpointRecord> {
        self.endpoints
            .iter()
            .find(|e| e.method == method && e.path == path)
    }

    pub fn endpoints(&self) -> &[EndpointRecord] {
        &self.endpoints
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EndpointRecord> {
        self.endpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Swagger 2.x `basePath`, empty when the document has none.
    ///
    /// Not applied to request URLs; callers include it in their base URL.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a EndpointRecord;
    type IntoIter = std::slice::Iter<'a, EndpointRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.endpoints.iter()
    }
}

fn extract_endpoint(
    path: &str,
    method: Method,
    operation: &Value,
    path_level_params: &[ParameterSpec],
) -> Result<EndpointRecord, SpecError> {
    let op = operation.as_object().ok_or_else(|| {
        SpecError::malformed(format!(
            "operation {method} {path} must be an object, got {}",
            json_kind(operation)
        ))
    })?;

    let text = |key: &str| {
        op.get(key)
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    };
    let passthrough = |key: &str| match op.get(key) {
        None | Some(Value::Null) => json!({}),
        Some(v) => v.clone(),
    };

    let operation_id = op
        .get("operationId")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let tags = op
        .get("tags")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let op_params = parse_params(path, op.get("parameters"))?;
    let parameters = merge_params(path_level_params, op_params);

    for name in path_placeholders(path) {
        if !parameters
            .iter()
            .any(|p| p.name == name && p.location == ParamLocation::Path)
        {
            warn!(%method, %path, placeholder = name, "placeholder has no declared path parameter");
        }
    }

    Ok(EndpointRecord {
        path: path.to_string(),
        method,
        operation_id,
        summary: text("summary"),
        description: text("description"),
        tags,
        parameters,
        request_body: passthrough("requestBody"),
        responses: passthrough("responses"),
    })
}

/// Path-level params first; an operation-level param with the same
/// name + location replaces its path-level twin in place.
fn merge_params(path_level: &[ParameterSpec], op_level: Vec<ParameterSpec>) -> Vec<ParameterSpec> {
    let mut merged = path_level.to_vec();
    for param in op_level {
        match merged
            .iter_mut()
            .find(|p| p.name == param.name && p.location == param.location)
        {
            Some(existing) => *existing = param,
            None => merged.push(param),
        }
    }
    merged
}

fn parse_params(path: &str, params: Option<&Value>) -> Result<Vec<ParameterSpec>, SpecError> {
    let entries = match params {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            return Err(SpecError::malformed(format!(
                "parameters of {path} must be an array, got {}",
                json_kind(other)
            )))
        }
    };

    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        if let Some(reference) = entry.get("$ref").and_then(Value::as_str) {
            warn!(%path, %reference, "skipping unresolved parameter reference");
            continue;
        }
        out.push(parse_param(path, entry)?);
    }
    Ok(out)
}

/// Parse a single parameter from its JSON representation.
fn parse_param(path: &str, param: &Value) -> Result<ParameterSpec, SpecError> {
    let obj = param.as_object().ok_or_else(|| {
        SpecError::malformed(format!(
            "parameter of {path} must be an object, got {}",
            json_kind(param)
        ))
    })?;

    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SpecError::malformed(format!("parameter of {path} has no name")))?;

    let location = obj.get("in").and_then(Value::as_str).ok_or_else(|| {
        SpecError::malformed(format!("parameter {name} of {path} has no `in` location"))
    })?;

    Ok(ParameterSpec {
        name: name.to_string(),
        location: ParamLocation::from(location.to_string()),
        required: obj
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        description: obj
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        schema: obj.get("schema").cloned(),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
