//! Intent resolver contract
//!
//! The resolver (typically an LLM behind some API) sees only the catalog
//! summary and a free-text intent, and answers with text that is supposed
//! to be a JSON array of `{method, path, reason}`. That text is untrusted:
//! [`Plan::parse`] decodes what it can and keeps the rest as raw text.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ResolverError, SpecError};
use crate::spec::{Catalog, EndpointRecord, EndpointSummary};

/// Turns an intent into a (textual) call plan.
pub trait IntentResolver {
    fn resolve(&self, endpoints: &[EndpointSummary], intent: &str) -> Result<String, ResolverError>;
}

impl<F> IntentResolver for F
where
    F: Fn(&[EndpointSummary], &str) -> Result<String, ResolverError>,
{
    fn resolve(&self, endpoints: &[EndpointSummary], intent: &str) -> Result<String, ResolverError> {
        self(endpoints, intent)
    }
}

/// One line per endpoint: `- GET /pets: List pets`.
pub fn render_endpoint_list(endpoints: &[EndpointSummary]) -> String {
    endpoints
        .iter()
        .map(|e| format!("- {} {}: {}", e.method, e.path, e.summary))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt asking for an ordered JSON array of calls serving `intent`.
pub fn analysis_prompt(endpoints: &[EndpointSummary], intent: &str) -> String {
    format!(
        r#"Based on the following user intent and available API endpoints, provide a JSON array of required API calls in order of execution.
Each API object in the array should have: method, path, and reason (why this API is needed).

User's Intent: {intent}

Available API Endpoints:
{endpoints}

Respond ONLY with a valid JSON array. Example format:
[
    {{
        "method": "GET",
        "path": "/example/path",
        "reason": "Brief explanation why this API is needed"
    }}
]"#,
        endpoints = render_endpoint_list(endpoints),
    )
}

/// Prompt asking which single endpoint best serves `intent`.
pub fn endpoint_selection_prompt(endpoints: &[EndpointSummary], intent: &str) -> String {
    format!(
        "User intent: {intent}\n\n\
         Based on the following available API endpoints, help me understand which endpoint would be most appropriate:\n\n\
         Available endpoints:\n{endpoints}\n\n\
         Please analyze these endpoints and suggest the most appropriate one for the user's needs. \
         Consider the HTTP method, path, and purpose of each endpoint.",
        endpoints = render_endpoint_list(endpoints),
    )
}

/// Prompt asking for help collecting the parameters of one endpoint.
pub fn parameter_prompt(endpoint: &EndpointRecord) -> String {
    let params = endpoint
        .parameters
        .iter()
        .map(|p| {
            format!(
                "- {} ({}): {} {}",
                p.name,
                p.location,
                p.description.as_deref().unwrap_or("No description"),
                if p.required { "(Required)" } else { "(Optional)" }
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "For the endpoint {} {}, I need to collect the following parameters:\n\n{params}\n\n\
         Please help guide the user through providing these parameters, especially the required ones.",
        endpoint.method, endpoint.path
    )
}

/// A call proposed by the resolver. Fields are as the resolver wrote them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedCall {
    pub method: String,
    pub path: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub reason: String,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl PlannedCall {
    /// The catalog entry this call refers to.
    pub fn resolve<'c>(&self, catalog: &'c Catalog) -> Result<&'c EndpointRecord, SpecError> {
        catalog.lookup(&self.path, &self.method)
    }
}

/// Resolver output after best-effort decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum Plan {
    Calls(Vec<PlannedCall>),
    /// Text that could not be decoded; show it as-is.
    Raw(String),
}

impl Plan {
    /// Decode resolver output.
    ///
    /// Accepts a JSON array of calls or a single call object, either as the
    /// whole text or as the outermost `[...]` inside it (prose, code fences).
    /// Anything else comes back as [`Plan::Raw`].
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();

        if let Some(calls) = decode_calls(trimmed) {
            return Self::Calls(calls);
        }

        if let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']')) {
            if start < end {
                if let Some(calls) = decode_calls(&trimmed[start..=end]) {
                    debug!("decoded plan from embedded JSON array");
                    return Self::Calls(calls);
                }
            }
        }

        warn!("resolver output is not a JSON call list, keeping raw text");
        Self::Raw(text.to_string())
    }

    pub fn calls(&self) -> Option<&[PlannedCall]> {
        match self {
            Self::Calls(calls) => Some(calls),
            Self::Raw(_) => None,
        }
    }
}

fn decode_calls(text: &str) -> Option<Vec<PlannedCall>> {
    match serde_json::from_str::<Value>(text).ok()? {
        value @ Value::Array(_) => serde_json::from_value(value).ok(),
        value @ Value::Object(_) => serde_json::from_value(value).ok().map(|call| vec![call]),
        _ => None,
    }
}
