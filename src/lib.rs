//! Drive an HTTP API from its OpenAPI/Swagger description.
//!
//! Parses a raw OpenAPI JSON document into an ordered, immutable endpoint
//! catalog, hands a minimal summary of it to an intent resolver, and turns
//! endpoint metadata plus a bag of values into concrete HTTP calls.
//!
//! # Usage
//!
//! ```no_run
//! use swagger_agent::{ApiClient, Catalog, RequestOptions};
//! use serde_json::json;
//!
//! let doc = json!({
//!     "paths": {
//!         "/users/{id}": {
//!             "get": {
//!                 "summary": "Fetch a user",
//!                 "parameters": [{"name": "id", "in": "path", "required": true}]
//!             }
//!         }
//!     }
//! });
//! let catalog = Catalog::build(&doc).unwrap();
//! let endpoint = catalog.lookup("/users/{id}", "get").unwrap();
//!
//! let client = ApiClient::new("https://api.example.com", RequestOptions::default()).unwrap();
//! let values = json!({"id": 42});
//! let outcome = client
//!     .call(endpoint, values.as_object().unwrap(), None)
//!     .unwrap();
//! println!("{}", serde_json::to_string_pretty(&outcome).unwrap());
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod request;
pub mod resolver;
pub mod session;
pub mod spec;

pub use config::AgentConfig;
pub use dispatch::{ApiClient, ApiResponse, CallFailure, CallOutcome};
pub use error::{ConfigError, RequestError, ResolverError, SessionError, SpecError};
pub use request::{
    build_request, path_placeholders, PlaceholderPolicy, RequestDescriptor, RequestOptions,
    BODY_KEY, DEFAULT_TIMEOUT,
};
pub use resolver::{
    analysis_prompt, endpoint_selection_prompt, parameter_prompt, IntentResolver, Plan,
    PlannedCall,
};
pub use session::Session;
pub use spec::{Catalog, EndpointRecord, EndpointSummary, Method, ParamLocation, ParameterSpec};

// Re-export dependencies for downstream crates
pub use reqwest;
pub use serde_json;
