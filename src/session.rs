//! Explicit per-user context: the current catalog plus the client used to
//! call the API it describes.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::info;

use crate::config::AgentConfig;
use crate::dispatch::{ApiClient, CallOutcome};
use crate::error::SessionError;
use crate::resolver::{IntentResolver, Plan};
use crate::spec::Catalog;

#[derive(Debug, Clone)]
pub struct Session {
    client: ApiClient,
    catalog: Option<Arc<Catalog>>,
}

impl Session {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            catalog: None,
        }
    }

    /// Session with a client built from `config`, calling `base_url`.
    pub fn from_config(
        config: &AgentConfig,
        base_url: impl Into<String>,
    ) -> Result<Self, SessionError> {
        Ok(Self::new(ApiClient::from_config(config, base_url)?))
    }

    pub fn with_catalog(client: ApiClient, catalog: Catalog) -> Self {
        Self {
            client,
            catalog: Some(Arc::new(catalog)),
        }
    }

    /// Parse `text` and replace the current catalog with the result.
    ///
    /// On error the previous catalog stays in place.
    pub fn load_document(&mut self, text: &str) -> Result<Arc<Catalog>, SessionError> {
        let catalog = Arc::new(Catalog::from_json_str(text)?);
        info!(endpoints = catalog.len(), "loaded spec document");
        self.catalog = Some(Arc::clone(&catalog));
        Ok(catalog)
    }

    /// The current catalog. Holders keep their snapshot across reloads.
    pub fn catalog(&self) -> Option<Arc<Catalog>> {
        self.catalog.clone()
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    fn current(&self) -> Result<&Catalog, SessionError> {
        self.catalog.as_deref().ok_or(SessionError::NoDocument)
    }

    /// Ask `resolver` which calls serve `intent`.
    pub fn plan<R: IntentResolver + ?Sized>(
        &self,
        resolver: &R,
        intent: &str,
    ) -> Result<Plan, SessionError> {
        let catalog = self.current()?;
        let text = resolver.resolve(&catalog.summarize(), intent)?;
        Ok(Plan::parse(&text))
    }

    /// Look up `method path` and call it.
    pub fn call(
        &self,
        method: &str,
        path: &str,
        values: &Map<String, Value>,
        body: Option<Value>,
    ) -> Result<CallOutcome, SessionError> {
        let endpoint = self.current()?.lookup(path, method)?;
        Ok(self.client.call(endpoint, values, body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ResolverError, SpecError};
    use crate::request::{PlaceholderPolicy, RequestOptions};
    use std::time::Duration;
    use crate::spec::EndpointSummary;
    use reqwest::blocking::Client;
    use serde_json::json;

    const DOC: &str = r#"{"paths": {"/ping": {"get": {"summary": "health check"}}}}"#;

    fn session(base_url: &str) -> Session {
        Session::new(ApiClient::with_client(
            Client::new(),
            base_url,
            RequestOptions::default(),
        ))
    }

    fn echo_resolver(endpoints: &[EndpointSummary], _intent: &str) -> Result<String, ResolverError> {
        Ok(serde_json::to_string(&endpoints).unwrap_or_default())
    }

    #[test]
    fn operations_need_a_document() {
        let s = session("http://localhost");
        assert!(matches!(
            s.call("GET", "/ping", &Map::new(), None),
            Err(SessionError::NoDocument)
        ));
        assert!(matches!(
            s.plan(&echo_resolver, "ping"),
            Err(SessionError::NoDocument)
        ));
    }

    #[test]
    fn from_config_applies_request_options() {
        let config = AgentConfig {
            timeout_secs: 5,
            placeholder_policy: PlaceholderPolicy::Strict,
            ..AgentConfig::default()
        };
        let s = Session::from_config(&config, "http://localhost:9").unwrap();

        assert!(s.catalog().is_none());
        assert_eq!(s.client().base_url(), "http://localhost:9");
        assert_eq!(s.client().options().timeout, Duration::from_secs(5));
        assert_eq!(
            s.client().options().placeholder_policy,
            PlaceholderPolicy::Strict
        );
    }

    #[test]
    fn reload_replaces_catalog_and_keeps_old_snapshots() {
        let mut s = session("http://localhost");
        let first = s.load_document(DOC).unwrap();

        s.load_document(r#"{"paths": {"/a": {"get": {}}, "/b": {"get": {}}}}"#)
            .unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(s.catalog().unwrap().len(), 2);
    }

    #[test]
    fn failed_reload_keeps_previous_catalog() {
        let mut s = session("http://localhost");
        s.load_document(DOC).unwrap();

        let err = s.load_document("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, SessionError::Spec(SpecError::Malformed { .. })));
        assert_eq!(s.catalog().unwrap().endpoints()[0].path, "/ping");
    }

    #[test]
    fn plan_passes_summary_to_resolver() {
        let mut s = session("http://localhost");
        s.load_document(DOC).unwrap();

        let resolver = |endpoints: &[EndpointSummary], intent: &str| {
            assert_eq!(intent, "is it up?");
            assert_eq!(endpoints.len(), 1);
            Ok::<_, ResolverError>(
                r#"[{"method": "GET", "path": "/ping", "reason": "health"}]"#.to_string(),
            )
        };

        let plan = s.plan(&resolver, "is it up?").unwrap();
        let calls = plan.calls().unwrap();
        assert_eq!(calls[0].path, "/ping");
    }

    #[test]
    fn plan_surfaces_resolver_errors() {
        let mut s = session("http://localhost");
        s.load_document(DOC).unwrap();

        let failing = |_: &[EndpointSummary], _: &str| -> Result<String, ResolverError> {
            Err(ResolverError::Failed("quota exceeded".into()))
        };
        let err = s.plan(&failing, "x").unwrap_err();
        assert_eq!(err.to_string(), "intent resolver failed: quota exceeded");
    }

    #[test]
    fn call_unknown_endpoint_is_not_found() {
        let mut s = session("http://localhost");
        s.load_document(DOC).unwrap();

        let err = s.call("POST", "/ping", &Map::new(), None).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Spec(SpecError::EndpointNotFound { .. })
        ));
    }

    #[test]
    fn call_reaches_server() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/ping")
            .with_status(200)
            .with_body(r#"{"status":"ok"}"#)
            .create();

        let mut s = session(&server.url());
        s.load_document(DOC).unwrap();

        let outcome = s.call("get", "/ping", &Map::new(), None).unwrap();
        mock.assert();
        assert_eq!(
            serde_json::to_value(&outcome).unwrap()["body"],
            json!({"status": "ok"})
        );
    }
}
