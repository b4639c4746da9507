//! HTTP origin backed by a blocking `ureq` agent

use crate::error::{SwError, SwResult};
use crate::fetch::Fetcher;
use crate::http::{Origin, Request, Response, ResponseKind};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Fetches requests over HTTP from a remote origin
pub struct HttpFetcher {
    origin: Origin,
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// Create a fetcher for an origin
    pub fn new(origin: Origin, timeout: Option<Duration>) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build();

        Self {
            origin,
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> SwResult<Response> {
        let url = self.origin.resolve(request);
        let kind = if request.is_same_origin() {
            ResponseKind::Basic
        } else {
            ResponseKind::Cors
        };
        let agent = self.agent.clone();
        let request = request.clone();

        debug!("{} {}", request.method, url);

        tokio::task::spawn_blocking(move || blocking_fetch(&agent, &request, &url, kind))
            .await
            .map_err(|e| SwError::TaskJoin(e.to_string()))?
    }

    fn describe(&self) -> String {
        self.origin.to_string()
    }
}

fn blocking_fetch(
    agent: &ureq::Agent,
    request: &Request,
    url: &str,
    kind: ResponseKind,
) -> SwResult<Response> {
    let mut builder = match request.method.as_str() {
        "GET" => agent.get(url),
        "HEAD" => agent.head(url),
        other => {
            return Err(SwError::network(
                url,
                format!("unsupported method {}", other),
            ))
        }
    };
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let mut response = builder
        .call()
        .map_err(|e| SwError::network(url, e.to_string()))?;

    let status = response.status();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    let body = response
        .body_mut()
        .read_to_vec()
        .map_err(|e| SwError::network(url, format!("reading body: {}", e)))?;

    Ok(Response {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("").to_string(),
        kind,
        headers,
        body,
        url: request.url.clone(),
    })
}
