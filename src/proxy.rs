use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use reqwest::{Client, Url};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

use crate::config::ProxyConfig;

/// Path prefixes the proxy answers under; the matching prefix is stripped
/// before forwarding.
pub const PROXY_PREFIXES: [&str; 2] = ["/api/tmdb", "/.netlify/functions/tmdb"];
pub const MISSING_KEY_ERROR: &str = "Server configuration error: API Key missing";

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Value,
}

#[async_trait]
pub trait Upstream: Send + Sync {
    async fn get(&self, url: Url) -> Result<UpstreamResponse>;
}

#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
}

impl HttpUpstream {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build upstream HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn get(&self, url: Url) -> Result<UpstreamResponse> {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .context("upstream request failed")?;
        let status = res.status().as_u16();
        let body = res
            .json::<Value>()
            .await
            .context("upstream body is not valid JSON")?;
        Ok(UpstreamResponse { status, body })
    }
}

#[derive(Clone)]
pub struct ProxyState {
    pub api_key: Option<String>,
    pub upstream_base: String,
    pub upstream: Arc<dyn Upstream>,
}

pub async fn run_server(config: ProxyConfig) -> Result<()> {
    let upstream: Arc<dyn Upstream> = Arc::new(HttpUpstream::new()?);
    if config.api_key.is_none() {
        warn!("TMDB_API_KEY is not set; every proxied request will answer 500");
    }
    let state = ProxyState {
        api_key: config.api_key,
        upstream_base: config.upstream_base,
        upstream,
    };
    info!("Forwarding {:?} to {}", PROXY_PREFIXES, state.upstream_base);

    let app = build_router(state);

    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: ProxyState) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(proxy_request)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn proxy_request(
    State(state): State<ProxyState>,
    method: Method,
    uri: Uri,
    query: Option<Query<Vec<(String, String)>>>,
) -> Response {
    let Some(api_key) = state.api_key.as_deref().filter(|k| !k.is_empty()) else {
        error!("Rejecting {} {}: no API key configured", method, uri.path());
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": MISSING_KEY_ERROR })),
        )
            .into_response();
    };
    let Some(endpoint) = strip_prefix(uri.path()) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "Not Found" }))).into_response();
    };
    if method != Method::GET {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(json!({ "error": "Method Not Allowed" })),
        )
            .into_response();
    }

    let params = query.map(|Query(p)| p).unwrap_or_default();
    match forward(&state, endpoint, api_key, &params).await {
        Ok(upstream) => {
            let status =
                StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
            if !status.is_success() {
                warn!("Upstream answered {} for {}", status, endpoint);
            }
            (status, Json(upstream.body)).into_response()
        }
        Err(e) => {
            error!("Proxy error for {}: {:#}", endpoint, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal Server Error", "message": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn forward(
    state: &ProxyState,
    endpoint: &str,
    api_key: &str,
    params: &[(String, String)],
) -> Result<UpstreamResponse> {
    let url = upstream_url(&state.upstream_base, endpoint, api_key, params)?;
    debug!("Forwarding {} ({} params)", endpoint, params.len());
    state.upstream.get(url).await
}

/// Remainder of `path` after a proxy prefix, or `None` when the path is not
/// under any prefix.
pub fn strip_prefix(path: &str) -> Option<&str> {
    PROXY_PREFIXES.iter().find_map(|prefix| {
        path.strip_prefix(prefix)
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// Upstream URL with the credential first, then every inbound parameter in
/// the order received.
pub fn upstream_url(
    base: &str,
    endpoint: &str,
    api_key: &str,
    params: &[(String, String)],
) -> Result<Url> {
    let mut url = Url::parse(&format!("{base}{endpoint}"))
        .with_context(|| format!("Invalid URL: {base}{endpoint}"))?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("api_key", api_key);
        for (k, v) in params {
            pairs.append_pair(k, v);
        }
    }
    Ok(url)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
