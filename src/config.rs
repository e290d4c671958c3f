use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

use crate::browse::KnownForOrder;

pub const DEFAULT_UPSTREAM_BASE: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8888";
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8888/api/tmdb";

/// Settings for the gateway proxy binary.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Credential injected into every forwarded request. A missing key is
    /// reported per request, not at startup.
    pub api_key: Option<String>,
    pub upstream_base: String,
    pub bind_addr: SocketAddr,
}

impl ProxyConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = non_empty_var("TMDB_API_KEY").or_else(|| non_empty_var("VITE_TMDB_API_KEY"));
        let upstream_base = non_empty_var("TMDB_UPSTREAM_BASE")
            .unwrap_or_else(|| DEFAULT_UPSTREAM_BASE.to_string());
        let bind_addr = non_empty_var("PROXY_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("PROXY_BIND_ADDR is not a valid socket address")?;
        Ok(Self {
            api_key,
            upstream_base: upstream_base.trim_end_matches('/').to_string(),
            bind_addr,
        })
    }
}

/// Base URL the typed client talks to (normally the proxy).
pub fn api_base() -> String {
    non_empty_var("CINEHUB_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string())
}

pub fn watchlist_dir() -> Result<PathBuf> {
    if let Some(path) = non_empty_var("CINEHUB_WATCHLIST_DIR") {
        return Ok(PathBuf::from(path));
    }
    let dirs = directories::ProjectDirs::from("", "", "cinehub")
        .context("Could not determine a data directory for the watchlist")?;
    let dir = dirs.data_dir().to_path_buf();
    info!("Using watchlist directory {:?}", dir);
    Ok(dir)
}

pub fn known_for_order() -> Result<KnownForOrder> {
    match non_empty_var("CINEHUB_KNOWN_FOR_ORDER") {
        Some(v) => v.parse(),
        None => Ok(KnownForOrder::default()),
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test so nothing else in this binary races on these variables.
    #[test]
    fn proxy_config_reads_environment() {
        env::set_var("TMDB_API_KEY", "  ");
        env::set_var("VITE_TMDB_API_KEY", "from-vite");
        env::set_var("TMDB_UPSTREAM_BASE", "https://upstream.test/3/");
        env::set_var("PROXY_BIND_ADDR", "127.0.0.1:9999");

        let config = ProxyConfig::from_env().unwrap();
        assert_eq!(config.api_key.as_deref(), Some("from-vite"));
        assert_eq!(config.upstream_base, "https://upstream.test/3");
        assert_eq!(config.bind_addr, "127.0.0.1:9999".parse().unwrap());

        env::set_var("PROXY_BIND_ADDR", "not an address");
        assert!(ProxyConfig::from_env().is_err());

        env::set_var("CINEHUB_KNOWN_FOR_ORDER", "popularity");
        assert_eq!(known_for_order().unwrap(), KnownForOrder::Popularity);
        env::set_var("CINEHUB_KNOWN_FOR_ORDER", "alphabetical");
        assert!(known_for_order().is_err());

        for key in [
            "TMDB_API_KEY",
            "VITE_TMDB_API_KEY",
            "TMDB_UPSTREAM_BASE",
            "PROXY_BIND_ADDR",
            "CINEHUB_KNOWN_FOR_ORDER",
        ] {
            env::remove_var(key);
        }
    }
}
