//! Proxy provider registry.
//!
//! `PROXY_PROVIDER` picks one of `none`, `scrapeops`, `scraperapi`,
//! `zenrows` or `generic`. Misconfiguration never aborts a run: an unknown
//! provider or missing credentials fall back to a direct connection.

use gleaner_core::connection::{ConnectionPath, RelayKind};

const SCRAPEOPS_SERVER: &str = "http://proxy.scrapeops.io:5353";
const SCRAPERAPI_SERVER: &str = "http://proxy-server.scraperapi.com:8001";
const ZENROWS_SERVER: &str = "http://api.zenrows.com:8001";
const ZENROWS_OPTIONS: &str = "premium_proxy=true&antibot=true";

pub const PROVIDERS: &[&str] = &["none", "scrapeops", "scraperapi", "zenrows", "generic"];

/// Resolves the connection path from the process environment.
pub fn connection_from_env() -> ConnectionPath {
    resolve_connection(|key| std::env::var(key).ok())
}

/// Resolves the connection path from an arbitrary key lookup.
pub fn resolve_connection<L>(lookup: L) -> ConnectionPath
where
    L: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let provider = get("PROXY_PROVIDER")
        .map(|p| p.trim().to_lowercase())
        .unwrap_or_else(|| "none".to_string());

    let path = match provider.as_str() {
        "none" => Some(ConnectionPath::Direct),
        "scrapeops" => keyed(get("SCRAPEOPS_API_KEY"), "SCRAPEOPS_API_KEY", |key| {
            ConnectionPath::Relay {
                kind: RelayKind::ScrapeOps,
                server: SCRAPEOPS_SERVER.into(),
                username: Some("scrapeops".into()),
                password: Some(key),
            }
        }),
        "scraperapi" => keyed(get("SCRAPERAPI_API_KEY"), "SCRAPERAPI_API_KEY", |key| {
            ConnectionPath::Relay {
                kind: RelayKind::ScraperApi,
                server: SCRAPERAPI_SERVER.into(),
                username: Some("scraperapi".into()),
                password: Some(key),
            }
        }),
        "zenrows" => keyed(get("ZENROWS_API_KEY"), "ZENROWS_API_KEY", |key| {
            ConnectionPath::Relay {
                kind: RelayKind::ZenRows,
                server: ZENROWS_SERVER.into(),
                username: Some(key),
                password: Some(ZENROWS_OPTIONS.into()),
            }
        }),
        "generic" => keyed(get("PROXY_SERVER"), "PROXY_SERVER", |server| {
            ConnectionPath::Relay {
                kind: RelayKind::Generic,
                server,
                username: get("PROXY_USERNAME"),
                password: get("PROXY_PASSWORD"),
            }
        }),
        other => {
            tracing::warn!(
                provider = other,
                available = %PROVIDERS.join(", "),
                "Unknown proxy provider, falling back to direct connection"
            );
            None
        }
    };

    let path = path.unwrap_or_default();
    tracing::info!(connection = %path, "Connection path resolved");
    path
}

fn keyed<F>(value: Option<String>, var: &str, build: F) -> Option<ConnectionPath>
where
    F: FnOnce(String) -> ConnectionPath,
{
    match value {
        Some(v) => Some(build(v)),
        None => {
            tracing::warn!(
                variable = var,
                "Proxy credentials missing, falling back to direct connection"
            );
            None
        }
    }
}
