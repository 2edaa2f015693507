//! Request classification.
//!
//! Every intercepted GET is assigned exactly one [`RouteKind`] by walking an
//! ordered rule table; the first matching rule wins and anything unmatched is
//! a page navigation. Each kind maps to one caching [`Strategy`].
//!
//! | Order | Rule | Kind | Strategy |
//! |---|---|---|---|
//! | 1 | path starts with the static prefix | `StaticAsset` | cache-first, static |
//! | 2 | host matches a remote pattern | `OpportunisticRemote` | network-first, dynamic |
//! | 3 | path starts with the internal API prefix | `InternalApi` | network-only |
//! | 4 | anything else | `Navigation` | network-first, dynamic, offline page |

use regex::Regex;
use reqwest::{Method, Url};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use waystation_core::{AppConfig, Error};

/// How a request is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    StaticAsset,
    OpportunisticRemote,
    InternalApi,
    Navigation,
}

/// Which of the two live partitions a strategy works against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Static,
    Dynamic,
}

/// Caching strategy bound to a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    CacheFirst(Partition),
    NetworkFirst(Partition),
    NetworkOnly,
}

impl RouteKind {
    pub fn strategy(self) -> Strategy {
        match self {
            RouteKind::StaticAsset => Strategy::CacheFirst(Partition::Static),
            RouteKind::OpportunisticRemote => Strategy::NetworkFirst(Partition::Dynamic),
            RouteKind::InternalApi => Strategy::NetworkOnly,
            RouteKind::Navigation => Strategy::NetworkFirst(Partition::Dynamic),
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    PathPrefix(String),
    Host(Vec<Regex>),
}

impl Matcher {
    fn matches(&self, url: &Url) -> bool {
        match self {
            Matcher::PathPrefix(prefix) => url.path().starts_with(prefix.as_str()),
            Matcher::Host(patterns) => url
                .host_str()
                .is_some_and(|host| patterns.iter().any(|p| p.is_match(host))),
        }
    }
}

/// Ordered classification table.
#[derive(Debug, Clone)]
pub struct Router {
    rules: Vec<(RouteKind, Matcher)>,
}

impl Router {
    /// Build the rule table. Fails if a host pattern is not a valid regex.
    pub fn new(static_prefix: &str, remote_hosts: &[String], internal_api_prefix: &str) -> Result<Self, Error> {
        let hosts = remote_hosts
            .iter()
            .map(|p| Regex::new(p).map_err(|e| Error::InvalidInput(format!("remote host pattern {p}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            rules: vec![
                (RouteKind::StaticAsset, Matcher::PathPrefix(static_prefix.to_string())),
                (RouteKind::OpportunisticRemote, Matcher::Host(hosts)),
                (RouteKind::InternalApi, Matcher::PathPrefix(internal_api_prefix.to_string())),
            ],
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        Self::new(&config.static_prefix, &config.remote_hosts, &config.internal_api_prefix)
    }

    /// Classify a URL. Pure: depends only on path and host.
    pub fn classify(&self, url: &Url) -> RouteKind {
        self.rules
            .iter()
            .find(|(_, matcher)| matcher.matches(url))
            .map(|(kind, _)| *kind)
            .unwrap_or(RouteKind::Navigation)
    }

    /// Classify a request; non-GET requests are never intercepted.
    pub fn route(&self, method: &Method, url: &Url) -> Option<RouteKind> {
        (*method == Method::GET).then(|| self.classify(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> Router {
        Router::from_config(&AppConfig::default()).unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_static_prefix() {
        let kind = router().classify(&url("http://localhost:3000/_next/static/chunks/main.js"));
        assert_eq!(kind, RouteKind::StaticAsset);
        assert_eq!(kind.strategy(), Strategy::CacheFirst(Partition::Static));
    }

    #[test]
    fn test_remote_hosts() {
        let router = router();
        assert_eq!(
            router.classify(&url("https://firestore.googleapis.com/v1/projects/trips/documents")),
            RouteKind::OpportunisticRemote
        );
        assert_eq!(router.classify(&url("https://images.unsplash.com/photo-1?w=800")), RouteKind::OpportunisticRemote);
        assert_eq!(router.classify(&url("https://evil-images.unsplash.com.example/x")), RouteKind::Navigation);
    }

    #[test]
    fn test_internal_api_is_network_only() {
        let kind = router().classify(&url("http://localhost:3000/api/internal/data"));
        assert_eq!(kind, RouteKind::InternalApi);
        assert_eq!(kind.strategy(), Strategy::NetworkOnly);
    }

    #[test]
    fn test_navigation_fallthrough() {
        let kind = router().classify(&url("http://localhost:3000/trips/42"));
        assert_eq!(kind, RouteKind::Navigation);
        assert_eq!(kind.strategy(), Strategy::NetworkFirst(Partition::Dynamic));
    }

    #[test]
    fn test_precedence_static_over_remote() {
        let router = Router::new("/_next/static/", &[r"^cdn\.example\.com$".to_string()], "/api/").unwrap();
        assert_eq!(router.classify(&url("https://cdn.example.com/_next/static/a.js")), RouteKind::StaticAsset);
        assert_eq!(router.classify(&url("https://cdn.example.com/api/x")), RouteKind::OpportunisticRemote);
    }

    #[test]
    fn test_non_get_is_not_routed() {
        let router = router();
        let target = url("http://localhost:3000/_next/static/a.js");
        assert_eq!(router.route(&Method::POST, &target), None);
        assert_eq!(router.route(&Method::GET, &target), Some(RouteKind::StaticAsset));
    }

    #[test]
    fn test_invalid_host_pattern() {
        assert!(Router::new("/s/", &["(".to_string()], "/api/").is_err());
    }
}
