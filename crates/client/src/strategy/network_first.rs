//! Network-first: always try the network, then degrade through the
//! partition, the offline document, and finally a synthetic 503.

use super::{FallbackReason, Outcome, StrategyContext, SyntheticStatus};
use crate::fetch::FetchRequest;
use reqwest::{Method, Url};

/// Where the reserved offline document may be found.
pub(crate) struct OfflineDocument<'a> {
    pub url: &'a Url,
    /// Searched in order after the request's own partition misses.
    pub partitions: &'a [&'a str],
}

pub(crate) async fn network_first(
    ctx: &StrategyContext<'_>, partition: &str, offline: &OfflineDocument<'_>, request: &FetchRequest,
) -> Outcome {
    let err = match ctx.network(request).await {
        Ok(response) => {
            ctx.store(partition, request, &response).await;
            return Outcome::Network(response);
        }
        Err(e) => e,
    };

    if let Some(cached) = ctx.lookup(partition, &request.method, &request.url).await {
        tracing::info!(partition, url = %request.url, error = %err, "network failed, serving cached copy");
        return Outcome::Fallback(cached, FallbackReason::CachedCopy);
    }

    if request.accepts_html() {
        for candidate in offline.partitions {
            if let Some(doc) = ctx.lookup(candidate, &Method::GET, offline.url).await {
                tracing::info!(url = %request.url, partition = candidate, error = %err, "serving offline document");
                return Outcome::Fallback(doc, FallbackReason::OfflineDocument);
            }
        }
    }

    tracing::warn!(partition, url = %request.url, error = %err, "network failed with nothing cached");
    Outcome::Failed(SyntheticStatus::ServiceUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Fetcher;
    use crate::strategy::OutcomeKind;
    use crate::testing::{ManualClock, ScriptedFetcher};
    use reqwest::header::{self, HeaderValue};
    use std::time::Duration;
    use waystation_core::{CacheDb, CacheStorage};

    const PAGE: &str = "http://localhost:3000/trips/42";
    const OFFLINE: &str = "http://localhost:3000/offline.html";
    const SEARCH: &[&str] = &["dynamic-v1", "static-v1"];

    fn context<'a>(db: &'a CacheDb, net: &'a ScriptedFetcher, clock: &'a ManualClock) -> StrategyContext<'a> {
        StrategyContext {
            storage: db,
            fetcher: net,
            clock,
            network_timeout: Duration::from_millis(200),
            capped: None,
        }
    }

    fn page_request() -> FetchRequest {
        FetchRequest::get(Url::parse(PAGE).unwrap())
            .with_header(header::ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml"))
    }

    async fn run(ctx: &StrategyContext<'_>, request: &FetchRequest) -> Outcome {
        let offline_url = Url::parse(OFFLINE).unwrap();
        let offline = OfflineDocument { url: &offline_url, partitions: SEARCH };
        network_first(ctx, "dynamic-v1", &offline, request).await
    }

    #[tokio::test]
    async fn test_fresh_network_replaces_stale_entry() {
        let (db, net, clock) = (CacheDb::open_in_memory().await.unwrap(), ScriptedFetcher::new(), ManualClock::new());
        let ctx = context(&db, &net, &clock);
        net.respond(PAGE, 200, "stale");
        run(&ctx, &page_request()).await;

        net.respond(PAGE, 200, "fresh");
        let outcome = run(&ctx, &page_request()).await;

        assert_eq!(outcome.kind(), OutcomeKind::Network);
        assert_eq!(outcome.into_response(Url::parse(PAGE).unwrap()).bytes.as_ref(), b"fresh");
        let stored = db.lookup("dynamic-v1", "GET", PAGE).await.unwrap().unwrap();
        assert_eq!(stored.body, b"fresh");
    }

    #[tokio::test]
    async fn test_error_status_leaves_entry_untouched() {
        let (db, net, clock) = (CacheDb::open_in_memory().await.unwrap(), ScriptedFetcher::new(), ManualClock::new());
        let ctx = context(&db, &net, &clock);
        net.respond(PAGE, 200, "good");
        run(&ctx, &page_request()).await;

        net.respond(PAGE, 500, "boom");
        let outcome = run(&ctx, &page_request()).await;

        assert_eq!(outcome.status().as_u16(), 500);
        let stored = db.lookup("dynamic-v1", "GET", PAGE).await.unwrap().unwrap();
        assert_eq!(stored.body, b"good");
    }

    #[tokio::test]
    async fn test_offline_serves_cached_copy() {
        let (db, net, clock) = (CacheDb::open_in_memory().await.unwrap(), ScriptedFetcher::new(), ManualClock::new());
        let ctx = context(&db, &net, &clock);
        net.respond(PAGE, 200, "itinerary");
        run(&ctx, &page_request()).await;

        net.offline(PAGE);
        let outcome = run(&ctx, &page_request()).await;

        assert_eq!(outcome.kind(), OutcomeKind::CachedCopy);
        assert_eq!(outcome.status().as_u16(), 200);
    }

    #[tokio::test]
    async fn test_offline_html_falls_back_to_offline_document() {
        let (db, net, clock) = (CacheDb::open_in_memory().await.unwrap(), ScriptedFetcher::new(), ManualClock::new());
        let ctx = context(&db, &net, &clock);
        net.respond(OFFLINE, 200, "<h1>You are offline</h1>");
        let offline_request = FetchRequest::get(Url::parse(OFFLINE).unwrap());
        ctx.store("static-v1", &offline_request, &net.fetch(&offline_request).await.unwrap())
            .await;

        let outcome = run(&ctx, &page_request()).await;

        assert_eq!(outcome.kind(), OutcomeKind::OfflineDocument);
        assert_eq!(
            outcome.into_response(Url::parse(PAGE).unwrap()).bytes.as_ref(),
            b"<h1>You are offline</h1>"
        );
    }

    #[tokio::test]
    async fn test_offline_html_without_offline_document_is_503() {
        let (db, net, clock) = (CacheDb::open_in_memory().await.unwrap(), ScriptedFetcher::new(), ManualClock::new());
        let ctx = context(&db, &net, &clock);

        let outcome = run(&ctx, &page_request()).await;

        assert!(matches!(outcome, Outcome::Failed(SyntheticStatus::ServiceUnavailable)));
    }

    #[tokio::test]
    async fn test_non_html_never_gets_offline_document() {
        let (db, net, clock) = (CacheDb::open_in_memory().await.unwrap(), ScriptedFetcher::new(), ManualClock::new());
        let ctx = context(&db, &net, &clock);
        net.respond(OFFLINE, 200, "offline");
        let offline_request = FetchRequest::get(Url::parse(OFFLINE).unwrap());
        ctx.store("dynamic-v1", &offline_request, &net.fetch(&offline_request).await.unwrap())
            .await;

        let json = FetchRequest::get(Url::parse(PAGE).unwrap())
            .with_header(header::ACCEPT, HeaderValue::from_static("application/json"));
        let outcome = run(&ctx, &json).await;

        assert_eq!(outcome.status().as_u16(), 503);
    }

    #[tokio::test]
    async fn test_hung_network_falls_back_after_timeout() {
        let (db, net, clock) = (CacheDb::open_in_memory().await.unwrap(), ScriptedFetcher::new(), ManualClock::new());
        let ctx = context(&db, &net, &clock);
        net.respond(PAGE, 200, "cached");
        run(&ctx, &page_request()).await;

        net.hang(PAGE);
        let outcome = run(&ctx, &page_request()).await;

        assert_eq!(outcome.kind(), OutcomeKind::CachedCopy);
    }

    #[tokio::test]
    async fn test_capped_partition_is_trimmed() {
        let (db, net, clock) = (CacheDb::open_in_memory().await.unwrap(), ScriptedFetcher::new(), ManualClock::new());
        let mut ctx = context(&db, &net, &clock);
        ctx.capped = Some(("dynamic-v1", 2));

        for page in ["/a", "/b", "/c"] {
            let url = format!("http://localhost:3000{page}");
            net.respond(&url, 200, page);
            run(&ctx, &FetchRequest::get(Url::parse(&url).unwrap())).await;
            clock.advance(chrono::TimeDelta::seconds(1));
        }

        assert_eq!(
            db.keys("dynamic-v1").await.unwrap(),
            vec!["http://localhost:3000/b", "http://localhost:3000/c"]
        );
    }
}
