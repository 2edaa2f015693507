//! Cache-first: serve from the partition, populate on miss.

use super::{Outcome, StrategyContext, SyntheticStatus};
use crate::fetch::FetchRequest;

pub(crate) async fn cache_first(ctx: &StrategyContext<'_>, partition: &str, request: &FetchRequest) -> Outcome {
    if let Some(hit) = ctx.lookup(partition, &request.method, &request.url).await {
        tracing::debug!(partition, url = %request.url, "cache hit");
        return Outcome::Cache(hit);
    }

    match ctx.network(request).await {
        Ok(response) => {
            ctx.store(partition, request, &response).await;
            Outcome::Network(response)
        }
        Err(e) => {
            tracing::warn!(partition, url = %request.url, error = %e, "cache miss while offline");
            Outcome::Failed(SyntheticStatus::RequestTimeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::OutcomeKind;
    use crate::testing::{ManualClock, ScriptedFetcher};
    use reqwest::Url;
    use std::time::Duration;
    use waystation_core::{CacheDb, CacheStorage};

    const ASSET: &str = "http://localhost:3000/_next/static/chunk.js";

    fn context<'a>(db: &'a CacheDb, net: &'a ScriptedFetcher, clock: &'a ManualClock) -> StrategyContext<'a> {
        StrategyContext {
            storage: db,
            fetcher: net,
            clock,
            network_timeout: Duration::from_millis(200),
            capped: None,
        }
    }

    fn request() -> FetchRequest {
        FetchRequest::get(Url::parse(ASSET).unwrap())
    }

    #[tokio::test]
    async fn test_hit_never_touches_network() {
        let (db, net, clock) = (CacheDb::open_in_memory().await.unwrap(), ScriptedFetcher::new(), ManualClock::new());
        net.respond(ASSET, 200, "v1");
        let ctx = context(&db, &net, &clock);

        cache_first(&ctx, "static-v1", &request()).await;
        let outcome = cache_first(&ctx, "static-v1", &request()).await;

        assert_eq!(outcome.kind(), OutcomeKind::Cache);
        assert_eq!(net.calls_to(ASSET), 1);
    }

    #[tokio::test]
    async fn test_non_200_is_returned_not_stored() {
        let (db, net, clock) = (CacheDb::open_in_memory().await.unwrap(), ScriptedFetcher::new(), ManualClock::new());
        net.respond(ASSET, 404, "missing");
        let ctx = context(&db, &net, &clock);

        let outcome = cache_first(&ctx, "static-v1", &request()).await;

        assert_eq!(outcome.kind(), OutcomeKind::Network);
        assert_eq!(outcome.status().as_u16(), 404);
        assert!(db.lookup("static-v1", "GET", ASSET).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_redirect_is_not_stored() {
        let (db, net, clock) = (CacheDb::open_in_memory().await.unwrap(), ScriptedFetcher::new(), ManualClock::new());
        net.respond(ASSET, 301, "");
        let ctx = context(&db, &net, &clock);

        cache_first(&ctx, "static-v1", &request()).await;

        assert!(db.keys("static-v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offline_miss_is_408() {
        let (db, net, clock) = (CacheDb::open_in_memory().await.unwrap(), ScriptedFetcher::new(), ManualClock::new());
        let ctx = context(&db, &net, &clock);

        let outcome = cache_first(&ctx, "static-v1", &request()).await;

        assert!(matches!(outcome, Outcome::Failed(SyntheticStatus::RequestTimeout)));
        assert_eq!(outcome.into_response(Url::parse(ASSET).unwrap()).status.as_u16(), 408);
    }

    #[tokio::test]
    async fn test_hung_network_times_out_to_408() {
        let (db, net, clock) = (CacheDb::open_in_memory().await.unwrap(), ScriptedFetcher::new(), ManualClock::new());
        net.hang(ASSET);
        let ctx = context(&db, &net, &clock);

        let outcome = cache_first(&ctx, "static-v1", &request()).await;

        assert_eq!(outcome.status().as_u16(), 408);
    }
}
