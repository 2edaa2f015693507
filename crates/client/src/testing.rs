//! Test doubles: a scripted network that records every call, and a clock
//! that only moves when told to.

use crate::clock::Clock;
use crate::fetch::{FetchRequest, FetchResponse, Fetcher};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use std::collections::HashMap;
use std::sync::Mutex;
use waystation_core::Error;

#[derive(Debug, Clone)]
enum Scripted {
    Respond(u16, String),
    Hang,
}

/// Fetcher answering from a per-URL script. Unscripted URLs behave as offline.
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    routes: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<(Method, String)>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Scripted::Respond(status, body.to_string()));
    }

    pub fn offline(&self, url: &str) {
        self.routes.lock().unwrap().remove(url);
    }

    pub fn hang(&self, url: &str) {
        self.routes.lock().unwrap().insert(url.to_string(), Scripted::Hang);
    }

    pub fn calls(&self) -> Vec<(Method, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(_, u)| u == url).count()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, Error> {
        let url = request.url.to_string();
        self.calls.lock().unwrap().push((request.method.clone(), url.clone()));
        let scripted = self.routes.lock().unwrap().get(&url).cloned();

        match scripted {
            Some(Scripted::Respond(status, body)) => {
                let mut headers = HeaderMap::new();
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
                Ok(FetchResponse {
                    url: request.url.clone(),
                    status: StatusCode::from_u16(status).unwrap(),
                    headers,
                    bytes: Bytes::from(body),
                    fetch_ms: 1,
                })
            }
            Some(Scripted::Hang) => std::future::pending().await,
            None => Err(Error::Network(format!("{url}: offline"))),
        }
    }
}

/// Clock that starts at a fixed instant and moves only on `advance`.
pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { now: Mutex::new(Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()) }
    }

    pub fn advance(&self, by: chrono::TimeDelta) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
