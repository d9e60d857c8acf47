//! Scripted HTTP backend shared by the unit tests.

use crate::transport::backend::{HttpBackend, HttpReply};
use crate::transport::error::BackendError;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

type Responder =
    Box<dyn Fn(&str, &[(String, String)]) -> Result<HttpReply, BackendError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        query_param(&self.query, key)
    }
}

/// Answers every GET with whatever the responder returns and remembers each request.
pub struct ScriptedBackend {
    responder: Responder,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedBackend {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &[(String, String)]) -> Result<HttpReply, BackendError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replies with the given results in order, then with 404 once the script runs out.
    pub fn sequence(replies: Vec<Result<HttpReply, BackendError>>) -> Self {
        let replies = Mutex::new(VecDeque::from(replies));
        Self::new(move |url, _| {
            replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(HttpReply::new(404, format!("script exhausted at {url}"))))
        })
    }

    /// Answers like `get` without recording the request.
    pub fn respond(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<HttpReply, BackendError> {
        (self.responder)(url, query)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl HttpBackend for ScriptedBackend {
    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpReply, BackendError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.to_string(),
            query: query.to_vec(),
        });
        (self.responder)(url, query)
    }
}

pub fn query_param<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// A `{meta, results}` envelope as the API returns it.
pub fn envelope(results: Vec<Value>, found: Option<usize>) -> HttpReply {
    let body = json!({
        "meta": { "name": "openaq-api", "page": 1, "limit": 100, "found": found },
        "results": results,
    });
    HttpReply::new(200, body.to_string())
}

pub fn location_json(id: i64, name: &str, locality: &str, country: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "locality": locality,
        "timezone": "America/Santiago",
        "country": { "id": 3, "code": country, "name": "Chile" },
        "provider": { "id": 164, "name": "Chile - SINCA" },
        "isMobile": false,
        "isMonitor": true,
        "coordinates": { "latitude": -33.0 - id as f64 / 100.0, "longitude": -71.5 },
        "datetimeFirst": { "utc": "2016-01-01T00:00:00Z", "local": "2015-12-31T21:00:00-03:00" },
        "datetimeLast": { "utc": "2024-05-01T00:00:00Z", "local": "2024-04-30T20:00:00-04:00" },
    })
}

pub fn sensor_json(id: i64, parameter: &str, units: &str) -> Value {
    json!({
        "id": id,
        "name": format!("{parameter} {units}"),
        "parameter": { "id": 2, "name": parameter, "units": units, "displayName": parameter.to_uppercase() },
    })
}

pub fn measurement_json(value: f64, hour: u32) -> Value {
    json!({
        "value": value,
        "parameter": { "id": 2, "name": "pm25", "units": "µg/m³" },
        "period": {
            "label": "raw",
            "interval": "01:00:00",
            "datetimeFrom": {
                "utc": format!("2024-03-01T{:02}:00:00Z", hour),
                "local": format!("2024-03-01T{:02}:00:00-03:00", hour),
            },
            "datetimeTo": {
                "utc": format!("2024-03-01T{:02}:00:00Z", hour + 1),
                "local": format!("2024-03-01T{:02}:00:00-03:00", hour + 1),
            },
        },
        "coverage": { "percentComplete": 100.0, "percentCoverage": 100.0 },
    })
}
