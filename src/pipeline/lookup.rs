//! Tracking service client: request building, bounded retry, response interpretation.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::app::ports::TrackingServicePort;
use crate::constants::{DEFAULT_BACKOFF_SECS, DEFAULT_MAX_ATTEMPTS};
use crate::observability::LookupMetrics;
use crate::pipeline::processing::carriers::CarrierCatalog;
use crate::pipeline::processing::consignment::LookupKey;
use crate::types::Direction;

/// Wire body of a lookup call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupRequest {
    pub line: String,
    pub consignment: String,
    pub direction: String,
}

impl LookupRequest {
    /// Build a request, unifying the carrier name through the catalog
    pub fn new(catalog: &CarrierCatalog, line: &str, consignment: &str, direction: &Direction) -> Self {
        Self {
            line: catalog.canonical_or_raw(line),
            consignment: consignment.to_string(),
            direction: direction.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total calls per identifier, the first one included
    pub max_attempts: u32,
    /// Fixed pause between two calls
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::from_secs(DEFAULT_BACKOFF_SECS),
        }
    }
}

/// Result of looking up one identifier (or one multi-segment cell)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Resolved(String),
    /// The service answered, but with nothing usable
    NotFound,
    /// Every attempt failed at the transport level
    Exhausted { attempts: u32 },
}

impl LookupOutcome {
    pub fn port(&self) -> Option<&str> {
        match self {
            LookupOutcome::Resolved(port) => Some(port),
            _ => None,
        }
    }

    pub fn into_port(self) -> Option<String> {
        match self {
            LookupOutcome::Resolved(port) => Some(port),
            _ => None,
        }
    }
}

const PORT_KEYS: [&str; 3] = ["tracking_seaport", "seaport", "port"];

/// Port identifier carried by a response body; falsy bodies carry none.
///
/// Only text can name a port, so truthy bodies without any are "not found"
/// too: `true`, and objects lacking every key in `PORT_KEYS`.
pub fn port_from_response(body: &Value) -> Option<String> {
    match body {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Array(items) => items.iter().find_map(port_from_response),
        Value::Object(map) => PORT_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(port_from_response),
        _ => None,
    }
}

/// Issues lookups one at a time and never fails the caller: transport trouble
/// ends as [`LookupOutcome::Exhausted`].
#[derive(Clone)]
pub struct LookupClient {
    transport: Arc<dyn TrackingServicePort>,
    policy: RetryPolicy,
}

impl LookupClient {
    pub fn new(transport: Arc<dyn TrackingServicePort>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Send one request, retrying transport failures with a fixed backoff
    pub async fn request(&self, request: &LookupRequest) -> LookupOutcome {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            LookupMetrics::record_attempt();

            match self.transport.post_lookup(request).await {
                Ok(body) => {
                    return match port_from_response(&body) {
                        Some(port) => {
                            debug!(line = %request.line, consignment = %request.consignment, %port, "port resolved");
                            LookupMetrics::record_resolved();
                            LookupOutcome::Resolved(port)
                        }
                        None => {
                            debug!(line = %request.line, consignment = %request.consignment, "no port for consignment");
                            LookupMetrics::record_not_found();
                            LookupOutcome::NotFound
                        }
                    };
                }
                Err(err) => {
                    LookupMetrics::record_attempt_error(err.kind());
                    warn!(
                        line = %request.line,
                        consignment = %request.consignment,
                        attempt,
                        max_attempts,
                        error = %err,
                        "tracking lookup attempt failed"
                    );
                    if attempt >= max_attempts {
                        LookupMetrics::record_exhausted();
                        return LookupOutcome::Exhausted { attempts: attempt };
                    }
                    tokio::time::sleep(self.policy.backoff).await;
                }
            }
        }
    }

    /// Port of loading for one identifier, `None` when unresolved for any reason
    pub async fn resolve_port(
        &self,
        catalog: &CarrierCatalog,
        line: &str,
        identifier: &str,
        direction: &Direction,
    ) -> Option<String> {
        let request = LookupRequest::new(catalog, line, identifier, direction);
        self.request(&request).await.into_port()
    }

    /// Look up a row's key. Multi-segment cells try each identifier in order
    /// and stop at the first one the service resolves.
    pub async fn resolve_key(
        &self,
        catalog: &CarrierCatalog,
        line: &str,
        key: &LookupKey,
        direction: &Direction,
    ) -> LookupOutcome {
        if !key.multi_segment {
            let request = LookupRequest::new(catalog, line, &key.value, direction);
            return self.request(&request).await;
        }

        let mut answered = false;
        let mut attempts = 0;
        for segment in &key.segments {
            let request = LookupRequest::new(catalog, line, segment, direction);
            match self.request(&request).await {
                LookupOutcome::Resolved(port) => return LookupOutcome::Resolved(port),
                LookupOutcome::NotFound => answered = true,
                LookupOutcome::Exhausted { attempts: n } => attempts += n,
            }
        }

        if answered {
            LookupOutcome::NotFound
        } else {
            LookupOutcome::Exhausted { attempts }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::TransportError;
    use crate::pipeline::processing::carriers::CatalogSnapshot;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Answers by consignment; unknown consignments fail with a 503
    struct ScriptedTracker {
        answers: HashMap<String, Value>,
        calls: Mutex<Vec<LookupRequest>>,
    }

    impl ScriptedTracker {
        fn new(answers: &[(&str, Value)]) -> Arc<Self> {
            Arc::new(Self {
                answers: answers.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<LookupRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TrackingServicePort for ScriptedTracker {
        async fn post_lookup(&self, request: &LookupRequest) -> Result<Value, TransportError> {
            self.calls.lock().unwrap().push(request.clone());
            self.answers
                .get(&request.consignment)
                .cloned()
                .ok_or(TransportError::Status(503))
        }
    }

    fn catalog() -> CarrierCatalog {
        CatalogSnapshot::new()
            .with_line("REEL SHIPPING", &["REEL", "Reel Shipping Ltd"])
            .multi_segment("REEL SHIPPING")
            .into()
    }

    #[test]
    fn test_request_body_uses_canonical_line() {
        let request = LookupRequest::new(&catalog(), "reel shipping ltd", "ARKAS123456", &Direction::Export);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"line": "REEL SHIPPING", "consignment": "ARKAS123456", "direction": "export"})
        );
        let unknown = LookupRequest::new(&catalog(), "ARKAS", "C1", &Direction::from_field(None));
        assert_eq!(unknown.line, "ARKAS");
        assert_eq!(unknown.direction, "import");
    }

    #[test]
    fn test_port_from_response_truthiness() {
        assert_eq!(port_from_response(&json!("PUSAN")), Some("PUSAN".to_string()));
        assert_eq!(port_from_response(&json!(" ")), None);
        assert_eq!(port_from_response(&json!("")), None);
        assert_eq!(port_from_response(&json!(null)), None);
        assert_eq!(port_from_response(&json!(false)), None);
        assert_eq!(port_from_response(&json!(0)), None);
        assert_eq!(port_from_response(&json!([])), None);
        assert_eq!(port_from_response(&json!(["", "QINGDAO"])), Some("QINGDAO".to_string()));
        assert_eq!(port_from_response(&json!({"port": "NINGBO"})), Some("NINGBO".to_string()));
        assert_eq!(port_from_response(&json!({"other": "x"})), None);
        assert_eq!(port_from_response(&json!(true)), None);
    }

    #[tokio::test]
    async fn test_successful_lookup_is_single_call() {
        let tracker = ScriptedTracker::new(&[("C1", json!("BUSAN"))]);
        let client = LookupClient::new(tracker.clone(), RetryPolicy::default());
        let port = client.resolve_port(&catalog(), "ARKAS", "C1", &Direction::Import).await;
        assert_eq!(port.as_deref(), Some("BUSAN"));
        assert_eq!(tracker.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_answer_is_not_retried() {
        let tracker = ScriptedTracker::new(&[("C1", json!(""))]);
        let client = LookupClient::new(tracker.clone(), RetryPolicy::default());
        let request = LookupRequest::new(&catalog(), "ARKAS", "C1", &Direction::Import);
        assert_eq!(client.request(&request).await, LookupOutcome::NotFound);
        assert_eq!(tracker.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_waits_between_attempts() {
        let tracker = ScriptedTracker::new(&[]);
        let client = LookupClient::new(tracker.clone(), RetryPolicy::default());
        let request = LookupRequest::new(&catalog(), "ARKAS", "C1", &Direction::Import);

        let started = tokio::time::Instant::now();
        let outcome = client.request(&request).await;

        assert_eq!(outcome, LookupOutcome::Exhausted { attempts: 3 });
        assert_eq!(tracker.calls().len(), 3);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(60), "waited {:?}", waited);
        assert!(waited < Duration::from_secs(90), "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_multi_segment_stops_at_first_resolved() {
        let tracker = ScriptedTracker::new(&[
            ("A123", json!("")),
            ("B456", json!("PUSAN")),
            ("C789", json!("SHANGHAI")),
        ]);
        let client = LookupClient::new(tracker.clone(), RetryPolicy::default());
        let catalog = catalog();
        let row = crate::types::ShipmentRow::try_from(json!({"consignment": "A123, B456, C789"})).unwrap();
        let key = LookupKey::extract(&row, &catalog, "REEL SHIPPING").unwrap();

        let outcome = client.resolve_key(&catalog, "REEL", &key, &Direction::Import).await;

        assert_eq!(outcome.port(), Some("PUSAN"));
        let asked: Vec<String> = tracker.calls().into_iter().map(|r| r.consignment).collect();
        assert_eq!(asked, vec!["A123", "B456"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_multi_segment_all_empty_is_not_found() {
        let tracker = ScriptedTracker::new(&[("A123", json!(null)), ("B456", json!(""))]);
        let client = LookupClient::new(tracker, RetryPolicy::default());
        let catalog = catalog();
        let row = crate::types::ShipmentRow::try_from(json!({"consignment": "A123 B456"})).unwrap();
        let key = LookupKey::extract(&row, &catalog, "REEL SHIPPING").unwrap();

        let outcome = client.resolve_key(&catalog, "REEL", &key, &Direction::Import).await;
        assert_eq!(outcome, LookupOutcome::NotFound);
    }
}
