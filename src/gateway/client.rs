// client.rs
use crate::config::Config;
use crate::gateway::models::SourceResponse;
use crate::gateway::{ComparableSource, CompsQuery, FetchedComparables, GatewayError, RawComparable};
use rand::Rng;
use reqwest::blocking::Client;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("lead_comps/", env!("CARGO_PKG_VERSION"));
const SOLD_PRICES_PATH: &str = "/sold-prices";

/// Delay between attempts: `step * attempt`, capped at `max`, plus up to `jitter`.
#[derive(Debug, Clone, Copy)]
struct Backoff {
    step: Duration,
    max: Duration,
    jitter: Duration,
}

impl Backoff {
    const DEFAULT: Backoff = Backoff {
        step: Duration::from_secs(2),
        max: Duration::from_secs(10),
        jitter: Duration::from_millis(500),
    };

    fn delay(&self, attempt: u32) -> Duration {
        let base = self.step.saturating_mul(attempt).min(self.max);
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// Blocking HTTP client for the comparable-sales API.
///
/// A missing API key is reported from `fetch`, not at construction, so callers that end up
/// served from cache never need one.
pub struct HttpComparableSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    max_attempts: u32,
    backoff: Backoff,
}

impl HttpComparableSource {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
        max_attempts: u32,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            max_attempts: max_attempts.max(1),
            backoff: Backoff::DEFAULT,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        Self::new(
            config.api_base_url.clone(),
            config.api_key.clone(),
            config.api_timeout,
            config.api_max_attempts,
        )
    }

    fn try_fetch(&self, api_key: &str, query: &CompsQuery) -> Result<FetchedComparables, GatewayError> {
        let mut params = vec![
            ("key", api_key.to_string()),
            ("postcode", query.postcode.clone()),
            ("radius", query.radius_miles.to_string()),
            ("max_results", query.max_results.to_string()),
            ("max_age", query.max_age_months.to_string()),
        ];
        if let Some(bedrooms) = query.bedrooms {
            params.push(("bedrooms", bedrooms.to_string()));
        }
        if let Some(property_type) = &query.property_type {
            params.push(("type", property_type.clone()));
        }

        let resp = self
            .client
            .get(format!("{}{}", self.base_url, SOLD_PRICES_PATH))
            .query(&params)
            .send()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_response(&text)
    }
}

impl ComparableSource for HttpComparableSource {
    /// Retries transient failures with capped linear backoff plus jitter and returns the
    /// last error once the attempt budget is spent. Other failures return immediately.
    fn fetch(&self, query: &CompsQuery) -> Result<FetchedComparables, GatewayError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GatewayError::Config("COMPS_API_KEY environment variable not set".into()))?;

        let mut last_err = None;

        for attempt in 1..=self.max_attempts {
            let start = Instant::now();

            match self.try_fetch(api_key, query) {
                Ok(fetched) => {
                    debug!(
                        attempt,
                        elapsed = ?start.elapsed(),
                        count = fetched.comparables.len(),
                        "Comparable source responded"
                    );
                    return Ok(fetched);
                }
                Err(e) if !e.is_retryable() => {
                    warn!(attempt, error = %e, "Comparable source rejected the request");
                    return Err(e);
                }
                Err(e) => {
                    warn!(attempt, elapsed = ?start.elapsed(), error = %e, "Comparable source attempt failed");
                    last_err = Some(e);

                    if attempt < self.max_attempts {
                        std::thread::sleep(self.backoff.delay(attempt));
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| GatewayError::Network("retry loop made no attempts".into())))
    }
}

/// Parses a response body. Records that don't deserialize are counted rather than failing
/// the whole batch.
pub(crate) fn parse_response(text: &str) -> Result<FetchedComparables, GatewayError> {
    let response: SourceResponse =
        serde_json::from_str(text).map_err(|e| GatewayError::JsonParse(e.to_string()))?;

    match response.status.as_deref() {
        Some(status) if status.eq_ignore_ascii_case("success") => {}
        _ => {
            return Err(GatewayError::Api(
                response
                    .message
                    .unwrap_or_else(|| format!("unexpected status {:?}", response.status)),
            ))
        }
    }

    let mut comparables = Vec::with_capacity(response.data.len());
    let mut malformed = 0;
    for value in response.data {
        match serde_json::from_value::<RawComparable>(value) {
            Ok(raw) => comparables.push(raw),
            Err(e) => {
                warn!(error = %e, "Skipping malformed comparable record");
                malformed += 1;
            }
        }
    }

    Ok(FetchedComparables {
        comparables,
        malformed,
        credits_used: response.credits_used.unwrap_or(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn parses_success_payload() {
        let body = r#"{
            "status": "success",
            "credits_used": 2,
            "data": [
                {"address": "1 Oak Road", "price": 250000, "date": "2024-02-01",
                 "bedrooms": 3, "type": "semi-detached", "distance": 0.2, "yield": 5.1},
                {"address": "2 Oak Road", "price": 260000, "date": "2024-03-01"}
            ]
        }"#;
        let fetched = parse_response(body).unwrap();
        assert_eq!(fetched.credits_used, 2);
        assert_eq!(fetched.malformed, 0);
        assert_eq!(fetched.comparables.len(), 2);
        assert_eq!(fetched.comparables[0].property_type.as_deref(), Some("semi-detached"));
        assert_eq!(fetched.comparables[0].rental_yield, Some(5.1));
        assert_eq!(fetched.comparables[1].bedrooms, None);
    }

    #[test]
    fn malformed_records_are_counted() {
        let body = r#"{"status": "success", "data": [
            {"price": "not a number"},
            {"price": 100000, "date": "2024-01-01"}
        ]}"#;
        let fetched = parse_response(body).unwrap();
        assert_eq!(fetched.comparables.len(), 1);
        assert_eq!(fetched.malformed, 1);
        assert_eq!(fetched.credits_used, 1);
    }

    #[test]
    fn empty_result_is_success() {
        let fetched = parse_response(r#"{"status": "success", "data": []}"#).unwrap();
        assert!(fetched.comparables.is_empty());
    }

    #[test]
    fn api_errors_surface() {
        let err = parse_response(r#"{"status": "error", "message": "Invalid API key"}"#).unwrap_err();
        assert!(matches!(err, GatewayError::Api(msg) if msg == "Invalid API key"));

        let err = parse_response("<html>").unwrap_err();
        assert!(matches!(err, GatewayError::JsonParse(_)));
    }

    fn query() -> CompsQuery {
        CompsQuery {
            postcode: "M1 1AE".to_string(),
            bedrooms: Some(2),
            property_type: Some("flat".to_string()),
            radius_miles: 1.0,
            max_results: 20,
            max_age_months: 18,
        }
    }

    /// Answers every request with the same status and body, counting requests.
    fn stub_api(status_line: &'static str, body: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);
                let response = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });

        (format!("http://{addr}"), hits)
    }

    fn source_for(base_url: String, api_key: Option<&str>) -> HttpComparableSource {
        HttpComparableSource {
            client: Client::builder().no_proxy().build().unwrap(),
            base_url,
            api_key: api_key.map(str::to_string),
            max_attempts: 3,
            backoff: Backoff {
                step: Duration::ZERO,
                max: Duration::ZERO,
                jitter: Duration::ZERO,
            },
        }
    }

    #[test]
    fn server_errors_use_every_attempt() {
        let (url, hits) = stub_api("500 Internal Server Error", "{}");
        let err = source_for(url, Some("k")).fetch(&query()).unwrap_err();

        assert!(matches!(err, GatewayError::Http { status: 500, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn rate_limits_are_retried() {
        let (url, hits) = stub_api("429 Too Many Requests", "{}");
        let err = source_for(url, Some("k")).fetch(&query()).unwrap_err();

        assert!(matches!(err, GatewayError::Http { status: 429, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn client_errors_are_not_retried() {
        let (url, hits) = stub_api("400 Bad Request", "{}");
        let err = source_for(url, Some("k")).fetch(&query()).unwrap_err();

        assert!(matches!(err, GatewayError::Http { status: 400, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn api_rejections_are_not_retried() {
        let (url, hits) = stub_api("200 OK", r#"{"status": "error", "message": "Invalid API key"}"#);
        let err = source_for(url, Some("k")).fetch(&query()).unwrap_err();

        assert!(matches!(err, GatewayError::Api(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn success_returns_parsed_records() {
        let (url, hits) = stub_api(
            "200 OK",
            r#"{"status": "success", "credits_used": 1, "data": [{"price": 100000, "date": "2024-01-01"}]}"#,
        );
        let fetched = source_for(url, Some("k")).fetch(&query()).unwrap();

        assert_eq!(fetched.comparables.len(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_api_key_fails_at_fetch_without_a_request() {
        let (url, hits) = stub_api("200 OK", r#"{"status": "success", "data": []}"#);

        let source = HttpComparableSource::from_config(&Config {
            api_base_url: url,
            ..Config::default()
        })
        .unwrap();
        assert!(matches!(source.fetch(&query()), Err(GatewayError::Config(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn backoff_is_capped() {
        let backoff = Backoff {
            jitter: Duration::ZERO,
            ..Backoff::DEFAULT
        };
        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(3), Duration::from_secs(6));
        assert_eq!(backoff.delay(9), Duration::from_secs(10));
    }
}
