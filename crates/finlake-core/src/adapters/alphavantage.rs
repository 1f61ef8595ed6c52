use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::{ApiKey, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_MS};
use crate::http_client::{HttpClient, HttpRequest};
use crate::{Domain, PipelineError, Symbol};

/// Keys Alpha Vantage uses in place of data for throttling and bad requests.
const NOTICE_KEYS: [&str; 3] = ["Error Message", "Note", "Information"];

/// One request per (domain, symbol) against the Alpha Vantage query endpoint.
#[derive(Clone)]
pub struct AlphaVantageClient {
    http_client: Arc<dyn HttpClient>,
    api_key: ApiKey,
    base_url: String,
    timeout_ms: u64,
}

impl AlphaVantageClient {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: ApiKey) -> Self {
        Self {
            http_client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Request URL for `domain` and `symbol`, including the API key.
    pub fn endpoint(&self, domain: Domain, symbol: &Symbol) -> String {
        self.endpoint_with_key(domain, symbol, &urlencoding::encode(self.api_key.as_str()))
    }

    /// Request URL with the key masked, safe to log.
    pub fn redacted_endpoint(&self, domain: Domain, symbol: &Symbol) -> String {
        self.endpoint_with_key(domain, symbol, "***")
    }

    fn endpoint_with_key(&self, domain: Domain, symbol: &Symbol, key: &str) -> String {
        let mut endpoint = format!(
            "{}?function={}&symbol={}",
            self.base_url,
            domain.function(),
            urlencoding::encode(symbol.as_str())
        );
        for (name, value) in domain.extra_params() {
            endpoint.push_str(&format!("&{name}={value}"));
        }
        endpoint.push_str(&format!("&apikey={key}"));
        endpoint
    }

    /// Fetch the raw payload for one symbol.
    ///
    /// The payload is returned only when it is a JSON object containing the
    /// domain's required key.
    pub async fn fetch(
        &self,
        domain: Domain,
        symbol: &Symbol,
    ) -> Result<Map<String, Value>, PipelineError> {
        info!(%domain, %symbol, "fetching");
        debug!(url = %self.redacted_endpoint(domain, symbol), "upstream request");

        let request = HttpRequest::get(self.endpoint(domain, symbol))
            .with_header("accept", "application/json")
            .with_timeout_ms(self.timeout_ms);

        let response = self.http_client.execute(request).await.map_err(|e| {
            let kind = if e.timed_out() {
                "alphavantage request timed out"
            } else {
                "alphavantage transport error"
            };
            PipelineError::unavailable(domain, symbol.as_str(), format!("{kind}: {}", e.message()))
        })?;

        if !response.is_success() {
            return Err(PipelineError::unavailable(
                domain,
                symbol.as_str(),
                format!("alphavantage returned status {}", response.status),
            ));
        }

        let payload: Value = serde_json::from_str(&response.body).map_err(|e| {
            PipelineError::malformed(
                domain,
                symbol.as_str(),
                format!("response is not valid JSON: {e}"),
            )
        })?;
        let Value::Object(payload) = payload else {
            return Err(PipelineError::malformed(
                domain,
                symbol.as_str(),
                "response is not a JSON object",
            ));
        };

        validate_payload(domain, symbol, payload)
    }
}

impl std::fmt::Debug for AlphaVantageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlphaVantageClient")
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .finish_non_exhaustive()
    }
}

fn validate_payload(
    domain: Domain,
    symbol: &Symbol,
    payload: Map<String, Value>,
) -> Result<Map<String, Value>, PipelineError> {
    let required = domain.required_key();
    if payload.contains_key(required) {
        return Ok(payload);
    }

    let notice = NOTICE_KEYS.iter().find_map(|key| {
        payload
            .get(*key)
            .and_then(Value::as_str)
            .map(|text| format!("{key}: {text}"))
    });
    let message = match notice {
        Some(notice) => format!("missing '{required}' ({notice})"),
        None => format!("missing '{required}'"),
    };
    Err(PipelineError::malformed(domain, symbol.as_str(), message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::http_client::{HttpError, HttpResponse};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct RecordingHttpClient {
        response: Result<HttpResponse, HttpError>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingHttpClient {
        fn replying(response: Result<HttpResponse, HttpError>) -> Arc<Self> {
            Arc::new(Self {
                response,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .clone()
        }
    }

    impl HttpClient for RecordingHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let response = self.response.clone();
            Box::pin(async move { response })
        }
    }

    fn api_key() -> ApiKey {
        let mut config = PipelineConfig::for_home(".");
        config.api_key = Some("secret-key".to_string());
        config.api_key().expect("key")
    }

    fn jnj() -> Symbol {
        Symbol::parse("JNJ").expect("symbol")
    }

    #[test]
    fn price_endpoint_requests_full_output() {
        let client = AlphaVantageClient::new(
            RecordingHttpClient::replying(Ok(HttpResponse::ok_json("{}"))),
            api_key(),
        );

        assert_eq!(
            client.endpoint(Domain::Prices, &jnj()),
            "https://www.alphavantage.co/query?function=TIME_SERIES_DAILY&symbol=JNJ&outputsize=full&apikey=secret-key"
        );
        assert_eq!(
            client.redacted_endpoint(Domain::Overview, &jnj()),
            "https://www.alphavantage.co/query?function=OVERVIEW&symbol=JNJ&apikey=***"
        );
    }

    #[tokio::test]
    async fn fetch_returns_payload_with_required_key() {
        let http = RecordingHttpClient::replying(Ok(HttpResponse::ok_json(
            r#"{"Symbol":"JNJ","Name":"Johnson & Johnson"}"#,
        )));
        let client = AlphaVantageClient::new(http.clone(), api_key()).with_timeout_ms(2_500);

        let payload = client
            .fetch(Domain::Overview, &jnj())
            .await
            .expect("fetch should succeed");

        assert_eq!(payload.get("Name"), Some(&Value::from("Johnson & Johnson")));
        let requests = http.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].timeout_ms, 2_500);
        assert!(requests[0].url.contains("function=OVERVIEW"));
    }

    #[tokio::test]
    async fn throttling_notice_is_carried_in_malformed_response() {
        let http = RecordingHttpClient::replying(Ok(HttpResponse::ok_json(
            r#"{"Note":"Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#,
        )));
        let client = AlphaVantageClient::new(http, api_key());

        let error = client
            .fetch(Domain::Earnings, &jnj())
            .await
            .expect_err("missing key");

        match error {
            PipelineError::MalformedResponse { domain, message, .. } => {
                assert_eq!(domain, Domain::Earnings);
                assert!(message.contains("annualEarnings"));
                assert!(message.contains("call frequency"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn non_object_body_is_malformed() {
        let http = RecordingHttpClient::replying(Ok(HttpResponse::ok_json("[1,2,3]")));
        let client = AlphaVantageClient::new(http, api_key());

        let error = client
            .fetch(Domain::Prices, &jnj())
            .await
            .expect_err("array body");
        assert!(matches!(error, PipelineError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn transport_failure_and_bad_status_are_unavailable() {
        let timeout = RecordingHttpClient::replying(Err(HttpError::timeout("request timed out")));
        let error = AlphaVantageClient::new(timeout, api_key())
            .fetch(Domain::BalanceSheet, &jnj())
            .await
            .expect_err("timeout");
        match error {
            PipelineError::UpstreamUnavailable { message, .. } => {
                assert!(message.starts_with("alphavantage request timed out"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let server_error = RecordingHttpClient::replying(Ok(HttpResponse {
            status: 503,
            body: String::new(),
        }));
        let error = AlphaVantageClient::new(server_error, api_key())
            .fetch(Domain::BalanceSheet, &jnj())
            .await
            .expect_err("503");
        match error {
            PipelineError::UpstreamUnavailable { message, .. } => {
                assert!(message.contains("503"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
