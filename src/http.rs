//! HTTP request executor
//!
//! Issues a single HTTP(S) request per call and reports the raw response
//! (status, headers, body text, timing) through the result envelope.
//! Transport failures never escape as errors; they become failed envelopes.

use crate::config::EngineConfig;
use crate::result::ActionResult;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{Duration, Instant};

const ALLOWED_METHODS: [&str; 5] = ["GET", "POST", "PUT", "DELETE", "PATCH"];
const MAX_REDIRECTS: usize = 10;

/// Per-call request options. Everything beyond the URL is optional.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: String,
    pub headers: Option<HashMap<String, String>>,
    pub body: Option<Value>,
    pub params: Option<HashMap<String, String>>,
    pub timeout: Option<f64>,
    pub follow_redirects: bool,
    pub verify_tls: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            headers: None,
            body: None,
            params: None,
            timeout: None,
            follow_redirects: true,
            verify_tls: true,
        }
    }
}

/// Executes HTTP requests with engine-wide defaults
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    default_timeout: Duration,
    user_agent: String,
}

impl HttpExecutor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            default_timeout: crate::config::duration_from_secs(config.http_timeout_secs)
                .unwrap_or_else(|_| Duration::from_secs(30)),
            user_agent: config.user_agent.clone(),
        }
    }

    /// Issue one HTTP request and wrap the outcome in an envelope.
    pub async fn execute(&self, url: &str, opts: RequestOptions) -> ActionResult {
        let method = match normalize_method(&opts.method) {
            Some(m) => m,
            None => {
                return ActionResult::failure(format!(
                    "unsupported HTTP method: {}",
                    opts.method
                ));
            }
        };

        // Parse up front so the redirect comparison below is against the
        // normalized form, not the caller's raw spelling.
        let parsed_url = match reqwest::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => parsed,
            _ => return ActionResult::failure(format!("URL must be absolute: {url}")),
        };

        let timeout = match opts.timeout {
            None => self.default_timeout,
            Some(secs) => match crate::config::duration_from_secs(secs) {
                Ok(timeout) => timeout,
                Err(e) => return ActionResult::failure(e.to_string()),
            },
        };

        let redirect_policy = if opts.follow_redirects {
            Policy::limited(MAX_REDIRECTS)
        } else {
            Policy::none()
        };

        let client = match reqwest::Client::builder()
            .redirect(redirect_policy)
            .danger_accept_invalid_certs(!opts.verify_tls)
            .timeout(timeout)
            .build()
        {
            Ok(client) => client,
            Err(e) => return ActionResult::failure(format!("failed to build HTTP client: {e}")),
        };

        let headers = build_headers(&self.user_agent, opts.headers.as_ref());
        let json_body = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.to_ascii_lowercase().contains("json"))
            .unwrap_or(false);

        let mut request = client
            .request(method.clone(), parsed_url.clone())
            .headers(headers);

        if let Some(params) = &opts.params {
            request = request.query(params);
        }

        if let Some(body) = &opts.body {
            request = match body {
                // String bodies pass through verbatim
                Value::String(s) => request.body(s.clone()),
                // Structured bodies are serialized as JSON only under a
                // JSON content-type; otherwise sent as their text rendering
                other if json_body => request.json(other),
                other => request.body(other.to_string()),
            };
        }

        let start = Instant::now();
        log::debug!("{} {}", method, url);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let reason = describe_transport_error(&e);
                log::warn!("{} {} failed: {}", method, url, reason);
                return ActionResult::failure(reason)
                    .with_metadata("url", json!(url))
                    .with_metadata("method", json!(method.as_str()));
            }
        };

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let response_headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let content_type = response_headers.get("content-type").cloned();
        let encoding = content_type
            .as_deref()
            .and_then(detect_charset)
            .unwrap_or_else(|| "utf-8".to_string());

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                return ActionResult::failure(format!("failed to read response body: {e}"))
                    .with_metadata("url", json!(url));
            }
        };
        let elapsed = start.elapsed().as_secs_f64();

        // Report the pre-redirect URL only when the chain actually moved
        let redirected_from = if opts.follow_redirects && final_url != parsed_url.as_str() {
            Some(parsed_url.to_string())
        } else {
            None
        };

        ActionResult::ok(json!({
            "status": status,
            "headers": response_headers,
            "body": String::from_utf8_lossy(&bytes).into_owned(),
            "content_type": content_type,
            "encoding": encoding,
            "response_time": elapsed,
            "size_bytes": bytes.len(),
            "url": final_url,
            "redirected_from": redirected_from,
        }))
        .with_metadata("method", json!(method.as_str()))
    }
}

/// Normalize a method string to one of the supported verbs
fn normalize_method(method: &str) -> Option<Method> {
    let upper = method.trim().to_ascii_uppercase();
    if ALLOWED_METHODS.contains(&upper.as_str()) {
        Method::from_bytes(upper.as_bytes()).ok()
    } else {
        None
    }
}

/// Default identifying headers, overridden by anything the caller supplies
fn build_headers(user_agent: &str, caller: Option<&HashMap<String, String>>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(user_agent) {
        headers.insert(USER_AGENT, value);
    }
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

    if let Some(caller) = caller {
        for (name, value) in caller {
            let parsed_name = name.parse::<HeaderName>();
            let parsed_value = HeaderValue::from_str(value);
            match (parsed_name, parsed_value) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => log::warn!("skipping invalid header: {name}"),
            }
        }
    }

    headers
}

/// Pull a charset out of a content-type header value
fn detect_charset(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("charset="))
        .map(|cs| cs.trim_matches('"').to_ascii_lowercase())
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else if e.is_redirect() {
        format!("redirect policy violated: {e}")
    } else {
        format!("request failed: {e}")
    }
}
