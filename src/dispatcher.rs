//! Action dispatch: symbolic action names over a JSON parameter bag
//!
//! The contract the hosting system depends on: every call answers with an
//! [`ActionResult`], whether the action succeeded, failed in transport, or
//! was malformed. Unknown actions and missing parameters are reported as
//! failed envelopes here at the boundary; nothing panics on bad input.

use crate::config::EngineConfig;
use crate::dns::DnsResolver;
use crate::http::{HttpExecutor, RequestOptions};
use crate::ping::PingProber;
use crate::result::ActionResult;
use crate::scanner::PortScanner;
use serde_json::Value;
use std::collections::HashMap;

/// Every action name the engine recognizes, verbatim
pub const ACTIONS: [&str; 11] = [
    "http_request",
    "get_request",
    "post_request",
    "put_request",
    "delete_request",
    "patch_request",
    "resolve_dns",
    "get_dns_records",
    "ping_host",
    "scan_port",
    "scan_ports_range",
];

/// The engine behind the dispatcher: owns one instance of each component.
/// The DNS cache inside lives as long as the engine does.
pub struct NetworkEngine {
    http: HttpExecutor,
    dns: DnsResolver,
    ping: PingProber,
    scanner: PortScanner,
}

impl Default for NetworkEngine {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            http: HttpExecutor::new(&config),
            dns: DnsResolver::new(&config),
            ping: PingProber::new(&config),
            scanner: PortScanner::new(&config),
        }
    }
}

impl NetworkEngine {
    /// Create an engine from a validated configuration
    pub fn new(config: EngineConfig) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self {
            http: HttpExecutor::new(&config),
            dns: DnsResolver::new(&config),
            ping: PingProber::new(&config),
            scanner: PortScanner::new(&config),
        })
    }

    /// Action names this engine can dispatch
    pub fn actions() -> &'static [&'static str] {
        &ACTIONS
    }

    /// The DNS resolver (and through it the cache), for direct use
    pub fn dns(&self) -> &DnsResolver {
        &self.dns
    }

    /// Dispatch one action against a JSON parameter bag.
    pub async fn execute(&self, action: &str, params: &Value) -> ActionResult {
        log::debug!("dispatching action {action}");

        match action {
            "http_request" => {
                let method = str_param(params, "method").unwrap_or_else(|| "GET".to_string());
                self.http_action(params, method).await
            }
            "get_request" => self.http_action(params, "GET".to_string()).await,
            "post_request" => self.http_action(params, "POST".to_string()).await,
            "put_request" => self.http_action(params, "PUT".to_string()).await,
            "delete_request" => self.http_action(params, "DELETE".to_string()).await,
            "patch_request" => self.http_action(params, "PATCH".to_string()).await,
            "resolve_dns" => {
                let hostname = match require_str(params, "hostname") {
                    Ok(hostname) => hostname,
                    Err(result) => return result,
                };
                let record_type =
                    str_param(params, "record_type").unwrap_or_else(|| "A".to_string());
                self.dns.resolve(&hostname, &record_type).await
            }
            "get_dns_records" => {
                let hostname = match require_str(params, "hostname") {
                    Ok(hostname) => hostname,
                    Err(result) => return result,
                };
                self.dns.get_all_records(&hostname).await
            }
            "ping_host" => {
                let host = match require_str(params, "host") {
                    Ok(host) => host,
                    Err(result) => return result,
                };
                let count = u64_param(params, "count").unwrap_or(4).min(u32::MAX as u64) as u32;
                let timeout = f64_param(params, "timeout").unwrap_or(5.0);
                self.ping.ping(&host, count, timeout).await
            }
            "scan_port" => {
                let host = match require_str(params, "host") {
                    Ok(host) => host,
                    Err(result) => return result,
                };
                let port = match require_port(params, "port") {
                    Ok(port) => port,
                    Err(result) => return result,
                };
                let timeout = f64_param(params, "timeout").unwrap_or(3.0);
                self.scanner.scan_port(&host, port, timeout).await
            }
            "scan_ports_range" => {
                let host = match require_str(params, "host") {
                    Ok(host) => host,
                    Err(result) => return result,
                };
                let start_port = match port_param(params, "start_port", 1) {
                    Ok(port) => port,
                    Err(result) => return result,
                };
                let end_port = match port_param(params, "end_port", 1000) {
                    Ok(port) => port,
                    Err(result) => return result,
                };
                let timeout = f64_param(params, "timeout").unwrap_or(1.0);
                self.scanner
                    .scan_ports_range(&host, start_port, end_port, timeout)
                    .await
            }
            unknown => ActionResult::failure(format!("unknown action: {unknown}")),
        }
    }

    async fn http_action(&self, params: &Value, method: String) -> ActionResult {
        let url = match require_str(params, "url") {
            Ok(url) => url,
            Err(result) => return result,
        };

        let opts = RequestOptions {
            method,
            headers: string_map_param(params, "headers"),
            body: params.get("data").filter(|v| !v.is_null()).cloned(),
            params: string_map_param(params, "params"),
            timeout: f64_param(params, "timeout"),
            follow_redirects: bool_param(params, "follow_redirects").unwrap_or(true),
            verify_tls: bool_param(params, "verify_ssl").unwrap_or(true),
        };

        self.http.execute(&url, opts).await
    }
}

fn str_param(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

fn require_str(params: &Value, key: &str) -> Result<String, ActionResult> {
    str_param(params, key)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ActionResult::failure(format!("missing required parameter: {key}")))
}

fn u64_param(params: &Value, key: &str) -> Option<u64> {
    params.get(key).and_then(Value::as_u64)
}

fn f64_param(params: &Value, key: &str) -> Option<f64> {
    params.get(key).and_then(Value::as_f64)
}

fn bool_param(params: &Value, key: &str) -> Option<bool> {
    params.get(key).and_then(Value::as_bool)
}

fn require_port(params: &Value, key: &str) -> Result<u16, ActionResult> {
    let value = params
        .get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| ActionResult::failure(format!("missing required parameter: {key}")))?;
    u16::try_from(value)
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| ActionResult::failure(format!("{key} must be between 1 and 65535")))
}

fn port_param(params: &Value, key: &str, default: u16) -> Result<u16, ActionResult> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_u64()
            .and_then(|v| u16::try_from(v).ok())
            .filter(|p| *p > 0)
            .ok_or_else(|| ActionResult::failure(format!("{key} must be between 1 and 65535"))),
    }
}

fn string_map_param(params: &Value, key: &str) -> Option<HashMap<String, String>> {
    params.get(key).and_then(Value::as_object).map(|obj| {
        obj.iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_unknown_action_names_it_verbatim() {
        let engine = NetworkEngine::default();
        let result = engine.execute("nonexistent_action", &Value::Null).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("nonexistent_action"));
    }

    #[tokio::test]
    async fn test_missing_required_parameter() {
        let engine = NetworkEngine::default();

        let result = engine.execute("scan_port", &json!({"host": "127.0.0.1"})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("port"));

        let result = engine.execute("resolve_dns", &json!({})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("hostname"));

        let result = engine.execute("get_request", &Value::Null).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("url"));
    }

    #[tokio::test]
    async fn test_port_out_of_range_rejected() {
        let engine = NetworkEngine::default();
        let result = engine
            .execute("scan_port", &json!({"host": "127.0.0.1", "port": 70000}))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("65535"));
    }

    #[test]
    fn test_action_table_is_complete() {
        assert_eq!(NetworkEngine::actions().len(), 11);
        assert!(NetworkEngine::actions().contains(&"scan_ports_range"));
    }

    #[test]
    fn test_string_map_param_stringifies_values() {
        let params = json!({"headers": {"X-Retries": 3, "Accept": "text/plain"}});
        let map = string_map_param(&params, "headers").unwrap();
        assert_eq!(map["X-Retries"], "3");
        assert_eq!(map["Accept"], "text/plain");
    }
}
