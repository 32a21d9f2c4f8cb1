//! TCP port probing: single connect checks and bounded range scans
//!
//! The range scanner fans out in fixed batches of concurrent probes and
//! fully awaits each batch before starting the next, so batches proceed
//! in increasing port order while completion order inside a batch is
//! unspecified. `open_ports` keeps discovery order, not numeric order.

use crate::config::EngineConfig;
use crate::result::ActionResult;
use crate::services::service_name;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

/// Hard cap on ports scanned per range call
pub const MAX_RANGE_PORTS: u16 = 200;

/// Probes dispatched concurrently per batch
pub const BATCH_SIZE: usize = 50;

const CLOSED_PORT_ERROR: &str = "connection refused or timed out";

#[derive(Debug, Clone)]
struct ProbeOutcome {
    port: u16,
    open: bool,
    response_time: f64,
}

/// TCP connect prober
#[derive(Debug, Clone, Default)]
pub struct PortScanner;

impl PortScanner {
    pub fn new(_config: &EngineConfig) -> Self {
        Self
    }

    /// Probe a single port. The probe completing is `success=true` even
    /// when the port is closed; `reachable` is the connect-level signal.
    pub async fn scan_port(&self, host: &str, port: u16, timeout_secs: f64) -> ActionResult {
        let host = host.trim();
        if host.is_empty() {
            return ActionResult::failure("host must not be empty");
        }
        let timeout = match crate::config::duration_from_secs(timeout_secs) {
            Ok(timeout) => timeout,
            Err(e) => return ActionResult::failure(e.to_string()),
        };
        let start = Instant::now();
        // Refusal, timeout, and unresolvable hosts all collapse into one
        // generic closed-port message at this level.
        let (reachable, response_time) = match probe(host, port, timeout).await {
            Ok(outcome) => (outcome.open, outcome.response_time),
            Err(_) => (false, start.elapsed().as_secs_f64()),
        };

        ActionResult::ok(json!({
            "host": host,
            "port": port,
            "reachable": reachable,
            "response_time": response_time,
            "error": if reachable { None } else { Some(CLOSED_PORT_ERROR) },
            "service": service_name(port),
        }))
    }

    /// Scan a bounded port range in fixed concurrent batches.
    ///
    /// At most [`MAX_RANGE_PORTS`] ports are probed; the summary reports
    /// the range actually scanned. Probes that error (as opposed to
    /// finding a closed port) are excluded from every tally and listed in
    /// `probe_errors`. There is no mid-batch cancellation: a caller can
    /// only stop a scan between batches.
    pub async fn scan_ports_range(
        &self,
        host: &str,
        start_port: u16,
        end_port: u16,
        timeout_secs: f64,
    ) -> ActionResult {
        let host = host.trim().to_string();
        if host.is_empty() {
            return ActionResult::failure("host must not be empty");
        }
        if start_port == 0 {
            return ActionResult::failure("start_port must be at least 1");
        }
        if end_port < start_port {
            return ActionResult::failure(format!(
                "end_port {end_port} is below start_port {start_port}"
            ));
        }
        let timeout = match crate::config::duration_from_secs(timeout_secs) {
            Ok(timeout) => timeout,
            Err(e) => return ActionResult::failure(e.to_string()),
        };

        let effective_end = effective_end_port(start_port, end_port);
        let ports: Vec<u16> = (start_port..=effective_end).collect();

        log::debug!(
            "scanning {host} ports {start_port}-{effective_end} in batches of {BATCH_SIZE}"
        );

        let started = Instant::now();
        let mut open_ports = Vec::new();
        let mut open_count = 0usize;
        let mut closed_count = 0usize;
        let mut probe_errors = Vec::new();

        for batch in ports.chunks(BATCH_SIZE) {
            let mut in_flight = FuturesUnordered::new();
            for &port in batch {
                let host = host.clone();
                in_flight.push(tokio::spawn(async move {
                    probe(&host, port, timeout).await
                }));
            }

            // Await the whole batch before the next one starts
            while let Some(joined) = in_flight.next().await {
                match joined {
                    Ok(Ok(outcome)) => {
                        if outcome.open {
                            open_count += 1;
                            open_ports.push(json!({
                                "port": outcome.port,
                                "service": service_name(outcome.port),
                                "response_time": outcome.response_time,
                            }));
                        } else {
                            closed_count += 1;
                        }
                    }
                    Ok(Err(e)) => probe_errors.push(e),
                    Err(e) => probe_errors.push(format!("probe task failed: {e}")),
                }
            }
        }

        let elapsed = started.elapsed().as_secs_f64();
        let total_scanned = open_count + closed_count;
        let scan_rate = if elapsed > 0.0 {
            total_scanned as f64 / elapsed
        } else {
            0.0
        };

        let mut result = ActionResult::ok(json!({
            "host": host,
            "start_port": start_port,
            "end_port": effective_end,
            "total_scanned": total_scanned,
            "open_ports": open_ports,
            "open_count": open_count,
            "closed_count": closed_count,
            "probe_errors": probe_errors,
            "elapsed_seconds": elapsed,
            "scan_rate": scan_rate,
        }));
        if effective_end != end_port {
            result = result.with_metadata("requested_end_port", json!(end_port));
        }
        result
    }
}

/// Effective end of a range after the per-call cap
fn effective_end_port(start_port: u16, end_port: u16) -> u16 {
    end_port.min(start_port.saturating_add(MAX_RANGE_PORTS - 1))
}

/// One TCP connect attempt. `Err` means the probe itself failed (for
/// example the host would not resolve), not that the port is closed.
async fn probe(host: &str, port: u16, timeout: Duration) -> Result<ProbeOutcome, String> {
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| format!("port {port}: address lookup failed: {e}"))?;
    let addr = addrs
        .next()
        .ok_or_else(|| format!("port {port}: no address for host"))?;

    let start = Instant::now();
    let open = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            true
        }
        Ok(Err(_)) => false, // refused
        Err(_) => false,     // timed out
    };

    Ok(ProbeOutcome {
        port,
        open,
        response_time: start.elapsed().as_secs_f64(),
    })
}
