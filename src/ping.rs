//! Host reachability probing via the platform ping utility
//!
//! The child process is spawned on a blocking worker so its wait never
//! stalls the async scheduler. Success is defined by the process exit
//! code alone: a run with partial packet loss but exit code 0 still
//! reports `success=true`. Statistics extraction is a pure function over
//! the captured output; lines the parser does not recognize leave the
//! numeric fields at their defaults without failing the call.

use crate::config::EngineConfig;
use crate::result::ActionResult;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

const RAW_OUTPUT_LIMIT: usize = 2000;

static LOSS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\d.]+)\s*%\s*(?:packet\s+)?loss").unwrap());

// Linux: "rtt min/avg/max/mdev = 0.040/0.052/0.063/0.011 ms"
// macOS: "round-trip min/avg/max/stddev = 0.049/0.063/0.077/0.014 ms"
static RTT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:rtt|round-trip)\s+min/avg/max(?:/(?:mdev|stddev))?\s*=\s*([\d.]+)/([\d.]+)/([\d.]+)")
        .unwrap()
});

// Windows: "Minimum = 1ms, Maximum = 4ms, Average = 2ms"
static WIN_RTT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Minimum\s*=\s*([\d.]+)ms,\s*Maximum\s*=\s*([\d.]+)ms,\s*Average\s*=\s*([\d.]+)ms")
        .unwrap()
});

/// Round-trip and loss figures scraped from ping output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PingStatistics {
    pub packet_loss_pct: f64,
    pub rtt_min_ms: f64,
    pub rtt_avg_ms: f64,
    pub rtt_max_ms: f64,
}

/// Probes host reachability through the platform ping binary
#[derive(Debug, Clone)]
pub struct PingProber {
    grace: Duration,
}

impl PingProber {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            grace: Duration::from_secs(config.ping_grace_secs),
        }
    }

    /// Ping a host `count` times with a per-packet timeout in seconds.
    /// The overall wait is bounded by `count * timeout + grace`.
    pub async fn ping(&self, host: &str, count: u32, timeout_per_packet: f64) -> ActionResult {
        let host = host.trim().to_string();
        if host.is_empty() {
            return ActionResult::failure("host must not be empty");
        }
        if count == 0 {
            return ActionResult::failure("count must be at least 1");
        }

        let overall = match crate::config::duration_from_secs(timeout_per_packet * count as f64) {
            Ok(wait) => wait.saturating_add(self.grace),
            Err(e) => return ActionResult::failure(e.to_string()),
        };
        let args = ping_args(&host, count, timeout_per_packet);

        log::debug!("ping {} (count={count}, timeout={timeout_per_packet}s)", host);

        // The process wait is blocking; keep it off the async scheduler.
        let handle = tokio::task::spawn_blocking(move || run_ping("ping", &args, overall));

        let run = match handle.await {
            Ok(Ok(run)) => run,
            Ok(Err(e)) => {
                return ActionResult::failure(format!("failed to run ping: {e}"));
            }
            Err(e) => {
                return ActionResult::failure(format!("ping worker failed: {e}"));
            }
        };

        let stats = parse_ping_output(&run.stdout);
        let exit_code = run.status.and_then(|s| s.code());

        let mut raw = run.stdout;
        if !run.stderr.trim().is_empty() {
            raw.push('\n');
            raw.push_str(run.stderr.trim());
        }
        if raw.len() > RAW_OUTPUT_LIMIT {
            let mut cut = RAW_OUTPUT_LIMIT;
            while !raw.is_char_boundary(cut) {
                cut -= 1;
            }
            raw.truncate(cut);
        }

        let data = json!({
            "host": host,
            "packets_sent": count,
            "packet_loss_pct": stats.packet_loss_pct,
            "rtt_min_ms": stats.rtt_min_ms,
            "rtt_avg_ms": stats.rtt_avg_ms,
            "rtt_max_ms": stats.rtt_max_ms,
            "exit_code": exit_code,
            "raw_output": raw,
        });

        // Success tracks the exit code only, not the reported loss.
        match run.status {
            Some(status) if status.success() => ActionResult::ok(data),
            Some(_) => {
                let mut result = ActionResult::failure(format!(
                    "ping of {host} exited with status {}",
                    exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string())
                ));
                result.data = data;
                result
            }
            None => {
                let mut result = ActionResult::failure(format!(
                    "ping of {host} exceeded the {}s wait bound and was killed",
                    overall.as_secs()
                ));
                result.data = data;
                result
            }
        }
    }
}

struct PingRun {
    /// None when the wait bound elapsed and the child was killed
    status: Option<ExitStatus>,
    stdout: String,
    stderr: String,
}

/// Spawn the ping binary and wait for it with a deadline. On the deadline
/// the child is killed and reaped rather than abandoned; whatever output
/// it buffered is still collected. Runs on a blocking worker thread.
fn run_ping(program: &str, args: &[String], deadline: Duration) -> std::io::Result<PingRun> {
    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }
        if started.elapsed() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            break None;
        }
        std::thread::sleep(Duration::from_millis(50));
    };

    let mut stdout = String::new();
    if let Some(mut pipe) = child.stdout.take() {
        let _ = pipe.read_to_string(&mut stdout);
    }
    let mut stderr = String::new();
    if let Some(mut pipe) = child.stderr.take() {
        let _ = pipe.read_to_string(&mut stderr);
    }

    Ok(PingRun {
        status,
        stdout,
        stderr,
    })
}

/// OS-specific ping argument syntax. `packets_sent` in the result echoes
/// the requested count, so the count flag is authoritative here.
fn ping_args(host: &str, count: u32, timeout_per_packet: f64) -> Vec<String> {
    if cfg!(target_os = "windows") {
        let timeout_ms = (timeout_per_packet * 1000.0).max(1.0) as u64;
        vec![
            "-n".to_string(),
            count.to_string(),
            "-w".to_string(),
            timeout_ms.to_string(),
            host.to_string(),
        ]
    } else {
        let timeout_secs = (timeout_per_packet.ceil() as u64).max(1);
        vec![
            "-c".to_string(),
            count.to_string(),
            "-W".to_string(),
            timeout_secs.to_string(),
            host.to_string(),
        ]
    }
}

/// Extract loss and RTT statistics from captured ping output.
/// Unrecognized output leaves the defaults in place.
pub fn parse_ping_output(output: &str) -> PingStatistics {
    let mut stats = PingStatistics::default();

    if let Some(caps) = LOSS_RE.captures(output) {
        if let Ok(loss) = caps[1].parse::<f64>() {
            stats.packet_loss_pct = loss;
        }
    }

    if let Some(caps) = RTT_RE.captures(output) {
        stats.rtt_min_ms = caps[1].parse().unwrap_or(0.0);
        stats.rtt_avg_ms = caps[2].parse().unwrap_or(0.0);
        stats.rtt_max_ms = caps[3].parse().unwrap_or(0.0);
    } else if let Some(caps) = WIN_RTT_RE.captures(output) {
        stats.rtt_min_ms = caps[1].parse().unwrap_or(0.0);
        stats.rtt_max_ms = caps[2].parse().unwrap_or(0.0);
        stats.rtt_avg_ms = caps[3].parse().unwrap_or(0.0);
    }

    stats
}
