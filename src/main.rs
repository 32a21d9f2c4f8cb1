//! netdiag CLI - run one diagnostic action and print its envelope

use anyhow::{Context, Result};
use clap::Parser;
use netdiag::{EngineConfig, NetworkEngine};
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(
    name = "netdiag",
    version,
    about = "Network diagnostics: HTTP requests, DNS resolution, ping, TCP port scans",
    after_help = "Actions: http_request, get_request, post_request, put_request,\n\
                  delete_request, patch_request, resolve_dns, get_dns_records,\n\
                  ping_host, scan_port, scan_ports_range"
)]
struct Cli {
    /// Action name to dispatch
    action: String,

    /// Parameters as a JSON object, e.g. '{"host": "127.0.0.1", "port": 22}'
    #[arg(short, long, default_value = "{}")]
    params: String,

    /// DNS cache window in seconds
    #[arg(long, default_value_t = 300)]
    dns_cache_window: u64,

    /// Default HTTP timeout in seconds
    #[arg(long, default_value_t = 30.0)]
    http_timeout: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let params: Value = serde_json::from_str(&cli.params)
        .with_context(|| format!("--params is not valid JSON: {}", cli.params))?;

    let config = EngineConfig::default()
        .with_dns_cache_window(cli.dns_cache_window)
        .with_http_timeout(cli.http_timeout);
    let engine = NetworkEngine::new(config)?;

    let result = engine.execute(&cli.action, &params).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
