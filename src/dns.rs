//! DNS resolution with an engine-local TTL cache
//!
//! Lookups are cached by `(hostname, record type)` for a fixed window.
//! A cache hit replays the stored envelope unchanged, including its
//! original timestamp and success flag; failed lookups are cached and
//! replayed the same way until they expire. The window is the engine's
//! own freshness bound, not the TTL carried by the records.

use crate::config::EngineConfig;
use crate::result::ActionResult;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::proto::rr::{RData, RecordType};
use trust_dns_resolver::TokioAsyncResolver;

/// Record types queried by [`DnsResolver::get_all_records`], in order
pub const ALL_RECORD_TYPES: [&str; 6] = ["A", "AAAA", "MX", "CNAME", "TXT", "NS"];

struct CacheEntry {
    result: ActionResult,
    created: Instant,
}

/// Explicit DNS cache: map plus per-entry creation stamp.
///
/// The only shared mutable state in the engine. Concurrent misses on the
/// same key may both query and race the write; last write wins.
pub struct DnsCache {
    entries: RwLock<HashMap<(String, String), CacheEntry>>,
    window: Duration,
}

impl DnsCache {
    pub fn new(window: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            window,
        }
    }

    /// Fetch a stored envelope if its entry is still inside the window
    pub async fn get(&self, hostname: &str, record_type: &str) -> Option<ActionResult> {
        let key = (hostname.to_string(), record_type.to_string());
        let entries = self.entries.read().await;
        entries.get(&key).and_then(|entry| {
            if entry.created.elapsed() < self.window {
                Some(entry.result.clone())
            } else {
                None
            }
        })
    }

    /// Store an envelope (success or failure alike) under a key
    pub async fn put(&self, hostname: &str, record_type: &str, result: ActionResult) {
        let key = (hostname.to_string(), record_type.to_string());
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CacheEntry {
                result,
                created: Instant::now(),
            },
        );
    }

    /// Drop one cached entry
    pub async fn invalidate(&self, hostname: &str, record_type: &str) {
        let key = (hostname.to_string(), record_type.to_string());
        self.entries.write().await.remove(&key);
    }

    /// Drop every cached entry
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of entries currently held, stale ones included
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Resolves DNS records through the system resolver, caching by
/// `(hostname, record type)`
pub struct DnsResolver {
    resolver: TokioAsyncResolver,
    cache: DnsCache,
    overall_timeout: Duration,
}

impl DnsResolver {
    pub fn new(config: &EngineConfig) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = config.dns_lookup_timeout();

        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
            cache: DnsCache::new(config.dns_cache_window()),
            overall_timeout: config.dns_overall_timeout(),
        }
    }

    /// The cache owned by this resolver
    pub fn cache(&self) -> &DnsCache {
        &self.cache
    }

    /// Resolve one record type for a hostname.
    ///
    /// Within the cache window the stored envelope is returned unchanged
    /// and no query is issued, whatever its original outcome was.
    pub async fn resolve(&self, hostname: &str, record_type: &str) -> ActionResult {
        let hostname = hostname.trim().to_ascii_lowercase();
        let record_type = record_type.trim().to_ascii_uppercase();

        if hostname.is_empty() {
            return ActionResult::failure("hostname must not be empty");
        }

        let rtype = match parse_record_type(&record_type) {
            Some(rtype) => rtype,
            None => {
                return ActionResult::failure(format!(
                    "unsupported DNS record type: {record_type}"
                ));
            }
        };

        if let Some(cached) = self.cache.get(&hostname, &record_type).await {
            log::debug!("DNS cache hit for {hostname} {record_type}");
            return cached;
        }

        let result = self.query(&hostname, &record_type, rtype).await;
        self.cache.put(&hostname, &record_type, result.clone()).await;
        result
    }

    /// Query every type in [`ALL_RECORD_TYPES`]; a failure for one type
    /// yields an empty list for that type only.
    pub async fn get_all_records(&self, hostname: &str) -> ActionResult {
        let mut per_type = serde_json::Map::new();
        let mut types_found = 0usize;

        for record_type in ALL_RECORD_TYPES {
            let result = self.resolve(hostname, record_type).await;
            let records = if result.success {
                result.data
            } else {
                Value::Array(Vec::new())
            };
            if records.as_array().map(|a| !a.is_empty()).unwrap_or(false) {
                types_found += 1;
            }
            per_type.insert(record_type.to_string(), records);
        }

        ActionResult::ok(json!({
            "hostname": hostname.trim().to_ascii_lowercase(),
            "records": Value::Object(per_type),
            "record_types_found": types_found,
        }))
    }

    async fn query(&self, hostname: &str, record_type: &str, rtype: RecordType) -> ActionResult {
        let lookup = tokio::time::timeout(
            self.overall_timeout,
            self.resolver.lookup(hostname, rtype),
        )
        .await;

        let lookup = match lookup {
            Ok(Ok(lookup)) => lookup,
            Ok(Err(e)) => {
                return ActionResult::failure(format!(
                    "DNS lookup failed for {hostname} ({record_type}): {e}"
                ));
            }
            Err(_) => {
                return ActionResult::failure(format!(
                    "DNS lookup timed out for {hostname} ({record_type})"
                ));
            }
        };

        let records: Vec<Value> = lookup
            .record_iter()
            .filter(|record| record.record_type() == rtype)
            .filter_map(|record| {
                record.data().map(|data| {
                    let mut entry = json!({
                        "name": record.name().to_string(),
                        "record_type": record_type,
                        "value": rdata_value(data),
                        "ttl": record.ttl(),
                    });
                    if let RData::MX(mx) = data {
                        entry["priority"] = json!(mx.preference());
                    }
                    entry
                })
            })
            .collect();

        log::debug!(
            "resolved {} {} record(s) for {hostname}",
            records.len(),
            record_type
        );

        ActionResult::ok(Value::Array(records))
            .with_metadata("hostname", json!(hostname))
            .with_metadata("record_type", json!(record_type))
    }
}

fn parse_record_type(record_type: &str) -> Option<RecordType> {
    match record_type {
        "A" => Some(RecordType::A),
        "AAAA" => Some(RecordType::AAAA),
        "MX" => Some(RecordType::MX),
        "CNAME" => Some(RecordType::CNAME),
        "TXT" => Some(RecordType::TXT),
        "NS" => Some(RecordType::NS),
        _ => None,
    }
}

/// Render one answer's data as the record value string
fn rdata_value(data: &RData) -> String {
    match data {
        RData::A(ip) => ip.to_string(),
        RData::AAAA(ip) => ip.to_string(),
        RData::MX(mx) => mx.exchange().to_string(),
        RData::CNAME(name) => name.to_string(),
        RData::NS(name) => name.to_string(),
        RData::TXT(txt) => txt
            .txt_data()
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .collect::<Vec<_>>()
            .join(""),
        other => other.to_string(),
    }
}
