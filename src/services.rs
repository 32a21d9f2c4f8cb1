//! Best-effort TCP port to service-name mapping

use once_cell::sync::Lazy;
use std::collections::HashMap;

static TCP_SERVICES: Lazy<HashMap<u16, &'static str>> = Lazy::new(|| {
    let mut services = HashMap::new();

    services.insert(20, "ftp-data");
    services.insert(21, "ftp");
    services.insert(22, "ssh");
    services.insert(23, "telnet");
    services.insert(25, "smtp");
    services.insert(53, "domain");
    services.insert(80, "http");
    services.insert(110, "pop3");
    services.insert(111, "rpcbind");
    services.insert(135, "msrpc");
    services.insert(139, "netbios-ssn");
    services.insert(143, "imap");
    services.insert(389, "ldap");
    services.insert(443, "https");
    services.insert(445, "microsoft-ds");
    services.insert(465, "smtps");
    services.insert(587, "submission");
    services.insert(631, "ipp");
    services.insert(636, "ldaps");
    services.insert(993, "imaps");
    services.insert(995, "pop3s");
    services.insert(1433, "mssql");
    services.insert(1521, "oracle");
    services.insert(2049, "nfs");
    services.insert(3306, "mysql");
    services.insert(3389, "rdp");
    services.insert(5432, "postgresql");
    services.insert(5672, "amqp");
    services.insert(5900, "vnc");
    services.insert(5984, "couchdb");
    services.insert(6379, "redis");
    services.insert(8080, "http-proxy");
    services.insert(8443, "https-alt");
    services.insert(9200, "elasticsearch");
    services.insert(11211, "memcached");
    services.insert(27017, "mongodb");

    services
});

/// Look up the conventional service name for a TCP port.
/// Absence of a mapping is not an error.
pub fn service_name(port: u16) -> Option<&'static str> {
    TCP_SERVICES.get(&port).copied()
}
