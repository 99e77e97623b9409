//! Bootstrap resolution of DoT/DoH upstream hostnames.
//!
//! A stateless lookup over a list of IP-literal resolvers: each bootstrap
//! server is asked for A and AAAA in turn until one answers. IP-literal
//! hostnames bypass lookup entirely. A small LRU keeps recently-resolved
//! hostnames for one minute.

use super::udp::UdpTransport;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RData, RecordType};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use lru::LruCache;
use sentinel_dns_domain::DomainError;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::{LazyLock, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

const CACHE_TTL: Duration = Duration::from_secs(60);

static LOOKUP_CACHE: LazyLock<Mutex<LruCache<String, (Vec<IpAddr>, Instant)>>> =
    LazyLock::new(|| Mutex::new(LruCache::new(NonZeroUsize::new(32).unwrap())));

/// Resolve a hostname to addresses, ordered by family preference
/// (IPv4-first when `prefer_ipv4`, IPv6-first otherwise).
pub async fn resolve_host(
    host: &str,
    bootstrap: &[IpAddr],
    prefer_ipv4: bool,
    deadline: Instant,
) -> Result<Vec<IpAddr>, DomainError> {
    if let Ok(literal) = IpAddr::from_str(host) {
        return Ok(vec![literal]);
    }

    if let Some(cached) = cache_get(host) {
        return Ok(order_by_family(cached, prefer_ipv4));
    }

    let addrs = if bootstrap.is_empty() {
        system_lookup(host, deadline).await?
    } else {
        bootstrap_lookup(host, bootstrap, deadline).await?
    };

    if addrs.is_empty() {
        return Err(DomainError::UpstreamIo(format!("no addresses found for {}", host)));
    }

    cache_put(host, &addrs);
    Ok(order_by_family(addrs, prefer_ipv4))
}

fn cache_get(host: &str) -> Option<Vec<IpAddr>> {
    let mut cache = LOOKUP_CACHE.lock().ok()?;
    match cache.get(host) {
        Some((addrs, stored_at)) if stored_at.elapsed() < CACHE_TTL => Some(addrs.clone()),
        Some(_) => {
            cache.pop(host);
            None
        }
        None => None,
    }
}

fn cache_put(host: &str, addrs: &[IpAddr]) {
    if let Ok(mut cache) = LOOKUP_CACHE.lock() {
        cache.put(host.to_string(), (addrs.to_vec(), Instant::now()));
    }
}

async fn system_lookup(host: &str, deadline: Instant) -> Result<Vec<IpAddr>, DomainError> {
    let target = format!("{}:0", host);
    let addrs = tokio::time::timeout_at(deadline, tokio::net::lookup_host(target))
        .await
        .map_err(|_| DomainError::UpstreamTimeout { server: host.to_string() })?
        .map_err(|e| DomainError::UpstreamIo(format!("system lookup {}: {}", host, e)))?;
    Ok(addrs.map(|sa| sa.ip()).collect())
}

async fn bootstrap_lookup(
    host: &str,
    bootstrap: &[IpAddr],
    deadline: Instant,
) -> Result<Vec<IpAddr>, DomainError> {
    let mut last_error = None;

    for &resolver in bootstrap {
        let (v4, v6) = tokio::join!(
            lookup_one(resolver, host, RecordType::A, deadline),
            lookup_one(resolver, host, RecordType::AAAA, deadline),
        );

        let mut addrs = Vec::new();
        match (v4, v6) {
            (Ok(mut a), Ok(mut aaaa)) => {
                addrs.append(&mut a);
                addrs.append(&mut aaaa);
            }
            (Ok(mut a), Err(e)) => {
                addrs.append(&mut a);
                last_error = Some(e);
            }
            (Err(e), Ok(mut aaaa)) => {
                addrs.append(&mut aaaa);
                last_error = Some(e);
            }
            (Err(e), Err(_)) => {
                last_error = Some(e);
            }
        }

        if !addrs.is_empty() {
            debug!(host, resolver = %resolver, count = addrs.len(), "Bootstrap lookup resolved");
            return Ok(addrs);
        }
    }

    Err(last_error
        .unwrap_or_else(|| DomainError::UpstreamIo(format!("no bootstrap answer for {}", host))))
}

async fn lookup_one(
    resolver: IpAddr,
    host: &str,
    record_type: RecordType,
    deadline: Instant,
) -> Result<Vec<IpAddr>, DomainError> {
    let request = build_lookup(host, record_type)?;
    let transport = UdpTransport::new(SocketAddr::new(resolver, 53));
    let response = transport.send(&request, deadline).await?;

    let message =
        Message::from_vec(&response).map_err(|e| DomainError::Decode(e.to_string()))?;

    Ok(message
        .answers()
        .iter()
        .filter_map(|record| match record.data() {
            RData::A(a) => Some(IpAddr::V4(a.0)),
            RData::AAAA(aaaa) => Some(IpAddr::V6(aaaa.0)),
            _ => None,
        })
        .collect())
}

fn build_lookup(host: &str, record_type: RecordType) -> Result<Vec<u8>, DomainError> {
    let name = Name::from_utf8(host)
        .map_err(|e| DomainError::InvalidDomainName(format!("{}: {}", host, e)))?;

    let mut query = Query::new();
    query.set_name(name);
    query.set_query_type(record_type);
    query.set_query_class(hickory_proto::rr::DNSClass::IN);

    let mut message = Message::new(fastrand::u16(..), MessageType::Query, OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(query);

    let mut buf = Vec::with_capacity(64);
    let mut encoder = BinEncoder::new(&mut buf);
    message.emit(&mut encoder).map_err(|e| DomainError::Encode(e.to_string()))?;
    Ok(buf)
}

fn order_by_family(mut addrs: Vec<IpAddr>, prefer_ipv4: bool) -> Vec<IpAddr> {
    addrs.sort_by_key(|addr| match (addr.is_ipv4(), prefer_ipv4) {
        (true, true) | (false, false) => 0u8,
        _ => 1u8,
    });
    addrs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_prefers_requested_family() {
        let addrs: Vec<IpAddr> =
            vec!["2606:4700::1".parse().unwrap(), "1.1.1.1".parse().unwrap()];

        let v4_first = order_by_family(addrs.clone(), true);
        assert!(v4_first[0].is_ipv4());

        let v6_first = order_by_family(addrs, false);
        assert!(v6_first[0].is_ipv6());
    }

    #[tokio::test]
    async fn test_literal_bypasses_lookup() {
        let deadline = Instant::now() + Duration::from_millis(10);
        let addrs = resolve_host("1.2.3.4", &[], false, deadline).await.unwrap();
        assert_eq!(addrs, vec!["1.2.3.4".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn test_build_lookup_is_wire_query() {
        let bytes = build_lookup("dns.google", RecordType::A).unwrap();
        assert!(bytes.len() > 12);
        // RD flag set.
        assert_eq!(bytes[2] & 0x01, 0x01);
    }
}
