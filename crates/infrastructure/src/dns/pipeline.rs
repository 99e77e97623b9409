//! Per-query orchestration: decode → decide → synthesize or forward →
//! telemetry.
//!
//! The pipeline never blocks the listener on anything but the upstream
//! call itself; telemetry is enqueue-only and the optional shadow resolve
//! is fire-and-forget.

use crate::dns::wire;
use crate::policy::PolicyCache;
use chrono::{Local, SecondsFormat, Utc};
use sentinel_dns_application::ports::Forwarder;
use sentinel_dns_application::{evaluate, resolve_client, RuntimeCounters};
use sentinel_dns_domain::{
    AllowReason, Decision, ForwardOptions, ListenerTransport, QueryRecord, QueryStatus,
};
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

pub struct QueryPipeline {
    cache: Arc<PolicyCache>,
    forwarder: Arc<dyn Forwarder>,
    counters: Arc<RuntimeCounters>,
    log_tx: mpsc::Sender<QueryRecord>,
    options: ForwardOptions,
    sequence: AtomicU64,
}

impl QueryPipeline {
    pub fn new(
        cache: Arc<PolicyCache>,
        forwarder: Arc<dyn Forwarder>,
        counters: Arc<RuntimeCounters>,
        log_tx: mpsc::Sender<QueryRecord>,
        options: ForwardOptions,
    ) -> Self {
        Self { cache, forwarder, counters, log_tx, options, sequence: AtomicU64::new(0) }
    }

    pub fn counters(&self) -> &Arc<RuntimeCounters> {
        &self.counters
    }

    /// Handle one raw DNS message. `None` means drop (nothing sendable).
    pub async fn handle_query(
        &self,
        packet: &[u8],
        src_ip: IpAddr,
        transport: ListenerTransport,
    ) -> Option<Vec<u8>> {
        let started = Instant::now();

        let message = match wire::decode(packet) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "Dropping undecodable packet");
                return wire::build_header_only_servfail(packet);
            }
        };

        let client_ip = normalize_client_ip(src_ip);
        self.counters.record_query(client_ip, transport);

        let snapshot = self.cache.snapshot();

        let (domain, query_type) = message
            .queries()
            .first()
            .map(|q| {
                let name = q.name().to_utf8();
                (name.trim_end_matches('.').to_string(), q.query_type().to_string())
            })
            .unwrap_or_default();

        let decision = evaluate(&snapshot, &domain, client_ip, Local::now());
        let client_name = resolve_client(&snapshot, client_ip)
            .effective()
            .map(|c| Arc::clone(&c.name));

        let protection_paused =
            matches!(decision, Decision::Allowed { reason: AllowReason::ProtectionPaused });
        let marker = decision.marker();

        let base = RecordBase {
            id: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            domain,
            client: client_name,
            client_ip,
            transport,
            query_type,
            blocklist_id: marker,
            protection_paused,
        };

        match decision {
            Decision::Rewrite { target } => {
                match wire::build_rewrite_answer(&message, &target) {
                    Ok(Some(response)) => {
                        let ips = wire::extract_answer_ips(&response);
                        self.emit(base.finish(QueryStatus::Permitted, started, some_ips(ips)));
                        Some(response)
                    }
                    Ok(None) => {
                        // Qtype outside the synthesizable set: forward.
                        self.forward_and_respond(packet, &snapshot, base, QueryStatus::Permitted, started)
                            .await
                    }
                    Err(e) => {
                        debug!(error = %e, "Rewrite synthesis failed, forwarding");
                        self.forward_and_respond(packet, &snapshot, base, QueryStatus::Permitted, started)
                            .await
                    }
                }
            }
            Decision::BlockedByInternetPause { .. }
            | Decision::BlockedByBlockAll { .. }
            | Decision::BlockedByApp { .. }
            | Decision::BlockedByRule { .. }
            | Decision::BlockedByList { .. } => {
                let response = wire::build_negative_response(packet, wire::RCODE_NXDOMAIN);

                if self.options.shadow_resolve_blocked {
                    self.spawn_shadow_resolve(packet.to_vec(), snapshot.upstream.clone(), base, started);
                } else {
                    self.emit(base.finish(QueryStatus::Blocked, started, None));
                }
                response
            }
            Decision::ShadowBlocked { .. } => {
                self.forward_and_respond(packet, &snapshot, base, QueryStatus::ShadowBlocked, started)
                    .await
            }
            Decision::Allowed { .. } | Decision::PassThrough => {
                self.forward_and_respond(packet, &snapshot, base, QueryStatus::Permitted, started)
                    .await
            }
        }
    }

    async fn forward_and_respond(
        &self,
        packet: &[u8],
        snapshot: &sentinel_dns_application::PolicySnapshot,
        base: RecordBase,
        status: QueryStatus,
        started: Instant,
    ) -> Option<Vec<u8>> {
        let deadline = started + self.options.timeout_for(&snapshot.upstream);

        match self.forwarder.forward(&snapshot.upstream, packet, deadline).await {
            Ok(response) => {
                let ips = match wire::response_rcode(&response) {
                    Some(wire::RCODE_NXDOMAIN) => None,
                    _ => some_ips(wire::extract_answer_ips(&response)),
                };
                self.emit(base.finish(status, started, ips));
                Some(response)
            }
            Err(e) => {
                let transport = snapshot.upstream.transport_name();
                warn!(error = %e, transport, "Upstream forward failed");
                self.counters.record_forward_error(transport, &e.to_string());
                self.emit(base.finish(status, started, None));
                wire::build_negative_response(packet, wire::RCODE_SERVFAIL)
            }
        }
    }

    /// Resolve a blocked query upstream purely to enrich telemetry. The
    /// NXDOMAIN already went to the client; failures here are ignored.
    fn spawn_shadow_resolve(
        &self,
        packet: Vec<u8>,
        upstream: sentinel_dns_domain::UpstreamConfig,
        base: RecordBase,
        started: Instant,
    ) {
        let forwarder = Arc::clone(&self.forwarder);
        let log_tx = self.log_tx.clone();
        let timeout = self.options.timeout_for(&upstream);

        tokio::spawn(async move {
            let deadline = Instant::now() + timeout;
            let ips = match forwarder.forward(&upstream, &packet, deadline).await {
                Ok(response) => match wire::response_rcode(&response) {
                    Some(wire::RCODE_NXDOMAIN) => None,
                    _ => some_ips(wire::extract_answer_ips(&response)),
                },
                Err(_) => None,
            };
            let record = base.finish(QueryStatus::Blocked, started, ips);
            if log_tx.try_send(record).is_err() {
                debug!("Query log channel full, dropping shadow-resolve record");
            }
        });
    }

    fn emit(&self, record: QueryRecord) {
        if self.log_tx.try_send(record).is_err() {
            debug!("Query log channel full, dropping record");
        }
    }
}

/// Record fields known before the response is settled.
struct RecordBase {
    id: u64,
    domain: String,
    client: Option<Arc<str>>,
    client_ip: IpAddr,
    transport: ListenerTransport,
    query_type: String,
    blocklist_id: Option<String>,
    protection_paused: bool,
}

impl RecordBase {
    fn finish(
        self,
        status: QueryStatus,
        started: Instant,
        answer_ips: Option<Vec<IpAddr>>,
    ) -> QueryRecord {
        QueryRecord {
            id: self.id,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            domain: self.domain,
            client: self.client,
            client_ip: self.client_ip,
            transport: self.transport,
            status,
            query_type: self.query_type,
            duration_ms: started.elapsed().as_millis() as u64,
            blocklist_id: self.blocklist_id,
            answer_ips,
            protection_paused: self.protection_paused,
        }
    }
}

fn some_ips(ips: Vec<IpAddr>) -> Option<Vec<IpAddr>> {
    (!ips.is_empty()).then_some(ips)
}

/// Strip IPv4-mapped IPv6 down to plain IPv4 (zone ids never survive into
/// `IpAddr`, so there is nothing else to strip).
fn normalize_client_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}
