//! Pipeline behavior over a real SQLite-backed policy cache.

mod helpers;

use helpers::*;
use hickory_proto::rr::{rdata, RData, RecordType};
use sentinel_dns_domain::{ForwardOptions, ListenerTransport, QueryStatus};
use std::net::IpAddr;

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

#[tokio::test]
async fn rewrite_answers_locally_without_upstream() {
    let mut h = harness(ForwardOptions::default(), Script::Echo).await;
    insert_setting(
        &h.pool,
        "dns_rewrites",
        serde_json::json!([{"id": 1, "domain": "printer.lan", "target": "192.168.1.10", "wildcard": false}]),
    )
    .await;
    h.cache.refresh_now().await.unwrap();

    let query = build_query(0x5151, "printer.lan.", RecordType::A);
    let response = h
        .pipeline
        .handle_query(&query, ip("10.0.0.5"), ListenerTransport::Udp)
        .await
        .unwrap();

    let decoded = decode(&response);
    assert_eq!(decoded.id(), 0x5151);
    assert_eq!(decoded.answers().len(), 1);
    assert_eq!(decoded.answers()[0].ttl(), 60);
    assert_eq!(
        decoded.answers()[0].data(),
        &RData::A(rdata::A("192.168.1.10".parse().unwrap()))
    );
    assert_eq!(h.forwarder.call_count(), 0);

    let record = h.records.recv().await.unwrap();
    assert_eq!(record.status, QueryStatus::Permitted);
    assert_eq!(record.domain, "printer.lan");
    assert_eq!(record.answer_ips.as_deref(), Some(&[ip("192.168.1.10")][..]));
}

#[tokio::test]
async fn blocked_query_returns_nxdomain_with_marker() {
    let mut h = harness(ForwardOptions::default(), Script::Echo).await;
    insert_blocklist(&h.pool, 1, "Ads", "https://example.com/ads.txt", true, "ACTIVE").await;
    insert_rule(&h.pool, "ads.example", "BLOCKED", "Blocklist:1:Ads").await;
    h.cache.refresh_now().await.unwrap();

    let query = build_query(0x0707, "ads.example.", RecordType::A);
    let response = h
        .pipeline
        .handle_query(&query, ip("10.0.0.5"), ListenerTransport::Udp)
        .await
        .unwrap();

    let decoded = decode(&response);
    assert_eq!(decoded.id(), 0x0707);
    assert_eq!(decoded.response_code().low(), 3);
    assert_eq!(decoded.queries().len(), 1);
    assert_eq!(decoded.queries()[0].name().to_utf8(), "ads.example.");
    assert!(decoded.answers().is_empty());
    assert_eq!(h.forwarder.call_count(), 0);

    let record = h.records.recv().await.unwrap();
    assert_eq!(record.status, QueryStatus::Blocked);
    assert_eq!(record.blocklist_id.as_deref(), Some("Blocklist:1:Ads"));
    assert!(record.answer_ips.is_none());
}

#[tokio::test]
async fn passthrough_forwards_and_logs_permitted() {
    let mut h = harness(ForwardOptions::default(), Script::Echo).await;
    h.cache.refresh_now().await.unwrap();

    let query = build_query(9, "example.com.", RecordType::A);
    let response = h
        .pipeline
        .handle_query(&query, ip("192.168.1.7"), ListenerTransport::Tcp)
        .await
        .unwrap();

    assert_eq!(h.forwarder.call_count(), 1);
    assert_eq!(&response[..2], &query[..2]);

    let record = h.records.recv().await.unwrap();
    assert_eq!(record.status, QueryStatus::Permitted);
    assert_eq!(record.transport, ListenerTransport::Tcp);
    assert_eq!(record.query_type, "A");
}

#[tokio::test]
async fn upstream_timeout_returns_servfail_and_records_error() {
    let mut h = harness(ForwardOptions::default(), Script::Timeout).await;
    insert_setting(
        &h.pool,
        "dns_settings",
        serde_json::json!({"type": "doh", "url": "https://dns.google/dns-query"}),
    )
    .await;
    h.cache.refresh_now().await.unwrap();

    let query = build_query(0x0A0A, "slow.example.", RecordType::A);
    let response = h
        .pipeline
        .handle_query(&query, ip("10.0.0.5"), ListenerTransport::Udp)
        .await
        .unwrap();

    let decoded = decode(&response);
    assert_eq!(decoded.id(), 0x0A0A);
    assert_eq!(decoded.response_code().low(), 2);
    assert_eq!(decoded.queries()[0].name().to_utf8(), "slow.example.");

    let counters = h.pipeline.counters().snapshot();
    assert!(counters.last_forward_error.unwrap().starts_with("doh:"));

    let record = h.records.recv().await.unwrap();
    assert_eq!(record.status, QueryStatus::Permitted);
    assert!(record.answer_ips.is_none());
}

#[tokio::test]
async fn shadow_blocked_forwards_with_marker() {
    let mut h = harness(ForwardOptions::default(), Script::AnswerA("5.6.7.8".parse().unwrap())).await;
    insert_blocklist(&h.pool, 2, "Watch", "https://example.com/watch.txt", true, "SHADOW").await;
    insert_rule(&h.pool, "tracker.example", "BLOCKED", "Blocklist:2:Watch").await;
    h.cache.refresh_now().await.unwrap();

    let query = build_query(3, "tracker.example.", RecordType::A);
    let response = h
        .pipeline
        .handle_query(&query, ip("10.0.0.5"), ListenerTransport::Udp)
        .await
        .unwrap();

    // The client still gets the real upstream answer.
    assert_eq!(h.forwarder.call_count(), 1);
    assert_eq!(decode(&response).answers().len(), 1);

    let record = h.records.recv().await.unwrap();
    assert_eq!(record.status, QueryStatus::ShadowBlocked);
    assert_eq!(record.blocklist_id.as_deref(), Some("Blocklist:2:Watch"));
    assert_eq!(record.answer_ips.as_deref(), Some(&[ip("5.6.7.8")][..]));
}

#[tokio::test]
async fn protection_pause_permits_and_flags_record() {
    let mut h = harness(ForwardOptions::default(), Script::Echo).await;
    insert_blocklist(&h.pool, 1, "Ads", "https://example.com/ads.txt", true, "ACTIVE").await;
    insert_rule(&h.pool, "ads.example", "BLOCKED", "Blocklist:1:Ads").await;
    insert_setting(&h.pool, "protection_pause", serde_json::json!({"mode": "FOREVER"})).await;
    h.cache.refresh_now().await.unwrap();

    let query = build_query(4, "ads.example.", RecordType::A);
    h.pipeline
        .handle_query(&query, ip("10.0.0.5"), ListenerTransport::Udp)
        .await
        .unwrap();

    assert_eq!(h.forwarder.call_count(), 1);
    let record = h.records.recv().await.unwrap();
    assert_eq!(record.status, QueryStatus::Permitted);
    assert!(record.protection_paused);
}

#[tokio::test]
async fn internet_paused_client_blocked_even_during_protection_pause() {
    let mut h = harness(ForwardOptions::default(), Script::Echo).await;
    insert_client(
        &h.pool,
        1,
        "kid-tablet",
        Some("10.0.0.5"),
        None,
        serde_json::json!({"internet_paused": true}),
    )
    .await;
    insert_setting(&h.pool, "protection_pause", serde_json::json!({"mode": "FOREVER"})).await;
    h.cache.refresh_now().await.unwrap();

    let query = build_query(5, "anything.example.", RecordType::A);
    let response = h
        .pipeline
        .handle_query(&query, ip("10.0.0.5"), ListenerTransport::Udp)
        .await
        .unwrap();

    assert_eq!(decode(&response).response_code().low(), 3);
    assert_eq!(h.forwarder.call_count(), 0);

    let record = h.records.recv().await.unwrap();
    assert_eq!(record.status, QueryStatus::Blocked);
    assert_eq!(record.blocklist_id.as_deref(), Some("ClientPolicy:InternetPaused"));
    assert_eq!(record.client.as_deref(), Some("kid-tablet"));
}

#[tokio::test]
async fn shadow_resolve_enriches_blocked_record() {
    let options = ForwardOptions { shadow_resolve_blocked: true, ..Default::default() };
    let mut h = harness(options, Script::AnswerA("1.2.3.4".parse().unwrap())).await;
    insert_blocklist(&h.pool, 1, "Ads", "https://example.com/ads.txt", true, "ACTIVE").await;
    insert_rule(&h.pool, "ads.example", "BLOCKED", "Blocklist:1:Ads").await;
    h.cache.refresh_now().await.unwrap();

    let query = build_query(6, "ads.example.", RecordType::A);
    let response = h
        .pipeline
        .handle_query(&query, ip("10.0.0.5"), ListenerTransport::Udp)
        .await
        .unwrap();

    // Client sees NXDOMAIN immediately; the upstream answer only feeds
    // telemetry.
    assert_eq!(decode(&response).response_code().low(), 3);

    let record = h.records.recv().await.unwrap();
    assert_eq!(record.status, QueryStatus::Blocked);
    assert_eq!(record.answer_ips.as_deref(), Some(&[ip("1.2.3.4")][..]));
    assert_eq!(h.forwarder.call_count(), 1);
}

#[tokio::test]
async fn malformed_packets() {
    let h = harness(ForwardOptions::default(), Script::Echo).await;
    // Too short for a header: dropped outright.
    assert!(h
        .pipeline
        .handle_query(&[0xFF; 5], ip("10.0.0.5"), ListenerTransport::Udp)
        .await
        .is_none());

    // A readable header with an undecodable body earns a SERVFAIL.
    let mut garbage = vec![0u8; 12];
    garbage[0] = 0xBE;
    garbage[1] = 0xEF;
    garbage[5] = 1; // claims one question that is not there
    let response = h
        .pipeline
        .handle_query(&garbage, ip("10.0.0.5"), ListenerTransport::Udp)
        .await
        .unwrap();
    assert_eq!(&response[..2], &[0xBE, 0xEF]);
    assert_eq!(response[3] & 0x0F, 2);
}
