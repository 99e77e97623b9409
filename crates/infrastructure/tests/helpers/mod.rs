//! Shared fixtures: a temp SQLite store, a scripted forwarder, and a
//! fully wired pipeline.
#![allow(dead_code)]

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{rdata, Name, RData, Record, RecordType};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use sentinel_dns_application::ports::Forwarder;
use sentinel_dns_application::RuntimeCounters;
use sentinel_dns_domain::{DomainError, ForwardOptions, QueryRecord, UpstreamConfig};
use sentinel_dns_infrastructure::database::{create_pool, init_schema};
use sentinel_dns_infrastructure::{PolicyCache, QueryPipeline, SqlitePolicyStore};
use sqlx::SqlitePool;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug)]
pub enum Script {
    /// Echo the request with the QR bit set.
    Echo,
    /// Answer with a single A record.
    AnswerA(Ipv4Addr),
    /// Fail with a deadline error.
    Timeout,
}

pub struct ScriptedForwarder {
    pub script: Mutex<Script>,
    pub calls: AtomicUsize,
}

impl ScriptedForwarder {
    pub fn new(script: Script) -> Self {
        Self { script: Mutex::new(script), calls: AtomicUsize::new(0) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Forwarder for ScriptedForwarder {
    async fn forward(
        &self,
        upstream: &UpstreamConfig,
        message: &[u8],
        _deadline: Instant,
    ) -> Result<Vec<u8>, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match *self.script.lock().unwrap() {
            Script::Echo => {
                let mut response = message.to_vec();
                response[2] |= 0x80;
                Ok(response)
            }
            Script::AnswerA(ip) => {
                let id = u16::from_be_bytes([message[0], message[1]]);
                let mut response = Message::new(id, MessageType::Response, OpCode::Query);
                response.add_answer(Record::from_rdata(
                    Name::from_str("answer.test.").unwrap(),
                    60,
                    RData::A(rdata::A(ip)),
                ));
                Ok(serialize(&response))
            }
            Script::Timeout => {
                Err(DomainError::UpstreamTimeout { server: upstream.describe() })
            }
        }
    }
}

pub struct Harness {
    pub pool: SqlitePool,
    pub cache: Arc<PolicyCache>,
    pub pipeline: Arc<QueryPipeline>,
    pub forwarder: Arc<ScriptedForwarder>,
    pub records: mpsc::Receiver<QueryRecord>,
    _dir: tempfile::TempDir,
}

pub async fn harness(options: ForwardOptions, script: Script) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");
    let pool = create_pool(path.to_str().unwrap(), 2).await.unwrap();
    init_schema(&pool).await.unwrap();

    let store = Arc::new(SqlitePolicyStore::new(pool.clone()));
    let default_upstream = UpstreamConfig::Udp { host: "9.9.9.9".into(), port: 53 };
    let cache = Arc::new(PolicyCache::new(store, default_upstream, None));

    let forwarder = Arc::new(ScriptedForwarder::new(script));
    let (tx, rx) = mpsc::channel(64);
    let pipeline = Arc::new(QueryPipeline::new(
        Arc::clone(&cache),
        forwarder.clone() as Arc<dyn Forwarder>,
        Arc::new(RuntimeCounters::new()),
        tx,
        options,
    ));

    Harness { pool, cache, pipeline, forwarder, records: rx, _dir: dir }
}

pub async fn insert_blocklist(pool: &SqlitePool, id: i64, name: &str, url: &str, enabled: bool, mode: &str) {
    sqlx::query(
        "INSERT INTO blocklists (id, name, url, enabled, mode, last_updated_at, last_rule_count) \
         VALUES (?, ?, ?, ?, ?, '2026-07-01 00:00:00', 100)",
    )
    .bind(id)
    .bind(name)
    .bind(url)
    .bind(enabled)
    .bind(mode)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn insert_rule(pool: &SqlitePool, domain: &str, kind: &str, category: &str) {
    sqlx::query("INSERT INTO rules (domain, type, category) VALUES (?, ?, ?)")
        .bind(domain)
        .bind(kind)
        .bind(category)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn insert_setting(pool: &SqlitePool, key: &str, value: serde_json::Value) {
    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(value.to_string())
        .execute(pool)
        .await
        .unwrap();
}

pub async fn insert_client(
    pool: &SqlitePool,
    id: i64,
    name: &str,
    ip: Option<&str>,
    cidr: Option<&str>,
    profile: serde_json::Value,
) {
    sqlx::query(
        "INSERT INTO clients (id, name, ip_address, subnet_cidr, profile) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(name)
    .bind(ip)
    .bind(cidr)
    .bind(profile.to_string())
    .execute(pool)
    .await
    .unwrap();
}

pub fn build_query(id: u16, name: &str, qtype: RecordType) -> Vec<u8> {
    let mut query = Query::new();
    query.set_name(Name::from_str(name).unwrap());
    query.set_query_type(qtype);
    query.set_query_class(hickory_proto::rr::DNSClass::IN);

    let mut message = Message::new(id, MessageType::Query, OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(query);
    serialize(&message)
}

pub fn serialize(message: &Message) -> Vec<u8> {
    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);
    message.emit(&mut encoder).unwrap();
    buf
}

pub fn decode(bytes: &[u8]) -> Message {
    Message::from_vec(bytes).unwrap()
}
