use async_trait::async_trait;
use sentinel_dns_application::ports::QueryLogSink;
use sentinel_dns_domain::{DomainError, QueryRecord};
use sqlx::SqlitePool;

pub struct SqliteQueryLogSink {
    pool: SqlitePool,
}

impl SqliteQueryLogSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryLogSink for SqliteQueryLogSink {
    async fn append_batch(&self, records: &[QueryRecord]) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        for record in records {
            let answer_ips = record.answer_ips.as_ref().map(|ips| {
                ips.iter().map(|ip| ip.to_string()).collect::<Vec<_>>().join(",")
            });

            sqlx::query(
                "INSERT INTO query_log \
                 (timestamp, domain, client, client_ip, transport, status, query_type, \
                  duration_ms, blocklist_id, answer_ips, protection_paused) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&record.timestamp)
            .bind(&record.domain)
            .bind(record.client.as_deref())
            .bind(record.client_ip.to_string())
            .bind(record.transport.as_str())
            .bind(record.status.as_str())
            .bind(&record.query_type)
            .bind(record.duration_ms as i64)
            .bind(&record.blocklist_id)
            .bind(answer_ips)
            .bind(record.protection_paused)
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;
        }

        tx.commit().await.map_err(|e| DomainError::Database(e.to_string()))
    }
}
