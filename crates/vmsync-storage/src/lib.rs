//! Make store backends + rate-limited HTTP fetch utilities.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::USER_AGENT;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Row};
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info_span, Instrument};
use vmsync_core::{Make, MakeWrite, VehicleType};

pub const CRATE_NAME: &str = "vmsync-storage";

/// Rows per bulk upsert statement.
const UPSERT_CHUNK: usize = 1000;

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub global_concurrency: usize,
    pub token_bucket: Option<TokenBucketConfig>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            global_concurrency: 8,
            token_bucket: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TokenBucketConfig {
    pub capacity: u32,
    pub refill_every: Duration,
}

impl TokenBucketConfig {
    /// Allows `n` request starts per second with a burst of `n`.
    pub fn per_second(n: u32) -> Self {
        let n = n.max(1);
        Self {
            capacity: n,
            refill_every: Duration::from_millis(1000 / u64::from(n)).max(Duration::from_millis(1)),
        }
    }
}

#[derive(Debug)]
pub struct SimpleTokenBucket {
    capacity: u32,
    refill_every: Duration,
    state: Mutex<TokenBucketState>,
}

#[derive(Debug, Clone, Copy)]
struct TokenBucketState {
    tokens: u32,
    last_refill: Instant,
}

impl SimpleTokenBucket {
    pub fn new(config: TokenBucketConfig) -> Self {
        Self {
            capacity: config.capacity,
            refill_every: config.refill_every,
            state: Mutex::new(TokenBucketState {
                tokens: config.capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    pub async fn take(&self) {
        loop {
            let mut state = self.state.lock().await;
            let elapsed = state.last_refill.elapsed();
            if elapsed >= self.refill_every && !self.refill_every.is_zero() {
                let refills =
                    (elapsed.as_nanos() / self.refill_every.as_nanos()).min(u32::MAX as u128) as u32;
                state.tokens = state.tokens.saturating_add(refills).min(self.capacity);
                // Keep the partial interval so the long-run rate matches the config.
                state.last_refill += self.refill_every * refills;
            }

            if state.tokens > 0 {
                state.tokens -= 1;
                return;
            }

            let sleep_for = self.refill_every;
            drop(state);
            tokio::time::sleep(sleep_for).await;
        }
    }
}

const USER_AGENT_TEMPLATES: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{major}.0.{build}.{patch} Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{major}.0.{build}.{patch} Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{major}.0.{build}.{patch} Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:{major}.0) Gecko/20100101 Firefox/{major}.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:{major}.0) Gecko/20100101 Firefox/{major}.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{major}.0.{build}.{patch} Safari/537.36 Edg/{major}.0.{build}.{patch}",
];

/// A browser-like identity string, freshly randomized on every call.
pub fn random_user_agent() -> String {
    let mut rng = rand::thread_rng();
    let template = USER_AGENT_TEMPLATES
        .choose(&mut rng)
        .copied()
        .unwrap_or(USER_AGENT_TEMPLATES[0]);
    template
        .replace("{major}", &rng.gen_range(110..=131).to_string())
        .replace("{build}", &rng.gen_range(5000..=6800).to_string())
        .replace("{patch}", &rng.gen_range(10..=250).to_string())
}

#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    global_limit: Arc<Semaphore>,
    token_bucket: Option<Arc<SimpleTokenBucket>>,
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: u16,
    pub final_url: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout)
            .build()
            .context("building reqwest client")?;
        let token_bucket = config
            .token_bucket
            .map(|c| Arc::new(SimpleTokenBucket::new(c)));

        Ok(Self {
            client,
            global_limit: Arc::new(Semaphore::new(config.global_concurrency.max(1))),
            token_bucket,
        })
    }

    /// Single GET, no retries. Non-2xx statuses are errors.
    pub async fn fetch_bytes(&self, url: &str) -> Result<FetchedResponse, FetchError> {
        let _permit = self.global_limit.acquire().await.expect("semaphore not closed");

        if let Some(bucket) = &self.token_bucket {
            bucket.take().await;
        }

        let user_agent = random_user_agent();
        let span = info_span!("http_fetch", url);
        async move {
            let resp = self
                .client
                .get(url)
                .header(USER_AGENT, user_agent)
                .send()
                .await
                .map_err(|err| classify_reqwest_error(err, url))?;

            let status = resp.status();
            let final_url = resp.url().to_string();
            if !status.is_success() {
                return Err(FetchError::HttpStatus {
                    status: status.as_u16(),
                    url: final_url,
                });
            }

            let body = resp
                .bytes()
                .await
                .map_err(|err| classify_reqwest_error(err, url))?
                .to_vec();
            debug!(status = status.as_u16(), bytes = body.len(), "fetched");
            Ok(FetchedResponse {
                status: status.as_u16(),
                final_url,
                body,
            })
        }
        .instrument(span)
        .await
    }
}

fn classify_reqwest_error(err: reqwest::Error, url: &str) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Request(err)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("stored vehicle types for {make_id} are not decodable: {source}")]
    Decode {
        make_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("encoding vehicle types: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Keyed collection of makes. Apart from `apply_shells`, operations are
/// independent and commit on their own.
#[async_trait]
pub trait MakeStore: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Make>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    async fn upsert_one(&self, write: MakeWrite) -> Result<(), StoreError>;

    async fn upsert_many(&self, writes: Vec<MakeWrite>) -> Result<(), StoreError>;

    /// Returns whether a record was removed.
    async fn delete_one(&self, make_id: &str) -> Result<bool, StoreError>;

    /// Delete `to_delete`, then apply `writes`, all or nothing.
    async fn apply_shells(
        &self,
        to_delete: &[String],
        writes: Vec<MakeWrite>,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryMakeStore {
    records: Mutex<BTreeMap<String, Make>>,
}

impl MemoryMakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = Make>) -> Self {
        Self {
            records: Mutex::new(
                records
                    .into_iter()
                    .map(|m| (m.make_id.clone(), m))
                    .collect(),
            ),
        }
    }

    pub async fn get(&self, make_id: &str) -> Option<Make> {
        self.records.lock().await.get(make_id).cloned()
    }
}

#[async_trait]
impl MakeStore for MemoryMakeStore {
    async fn find_all(&self) -> Result<Vec<Make>, StoreError> {
        Ok(self.records.lock().await.values().cloned().collect())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.records.lock().await.len() as u64)
    }

    async fn upsert_one(&self, write: MakeWrite) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let merged = write.apply_to(records.get(&write.make_id));
        records.insert(merged.make_id.clone(), merged);
        Ok(())
    }

    async fn upsert_many(&self, writes: Vec<MakeWrite>) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        for write in writes {
            let merged = write.apply_to(records.get(&write.make_id));
            records.insert(merged.make_id.clone(), merged);
        }
        Ok(())
    }

    async fn delete_one(&self, make_id: &str) -> Result<bool, StoreError> {
        Ok(self.records.lock().await.remove(make_id).is_some())
    }

    async fn apply_shells(
        &self,
        to_delete: &[String],
        writes: Vec<MakeWrite>,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        for make_id in to_delete {
            records.remove(make_id);
        }
        for write in writes {
            let merged = write.apply_to(records.get(&write.make_id));
            records.insert(merged.make_id.clone(), merged);
        }
        Ok(())
    }
}

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone)]
pub struct PgMakeStore {
    pool: PgPool,
}

impl PgMakeStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    async fn upsert_chunks(conn: &mut PgConnection, writes: &[MakeWrite]) -> Result<(), StoreError> {
        let (with_types, name_only): (Vec<&MakeWrite>, Vec<&MakeWrite>) =
            writes.iter().partition(|w| w.touches_types());
        for chunk in with_types.chunks(UPSERT_CHUNK) {
            Self::upsert_chunk_with_types(&mut *conn, chunk).await?;
        }
        for chunk in name_only.chunks(UPSERT_CHUNK) {
            Self::upsert_chunk_name_only(&mut *conn, chunk).await?;
        }
        Ok(())
    }

    async fn upsert_chunk_with_types(
        conn: &mut PgConnection,
        writes: &[&MakeWrite],
    ) -> Result<(), StoreError> {
        let mut ids = Vec::with_capacity(writes.len());
        let mut names = Vec::with_capacity(writes.len());
        let mut types = Vec::with_capacity(writes.len());
        for write in writes {
            ids.push(write.make_id.clone());
            names.push(write.make_name.clone());
            types.push(encode_types(write.vehicle_types.as_deref().unwrap_or_default())?);
        }
        sqlx::query(
            r#"
            INSERT INTO makes (make_id, make_name, vehicle_types)
            SELECT id, name, types::jsonb
              FROM UNNEST($1::text[], $2::text[], $3::text[]) AS v(id, name, types)
            ON CONFLICT (make_id) DO UPDATE
               SET make_name = EXCLUDED.make_name,
                   vehicle_types = EXCLUDED.vehicle_types,
                   updated_at = NOW()
            "#,
        )
        .bind(&ids)
        .bind(&names)
        .bind(&types)
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn upsert_chunk_name_only(
        conn: &mut PgConnection,
        writes: &[&MakeWrite],
    ) -> Result<(), StoreError> {
        let ids = writes.iter().map(|w| w.make_id.clone()).collect::<Vec<_>>();
        let names = writes.iter().map(|w| w.make_name.clone()).collect::<Vec<_>>();
        sqlx::query(
            r#"
            INSERT INTO makes (make_id, make_name)
            SELECT id, name
              FROM UNNEST($1::text[], $2::text[]) AS v(id, name)
            ON CONFLICT (make_id) DO UPDATE
               SET make_name = EXCLUDED.make_name,
                   updated_at = NOW()
            "#,
        )
        .bind(&ids)
        .bind(&names)
        .execute(conn)
        .await?;
        Ok(())
    }
}

fn encode_types(types: &[VehicleType]) -> Result<String, StoreError> {
    let value = JsonValue::Array(
        types
            .iter()
            .map(|t| serde_json::json!({"typeId": t.type_id, "typeName": t.type_name}))
            .collect(),
    );
    serde_json::to_string(&value).map_err(StoreError::Encode)
}

fn decode_types(make_id: &str, value: JsonValue) -> Result<Vec<VehicleType>, StoreError> {
    serde_json::from_value(value).map_err(|source| StoreError::Decode {
        make_id: make_id.to_string(),
        source,
    })
}

#[async_trait]
impl MakeStore for PgMakeStore {
    async fn find_all(&self) -> Result<Vec<Make>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT make_id, make_name, vehicle_types
              FROM makes
             ORDER BY make_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let make_id: String = row.try_get("make_id")?;
            let vehicle_types: JsonValue = row.try_get("vehicle_types")?;
            out.push(Make {
                vehicle_types: decode_types(&make_id, vehicle_types)?,
                make_name: row.try_get("make_name")?,
                make_id,
            });
        }
        Ok(out)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM makes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn upsert_one(&self, write: MakeWrite) -> Result<(), StoreError> {
        match &write.vehicle_types {
            Some(types) => {
                sqlx::query(
                    r#"
                    INSERT INTO makes (make_id, make_name, vehicle_types)
                    VALUES ($1, $2, $3::jsonb)
                    ON CONFLICT (make_id) DO UPDATE
                       SET make_name = EXCLUDED.make_name,
                           vehicle_types = EXCLUDED.vehicle_types,
                           updated_at = NOW()
                    "#,
                )
                .bind(&write.make_id)
                .bind(&write.make_name)
                .bind(encode_types(types)?)
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO makes (make_id, make_name)
                    VALUES ($1, $2)
                    ON CONFLICT (make_id) DO UPDATE
                       SET make_name = EXCLUDED.make_name,
                           updated_at = NOW()
                    "#,
                )
                .bind(&write.make_id)
                .bind(&write.make_name)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    async fn upsert_many(&self, writes: Vec<MakeWrite>) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        Self::upsert_chunks(&mut conn, &writes).await
    }

    async fn delete_one(&self, make_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM makes WHERE make_id = $1")
            .bind(make_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn apply_shells(
        &self,
        to_delete: &[String],
        writes: Vec<MakeWrite>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        if !to_delete.is_empty() {
            sqlx::query("DELETE FROM makes WHERE make_id = ANY($1)")
                .bind(to_delete)
                .execute(&mut *tx)
                .await?;
        }
        Self::upsert_chunks(&mut tx, &writes).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    /// Reads one request head and returns its `User-Agent` value.
    async fn read_user_agent(stream: &mut TcpStream) -> Option<String> {
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.ok()?;
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        String::from_utf8_lossy(&head).lines().find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("user-agent")
                .then(|| value.trim().to_string())
        })
    }

    /// Answers every connection with `status_line` and reports each
    /// request's User-Agent.
    async fn spawn_responder(status_line: &'static str) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let agent = read_user_agent(&mut stream).await.unwrap_or_default();
                let _ = tx.send(agent);
                let reply = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok"
                );
                let _ = stream.write_all(reply.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        (format!("http://{addr}"), rx)
    }

    fn fetcher(timeout: Duration) -> HttpFetcher {
        HttpFetcher::new(HttpClientConfig {
            timeout,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn user_agent_is_randomized_per_call() {
        let agents = (0..32).map(|_| random_user_agent()).collect::<std::collections::HashSet<_>>();
        assert!(agents.len() > 1);
        for agent in &agents {
            assert!(agent.starts_with("Mozilla/5.0"));
            assert!(!agent.contains('{'));
        }
    }

    #[tokio::test]
    async fn fetch_sends_fresh_user_agent_per_request() {
        let (base, mut agents) = spawn_responder("200 OK").await;
        let fetcher = fetcher(Duration::from_secs(5));

        let mut seen = std::collections::HashSet::new();
        for _ in 0..4 {
            let resp = fetcher.fetch_bytes(&format!("{base}/makes")).await.unwrap();
            assert_eq!(resp.status, 200);
            assert_eq!(resp.body, b"ok");
            let agent = agents.recv().await.unwrap();
            assert!(agent.starts_with("Mozilla/5.0"), "{agent}");
            seen.insert(agent);
        }
        assert!(seen.len() > 1, "user agent reused across requests: {seen:?}");
    }

    #[tokio::test]
    async fn non_success_status_is_http_status_error() {
        let (base, _agents) = spawn_responder("503 Service Unavailable").await;
        let err = fetcher(Duration::from_secs(5))
            .fetch_bytes(&format!("{base}/makes"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, FetchError::HttpStatus { status: 503, .. }),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn silent_upstream_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let url = format!("http://{addr}/x");
        let err = fetcher(Duration::from_millis(300))
            .fetch_bytes(&url)
            .await
            .unwrap_err();
        match err {
            FetchError::Timeout { url: reported } => assert_eq!(reported, url),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn token_bucket_per_second_config() {
        let cfg = TokenBucketConfig::per_second(4);
        assert_eq!(cfg.capacity, 4);
        assert_eq!(cfg.refill_every, Duration::from_millis(250));
        assert_eq!(TokenBucketConfig::per_second(0).capacity, 1);
    }

    #[tokio::test]
    async fn token_bucket_allows_burst_up_to_capacity() {
        let bucket = SimpleTokenBucket::new(TokenBucketConfig {
            capacity: 3,
            refill_every: Duration::from_secs(60),
        });
        let started = Instant::now();
        for _ in 0..3 {
            bucket.take().await;
        }
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn token_bucket_keeps_partial_refill_interval() {
        let bucket = SimpleTokenBucket::new(TokenBucketConfig {
            capacity: 1,
            refill_every: Duration::from_millis(100),
        });
        bucket.take().await;

        tokio::time::advance(Duration::from_millis(150)).await;
        bucket.take().await;

        // 210ms after start: the second refill is due without waiting.
        tokio::time::advance(Duration::from_millis(60)).await;
        let before = Instant::now();
        bucket.take().await;
        assert_eq!(Instant::now(), before);
    }

    #[test]
    fn encoded_types_use_external_field_names() {
        let encoded = encode_types(&[VehicleType::new("2", "Passenger Car")]).unwrap();
        assert_eq!(encoded, r#"[{"typeId":"2","typeName":"Passenger Car"}]"#);
        let decoded = decode_types("440", serde_json::from_str(&encoded).unwrap()).unwrap();
        assert_eq!(decoded, vec![VehicleType::new("2", "Passenger Car")]);
    }

    #[test]
    fn undecodable_types_name_the_make() {
        let err = decode_types("440", serde_json::json!({"oops": true})).unwrap_err();
        assert!(err.to_string().contains("440"));
    }

    #[tokio::test]
    async fn memory_store_upsert_respects_omitted_types() {
        let store = MemoryMakeStore::with_records([Make::shell("1", "A")
            .with_types(vec![VehicleType::new("2", "Car")])]);

        store
            .upsert_many(vec![
                MakeWrite::name_only(&Make::shell("1", "A")),
                MakeWrite::name_only(&Make::shell("3", "C")),
            ])
            .await
            .unwrap();

        assert_eq!(store.get("1").await.unwrap().vehicle_types.len(), 1);
        assert!(store.get("3").await.unwrap().vehicle_types.is_empty());
        assert_eq!(store.count().await.unwrap(), 2);

        store
            .upsert_one(MakeWrite::replace(Make::shell("1", "A")))
            .await
            .unwrap();
        assert!(store.get("1").await.unwrap().vehicle_types.is_empty());
    }

    #[tokio::test]
    async fn memory_store_applies_shells_as_one_step() {
        let store = MemoryMakeStore::with_records([
            Make::shell("1", "A").with_types(vec![VehicleType::new("2", "Car")]),
            Make::shell("9", "Stale"),
        ]);

        store
            .apply_shells(
                &["9".to_string()],
                vec![
                    MakeWrite::name_only(&Make::shell("1", "A2")),
                    MakeWrite::replace(Make::shell("5", "E")),
                ],
            )
            .await
            .unwrap();

        let all = store.find_all().await.unwrap();
        assert_eq!(
            all.iter().map(|m| m.make_id.as_str()).collect::<Vec<_>>(),
            vec!["1", "5"]
        );
        assert_eq!(all[0].make_name, "A2");
        assert_eq!(all[0].vehicle_types.len(), 1);
    }

    #[tokio::test]
    async fn memory_store_delete_reports_presence() {
        let store = MemoryMakeStore::with_records([Make::shell("1", "A")]);
        assert!(store.delete_one("1").await.unwrap());
        assert!(!store.delete_one("1").await.unwrap());
        assert!(store.find_all().await.unwrap().is_empty());
    }
}
