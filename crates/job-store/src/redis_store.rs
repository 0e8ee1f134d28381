// crates/job-store/src/redis_store.rs
//! Redis/Valkey-backed job store for sharing the table across restarts and hosts.

use std::time::Duration;

use redis::FromRedisValue;
use repo_jobs_types::JobSnapshot;
use tokio::sync::Mutex;

use crate::codec;
use crate::error::{StoreError, StoreResult};

/// Keeps the whole job table as one JSON string under a single key.
pub struct RedisStore {
    client: redis::Client,
    key: String,
    connection: Mutex<Option<redis::aio::MultiplexedConnection>>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").field("key", &self.key).finish()
    }
}

impl RedisStore {
    /// Open a client for `url` and confirm the server answers `PING` within `timeout`.
    pub async fn connect(url: &str, key: impl Into<String>, timeout: Duration) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        let store = Self {
            client,
            key: key.into(),
            connection: Mutex::new(None),
        };
        tokio::time::timeout(timeout, store.ping())
            .await
            .map_err(|_| StoreError::ConnectTimeout { timeout })??;
        tracing::debug!(key = %store.key, "redis job store connected");
        Ok(store)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    async fn ping(&self) -> StoreResult<()> {
        self.run_command::<String, _>("ping", || redis::cmd("PING"))
            .await
            .map(|_| ())
    }

    /// Last saved table, or an empty one if the key is missing or Redis fails.
    pub async fn load(&self) -> Vec<JobSnapshot> {
        match self.try_load().await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "failed to read job store from redis");
                Vec::new()
            }
        }
    }

    pub async fn try_load(&self) -> StoreResult<Vec<JobSnapshot>> {
        let raw = self
            .run_command::<Option<Vec<u8>>, _>("load", || {
                let mut cmd = redis::cmd("GET");
                cmd.arg(&self.key);
                cmd
            })
            .await?;
        Ok(raw
            .map(|bytes| codec::decode(&bytes, "redis"))
            .unwrap_or_default())
    }

    pub async fn try_save(&self, snapshots: &[JobSnapshot]) -> StoreResult<()> {
        let payload = codec::encode(snapshots)?;
        self.run_command::<(), _>("save", || {
            let mut cmd = redis::cmd("SET");
            cmd.arg(&self.key).arg(payload.as_slice());
            cmd
        })
        .await
    }

    async fn ensure_connection(
        &self,
        connection: &mut Option<redis::aio::MultiplexedConnection>,
    ) -> StoreResult<()> {
        if connection.is_none() {
            *connection = Some(self.client.get_multiplexed_async_connection().await?);
        }
        Ok(())
    }

    /// Run a command on the cached connection, reconnecting and retrying once on failure.
    async fn run_command<T, F>(&self, operation: &'static str, build: F) -> StoreResult<T>
    where
        T: FromRedisValue + Send,
        F: Fn() -> redis::Cmd,
    {
        let mut last_err: Option<redis::RedisError> = None;
        for attempt in 0..2 {
            let mut conn_guard = self.connection.lock().await;
            self.ensure_connection(&mut conn_guard).await?;
            let conn = conn_guard
                .as_mut()
                .ok_or(StoreError::ConnectionUnavailable)?;
            let result: redis::RedisResult<T> = build().query_async(conn).await;
            match result {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::debug!(operation, attempt = attempt + 1, "redis command succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        error = %err,
                        "redis command failed; reconnecting"
                    );
                    *conn_guard = None;
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.map_or(StoreError::ConnectionUnavailable, StoreError::Redis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_malformed_url() {
        let err = RedisStore::connect("definitely not a url", "job_store", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Redis(_)));
    }

    #[tokio::test]
    async fn test_connect_fails_when_nothing_listens() {
        // Port 1 is reserved and closed on any sane test host.
        let result =
            RedisStore::connect("redis://127.0.0.1:1/", "job_store", Duration::from_secs(2)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    #[ignore = "requires live valkey server"]
    async fn test_save_reconnects_after_server_drops_connection() {
        let Some(url) = std::env::var("VALKEY_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
        else {
            eprintln!("skip: set VALKEY_URL");
            return;
        };
        let key = format!("repo-jobs:test:reconnect:{}", repo_jobs_types::JobId::generate());
        let store = RedisStore::connect(&url, key.clone(), Duration::from_secs(3))
            .await
            .unwrap();
        let client_id: i64 = store
            .run_command("client-id", || {
                let mut cmd = redis::cmd("CLIENT");
                cmd.arg("ID");
                cmd
            })
            .await
            .unwrap();

        // Kill the cached connection from a second client.
        let killer = redis::Client::open(url.as_str()).unwrap();
        let mut admin = killer.get_multiplexed_async_connection().await.unwrap();
        let killed: i64 = redis::cmd("CLIENT")
            .arg("KILL")
            .arg("ID")
            .arg(client_id)
            .query_async(&mut admin)
            .await
            .unwrap();
        assert_eq!(killed, 1);

        let table = vec![JobSnapshot {
            id: "after-reconnect".into(),
            repo_url: "https://github.com/acme/repo1".into(),
            repo_type: "github".into(),
            status: repo_jobs_types::JobStatus::Success,
            error: None,
            progress: Some("done".into()),
            created_at: 1.0,
            updated_at: 2.0,
            metadata: Default::default(),
        }];
        store.try_save(&table).await.unwrap();
        assert_eq!(store.try_load().await.unwrap(), table);

        let _: i64 = redis::cmd("DEL")
            .arg(&key)
            .query_async(&mut admin)
            .await
            .unwrap();
    }
}
